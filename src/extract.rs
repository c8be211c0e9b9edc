use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};

/// Prompt text and declared tool names pulled out of one request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractResult {
    /// Newline-joined string contributions in document order.
    pub text: String,
    /// Tool names in first-occurrence order, without duplicates.
    pub tool_names: Vec<String>,
}

/// Walks the recognized prompt locations of an LLM request body. Provider
/// payloads disagree on shape (bare strings, message arrays, structured
/// content blocks), so each key tolerates several layouts; unknown keys and
/// shapes contribute nothing. Fails only when the body is not a JSON object.
pub fn from_json(body: &[u8]) -> Result<ExtractResult> {
    let value: Value = serde_json::from_slice(body).context("request body is not valid JSON")?;
    let Value::Object(root) = value else {
        bail!("request body root is not a JSON object");
    };
    Ok(ExtractResult {
        text: collect_text(&root),
        tool_names: collect_tools(&root),
    })
}

fn collect_text(root: &Map<String, Value>) -> String {
    let mut parts = Vec::new();
    if let Some(input) = root.get("input") {
        read_input(input, &mut parts);
    }
    if let Some(messages) = root.get("messages") {
        read_messages(messages, &mut parts);
    }
    if let Some(prompt) = root.get("prompt") {
        read_prompt(prompt, &mut parts);
    }
    parts.join("\n")
}

fn read_input(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::String(text) => parts.push(text.clone()),
        Value::Array(items) => read_array(items, parts),
        Value::Object(obj) => read_content(obj, parts),
        _ => {}
    }
}

fn read_messages(value: &Value, parts: &mut Vec<String>) {
    if let Value::Array(items) = value {
        read_array(items, parts);
    }
}

fn read_prompt(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::String(text) => parts.push(text.clone()),
        Value::Array(items) => {
            for item in items {
                if let Value::String(text) = item {
                    parts.push(text.clone());
                }
            }
        }
        _ => {}
    }
}

fn read_array(items: &[Value], parts: &mut Vec<String>) {
    for item in items {
        match item {
            Value::String(text) => parts.push(text.clone()),
            Value::Object(obj) => read_content(obj, parts),
            _ => {}
        }
    }
}

/// Message-style objects: a string `content` contributes itself, an array
/// `content` contributes the `text` of each object element, and a string
/// `text` on the object itself contributes last.
fn read_content(obj: &Map<String, Value>, parts: &mut Vec<String>) {
    match obj.get("content") {
        Some(Value::String(text)) => parts.push(text.clone()),
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Object(entry) = item
                    && let Some(Value::String(text)) = entry.get("text")
                {
                    parts.push(text.clone());
                }
            }
        }
        _ => {}
    }
    if let Some(Value::String(text)) = obj.get("text") {
        parts.push(text.clone());
    }
}

fn collect_tools(root: &Map<String, Value>) -> Vec<String> {
    let mut names = Vec::new();
    for key in ["tools", "functions"] {
        let Some(Value::Array(items)) = root.get(key) else {
            continue;
        };
        for item in items {
            if let Value::Object(obj) = item
                && let Some(Value::String(name)) = obj.get("name")
            {
                names.push(name.clone());
            }
        }
    }
    let mut seen = HashSet::new();
    names.retain(|name| seen.insert(name.clone()));
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_tools() {
        let body = br#"{
            "messages": [
                {"role": "user", "content": "hello"},
                {"role": "user", "content": [{"type": "text", "text": "world"}]}
            ],
            "tools": [{"name": "file_write"}, {"name": "exec_command"}]
        }"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.text, "hello\nworld");
        assert_eq!(result.tool_names, vec!["file_write", "exec_command"]);
    }

    #[test]
    fn input_as_bare_string() {
        let result = from_json(br#"{"input": "summarize this"}"#).expect("extract");
        assert_eq!(result.text, "summarize this");
        assert!(result.tool_names.is_empty());
    }

    #[test]
    fn input_as_array_mixes_strings_and_objects() {
        let body = br#"{"input": ["first", {"content": "second"}, 42, ["nested"]]}"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.text, "first\nsecond");
    }

    #[test]
    fn input_as_content_object_with_trailing_text() {
        let body = br#"{"input": {"content": [{"text": "a"}, {"text": "b"}], "text": "c"}}"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.text, "a\nb\nc");
    }

    #[test]
    fn prompt_array_skips_non_strings() {
        let body = br#"{"prompt": ["one", 2, {"text": "ignored"}, "three"]}"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.text, "one\nthree");
    }

    #[test]
    fn keys_contribute_in_fixed_order() {
        let body = br#"{
            "prompt": "from prompt",
            "messages": [{"content": "from messages"}],
            "input": "from input"
        }"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.text, "from input\nfrom messages\nfrom prompt");
    }

    #[test]
    fn messages_must_be_an_array() {
        let result = from_json(br#"{"messages": {"content": "ignored"}}"#).expect("extract");
        assert_eq!(result.text, "");
    }

    #[test]
    fn tools_then_functions_deduplicated() {
        let body = br#"{
            "tools": [{"name": "search"}, {"name": "search"}, {"id": "unnamed"}],
            "functions": [{"name": "search"}, {"name": "calc"}, "bare"]
        }"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.tool_names, vec!["search", "calc"]);
    }

    #[test]
    fn tool_names_keep_their_case() {
        let body = br#"{"tools": [{"name": "File_Write"}]}"#;
        let result = from_json(body).expect("extract");
        assert_eq!(result.tool_names, vec!["File_Write"]);
    }

    #[test]
    fn empty_object_extracts_nothing() {
        let result = from_json(b"{}").expect("extract");
        assert_eq!(result, ExtractResult::default());
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(from_json(b"[1, 2, 3]").is_err());
        assert!(from_json(br#""just a string""#).is_err());
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(from_json(b"not json").is_err());
    }

    #[test]
    fn extraction_is_deterministic() {
        let body = br#"{"messages": [{"content": "a"}], "tools": [{"name": "t"}]}"#;
        let first = from_json(body).expect("extract");
        let second = from_json(body).expect("extract");
        assert_eq!(first, second);
    }
}
