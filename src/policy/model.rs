use std::sync::Arc;

use regex::Regex;

/// Disposition a rule assigns to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Deny,
    Approve,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Approve => "approve",
        }
    }

    pub fn parse(value: &str) -> Option<Action> {
        if value.eq_ignore_ascii_case("allow") {
            Some(Action::Allow)
        } else if value.eq_ignore_ascii_case("deny") {
            Some(Action::Deny)
        } else if value.eq_ignore_ascii_case("approve") {
            Some(Action::Approve)
        } else {
            None
        }
    }
}

/// Outcome of evaluating one request against the rule set.
///
/// `rule_name` is empty when no rule matched; `reason` is a stable tag
/// (`matched_rule`, `no_matching_rule`) that ends up in the audit stream.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    pub rule_name: Arc<str>,
    pub reason: &'static str,
}

impl Decision {
    pub fn fallback_allow() -> Self {
        Self {
            action: Action::Allow,
            rule_name: Arc::from(""),
            reason: "no_matching_rule",
        }
    }

    /// A deny produced by the pipeline itself rather than by a rule, e.g.
    /// for bodies that fail to parse.
    pub fn synthetic_deny(reason: &'static str) -> Self {
        Self {
            action: Action::Deny,
            rule_name: Arc::from(""),
            reason,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: Arc<str>,
    /// Lowercased at compile time; stages compare case-insensitively.
    pub stage: String,
    pub action: Action,
    pub pattern: Option<Regex>,
    /// Lowercased at compile time; tool matching is case-insensitive.
    pub tool_names: Vec<String>,
}

impl CompiledRule {
    /// A rule matches when every predicate it specifies holds; a rule with
    /// no predicates matches every input.
    pub fn matches(&self, text: &str, tool_names_lower: &[String]) -> bool {
        if let Some(pattern) = &self.pattern
            && !pattern.is_match(text)
        {
            return false;
        }
        if !self.tool_names.is_empty()
            && !self
                .tool_names
                .iter()
                .any(|wanted| tool_names_lower.iter().any(|tool| tool == wanted))
        {
            return false;
        }
        true
    }
}
