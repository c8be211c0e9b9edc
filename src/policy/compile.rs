use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;

use super::model::{Action, CompiledRule};
use crate::config::Rule;

/// Builds the runtime rule set. Regexes are compiled exactly once here; a
/// malformed pattern aborts startup with the offending rule named.
pub fn compile_rules(rules: &[Rule]) -> Result<Vec<CompiledRule>> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        let action = Action::parse(&rule.action).with_context(|| {
            format!(
                "rule '{}' has unsupported action '{}'",
                rule.name, rule.action
            )
        })?;
        let pattern = match rule.matcher.pattern.as_str() {
            "" => None,
            pattern => Some(Regex::new(pattern).with_context(|| {
                format!("rule '{}' has invalid pattern '{}'", rule.name, pattern)
            })?),
        };
        compiled.push(CompiledRule {
            name: Arc::from(rule.name.as_str()),
            stage: rule.stage.to_lowercase(),
            action,
            pattern,
            tool_names: rule
                .matcher
                .tool_names
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
        });
    }
    Ok(compiled)
}

/// Normalizes the configured decision order: lowercase, drop unknown
/// entries, fall back to deny-approve-allow when nothing is left.
pub fn parse_decision_order(order: &[String]) -> Vec<Action> {
    let mut parsed: Vec<Action> = order
        .iter()
        .filter_map(|entry| Action::parse(entry))
        .collect();
    if parsed.is_empty() {
        parsed = vec![Action::Deny, Action::Approve, Action::Allow];
    }
    parsed
}
