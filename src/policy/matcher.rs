use anyhow::Result;

use super::compile::{compile_rules, parse_decision_order};
use super::model::{Action, CompiledRule, Decision};
use crate::config::Rule;

/// Immutable rule set plus the action-class priority used to arbitrate
/// between rules that match the same request.
#[derive(Debug)]
pub struct Evaluator {
    rules: Vec<CompiledRule>,
    order: Vec<Action>,
}

impl Evaluator {
    pub fn new(rules: &[Rule], decision_order: &[String]) -> Result<Self> {
        Ok(Self {
            rules: compile_rules(rules)?,
            order: parse_decision_order(decision_order),
        })
    }

    /// Returns the first decision in priority order for which some rule at
    /// the given stage matches; rules within an action class are tried in
    /// declaration order. No match at all yields the allow fallback.
    pub fn evaluate(&self, stage: &str, text: &str, tool_names: &[String]) -> Decision {
        let stage = stage.to_lowercase();
        let tools_lower: Vec<String> = tool_names.iter().map(|t| t.to_lowercase()).collect();
        for action in &self.order {
            if let Some(decision) = self.match_stage(&stage, text, &tools_lower, *action) {
                return decision;
            }
        }
        Decision::fallback_allow()
    }

    fn match_stage(
        &self,
        stage: &str,
        text: &str,
        tools_lower: &[String],
        action: Action,
    ) -> Option<Decision> {
        self.rules
            .iter()
            .find(|rule| {
                rule.stage == stage && rule.action == action && rule.matches(text, tools_lower)
            })
            .map(|rule| Decision {
                action,
                rule_name: rule.name.clone(),
                reason: "matched_rule",
            })
    }
}
