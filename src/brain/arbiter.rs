//! Decision arbiter -- mechanical policy enforcement.
//!
//! Produces one verdict per plan step, in plan order, before anything
//! executes. Rule order is fixed and first match wins. Stateless and
//! deterministic.

use crate::types::{ArbiterDecision, PlannerDag, Verdict};

/// Tokens that are never allowed to execute, case-insensitive.
const FORBIDDEN: &[&str] = &["DELETE_ALL", "FORMAT_SYSTEM"];

/// Substrings that mark an action as destructive enough to confirm.
const DESTRUCTIVE: &[&str] = &["delete", "remove"];

/// Policy layer producing ALLOW / DENY / CONFIRM verdicts.
pub struct DecisionArbiter;

impl DecisionArbiter {
    /// Rule on every step of a plan, in plan order.
    pub fn evaluate_plan(&self, dag: &PlannerDag) -> Vec<ArbiterDecision> {
        dag.steps
            .iter()
            .map(|step| {
                let action_id = step.intent.action_id.as_str();
                let upper = action_id.to_uppercase();
                let lower = action_id.to_lowercase();

                if FORBIDDEN.iter().any(|token| upper.contains(token)) {
                    return ArbiterDecision {
                        step_id: step.step_id.clone(),
                        tool_id: action_id.to_owned(),
                        verdict: Verdict::Deny,
                        confidence: 1.0,
                        reason: "Critical system safety violation.".to_owned(),
                    };
                }

                if DESTRUCTIVE.iter().any(|token| lower.contains(token)) {
                    return ArbiterDecision {
                        step_id: step.step_id.clone(),
                        tool_id: action_id.to_owned(),
                        verdict: Verdict::Confirm,
                        confidence: 0.8,
                        reason: "Potentially destructive action requires manual confirmation."
                            .to_owned(),
                    };
                }

                ArbiterDecision {
                    step_id: step.step_id.clone(),
                    tool_id: action_id.to_owned(),
                    verdict: Verdict::Allow,
                    confidence: 1.0,
                    reason: String::new(),
                }
            })
            .collect()
    }
}
