//! Intent router -- tier-0 mechanical classification.
//!
//! Evaluates a fixed ordered list of case-insensitive patterns; the first
//! match selects the intent, and no match means CONVERSE. Purely local,
//! no network I/O, deterministic for identical input.

use regex::Regex;

use crate::types::Intent;

/// Ordered keyword triggers. First match wins.
const TRIGGERS: &[(&str, Intent)] = &[
    (
        r"(?i)\b(stock|price|market|news|weather)\b",
        Intent::RealtimeSearch,
    ),
    (
        r"(?i)\b(delete|move|open|restart|run|list|read|file|exists)\b",
        Intent::ToolAction,
    ),
    (
        r"(?i)\b(remember|history|like|feel|forgot|preference)\b",
        Intent::MemoryQuery,
    ),
];

/// Keyword-driven intent classifier.
pub struct IntentRouter {
    triggers: Vec<(Regex, Intent)>,
}

impl IntentRouter {
    /// Compile the trigger table.
    pub fn new() -> Self {
        let triggers = TRIGGERS
            .iter()
            .map(|(pattern, intent)| {
                let regex = Regex::new(pattern).expect("hard-coded trigger pattern compiles");
                (regex, *intent)
            })
            .collect();
        Self { triggers }
    }

    /// Classify a message.
    pub fn route(&self, text: &str) -> Intent {
        for (regex, intent) in &self.triggers {
            if regex.is_match(text) {
                return *intent;
            }
        }
        Intent::Converse
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}
