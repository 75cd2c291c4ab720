//! Persona narrator -- turns a result packet into user-facing text.
//!
//! Two modes: pure chat for empty result sets, and strict task narration
//! otherwise. The narrator sees only the [`ResultPacket`]; on LLM failure
//! it degrades to a deterministic fallback so the stream always answers.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::llm::{GenerateRequest, LlmClient};
use crate::subsystems::ContextResponse;
use crate::types::ResultPacket;

/// Deadline for chat-mode narration.
const CHAT_TIMEOUT: Duration = Duration::from_secs(5);
/// Deadline for task-mode narration.
const TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// Canned greeting when even chat narration fails.
const FALLBACK_GREETING: &str = "Hello. How can I help you?";

/// Constrained narrator over the one-way result contract.
pub struct PersonaGenerator {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl PersonaGenerator {
    /// Create a narrator calling `model` through the given client.
    pub fn new(llm: Arc<dyn LlmClient>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_owned(),
        }
    }

    /// Narrate a result packet.
    ///
    /// `_memory` is part of the narration interface but the current prompt
    /// set is intentionally memory-blind; the packet is the only content
    /// source.
    pub async fn generate(&self, packet: &ResultPacket, _memory: &ContextResponse) -> String {
        if packet.results.is_empty() {
            return self.simple_chat(&packet.user_query).await;
        }

        let execution_log = format_execution_log(packet);
        let prompt = format!(
            "### MISSION\n\
             You are Cortex. Narrate the execution log below to the user.\n\
             STRICT RULES:\n\
             1. ONLY describe actions present in the log.\n\
             2. DO NOT explain internal logic, system modes, or terminal specifics.\n\
             3. DO NOT hypothesize about what 'could' have happened.\n\
             4. If an action was DENIED or needs CONFIRMATION, explain the reason given in the log.\n\
             5. Be brief, factual, and professional.\n\n\
             ### USER QUERY\n\
             {}\n\n\
             ### EXECUTION LOG\n\
             {execution_log}",
            packet.user_query
        );

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            temperature: 0.1,
            num_predict: Some(100),
            stop: Vec::new(),
            timeout: TASK_TIMEOUT,
        };

        match self.llm.generate(request).await {
            Ok(text) => text.trim().to_owned(),
            Err(e) => {
                warn!(error = %e, "task narration failed, returning execution log");
                format!("LOG SUMMARY:\n{execution_log}")
            }
        }
    }

    /// Ultra-short prompt for greetings and empty task sets.
    async fn simple_chat(&self, user_query: &str) -> String {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: format!("You are Cortex. Respond briefly to: '{user_query}'"),
            temperature: 0.5,
            num_predict: Some(50),
            stop: Vec::new(),
            timeout: CHAT_TIMEOUT,
        };

        match self.llm.generate(request).await {
            Ok(text) => text.trim().to_owned(),
            Err(e) => {
                warn!(error = %e, "chat narration failed, returning canned greeting");
                FALLBACK_GREETING.to_owned()
            }
        }
    }
}

/// Render the packet as one log line per result, omitting absent fields.
fn format_execution_log(packet: &ResultPacket) -> String {
    let lines: Vec<String> = packet
        .results
        .iter()
        .map(|result| {
            let mut line = format!("- Action: {} [{}]", result.tool_id, result.status);
            if !result.decision_reason.is_empty() {
                line.push_str(&format!(" | Note: {}", result.decision_reason));
            }
            if !result.raw_output.is_empty() {
                line.push_str(&format!(" | Result: {}", result.raw_output));
            } else if !result.error.is_empty() {
                line.push_str(&format!(" | Error: {}", result.error));
            }
            line
        })
        .collect();
    lines.join("\n")
}
