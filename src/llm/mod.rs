//! LLM client abstraction for the planner and narrator endpoints.
//!
//! A single trait, [`LlmClient`], covers both call sites; the production
//! implementation is [`ollama::OllamaClient`]. Tests substitute scripted
//! mocks behind the same trait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod ollama;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model identifier understood by the endpoint.
    pub model: String,
    /// Full prompt text.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Cap on generated tokens; `None` leaves the endpoint default.
    pub num_predict: Option<u32>,
    /// Stop sequences that terminate stray narration.
    pub stop: Vec<String>,
    /// Hard deadline for the whole call.
    pub timeout: Duration,
}

/// Errors returned by LLM endpoints.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport failure, including a missed deadline.
    #[error("llm request failed: {0}")]
    Request(String),
    /// Endpoint answered with a non-success status.
    #[error("llm returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// Response body did not match the expected schema.
    #[error("llm response parse error: {0}")]
    Parse(String),
}

/// Core LLM completion interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion, returning the raw response text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on transport, status, or parse failure.
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;
}

/// Truncate a response body for inclusion in error messages.
pub(crate) fn truncate_body(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_owned();
    }
    let shortened: String = raw.chars().take(max_chars).collect();
    format!("{shortened}...[truncated]")
}
