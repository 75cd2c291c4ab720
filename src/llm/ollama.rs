//! Ollama `/api/generate` HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{truncate_body, GenerateRequest, LlmClient, LlmError};

/// Maximum characters of an error body kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Generate request body.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions<'a>,
}

/// Sampling options forwarded to the endpoint.
#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "stop_is_empty")]
    stop: &'a [String],
}

fn stop_is_empty(stop: &&[String]) -> bool {
    stop.is_empty()
}

/// Generate response body.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// HTTP client for an Ollama-compatible generate endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for the given generate endpoint URL.
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let body = OllamaRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.num_predict,
                stop: &request.stop,
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|e| format!("(body unreadable: {e})"));
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        let payload: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(payload.response)
    }
}
