//! HTTP/JSON implementations of the subsystem traits.
//!
//! Every client shares one pooled `reqwest::Client` carrying the 5 s stub
//! deadline; exceeding it surfaces as a transport failure for the step.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::MemoryProposal;

use super::{
    ActionRequest, ActionResponse, ClientExecutor, ContextRequest, ContextResponse, MemoryService,
    OpsService, RagService, SearchRequest, SearchResponse, SubsystemError,
};

/// Deadline applied to every outbound subsystem call.
pub const STUB_DEADLINE: Duration = Duration::from_secs(5);

/// Maximum characters of an error body kept in messages.
const MAX_ERROR_BODY_CHARS: usize = 256;

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(STUB_DEADLINE)
        .build()
        .unwrap_or_default()
}

async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
) -> Result<Resp, SubsystemError> {
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| SubsystemError::Request(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("(body unreadable: {e})"));
        return Err(SubsystemError::HttpStatus {
            status: status.as_u16(),
            body: crate::llm::truncate_body(&text, MAX_ERROR_BODY_CHARS),
        });
    }

    resp.json()
        .await
        .map_err(|e| SubsystemError::Parse(e.to_string()))
}

// ── Memory ──────────────────────────────────────────────────────

/// HTTP client for the memory subsystem.
#[derive(Debug, Clone)]
pub struct HttpMemoryService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMemoryService {
    /// Create a client rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client(),
        }
    }
}

#[async_trait]
impl MemoryService for HttpMemoryService {
    async fn get_context(
        &self,
        request: ContextRequest,
    ) -> Result<ContextResponse, SubsystemError> {
        let url = format!("{}/v1/context", self.base_url);
        post_json(&self.client, &url, &request).await
    }

    async fn propose_memory(&self, proposal: MemoryProposal) -> Result<(), SubsystemError> {
        let url = format!("{}/v1/propose", self.base_url);
        let _ack: serde_json::Value = post_json(&self.client, &url, &proposal).await?;
        Ok(())
    }
}

// ── RAG ─────────────────────────────────────────────────────────

/// HTTP client for the knowledge retrieval subsystem.
#[derive(Debug, Clone)]
pub struct HttpRagService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRagService {
    /// Create a client rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client(),
        }
    }
}

#[async_trait]
impl RagService for HttpRagService {
    async fn search_knowledge(
        &self,
        request: SearchRequest,
    ) -> Result<SearchResponse, SubsystemError> {
        let url = format!("{}/v1/search", self.base_url);
        post_json(&self.client, &url, &request).await
    }
}

// ── Client executor ─────────────────────────────────────────────

/// HTTP client for the client-side action executor.
#[derive(Debug, Clone)]
pub struct HttpClientExecutor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClientExecutor {
    /// Create a client rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client(),
        }
    }
}

#[async_trait]
impl ClientExecutor for HttpClientExecutor {
    async fn execute_action(
        &self,
        request: ActionRequest,
    ) -> Result<ActionResponse, SubsystemError> {
        let url = format!("{}/v1/execute", self.base_url);
        post_json(&self.client, &url, &request).await
    }
}

// ── Ops ─────────────────────────────────────────────────────────

/// HTTP client for the operating-system action service.
#[derive(Debug, Clone)]
pub struct HttpOpsService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpOpsService {
    /// Create a client rooted at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client: build_client(),
        }
    }
}

#[async_trait]
impl OpsService for HttpOpsService {
    async fn execute_system_action(
        &self,
        request: ActionRequest,
    ) -> Result<ActionResponse, SubsystemError> {
        let url = format!("{}/v1/execute", self.base_url);
        post_json(&self.client, &url, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let svc = HttpMemoryService::new("http://localhost:50053/");
        assert_eq!(svc.base_url, "http://localhost:50053");
    }

    #[test]
    fn test_action_response_defaults() {
        let resp: ActionResponse = serde_json::from_str(r#"{"success":true}"#).expect("parse");
        assert!(resp.success);
        assert!(resp.output.is_empty());
        assert!(resp.error.is_empty());
    }

    #[test]
    fn test_search_response_defaults() {
        let resp: SearchResponse = serde_json::from_str("{}").expect("parse");
        assert!(resp.chunks.is_empty());
    }
}
