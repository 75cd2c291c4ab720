//! Downstream subsystem interfaces.
//!
//! The orchestrator talks to four remote collaborators: the memory store,
//! the knowledge retrieval (RAG) service, the client-side action executor,
//! and the operating-system action service. Each is a trait so tests can
//! substitute in-memory fakes; [`remote`] provides the HTTP implementations.

use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::MemoryProposal;

pub mod remote;

// ── Wire types ──────────────────────────────────────────────────

/// Request for session memory context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Session to fetch context for.
    pub session_id: String,
    /// Entities of interest; empty means "everything relevant".
    #[serde(default)]
    pub entities: Vec<String>,
}

/// Memory context for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextResponse {
    /// Natural-language memory summaries.
    #[serde(default)]
    pub memory_summaries: Vec<String>,
    /// Preference dimension scores.
    #[serde(default)]
    pub preferences: HashMap<String, f32>,
}

/// Knowledge search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Number of chunks to return.
    pub top_k: u32,
}

/// One retrieved knowledge chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagChunk {
    /// Chunk text.
    pub text: String,
    /// Provenance tag.
    pub source: String,
    /// Retrieval reliability score.
    pub score: f32,
}

/// Knowledge search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Retrieved chunks, best first.
    #[serde(default)]
    pub chunks: Vec<RagChunk>,
}

/// Action dispatch request for the client and ops executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Whitelisted tool id.
    pub action_id: String,
    /// Tool parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Action dispatch response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Whether the action succeeded.
    pub success: bool,
    /// Tool output; empty on failure.
    #[serde(default)]
    pub output: String,
    /// Error message; empty on success.
    #[serde(default)]
    pub error: String,
}

// ── Errors ──────────────────────────────────────────────────────

/// Errors returned by subsystem clients.
#[derive(Debug, Error)]
pub enum SubsystemError {
    /// Transport failure, including a missed deadline.
    #[error("subsystem request failed: {0}")]
    Request(String),
    /// Subsystem answered with a non-success status.
    #[error("subsystem returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// Response body did not match the expected schema.
    #[error("subsystem response parse error: {0}")]
    Parse(String),
}

// ── Traits ──────────────────────────────────────────────────────

/// Long-term memory and identity store.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Fetch memory context for a session.
    async fn get_context(&self, request: ContextRequest) -> Result<ContextResponse, SubsystemError>;

    /// Submit a memory-update proposal. Fire-and-forget at the call site.
    async fn propose_memory(&self, proposal: MemoryProposal) -> Result<(), SubsystemError>;
}

/// Knowledge retrieval service.
#[async_trait]
pub trait RagService: Send + Sync {
    /// Search the knowledge base.
    async fn search_knowledge(
        &self,
        request: SearchRequest,
    ) -> Result<SearchResponse, SubsystemError>;
}

/// Client-side action executor.
#[async_trait]
pub trait ClientExecutor: Send + Sync {
    /// Execute an action on the user's client device.
    async fn execute_action(&self, request: ActionRequest)
        -> Result<ActionResponse, SubsystemError>;
}

/// Operating-system action service.
#[async_trait]
pub trait OpsService: Send + Sync {
    /// Execute a host-level system action.
    async fn execute_system_action(
        &self,
        request: ActionRequest,
    ) -> Result<ActionResponse, SubsystemError>;
}
