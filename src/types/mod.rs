//! Core data model for the cognition pipeline.
//!
//! Every entity here lives for exactly one message pipeline invocation,
//! except [`MemoryProposal`] which is handed to the memory subsystem and
//! forgotten. All wire-facing types are serde-derived with proto3-style
//! optionality: string fields are present-but-empty rather than `Option`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Inbound message ─────────────────────────────────────────────

/// Situational context attached to an inbound user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContext {
    /// Interaction mode reported by the client (e.g. "voice", "text").
    pub mode: String,
    /// Coarse location tag reported by the client.
    pub location: String,
    /// Client-side timestamp of the message.
    pub timestamp: DateTime<Utc>,
    /// Free-form key/value metadata. Ordered map so the context hash is
    /// stable across processes.
    pub metadata: BTreeMap<String, String>,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self {
            mode: String::new(),
            location: String::new(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }
}

/// A single user utterance -- the immutable input to one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    /// Conversation/session identifier.
    pub session_id: String,
    /// Raw message text.
    pub text: String,
    /// Situational context.
    #[serde(default)]
    pub context: MessageContext,
}

/// Response emitted on the stream, one per inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainResponse {
    /// Narrated response text.
    pub text: String,
    /// Always `false` -- responses are emitted whole.
    pub is_partial: bool,
}

// ── Intent ──────────────────────────────────────────────────────

/// Coarse classification of a user utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Small talk; no tools involved.
    Converse,
    /// Needs fresh external knowledge.
    RealtimeSearch,
    /// Wants a concrete action on the client or host.
    ToolAction,
    /// Asks about remembered state or preferences.
    MemoryQuery,
}

// ── Plan ────────────────────────────────────────────────────────

/// The action a plan step wants to perform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionIntent {
    /// Tool identifier; must exist in the tool registry.
    pub action_id: String,
    /// Tool parameters, stringly typed on the wire.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Step ids this step depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Optional gating expression: the step runs only if every prior step
    /// whose id appears in the string succeeded.
    #[serde(default)]
    pub condition: Option<String>,
}

/// One node of a planner DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerStep {
    /// Identifier unique within the DAG.
    pub step_id: String,
    /// Human-readable purpose; doubles as the query for knowledge search.
    pub description: String,
    /// The action to perform.
    pub intent: ActionIntent,
}

/// A plan of tool invocations, shaped as a dependency DAG.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerDag {
    /// Short statement of what the plan tries to achieve.
    pub goal: String,
    /// Steps in planner order.
    #[serde(default)]
    pub steps: Vec<PlannerStep>,
}

impl PlannerDag {
    /// An empty conversational DAG -- the planner's output for CONVERSE.
    pub fn conversational() -> Self {
        Self {
            goal: "Conversational".to_owned(),
            steps: Vec::new(),
        }
    }

    /// True when the plan carries no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ── Arbitration ─────────────────────────────────────────────────

/// Policy verdict for a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Step may execute.
    Allow,
    /// Step is refused; its branch starves.
    Deny,
    /// Step needs manual confirmation; the pipeline halts.
    Confirm,
}

/// The arbiter's ruling on one plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterDecision {
    /// Step the ruling applies to.
    pub step_id: String,
    /// Tool named by the step.
    pub tool_id: String,
    /// The ruling.
    pub verdict: Verdict,
    /// Rule confidence in `[0, 1]`.
    pub confidence: f32,
    /// Reason string; empty for plain allows.
    pub reason: String,
}

// ── Execution ───────────────────────────────────────────────────

/// Terminal status of a reached plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Dispatch succeeded.
    Executed,
    /// Retries exhausted; the pipeline halted here.
    Failed,
    /// Arbiter refused the step.
    Denied,
    /// Arbiter demanded confirmation; the pipeline halted here.
    AwaitingConfirmation,
    /// Condition gate evaluated false; dependents still advance.
    Skipped,
}

impl ExecutionStatus {
    /// Wire/log name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executed => "EXECUTED",
            Self::Failed => "FAILED",
            Self::Denied => "DENIED",
            Self::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standardized outcome of one reached plan step.
///
/// This is the only execution shape allowed to cross into narration.
/// Empty strings mean "absent".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Step this result belongs to.
    pub step_id: String,
    /// Tool the step named.
    pub tool_id: String,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Stringified tool output, for EXECUTED steps.
    pub raw_output: String,
    /// Last error message, for FAILED steps.
    pub error: String,
    /// Arbiter reason, for DENIED / AWAITING_CONFIRMATION steps.
    pub decision_reason: String,
}

impl ExecutionResult {
    /// A result carrying only a status, with all detail fields empty.
    pub fn bare(step_id: &str, tool_id: &str, status: ExecutionStatus) -> Self {
        Self {
            step_id: step_id.to_owned(),
            tool_id: tool_id.to_owned(),
            status,
            raw_output: String::new(),
            error: String::new(),
            decision_reason: String::new(),
        }
    }
}

// ── Narration contract ──────────────────────────────────────────

/// Context slice exposed to the narrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacketContext {
    /// Interaction mode from the originating message.
    pub mode: String,
    /// Location tag from the originating message.
    pub location: String,
}

/// Sole input to the narrator. No raw tool objects cross this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPacket {
    /// The user's original query.
    pub user_query: String,
    /// Standardized execution results in traversal order.
    pub results: Vec<ExecutionResult>,
    /// Narration-safe context.
    pub context: PacketContext,
}

// ── Memory admission ────────────────────────────────────────────

/// A proposed long-term memory adjustment, dispatched fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProposal {
    /// Entity the adjustment applies to.
    pub entity_id: String,
    /// Memory dimension being nudged.
    pub dimension: String,
    /// Signed adjustment magnitude.
    pub delta: f32,
    /// Deterministic hash of the originating context.
    pub context_hash: String,
    /// Proposal confidence, clamped to `[0, 1]`.
    pub confidence: f32,
}

impl MemoryProposal {
    /// Build a proposal for the `"user"` entity, clamping confidence.
    pub fn for_user(dimension: &str, delta: f32, context_hash: &str, confidence: f32) -> Self {
        Self {
            entity_id: "user".to_owned(),
            dimension: dimension.to_owned(),
            delta,
            context_hash: context_hash.to_owned(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
