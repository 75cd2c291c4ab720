//! DAG executor -- mechanical tool dispatch with failure handling.
//!
//! Walks the plan in topological order with a ready queue. Each step passes
//! the arbiter gate and the condition gate before dispatch; dispatch runs
//! under a per-attempt deadline with a fixed retry budget. Exactly one
//! [`ExecutionResult`] is emitted per reached step, in execution order.
//!
//! Halt semantics: a FAILED or AWAITING_CONFIRMATION step stops the whole
//! traversal; a DENIED step only starves its own dependents; a SKIPPED
//! step advances them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::registry::{self, Destination};
use crate::subsystems::{
    ActionRequest, ClientExecutor, ContextRequest, MemoryService, OpsService, RagChunk,
    RagService, SearchRequest,
};
use crate::types::{
    ArbiterDecision, ExecutionResult, ExecutionStatus, PlannerDag, PlannerStep, Verdict,
};

/// Retries allowed after the first attempt (3 attempts total).
pub const RETRY_BUDGET: u32 = 2;

/// Per-attempt soft deadline; a missed deadline consumes a retry.
pub const STEP_DEADLINE: Duration = Duration::from_secs(5);

/// Typed payload of a dispatched step, consumed by the analyst.
#[derive(Debug, Clone, Serialize)]
pub enum StepPayload {
    /// Memory retrieval output.
    Memory {
        /// Natural-language memory summaries.
        summaries: Vec<String>,
    },
    /// Knowledge search output.
    Rag {
        /// Whether the search call itself succeeded.
        success: bool,
        /// Retrieved chunks.
        chunks: Vec<RagChunk>,
    },
    /// Client or ops action output.
    Tool {
        /// Whether the action succeeded.
        success: bool,
        /// Tool output; empty on failure.
        output: String,
        /// Error message; empty on success.
        error: String,
    },
    /// Synthetic error entry for an unrecoverable step.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl StepPayload {
    /// Whether this payload counts as a successful dispatch.
    fn succeeded(&self) -> bool {
        match self {
            Self::Memory { .. } | Self::Rag { .. } => true,
            Self::Tool { success, .. } => *success,
            Self::Error { .. } => false,
        }
    }

    /// Last error message carried by a failed payload.
    fn error_message(&self) -> String {
        match self {
            Self::Tool { error, .. } => error.clone(),
            Self::Error { message } => message.clone(),
            _ => String::new(),
        }
    }

    /// Stringified output for the standardized result.
    fn raw_output(&self) -> String {
        match self {
            Self::Memory { summaries } => serde_json::to_string(summaries).unwrap_or_default(),
            Self::Rag { chunks, .. } => serde_json::to_string(chunks).unwrap_or_default(),
            Self::Tool { output, .. } => output.clone(),
            Self::Error { .. } => String::new(),
        }
    }
}

/// One reached step: its typed payload, when dispatch happened.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Step the payload belongs to.
    pub step_id: String,
    /// Tool the step named.
    pub tool_id: String,
    /// Typed dispatch payload.
    pub payload: StepPayload,
}

/// Everything a traversal produced.
///
/// `results` is the standardized sequence handed to narration; `outcomes`
/// is the typed stream the analyst reads. Gated steps (denied, awaiting
/// confirmation, skipped) appear only in `results`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// One standardized result per reached step, in execution order.
    pub results: Vec<ExecutionResult>,
    /// Typed payloads for dispatched steps, in execution order.
    pub outcomes: Vec<StepOutcome>,
}

/// Topological scheduler dispatching plan steps to the subsystems.
pub struct DagExecutor {
    memory: Arc<dyn MemoryService>,
    rag: Arc<dyn RagService>,
    client: Arc<dyn ClientExecutor>,
    ops: Arc<dyn OpsService>,
}

impl DagExecutor {
    /// Create an executor over the four downstream subsystems.
    pub fn new(
        memory: Arc<dyn MemoryService>,
        rag: Arc<dyn RagService>,
        client: Arc<dyn ClientExecutor>,
        ops: Arc<dyn OpsService>,
    ) -> Self {
        Self {
            memory,
            rag,
            client,
            ops,
        }
    }

    /// Execute a validated DAG under the given arbiter decisions.
    ///
    /// `session_id` is forwarded to memory retrievals.
    pub async fn execute(
        &self,
        dag: &PlannerDag,
        decisions: &[ArbiterDecision],
        session_id: &str,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        let verdicts: HashMap<&str, &ArbiterDecision> =
            decisions.iter().map(|d| (d.step_id.as_str(), d)).collect();
        let steps_map: HashMap<&str, &PlannerStep> =
            dag.steps.iter().map(|s| (s.step_id.as_str(), s)).collect();

        // Forward adjacency and in-degrees over declared dependencies.
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for step in &dag.steps {
            adj.entry(step.step_id.as_str()).or_default();
            in_degree.insert(step.step_id.as_str(), 0);
        }
        for step in &dag.steps {
            for dep in &step.intent.depends_on {
                if steps_map.contains_key(dep.as_str()) {
                    adj.entry(dep.as_str())
                        .or_default()
                        .push(step.step_id.as_str());
                    if let Some(d) = in_degree.get_mut(step.step_id.as_str()) {
                        *d = d.saturating_add(1);
                    }
                }
            }
        }

        let mut queue: VecDeque<&str> = dag
            .steps
            .iter()
            .filter(|s| in_degree.get(s.step_id.as_str()) == Some(&0))
            .map(|s| s.step_id.as_str())
            .collect();

        // step_id -> success flag, for condition evaluation.
        let mut completed: HashMap<String, bool> = HashMap::new();

        while let Some(current_id) = queue.pop_front() {
            let Some(step) = steps_map.get(current_id) else {
                continue;
            };
            let tool_id = step.intent.action_id.as_str();

            // Arbiter gate.
            if let Some(decision) = verdicts.get(current_id) {
                match decision.verdict {
                    Verdict::Deny => {
                        info!(step_id = current_id, tool_id, "step denied by arbiter");
                        let mut result =
                            ExecutionResult::bare(current_id, tool_id, ExecutionStatus::Denied);
                        result.decision_reason = decision.reason.clone();
                        report.results.push(result);
                        completed.insert(current_id.to_owned(), false);
                        // Successors starve: their in-degree never reaches zero.
                        continue;
                    }
                    Verdict::Confirm => {
                        info!(
                            step_id = current_id,
                            tool_id, "step awaits confirmation, halting pipeline"
                        );
                        let mut result = ExecutionResult::bare(
                            current_id,
                            tool_id,
                            ExecutionStatus::AwaitingConfirmation,
                        );
                        result.decision_reason = decision.reason.clone();
                        report.results.push(result);
                        return report;
                    }
                    Verdict::Allow => {}
                }
            }

            // Condition gate, fail-closed.
            if let Some(condition) = step.intent.condition.as_deref() {
                if !condition.is_empty() && !evaluate_condition(condition, &completed) {
                    info!(step_id = current_id, condition, "condition false, skipping step");
                    report.results.push(ExecutionResult::bare(
                        current_id,
                        tool_id,
                        ExecutionStatus::Skipped,
                    ));
                    completed.insert(current_id.to_owned(), true);
                    advance(current_id, &adj, &mut in_degree, &mut queue);
                    continue;
                }
            }

            // Dispatch with retries.
            let payload = self.dispatch_with_retries(step, session_id).await;

            if payload.succeeded() {
                let mut result =
                    ExecutionResult::bare(current_id, tool_id, ExecutionStatus::Executed);
                result.raw_output = payload.raw_output();
                report.results.push(result);
                report.outcomes.push(StepOutcome {
                    step_id: current_id.to_owned(),
                    tool_id: tool_id.to_owned(),
                    payload,
                });
                completed.insert(current_id.to_owned(), true);
                advance(current_id, &adj, &mut in_degree, &mut queue);
            } else {
                let message = payload.error_message();
                warn!(step_id = current_id, error = %message, "step failed, halting pipeline");
                let mut result = ExecutionResult::bare(current_id, tool_id, ExecutionStatus::Failed);
                result.error = message.clone();
                report.results.push(result);
                report.outcomes.push(StepOutcome {
                    step_id: current_id.to_owned(),
                    tool_id: tool_id.to_owned(),
                    payload: StepPayload::Error { message },
                });
                completed.insert(current_id.to_owned(), false);
                return report;
            }
        }

        report
    }

    /// Run the dispatch up to `1 + RETRY_BUDGET` times under the step deadline.
    async fn dispatch_with_retries(&self, step: &PlannerStep, session_id: &str) -> StepPayload {
        let mut attempts: u32 = 0;
        loop {
            let started = Instant::now();
            let payload = match timeout(STEP_DEADLINE, self.dispatch_step(step, session_id)).await
            {
                Ok(payload) => payload,
                Err(_) => {
                    let elapsed_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    warn!(step_id = %step.step_id, elapsed_ms, "step deadline exceeded");
                    StepPayload::Error {
                        message: format!(
                            "step '{}' exceeded the {}s deadline",
                            step.step_id,
                            STEP_DEADLINE.as_secs()
                        ),
                    }
                }
            };

            if payload.succeeded() || attempts >= RETRY_BUDGET {
                return payload;
            }
            attempts = attempts.saturating_add(1);
            info!(step_id = %step.step_id, attempt = attempts, "retrying failed step");
        }
    }

    /// Route one step to its destination subsystem.
    async fn dispatch_step(&self, step: &PlannerStep, session_id: &str) -> StepPayload {
        let action_id = step.intent.action_id.as_str();
        let Some(spec) = registry::lookup(action_id) else {
            return StepPayload::Error {
                message: format!("unknown action: {action_id}"),
            };
        };

        match spec.destination {
            Destination::Memory => {
                let request = ContextRequest {
                    session_id: session_id.to_owned(),
                    entities: Vec::new(),
                };
                match self.memory.get_context(request).await {
                    Ok(ctx) => StepPayload::Memory {
                        summaries: ctx.memory_summaries,
                    },
                    Err(e) => StepPayload::Error {
                        message: e.to_string(),
                    },
                }
            }
            Destination::Rag => {
                let request = SearchRequest {
                    query: step.description.clone(),
                    top_k: 3,
                };
                match self.rag.search_knowledge(request).await {
                    Ok(found) => StepPayload::Rag {
                        success: true,
                        chunks: found.chunks,
                    },
                    Err(e) => StepPayload::Error {
                        message: e.to_string(),
                    },
                }
            }
            Destination::Client => {
                let request = ActionRequest {
                    action_id: action_id.to_owned(),
                    params: step.intent.params.clone(),
                };
                match self.client.execute_action(request).await {
                    Ok(resp) => StepPayload::Tool {
                        success: resp.success,
                        output: resp.output,
                        error: resp.error,
                    },
                    Err(e) => StepPayload::Error {
                        message: e.to_string(),
                    },
                }
            }
            Destination::Ops => {
                let request = ActionRequest {
                    action_id: action_id.to_owned(),
                    params: step.intent.params.clone(),
                };
                match self.ops.execute_system_action(request).await {
                    Ok(resp) => StepPayload::Tool {
                        success: resp.success,
                        output: resp.output,
                        error: resp.error,
                    },
                    Err(e) => StepPayload::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}

/// Decrement successor in-degrees; enqueue the ones that become ready.
fn advance<'a>(
    current: &str,
    adj: &HashMap<&'a str, Vec<&'a str>>,
    in_degree: &mut HashMap<&'a str, usize>,
    queue: &mut VecDeque<&'a str>,
) {
    for &next in adj.get(current).map(Vec::as_slice).unwrap_or_default() {
        if let Some(d) = in_degree.get_mut(next) {
            *d = d.saturating_sub(1);
            if *d == 0 {
                queue.push_back(next);
            }
        }
    }
}

/// Fail-closed condition evaluation.
///
/// The condition references prior steps by substring. True iff at least one
/// completed step id appears in the string and every one that appears
/// succeeded. No referenced completion means false.
fn evaluate_condition(condition: &str, completed: &HashMap<String, bool>) -> bool {
    let mut referenced = false;
    for (step_id, success) in completed {
        if condition.contains(step_id.as_str()) {
            referenced = true;
            if !success {
                return false;
            }
        }
    }
    referenced
}
