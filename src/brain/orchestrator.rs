//! Orchestrator -- composes the pipeline for each incoming message.
//!
//! Per message: route intent, fetch memory context, then loop
//! plan → arbitrate → execute → analyze until the analyst is satisfied or
//! the iteration budget runs out. Memory proposals are dispatched
//! fire-and-forget before narration; the narrator sees only the
//! standardized result packet.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::brain::admission::MemoryAdmissionController;
use crate::brain::analyst::SemanticAnalyst;
use crate::brain::arbiter::DecisionArbiter;
use crate::brain::executor::{DagExecutor, StepOutcome};
use crate::brain::persona::PersonaGenerator;
use crate::brain::planner::TaskPlanner;
use crate::brain::router::IntentRouter;
use crate::subsystems::{ContextRequest, ContextResponse, MemoryService};
use crate::types::{BrainResponse, ExecutionResult, PacketContext, ResultPacket, UserMessage};

/// Maximum planning iterations per message.
pub const MAX_ITERATIONS: usize = 3;

/// Feedback paragraph injected into replanning prompts.
const INSUFFICIENCY_FEEDBACK: &str = "Initial search returned no high-confidence results.";

/// The five-stage cognition pipeline with its adaptive loop.
pub struct Orchestrator {
    router: IntentRouter,
    planner: TaskPlanner,
    arbiter: DecisionArbiter,
    executor: DagExecutor,
    analyst: SemanticAnalyst,
    admission: MemoryAdmissionController,
    persona: PersonaGenerator,
    memory: Arc<dyn MemoryService>,
}

impl Orchestrator {
    /// Wire the pipeline stages together.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router: IntentRouter,
        planner: TaskPlanner,
        arbiter: DecisionArbiter,
        executor: DagExecutor,
        analyst: SemanticAnalyst,
        admission: MemoryAdmissionController,
        persona: PersonaGenerator,
        memory: Arc<dyn MemoryService>,
    ) -> Self {
        Self {
            router,
            planner,
            arbiter,
            executor,
            analyst,
            admission,
            persona,
            memory,
        }
    }

    /// Run one message through the full pipeline.
    ///
    /// Never fails outward: internal errors degrade to narrated summaries
    /// or deterministic fallbacks.
    pub async fn handle_message(&self, message: &UserMessage) -> BrainResponse {
        let pipeline_id = Uuid::new_v4();
        let intent = self.router.route(&message.text);
        info!(%pipeline_id, session_id = %message.session_id, ?intent, "processing message");

        let memory_context = match self
            .memory
            .get_context(ContextRequest {
                session_id: message.session_id.clone(),
                entities: Vec::new(),
            })
            .await
        {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(%pipeline_id, error = %e, "memory context unavailable, continuing without");
                ContextResponse::default()
            }
        };

        let mut all_results: Vec<ExecutionResult> = Vec::new();
        let mut all_outcomes: Vec<StepOutcome> = Vec::new();
        let mut summary = String::new();
        let mut feedback: Option<&str> = None;

        for iteration in 1..=MAX_ITERATIONS {
            let dag = self
                .planner
                .execute_plan(intent, &message.text, feedback)
                .await;
            if dag.is_empty() {
                // Conversational path: nothing to execute or analyze.
                break;
            }

            let decisions = self.arbiter.evaluate_plan(&dag);
            let report = self
                .executor
                .execute(&dag, &decisions, &message.session_id)
                .await;
            info!(
                %pipeline_id,
                iteration,
                steps = dag.steps.len(),
                results = report.results.len(),
                "execution pass complete"
            );

            all_results.extend(report.results);
            all_outcomes.extend(report.outcomes);

            let analysis = self.analyst.synthesize(&all_outcomes);
            summary = analysis.summary;

            if !analysis.needs_more_data {
                break;
            }
            info!(%pipeline_id, iteration, "analyst reports insufficiency, replanning");
            feedback = Some(INSUFFICIENCY_FEEDBACK);
        }

        // Memory admission, fire-and-forget before narration.
        for proposal in self.admission.evaluate(message, &summary) {
            let memory = Arc::clone(&self.memory);
            let id = pipeline_id;
            tokio::spawn(async move {
                if let Err(e) = memory.propose_memory(proposal).await {
                    warn!(pipeline_id = %id, error = %e, "memory proposal dispatch failed");
                }
            });
        }

        let packet = ResultPacket {
            user_query: message.text.clone(),
            results: all_results,
            context: PacketContext {
                mode: message.context.mode.clone(),
                location: message.context.location.clone(),
            },
        };

        let text = self.persona.generate(&packet, &memory_context).await;
        info!(%pipeline_id, chars = text.len(), "response ready");

        BrainResponse {
            text,
            is_partial: false,
        }
    }
}
