//! Task planner -- turns an intent and user text into a validated DAG.
//!
//! The planning LLM is held to strict JSON output; anything that fails
//! extraction, parsing, or validation is replaced by a deterministic
//! fallback plan so the pipeline always makes progress.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::brain::validator;
use crate::llm::{GenerateRequest, LlmClient};
use crate::registry;
use crate::types::{ActionIntent, Intent, PlannerDag, PlannerStep};

/// Deadline for the planning LLM call.
const PLANNER_TIMEOUT: Duration = Duration::from_secs(20);

/// Stop sequences that terminate stray narration.
const PLANNER_STOP: &[&str] = &["[USER", "Observation:", "###"];

/// JSON keys the repair pass will quote when they appear bare.
const REPAIRABLE_KEYS: &str = "goal|steps|step_id|description|action_id|params|depends_on|condition";

/// LLM-driven planner with strict JSON enforcement and a static fallback.
pub struct TaskPlanner {
    llm: Arc<dyn LlmClient>,
    model: String,
    key_repair: Regex,
}

impl TaskPlanner {
    /// Create a planner calling `model` through the given client.
    pub fn new(llm: Arc<dyn LlmClient>, model: &str) -> Self {
        let pattern = format!(r#"([\{{,\[\s])({REPAIRABLE_KEYS})\s*:"#);
        Self {
            llm,
            model: model.to_owned(),
            key_repair: Regex::new(&pattern).expect("hard-coded repair pattern compiles"),
        }
    }

    /// Produce a plan for the message.
    ///
    /// CONVERSE short-circuits to an empty DAG. Any LLM, parse, or
    /// validation failure yields the fallback plan for the intent.
    pub async fn execute_plan(
        &self,
        intent: Intent,
        user_text: &str,
        feedback: Option<&str>,
    ) -> PlannerDag {
        if intent == Intent::Converse {
            return PlannerDag::conversational();
        }

        let prompt = self.build_prompt(user_text, feedback);
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            temperature: 0.0,
            num_predict: None,
            stop: PLANNER_STOP.iter().map(|s| (*s).to_owned()).collect(),
            timeout: PLANNER_TIMEOUT,
        };

        let raw = match self.llm.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "planner LLM call failed, using fallback plan");
                return fallback_dag(intent, user_text);
            }
        };

        let Some(plan_json) = self.extract_json(&raw) else {
            warn!("no JSON object in planner response, using fallback plan");
            return fallback_dag(intent, user_text);
        };

        let value: serde_json::Value = match serde_json::from_str(&plan_json) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "planner JSON unparseable, using fallback plan");
                return fallback_dag(intent, user_text);
            }
        };

        let dag = dag_from_json(&value);
        match validator::validate(&dag) {
            Ok(()) => {
                debug!(goal = %dag.goal, steps = dag.steps.len(), "planner produced valid DAG");
                dag
            }
            Err(e) => {
                warn!(reason = %e, "planner DAG rejected, using fallback plan");
                fallback_dag(intent, user_text)
            }
        }
    }

    /// Compose the planning prompt.
    fn build_prompt(&self, user_text: &str, feedback: Option<&str>) -> String {
        let registry_block = registry::tool_prompt();
        let feedback_block = match feedback {
            Some(f) => format!("\n[SUPPLEMENTARY CONTEXT]\nPrevious attempts were insufficient: {f}"),
            None => String::new(),
        };

        format!(
            "[IDENTITY]\n\
             You are the Executive Planner for Cortex. Convert the user message into a \
             directed acyclic graph of actionable steps.\n\n\
             {registry_block}\n\n\
             [CONSTRAINTS]\n\
             - MAX_NODES: 6\n\
             - MAX_DEPTH: 4\n\
             - Output ONLY a raw JSON object. No markdown fences, no conversational text.\n\
             - Keys must be double-quoted.\n\
             - Do NOT invent tools. Only use ids from the registry above.\n\
             - Every depends_on entry must match an existing step_id.\n\
             - In \"params\", use the exact keys the tool requires.\n\n\
             [SCHEMA]\n\
             {{\n\
             \x20 \"goal\": \"Brief description of intent\",\n\
             \x20 \"steps\": [\n\
             \x20   {{\n\
             \x20     \"step_id\": \"STEP_01\",\n\
             \x20     \"action_id\": \"TOOL_NAME\",\n\
             \x20     \"description\": \"Why we are doing this\",\n\
             \x20     \"params\": {{ \"key\": \"value\" }},\n\
             \x20     \"depends_on\": []\n\
             \x20   }}\n\
             \x20 ]\n\
             }}\n\n\
             [USER MESSAGE]\n\
             \"{user_text}\"{feedback_block}"
        )
    }

    /// Take the substring between the first `{` and the last `}` and
    /// repair known bare-identifier keys by quoting them.
    fn extract_json(&self, raw: &str) -> Option<String> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end < start {
            return None;
        }
        let candidate = raw.get(start..=end)?;
        Some(self.key_repair.replace_all(candidate, "$1\"$2\":").into_owned())
    }
}

/// Map a parsed JSON object onto a [`PlannerDag`], applying defaults for
/// missing fields. Unknown tools survive mapping and die in validation.
fn dag_from_json(value: &serde_json::Value) -> PlannerDag {
    let goal = value
        .get("goal")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Resolved")
        .to_owned();

    let steps = value
        .get("steps")
        .and_then(serde_json::Value::as_array)
        .map(|raw_steps| {
            raw_steps
                .iter()
                .enumerate()
                .map(|(i, s)| map_step(i, s))
                .collect()
        })
        .unwrap_or_default();

    PlannerDag { goal, steps }
}

fn map_step(index: usize, s: &serde_json::Value) -> PlannerStep {
    let step_id = s
        .get("step_id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("S_{index}"));

    let description = s
        .get("description")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("No description")
        .to_owned();

    let action_id = s
        .get("action_id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let params: BTreeMap<String, String> = s
        .get("params")
        .and_then(serde_json::Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), stringify_param(v)))
                .collect()
        })
        .unwrap_or_default();

    let depends_on: Vec<String> = s
        .get("depends_on")
        .and_then(serde_json::Value::as_array)
        .map(|deps| {
            deps.iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let condition = s
        .get("condition")
        .and_then(serde_json::Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_owned);

    PlannerStep {
        step_id,
        description,
        intent: ActionIntent {
            action_id,
            params,
            depends_on,
            condition,
        },
    }
}

/// Parameters arrive as arbitrary JSON scalars; the wire wants strings.
fn stringify_param(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    }
}

/// Deterministic minimal plan used when the LLM or validator fails.
pub fn fallback_dag(intent: Intent, user_text: &str) -> PlannerDag {
    let lower = user_text.to_lowercase();
    let mut steps = Vec::new();

    if intent == Intent::ToolAction && (lower.contains("list") || lower.contains("files")) {
        steps.push(PlannerStep {
            step_id: "FALLBACK_LIST".to_owned(),
            description: "List files for the user".to_owned(),
            intent: ActionIntent {
                action_id: "FS_LIST".to_owned(),
                params: BTreeMap::from([("path".to_owned(), ".".to_owned())]),
                ..ActionIntent::default()
            },
        });
    }

    if steps.is_empty() {
        steps.push(PlannerStep {
            step_id: "FALLBACK_QUERY".to_owned(),
            description: user_text.to_owned(),
            intent: ActionIntent {
                action_id: "MEMORY_GET".to_owned(),
                ..ActionIntent::default()
            },
        });
    }

    PlannerDag {
        goal: "Fallback Plan".to_owned(),
        steps,
    }
}
