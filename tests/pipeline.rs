#![allow(missing_docs)]
// End-to-end pipeline scenarios: route -> plan -> arbitrate -> execute ->
// analyze -> admit -> narrate, against mocked subsystems and a scripted LLM.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cortex::brain::admission::MemoryAdmissionController;
use cortex::brain::analyst::SemanticAnalyst;
use cortex::brain::arbiter::DecisionArbiter;
use cortex::brain::executor::DagExecutor;
use cortex::brain::orchestrator::Orchestrator;
use cortex::brain::persona::PersonaGenerator;
use cortex::brain::planner::TaskPlanner;
use cortex::brain::router::IntentRouter;
use cortex::llm::{GenerateRequest, LlmClient, LlmError};
use cortex::subsystems::{
    ActionRequest, ActionResponse, ClientExecutor, ContextRequest, ContextResponse, MemoryService,
    OpsService, RagChunk, RagService, SearchRequest, SearchResponse, SubsystemError,
};
use cortex::types::{MemoryProposal, MessageContext, UserMessage};

// ── Test fixtures ──

/// Scripted LLM: pops queued responses, records every prompt.
struct ScriptedLlm {
    responses: Mutex<Vec<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn answering(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_owned())])
    }

    fn unavailable() -> Arc<Self> {
        Self::new(vec![])
    }

    fn repeating(text: &str, times: usize) -> Arc<Self> {
        Self::new((0..times).map(|_| Ok(text.to_owned())).collect())
    }

    fn call_count(&self) -> usize {
        self.prompts.lock().expect("test lock").len()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts
            .lock()
            .expect("test lock")
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        self.prompts.lock().expect("test lock").push(request.prompt);
        let mut queue = self.responses.lock().expect("test lock");
        if queue.is_empty() {
            Err(LlmError::HttpStatus {
                status: 500,
                body: "scripted outage".to_owned(),
            })
        } else {
            queue.remove(0)
        }
    }
}

/// Memory mock: fixed context, records proposals.
struct MockMemory {
    summaries: Vec<String>,
    proposals: Mutex<Vec<MemoryProposal>>,
    context_calls: AtomicUsize,
}

impl MockMemory {
    fn with_summaries(summaries: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            summaries: summaries.iter().map(|s| (*s).to_owned()).collect(),
            proposals: Mutex::new(Vec::new()),
            context_calls: AtomicUsize::new(0),
        })
    }

    fn recorded_dimensions(&self) -> Vec<String> {
        let mut dims: Vec<String> = self
            .proposals
            .lock()
            .expect("test lock")
            .iter()
            .map(|p| p.dimension.clone())
            .collect();
        dims.sort();
        dims
    }
}

#[async_trait]
impl MemoryService for MockMemory {
    async fn get_context(
        &self,
        _request: ContextRequest,
    ) -> Result<ContextResponse, SubsystemError> {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ContextResponse {
            memory_summaries: self.summaries.clone(),
            preferences: Default::default(),
        })
    }

    async fn propose_memory(&self, proposal: MemoryProposal) -> Result<(), SubsystemError> {
        self.proposals.lock().expect("test lock").push(proposal);
        Ok(())
    }
}

/// RAG mock returning the same response on every call.
struct MockRag {
    chunks: Vec<RagChunk>,
    calls: AtomicUsize,
}

impl MockRag {
    fn with_chunks(chunks: Vec<RagChunk>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            calls: AtomicUsize::new(0),
        })
    }

    fn empty() -> Arc<Self> {
        Self::with_chunks(Vec::new())
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RagService for MockRag {
    async fn search_knowledge(
        &self,
        _request: SearchRequest,
    ) -> Result<SearchResponse, SubsystemError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchResponse {
            chunks: self.chunks.clone(),
        })
    }
}

/// Client mock recording dispatched actions.
struct MockClient {
    requests: Mutex<Vec<ActionRequest>>,
}

impl MockClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.requests.lock().expect("test lock").len()
    }
}

#[async_trait]
impl ClientExecutor for MockClient {
    async fn execute_action(
        &self,
        request: ActionRequest,
    ) -> Result<ActionResponse, SubsystemError> {
        let action = request.action_id.clone();
        self.requests.lock().expect("test lock").push(request);
        Ok(ActionResponse {
            success: true,
            output: format!("done: {action}"),
            error: String::new(),
        })
    }
}

struct MockOps;

#[async_trait]
impl OpsService for MockOps {
    async fn execute_system_action(
        &self,
        _request: ActionRequest,
    ) -> Result<ActionResponse, SubsystemError> {
        Ok(ActionResponse {
            success: true,
            output: "uptime 4d".to_owned(),
            error: String::new(),
        })
    }
}

struct Fixture {
    orchestrator: Orchestrator,
    planner_llm: Arc<ScriptedLlm>,
    narrator_llm: Arc<ScriptedLlm>,
    memory: Arc<MockMemory>,
    rag: Arc<MockRag>,
    client: Arc<MockClient>,
}

fn fixture(
    planner_llm: Arc<ScriptedLlm>,
    narrator_llm: Arc<ScriptedLlm>,
    memory: Arc<MockMemory>,
    rag: Arc<MockRag>,
) -> Fixture {
    let client = MockClient::new();
    let memory_dyn: Arc<dyn MemoryService> = Arc::clone(&memory) as Arc<dyn MemoryService>;

    let orchestrator = Orchestrator::new(
        IntentRouter::new(),
        TaskPlanner::new(
            Arc::clone(&planner_llm) as Arc<dyn LlmClient>,
            "phi3:3.8b",
        ),
        DecisionArbiter,
        DagExecutor::new(
            Arc::clone(&memory_dyn),
            Arc::clone(&rag) as Arc<dyn RagService>,
            Arc::clone(&client) as Arc<dyn ClientExecutor>,
            Arc::new(MockOps),
        ),
        SemanticAnalyst,
        MemoryAdmissionController,
        PersonaGenerator::new(Arc::clone(&narrator_llm) as Arc<dyn LlmClient>, "phi3:3.8b"),
        memory_dyn,
    );

    Fixture {
        orchestrator,
        planner_llm,
        narrator_llm,
        memory,
        rag,
        client,
    }
}

fn message(text: &str) -> UserMessage {
    UserMessage {
        session_id: "session-1".to_owned(),
        text: text.to_owned(),
        context: MessageContext {
            mode: "text".to_owned(),
            location: "home".to_owned(),
            metadata: BTreeMap::new(),
            ..MessageContext::default()
        },
    }
}

/// Let fire-and-forget proposal tasks settle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

const WEATHER_PLAN: &str = r#"{"goal":"Check weather","steps":[
    {"step_id":"GET_CTX","action_id":"MEMORY_GET","description":"session context","params":{},"depends_on":[]},
    {"step_id":"SEARCH","action_id":"RAG_SEARCH","description":"current weather","params":{},"depends_on":["GET_CTX"]}
]}"#;

const DELETE_PLAN: &str = r#"{"goal":"Delete file","steps":[
    {"step_id":"DEL","action_id":"FS_DELETE","description":"delete foo","params":{"path":"foo"},"depends_on":[]}
]}"#;

const NEWS_PLAN: &str = r#"{"goal":"Find news","steps":[
    {"step_id":"SEARCH","action_id":"RAG_SEARCH","description":"latest news","params":{},"depends_on":[]}
]}"#;

// ── Scenarios ──

#[tokio::test]
async fn test_pure_chat() {
    let f = fixture(
        ScriptedLlm::unavailable(),
        ScriptedLlm::answering("Hello! What can I do for you?"),
        MockMemory::with_summaries(&[]),
        MockRag::empty(),
    );

    let response = f.orchestrator.handle_message(&message("hello")).await;
    settle().await;

    assert_eq!(response.text, "Hello! What can I do for you?");
    assert!(!response.is_partial);
    assert_eq!(
        f.planner_llm.call_count(),
        0,
        "CONVERSE must not invoke the planner LLM"
    );
    assert_eq!(
        f.narrator_llm.call_count(),
        1,
        "chat mode makes exactly one narration call"
    );
    assert!(
        f.memory.recorded_dimensions().is_empty(),
        "no memory proposals for small talk"
    );
}

#[tokio::test]
async fn test_knowledge_search() {
    let f = fixture(
        ScriptedLlm::answering(WEATHER_PLAN),
        ScriptedLlm::unavailable(), // Narration falls back to the literal log.
        MockMemory::with_summaries(&["User dislikes rain"]),
        MockRag::with_chunks(vec![RagChunk {
            text: "Rain expected this afternoon".to_owned(),
            source: "weather.example".to_owned(),
            score: 0.93,
        }]),
    );

    let response = f
        .orchestrator
        .handle_message(&message("what is the weather?"))
        .await;

    let log = &response.text;
    assert!(log.starts_with("LOG SUMMARY:"), "fallback log expected: {log}");
    assert!(log.contains("- Action: MEMORY_GET [EXECUTED]"));
    assert!(log.contains("- Action: RAG_SEARCH [EXECUTED]"));
    let memory_pos = log.find("MEMORY_GET").expect("memory line");
    let rag_pos = log.find("RAG_SEARCH").expect("rag line");
    assert!(
        memory_pos < rag_pos,
        "results must appear in dependency order"
    );
    assert!(log.contains("Rain expected this afternoon"));
    assert_eq!(f.planner_llm.call_count(), 1, "facts found, no replan");
    assert_eq!(f.rag.call_count(), 1);
    assert_eq!(
        f.memory.context_calls.load(Ordering::SeqCst),
        2,
        "one narrator-context fetch plus one MEMORY_GET dispatch"
    );
}

#[tokio::test]
async fn test_destructive_action_requires_confirmation() {
    let f = fixture(
        ScriptedLlm::answering(DELETE_PLAN),
        ScriptedLlm::unavailable(),
        MockMemory::with_summaries(&[]),
        MockRag::empty(),
    );

    let response = f
        .orchestrator
        .handle_message(&message("please delete the file foo"))
        .await;

    assert!(response.text.contains("FS_DELETE [AWAITING_CONFIRMATION]"));
    assert!(response
        .text
        .contains("Potentially destructive action requires manual confirmation."));
    assert_eq!(
        f.client.call_count(),
        0,
        "no side effects may reach the client before confirmation"
    );
}

#[tokio::test]
async fn test_insufficiency_replan_caps_at_three_iterations() {
    let f = fixture(
        ScriptedLlm::repeating(NEWS_PLAN, 3),
        ScriptedLlm::answering("I could not find anything current."),
        MockMemory::with_summaries(&[]),
        MockRag::empty(), // Searches succeed but return zero chunks.
    );

    let response = f
        .orchestrator
        .handle_message(&message("any news about rust?"))
        .await;

    assert_eq!(
        f.planner_llm.call_count(),
        3,
        "insufficiency replans until the iteration cap"
    );
    assert_eq!(f.rag.call_count(), 3);
    assert!(
        !f.planner_llm.prompt(0).contains("[SUPPLEMENTARY CONTEXT]"),
        "first attempt carries no feedback"
    );
    assert!(f.planner_llm.prompt(1).contains("[SUPPLEMENTARY CONTEXT]"));
    assert!(f
        .planner_llm
        .prompt(2)
        .contains("Initial search returned no high-confidence results."));
    assert_eq!(response.text, "I could not find anything current.");
}

#[tokio::test]
async fn test_planner_outage_falls_back_and_completes() {
    let f = fixture(
        ScriptedLlm::unavailable(), // 500 from the planner endpoint.
        ScriptedLlm::answering("Here is what I remember about you."),
        MockMemory::with_summaries(&["User works from home"]),
        MockRag::empty(),
    );

    let response = f
        .orchestrator
        .handle_message(&message("do you remember my setup?"))
        .await;

    assert_eq!(response.text, "Here is what I remember about you.");
    assert!(!response.is_partial);
    assert_eq!(
        f.planner_llm.call_count(),
        1,
        "fallback engages after the first failed call"
    );
    // One narrator call, fed by the fallback MEMORY_GET execution.
    assert_eq!(f.narrator_llm.call_count(), 1);
}

#[tokio::test]
async fn test_memory_proposals_dispatched_fire_and_forget() {
    let f = fixture(
        ScriptedLlm::unavailable(),
        ScriptedLlm::answering("Noted."),
        MockMemory::with_summaries(&[]),
        MockRag::empty(),
    );

    let _ = f
        .orchestrator
        .handle_message(&message("i like quiet music at night"))
        .await;
    settle().await;

    assert_eq!(
        f.memory.recorded_dimensions(),
        vec![
            "night_mode_sensitivity".to_owned(),
            "preference_affinity".to_owned()
        ]
    );
}

#[tokio::test]
async fn test_tool_action_lists_files_via_fallback() {
    let f = fixture(
        ScriptedLlm::unavailable(),
        ScriptedLlm::unavailable(),
        MockMemory::with_summaries(&[]),
        MockRag::empty(),
    );

    let response = f
        .orchestrator
        .handle_message(&message("list my files"))
        .await;

    assert!(response.text.contains("- Action: FS_LIST [EXECUTED]"));
    assert_eq!(f.client.call_count(), 1, "fallback FS_LIST reached the client");
}
