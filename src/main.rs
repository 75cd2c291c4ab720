#![allow(missing_docs)]

//! Cortex service binary.
//!
//! Loads configuration, wires the pipeline stages to their remote
//! collaborators, and serves the chat stream.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cortex::brain::admission::MemoryAdmissionController;
use cortex::brain::analyst::SemanticAnalyst;
use cortex::brain::arbiter::DecisionArbiter;
use cortex::brain::executor::DagExecutor;
use cortex::brain::orchestrator::Orchestrator;
use cortex::brain::persona::PersonaGenerator;
use cortex::brain::planner::TaskPlanner;
use cortex::brain::router::IntentRouter;
use cortex::config::BrainConfig;
use cortex::llm::ollama::OllamaClient;
use cortex::llm::LlmClient;
use cortex::logging;
use cortex::server::{self, AppState};
use cortex::subsystems::remote::{
    HttpClientExecutor, HttpMemoryService, HttpOpsService, HttpRagService,
};
use cortex::subsystems::MemoryService;

/// Cognition orchestrator service.
#[derive(Debug, Parser)]
#[command(name = "cortex", version, about)]
struct Cli {
    /// Path to a TOML config file (default: ./config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BrainConfig::load_from(path)?,
        None => BrainConfig::load()?,
    };

    // Keep the guard alive for the life of the process.
    let _logging_guard = match &config.paths.logs_dir {
        Some(dir) => Some(logging::init_production(std::path::Path::new(dir))?),
        None => {
            logging::init_console();
            None
        }
    };

    info!("cortex starting");

    // Downstream collaborators.
    let memory: Arc<dyn MemoryService> =
        Arc::new(HttpMemoryService::new(&config.subsystems.memory_url));
    let rag = Arc::new(HttpRagService::new(&config.subsystems.rag_url));
    let client = Arc::new(HttpClientExecutor::new(&config.subsystems.client_url));
    let ops = Arc::new(HttpOpsService::new(&config.subsystems.ops_url));
    let llm: Arc<dyn LlmClient> = Arc::new(OllamaClient::new(&config.llm.base_url));

    // Pipeline stages.
    let orchestrator = Orchestrator::new(
        IntentRouter::new(),
        TaskPlanner::new(Arc::clone(&llm), &config.llm.planner_model),
        DecisionArbiter,
        DagExecutor::new(Arc::clone(&memory), rag, client, ops),
        SemanticAnalyst,
        MemoryAdmissionController,
        PersonaGenerator::new(llm, &config.llm.narrator_model),
        memory,
    );

    let state = Arc::new(AppState::new(orchestrator, config.server.workers));
    server::serve(&config.server.bind_addr, state).await?;

    info!("cortex shut down");
    Ok(())
}
