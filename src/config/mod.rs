//! Configuration loading and management.
//!
//! Loads from `./config.toml` (or `$CORTEX_CONFIG_PATH`). Environment
//! variables override file values; file values override defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Inbound server settings.
    pub server: ServerConfig,
    /// LLM endpoint settings.
    pub llm: LlmConfig,
    /// Downstream subsystem endpoints.
    pub subsystems: SubsystemConfig,
    /// Filesystem paths.
    pub paths: PathsConfig,
}

/// Inbound server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the chat stream binds to.
    pub bind_addr: String,
    /// Size of the bounded worker pool for concurrent streams.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:50051".to_owned(),
            workers: 16,
        }
    }
}

/// LLM endpoint settings shared by planner and narrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generate endpoint URL.
    pub base_url: String,
    /// Model used for plan synthesis.
    pub planner_model: String,
    /// Model used for narration.
    pub narrator_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/api/generate".to_owned(),
            planner_model: "phi3:3.8b".to_owned(),
            narrator_model: "phi3:3.8b".to_owned(),
        }
    }
}

/// Downstream subsystem endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubsystemConfig {
    /// Memory/identity store.
    pub memory_url: String,
    /// Knowledge retrieval service.
    pub rag_url: String,
    /// Client-side action executor.
    pub client_url: String,
    /// Operating-system action service.
    pub ops_url: String,
}

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            memory_url: "http://localhost:50053".to_owned(),
            rag_url: "http://localhost:50052".to_owned(),
            client_url: "http://localhost:50054".to_owned(),
            ops_url: "http://localhost:50055".to_owned(),
        }
    }
}

/// Filesystem paths.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// When set, JSON logs rotate daily in this directory.
    pub logs_dir: Option<String>,
}

impl BrainConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit file path, then apply env overrides.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: BrainConfig =
            toml::from_str(&contents).context("failed to parse config TOML")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let path = Self::config_path(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: BrainConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(BrainConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("CORTEX_CONFIG_PATH") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from("config.toml"),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CORTEX_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = env("CORTEX_WORKERS") {
            match v.parse() {
                Ok(n) => self.server.workers = n,
                Err(_) => tracing::warn!(
                    var = "CORTEX_WORKERS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("CORTEX_LLM_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env("CORTEX_PLANNER_MODEL") {
            self.llm.planner_model = v;
        }
        if let Some(v) = env("CORTEX_NARRATOR_MODEL") {
            self.llm.narrator_model = v;
        }

        if let Some(v) = env("CORTEX_MEMORY_URL") {
            self.subsystems.memory_url = v;
        }
        if let Some(v) = env("CORTEX_RAG_URL") {
            self.subsystems.rag_url = v;
        }
        if let Some(v) = env("CORTEX_CLIENT_URL") {
            self.subsystems.client_url = v;
        }
        if let Some(v) = env("CORTEX_OPS_URL") {
            self.subsystems.ops_url = v;
        }

        if let Some(v) = env("CORTEX_LOGS_DIR") {
            self.paths.logs_dir = Some(v);
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: BrainConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}
