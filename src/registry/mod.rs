//! Static tool whitelist -- the single source of truth for allowed actions.
//!
//! Maps each tool id to the downstream subsystem that serves it and the
//! parameter keys the planner must supply. Built once, read-only afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Downstream subsystem that serves a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Long-term memory and identity store.
    Memory,
    /// Knowledge retrieval (RAG) service.
    Rag,
    /// Client-side action executor.
    Client,
    /// Operating-system action service.
    Ops,
}

/// Registry entry for one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    /// Subsystem the executor dispatches this tool to.
    pub destination: Destination,
    /// Exact parameter keys the planner must emit for this tool.
    pub required_params: &'static [&'static str],
    /// One-line summary shown to the planner LLM.
    pub summary: &'static str,
}

const TOOLS: &[(&str, ToolSpec)] = &[
    (
        "MEMORY_GET",
        ToolSpec {
            destination: Destination::Memory,
            required_params: &[],
            summary: "retrieve session memory and preferences",
        },
    ),
    (
        "RAG_SEARCH",
        ToolSpec {
            destination: Destination::Rag,
            required_params: &[],
            summary: "search the knowledge base (top 3 chunks)",
        },
    ),
    (
        "FS_LIST",
        ToolSpec {
            destination: Destination::Client,
            required_params: &["path"],
            summary: "list directory entries on the client",
        },
    ),
    (
        "FS_READ",
        ToolSpec {
            destination: Destination::Client,
            required_params: &["path"],
            summary: "read a file on the client",
        },
    ),
    (
        "FS_EXISTS",
        ToolSpec {
            destination: Destination::Client,
            required_params: &["path"],
            summary: "test whether a path exists",
        },
    ),
    (
        "FS_MOVE",
        ToolSpec {
            destination: Destination::Client,
            required_params: &["src", "dst"],
            summary: "move or rename a client file",
        },
    ),
    (
        "FS_DELETE",
        ToolSpec {
            destination: Destination::Client,
            required_params: &["path"],
            summary: "delete a client file",
        },
    ),
    (
        "APP_OPEN",
        ToolSpec {
            destination: Destination::Client,
            required_params: &["target"],
            summary: "open an application or document",
        },
    ),
    (
        "SYS_STAT",
        ToolSpec {
            destination: Destination::Ops,
            required_params: &[],
            summary: "report host system status",
        },
    ),
    (
        "SYS_RESTART",
        ToolSpec {
            destination: Destination::Ops,
            required_params: &["service"],
            summary: "restart a managed service",
        },
    ),
];

fn registry() -> &'static HashMap<&'static str, ToolSpec> {
    static REGISTRY: OnceLock<HashMap<&'static str, ToolSpec>> = OnceLock::new();
    REGISTRY.get_or_init(|| TOOLS.iter().copied().collect())
}

/// Look up a tool by id.
pub fn lookup(tool_id: &str) -> Option<ToolSpec> {
    registry().get(tool_id).copied()
}

/// True if the tool id is whitelisted.
pub fn contains(tool_id: &str) -> bool {
    registry().contains_key(tool_id)
}

/// Registry summary block injected into the planner prompt.
///
/// Lists tool ids with their required parameter keys in a fixed order so
/// prompts are deterministic.
pub fn tool_prompt() -> String {
    let mut lines = vec!["[TOOL REGISTRY]".to_owned()];
    for (id, spec) in TOOLS {
        let params = if spec.required_params.is_empty() {
            "none".to_owned()
        } else {
            spec.required_params.join(", ")
        };
        lines.push(format!("- {id}: {} (params: {params})", spec.summary));
    }
    lines.join("\n")
}
