//! Semantic analyst -- condenses execution outcomes into a fact summary.
//!
//! Partitions outcomes into identity context, external facts, and system
//! execution so downstream narration cannot blur remembered state with
//! retrieved knowledge. Output is byte-deterministic for identical input.

use crate::brain::executor::{StepOutcome, StepPayload};

/// Summary produced after an execution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Partitioned fact summary, or the canonical empty marker.
    pub summary: String,
    /// True when a knowledge search ran, succeeded, and still yielded no
    /// external facts -- the signal for an adaptive replan.
    pub needs_more_data: bool,
}

/// Post-execution synthesis of results into a partitioned fact summary.
pub struct SemanticAnalyst;

impl SemanticAnalyst {
    /// Synthesize the outcome stream.
    pub fn synthesize(&self, outcomes: &[StepOutcome]) -> Analysis {
        let mut identity_context: Vec<String> = Vec::new();
        let mut external_facts: Vec<String> = Vec::new();
        let mut system_status: Vec<String> = Vec::new();

        let mut rag_attempted = false;
        let mut rag_call_succeeded = false;

        for outcome in outcomes {
            match &outcome.payload {
                StepPayload::Memory { summaries } => {
                    for summary in summaries {
                        identity_context.push(format!("- {summary}"));
                    }
                }
                StepPayload::Rag { success, chunks } => {
                    rag_attempted = true;
                    // Strict check: only a literal true counts.
                    if *success {
                        rag_call_succeeded = true;
                    }
                    for chunk in chunks {
                        external_facts.push(format!(
                            "- {} (Source: {}, Reliability: {:.2})",
                            chunk.text, chunk.source, chunk.score
                        ));
                    }
                }
                StepPayload::Tool {
                    success,
                    output,
                    error,
                } => {
                    if *success {
                        system_status.push(format!("- Action: {output}"));
                    } else {
                        system_status.push(format!("- Action FAILED: {error}"));
                    }
                }
                StepPayload::Error { message } => {
                    system_status.push(format!("- Action FAILED: {message}"));
                }
            }
        }

        let mut sections: Vec<String> = Vec::new();
        if !identity_context.is_empty() {
            sections.push("### IDENTITY & PREFERENCES".to_owned());
            sections.extend(identity_context);
        }
        if !external_facts.is_empty() {
            sections.push("\n### EXTERNAL ENRICHMENT (RAG)".to_owned());
            sections.extend(external_facts.iter().cloned());
        }
        if !system_status.is_empty() {
            sections.push("\n### SYSTEM EXECUTION".to_owned());
            sections.extend(system_status);
        }

        let summary = if sections.is_empty() {
            "No significant context found.".to_owned()
        } else {
            sections.join("\n")
        };

        let needs_more_data = rag_attempted && external_facts.is_empty() && rag_call_succeeded;

        Analysis {
            summary,
            needs_more_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::RagChunk;

    fn memory_outcome(summaries: &[&str]) -> StepOutcome {
        StepOutcome {
            step_id: "M".to_owned(),
            tool_id: "MEMORY_GET".to_owned(),
            payload: StepPayload::Memory {
                summaries: summaries.iter().map(|s| (*s).to_owned()).collect(),
            },
        }
    }

    fn rag_outcome(success: bool, chunks: Vec<RagChunk>) -> StepOutcome {
        StepOutcome {
            step_id: "R".to_owned(),
            tool_id: "RAG_SEARCH".to_owned(),
            payload: StepPayload::Rag { success, chunks },
        }
    }

    fn chunk(text: &str, source: &str, score: f32) -> RagChunk {
        RagChunk {
            text: text.to_owned(),
            source: source.to_owned(),
            score,
        }
    }

    fn tool_outcome(success: bool, output: &str, error: &str) -> StepOutcome {
        StepOutcome {
            step_id: "T".to_owned(),
            tool_id: "FS_LIST".to_owned(),
            payload: StepPayload::Tool {
                success,
                output: output.to_owned(),
                error: error.to_owned(),
            },
        }
    }

    #[test]
    fn test_empty_input_canonical_marker() {
        let analysis = SemanticAnalyst.synthesize(&[]);
        assert_eq!(analysis.summary, "No significant context found.");
        assert!(!analysis.needs_more_data);
    }

    #[test]
    fn test_partitions_and_formatting() {
        let outcomes = vec![
            memory_outcome(&["User prefers short answers"]),
            rag_outcome(true, vec![chunk("Rain expected", "weather.example", 0.9)]),
            tool_outcome(true, "3 files listed", ""),
        ];

        let analysis = SemanticAnalyst.synthesize(&outcomes);

        assert_eq!(
            analysis.summary,
            "### IDENTITY & PREFERENCES\n\
             - User prefers short answers\n\
             \n### EXTERNAL ENRICHMENT (RAG)\n\
             - Rain expected (Source: weather.example, Reliability: 0.90)\n\
             \n### SYSTEM EXECUTION\n\
             - Action: 3 files listed"
        );
        assert!(!analysis.needs_more_data);
    }

    #[test]
    fn test_empty_partitions_omitted() {
        let outcomes = vec![tool_outcome(false, "", "disk unreachable")];

        let analysis = SemanticAnalyst.synthesize(&outcomes);

        assert!(!analysis.summary.contains("IDENTITY"));
        assert!(!analysis.summary.contains("ENRICHMENT"));
        assert!(analysis
            .summary
            .contains("- Action FAILED: disk unreachable"));
    }

    #[test]
    fn test_error_entries_land_in_system_execution() {
        let outcomes = vec![StepOutcome {
            step_id: "X".to_owned(),
            tool_id: "FS_READ".to_owned(),
            payload: StepPayload::Error {
                message: "step 'X' exceeded the 5s deadline".to_owned(),
            },
        }];

        let analysis = SemanticAnalyst.synthesize(&outcomes);

        assert!(analysis.summary.starts_with("\n### SYSTEM EXECUTION"));
        assert!(analysis.summary.contains("Action FAILED"));
    }

    #[test]
    fn test_insufficiency_when_rag_succeeds_empty() {
        let outcomes = vec![rag_outcome(true, vec![])];
        let analysis = SemanticAnalyst.synthesize(&outcomes);
        assert!(
            analysis.needs_more_data,
            "successful RAG with zero chunks must trigger replanning"
        );
    }

    #[test]
    fn test_no_insufficiency_when_rag_failed() {
        let outcomes = vec![rag_outcome(false, vec![])];
        let analysis = SemanticAnalyst.synthesize(&outcomes);
        assert!(
            !analysis.needs_more_data,
            "a failed RAG call is not an insufficiency signal"
        );
    }

    #[test]
    fn test_no_insufficiency_without_rag_step() {
        let outcomes = vec![memory_outcome(&["fact"])];
        let analysis = SemanticAnalyst.synthesize(&outcomes);
        assert!(!analysis.needs_more_data);
    }

    #[test]
    fn test_no_insufficiency_when_facts_present() {
        let outcomes = vec![rag_outcome(true, vec![chunk("fact", "src", 1.0)])];
        let analysis = SemanticAnalyst.synthesize(&outcomes);
        assert!(!analysis.needs_more_data);
    }

    #[test]
    fn test_output_is_deterministic() {
        let outcomes = vec![
            memory_outcome(&["a", "b"]),
            rag_outcome(true, vec![chunk("c", "d", 0.5)]),
        ];
        let first = SemanticAnalyst.synthesize(&outcomes);
        let second = SemanticAnalyst.synthesize(&outcomes);
        assert_eq!(first, second, "identical input must produce identical bytes");
    }
}
