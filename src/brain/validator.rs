//! Plan validator -- rejects structurally or semantically unsafe DAGs.
//!
//! Deterministic and side-effect free. Cycle detection uses an iterative
//! three-color DFS; depth is the longest root-to-leaf path, computed with
//! a Kahn relaxation pass once acyclicity is established.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::registry;
use crate::types::PlannerDag;

/// Maximum number of plan nodes.
pub const MAX_NODES: usize = 6;
/// Maximum root-to-leaf path length.
pub const MAX_DEPTH: usize = 4;

/// Reasons a DAG is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The plan carries no steps.
    #[error("DAG is empty")]
    Empty,
    /// The plan exceeds the node budget.
    #[error("DAG complexity too high: {count} nodes (max: {MAX_NODES})")]
    TooManyNodes {
        /// Observed node count.
        count: usize,
    },
    /// Two steps share an id.
    #[error("duplicate step id '{step_id}'")]
    DuplicateStepId {
        /// The repeated id.
        step_id: String,
    },
    /// A step names a tool outside the registry.
    #[error("illegal action '{tool_id}' in step {step_id}")]
    UnknownTool {
        /// The unregistered tool.
        tool_id: String,
        /// Step that named it.
        step_id: String,
    },
    /// A dependency references a step that does not exist.
    #[error("step {step_id} depends on non-existent step {dependency}")]
    MissingDependency {
        /// Step with the bad reference.
        step_id: String,
        /// The missing id.
        dependency: String,
    },
    /// The dependency relation contains a cycle.
    #[error("cycle detected in planner DAG")]
    CycleDetected,
    /// The longest dependency chain exceeds the depth budget.
    #[error("DAG too deep: {depth} levels (max: {MAX_DEPTH})")]
    TooDeep {
        /// Observed depth.
        depth: usize,
    },
    /// Every step has dependencies, so nothing can start.
    #[error("no root nodes found (all steps have dependencies)")]
    NoRoot,
}

/// Validate a planner DAG against the structural safety rules.
///
/// # Errors
///
/// Returns the first violated rule; see [`ValidationError`].
pub fn validate(dag: &PlannerDag) -> Result<(), ValidationError> {
    if dag.steps.is_empty() {
        return Err(ValidationError::Empty);
    }
    if dag.steps.len() > MAX_NODES {
        return Err(ValidationError::TooManyNodes {
            count: dag.steps.len(),
        });
    }

    let mut ids: HashSet<&str> = HashSet::new();
    for step in &dag.steps {
        if !ids.insert(step.step_id.as_str()) {
            return Err(ValidationError::DuplicateStepId {
                step_id: step.step_id.clone(),
            });
        }
        if !registry::contains(&step.intent.action_id) {
            return Err(ValidationError::UnknownTool {
                tool_id: step.intent.action_id.clone(),
                step_id: step.step_id.clone(),
            });
        }
    }

    // Forward adjacency: dependency -> dependents.
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in &dag.steps {
        adj.entry(step.step_id.as_str()).or_default();
    }
    for step in &dag.steps {
        for dep in &step.intent.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(ValidationError::MissingDependency {
                    step_id: step.step_id.clone(),
                    dependency: dep.clone(),
                });
            }
            adj.entry(dep.as_str())
                .or_default()
                .push(step.step_id.as_str());
        }
    }

    detect_cycle(&adj)?;

    let roots: Vec<&str> = dag
        .steps
        .iter()
        .filter(|s| s.intent.depends_on.is_empty())
        .map(|s| s.step_id.as_str())
        .collect();
    if roots.is_empty() {
        return Err(ValidationError::NoRoot);
    }

    let depth = longest_path(dag, &adj);
    if depth > MAX_DEPTH {
        return Err(ValidationError::TooDeep { depth });
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Iterative three-color DFS over the whole graph.
fn detect_cycle(adj: &HashMap<&str, Vec<&str>>) -> Result<(), ValidationError> {
    let mut color: HashMap<&str, Color> = adj.keys().map(|&id| (id, Color::White)).collect();

    for &start in adj.keys() {
        if color.get(start) != Some(&Color::White) {
            continue;
        }

        // Stack of (node, next child index).
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        color.insert(start, Color::Gray);

        while let Some(&(node, child_idx)) = stack.last() {
            let children = adj.get(node).map(Vec::as_slice).unwrap_or_default();
            if let Some(&child) = children.get(child_idx) {
                if let Some(last) = stack.last_mut() {
                    last.1 = child_idx.saturating_add(1);
                }
                match color.get(child).copied() {
                    Some(Color::Gray) => return Err(ValidationError::CycleDetected),
                    Some(Color::White) => {
                        color.insert(child, Color::Gray);
                        stack.push((child, 0));
                    }
                    _ => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
            }
        }
    }

    Ok(())
}

/// Longest root-to-leaf path length via Kahn relaxation.
///
/// Assumes the graph is already known to be acyclic.
fn longest_path(dag: &PlannerDag, adj: &HashMap<&str, Vec<&str>>) -> usize {
    let mut in_degree: HashMap<&str, usize> = dag
        .steps
        .iter()
        .map(|s| (s.step_id.as_str(), s.intent.depends_on.len()))
        .collect();
    let mut depth: HashMap<&str, usize> = HashMap::new();

    let mut queue: VecDeque<&str> = dag
        .steps
        .iter()
        .filter(|s| s.intent.depends_on.is_empty())
        .map(|s| s.step_id.as_str())
        .collect();
    for &root in &queue {
        depth.insert(root, 1);
    }

    let mut max_depth = if queue.is_empty() { 0 } else { 1 };
    while let Some(node) = queue.pop_front() {
        let node_depth = depth.get(node).copied().unwrap_or(1);
        max_depth = max_depth.max(node_depth);

        for &next in adj.get(node).map(Vec::as_slice).unwrap_or_default() {
            let candidate = node_depth.saturating_add(1);
            let entry = depth.entry(next).or_insert(candidate);
            *entry = (*entry).max(candidate);

            if let Some(remaining) = in_degree.get_mut(next) {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    max_depth
}
