//! Dependency graph resolver.
//!
//! Steps declare their predecessors through `context`. The resolver turns
//! those lists into a total execution order where every step comes after all
//! of its predecessors. Ties are broken by declaration order: at each point
//! the earliest-declared step whose predecessors are already placed goes next,
//! so the order is reproducible for a given definition.

use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::models::Step;

/// Validated predecessor graph over a step list.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<String>,
    /// Predecessor indices per step, in declared order.
    predecessors: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph and resolve its order. Pure; fails fast.
    pub fn build(steps: &[Step]) -> Result<Self, GraphError> {
        if steps.is_empty() {
            return Err(GraphError::EmptyWorkflow);
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.id.as_str(), i).is_some() {
                return Err(GraphError::DuplicateStep {
                    step: step.id.clone(),
                });
            }
        }

        let mut predecessors = Vec::with_capacity(steps.len());
        for step in steps {
            let mut preds = Vec::with_capacity(step.context.len());
            for pred in &step.context {
                match index.get(pred.as_str()) {
                    Some(&p) => preds.push(p),
                    None => {
                        return Err(GraphError::UnknownPredecessor {
                            step: step.id.clone(),
                            predecessor: pred.clone(),
                        })
                    }
                }
            }
            predecessors.push(preds);
        }

        let ids: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
        let order = topological_order(&predecessors).map_err(|remaining| {
            GraphError::CycleDetected {
                steps: find_cycle(&predecessors, &remaining)
                    .into_iter()
                    .map(|i| ids[i].clone())
                    .collect(),
            }
        })?;

        Ok(Self {
            ids,
            predecessors,
            order,
        })
    }

    /// Step ids in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.ids[i].as_str()).collect()
    }

    /// Step indices (into the original slice) in execution order.
    pub fn order_indices(&self) -> &[usize] {
        &self.order
    }

    pub fn predecessors_of(&self, step_id: &str) -> Vec<&str> {
        self.ids
            .iter()
            .position(|id| id == step_id)
            .map(|i| {
                self.predecessors[i]
                    .iter()
                    .map(|&p| self.ids[p].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve the execution order of `steps` as a list of step ids.
pub fn resolve_order(steps: &[Step]) -> Result<Vec<String>, GraphError> {
    let graph = DependencyGraph::build(steps)?;
    Ok(graph.order().into_iter().map(str::to_string).collect())
}

/// Repeatedly place the first-declared step whose predecessors are placed.
/// On failure returns the indices that could not be placed.
fn topological_order(predecessors: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let n = predecessors.len();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n).find(|&i| !placed[i] && predecessors[i].iter().all(|&p| placed[p]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => return Err((0..n).filter(|&i| !placed[i]).collect()),
        }
    }

    Ok(order)
}

/// Locate one cycle among the unplaced steps by walking predecessor edges.
/// Members are returned in declaration order.
fn find_cycle(predecessors: &[Vec<usize>], remaining: &[usize]) -> Vec<usize> {
    let remaining_set: HashSet<usize> = remaining.iter().copied().collect();
    let mut visited = HashSet::new();

    for &start in remaining {
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        if let Some(mut cycle) = walk(
            start,
            predecessors,
            &remaining_set,
            &mut visited,
            &mut stack,
            &mut on_stack,
        ) {
            cycle.sort_unstable();
            return cycle;
        }
    }

    // Every unplaced step waits on another unplaced step, so a cycle exists;
    // fall back to reporting all of them.
    remaining.to_vec()
}

fn walk(
    node: usize,
    predecessors: &[Vec<usize>],
    remaining: &HashSet<usize>,
    visited: &mut HashSet<usize>,
    stack: &mut Vec<usize>,
    on_stack: &mut HashSet<usize>,
) -> Option<Vec<usize>> {
    if on_stack.contains(&node) {
        let start = stack.iter().position(|&n| n == node).unwrap_or(0);
        return Some(stack[start..].to_vec());
    }
    if !visited.insert(node) {
        return None;
    }

    stack.push(node);
    on_stack.insert(node);
    for &pred in &predecessors[node] {
        if !remaining.contains(&pred) {
            continue;
        }
        if let Some(cycle) = walk(pred, predecessors, remaining, visited, stack, on_stack) {
            return Some(cycle);
        }
    }
    stack.pop();
    on_stack.remove(&node);
    None
}
