//! Cycle handling on the aggregated edge list.
//!
//! Sankey layouts need a DAG. Self-loops are dropped, each reciprocal pair
//! `A → B` / `B → A` is resolved by keeping the heavier side, and longer
//! cycles are detected and reported but left in place.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use ura_core::error::FlowError;
use ura_core::models::GraphEdge;

/// Result of [`resolve_cycles`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleResolution {
    pub edges: Vec<GraphEdge>,
    pub self_loops_removed: usize,
    pub reciprocal_removed: usize,
    /// Cycles of three or more nodes still present in `edges`.
    pub cycles: Vec<Vec<String>>,
}

/// Drop self-loops, resolve reciprocal pairs, then report remaining cycles.
pub fn resolve_cycles(edges: Vec<GraphEdge>) -> CycleResolution {
    let (edges, self_loops_removed) = drop_self_loops(edges);
    let (edges, reciprocal_removed) = resolve_reciprocal_edges(edges);
    let cycles = detect_cycles(&edges);

    for cycle in &cycles {
        warn!("{}", FlowError::AmbiguousCycle(cycle.clone()));
    }
    if self_loops_removed + reciprocal_removed > 0 {
        debug!(
            "Cycle resolution removed {} self-loops and {} reciprocal edges",
            self_loops_removed, reciprocal_removed
        );
    }

    CycleResolution {
        edges,
        self_loops_removed,
        reciprocal_removed,
        cycles,
    }
}

/// Remove edges whose source equals their target.
pub fn drop_self_loops(edges: Vec<GraphEdge>) -> (Vec<GraphEdge>, usize) {
    let before = edges.len();
    let kept: Vec<GraphEdge> = edges.into_iter().filter(|e| e.source != e.target).collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// For every pair `A → B` / `B → A`, keep the heavier edge.
///
/// Edges are visited in order. When an edge meets its already-seen reverse,
/// the current edge is discarded if its weight is less than or equal to the
/// reverse's, otherwise the reverse is discarded. Equal weights therefore
/// keep the edge encountered first.
pub fn resolve_reciprocal_edges(edges: Vec<GraphEdge>) -> (Vec<GraphEdge>, usize) {
    let mut removed: HashSet<usize> = HashSet::new();
    {
        let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            let reverse = (edge.target.as_str(), edge.source.as_str());
            if let Some(&j) = seen.get(&reverse) {
                if !removed.contains(&j) {
                    let loser = if edge.weight <= edges[j].weight { i } else { j };
                    debug!(
                        "Reciprocal edges {} <-> {}: dropping {} -> {}",
                        edge.source, edge.target, edges[loser].source, edges[loser].target
                    );
                    removed.insert(loser);
                }
            }
            seen.insert((edge.source.as_str(), edge.target.as_str()), i);
        }
    }

    let count = removed.len();
    let kept = edges
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(_, e)| e)
        .collect();
    (kept, count)
}

/// Find cycles with a depth-first search over the edge list.
///
/// Roots are tried in first-appearance order and neighbours in edge order,
/// so the output is deterministic. Each back-edge yields one cycle, listed
/// from the node it returns to.
pub fn detect_cycles(edges: &[GraphEdge]) -> Vec<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    let mut known: HashSet<&str> = HashSet::new();
    for edge in edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        for name in [edge.source.as_str(), edge.target.as_str()] {
            if known.insert(name) {
                order.push(name);
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for &root in &order {
        if !visited.insert(root) {
            continue;
        }
        // (node, index of the next neighbour to explore)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        let mut on_stack: HashMap<&str, usize> = HashMap::from([(root, 0)]);

        while let Some(&(node, next)) = stack.last() {
            let neighbours = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next >= neighbours.len() {
                on_stack.remove(node);
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let target = neighbours[next];
            if let Some(&pos) = on_stack.get(target) {
                cycles.push(stack[pos..].iter().map(|(n, _)| n.to_string()).collect());
            } else if visited.insert(target) {
                on_stack.insert(target, stack.len());
                stack.push((target, 0));
            }
        }
    }

    cycles
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn edge(source: &str, target: &str, weight: u64) -> GraphEdge {
        GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            point_codes: BTreeSet::new(),
        }
    }

    fn pairs(edges: &[GraphEdge]) -> Vec<(&str, &str, u64)> {
        edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.weight))
            .collect()
    }

    // ── self-loops ────────────────────────────────────────────────────────────

    #[test]
    fn test_drop_self_loops() {
        let (edges, removed) = drop_self_loops(vec![edge("A", "A", 3), edge("A", "B", 1)]);
        assert_eq!(removed, 1);
        assert_eq!(pairs(&edges), vec![("A", "B", 1)]);
    }

    // ── reciprocal pairs ──────────────────────────────────────────────────────

    #[test]
    fn test_reciprocal_keeps_heavier_reverse() {
        let (edges, removed) = resolve_reciprocal_edges(vec![edge("A", "B", 5), edge("B", "A", 2)]);
        assert_eq!(removed, 1);
        assert_eq!(pairs(&edges), vec![("A", "B", 5)]);
    }

    #[test]
    fn test_reciprocal_keeps_heavier_current() {
        let (edges, removed) = resolve_reciprocal_edges(vec![edge("A", "B", 1), edge("B", "A", 4)]);
        assert_eq!(removed, 1);
        assert_eq!(pairs(&edges), vec![("B", "A", 4)]);
    }

    #[test]
    fn test_reciprocal_tie_keeps_first_encountered() {
        let (edges, _) = resolve_reciprocal_edges(vec![
            edge("Menu_A", "Menu_B", 3),
            edge("X", "Y", 1),
            edge("Menu_B", "Menu_A", 3),
        ]);
        assert_eq!(pairs(&edges), vec![("Menu_A", "Menu_B", 3), ("X", "Y", 1)]);
    }

    #[test]
    fn test_reciprocal_never_removes_both() {
        let input = vec![edge("A", "B", 2), edge("B", "A", 2), edge("B", "C", 1), edge("C", "B", 9)];
        let (edges, removed) = resolve_reciprocal_edges(input);
        assert_eq!(removed, 2);
        assert_eq!(pairs(&edges), vec![("A", "B", 2), ("C", "B", 9)]);
    }

    // ── detect_cycles ─────────────────────────────────────────────────────────

    #[test]
    fn test_detect_three_node_cycle() {
        let edges = vec![edge("A", "B", 1), edge("B", "C", 1), edge("C", "A", 1), edge("C", "D", 1)];
        let cycles = detect_cycles(&edges);
        assert_eq!(cycles, vec![vec!["A".to_string(), "B".to_string(), "C".to_string()]]);
    }

    #[test]
    fn test_detect_cycles_acyclic() {
        let edges = vec![edge("A", "B", 1), edge("A", "C", 1), edge("B", "C", 1)];
        assert!(detect_cycles(&edges).is_empty());
    }

    // ── resolve_cycles ────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_cycles_reports_but_keeps_long_cycle() {
        let edges = vec![
            edge("A", "A", 1),
            edge("A", "B", 2),
            edge("B", "A", 1),
            edge("B", "C", 1),
            edge("C", "D", 1),
            edge("D", "B", 1),
        ];
        let resolution = resolve_cycles(edges);
        assert_eq!(resolution.self_loops_removed, 1);
        assert_eq!(resolution.reciprocal_removed, 1);
        assert_eq!(resolution.edges.len(), 4);
        assert_eq!(resolution.cycles.len(), 1);
        assert_eq!(resolution.cycles[0], vec!["B", "C", "D"]);
    }

    #[test]
    fn test_resolve_cycles_leaves_no_two_cycles() {
        let edges = vec![edge("A", "B", 1), edge("B", "A", 1), edge("B", "C", 3), edge("C", "B", 3)];
        let resolution = resolve_cycles(edges);
        for e in &resolution.edges {
            let reverse = resolution
                .edges
                .iter()
                .any(|r| r.source == e.target && r.target == e.source);
            assert!(!reverse, "{} <-> {} survived", e.source, e.target);
        }
    }
}
