//! Keeps the flow graph readable by capping its node count.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};
use ura_core::models::{GraphEdge, GraphNode, PruneSummary};

/// Nodes and edges after pruning, plus a summary when anything was cut.
#[derive(Debug, Clone, PartialEq)]
pub struct PruneOutcome {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub summary: Option<PruneSummary>,
}

/// Drops the least relevant intermediate nodes once a graph exceeds
/// `max_nodes`.
///
/// Relevance is the summed weight of a node's incident edges. Origins and
/// destinations are always kept; remaining slots go to intermediates by
/// descending relevance (ties keep node order). Edges touching a removed
/// node are dropped, and so is any node left without edges. When the budget
/// leaves no edge at all the graph is returned unpruned.
#[derive(Debug, Clone, Copy)]
pub struct NodePruner {
    max_nodes: usize,
}

impl NodePruner {
    pub fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// Summed incident edge weight per node name.
    pub fn relevance(edges: &[GraphEdge]) -> HashMap<&str, u64> {
        let mut scores: HashMap<&str, u64> = HashMap::new();
        for edge in edges {
            *scores.entry(edge.source.as_str()).or_insert(0) += edge.weight;
            *scores.entry(edge.target.as_str()).or_insert(0) += edge.weight;
        }
        scores
    }

    pub fn prune(&self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> PruneOutcome {
        if nodes.len() <= self.max_nodes {
            return PruneOutcome {
                nodes,
                edges,
                summary: None,
            };
        }

        let nodes_before = nodes.len();
        let edges_before = edges.len();

        let keep: HashSet<String> = {
            let scores = Self::relevance(&edges);
            let anchors: Vec<&GraphNode> = nodes.iter().filter(|n| n.kind.is_anchor()).collect();
            let mut candidates: Vec<&GraphNode> =
                nodes.iter().filter(|n| !n.kind.is_anchor()).collect();
            let score = |n: &GraphNode| scores.get(n.name.as_str()).copied().unwrap_or(0);
            candidates.sort_by(|a, b| score(b).cmp(&score(a)));

            let slots = self.max_nodes.saturating_sub(anchors.len());
            anchors
                .into_iter()
                .chain(candidates.into_iter().take(slots))
                .map(|n| n.name.clone())
                .collect()
        };

        let (edges, dropped): (Vec<GraphEdge>, Vec<GraphEdge>) = edges
            .into_iter()
            .partition(|e| keep.contains(&e.source) && keep.contains(&e.target));
        if edges.is_empty() {
            warn!(
                "Node budget {} leaves no edge among {} nodes, keeping the graph unpruned",
                self.max_nodes, nodes_before
            );
            return PruneOutcome {
                nodes,
                edges: dropped,
                summary: None,
            };
        }
        let connected: HashSet<&str> = edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();
        let nodes: Vec<GraphNode> = nodes
            .into_iter()
            .filter(|n| keep.contains(&n.name) && connected.contains(n.name.as_str()))
            .collect();

        let summary = PruneSummary {
            max_nodes: self.max_nodes,
            nodes_before,
            nodes_after: nodes.len(),
            edges_before,
            edges_after: edges.len(),
        };
        info!(
            "Pruned flow graph to {} of {} nodes ({} of {} edges kept)",
            summary.nodes_after, summary.nodes_before, summary.edges_after, summary.edges_before
        );

        PruneOutcome {
            nodes,
            edges,
            summary: Some(summary),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use ura_core::models::NodeKind;

    fn node(name: &str, kind: NodeKind) -> GraphNode {
        GraphNode {
            name: name.to_string(),
            kind,
        }
    }

    fn edge(source: &str, target: &str, weight: u64) -> GraphEdge {
        GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            point_codes: BTreeSet::new(),
        }
    }

    /// Origin → I_k → destination, where I_k carries weight k.
    fn fan_graph(intermediates: u64) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let mut nodes = vec![node("Inicio", NodeKind::Origin)];
        let mut edges = Vec::new();
        for k in 1..=intermediates {
            let name = format!("Menu_{k:03}");
            nodes.push(node(&name, NodeKind::Intermediate));
            edges.push(edge("Inicio", &name, k));
            edges.push(edge(&name, "Transferencia", k));
        }
        nodes.push(node("Transferencia", NodeKind::Destination));
        (nodes, edges)
    }

    #[test]
    fn test_no_pruning_under_limit() {
        let (nodes, edges) = fan_graph(5);
        let outcome = NodePruner::new(100).prune(nodes.clone(), edges.clone());
        assert_eq!(outcome.nodes, nodes);
        assert_eq!(outcome.edges, edges);
        assert!(outcome.summary.is_none());
    }

    #[test]
    fn test_prunes_to_limit_keeping_anchors_and_heaviest() {
        // 2 anchors + 148 intermediates = 150 nodes.
        let (nodes, edges) = fan_graph(148);
        let outcome = NodePruner::new(100).prune(nodes, edges);

        assert_eq!(outcome.nodes.len(), 100);
        assert!(outcome.nodes.iter().any(|n| n.name == "Inicio"));
        assert!(outcome.nodes.iter().any(|n| n.name == "Transferencia"));
        // Heaviest 98 intermediates are Menu_051..=Menu_148.
        assert!(outcome.nodes.iter().any(|n| n.name == "Menu_051"));
        assert!(!outcome.nodes.iter().any(|n| n.name == "Menu_050"));

        let summary = outcome.summary.expect("pruned");
        assert_eq!(summary.nodes_before, 150);
        assert_eq!(summary.nodes_after, 100);
        assert_eq!(summary.edges_after, 98 * 2);
    }

    #[test]
    fn test_pruned_edges_reference_kept_nodes() {
        let (nodes, edges) = fan_graph(30);
        let outcome = NodePruner::new(10).prune(nodes, edges);
        let names: HashSet<&str> = outcome.nodes.iter().map(|n| n.name.as_str()).collect();
        for e in &outcome.edges {
            assert!(names.contains(e.source.as_str()));
            assert!(names.contains(e.target.as_str()));
        }
    }

    #[test]
    fn test_budget_without_edges_keeps_graph() {
        let nodes = vec![
            node("Inicio", NodeKind::Origin),
            node("Menu_A", NodeKind::Intermediate),
            node("Menu_B", NodeKind::Intermediate),
            node("Transferencia", NodeKind::Destination),
        ];
        let edges = vec![
            edge("Inicio", "Menu_A", 1),
            edge("Menu_A", "Menu_B", 1),
            edge("Menu_B", "Transferencia", 1),
        ];
        let outcome = NodePruner::new(2).prune(nodes.clone(), edges.clone());
        assert_eq!(outcome.nodes, nodes);
        assert_eq!(outcome.edges, edges);
        assert!(outcome.summary.is_none());
    }

    #[test]
    fn test_relevance_sums_incident_weights() {
        let edges = vec![edge("A", "B", 2), edge("B", "C", 3)];
        let scores = NodePruner::relevance(&edges);
        assert_eq!(scores["A"], 2);
        assert_eq!(scores["B"], 5);
        assert_eq!(scores["C"], 3);
    }

    #[test]
    fn test_ties_keep_node_order() {
        let nodes = vec![
            node("O", NodeKind::Origin),
            node("X", NodeKind::Intermediate),
            node("Y", NodeKind::Intermediate),
            node("D", NodeKind::Destination),
        ];
        let edges = vec![edge("O", "X", 1), edge("X", "D", 1), edge("O", "Y", 1), edge("Y", "D", 1)];
        let outcome = NodePruner::new(3).prune(nodes, edges);
        let names: Vec<&str> = outcome.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["O", "X", "D"]);
    }
}
