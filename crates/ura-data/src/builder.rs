//! Folds cleaned session paths into a weighted, directed flow graph.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use ura_core::models::{
    EndState, GraphEdge, GraphNode, NavigationStep, NodeKind, ProcessingReport,
};

use crate::cycles::resolve_cycles;
use crate::pruner::NodePruner;

/// Accumulates edges across sessions.
///
/// Edges keep first-insertion order. Node kinds are assigned on first sight
/// (origin, then intermediates, then destination); end-state nodes are
/// always destinations.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    edges: Vec<GraphEdge>,
    edge_index: HashMap<(String, String), usize>,
    kinds: HashMap<String, NodeKind>,
    node_order: Vec<String>,
    self_loops_skipped: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one session's cleaned path ending in `end_state`.
    ///
    /// Emits one edge per adjacent pair plus a trailing edge from the last
    /// step to the end-state node. Pairs with equal names are skipped.
    pub fn add_session(&mut self, path: &[NavigationStep], end_state: EndState) {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return;
        };

        self.assign_kind(&first.menu_name, NodeKind::Origin);
        for pair in path.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if from.menu_name == to.menu_name {
                self.self_loops_skipped += 1;
                continue;
            }
            self.assign_kind(&to.menu_name, NodeKind::Intermediate);
            self.add_edge(
                &from.menu_name,
                &to.menu_name,
                1,
                [from.point_code.as_str(), to.point_code.as_str()],
            );
        }

        let terminal = end_state.label();
        self.assign_kind(terminal, NodeKind::Destination);
        if last.menu_name == terminal {
            self.self_loops_skipped += 1;
        } else {
            self.add_edge(&last.menu_name, terminal, 1, [last.point_code.as_str(), ""]);
        }
    }

    /// Add a pre-aggregated `source → target` edge (edge-list spreadsheets).
    ///
    /// Self-loops are accepted here and removed in [`GraphBuilder::finish`].
    pub fn add_weighted_edge(&mut self, source: &str, target: &str, weight: u64) {
        self.assign_kind(source, NodeKind::Intermediate);
        self.assign_kind(target, NodeKind::Intermediate);
        self.add_edge(source, target, weight.max(1), ["", ""]);
    }

    /// Re-derive node kinds from edge direction: no incoming edge makes an
    /// origin, no outgoing edge a destination.
    pub fn infer_kinds_from_degree(&mut self) {
        let sources: HashSet<&str> = self.edges.iter().map(|e| e.source.as_str()).collect();
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        for name in &self.node_order {
            let kind = match (targets.contains(name.as_str()), sources.contains(name.as_str())) {
                (false, _) => NodeKind::Origin,
                (true, false) => NodeKind::Destination,
                (true, true) => NodeKind::Intermediate,
            };
            self.kinds.insert(name.clone(), kind);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Resolve cycles, derive the node set from edge endpoints and prune.
    ///
    /// Cycle and pruning diagnostics are written into `report`.
    pub fn finish(
        self,
        max_nodes: usize,
        report: &mut ProcessingReport,
    ) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let GraphBuilder {
            edges,
            kinds,
            node_order,
            self_loops_skipped,
            ..
        } = self;

        let resolution = resolve_cycles(edges);
        report.self_loops_removed += self_loops_skipped + resolution.self_loops_removed;
        report.reciprocal_edges_removed += resolution.reciprocal_removed;
        report.cycles.extend(resolution.cycles);

        let nodes = derive_nodes(&resolution.edges, &kinds, &node_order);
        debug!(
            "Built flow graph: {} nodes, {} edges",
            nodes.len(),
            resolution.edges.len()
        );

        let outcome = NodePruner::new(max_nodes).prune(nodes, resolution.edges);
        report.pruning = outcome.summary;
        (outcome.nodes, outcome.edges)
    }

    fn assign_kind(&mut self, name: &str, kind: NodeKind) {
        match self.kinds.get_mut(name) {
            Some(existing) => {
                if kind == NodeKind::Destination && EndState::from_label(name).is_some() {
                    *existing = kind;
                }
            }
            None => {
                self.kinds.insert(name.to_string(), kind);
                self.node_order.push(name.to_string());
            }
        }
    }

    fn add_edge(&mut self, source: &str, target: &str, weight: u64, codes: [&str; 2]) {
        let key = (source.to_string(), target.to_string());
        let index = match self.edge_index.get(&key) {
            Some(&index) => {
                self.edges[index].weight += weight;
                index
            }
            None => {
                self.edges.push(GraphEdge {
                    source: key.0.clone(),
                    target: key.1.clone(),
                    weight,
                    point_codes: Default::default(),
                });
                let index = self.edges.len() - 1;
                self.edge_index.insert(key, index);
                index
            }
        };
        let point_codes = &mut self.edges[index].point_codes;
        for code in codes.into_iter().map(str::trim).filter(|c| !c.is_empty()) {
            point_codes.insert(code.to_string());
        }
    }
}

/// Nodes are exactly the edge endpoints, in first-assignment order.
fn derive_nodes(
    edges: &[GraphEdge],
    kinds: &HashMap<String, NodeKind>,
    node_order: &[String],
) -> Vec<GraphNode> {
    let endpoints: HashSet<&str> = edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();

    let mut nodes: Vec<GraphNode> = node_order
        .iter()
        .filter(|name| endpoints.contains(name.as_str()))
        .map(|name| GraphNode {
            name: name.clone(),
            kind: kinds.get(name).copied().unwrap_or(NodeKind::Intermediate),
        })
        .collect();

    // Endpoints never assigned a kind fall back to intermediate.
    let listed: HashSet<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let mut extra: Vec<&str> = endpoints
        .into_iter()
        .filter(|name| !listed.contains(*name))
        .collect();
    extra.sort_unstable();
    nodes.extend(extra.into_iter().map(|name| GraphNode {
        name: name.to_string(),
        kind: NodeKind::Intermediate,
    }));
    nodes
}

// ── Tests ─────────────────────────────────────────────────────────────────────
