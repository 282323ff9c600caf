use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Label used for steps whose menu name is empty in the drill-down list.
pub const EMPTY_STEP_LABEL: &str = "[vazio]";

/// Fallback label for journeys without a product or service type.
pub const UNKNOWN_PRODUCT: &str = "Não Identificado";

/// The input layouts the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// One session per file, tab-separated key/value pairs (`ContactHistory.txt`).
    KeyValue,
    /// Many sessions, one `id|timestamp|tokens...` record per line.
    PipeLog,
    /// Spreadsheet rows with a named-column header, one call per row.
    Tabular,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputFormat::KeyValue => "key-value",
            InputFormat::PipeLog => "pipe-log",
            InputFormat::Tabular => "tabular",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a call. Every session ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EndState {
    Transferencia,
    Desconexao,
    Finalizacao,
    Abandono,
}

impl EndState {
    /// All variants, in the order they are reported.
    pub const ALL: [EndState; 4] = [
        EndState::Transferencia,
        EndState::Desconexao,
        EndState::Finalizacao,
        EndState::Abandono,
    ];

    /// Graph node label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            EndState::Transferencia => "Transferencia",
            EndState::Desconexao => "Desconexao",
            EndState::Finalizacao => "Finalizacao",
            EndState::Abandono => "Abandono",
        }
    }

    /// Reverse of [`EndState::label`].
    pub fn from_label(label: &str) -> Option<EndState> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for EndState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position of a node in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Origin,
    Intermediate,
    Destination,
}

impl NodeKind {
    /// Origins and destinations survive pruning unconditionally.
    pub fn is_anchor(&self) -> bool {
        matches!(self, NodeKind::Origin | NodeKind::Destination)
    }
}

/// A single spreadsheet cell as delivered by the file-reading layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Textual rendering; integral numbers print without a fractional part.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    /// Numeric value, parsing text cells when possible.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// `true` for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// One menu visit inside a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStep {
    /// Call identifier the step belongs to.
    pub session_id: String,
    /// Local wall-clock time of the visit, when it could be parsed.
    pub timestamp: Option<NaiveDateTime>,
    /// Menu / flow identifier (may be empty).
    pub menu_name: String,
    /// Event recorded alongside the step (`validacao_N`).
    #[serde(default)]
    pub event_name: Option<String>,
    /// Internal numeric checkpoint code.
    #[serde(default)]
    pub point_code: String,
    /// Destination service type for transfers.
    #[serde(default)]
    pub service_type: Option<String>,
    /// Technical / error step, excluded from the flow graph.
    pub is_noise: bool,
}

/// A node of the flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub kind: NodeKind,
}

/// A weighted, directed transition between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Number of sessions that made this transition (always ≥ 1).
    pub weight: u64,
    /// Checkpoint codes of the steps that contributed to this edge.
    #[serde(default)]
    pub point_codes: BTreeSet<String>,
}

/// The cleaned per-call record kept for drill-down and analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: String,
    pub ordered_step_names: Vec<String>,
    pub destination: EndState,
    pub duration_seconds: u64,
    pub hour: Option<u32>,
    pub weekday: Option<String>,
    pub product: String,
}

/// Categorical and temporal counters accumulated over all journeys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalStats {
    pub by_hour: BTreeMap<u32, u64>,
    pub by_weekday: BTreeMap<String, u64>,
    pub by_product: BTreeMap<String, u64>,
    /// Outcome counts keyed by [`EndState::label`].
    pub by_indicator: BTreeMap<String, u64>,
    pub journeys: u64,
    pub total_duration_seconds: u64,
}

impl TemporalStats {
    /// Mean journey duration in seconds, `0.0` when there are no journeys.
    pub fn average_duration(&self) -> f64 {
        if self.journeys == 0 {
            return 0.0;
        }
        self.total_duration_seconds as f64 / self.journeys as f64
    }

    /// Count recorded for one outcome.
    pub fn outcome_count(&self, state: EndState) -> u64 {
        self.by_indicator.get(state.label()).copied().unwrap_or(0)
    }
}

/// Headline figures shown above the charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowMetrics {
    pub total_sessions: u64,
    /// Rounded mean duration in seconds.
    pub average_duration_seconds: u64,
    /// Percentage of sessions ending in a transfer, one decimal place.
    pub transfer_rate: f64,
    /// Percentage of sessions ending in abandonment, one decimal place.
    pub abandonment_rate: f64,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_weight: u64,
}

/// Statistics block of a [`GraphSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub temporal: TemporalStats,
    pub metrics: FlowMetrics,
}

/// Call metadata carried by key-value session files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub ura_name: String,
    pub skill: String,
    pub master_id: String,
    pub dnis: String,
    pub ani: String,
    pub phone_type: String,
    pub media_type: String,
}

/// A spreadsheet row that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based spreadsheet row number (the header is row 1).
    pub row: usize,
    pub reason: String,
}

/// Outcome of node pruning on an oversized graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneSummary {
    pub max_nodes: usize,
    pub nodes_before: usize,
    pub nodes_after: usize,
    pub edges_before: usize,
    pub edges_after: usize,
}

/// Diagnostics gathered while building a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub format: InputFormat,
    pub sessions_processed: usize,
    #[serde(default)]
    pub skipped_rows: Vec<SkippedRow>,
    pub self_loops_removed: usize,
    pub reciprocal_edges_removed: usize,
    /// Cycles of three or more nodes left in the graph.
    #[serde(default)]
    pub cycles: Vec<Vec<String>>,
    #[serde(default)]
    pub pruning: Option<PruneSummary>,
}

impl ProcessingReport {
    pub fn new(format: InputFormat) -> Self {
        Self {
            format,
            sessions_processed: 0,
            skipped_rows: Vec::new(),
            self_loops_removed: 0,
            reciprocal_edges_removed: 0,
            cycles: Vec::new(),
            pruning: None,
        }
    }

    /// Number of spreadsheet rows that did not produce a journey.
    pub fn rows_skipped(&self) -> usize {
        self.skipped_rows.len()
    }
}

/// The complete, read-only result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub journeys: Vec<Journey>,
    /// Every parsed step, noise included, for drill-down.
    pub steps: Vec<NavigationStep>,
    pub stats: SnapshotStats,
    #[serde(default)]
    pub contact: Option<ContactDetails>,
    pub report: ProcessingReport,
}

impl GraphSnapshot {
    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Look up the edge `source → target`.
    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> u64 {
        self.edges.iter().map(|e| e.weight).sum()
    }
}
