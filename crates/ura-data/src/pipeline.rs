//! Shared per-call processing used by every parser.
//!
//! A parser turns its input into calls; each call goes through the same
//! steps here: classify the outcome, clean the path with the parser's loop
//! strategy, feed the graph and the statistics. [`SnapshotAssembler::finish`]
//! then resolves cycles, prunes and produces the [`GraphSnapshot`].

use tracing::{debug, info};
use ura_core::models::{
    ContactDetails, EndState, GraphSnapshot, InputFormat, Journey, NavigationStep,
    ProcessingReport, SkippedRow, SnapshotStats,
};
use ura_core::settings::DEFAULT_MAX_NODES;
use ura_core::taxonomy::Taxonomy;

use crate::aggregator::StatsAggregator;
use crate::builder::GraphBuilder;
use crate::classifier::{EndStateClassifier, OutcomeSignals};
use crate::loops::LoopStrategy;

// ── AnalysisOptions ───────────────────────────────────────────────────────────

/// Knobs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub taxonomy: Taxonomy,
    /// Node budget; larger graphs are pruned.
    pub max_nodes: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            taxonomy: Taxonomy::default(),
            max_nodes: DEFAULT_MAX_NODES as usize,
        }
    }
}

impl AnalysisOptions {
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }
}

// ── CallRecord ────────────────────────────────────────────────────────────────

/// Everything a parser knows about one call, besides its steps.
#[derive(Debug, Clone, Default)]
pub struct CallRecord<'a> {
    pub id: String,
    pub indicator: Option<&'a str>,
    pub termination_reason: Option<&'a str>,
    pub duration_seconds: u64,
    pub hour: Option<u32>,
    pub weekday: Option<String>,
    pub product: String,
}

// ── SnapshotAssembler ─────────────────────────────────────────────────────────

/// Collects calls of one input and produces the final snapshot.
pub struct SnapshotAssembler<'a> {
    options: &'a AnalysisOptions,
    strategy: LoopStrategy,
    builder: GraphBuilder,
    stats: StatsAggregator,
    journeys: Vec<Journey>,
    steps: Vec<NavigationStep>,
    contact: Option<ContactDetails>,
    report: ProcessingReport,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(format: InputFormat, strategy: LoopStrategy, options: &'a AnalysisOptions) -> Self {
        Self {
            options,
            strategy,
            builder: GraphBuilder::new(),
            stats: StatsAggregator::new(),
            journeys: Vec::new(),
            steps: Vec::new(),
            contact: None,
            report: ProcessingReport::new(format),
        }
    }

    /// Add one call given its non-noise steps in input order.
    ///
    /// The end state is read from the last valid step before loop
    /// elimination. Returns `None` when `valid` is empty.
    pub fn add_call(&mut self, record: CallRecord<'_>, valid: Vec<NavigationStep>) -> Option<EndState> {
        let last_step = valid.last()?.menu_name.clone();
        let destination = EndStateClassifier::new(&self.options.taxonomy).classify(&OutcomeSignals {
            last_step: Some(&last_step),
            indicator: record.indicator,
            termination_reason: record.termination_reason,
        });

        let path = self.strategy.apply(valid);
        self.builder.add_session(&path, destination);

        let journey = Journey {
            id: record.id,
            ordered_step_names: path.into_iter().map(|s| s.menu_name).collect(),
            destination,
            duration_seconds: record.duration_seconds,
            hour: record.hour,
            weekday: record.weekday,
            product: record.product,
        };
        debug!(
            "Call {}: {} steps -> {}",
            journey.id,
            journey.ordered_step_names.len(),
            destination
        );
        self.stats.record(&journey);
        self.journeys.push(journey);
        self.report.sessions_processed += 1;
        Some(destination)
    }

    /// Add a pre-aggregated edge (edge-list spreadsheets).
    pub fn add_weighted_edge(&mut self, source: &str, target: &str, weight: u64) {
        self.builder.add_weighted_edge(source, target, weight);
    }

    /// Let node kinds follow edge direction instead of call paths.
    pub fn infer_kinds_from_degree(&mut self) {
        self.builder.infer_kinds_from_degree();
    }

    /// Keep steps (noise included) for drill-down.
    pub fn extend_steps<I: IntoIterator<Item = NavigationStep>>(&mut self, steps: I) {
        self.steps.extend(steps);
    }

    pub fn skip_row(&mut self, row: usize, reason: impl Into<String>) {
        self.report.skipped_rows.push(SkippedRow {
            row,
            reason: reason.into(),
        });
    }

    pub fn set_contact(&mut self, contact: ContactDetails) {
        self.contact = Some(contact);
    }

    pub fn call_count(&self) -> usize {
        self.journeys.len()
    }

    pub fn has_edges(&self) -> bool {
        !self.builder.is_empty()
    }

    pub fn finish(self) -> GraphSnapshot {
        let mut report = self.report;
        let (nodes, edges) = self.builder.finish(self.options.max_nodes, &mut report);
        let temporal = self.stats.finish();
        let metrics = StatsAggregator::metrics(&temporal, &nodes, &edges);

        info!(
            "{} input: {} calls, {} nodes, {} edges, {} rows skipped",
            report.format,
            report.sessions_processed,
            nodes.len(),
            edges.len(),
            report.rows_skipped()
        );

        GraphSnapshot {
            nodes,
            edges,
            journeys: self.journeys,
            steps: self.steps,
            stats: SnapshotStats { temporal, metrics },
            contact: self.contact,
            report,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
