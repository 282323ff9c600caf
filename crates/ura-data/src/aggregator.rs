//! Temporal and categorical counters over journeys, and headline metrics.

use chrono::{Datelike, NaiveDateTime, Timelike};
use ura_core::data_processors::weekday_label;
use ura_core::formatting::percentage;
use ura_core::models::{
    EndState, FlowMetrics, GraphEdge, GraphNode, Journey, NavigationStep, TemporalStats,
};

// ── StatsAggregator ───────────────────────────────────────────────────────────

/// Accumulates [`TemporalStats`] one journey at a time.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    stats: TemporalStats,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    /// Start with every outcome present at zero so consumers always see all
    /// four end states.
    pub fn new() -> Self {
        let mut stats = TemporalStats::default();
        for state in EndState::ALL {
            stats.by_indicator.insert(state.label().to_string(), 0);
        }
        Self { stats }
    }

    pub fn record(&mut self, journey: &Journey) {
        let stats = &mut self.stats;
        stats.journeys += 1;
        stats.total_duration_seconds += journey.duration_seconds;

        if let Some(hour) = journey.hour {
            *stats.by_hour.entry(hour).or_insert(0) += 1;
        }
        if let Some(weekday) = journey.weekday.as_deref().filter(|w| !w.is_empty()) {
            *stats.by_weekday.entry(weekday.to_string()).or_insert(0) += 1;
        }
        *stats
            .by_product
            .entry(journey.product.clone())
            .or_insert(0) += 1;
        *stats
            .by_indicator
            .entry(journey.destination.label().to_string())
            .or_insert(0) += 1;
    }

    pub fn finish(self) -> TemporalStats {
        self.stats
    }

    /// Headline metrics from finished stats and the final graph.
    pub fn metrics(stats: &TemporalStats, nodes: &[GraphNode], edges: &[GraphEdge]) -> FlowMetrics {
        let sessions = stats.journeys as f64;
        FlowMetrics {
            total_sessions: stats.journeys,
            average_duration_seconds: stats.average_duration().round() as u64,
            transfer_rate: percentage(
                stats.outcome_count(EndState::Transferencia) as f64,
                sessions,
                1,
            ),
            abandonment_rate: percentage(
                stats.outcome_count(EndState::Abandono) as f64,
                sessions,
                1,
            ),
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            total_weight: edges.iter().map(|e| e.weight).sum(),
        }
    }
}

/// Seconds between the first and last timestamped step.
pub fn span_seconds(steps: &[NavigationStep]) -> u64 {
    let mut stamps = steps.iter().filter_map(|s| s.timestamp);
    let Some(first) = stamps.next() else {
        return 0;
    };
    let last = stamps.last().unwrap_or(first);
    (last - first).num_seconds().max(0) as u64
}

/// `(hour, weekday label)` of a timestamp.
pub fn hour_and_weekday(ts: &NaiveDateTime) -> (u32, String) {
    (ts.hour(), weekday_label(ts.weekday()).to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
