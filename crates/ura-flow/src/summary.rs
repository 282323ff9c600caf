//! Plain-text rendering of a snapshot for `--summary`.

use std::fmt::Write;

use ura_core::formatting::{format_count, format_duration, format_percent};
use ura_core::models::{EndState, GraphEdge, GraphSnapshot};

/// Number of heaviest transitions listed.
const TOP_EDGES: usize = 10;

/// Render headline metrics, outcomes and the heaviest transitions.
pub fn render_summary(snapshot: &GraphSnapshot) -> String {
    let metrics = &snapshot.stats.metrics;
    let temporal = &snapshot.stats.temporal;
    let report = &snapshot.report;
    let mut out = String::new();

    let _ = writeln!(out, "Format:            {}", report.format);
    let _ = writeln!(out, "Sessions:          {}", format_count(metrics.total_sessions));
    let _ = writeln!(
        out,
        "Average duration:  {}",
        format_duration(metrics.average_duration_seconds)
    );
    let _ = writeln!(out, "Transfer rate:     {}", format_percent(metrics.transfer_rate));
    let _ = writeln!(out, "Abandonment rate:  {}", format_percent(metrics.abandonment_rate));
    let _ = writeln!(
        out,
        "Graph:             {} nodes, {} edges, weight {}",
        metrics.total_nodes,
        metrics.total_edges,
        format_count(metrics.total_weight)
    );

    let _ = writeln!(out, "\nOutcomes:");
    for state in EndState::ALL {
        let _ = writeln!(out, "  {:<15} {}", state.label(), temporal.outcome_count(state));
    }

    let mut edges: Vec<&GraphEdge> = snapshot.edges.iter().collect();
    edges.sort_by(|a, b| b.weight.cmp(&a.weight));
    let _ = writeln!(out, "\nTop transitions:");
    for edge in edges.into_iter().take(TOP_EDGES) {
        let _ = writeln!(out, "  {:>6}  {} -> {}", edge.weight, edge.source, edge.target);
    }

    if let Some(contact) = &snapshot.contact {
        let _ = writeln!(out, "\nContact: URA {}, skill {}, ANI {}", contact.ura_name, contact.skill, contact.ani);
    }

    if report.rows_skipped() > 0 {
        let _ = writeln!(out, "\nSkipped rows: {}", report.rows_skipped());
        for skipped in &report.skipped_rows {
            let _ = writeln!(out, "  row {}: {}", skipped.row, skipped.reason);
        }
    }
    if report.self_loops_removed + report.reciprocal_edges_removed > 0 {
        let _ = writeln!(
            out,
            "\nRemoved {} self-loops and {} reciprocal edges",
            report.self_loops_removed, report.reciprocal_edges_removed
        );
    }
    for cycle in &report.cycles {
        let _ = writeln!(out, "Cycle kept: {}", cycle.join(" -> "));
    }
    if let Some(pruning) = &report.pruning {
        let _ = writeln!(
            out,
            "Pruned to {} of {} nodes ({} of {} edges kept)",
            pruning.nodes_after, pruning.nodes_before, pruning.edges_after, pruning.edges_before
        );
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
