//! Entry points of the engine.
//!
//! Detects the input layout, dispatches to the matching parser and checks the
//! resulting [`GraphSnapshot`]. Directory runs analyze every log file on its
//! own; a failure in one file does not stop the others.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use ura_core::error::{FlowError, Result};
use ura_core::models::{Cell, GraphSnapshot, InputFormat, NavigationStep};

use crate::detector::detect_format;
use crate::key_value::parse_key_value_session;
use crate::pipe_log::parse_pipe_log;
use crate::pipeline::AnalysisOptions;
use crate::tabular::{is_call_sheet, parse_edge_list, parse_tabular_rows};

/// Extensions picked up by [`analyze_directory`].
pub const LOG_EXTENSIONS: &[&str] = &["txt", "log"];

/// Outcome of one file in a directory run.
#[derive(Debug)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub result: Result<GraphSnapshot>,
}

// ── Text and rows ─────────────────────────────────────────────────────────────

/// Detect the layout of `text` and parse it.
pub fn analyze_text(text: &str, options: &AnalysisOptions) -> Result<GraphSnapshot> {
    let format = detect_format(text)?;
    analyze_text_as(text, format, options)
}

/// Parse `text` with an explicit layout, skipping detection.
pub fn analyze_text_as(
    text: &str,
    format: InputFormat,
    options: &AnalysisOptions,
) -> Result<GraphSnapshot> {
    if options.max_nodes == 0 {
        return Err(FlowError::Config("max_nodes must be positive".to_string()));
    }
    let snapshot = match format {
        InputFormat::KeyValue => parse_key_value_session(text, options)?,
        InputFormat::PipeLog => parse_pipe_log(text, options)?,
        InputFormat::Tabular => {
            return Err(FlowError::Config(
                "tabular input must be split into rows first".to_string(),
            ))
        }
    };
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

/// Parse spreadsheet rows.
///
/// Sheets whose header names neither `FLUXO` nor `INDICADOR` are read as a
/// plain `source, target, value` edge list.
pub fn analyze_rows(rows: &[Vec<Cell>], options: &AnalysisOptions) -> Result<GraphSnapshot> {
    if options.max_nodes == 0 {
        return Err(FlowError::Config("max_nodes must be positive".to_string()));
    }
    let Some(header) = rows.first() else {
        return Err(FlowError::EmptySpreadsheet);
    };
    let snapshot = if is_call_sheet(header) {
        parse_tabular_rows(rows, options)?
    } else {
        debug!("Header has no FLUXO/INDICADOR, reading sheet as an edge list");
        parse_edge_list(rows, options)?
    };
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

// ── Files ─────────────────────────────────────────────────────────────────────

/// Read a whole file as text.
pub fn load_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| FlowError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and analyze one text file.
pub fn analyze_file(path: &Path, options: &AnalysisOptions) -> Result<GraphSnapshot> {
    let text = load_text(path)?;
    analyze_text(&text, options)
}

/// Find all `.txt` / `.log` files recursively under `dir`, sorted by path.
pub fn find_log_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Input path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| LOG_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Analyze every log file under `dir` independently.
pub fn analyze_directory(dir: &Path, options: &AnalysisOptions) -> Vec<FileAnalysis> {
    // ── Step 1: Discover files ────────────────────────────────────────────────
    let files = find_log_files(dir);
    if files.is_empty() {
        warn!("No .txt or .log files found in {}", dir.display());
        return Vec::new();
    }

    // ── Step 2: Analyze each file ─────────────────────────────────────────────
    let results: Vec<FileAnalysis> = files
        .into_iter()
        .map(|path| {
            let result = analyze_file(&path, options);
            if let Err(err) = &result {
                warn!("Failed to analyze {}: {}", path.display(), err);
            }
            FileAnalysis { path, result }
        })
        .collect();

    // ── Step 3: Summarize ─────────────────────────────────────────────────────
    let ok = results.iter().filter(|r| r.result.is_ok()).count();
    info!(
        "Analyzed {} files in {} ({} ok, {} failed)",
        results.len(),
        dir.display(),
        ok,
        results.len() - ok
    );
    results
}

// ── Snapshot helpers ──────────────────────────────────────────────────────────

/// Steps whose menu name is `name`, for drill-down on a clicked node.
pub fn filter_steps_by_node<'a>(steps: &'a [NavigationStep], name: &str) -> Vec<&'a NavigationStep> {
    steps.iter().filter(|s| s.menu_name == name).collect()
}

/// Check the structural guarantees of a snapshot.
///
/// Nodes and edges are non-empty, the node set equals the set of edge
/// endpoints, no edge is a self-loop and every weight is at least 1.
pub fn validate_snapshot(snapshot: &GraphSnapshot) -> Result<()> {
    if snapshot.nodes.is_empty() {
        return Err(FlowError::InvalidSnapshot("graph has no nodes".to_string()));
    }
    if snapshot.edges.is_empty() {
        return Err(FlowError::InvalidSnapshot("graph has no edges".to_string()));
    }

    let names: HashSet<&str> = snapshot.nodes.iter().map(|n| n.name.as_str()).collect();
    for edge in &snapshot.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !names.contains(endpoint.as_str()) {
                return Err(FlowError::InvalidSnapshot(format!(
                    "edge {} -> {} references unknown node {}",
                    edge.source, edge.target, endpoint
                )));
            }
        }
        if edge.source == edge.target {
            return Err(FlowError::InvalidSnapshot(format!(
                "self-loop on {}",
                edge.source
            )));
        }
        if edge.weight == 0 {
            return Err(FlowError::InvalidSnapshot(format!(
                "edge {} -> {} has zero weight",
                edge.source, edge.target
            )));
        }
    }

    let endpoints: HashSet<&str> = snapshot
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();
    if let Some(orphan) = snapshot.nodes.iter().find(|n| !endpoints.contains(n.name.as_str())) {
        return Err(FlowError::InvalidSnapshot(format!(
            "node {} has no edges",
            orphan.name
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
