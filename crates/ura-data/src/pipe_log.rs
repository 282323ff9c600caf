//! Parser for pipe-delimited multi-session logs.
//!
//! Each line is `call_id|timestamp|token|token|...`. Tokens that parse as
//! numbers are checkpoint codes, the rest are flow names; the two lists are
//! paired positionally and unpaired tails are discarded. A call may span
//! several lines.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use ura_core::data_processors::{is_numeric_token, TimestampProcessor};
use ura_core::error::{FlowError, Result};
use ura_core::models::{GraphSnapshot, InputFormat, NavigationStep, UNKNOWN_PRODUCT};

use crate::aggregator::{hour_and_weekday, span_seconds};
use crate::loops::LoopStrategy;
use crate::normalizer::{NormalizedSteps, RawStep, StepNormalizer};
use crate::pipeline::{AnalysisOptions, CallRecord, SnapshotAssembler};

/// One parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub session_id: String,
    pub timestamp: Option<NaiveDateTime>,
    pub flows: Vec<String>,
    pub points: Vec<String>,
}

impl LogLine {
    /// Parse a line with at least three `|`-separated fields.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 3 {
            return None;
        }
        let (flows, points): (Vec<&str>, Vec<&str>) = parts[2..]
            .iter()
            .copied()
            .filter(|token| !token.is_empty())
            .partition(|token| !is_numeric_token(token));
        Some(Self {
            session_id: parts[0].to_string(),
            timestamp: TimestampProcessor::parse_str(parts[1]),
            flows: flows.into_iter().map(str::to_string).collect(),
            points: points.into_iter().map(str::to_string).collect(),
        })
    }

    /// Flow names paired with checkpoint codes.
    fn raw_steps(self) -> impl Iterator<Item = RawStep> {
        let LogLine {
            session_id,
            timestamp,
            flows,
            points,
        } = self;
        flows.into_iter().zip(points).map(move |(menu_name, point_code)| RawStep {
            session_id: session_id.clone(),
            timestamp,
            menu_name,
            point_code,
            ..Default::default()
        })
    }
}

/// Timestamp order; steps without a timestamp sort last.
fn by_timestamp(a: &NavigationStep, b: &NavigationStep) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Parse a pipe-delimited log into a snapshot.
///
/// Steps are stable-sorted by timestamp and grouped by call in order of first
/// appearance. Within a call consecutive repeats are collapsed. Calls with no
/// valid step are dropped; if none remain the result is
/// [`FlowError::NoValidSteps`].
pub fn parse_pipe_log(text: &str, options: &AnalysisOptions) -> Result<GraphSnapshot> {
    let normalizer = StepNormalizer::new(&options.taxonomy);
    let mut lines_read = 0usize;
    let mut steps: Vec<NavigationStep> = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match LogLine::parse(line) {
            Some(parsed) => {
                lines_read += 1;
                steps.extend(parsed.raw_steps().map(|raw| normalizer.step(raw)));
            }
            None => debug!("Skipping log line with fewer than 3 fields: {}", line),
        }
    }
    steps.sort_by(by_timestamp);

    let mut order: Vec<String> = Vec::new();
    let mut sessions: HashMap<String, Vec<NavigationStep>> = HashMap::new();
    for step in &steps {
        if !sessions.contains_key(&step.session_id) {
            order.push(step.session_id.clone());
        }
        sessions
            .entry(step.session_id.clone())
            .or_default()
            .push(step.clone());
    }
    debug!(
        "Pipe log: {} lines, {} steps, {} calls",
        lines_read,
        steps.len(),
        order.len()
    );

    let mut assembler = SnapshotAssembler::new(InputFormat::PipeLog, LoopStrategy::Consecutive, options);
    assembler.extend_steps(steps);

    for id in order {
        let Some(session) = sessions.remove(&id) else {
            continue;
        };
        let NormalizedSteps { valid, .. } = NormalizedSteps::from_steps(session);
        if valid.is_empty() {
            debug!("Call {} has only noise steps, dropped", id);
            continue;
        }

        let (hour, weekday) = match valid.iter().find_map(|s| s.timestamp) {
            Some(ts) => {
                let (hour, weekday) = hour_and_weekday(&ts);
                (Some(hour), Some(weekday))
            }
            None => (None, None),
        };
        let record = CallRecord {
            id,
            duration_seconds: span_seconds(&valid),
            hour,
            weekday,
            product: UNKNOWN_PRODUCT.to_string(),
            ..Default::default()
        };
        assembler.add_call(record, valid);
    }

    if assembler.call_count() == 0 {
        warn!("Pipe log has no calls with valid navigation steps");
        return Err(FlowError::NoValidSteps);
    }
    Ok(assembler.finish())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
