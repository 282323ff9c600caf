//! Classifies raw input text as a key-value session or a pipe-delimited log.

use tracing::debug;
use ura_core::error::{FlowError, Result};
use ura_core::models::InputFormat;

/// Number of leading lines inspected.
const SNIFF_LINES: usize = 5;

/// Any of these in the first lines marks a key-value session file.
const KEY_VALUE_MARKERS: &[&str] = &[
    "cod_identificacao_ligacao",
    "fluxo_1",
    "ponto_1",
    "Detalhes do Contato",
];

/// Detect the layout of `text`.
///
/// Spreadsheet rows never reach this function; they arrive already split into
/// cells and go straight to the tabular parser.
pub fn detect_format(text: &str) -> Result<InputFormat> {
    let head = text.lines().take(SNIFF_LINES).collect::<Vec<_>>().join("\n");
    if KEY_VALUE_MARKERS.iter().any(|marker| head.contains(marker)) {
        debug!("Detected key-value session");
        return Ok(InputFormat::KeyValue);
    }

    // Segments are counted over the joined head, not per line.
    if head.split('|').count() > 3 {
        debug!("Detected pipe-delimited log");
        return Ok(InputFormat::PipeLog);
    }

    Err(FlowError::UnrecognizedFormat)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
