use clap::Parser;
use std::path::PathBuf;

use crate::models::InputFormat;

/// Default node budget before the graph is pruned.
pub const DEFAULT_MAX_NODES: u32 = 100;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Turn URA call logs into a weighted navigation flow graph
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ura-flow",
    about = "Turn URA call logs into a weighted navigation flow graph",
    version
)]
pub struct Settings {
    /// Input file or directory of session files
    pub input: PathBuf,

    /// Input format
    #[arg(long, default_value = "auto", value_parser = ["auto", "key-value", "pipe-log", "tabular"])]
    pub format: String,

    /// Maximum number of nodes kept in the graph
    #[arg(long, default_value_t = DEFAULT_MAX_NODES, value_parser = clap::value_parser!(u32).range(2..))]
    pub max_nodes: u32,

    /// Keyword taxonomy JSON file (defaults to ~/.ura-flow/taxonomy.json when present)
    #[arg(long, env = "URA_FLOW_TAXONOMY")]
    pub taxonomy: Option<PathBuf>,

    /// Write the snapshot JSON to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print a human-readable summary instead of JSON
    #[arg(long)]
    pub summary: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse process arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::parse().resolved()
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(args).resolved()
    }

    fn resolved(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// Explicit format requested on the command line, `None` for `auto`.
    pub fn format_override(&self) -> Option<InputFormat> {
        match self.format.as_str() {
            "key-value" => Some(InputFormat::KeyValue),
            "pipe-log" => Some(InputFormat::PipeLog),
            "tabular" => Some(InputFormat::Tabular),
            _ => None,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
