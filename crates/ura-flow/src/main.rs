mod bootstrap;
mod summary;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use ura_core::models::{GraphSnapshot, InputFormat};
use ura_core::settings::Settings;
use ura_core::taxonomy::Taxonomy;
use ura_data::analysis::{analyze_directory, analyze_rows, analyze_text, analyze_text_as, load_text};
use ura_data::pipeline::AnalysisOptions;

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("URA flow v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {}, format: {}, max nodes: {}",
        settings.input.display(),
        settings.format,
        settings.max_nodes
    );

    let taxonomy = Taxonomy::load_or_default(settings.taxonomy.as_deref())?;
    let options = AnalysisOptions::default()
        .with_taxonomy(taxonomy)
        .with_max_nodes(settings.max_nodes as usize);

    let rendered = if settings.input.is_dir() {
        run_directory(&settings.input, &options, &settings)?
    } else {
        let snapshot = run_file(&settings.input, settings.format_override(), &options)?;
        if settings.summary {
            summary::render_summary(&snapshot)
        } else {
            to_json(&snapshot, settings.pretty)?
        }
    };

    match &settings.output {
        Some(path) => {
            std::fs::write(path, rendered.as_bytes())
                .with_context(|| format!("cannot write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                writeln!(stdout)?;
            }
        }
    }

    Ok(())
}

/// Analyze one file, splitting `.csv`/`.tsv` (or `--format tabular`) into rows.
fn run_file(path: &Path, format: Option<InputFormat>, options: &AnalysisOptions) -> Result<GraphSnapshot> {
    let tabular = format == Some(InputFormat::Tabular) || (format.is_none() && bootstrap::is_table_file(path));
    let snapshot = if tabular {
        let rows = bootstrap::load_rows(path)?;
        analyze_rows(&rows, options)?
    } else {
        let text = load_text(path)?;
        match format {
            Some(format) => analyze_text_as(&text, format, options)?,
            None => analyze_text(&text, options)?,
        }
    };
    Ok(snapshot)
}

/// Analyze every log file in `dir`; fails only when no file succeeds.
fn run_directory(dir: &Path, options: &AnalysisOptions, settings: &Settings) -> Result<String> {
    let results = analyze_directory(dir, options);
    if results.is_empty() {
        anyhow::bail!("no .txt or .log files found in {}", dir.display());
    }
    if results.iter().all(|r| r.result.is_err()) {
        anyhow::bail!("none of the {} files in {} could be analyzed", results.len(), dir.display());
    }

    if settings.summary {
        let mut out = String::new();
        for file in &results {
            out.push_str(&format!("== {} ==\n", file.path.display()));
            match &file.result {
                Ok(snapshot) => out.push_str(&summary::render_summary(snapshot)),
                Err(err) => out.push_str(&format!("error: {}\n", err)),
            }
            out.push('\n');
        }
        return Ok(out);
    }

    let entries: Vec<Value> = results
        .iter()
        .map(|file| match &file.result {
            Ok(snapshot) => json!({ "path": file.path, "snapshot": snapshot }),
            Err(err) => json!({ "path": file.path, "error": err.to_string() }),
        })
        .collect();
    to_json(&entries, settings.pretty)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}
