//! Keyword vocabularies that drive noise filtering and end-state detection.
//!
//! The vocabulary lives in data rather than in the parsers so it can grow
//! without touching parsing logic. A [`Taxonomy`] can be loaded from a JSON
//! file; any section missing from the file keeps its built-in default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlowError, Result};
use crate::models::EndState;

// ── KeywordSet ────────────────────────────────────────────────────────────────

/// A list of case-insensitive substring patterns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet {
    patterns: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// The raw patterns, in declaration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// First pattern contained in `text`, ignoring case.
    pub fn find(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.patterns
            .iter()
            .find(|p| lower.contains(&p.to_lowercase()))
            .map(String::as_str)
    }

    /// `true` when any pattern is contained in `text`, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        self.find(text).is_some()
    }
}

// ── OutcomeRule ───────────────────────────────────────────────────────────────

/// Maps a set of patterns to the end state they signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRule {
    pub state: EndState,
    pub patterns: KeywordSet,
}

impl OutcomeRule {
    pub fn new<I, S>(state: EndState, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state,
            patterns: KeywordSet::new(patterns),
        }
    }
}

/// Return the state of the first rule matching `text`.
pub fn first_outcome(rules: &[OutcomeRule], text: &str) -> Option<EndState> {
    rules
        .iter()
        .find(|rule| rule.patterns.matches(text))
        .map(|rule| rule.state)
}

// ── Taxonomy ──────────────────────────────────────────────────────────────────

/// Complete keyword configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Taxonomy {
    /// Step names containing any of these are technical noise.
    pub noise: KeywordSet,
    /// Rules applied to the last step name, in priority order.
    pub step_outcomes: Vec<OutcomeRule>,
    /// Rules applied to the indicator field, in priority order.
    pub indicator_outcomes: Vec<OutcomeRule>,
    /// Rules applied to the free-text termination reason.
    pub reason_outcomes: Vec<OutcomeRule>,
    /// Outcome used when nothing else matches.
    pub default_outcome: EndState,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            noise: KeywordSet::new([
                "Else",
                "Else_Invalido",
                "Silencio",
                "Menu_Chutes",
                "Erro",
                "Timeout",
            ]),
            step_outcomes: vec![
                OutcomeRule::new(EndState::Transferencia, ["transfer"]),
                OutcomeRule::new(EndState::Finalizacao, ["finaliz", "fim", "encerra"]),
                OutcomeRule::new(EndState::Desconexao, ["desconex", "desliga"]),
            ],
            indicator_outcomes: vec![
                OutcomeRule::new(EndState::Abandono, ["abandon"]),
                OutcomeRule::new(EndState::Transferencia, ["transfer"]),
                OutcomeRule::new(EndState::Desconexao, ["desconex"]),
                OutcomeRule::new(EndState::Finalizacao, ["finaliz"]),
            ],
            reason_outcomes: vec![OutcomeRule::new(EndState::Desconexao, ["desligou"])],
            default_outcome: EndState::Desconexao,
        }
    }
}

impl Taxonomy {
    /// Default location: `~/.ura-flow/taxonomy.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| Self::default_path_in(&home))
    }

    /// The default location rooted at `base_dir` (used for testing).
    pub fn default_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".ura-flow").join("taxonomy.json")
    }

    /// Load a taxonomy from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| FlowError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let taxonomy: Taxonomy = serde_json::from_str(&content)?;
        taxonomy.validate()?;
        debug!("Loaded taxonomy from {}", path.display());
        Ok(taxonomy)
    }

    /// Load from `explicit` when given, otherwise from the default location
    /// when that file exists, otherwise return the built-in vocabulary.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        Self::resolve(explicit, Self::default_path().as_deref())
    }

    fn resolve(explicit: Option<&Path>, fallback: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match fallback {
            Some(path) if path.exists() => Self::load_from(path),
            _ => Ok(Self::default()),
        }
    }

    /// Reject empty patterns, which would match every string.
    pub fn validate(&self) -> Result<()> {
        let rule_sets = self
            .step_outcomes
            .iter()
            .chain(&self.indicator_outcomes)
            .chain(&self.reason_outcomes)
            .map(|rule| &rule.patterns);

        for set in std::iter::once(&self.noise).chain(rule_sets) {
            if set.patterns().iter().any(|p| p.trim().is_empty()) {
                return Err(FlowError::Config(
                    "taxonomy patterns must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// `true` when `name` is empty or matches a noise pattern.
    pub fn is_noise(&self, name: &str) -> bool {
        name.trim().is_empty() || self.noise.matches(name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
