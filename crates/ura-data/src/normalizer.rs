//! Turns raw parsed steps into [`NavigationStep`]s and separates noise.

use chrono::NaiveDateTime;
use ura_core::models::{NavigationStep, EMPTY_STEP_LABEL};
use ura_core::taxonomy::Taxonomy;

/// Step fields as read from the input, before noise classification.
#[derive(Debug, Clone, Default)]
pub struct RawStep {
    pub session_id: String,
    pub timestamp: Option<NaiveDateTime>,
    pub menu_name: String,
    pub event_name: Option<String>,
    pub point_code: String,
    pub service_type: Option<String>,
}

/// Steps of one parse, split into the graph-eligible ones and the full list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSteps {
    /// Non-noise steps, in input order.
    pub valid: Vec<NavigationStep>,
    /// Every step, noise included, in input order.
    pub all: Vec<NavigationStep>,
}

impl NormalizedSteps {
    /// Build from already-normalized steps, keeping their order.
    pub fn from_steps(steps: Vec<NavigationStep>) -> Self {
        let valid = steps.iter().filter(|s| !s.is_noise).cloned().collect();
        Self { valid, all: steps }
    }

    pub fn has_valid(&self) -> bool {
        !self.valid.is_empty()
    }
}

/// Applies the taxonomy's noise vocabulary to raw steps.
pub struct StepNormalizer<'a> {
    taxonomy: &'a Taxonomy,
}

impl<'a> StepNormalizer<'a> {
    pub fn new(taxonomy: &'a Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// Normalize a single step. Names are trimmed; an empty name is noise
    /// and is published as [`EMPTY_STEP_LABEL`].
    pub fn step(&self, raw: RawStep) -> NavigationStep {
        let trimmed = raw.menu_name.trim();
        let is_noise = self.taxonomy.is_noise(trimmed);
        let menu_name = if trimmed.is_empty() {
            EMPTY_STEP_LABEL.to_string()
        } else {
            trimmed.to_string()
        };
        NavigationStep {
            session_id: raw.session_id,
            timestamp: raw.timestamp,
            menu_name,
            event_name: raw.event_name.filter(|e| !e.trim().is_empty()),
            point_code: raw.point_code.trim().to_string(),
            service_type: raw.service_type.filter(|s| !s.trim().is_empty()),
            is_noise,
        }
    }

    /// Normalize a sequence of steps, preserving order.
    pub fn normalize<I>(&self, raw: I) -> NormalizedSteps
    where
        I: IntoIterator<Item = RawStep>,
    {
        let steps = raw.into_iter().map(|r| self.step(r)).collect();
        NormalizedSteps::from_steps(steps)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
