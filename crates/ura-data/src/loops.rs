//! Loop elimination inside a single call's step sequence.
//!
//! Callers who wander back to a menu they already visited would otherwise
//! produce back-edges and self-loops in the flow graph. Each parser picks the
//! [`LoopStrategy`] matching its input layout.

use std::collections::{HashMap, HashSet};

use ura_core::models::NavigationStep;

/// Anything that carries a step name the loop strategies can compare.
pub trait StepName {
    fn step_name(&self) -> &str;
}

impl StepName for NavigationStep {
    fn step_name(&self) -> &str {
        &self.menu_name
    }
}

impl StepName for String {
    fn step_name(&self) -> &str {
        self
    }
}

impl StepName for &str {
    fn step_name(&self) -> &str {
        self
    }
}

/// How a session's steps are cleaned before they become edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStrategy {
    /// Keep only the first occurrence of every name.
    FirstSeen,
    /// Only collapse adjacent repeats; revisits stay in the path.
    Consecutive,
    /// Collapse repeats, then drop every detour that returns to an earlier
    /// name (see [`remove_loops_regressively`]).
    Regressive,
}

impl LoopStrategy {
    pub fn apply<T: StepName>(self, items: Vec<T>) -> Vec<T> {
        match self {
            LoopStrategy::FirstSeen => dedup_first_seen(items),
            LoopStrategy::Consecutive => collapse_consecutive(items),
            LoopStrategy::Regressive => remove_loops_regressively(collapse_consecutive(items)),
        }
    }
}

/// Keep the first occurrence of each name, preserving order.
pub fn dedup_first_seen<T: StepName>(items: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.step_name().to_string()))
        .collect()
}

/// Collapse runs of equal adjacent names into one.
pub fn collapse_consecutive<T: StepName>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let repeat = out
            .last()
            .is_some_and(|prev| prev.step_name() == item.step_name());
        if !repeat {
            out.push(item);
        }
    }
    out
}

/// Remove detours that come back to a name seen earlier.
///
/// Scanning backwards, whenever the name at `i` occurs again at a later
/// index `j` (the nearest one), every step strictly between `i` and `j` is
/// marked removed. The survivors are then rebuilt keeping the first
/// occurrence of each name, so no name repeats in the result:
/// `[A, B, C, B, D, E, C, F]` becomes `[A, B, C, F]`.
pub fn remove_loops_regressively<T: StepName>(items: Vec<T>) -> Vec<T> {
    let mut keep = vec![true; items.len()];
    {
        let mut next_seen: HashMap<&str, usize> = HashMap::new();
        for i in (0..items.len()).rev() {
            let name = items[i].step_name();
            if let Some(&later) = next_seen.get(name) {
                for flag in &mut keep[i + 1..later] {
                    *flag = false;
                }
            }
            next_seen.insert(name, i);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, kept)| kept.then_some(item))
        .filter(|item| seen.insert(item.step_name().to_string()))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
