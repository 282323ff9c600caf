//! Shared building blocks for the URA flow analyzer.
//!
//! Holds the published data model (steps, journeys, graph snapshot), the
//! error taxonomy, the configurable keyword taxonomy, value processors for
//! timestamps and spreadsheet cells, and the command-line settings.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod taxonomy;
