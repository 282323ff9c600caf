//! Log-to-graph ETL engine for URA call logs.
//!
//! Detects the input layout, parses key-value sessions, pipe-delimited logs
//! and spreadsheet rows into navigation steps, filters noise, removes loops
//! with the strategy each parser calls for, classifies how every call ended,
//! and folds the result into a pruned, weighted flow graph with statistics.

pub mod aggregator;
pub mod analysis;
pub mod builder;
pub mod classifier;
pub mod cycles;
pub mod detector;
pub mod key_value;
pub mod loops;
pub mod normalizer;
pub mod pipe_log;
pub mod pipeline;
pub mod pruner;
pub mod tabular;

pub use ura_core as core;
