//! FARESCAN: cheapest-fare scanner across a window of departure dates.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cli;
pub mod config;
pub mod types;
pub mod pricing;
pub mod engine;
pub mod report;
