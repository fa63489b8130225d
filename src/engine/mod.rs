//! Core engine: the per-date scan → collect → sort loop.

pub mod scanner;

pub use scanner::{date_range, shutdown_on, tomorrow, NullObserver, ScanAggregator, ScanObserver, ScanSettings};
