//! Runtime layer for Visitor Insights.
//!
//! Memoizes the loaded log per source, prefetches enrichment with bounded
//! concurrency and exposes the [`dashboard::Dashboard`] entry point used by
//! the binary and the UI.

pub mod dashboard;
pub mod enrichment;
pub mod log_cache;

pub use insights_core as core;
pub use insights_data as data;
