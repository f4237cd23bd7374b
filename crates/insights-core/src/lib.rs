//! Shared foundation for Visitor Insights.
//!
//! Holds the visit-log data model, the error type, the enrichment seam,
//! CLI settings and the small formatting / timestamp helpers used by the
//! data, runtime and UI crates.

pub mod enrichment;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
