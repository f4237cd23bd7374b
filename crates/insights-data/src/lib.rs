//! Data layer for Visitor Insights.
//!
//! Loads visitor-log CSV files into a [`reader::LogStore`], filters them
//! and aggregates the survivors into entity, session and chart views.

pub mod aggregator;
pub mod analysis;
pub mod filter;
pub mod reader;

pub use insights_core as core;
