//! Terminal UI layer for Visitor Insights.
//!
//! Provides themes, header and indicator components, the entity table,
//! session panels, charts and the main application event loop built on top
//! of [`ratatui`].

pub mod app;
pub mod chart_view;
pub mod components;
pub mod session_view;
pub mod table_view;
pub mod themes;

pub use insights_core as core;
