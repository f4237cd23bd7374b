//! Small line-level widgets shared by the dashboard views.

pub mod header;
pub mod indicators;
