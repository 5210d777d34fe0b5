//! Database module for sitewatch.
//!
//! Provides SQLite storage for the target registry, the metric sample
//! stream, and the alarm history.

mod models;
mod store;

pub use models::*;
pub use store::*;
