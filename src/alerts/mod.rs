//! Alerting: threshold rules, per-alarm state tracking, the background
//! evaluation engine, and the alarm history recorder.

mod engine;
mod recorder;
mod rules;
mod state;

pub use engine::*;
pub use recorder::*;
pub use rules::*;
pub use state::*;
