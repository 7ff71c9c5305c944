//! Execution engine module.
//!
//! This module partitions work, runs fork-join passes on the worker pool,
//! aggregates progress and carries the cancellation signal.

pub mod cancel;
pub mod context;
pub mod engine;
pub mod partition;
pub mod progress;

pub use cancel::CancellationToken;
pub use context::{split_window, FilterContext, ProgressWindow, FULL_WINDOW};
pub use engine::{FilterEngine, RunStatus};
pub use partition::partition;
pub use progress::{ProgressCallback, ProgressState};
