//! Execution tracking for launched jobs.
//!
//! The engine returns no handle when a job is launched, so each launch gets
//! an [`ExecutionTracker`](tracker::ExecutionTracker): a state object that
//! shows simulated progress and, every few ticks, asks a
//! [`Correlator`](correlator::Correlator) whether a matching execution has
//! appeared in the engine's history. [`driver`] advances one tracker on a
//! timer; [`manager`] owns many independent trackers.

pub mod clock;
pub mod config;
pub mod correlator;
pub mod driver;
pub mod manager;
pub mod summary;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{TimeoutPolicy, TrackerConfig};
pub use correlator::{Correlator, TimeWindowCorrelator};
pub use driver::TrackerDriver;
pub use manager::{TrackerManager, TrackerManagerError};
pub use summary::{PgResultSummary, ResultSummary, ResultSummarySource};
pub use tracker::{ExecutionTracker, TrackerState, TrackerView};
