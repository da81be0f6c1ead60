//! Health aggregation over the engine's execution history.
//!
//! [`HealthAggregator`] recomputes a full
//! [`HealthSnapshot`](jobwatch_core::health::HealthSnapshot) on every call.
//! [`HealthMonitor`] runs it on an interval and keeps the last complete
//! snapshot for readers.

pub mod aggregator;
pub mod config;
pub mod monitor;

pub use aggregator::{HealthAggregator, HealthError};
pub use config::HealthConfig;
pub use monitor::HealthMonitor;
