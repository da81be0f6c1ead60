//! Domain logic for the jobwatch workspace.
//!
//! Everything in this crate is free of I/O: the job catalog, the execution
//! record model, simulated-progress math, time-window correlation, and the
//! health aggregation rules. The engine, tracker, and health crates layer
//! network calls and timers on top of these functions.

pub mod catalog;
pub mod correlation;
pub mod error;
pub mod execution;
pub mod health;
pub mod progress;
pub mod report;
pub mod types;
