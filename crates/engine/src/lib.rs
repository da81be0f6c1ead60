//! REST client for the external automation engine.
//!
//! The engine exposes two calls this workspace relies on: a fire-and-forget
//! launch (`POST <webhook base>/<launch path>`) that returns no execution
//! handle, and a listing of recent executions (`GET <api base>/executions`).
//! [`source`] defines the traits the tracker and health aggregator consume so
//! they can run against test doubles.

pub mod api;
pub mod source;

pub use api::{EngineApi, EngineApiError};
pub use source::{ExecutionSource, JobLauncher, LaunchError};
