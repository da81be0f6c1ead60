//! Wiring for the `jobwatch-monitor` daemon.

pub mod app;
pub mod config;
