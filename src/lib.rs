//! Overlay Dimmer command-line application.
//!
//! Wires the overlay engine to a document fixture, persisted settings, and a
//! JSON-lines control channel on stdin/stdout.

pub mod cli;
pub mod config;
pub mod metrics;

pub use config::{AppConfig, ConfigError};
