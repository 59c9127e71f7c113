//! # dbpulse-core
//!
//! Settings, errors, tracing setup, and shared constants for the dbpulse
//! health-check rule engine.

pub mod config;
pub mod constants;
pub mod errors;
pub mod tracing;

pub use config::Settings;
