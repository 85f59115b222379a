//! CLI command implementations for herakles-hw-telemetry.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Telemetry source validation
//! - `config`: Configuration file generation
//! - `sample`: One-shot sampling

pub mod check;
pub mod config;
pub mod sample;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use sample::command_sample;
