//! BeamChat CLI library
//!
//! Scanning, interactive chat over BLE, and an in-memory simulation of the
//! transfer protocol for the `beamchat` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod simulate;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, CliConfig};
pub use error::{CliError, Result};
pub use simulate::{run_simulation, SimulationReport, SimulationSettings};
