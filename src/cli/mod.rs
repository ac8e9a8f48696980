// CLI module for local-sync
//
// Argument parsing, the saved songs directory, run orchestration and summary
// output. The binary in main.rs is a thin wrapper over this module.

pub mod commands;
pub mod config;
pub mod output;

pub use commands::run_sync;
pub use config::{Config, DirectoryPicker, OutputFormat, PathConfig, StdinPicker};
pub use output::OutputFormatter;
