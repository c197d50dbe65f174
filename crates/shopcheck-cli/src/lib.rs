//! shopcheck CLI library
//!
//! Command-line front end for the [`shopcheck`] harness: `run` executes the
//! scenarios on a backend and writes reports, `list` shows what a selection
//! picks, `config` prints the effective configuration.

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    BackendArg, Cli, ColorArg, Commands, ConfigArgs, ConfigSource, ListArgs, ReportFormat, RunArgs, SelectArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::{resolve_config, selected_cases, selection, write_reports, SuiteRunner};
