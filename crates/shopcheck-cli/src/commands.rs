//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// shopcheck: end-to-end checks for the shopping cart and its repository page
#[derive(Parser, Debug)]
#[command(name = "shopcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the end-to-end scenarios
    Run(RunArgs),

    /// List scenarios and their markers
    List(ListArgs),

    /// Print the effective harness configuration as YAML
    Config(ConfigArgs),
}

/// Harness configuration sources
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigSource {
    /// YAML configuration file
    #[arg(short, long, env = "SHOPCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Shop URL, overriding the configuration
    #[arg(long)]
    pub base_url: Option<String>,

    /// Artifacts directory, overriding the configuration
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

/// Scenario selection flags
#[derive(Args, Debug, Default, Clone)]
pub struct SelectArgs {
    /// Only scenarios whose id contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Only scenarios carrying this marker (repeatable; all must match)
    #[arg(short, long = "marker")]
    pub markers: Vec<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    #[command(flatten)]
    pub source: ConfigSource,

    /// Page backend
    #[arg(short, long, default_value = "fake")]
    pub backend: BackendArg,

    /// Stop at the first failure and skip the rest
    #[arg(long)]
    pub fail_fast: bool,

    /// Report formats to write into <artifacts>/reports (repeatable)
    #[arg(short, long = "report")]
    pub reports: Vec<ReportFormat>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub select: SelectArgs,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub source: ConfigSource,

    /// Print built-in defaults, ignoring files and environment
    #[arg(long)]
    pub defaults: bool,
}

/// Page backend driving the scenarios
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendArg {
    /// Offline in-process shop
    #[default]
    Fake,
    /// Real chromium over CDP
    Chromium,
}

/// Report output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// HTML report
    #[default]
    Html,
    /// `JUnit` XML
    Junit,
    /// JSON
    Json,
}

impl ReportFormat {
    /// File name the report is written under
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Html => "report.html",
            Self::Junit => "junit.xml",
            Self::Json => "report.json",
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
