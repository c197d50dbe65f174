//! shopcheck CLI
//!
//! ## Usage
//!
//! ```bash
//! shopcheck run                          # Every scenario on the offline shop
//! shopcheck run -m smoke --report junit  # Smoke scenario, JUnit report
//! shopcheck run --backend chromium       # Real browser (feature `browser`)
//! shopcheck list --marker cart
//! shopcheck config --config shopcheck.yaml
//! ```

use clap::Parser;
use shopcheck::HarnessConfig;
use shopcheck_cli::{
    resolve_config, selected_cases, selection, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs,
    ListArgs, RunArgs, SuiteRunner, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(config.verbosity);

    match cli.command {
        Commands::Run(args) => run_suite(&config, &args),
        Commands::List(args) => {
            run_list(&args);
            Ok(())
        }
        Commands::Config(args) => run_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    let use_color = color.should_color();
    console::set_colors_enabled(use_color);
    console::set_colors_enabled_stderr(use_color);
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}

/// Global stderr subscriber; each test installs its own scoped one
fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env("SHOPCHECK_CLI_LOG").unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_suite(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("failed to start async runtime: {e}")))?;
    let mut runner = SuiteRunner::new(config);
    let reporter = rt.block_on(runner.run(args))?;

    let failed = reporter.failed_count();
    if failed > 0 {
        return Err(CliError::TestsFailed {
            failed,
            total: reporter.total_count(),
        });
    }
    Ok(())
}

fn run_list(args: &ListArgs) {
    for case in selected_cases(&selection(&args.select)) {
        println!("{}  [{}]", case.node_id, case.markers.join(", "));
    }
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let config = if args.defaults {
        HarnessConfig::default()
    } else {
        resolve_config(&args.source)?
    };
    print!("{}", config.to_yaml()?);
    Ok(())
}
