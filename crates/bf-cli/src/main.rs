mod commands;
mod opts;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::check::CheckArgs;
use commands::compare::CompareArgs;
use commands::run::RunArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(
    name = "battlefield",
    version,
    about = "Run dispatch-ordering scenarios and compare their traces"
)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List built-in scenarios
    Scenarios,

    /// Run one scenario and print or write its report
    Run(RunArgs),

    /// Compare two JSON documents; exits 1 when they differ
    Compare(CompareArgs),

    /// Run scenarios against the oracle files in the scenario directory
    Check(CheckArgs),
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn setup_logging(opts: &GlobalOpts) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(opts.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let opts = &cli.opts;
    setup_logging(opts);

    let ok = match cli.command {
        Command::Scenarios => commands::scenarios::cmd_scenarios(opts).map(|()| true)?,
        Command::Run(args) => commands::run::cmd_run(opts, &args).map(|()| true)?,
        Command::Compare(args) => commands::compare::cmd_compare(opts, &args)?,
        Command::Check(args) => commands::check::cmd_check(opts, &args)?,
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
