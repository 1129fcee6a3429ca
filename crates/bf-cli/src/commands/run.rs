//! `battlefield run`: execute one scenario and emit its report.

use std::path::PathBuf;

use anyhow::Result;
use bf_kernel::KernelConfig;
use clap::Args;

use crate::opts::GlobalOpts;
use crate::output::{to_json, write_json};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario name (see `battlefield scenarios`)
    pub scenario: String,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Maximum inline recursion depth
    #[arg(long, default_value_t = KernelConfig::default().max_inline_depth)]
    pub max_inline_depth: u32,

    /// Keep repeated notifications to the same account within one context
    #[arg(long)]
    pub no_dedupe: bool,
}

pub fn cmd_run(opts: &GlobalOpts, args: &RunArgs) -> Result<()> {
    let scenario = bf_fixture::find(&args.scenario)?;
    let config = KernelConfig {
        max_inline_depth: args.max_inline_depth,
        dedupe_notifications: !args.no_dedupe,
        ..KernelConfig::default()
    };
    let report = scenario.run_with(config)?;
    tracing::info!(
        scenario = scenario.name,
        passes = report.receipts.len(),
        state = %report.state_hash,
        "scenario finished"
    );
    match &args.out {
        Some(path) => {
            write_json(path, &report)?;
            if !opts.json {
                println!("wrote {}", path.display());
            }
        }
        // Text mode pretty-prints the report.
        None => println!("{}", to_json(&report, opts.pretty || !opts.json)?),
    }
    Ok(())
}
