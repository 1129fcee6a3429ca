//! `battlefield check`: run every scenario and compare each report against
//! its oracle file in the scenario directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

use super::compare::compare_files;
use crate::opts::GlobalOpts;
use crate::output::write_json;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only check these scenarios (default: all)
    pub scenarios: Vec<String>,

    /// Replace mismatching or missing oracle files with the actual reports
    #[arg(long)]
    pub accept: bool,
}

pub fn cmd_check(opts: &GlobalOpts, args: &CheckArgs) -> Result<bool> {
    let Some(dir) = opts.scenario_dir.clone() else {
        bail!("no scenario directory; pass --scenario-dir or set BF_SCENARIO_DIR");
    };
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let selected = if args.scenarios.is_empty() {
        bf_fixture::scenarios().iter().collect::<Vec<_>>()
    } else {
        args.scenarios
            .iter()
            .map(|name| bf_fixture::find(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut failing = Vec::new();
    for scenario in selected {
        let report = scenario.run()?;
        let actual: PathBuf = dir.join(format!("{}.actual.json", scenario.name));
        let expected: PathBuf = dir.join(format!("{}.expected.json", scenario.name));
        write_json(&actual, &report)?;
        tracing::debug!(scenario = scenario.name, "comparing against {}", expected.display());
        if !compare_files(opts, &expected, &actual, args.accept)? {
            failing.push(scenario.name);
        }
    }

    if failing.is_empty() {
        Ok(true)
    } else {
        eprintln!("{} scenario(s) differ: {}", failing.len(), failing.join(", "));
        Ok(false)
    }
}
