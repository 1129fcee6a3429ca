//! `battlefield scenarios`: list the built-in scenarios.

use anyhow::Result;
use serde_json::json;

use crate::opts::GlobalOpts;
use crate::output::print_json;

pub fn cmd_scenarios(opts: &GlobalOpts) -> Result<()> {
    let catalog = bf_fixture::scenarios();
    if opts.json {
        let entries: Vec<_> = catalog
            .iter()
            .map(|scenario| json!({ "name": scenario.name, "summary": scenario.summary }))
            .collect();
        return print_json(opts, &entries);
    }
    let width = catalog
        .iter()
        .map(|scenario| scenario.name.len())
        .max()
        .unwrap_or(0);
    for scenario in catalog {
        println!("{:width$}  {}", scenario.name, scenario.summary);
    }
    Ok(())
}
