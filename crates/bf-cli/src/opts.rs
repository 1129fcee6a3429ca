//! Global CLI options.

use std::path::PathBuf;

use clap::Args;

/// Options shared by every command; each can also be set through the
/// environment.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Directory holding `<scenario>.expected.json` oracle files (env: BF_SCENARIO_DIR)
    #[arg(long, global = true, env = "BF_SCENARIO_DIR")]
    pub scenario_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text (env: BF_JSON)
    #[arg(long, global = true, env = "BF_JSON")]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log kernel passes and deferred activity to stderr
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalOpts {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
