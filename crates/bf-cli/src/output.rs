//! JSON rendering shared by the commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::opts::GlobalOpts;

pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

pub fn print_json<T: Serialize>(opts: &GlobalOpts, value: &T) -> Result<()> {
    println!("{}", to_json(value, opts.pretty)?);
    Ok(())
}

/// Oracle files are always written pretty so diffs stay reviewable.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut text = to_json(value, true)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}
