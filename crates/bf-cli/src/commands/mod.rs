//! CLI command handlers.

pub mod check;
pub mod compare;
pub mod run;
pub mod scenarios;
