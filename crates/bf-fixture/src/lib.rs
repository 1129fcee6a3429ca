//! The battlefield conformance fixture: contract actions over the keyed
//! store, wired into the dispatch kernel, plus named scenarios whose reports
//! serve as an execution witness.

pub mod account;
pub mod actions;
pub mod contract;
pub mod scenarios;
mod sk;
pub mod tables;

use bf_kernel::KernelError;
use thiserror::Error;

pub use account::{AccountName, NameError};
pub use contract::{BATTLEFIELD, BATTLEFIELD_PEER, Battlefield, DTRX_SENDER_ID, onerror};
pub use scenarios::{Scenario, ScenarioReport, Step, find, fixture_kernel, scenarios};
pub use tables::{BattlefieldTables, ChainState, MemberRow, SkRow, StateWitness};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("state witness: {0}")]
    Witness(String),
}
