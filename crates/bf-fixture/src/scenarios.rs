//! Named, ready-to-run scenarios and the report each one produces.

use std::time::Duration;

use bf_kernel::{
    Call, DeferredKey, JournalRecord, Kernel, KernelConfig, KernelError, PassReceipt, TreeBuilder,
    TreeSpec,
};
use serde::Serialize;

use crate::FixtureError;
use crate::account::AccountName;
use crate::actions::{AccountArg, CreaOrder, Dtrx, ProduceRows, SkTest, TwoRows, VariantArg};
use crate::contract::{BATTLEFIELD, BATTLEFIELD_PEER, Battlefield, onerror};
use crate::tables::{ChainState, StateWitness};

/// One driver step of a scenario.
#[derive(Debug, Clone)]
pub enum Step {
    Push(Call),
    Tree(TreeSpec),
    Advance(Duration),
}

pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    steps: fn() -> Result<Vec<Step>, FixtureError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingWitness {
    pub key: DeferredKey,
    pub due_at_ms: u64,
    pub action: String,
}

/// Everything a run leaves behind, in the shape the oracle compares.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub receipts: Vec<PassReceipt>,
    pub state: StateWitness,
    pub state_hash: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending_deferred: Vec<PendingWitness>,
    pub journal: Vec<JournalRecord>,
}

/// Kernel with the battlefield contract deployed on both contract accounts
/// and `onerror` installed as the recovery handler.
pub fn fixture_kernel(config: KernelConfig) -> Kernel<ChainState> {
    Kernel::builder(ChainState::new())
        .with_config(config)
        .with_contract(BATTLEFIELD, Battlefield)
        .with_contract(BATTLEFIELD_PEER, Battlefield)
        .with_recovery_handler(onerror)
        .build()
}

fn account(text: &str) -> Result<AccountName, FixtureError> {
    Ok(text.parse::<AccountName>().map_err(KernelError::from)?)
}

/// A call to the battlefield account, authorized by it.
fn action<T: Serialize>(name: &str, payload: &T) -> Result<Step, FixtureError> {
    Ok(Step::Push(
        Call::new(BATTLEFIELD, name, payload)?.authorized_by(BATTLEFIELD),
    ))
}

fn battlefield() -> Result<AccountName, FixtureError> {
    account(BATTLEFIELD)
}

fn creaorder() -> Result<Vec<Step>, FixtureError> {
    let order = CreaOrder {
        n1: account("notified1")?,
        n2: account(BATTLEFIELD_PEER)?,
        n3: account("notified3")?,
        n4: account("notified4")?,
        n5: account("notified5")?,
    };
    Ok(vec![action("creaorder", &order)?])
}

/// The same topology as `creaorder`, built without contract code.
pub fn five_children_tree() -> TreeSpec {
    TreeBuilder::root("root")
        .notify("n1")
        .inline("i2", |b| {
            b.notify("n4")
                .notify("n5")
                .inline("i3", |b| b)
                .context_free("c3")
        })
        .notify_with("n2", |b| b.inline("i1", |b| b).context_free("c1").notify("n3"))
        .context_free("c2")
        .build()
}

fn scripted_order() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![Step::Tree(five_children_tree())])
}

fn db_ops() -> Result<Vec<Step>, FixtureError> {
    let own = AccountArg {
        account: battlefield()?,
    };
    let unauthorized = Call::new(BATTLEFIELD, "dbins", &own)?;
    Ok(vec![
        Step::Push(unauthorized),
        action("dbins", &own)?,
        action("dbins", &own)?,
        action("dbupd", &own)?,
        action("dbrem", &own)?,
        action(
            "dbinstwo",
            &TwoRows {
                account: own.account,
                first: 3,
                second: 4,
            },
        )?,
        action(
            "dbremtwo",
            &TwoRows {
                account: own.account,
                first: 3,
                second: 9,
            },
        )?,
    ])
}

fn variants() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![
        action("varianttest", &VariantArg::Uint16(12))?,
        action("varianttest", &VariantArg::String("hello".into()))?,
        action("producerows", &ProduceRows { row_count: 12 })?,
    ])
}

fn sktest() -> Result<Vec<Step>, FixtureError> {
    ["insert", "update.sk", "update.ot", "remove", "insert", "upsert"]
        .into_iter()
        .map(|step| action("sktest", &SkTest::new(step)))
        .collect()
}

fn dtrx_step(
    nonce: &str,
    delay_sec: u32,
    fail_later: bool,
    fail_nested: bool,
) -> Result<Step, FixtureError> {
    action(
        "dtrx",
        &Dtrx {
            account: battlefield()?,
            fail_now: false,
            fail_later,
            fail_later_nested: fail_nested,
            delay_sec,
            nonce: nonce.into(),
        },
    )
}

fn dtrx_exec() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![
        dtrx_step("ok", 1, false, false)?,
        Step::Advance(Duration::from_secs(1)),
    ])
}

fn dtrx_onerror() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![
        dtrx_step("nf", 1, true, false)?,
        Step::Advance(Duration::from_secs(1)),
        dtrx_step("f", 1, true, false)?,
        Step::Advance(Duration::from_secs(1)),
    ])
}

fn dtrx_nested_fail() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![
        dtrx_step("n", 1, false, true)?,
        Step::Advance(Duration::from_secs(1)),
    ])
}

fn dtrx_cancel() -> Result<Vec<Step>, FixtureError> {
    let own = AccountArg {
        account: battlefield()?,
    };
    Ok(vec![
        dtrx_step("never", 5, false, false)?,
        action("dtrxcancel", &own)?,
        Step::Advance(Duration::from_secs(5)),
        action("dtrxcancel", &own)?,
    ])
}

fn dtrx_replace() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![
        dtrx_step("first", 5, false, false)?,
        dtrx_step("second", 1, false, false)?,
        Step::Advance(Duration::from_secs(5)),
    ])
}

fn dtrx_fail_now() -> Result<Vec<Step>, FixtureError> {
    Ok(vec![
        action(
            "dtrx",
            &Dtrx {
                account: battlefield()?,
                fail_now: true,
                fail_later: false,
                fail_later_nested: false,
                delay_sec: 0,
                nonce: "now".into(),
            },
        )?,
        Step::Advance(Duration::from_secs(1)),
    ])
}

static SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "creaorder",
        summary: "notification, inline and context-free ordering driven by contract code",
        steps: creaorder,
    },
    Scenario {
        name: "scripted-order",
        summary: "the creaorder topology as a scripted dispatch tree",
        steps: scripted_order,
    },
    Scenario {
        name: "db-ops",
        summary: "member inserts, updates and removals through the byaccount index",
        steps: db_ops,
    },
    Scenario {
        name: "variants",
        summary: "tagged variant rows from varianttest and producerows",
        steps: variants,
    },
    Scenario {
        name: "sktest",
        summary: "secondary-key insert, update and remove over every key type",
        steps: sktest,
    },
    Scenario {
        name: "dtrx-exec",
        summary: "a deferred send that succeeds with its nested inline",
        steps: dtrx_exec,
    },
    Scenario {
        name: "dtrx-onerror",
        summary: "failed deferred sends recovered by onerror with nonces nf and f",
        steps: dtrx_onerror,
    },
    Scenario {
        name: "dtrx-nested-fail",
        summary: "a deferred send whose nested inline fails and gets recovered",
        steps: dtrx_nested_fail,
    },
    Scenario {
        name: "dtrx-cancel",
        summary: "cancel a pending deferred send, then cancel again",
        steps: dtrx_cancel,
    },
    Scenario {
        name: "dtrx-replace",
        summary: "a second dtrx replaces the pending deferred send",
        steps: dtrx_replace,
    },
    Scenario {
        name: "dtrx-fail-now",
        summary: "the declaring action fails so nothing is scheduled",
        steps: dtrx_fail_now,
    },
];

pub fn scenarios() -> &'static [Scenario] {
    SCENARIOS
}

pub fn find(name: &str) -> Result<&'static Scenario, FixtureError> {
    SCENARIOS
        .iter()
        .find(|scenario| scenario.name == name)
        .ok_or_else(|| FixtureError::UnknownScenario(name.to_string()))
}

impl Scenario {
    pub fn steps(&self) -> Result<Vec<Step>, FixtureError> {
        (self.steps)()
    }

    /// Run on a fresh fixture kernel with the default config.
    pub fn run(&self) -> Result<ScenarioReport, FixtureError> {
        self.run_with(KernelConfig::default())
    }

    pub fn run_with(&self, config: KernelConfig) -> Result<ScenarioReport, FixtureError> {
        let mut kernel = fixture_kernel(config);
        for step in self.steps()? {
            match step {
                Step::Push(call) => {
                    kernel.push_action(call)?;
                }
                Step::Tree(spec) => {
                    kernel.dispatch_tree(spec)?;
                }
                Step::Advance(by) => {
                    kernel.advance(by)?;
                }
            }
        }
        let report = report(self.name, &mut kernel)?;
        log::info!(
            "scenario {}: {} passes, state {}",
            self.name,
            report.receipts.len(),
            report.state_hash
        );
        Ok(report)
    }
}

/// Build the report of a finished run, taking the kernel's retained receipts.
pub fn report(name: &str, kernel: &mut Kernel<ChainState>) -> Result<ScenarioReport, FixtureError> {
    let state = kernel.state().witness();
    let state_hash = state.hash()?.to_hex();
    let pending_deferred = kernel
        .registry()
        .iter()
        .map(|pending| PendingWitness {
            key: pending.key.clone(),
            due_at_ms: pending.due_at.as_millis() as u64,
            action: pending.call.action.to_string(),
        })
        .collect();
    Ok(ScenarioReport {
        scenario: name.to_string(),
        receipts: kernel.take_receipts(),
        state,
        state_hash,
        pending_deferred,
        journal: kernel.journal_records()?,
    })
}
