use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::call::{Call, Name};
use crate::context::{ApplyContext, Contract, FailedDeferred, RecoveryHandler};
use crate::deferred::{DeferredKey, DeferredRegistry, PendingDeferred};
use crate::error::KernelError;
use crate::journal::mem::MemJournal;
use crate::journal::{
    DeferredCanceledRecord, Journal, JournalRecord, append_record,
};
use crate::trace::{PassOrigin, PassReceipt};
use crate::tree::{NodeKind, TreeSpec};

mod deferred_flow;
mod pass;

use pass::PassSeed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Deepest inline nesting a pass may reach; the root action is depth 0.
    pub max_inline_depth: u32,
    /// Due deferred sends executed by one `run_due` call.
    pub max_deferred_per_tick: usize,
    /// Drop a second notification of the same account within one context.
    pub dedupe_notifications: bool,
    /// Receipts kept for [`Kernel::receipts`]; older ones are dropped first.
    pub max_retained_receipts: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_inline_depth: 4,
            max_deferred_per_tick: 64,
            dedupe_notifications: true,
            max_retained_receipts: 1024,
        }
    }
}

/// Single-threaded dispatch kernel over contract state `S`.
///
/// Every pass runs against a checkpoint of `S` and of the deferred registry;
/// an aborted pass restores both.
pub struct Kernel<S> {
    state: S,
    contracts: BTreeMap<Name, Arc<dyn Contract<S>>>,
    registry: DeferredRegistry,
    recovery: Option<RecoveryHandler<S>>,
    config: KernelConfig,
    clock: Duration,
    journal: Box<dyn Journal>,
    receipts: Vec<PassReceipt>,
    next_pass_id: u64,
}

impl<S> fmt::Debug for Kernel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("contracts", &self.contracts.keys().collect::<Vec<_>>())
            .field("pending_deferred", &self.registry.len())
            .field("recovery", &self.recovery.as_ref().map(|_| "<handler>"))
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("passes", &self.receipts.len())
            .finish()
    }
}

pub struct KernelBuilder<S> {
    state: S,
    contracts: BTreeMap<Name, Arc<dyn Contract<S>>>,
    recovery: Option<RecoveryHandler<S>>,
    journal: Box<dyn Journal>,
    config: KernelConfig,
}

impl<S: Clone + 'static> KernelBuilder<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            contracts: BTreeMap::new(),
            recovery: None,
            journal: Box::new(MemJournal::new()),
            config: KernelConfig::default(),
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_journal(mut self, journal: Box<dyn Journal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_max_inline_depth(mut self, depth: u32) -> Self {
        self.config.max_inline_depth = depth;
        self
    }

    pub fn with_contract(mut self, account: impl Into<Name>, contract: impl Contract<S> + 'static) -> Self {
        self.contracts.insert(account.into(), Arc::new(contract));
        self
    }

    pub fn with_recovery_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut ApplyContext<'_, S>, &FailedDeferred) -> Result<(), KernelError>
            + Send
            + Sync
            + 'static,
    {
        self.recovery = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Kernel<S> {
        Kernel {
            state: self.state,
            contracts: self.contracts,
            registry: DeferredRegistry::new(),
            recovery: self.recovery,
            config: self.config,
            clock: Duration::ZERO,
            journal: self.journal,
            receipts: Vec::new(),
            next_pass_id: 0,
        }
    }
}

impl<S: Clone + 'static> Kernel<S> {
    pub fn builder(state: S) -> KernelBuilder<S> {
        KernelBuilder::new(state)
    }

    /// Install the process-wide recovery hook, replacing any previous one.
    pub fn set_recovery_handler<F>(&mut self, handler: F)
    where
        F: Fn(&mut ApplyContext<'_, S>, &FailedDeferred) -> Result<(), KernelError>
            + Send
            + Sync
            + 'static,
    {
        self.recovery = Some(Arc::new(handler));
    }

    /// Run `call` as the root of a new pass.
    pub fn push_action(&mut self, call: Call) -> Result<PassReceipt, KernelError> {
        let seed = PassSeed {
            kind: NodeKind::Root,
            call,
            label: None,
            script: None,
        };
        Ok(self.run_pass(PassOrigin::Scenario, seed, None)?.receipt)
    }

    /// Run a scripted topology as one pass.
    pub fn dispatch_tree(&mut self, spec: TreeSpec) -> Result<PassReceipt, KernelError> {
        let seed = PassSeed {
            kind: NodeKind::Root,
            call: spec.call(),
            label: Some(spec.label.clone()),
            script: Some(Arc::new(spec)),
        };
        Ok(self.run_pass(PassOrigin::Scenario, seed, None)?.receipt)
    }

    /// Cancel a pending deferred send outside of any pass.
    pub fn cancel_deferred(
        &mut self,
        sender: impl Into<Name>,
        sender_id: u128,
    ) -> Result<PendingDeferred, KernelError> {
        let key = DeferredKey::new(sender, sender_id);
        let removed = self.registry.cancel(&key)?;
        append_record(
            self.journal.as_mut(),
            &JournalRecord::DeferredCanceled(DeferredCanceledRecord { key }),
        )?;
        Ok(removed)
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Direct access for seeding state between passes.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn registry(&self) -> &DeferredRegistry {
        &self.registry
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Logical clock; only `advance` moves it.
    pub fn now(&self) -> Duration {
        self.clock
    }

    /// Retained receipts, oldest first.
    pub fn receipts(&self) -> &[PassReceipt] {
        &self.receipts
    }

    /// Hand the retained receipts to the caller and start a fresh history.
    pub fn take_receipts(&mut self) -> Vec<PassReceipt> {
        std::mem::take(&mut self.receipts)
    }

    pub fn journal_records(&self) -> Result<Vec<JournalRecord>, KernelError> {
        self.journal
            .load_from(0)?
            .iter()
            .map(|entry| JournalRecord::decode(entry).map_err(KernelError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::check;
    use crate::trace::PassStatus;
    use crate::tree::TreeBuilder;

    #[derive(Debug, Clone, Default)]
    struct Counter {
        hits: Vec<String>,
    }

    fn recorder(ctx: &mut ApplyContext<'_, Counter>) -> Result<(), KernelError> {
        let tag: String = ctx.data_as()?;
        let receiver = ctx.receiver().to_string();
        ctx.state_mut().hits.push(format!("{receiver}:{tag}"));
        check(tag != "boom", "recorder instructed to fail")
    }

    #[test]
    fn aborted_pass_restores_state() {
        let mut kernel = Kernel::builder(Counter::default())
            .with_contract("a1", recorder)
            .build();
        let ok = kernel
            .push_action(Call::new("a1", "rec", &"one").unwrap())
            .unwrap();
        assert!(ok.is_committed());
        let failed = kernel
            .push_action(Call::new("a1", "rec", &"boom").unwrap())
            .unwrap();
        assert_eq!(
            failed.status,
            PassStatus::Aborted {
                fault: crate::error::FaultKind::ExplicitFailure,
                message: "recorder instructed to fail".into()
            }
        );
        assert_eq!(failed.traces.len(), 1);
        assert_eq!(kernel.state().hits, vec!["a1:one".to_string()]);
        assert_eq!(kernel.receipts().len(), 2);
    }

    #[test]
    fn journal_records_each_pass() {
        let mut kernel = Kernel::builder(Counter::default()).build();
        kernel
            .dispatch_tree(TreeBuilder::root("a1").notify("n1").build())
            .unwrap();
        kernel
            .dispatch_tree(TreeBuilder::root("a1").fail().build())
            .unwrap();
        let kinds: Vec<_> = kernel
            .journal_records()
            .unwrap()
            .iter()
            .map(JournalRecord::kind)
            .collect();
        assert_eq!(
            kinds,
            [
                crate::journal::JournalKind::PassCommitted,
                crate::journal::JournalKind::PassAborted
            ]
        );
    }

    #[test]
    fn depth_limit_aborts_the_pass() {
        let deep = TreeBuilder::root("a1")
            .inline("d1", |b| b.inline("d2", |b| b.inline("d3", |b| b)))
            .build();
        let mut kernel = Kernel::builder(Counter::default())
            .with_max_inline_depth(2)
            .build();
        let receipt = kernel.dispatch_tree(deep.clone()).unwrap();
        assert_eq!(
            receipt.fault().map(|(fault, _)| fault),
            Some(crate::error::FaultKind::ConstraintViolation)
        );

        let mut roomy = Kernel::builder(Counter::default()).build();
        assert!(roomy.dispatch_tree(deep).unwrap().is_committed());
    }

    #[test]
    fn late_recovery_handler_sees_failures_in_a_shared_journal() {
        let journal = MemJournal::new();
        let mut kernel = Kernel::builder(Counter::default())
            .with_journal(Box::new(journal.clone()))
            .build();
        kernel.set_recovery_handler(
            |ctx: &mut ApplyContext<'_, Counter>, failed: &FailedDeferred| {
                ctx.state_mut().hits.push(format!("recovered:{}", failed.message));
                Ok(())
            },
        );
        let spec = TreeBuilder::root("a1")
            .deferred(
                "d1",
                crate::tree::DeferredOptions {
                    sender_id: 7,
                    delay: Duration::ZERO,
                    replace_existing: false,
                },
                |b| b.fail(),
            )
            .build();
        assert!(kernel.dispatch_tree(spec).unwrap().is_committed());

        let receipts = kernel.run_due().unwrap();
        assert_eq!(receipts.len(), 2);
        assert!(matches!(receipts[1].origin, PassOrigin::Recovery { sender_id: 7, .. }));
        assert_eq!(kernel.state().hits.len(), 1);
        assert!(kernel.state().hits[0].starts_with("recovered:"));
        assert_eq!(
            journal.load_from(0).unwrap().len(),
            kernel.journal_records().unwrap().len()
        );
    }

    #[test]
    fn receipt_history_is_bounded_and_can_be_taken() {
        let mut kernel = Kernel::builder(Counter::default())
            .with_config(KernelConfig {
                max_retained_receipts: 2,
                ..KernelConfig::default()
            })
            .build();
        for _ in 0..5 {
            kernel
                .dispatch_tree(TreeBuilder::root("a1").build())
                .unwrap();
        }
        let ids: Vec<_> = kernel.receipts().iter().map(|r| r.pass_id).collect();
        assert_eq!(ids, [3, 4]);

        let taken = kernel.take_receipts();
        assert_eq!(taken.len(), 2);
        assert!(kernel.receipts().is_empty());
        kernel
            .dispatch_tree(TreeBuilder::root("a1").build())
            .unwrap();
        assert_eq!(kernel.receipts()[0].pass_id, 5);
    }

    #[test]
    fn external_cancel_of_missing_send_fails() {
        let mut kernel = Kernel::builder(Counter::default()).build();
        let err = kernel.cancel_deferred("a1", 9).unwrap_err();
        assert!(matches!(err, KernelError::DeferredNotFound { sender_id: 9, .. }));
    }
}
