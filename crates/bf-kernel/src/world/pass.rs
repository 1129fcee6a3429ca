use std::sync::Arc;

use crate::call::Call;
use crate::context::FailedDeferred;
use crate::error::KernelError;
use crate::journal::{JournalRecord, PassAbortedRecord, PassCommittedRecord, append_record};
use crate::scheduler::{Dispatcher, RootBody};
use crate::trace::{PassOrigin, PassReceipt, PassStatus};
use crate::tree::{DispatchNode, DispatchTree, NodeKind, TreeSpec};

use super::Kernel;

/// Root node of a pass before it is placed in a fresh tree.
pub(super) struct PassSeed {
    pub kind: NodeKind,
    pub call: Call,
    pub label: Option<String>,
    pub script: Option<Arc<TreeSpec>>,
}

impl PassSeed {
    pub fn from_detached(node: DispatchNode) -> Self {
        Self {
            kind: NodeKind::Inline,
            call: node.call,
            label: node.label,
            script: node.script,
        }
    }
}

pub(super) struct PassOutcome {
    pub receipt: PassReceipt,
    /// Root-context inlines of a committed recovery pass.
    pub detached: Vec<DispatchNode>,
}

impl<S: Clone + 'static> Kernel<S> {
    /// Run one all-or-nothing pass. With `recovery` set, the recovery handler
    /// runs as the root body and root-context inlines are detached instead of
    /// executed.
    pub(super) fn run_pass(
        &mut self,
        origin: PassOrigin,
        seed: PassSeed,
        recovery: Option<&FailedDeferred>,
    ) -> Result<PassOutcome, KernelError> {
        let pass_id = self.next_pass_id;
        self.next_pass_id += 1;
        log::debug!("pass {pass_id} begin ({origin:?})");

        let state_checkpoint = self.state.clone();
        let registry_checkpoint = self.registry.clone();

        let mut tree = DispatchTree::new();
        let root = tree.push_root(seed.kind, seed.call, seed.label, seed.script);
        let handler = self.recovery.clone();
        let body = match (recovery, handler.as_ref()) {
            (Some(failed), Some(handler)) => RootBody::Recovery(handler, failed),
            _ => RootBody::Contract,
        };

        let mut dispatcher = Dispatcher::new(
            &mut self.state,
            &mut self.registry,
            &self.contracts,
            &self.config,
            self.clock,
            tree,
        );
        let result = dispatcher.run(root, body, recovery.is_some());
        let output = dispatcher.into_output();

        let (status, deferred, detached) = match result {
            Ok(()) => {
                for record in &output.effects.records {
                    append_record(self.journal.as_mut(), record)?;
                }
                append_record(
                    self.journal.as_mut(),
                    &JournalRecord::PassCommitted(PassCommittedRecord {
                        pass_id,
                        origin: origin.clone(),
                        actions: output.traces.len() as u32,
                    }),
                )?;
                log::debug!(
                    "pass {pass_id} committed after {} actions",
                    output.traces.len()
                );
                let detached = output
                    .detached
                    .iter()
                    .map(|id| output.tree[*id].clone())
                    .collect();
                (PassStatus::Committed, output.effects.deferred, detached)
            }
            Err(err) => {
                self.state = state_checkpoint;
                self.registry = registry_checkpoint;
                let fault = err.fault();
                let message = err.to_string();
                append_record(
                    self.journal.as_mut(),
                    &JournalRecord::PassAborted(PassAbortedRecord {
                        pass_id,
                        origin: origin.clone(),
                        fault,
                        message: message.clone(),
                    }),
                )?;
                log::warn!("pass {pass_id} aborted: {message}");
                (PassStatus::Aborted { fault, message }, Vec::new(), Vec::new())
            }
        };

        let receipt = PassReceipt {
            pass_id,
            origin,
            status,
            traces: output.traces,
            deferred,
            tree: output.tree,
        };
        self.receipts.push(receipt.clone());
        let retained = self.config.max_retained_receipts;
        if self.receipts.len() > retained {
            let excess = self.receipts.len() - retained;
            self.receipts.drain(..excess);
        }
        Ok(PassOutcome { receipt, detached })
    }
}
