use std::time::Duration;

use crate::call::Call;
use crate::context::FailedDeferred;
use crate::deferred::PendingDeferred;
use crate::error::{FaultKind, KernelError};
use crate::journal::{
    DeferredExecutedRecord, JournalRecord, RecoveryInvokedRecord, append_record,
};
use crate::trace::{PassOrigin, PassReceipt};
use crate::tree::NodeKind;

use super::Kernel;
use super::pass::PassSeed;

impl<S: Clone + 'static> Kernel<S> {
    /// Move the logical clock forward and run whatever became due.
    pub fn advance(&mut self, by: Duration) -> Result<Vec<PassReceipt>, KernelError> {
        self.clock = self.clock.saturating_add(by);
        self.run_due()
    }

    /// Run due deferred sends, at most `max_deferred_per_tick` of them.
    pub fn run_due(&mut self) -> Result<Vec<PassReceipt>, KernelError> {
        let mut receipts = Vec::new();
        for _ in 0..self.config.max_deferred_per_tick {
            let Some(entry) = self.registry.pop_due(self.clock) else {
                break;
            };
            receipts.extend(self.run_deferred(entry)?);
        }
        Ok(receipts)
    }

    fn run_deferred(&mut self, entry: PendingDeferred) -> Result<Vec<PassReceipt>, KernelError> {
        append_record(
            self.journal.as_mut(),
            &JournalRecord::DeferredExecuted(DeferredExecutedRecord {
                key: entry.key.clone(),
                pass_id: self.next_pass_id,
            }),
        )?;
        let seed = PassSeed {
            kind: NodeKind::Deferred,
            call: entry.call.clone(),
            label: entry.script.as_ref().map(|script| script.label.clone()),
            script: entry.script.clone(),
        };
        let receipt = self
            .run_pass(PassOrigin::deferred(&entry.key), seed, None)?
            .receipt;
        let failure = receipt
            .fault()
            .map(|(fault, message)| (fault, message.to_string()));
        let mut receipts = vec![receipt];
        match failure {
            Some((fault, message)) if self.recovery.is_some() => {
                receipts.extend(self.recover(&entry, fault, message)?);
            }
            Some((_, message)) => {
                log::warn!(
                    "deferred {}:{:#x} failed with no recovery handler: {message}",
                    entry.key.sender,
                    entry.key.sender_id
                );
            }
            None => {}
        }
        Ok(receipts)
    }

    /// Run the recovery handler for a failed deferred send, then each inline it
    /// declared as an independent pass. None of these passes recover.
    fn recover(
        &mut self,
        entry: &PendingDeferred,
        fault: FaultKind,
        message: String,
    ) -> Result<Vec<PassReceipt>, KernelError> {
        let failed = FailedDeferred {
            sender: entry.key.sender.clone(),
            sender_id: entry.key.sender_id,
            call: entry.call.clone(),
            fault,
            message,
        };
        append_record(
            self.journal.as_mut(),
            &JournalRecord::RecoveryInvoked(RecoveryInvokedRecord {
                key: entry.key.clone(),
                pass_id: self.next_pass_id,
            }),
        )?;
        log::debug!(
            "recovering deferred {}:{:#x}",
            entry.key.sender,
            entry.key.sender_id
        );

        let seed = PassSeed {
            kind: NodeKind::Root,
            call: Call::new(entry.key.sender.clone(), "onerror", &failed)?,
            label: None,
            script: None,
        };
        let outcome = self.run_pass(PassOrigin::recovery(&entry.key), seed, Some(&failed))?;
        let mut receipts = vec![outcome.receipt];
        for (index, node) in outcome.detached.into_iter().enumerate() {
            let origin = PassOrigin::recovery_dispatch(&entry.key, index as u32);
            let receipt = self
                .run_pass(origin, PassSeed::from_detached(node), None)?
                .receipt;
            receipts.push(receipt);
        }
        Ok(receipts)
    }
}
