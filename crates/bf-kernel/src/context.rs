//! What contract code sees while one node executes.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::call::{Call, Name};
use crate::deferred::{DeferredKey, DeferredRegistry, DeferredSend};
use crate::error::{FaultKind, KernelError};
use crate::journal::{DeferredCanceledRecord, DeferredRegisteredRecord, JournalRecord};
use crate::scheduler::ContextQueues;
use crate::tree::{DispatchTree, NodeId, NodeKind, TreeSpec};

/// Contract code registered for one account.
pub trait Contract<S>: Send + Sync {
    fn apply(&self, ctx: &mut ApplyContext<'_, S>) -> Result<(), KernelError>;
}

impl<S, F> Contract<S> for F
where
    F: Fn(&mut ApplyContext<'_, S>) -> Result<(), KernelError> + Send + Sync,
{
    fn apply(&self, ctx: &mut ApplyContext<'_, S>) -> Result<(), KernelError> {
        self(ctx)
    }
}

/// View of a deferred call whose pass aborted, handed to the recovery handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDeferred {
    pub sender: Name,
    #[serde(with = "bf_store::serde_u128")]
    pub sender_id: u128,
    pub call: Call,
    pub fault: FaultKind,
    pub message: String,
}

pub type RecoveryHandler<S> =
    Arc<dyn Fn(&mut ApplyContext<'_, S>, &FailedDeferred) -> Result<(), KernelError> + Send + Sync>;

/// Side effects a pass stages besides state mutation.
#[derive(Debug, Default)]
pub(crate) struct PassEffects {
    pub records: Vec<JournalRecord>,
    pub deferred: Vec<DeferredKey>,
}

pub struct ApplyContext<'a, S> {
    pub(crate) state: &'a mut S,
    pub(crate) registry: &'a mut DeferredRegistry,
    pub(crate) tree: &'a mut DispatchTree,
    pub(crate) queues: &'a mut ContextQueues,
    pub(crate) effects: &'a mut PassEffects,
    pub(crate) node: NodeId,
    pub(crate) owner: NodeId,
    pub(crate) now: Duration,
    pub(crate) console: String,
}

impl<'a, S> ApplyContext<'a, S> {
    /// Account whose code is running.
    pub fn receiver(&self) -> &Name {
        &self.tree[self.node].receiver
    }

    /// Contract the call was addressed to; differs from `receiver` when
    /// handling a notification.
    pub fn first_receiver(&self) -> &Name {
        &self.tree[self.node].call.account
    }

    pub fn is_notification(&self) -> bool {
        self.tree[self.node].kind == NodeKind::Notification
    }

    pub fn call(&self) -> &Call {
        &self.tree[self.node].call
    }

    pub fn action(&self) -> &Name {
        &self.tree[self.node].call.action
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, KernelError> {
        self.call().data_as()
    }

    pub fn state(&self) -> &S {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut *self.state
    }

    /// Logical time of the running pass.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Append text to this action's console output.
    pub fn print(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        log::trace!("[{}] {}", self.receiver(), text);
        self.console.push_str(text);
    }

    /// Notify `account` of the running call within the current action context.
    pub fn require_recipient(&mut self, account: impl Into<Name>) -> Option<NodeId> {
        self.notify_with(account.into(), None, None)
    }

    pub fn send_inline(&mut self, call: Call) -> NodeId {
        self.declare(NodeKind::Inline, call.account.clone(), call, None, None)
    }

    /// Inline send carrying a display label for traces.
    pub fn send_inline_as(&mut self, label: impl Into<String>, call: Call) -> NodeId {
        self.declare(
            NodeKind::Inline,
            call.account.clone(),
            call,
            Some(label.into()),
            None,
        )
    }

    pub fn send_context_free_inline(&mut self, call: Call) -> NodeId {
        self.declare(
            NodeKind::ContextFreeInline,
            call.account.clone(),
            call.without_authorization(),
            None,
            None,
        )
    }

    pub fn send_context_free_inline_as(&mut self, label: impl Into<String>, call: Call) -> NodeId {
        self.declare(
            NodeKind::ContextFreeInline,
            call.account.clone(),
            call.without_authorization(),
            Some(label.into()),
            None,
        )
    }

    /// Register a deferred send from the running account. Fails on a pending
    /// send with the same id unless `replace_existing` is set.
    pub fn send_deferred(&mut self, send: DeferredSend) -> Result<(), KernelError> {
        let sender = self.receiver().clone();
        let call_hash = send.call.data_hash().to_hex();
        let key = DeferredKey::new(sender.clone(), send.sender_id);
        let outcome = self.registry.register(sender, send, self.now)?;
        self.effects
            .records
            .push(JournalRecord::DeferredRegistered(DeferredRegisteredRecord {
                key: key.clone(),
                due_at_ms: outcome.due_at.as_millis() as u64,
                replaced: outcome.replaced,
                call_hash,
            }));
        self.effects.deferred.retain(|pending| pending != &key);
        self.effects.deferred.push(key);
        Ok(())
    }

    /// Cancel a pending deferred send of the running account.
    pub fn cancel_deferred(&mut self, sender_id: u128) -> Result<(), KernelError> {
        let key = DeferredKey::new(self.receiver().clone(), sender_id);
        self.registry.cancel(&key)?;
        self.effects.deferred.retain(|pending| pending != &key);
        self.effects
            .records
            .push(JournalRecord::DeferredCanceled(DeferredCanceledRecord { key }));
        Ok(())
    }

    pub(crate) fn notify_with(
        &mut self,
        account: Name,
        label: Option<String>,
        script: Option<Arc<TreeSpec>>,
    ) -> Option<NodeId> {
        if !self.queues.mark_notified(&account) {
            log::trace!("{account} already notified in this context");
            return None;
        }
        let call = self.call().clone();
        Some(self.declare(NodeKind::Notification, account, call, label, script))
    }

    pub(crate) fn declare(
        &mut self,
        kind: NodeKind,
        receiver: Name,
        call: Call,
        label: Option<String>,
        script: Option<Arc<TreeSpec>>,
    ) -> NodeId {
        let id = self
            .tree
            .declare(self.node, self.owner, kind, receiver, call, label, script);
        self.queues.push(kind, id);
        id
    }

    pub(crate) fn into_console(self) -> String {
        self.console
    }
}
