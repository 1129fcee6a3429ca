//! Pending deferred sends, keyed by the sending account and its chosen id.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::call::{Call, Name};
use crate::error::KernelError;
use crate::tree::TreeSpec;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeferredKey {
    pub sender: Name,
    #[serde(with = "bf_store::serde_u128")]
    pub sender_id: u128,
}

impl DeferredKey {
    pub fn new(sender: impl Into<Name>, sender_id: u128) -> Self {
        Self {
            sender: sender.into(),
            sender_id,
        }
    }
}

/// A deferred send as declared by contract code.
#[derive(Debug, Clone)]
pub struct DeferredSend {
    pub sender_id: u128,
    pub call: Call,
    pub delay: Duration,
    /// Defaults to the sending account.
    pub payer: Option<Name>,
    pub replace_existing: bool,
    pub(crate) script: Option<Arc<TreeSpec>>,
}

impl DeferredSend {
    pub fn new(sender_id: u128, call: Call) -> Self {
        Self {
            sender_id,
            call,
            delay: Duration::ZERO,
            payer: None,
            replace_existing: false,
            script: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn payer(mut self, payer: impl Into<Name>) -> Self {
        self.payer = Some(payer.into());
        self
    }

    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub(crate) fn scripted(mut self, script: Arc<TreeSpec>) -> Self {
        self.script = Some(script);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PendingDeferred {
    pub key: DeferredKey,
    pub call: Call,
    pub payer: Name,
    pub due_at: Duration,
    /// Registration order; breaks ties between equal `due_at`.
    pub seq: u64,
    pub(crate) script: Option<Arc<TreeSpec>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub due_at: Duration,
    pub replaced: bool,
}

/// Registry of pending deferred sends. Owned by the kernel and checkpointed
/// with the rest of the pass state.
#[derive(Debug, Clone, Default)]
pub struct DeferredRegistry {
    pending: BTreeMap<DeferredKey, PendingDeferred>,
    next_seq: u64,
}

impl DeferredRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        sender: Name,
        send: DeferredSend,
        now: Duration,
    ) -> Result<Registered, KernelError> {
        let key = DeferredKey::new(sender, send.sender_id);
        let replaced = self.pending.contains_key(&key);
        if replaced && !send.replace_existing {
            return Err(KernelError::DeferredDuplicate {
                sender: key.sender,
                sender_id: key.sender_id,
            });
        }
        let due_at = now.saturating_add(send.delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        let payer = send.payer.unwrap_or_else(|| key.sender.clone());
        log::debug!(
            "deferred {}:{:#x} registered, due at {:?}{}",
            key.sender,
            key.sender_id,
            due_at,
            if replaced { " (replacing)" } else { "" }
        );
        self.pending.insert(
            key.clone(),
            PendingDeferred {
                key,
                call: send.call,
                payer,
                due_at,
                seq,
                script: send.script,
            },
        );
        Ok(Registered { due_at, replaced })
    }

    pub fn cancel(&mut self, key: &DeferredKey) -> Result<PendingDeferred, KernelError> {
        let removed = self
            .pending
            .remove(key)
            .ok_or_else(|| KernelError::DeferredNotFound {
                sender: key.sender.clone(),
                sender_id: key.sender_id,
            })?;
        log::debug!("deferred {}:{:#x} canceled", key.sender, key.sender_id);
        Ok(removed)
    }

    pub fn get(&self, key: &DeferredKey) -> Option<&PendingDeferred> {
        self.pending.get(key)
    }

    pub fn contains(&self, key: &DeferredKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Earliest due time among pending sends.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.values().map(|entry| entry.due_at).min()
    }

    /// Remove and return the first send due at or before `now`, in
    /// `(due_at, seq)` order.
    pub fn pop_due(&mut self, now: Duration) -> Option<PendingDeferred> {
        let key = self
            .pending
            .values()
            .filter(|entry| entry.due_at <= now)
            .min_by_key(|entry| (entry.due_at, entry.seq))
            .map(|entry| entry.key.clone())?;
        self.pending.remove(&key)
    }

    /// Pending sends in `(due_at, seq)` order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingDeferred> {
        let mut entries: Vec<_> = self.pending.values().collect();
        entries.sort_by_key(|entry| (entry.due_at, entry.seq));
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
