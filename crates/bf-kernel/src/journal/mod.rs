pub mod mem;

use bf_cbor::{from_cbor, to_canonical_cbor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deferred::DeferredKey;
use crate::error::FaultKind;
use crate::trace::PassOrigin;

/// Monotonic cursor assigned to every appended journal entry.
pub type JournalSeq = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    PassCommitted,
    PassAborted,
    DeferredRegistered,
    DeferredCanceled,
    DeferredExecuted,
    RecoveryInvoked,
}

/// Typed payloads for each `JournalKind`, serialized into the entry payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "record_kind", rename_all = "snake_case")]
pub enum JournalRecord {
    PassCommitted(PassCommittedRecord),
    PassAborted(PassAbortedRecord),
    DeferredRegistered(DeferredRegisteredRecord),
    DeferredCanceled(DeferredCanceledRecord),
    DeferredExecuted(DeferredExecutedRecord),
    RecoveryInvoked(RecoveryInvokedRecord),
}

impl JournalRecord {
    pub fn kind(&self) -> JournalKind {
        match self {
            JournalRecord::PassCommitted(_) => JournalKind::PassCommitted,
            JournalRecord::PassAborted(_) => JournalKind::PassAborted,
            JournalRecord::DeferredRegistered(_) => JournalKind::DeferredRegistered,
            JournalRecord::DeferredCanceled(_) => JournalKind::DeferredCanceled,
            JournalRecord::DeferredExecuted(_) => JournalKind::DeferredExecuted,
            JournalRecord::RecoveryInvoked(_) => JournalKind::RecoveryInvoked,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, JournalError> {
        Ok(to_canonical_cbor(self)?)
    }

    pub fn decode(entry: &OwnedJournalEntry) -> Result<Self, JournalError> {
        let record: JournalRecord = from_cbor(&entry.payload)?;
        if record.kind() != entry.kind {
            return Err(JournalError::Corrupt(format!(
                "entry {} is tagged {:?} but holds {:?}",
                entry.seq,
                entry.kind,
                record.kind()
            )));
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassCommittedRecord {
    pub pass_id: u64,
    pub origin: PassOrigin,
    pub actions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassAbortedRecord {
    pub pass_id: u64,
    pub origin: PassOrigin,
    pub fault: FaultKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeferredRegisteredRecord {
    pub key: DeferredKey,
    pub due_at_ms: u64,
    #[serde(default)]
    pub replaced: bool,
    pub call_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeferredCanceledRecord {
    pub key: DeferredKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeferredExecutedRecord {
    pub key: DeferredKey,
    pub pass_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryInvokedRecord {
    pub key: DeferredKey,
    pub pass_id: u64,
}

/// Borrowed entry used when appending to the journal.
#[derive(Debug, Clone, Copy)]
pub struct JournalEntry<'a> {
    pub kind: JournalKind,
    pub payload: &'a [u8],
}

impl<'a> JournalEntry<'a> {
    pub fn new(kind: JournalKind, payload: &'a [u8]) -> Self {
        Self { kind, payload }
    }
}

/// Owned entry returned by journal readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnedJournalEntry {
    pub seq: JournalSeq,
    pub kind: JournalKind,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("corrupt entry: {0}")]
    Corrupt(String),
    #[error("journal lock poisoned")]
    Poisoned,
}

/// Append-only log the kernel writes pass outcomes and deferred lifecycle
/// events to.
pub trait Journal: Send {
    fn append(&mut self, entry: JournalEntry<'_>) -> Result<JournalSeq, JournalError>;

    /// Loads entries starting at `from` (inclusive). Passing 0 returns the full log.
    fn load_from(&self, from: JournalSeq) -> Result<Vec<OwnedJournalEntry>, JournalError>;

    /// Returns the next sequence that will be assigned on append.
    fn next_seq(&self) -> JournalSeq;
}

pub(crate) fn append_record(
    journal: &mut dyn Journal,
    record: &JournalRecord,
) -> Result<JournalSeq, JournalError> {
    let payload = record.encode()?;
    journal.append(JournalEntry::new(record.kind(), &payload))
}
