use serde::{Deserialize, Serialize};

use crate::call::{Call, Name};
use crate::deferred::DeferredKey;
use crate::error::FaultKind;
use crate::tree::{DispatchTree, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Executed,
    /// Context-free inlines and receivers without contract code.
    Inert,
    Failed,
}

/// One executed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub execution_index: u32,
    pub creation_ordinal: u32,
    /// Zero for the pass root.
    pub creator_ordinal: u32,
    /// Owner of the action context the node ran in; zero for the pass root.
    pub closest_unnotified_ancestor_ordinal: u32,
    pub kind: NodeKind,
    pub receiver: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub call: Call,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub console: String,
    pub status: TraceStatus,
}

impl ActionTrace {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.receiver.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum PassOrigin {
    Scenario,
    Deferred {
        sender: Name,
        #[serde(with = "bf_store::serde_u128")]
        sender_id: u128,
    },
    Recovery {
        sender: Name,
        #[serde(with = "bf_store::serde_u128")]
        sender_id: u128,
    },
    RecoveryDispatch {
        sender: Name,
        #[serde(with = "bf_store::serde_u128")]
        sender_id: u128,
        index: u32,
    },
}

impl PassOrigin {
    pub(crate) fn deferred(key: &DeferredKey) -> Self {
        PassOrigin::Deferred {
            sender: key.sender.clone(),
            sender_id: key.sender_id,
        }
    }

    pub(crate) fn recovery(key: &DeferredKey) -> Self {
        PassOrigin::Recovery {
            sender: key.sender.clone(),
            sender_id: key.sender_id,
        }
    }

    pub(crate) fn recovery_dispatch(key: &DeferredKey, index: u32) -> Self {
        PassOrigin::RecoveryDispatch {
            sender: key.sender.clone(),
            sender_id: key.sender_id,
            index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    Committed,
    Aborted { fault: FaultKind, message: String },
}

/// Outcome of one pass. Aborted passes keep the traces produced up to and
/// including the failing node.
#[derive(Debug, Clone, Serialize)]
pub struct PassReceipt {
    pub pass_id: u64,
    pub origin: PassOrigin,
    pub status: PassStatus,
    pub traces: Vec<ActionTrace>,
    /// Deferred sends registered by the pass; meaningful only if it committed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<DeferredKey>,
    #[serde(skip)]
    pub tree: DispatchTree,
}

impl PassReceipt {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, PassStatus::Committed)
    }

    pub fn fault(&self) -> Option<(FaultKind, &str)> {
        match &self.status {
            PassStatus::Committed => None,
            PassStatus::Aborted { fault, message } => Some((*fault, message.as_str())),
        }
    }

    /// Label (or receiver) of every executed node, in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.traces.iter().map(ActionTrace::display_name).collect()
    }

    pub fn trace_named(&self, name: &str) -> Option<&ActionTrace> {
        self.traces.iter().find(|trace| trace.display_name() == name)
    }

    pub fn console(&self) -> String {
        self.traces
            .iter()
            .map(|trace| trace.console.as_str())
            .collect()
    }
}
