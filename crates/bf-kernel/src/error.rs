use bf_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::call::Name;

/// Coarse classification every pass-aborting error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    NotFound,
    ConstraintViolation,
    InvalidKey,
    ExplicitFailure,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    ExplicitFailure(String),
    #[error("no pending deferred send {sender}:{sender_id:#x}")]
    DeferredNotFound { sender: Name, sender_id: u128 },
    #[error("deferred send {sender}:{sender_id:#x} is already pending")]
    DeferredDuplicate { sender: Name, sender_id: u128 },
    #[error("inline depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: u32, limit: u32 },
    #[error("payload of '{account}::{action}' failed to decode: {reason}")]
    PayloadDecode {
        account: Name,
        action: Name,
        reason: String,
    },
    #[error("payload encoding error: {0}")]
    PayloadEncode(String),
    #[error("journal error: {0}")]
    Journal(String),
}

impl KernelError {
    pub fn fault(&self) -> FaultKind {
        match self {
            KernelError::Store(StoreError::NotFound { .. } | StoreError::UnknownIndex { .. }) => {
                FaultKind::NotFound
            }
            KernelError::Store(StoreError::ConstraintViolation { .. }) => {
                FaultKind::ConstraintViolation
            }
            KernelError::Store(StoreError::InvalidKey(_)) => FaultKind::InvalidKey,
            KernelError::ExplicitFailure(_) => FaultKind::ExplicitFailure,
            KernelError::DeferredNotFound { .. } => FaultKind::NotFound,
            KernelError::DeferredDuplicate { .. } | KernelError::DepthExceeded { .. } => {
                FaultKind::ConstraintViolation
            }
            KernelError::PayloadDecode { .. } | KernelError::PayloadEncode(_) => {
                FaultKind::InvalidKey
            }
            KernelError::Journal(_) => FaultKind::ConstraintViolation,
        }
    }
}

impl From<crate::journal::JournalError> for KernelError {
    fn from(err: crate::journal::JournalError) -> Self {
        KernelError::Journal(err.to_string())
    }
}

/// Fail with [`KernelError::ExplicitFailure`] unless `condition` holds.
pub fn check(condition: bool, message: impl Into<String>) -> Result<(), KernelError> {
    if condition {
        Ok(())
    } else {
        Err(KernelError::ExplicitFailure(message.into()))
    }
}
