//! Deterministic dispatch kernel: notifications, inline and context-free
//! sends, deferred scheduling with one-shot recovery, all-or-nothing passes.

pub mod call;
pub mod context;
pub mod deferred;
pub mod error;
pub mod journal;
mod scheduler;
pub mod trace;
pub mod tree;
mod world;

pub use call::{Call, Name};
pub use context::{ApplyContext, Contract, FailedDeferred, RecoveryHandler};
pub use deferred::{DeferredKey, DeferredRegistry, DeferredSend, PendingDeferred};
pub use error::{FaultKind, KernelError, check};
pub use journal::mem::MemJournal;
pub use journal::{Journal, JournalKind, JournalRecord};
pub use trace::{ActionTrace, PassOrigin, PassReceipt, PassStatus, TraceStatus};
pub use tree::{DeferredOptions, DispatchNode, DispatchTree, NodeId, NodeKind, TreeBuilder, TreeSpec};
pub use world::{Kernel, KernelBuilder, KernelConfig};
