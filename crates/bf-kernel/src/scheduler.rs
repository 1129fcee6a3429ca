use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::call::Name;
use crate::context::{ApplyContext, Contract, FailedDeferred, PassEffects, RecoveryHandler};
use crate::deferred::{DeferredRegistry, DeferredSend};
use crate::error::KernelError;
use crate::trace::{ActionTrace, TraceStatus};
use crate::tree::{DeferredOptions, DispatchTree, NodeId, NodeKind, TreeSpec};
use crate::world::KernelConfig;

pub(crate) enum Task {
    Receive(NodeId),
    ContextFree(NodeId),
    Inline(NodeId),
}

/// Work queued inside one action context: the owner's notifications, then its
/// context-free inlines, then its inlines.
pub(crate) struct ContextQueues {
    receive: VecDeque<NodeId>,
    context_free: VecDeque<NodeId>,
    inline: VecDeque<NodeId>,
    notified: BTreeSet<Name>,
    dedupe: bool,
}

impl ContextQueues {
    pub fn new(owner: Name, dedupe: bool) -> Self {
        Self {
            receive: VecDeque::new(),
            context_free: VecDeque::new(),
            inline: VecDeque::new(),
            notified: BTreeSet::from([owner]),
            dedupe,
        }
    }

    /// Returns false if `account` was already notified and duplicates are dropped.
    pub fn mark_notified(&mut self, account: &Name) -> bool {
        let fresh = self.notified.insert(account.clone());
        fresh || !self.dedupe
    }

    pub fn push(&mut self, kind: NodeKind, node: NodeId) {
        match kind {
            NodeKind::Notification => self.receive.push_back(node),
            NodeKind::ContextFreeInline => self.context_free.push_back(node),
            NodeKind::Root | NodeKind::Inline | NodeKind::Deferred => self.inline.push_back(node),
        }
    }

    pub fn pop(&mut self) -> Option<Task> {
        if let Some(node) = self.receive.pop_front() {
            return Some(Task::Receive(node));
        }
        if let Some(node) = self.context_free.pop_front() {
            return Some(Task::ContextFree(node));
        }
        self.inline.pop_front().map(Task::Inline)
    }

    pub fn is_empty(&self) -> bool {
        self.receive.is_empty() && self.context_free.is_empty() && self.inline.is_empty()
    }
}

/// Code that runs for the pass root in place of the receiver's contract.
pub(crate) enum RootBody<'h, S> {
    Contract,
    Recovery(&'h RecoveryHandler<S>, &'h FailedDeferred),
}

/// What a finished dispatch leaves behind, committed or not.
pub(crate) struct DispatchOutput {
    pub tree: DispatchTree,
    pub traces: Vec<ActionTrace>,
    pub effects: PassEffects,
    /// Inlines of the root context held back for later sub-passes.
    pub detached: Vec<NodeId>,
}

/// Executes one pass over borrowed kernel state. The caller owns checkpointing.
pub(crate) struct Dispatcher<'k, S> {
    state: &'k mut S,
    registry: &'k mut DeferredRegistry,
    contracts: &'k BTreeMap<Name, Arc<dyn Contract<S>>>,
    config: &'k KernelConfig,
    now: Duration,
    tree: DispatchTree,
    traces: Vec<ActionTrace>,
    effects: PassEffects,
    detached: Vec<NodeId>,
}

impl<'k, S> Dispatcher<'k, S> {
    pub fn new(
        state: &'k mut S,
        registry: &'k mut DeferredRegistry,
        contracts: &'k BTreeMap<Name, Arc<dyn Contract<S>>>,
        config: &'k KernelConfig,
        now: Duration,
        tree: DispatchTree,
    ) -> Self {
        Self {
            state,
            registry,
            contracts,
            config,
            now,
            tree,
            traces: Vec::new(),
            effects: PassEffects::default(),
            detached: Vec::new(),
        }
    }

    /// Run the action rooted at `root` and everything it spawns.
    pub fn run(
        &mut self,
        root: NodeId,
        body: RootBody<'_, S>,
        detach_inlines: bool,
    ) -> Result<(), KernelError> {
        self.execute_action(root, 0, Some(body), detach_inlines)
    }

    pub fn into_output(self) -> DispatchOutput {
        DispatchOutput {
            tree: self.tree,
            traces: self.traces,
            effects: self.effects,
            detached: self.detached,
        }
    }

    fn execute_action(
        &mut self,
        owner: NodeId,
        depth: u32,
        body: Option<RootBody<'_, S>>,
        detach_inlines: bool,
    ) -> Result<(), KernelError> {
        if depth > self.config.max_inline_depth {
            return Err(KernelError::DepthExceeded {
                depth,
                limit: self.config.max_inline_depth,
            });
        }
        let mut queues = ContextQueues::new(
            self.tree[owner].receiver.clone(),
            self.config.dedupe_notifications,
        );
        self.run_node(owner, owner, &mut queues, body)?;
        while let Some(task) = queues.pop() {
            match task {
                Task::Receive(node) => self.run_node(node, owner, &mut queues, None)?,
                Task::ContextFree(node) => {
                    self.record_trace(node, owner, String::new(), TraceStatus::Inert)
                }
                Task::Inline(node) if detach_inlines => self.detached.push(node),
                Task::Inline(node) => self.execute_action(node, depth + 1, None, false)?,
            }
        }
        debug_assert!(queues.is_empty());
        Ok(())
    }

    fn run_node(
        &mut self,
        node: NodeId,
        owner: NodeId,
        queues: &mut ContextQueues,
        body: Option<RootBody<'_, S>>,
    ) -> Result<(), KernelError> {
        let script = self.tree[node].script.clone();
        let contract = self.contracts.get(&self.tree[node].receiver).cloned();
        let inert = matches!(body, None | Some(RootBody::Contract))
            && script.is_none()
            && contract.is_none();

        let mut ctx = ApplyContext {
            state: &mut *self.state,
            registry: &mut *self.registry,
            tree: &mut self.tree,
            queues,
            effects: &mut self.effects,
            node,
            owner,
            now: self.now,
            console: String::new(),
        };
        let result = match (body, script, contract) {
            (Some(RootBody::Recovery(handler, failed)), _, _) => handler.as_ref()(&mut ctx, failed),
            (_, Some(script), _) => run_script(&mut ctx, &script),
            (_, None, Some(contract)) => contract.apply(&mut ctx),
            (_, None, None) => Ok(()),
        };
        let console = ctx.into_console();

        let status = match (&result, inert) {
            (Err(_), _) => TraceStatus::Failed,
            (Ok(()), true) => TraceStatus::Inert,
            (Ok(()), false) => TraceStatus::Executed,
        };
        self.record_trace(node, owner, console, status);
        result
    }

    fn record_trace(&mut self, node: NodeId, owner: NodeId, console: String, status: TraceStatus) {
        let declared = &self.tree[node];
        let is_root = declared.parent.is_none();
        self.traces.push(ActionTrace {
            execution_index: self.traces.len() as u32,
            creation_ordinal: node.ordinal(),
            creator_ordinal: declared.parent.map_or(0, NodeId::ordinal),
            closest_unnotified_ancestor_ordinal: if is_root {
                0
            } else if node == owner {
                declared.context_owner.map_or(0, NodeId::ordinal)
            } else {
                owner.ordinal()
            },
            kind: declared.kind,
            receiver: declared.receiver.clone(),
            label: declared.label.clone(),
            call: declared.call.clone(),
            console,
            status,
        });
    }
}

/// Declare the scripted children of the running node, then honour its fail flag.
fn run_script<S>(ctx: &mut ApplyContext<'_, S>, spec: &TreeSpec) -> Result<(), KernelError> {
    for child in &spec.children {
        let script = Arc::new(child.clone());
        let label = Some(child.label.clone());
        match child.kind {
            NodeKind::Notification => {
                ctx.notify_with(Name::from(child.label.as_str()), label, Some(script));
            }
            NodeKind::ContextFreeInline => {
                ctx.declare(
                    NodeKind::ContextFreeInline,
                    Name::from(child.label.as_str()),
                    child.call(),
                    label,
                    Some(script),
                );
            }
            NodeKind::Deferred => {
                let options = child.deferred.clone().unwrap_or(DeferredOptions {
                    sender_id: 0,
                    delay: Duration::ZERO,
                    replace_existing: false,
                });
                ctx.send_deferred(
                    DeferredSend::new(options.sender_id, child.call())
                        .delay(options.delay)
                        .replace_existing(options.replace_existing)
                        .scripted(script),
                )?;
            }
            NodeKind::Root | NodeKind::Inline => {
                ctx.declare(
                    NodeKind::Inline,
                    Name::from(child.label.as_str()),
                    child.call(),
                    label,
                    Some(script),
                );
            }
        }
    }
    if spec.fail {
        return Err(KernelError::ExplicitFailure(format!(
            "{} instructed to fail",
            spec.label
        )));
    }
    Ok(())
}
