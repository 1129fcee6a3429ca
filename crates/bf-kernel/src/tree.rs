//! Dispatch nodes, the creation-tree arena and scripted tree topologies.

use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::call::{Call, Name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Notification,
    Inline,
    ContextFreeInline,
    Deferred,
}

/// Index of a node inside its [`DispatchTree`]; only the arena mints one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// 1-based creation ordinal.
    pub fn ordinal(self) -> u32 {
        self.0 as u32 + 1
    }
}

/// One declared unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchNode {
    pub kind: NodeKind,
    /// Account whose code runs for this node. Differs from `call.account`
    /// only for notifications.
    pub receiver: Name,
    pub call: Call,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Node whose execution declared this one.
    pub parent: Option<NodeId>,
    /// Owner of the action context the node was declared in; for executed
    /// nodes this is the execution-tree parent.
    pub context_owner: Option<NodeId>,
    pub children: Vec<NodeId>,
    #[serde(skip)]
    pub(crate) script: Option<Arc<TreeSpec>>,
}

/// Arena holding the creation tree of one pass. Children are appended while
/// their parent executes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchTree {
    nodes: Vec<DispatchNode>,
}

impl DispatchTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_root(
        &mut self,
        kind: NodeKind,
        call: Call,
        label: Option<String>,
        script: Option<Arc<TreeSpec>>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DispatchNode {
            kind,
            receiver: call.account.clone(),
            call,
            label,
            parent: None,
            context_owner: None,
            children: Vec::new(),
            script,
        });
        id
    }

    /// Append a node declared by `parent` within the context owned by `owner`.
    pub(crate) fn declare(
        &mut self,
        parent: NodeId,
        owner: NodeId,
        kind: NodeKind,
        receiver: Name,
        call: Call,
        label: Option<String>,
        script: Option<Arc<TreeSpec>>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DispatchNode {
            kind,
            receiver,
            call,
            label,
            parent: Some(parent),
            context_owner: Some(owner),
            children: Vec::new(),
            script,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&DispatchNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DispatchNode)> {
        self.nodes.iter().enumerate().map(|(ix, node)| (NodeId(ix), node))
    }

    /// Label (or receiver) of every node in creation order.
    pub fn creation_order(&self) -> Vec<String> {
        self.nodes.iter().map(display_name).collect()
    }
}

impl Index<NodeId> for DispatchTree {
    type Output = DispatchNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

pub(crate) fn display_name(node: &DispatchNode) -> String {
    node.label
        .clone()
        .unwrap_or_else(|| node.receiver.to_string())
}

/// Deferred scheduling options of a scripted node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredOptions {
    pub sender_id: u128,
    pub delay: Duration,
    pub replace_existing: bool,
}

/// Caller-supplied topology for a scripted dispatch: executing a node declares
/// its `children` in order and then fails if `fail` is set.
///
/// Labels double as the receiving identity of each node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSpec {
    pub label: String,
    pub kind: NodeKind,
    pub fail: bool,
    pub deferred: Option<DeferredOptions>,
    pub children: Vec<TreeSpec>,
}

impl TreeSpec {
    pub(crate) fn call(&self) -> Call {
        Call::bare(self.label.as_str(), "scripted")
    }
}

/// Fluent builder for [`TreeSpec`] topologies.
///
/// ```ignore
/// let spec = TreeBuilder::root("a1")
///     .notify("n1")
///     .inline("i2", |b| b.notify("n4").notify("n5").inline("i3", |b| b).context_free("c3"))
///     .notify_with("n2", |b| b.inline("i1", |b| b).context_free("c1").notify("n3"))
///     .context_free("c2")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    spec: TreeSpec,
}

impl TreeBuilder {
    pub fn root(label: impl Into<String>) -> Self {
        Self::node(label, NodeKind::Root)
    }

    fn node(label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            spec: TreeSpec {
                label: label.into(),
                kind,
                fail: false,
                deferred: None,
                children: Vec::new(),
            },
        }
    }

    /// Make the node under construction fail after declaring its children.
    pub fn fail(mut self) -> Self {
        self.spec.fail = true;
        self
    }

    pub fn notify(self, label: impl Into<String>) -> Self {
        self.notify_with(label, |b| b)
    }

    pub fn notify_with(self, label: impl Into<String>, build: impl FnOnce(TreeBuilder) -> TreeBuilder) -> Self {
        self.child(label, NodeKind::Notification, build)
    }

    pub fn inline(self, label: impl Into<String>, build: impl FnOnce(TreeBuilder) -> TreeBuilder) -> Self {
        self.child(label, NodeKind::Inline, build)
    }

    pub fn context_free(self, label: impl Into<String>) -> Self {
        self.child(label, NodeKind::ContextFreeInline, |b| b)
    }

    pub fn deferred(
        mut self,
        label: impl Into<String>,
        options: DeferredOptions,
        build: impl FnOnce(TreeBuilder) -> TreeBuilder,
    ) -> Self {
        let mut child = build(Self::node(label, NodeKind::Deferred)).spec;
        child.deferred = Some(options);
        self.spec.children.push(child);
        self
    }

    fn child(
        mut self,
        label: impl Into<String>,
        kind: NodeKind,
        build: impl FnOnce(TreeBuilder) -> TreeBuilder,
    ) -> Self {
        let child = build(Self::node(label, kind)).spec;
        self.spec.children.push(child);
        self
    }

    pub fn build(self) -> TreeSpec {
        self.spec
    }
}
