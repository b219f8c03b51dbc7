//! Structural event notifications.
//!
//! Observers subscribe to one node or to every node and receive
//! [`NodeEvent`]s over a crossbeam channel. The engine only emits; it never
//! waits for or interprets what observers do with the events.

use crate::pipeline::id::NodeId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;

/// What happened to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// One of the node's connectors was linked.
    Connected,
    /// One of the node's links went away.
    Released,
    /// Data cached on one of the node's sockets changed.
    DataChanged,
    /// The node finished a run.
    Visited,
    /// A pull found the graph lacking data it needed.
    IncompleteGraph,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::Connected => "connected",
            SignalKind::Released => "released",
            SignalKind::DataChanged => "data_changed",
            SignalKind::Visited => "visited",
            SignalKind::IncompleteGraph => "incomplete_graph",
        };
        f.write_str(s)
    }
}

/// A signal addressed to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: NodeId,
    pub kind: SignalKind,
    /// The node on the other side of the link, for structural signals.
    pub peer: Option<NodeId>,
}

struct Subscriber {
    node: Option<NodeId>,
    tx: Sender<NodeEvent>,
}

/// Fan-out of node events to channel subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: Vec<Subscriber>,
    emitted: u64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive events addressed to `node`.
    pub fn subscribe(&mut self, node: NodeId) -> Receiver<NodeEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(Subscriber {
            node: Some(node),
            tx,
        });
        rx
    }

    /// Receive every event.
    pub fn subscribe_all(&mut self) -> Receiver<NodeEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(Subscriber { node: None, tx });
        rx
    }

    pub fn emit(&mut self, event: NodeEvent) {
        self.emitted += 1;
        tracing::trace!(node = %event.node, kind = %event.kind, "node event");
        // Subscribers whose receiver was dropped are pruned on the way.
        self.subscribers.retain(|sub| {
            if sub.node.is_some_and(|n| n != event.node) {
                return true;
            }
            sub.tx.send(event).is_ok()
        });
    }

    /// Drop every subscription bound to `node`.
    pub fn forget(&mut self, node: NodeId) {
        self.subscribers.retain(|sub| sub.node != Some(node));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}
