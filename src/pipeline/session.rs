//! The session arena owning every node, plug and socket.
//!
//! Cross references between graph objects are handles into this arena, so a
//! node, its connectors and their links never keep each other alive.
//! Dropping the session drops the whole graph.

use crate::config::EngineConfig;
use crate::pipeline::connector::{validate_decls, ConnectorRole};
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::events::{EventHub, NodeEvent, SignalKind};
use crate::pipeline::id::{Arena, NodeId, PlugId, SocketId};
use crate::pipeline::node::{Capability, FilterNode};
use crate::pipeline::plug::{Plug, Socket};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Owner of a filter graph's objects.
#[derive(Default)]
pub struct Session {
    pub(super) nodes: Arena<NodeId, FilterNode>,
    pub(super) plugs: Arena<PlugId, Plug>,
    pub(super) sockets: Arena<SocketId, Socket>,
    events: EventHub,
    config: EngineConfig,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session with custom settings; rejects configs that fail
    /// [`EngineConfig::validate`].
    pub fn with_config(config: EngineConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Nodes ──

    /// Create a node backed by `capability`.
    ///
    /// Fails with [`GraphError::CapabilityMissing`] when the capability has no
    /// registration, declares no connectors at all, declares a repeat group
    /// anywhere but last, or lists a pattern under the wrong role.
    pub fn create_node(&mut self, capability: Arc<dyn Capability>) -> GraphResult<NodeId> {
        let registration = capability.registration();
        let missing = |reason: String| GraphError::CapabilityMissing {
            registration: registration.clone(),
            reason,
        };

        if registration.trim().is_empty() {
            return Err(missing("empty registration".to_string()));
        }

        let plugs = capability.plugs();
        let sockets = capability.sockets();
        if plugs.is_empty() && sockets.is_empty() {
            return Err(missing("no connectors declared".to_string()));
        }
        validate_decls(&plugs).map_err(&missing)?;
        validate_decls(&sockets).map_err(&missing)?;

        for (decls, role) in [(&plugs, ConnectorRole::Plug), (&sockets, ConnectorRole::Socket)] {
            if let Some(bad) = decls.iter().find(|d| d.pattern().role() != role) {
                return Err(missing(format!(
                    "'{}' is declared as {} but listed with the {}s",
                    bad.pattern().type_path(),
                    bad.pattern().role(),
                    role
                )));
            }
        }

        let node = FilterNode::new(registration, plugs, sockets, capability);
        let id = self.nodes.insert(node);
        tracing::debug!(node = %id, registration = %self.nodes.get(id).map(|n| n.registration()).unwrap_or(""), "created node");
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&FilterNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::StaleHandle(format!("{:?}", id)))
    }

    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut FilterNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::StaleHandle(format!("{:?}", id)))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate over live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FilterNode)> {
        self.nodes.iter()
    }

    /// Human readable `"<id>: <category>"` label.
    pub fn relatives(&self, id: NodeId) -> String {
        match self.nodes.get(id) {
            Some(node) => format!("{}: {}", id, node.category()),
            None => format!("{}: <released>", id),
        }
    }

    /// Disconnect every link of `id`, drop its connectors and free the slot.
    pub fn release_node(&mut self, id: NodeId) -> GraphResult<()> {
        let (plugs, sockets) = {
            let node = self.node(id)?;
            (
                node.plug_slots().iter().flatten().copied().collect::<Vec<_>>(),
                node.socket_slots().iter().flatten().copied().collect::<Vec<_>>(),
            )
        };

        for plug in &plugs {
            self.disconnect(*plug)?;
        }
        for socket in &sockets {
            let requesting = self.socket_ref(*socket)?.requesting().to_vec();
            for plug in requesting {
                self.disconnect(plug)?;
            }
        }

        for plug in plugs {
            self.plugs.remove(plug);
        }
        for socket in sockets {
            self.sockets.remove(socket);
        }
        self.nodes.remove(id);
        self.events.forget(id);
        tracing::debug!(node = %id, "released node");
        Ok(())
    }

    // ── Connector storage ──

    pub(super) fn plug_ref(&self, id: PlugId) -> GraphResult<&Plug> {
        self.plugs
            .get(id)
            .ok_or_else(|| GraphError::StaleHandle(format!("{:?}", id)))
    }

    pub(super) fn plug_mut(&mut self, id: PlugId) -> GraphResult<&mut Plug> {
        self.plugs
            .get_mut(id)
            .ok_or_else(|| GraphError::StaleHandle(format!("{:?}", id)))
    }

    pub(super) fn socket_ref(&self, id: SocketId) -> GraphResult<&Socket> {
        self.sockets
            .get(id)
            .ok_or_else(|| GraphError::StaleHandle(format!("{:?}", id)))
    }

    pub(super) fn socket_mut(&mut self, id: SocketId) -> GraphResult<&mut Socket> {
        self.sockets
            .get_mut(id)
            .ok_or_else(|| GraphError::StaleHandle(format!("{:?}", id)))
    }

    // ── Events ──

    /// Receive events addressed to `node`.
    pub fn subscribe(&mut self, node: NodeId) -> Receiver<NodeEvent> {
        self.events.subscribe(node)
    }

    /// Receive every event of this session.
    pub fn subscribe_all(&mut self) -> Receiver<NodeEvent> {
        self.events.subscribe_all()
    }

    pub(crate) fn emit(&mut self, node: NodeId, kind: SignalKind, peer: Option<NodeId>) {
        if self.config.debug_signals {
            tracing::debug!("{} <- {}", self.relatives(node), kind);
        }
        self.events.emit(NodeEvent { node, kind, peer });
    }

    /// Emit `kind` to both ends of a link, once per distinct node.
    pub(super) fn emit_pair(&mut self, a: NodeId, b: NodeId, kind: SignalKind) {
        self.emit(a, kind, Some(b));
        if a != b {
            self.emit(b, kind, Some(a));
        }
    }
}
