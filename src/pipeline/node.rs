//! Filter nodes and the capability trait behind them.
//!
//! A [`FilterNode`] pairs the connector declarations of its node type with
//! lazily created plug and socket instances, a cached backend context and
//! free-form tags. Behaviour comes from the injected [`Capability`].

use crate::options::Options;
use crate::pipeline::connector::{Arity, ConnectorDecl, ConnectorRole};
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::events::SignalKind;
use crate::pipeline::id::{NodeId, PlugId, SocketId};
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;
use crate::registration::registration_key;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Reported by [`Session::edge_count`] for open-ended arity.
pub const UNBOUNDED: usize = usize::MAX;

/// Expensive backend artifact cached per node, e.g. a compiled transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub context_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(context_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            context_type: context_type.into(),
            bytes,
        }
    }
}

/// Behaviour of one node type.
///
/// Declarations are read once when a node is created. `run` is called with
/// the plug requesting data from this node's socket, or with the node's own
/// first plug when the node is the end of a conversion.
#[cfg_attr(test, mockall::automock)]
pub trait Capability: Send + Sync {
    /// Hierarchical type string, e.g. `org/chromagraph/imaging/root`.
    fn registration(&self) -> String;

    /// Input connector declarations.
    fn plugs(&self) -> Vec<ConnectorDecl>;

    /// Output connector declarations.
    fn sockets(&self) -> Vec<ConnectorDecl>;

    /// Options every node of this type starts with.
    fn options(&self) -> Options {
        Options::new()
    }

    /// Non-empty when nodes cache a backend context of this type.
    fn context_type(&self) -> Option<String> {
        None
    }

    /// Build the backend context for `node`.
    fn produce_context(&self, _session: &Session, _node: NodeId) -> anyhow::Result<Blob> {
        Err(anyhow::anyhow!("capability provides no context"))
    }

    /// Fill the ticket for `plug`.
    fn run(
        &self,
        session: &mut Session,
        node: NodeId,
        plug: PlugId,
        ticket: &mut PixelAccessTicket,
    ) -> anyhow::Result<()>;
}

/// Which connectors [`Session::edge_count`] and
/// [`Session::connector_position`] consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    All,
    Free,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeScope {
    AllTypes,
    /// Only the last declaration, i.e. the repeat group if there is one.
    LastTypeOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeFlags {
    pub state: EdgeState,
    pub scope: TypeScope,
}

impl EdgeFlags {
    pub const ALL: EdgeFlags = EdgeFlags::new(EdgeState::All);
    pub const FREE: EdgeFlags = EdgeFlags::new(EdgeState::Free);
    pub const CONNECTED: EdgeFlags = EdgeFlags::new(EdgeState::Connected);

    pub const fn new(state: EdgeState) -> Self {
        Self {
            state,
            scope: TypeScope::AllTypes,
        }
    }

    pub const fn last_type_only(self) -> Self {
        Self {
            state: self.state,
            scope: TypeScope::LastTypeOnly,
        }
    }
}

/// One processing stage.
pub struct FilterNode {
    registration: String,
    category: String,
    plug_decls: Vec<ConnectorDecl>,
    socket_decls: Vec<ConnectorDecl>,
    context_type: Option<String>,
    plugs: Vec<Option<PlugId>>,
    sockets: Vec<Option<SocketId>>,
    context: Option<Arc<Blob>>,
    tags: Options,
    options: Options,
    capability: Arc<dyn Capability>,
}

impl FilterNode {
    pub(super) fn new(
        registration: String,
        plug_decls: Vec<ConnectorDecl>,
        socket_decls: Vec<ConnectorDecl>,
        capability: Arc<dyn Capability>,
    ) -> Self {
        let category = registration_key(&registration).to_string();
        let context_type = capability.context_type().filter(|t| !t.is_empty());
        let options = capability.options();
        Self {
            registration,
            category,
            plug_decls,
            socket_decls,
            context_type,
            plugs: Vec::new(),
            sockets: Vec::new(),
            context: None,
            tags: Options::new(),
            options,
            capability,
        }
    }

    pub fn registration(&self) -> &str {
        &self.registration
    }

    /// Short type name, the last registration level.
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn plug_decls(&self) -> &[ConnectorDecl] {
        &self.plug_decls
    }

    pub fn socket_decls(&self) -> &[ConnectorDecl] {
        &self.socket_decls
    }

    pub fn decls(&self, role: ConnectorRole) -> &[ConnectorDecl] {
        match role {
            ConnectorRole::Plug => &self.plug_decls,
            ConnectorRole::Socket => &self.socket_decls,
        }
    }

    pub fn context_type(&self) -> Option<&str> {
        self.context_type.as_deref()
    }

    /// Materialized plugs, indexed by position.
    pub fn plug_slots(&self) -> &[Option<PlugId>] {
        &self.plugs
    }

    /// Materialized sockets, indexed by position.
    pub fn socket_slots(&self) -> &[Option<SocketId>] {
        &self.sockets
    }

    pub fn context(&self) -> Option<&Arc<Blob>> {
        self.context.as_ref()
    }

    pub fn tags(&self) -> &Options {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Options {
        &mut self.tags
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }

    /// Whether a tag filter selects this node.
    pub fn has_tag(&self, tag: &str) -> bool {
        match self.tags.find(tag) {
            Some(entry) => entry.value.as_bool() != Some(false),
            None => false,
        }
    }

    pub(super) fn store_plug(&mut self, position: usize, id: PlugId) {
        if self.plugs.len() <= position {
            self.plugs.resize(position + 1, None);
        }
        self.plugs[position] = Some(id);
    }

    pub(super) fn store_socket(&mut self, position: usize, id: SocketId) {
        if self.sockets.len() <= position {
            self.sockets.resize(position + 1, None);
        }
        self.sockets[position] = Some(id);
    }

    fn slot_count(&self, role: ConnectorRole) -> usize {
        match role {
            ConnectorRole::Plug => self.plugs.len(),
            ConnectorRole::Socket => self.sockets.len(),
        }
    }
}

impl fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterNode")
            .field("registration", &self.registration)
            .field("plugs", &self.plugs)
            .field("sockets", &self.sockets)
            .field("context", &self.context.as_ref().map(|c| &c.context_type))
            .field("tags", &self.tags)
            .finish()
    }
}

impl Session {
    fn slot_connected(&self, node: &FilterNode, role: ConnectorRole, position: usize) -> bool {
        match role {
            ConnectorRole::Plug => node
                .plugs
                .get(position)
                .copied()
                .flatten()
                .and_then(|id| self.plugs.get(id))
                .is_some_and(|p| p.is_connected()),
            ConnectorRole::Socket => node
                .sockets
                .get(position)
                .copied()
                .flatten()
                .and_then(|id| self.sockets.get(id))
                .is_some_and(|s| s.is_connected()),
        }
    }

    /// Count connectors of `node`.
    ///
    /// `Free` and `All` report [`UNBOUNDED`] when the counted range ends in an
    /// open repeat group; fixed slots report `declared - connected` free.
    /// A socket counts as connected once any plug requests from it.
    pub fn edge_count(&self, id: NodeId, role: ConnectorRole, flags: EdgeFlags) -> GraphResult<usize> {
        let node = self.node(id)?;
        let decls = node.decls(role);
        if decls.is_empty() {
            return Ok(0);
        }
        let arity = Arity::of(decls);

        let (first, possible) = match flags.scope {
            TypeScope::AllTypes => (0, arity.total()),
            TypeScope::LastTypeOnly => match decls.last() {
                Some(ConnectorDecl::RepeatLast { max, .. }) => (arity.fixed, *max),
                _ => (decls.len() - 1, Some(1)),
            },
        };

        let connected = (first..node.slot_count(role))
            .filter(|&pos| self.slot_connected(node, role, pos))
            .count();

        Ok(match flags.state {
            EdgeState::All => possible.unwrap_or(UNBOUNDED),
            EdgeState::Connected => connected,
            EdgeState::Free => possible
                .map(|p| p.saturating_sub(connected))
                .unwrap_or(UNBOUNDED),
        })
    }

    /// Absolute position of the `nth` connector matching `selector` and `flags`.
    ///
    /// Declarations are scanned in order; a repeat group contributes its slots
    /// one by one. An open group offers one slot past the last materialized
    /// one, so a free position always exists there.
    pub fn connector_position(
        &self,
        id: NodeId,
        role: ConnectorRole,
        selector: Option<&str>,
        nth: usize,
        flags: EdgeFlags,
    ) -> GraphResult<Option<usize>> {
        let node = self.node(id)?;
        let decls = node.decls(role);
        let materialized = node.slot_count(role);
        let mut seen = 0;

        for (i, decl) in decls.iter().enumerate() {
            if flags.scope == TypeScope::LastTypeOnly && i + 1 != decls.len() {
                continue;
            }
            if let Some(selector) = selector {
                if !decl.pattern().selected_by(selector) {
                    continue;
                }
            }
            let group = match decl {
                ConnectorDecl::Fixed(_) => 1,
                ConnectorDecl::RepeatLast { max: Some(max), .. } => {
                    (*max).min(materialized.saturating_sub(i) + 1)
                }
                ConnectorDecl::RepeatLast { max: None, .. } => materialized.saturating_sub(i) + 1,
            };
            for j in 0..group {
                let pos = i + j;
                let qualifies = match flags.state {
                    EdgeState::All => true,
                    EdgeState::Free => !self.slot_connected(node, role, pos),
                    EdgeState::Connected => self.slot_connected(node, role, pos),
                };
                if qualifies {
                    if seen == nth {
                        return Ok(Some(pos));
                    }
                    seen += 1;
                }
            }
        }
        Ok(None)
    }

    /// Whether the socket at `socket_pos` of `node` accepts `plug`.
    pub fn connector_match(&self, node: NodeId, socket_pos: usize, plug: PlugId) -> GraphResult<bool> {
        let n = self.node(node)?;
        let Some(decl) = crate::pipeline::connector::decl_for_position(n.socket_decls(), socket_pos)
        else {
            return Ok(false);
        };
        let plug_pattern = self.plug_ref(plug)?.pattern();
        Ok(decl.pattern().matches(plug_pattern))
    }

    /// Link a socket of `input` to a plug of `output`.
    ///
    /// `input` provides data, `output` consumes it. Selectors pick the
    /// connector by nick or type path; `None` takes the first free one.
    pub fn connect(
        &mut self,
        input: NodeId,
        socket_selector: Option<&str>,
        output: NodeId,
        plug_selector: Option<&str>,
    ) -> GraphResult<PlugId> {
        if self.edge_count(input, ConnectorRole::Socket, EdgeFlags::FREE)? == 0 {
            return Err(GraphError::NoFreeSocket(self.relatives(input)));
        }
        let socket_pos = self
            .connector_position(input, ConnectorRole::Socket, socket_selector, 0, EdgeFlags::FREE)?
            .ok_or_else(|| {
                GraphError::Mismatch(format!(
                    "{} has no free socket matching {:?}",
                    self.relatives(input),
                    socket_selector
                ))
            })?;
        let plug_pos = self
            .connector_position(output, ConnectorRole::Plug, plug_selector, 0, EdgeFlags::FREE)?
            .ok_or_else(|| {
                GraphError::Mismatch(format!(
                    "{} has no free plug matching {:?}",
                    self.relatives(output),
                    plug_selector
                ))
            })?;

        let socket = self.socket(input, socket_pos)?;
        let plug = self.plug(output, plug_pos)?;

        if !self.connector_match(input, socket_pos, plug)? {
            return Err(GraphError::Mismatch(format!(
                "socket {} of {} rejects plug {} of {}",
                socket_pos,
                self.relatives(input),
                plug_pos,
                self.relatives(output)
            )));
        }

        self.connect_plug(plug, socket)?;
        Ok(plug)
    }

    /// Run the capability of `node` for `plug`, then signal `Visited`.
    ///
    /// Errors raised by the engine inside a capability come back unchanged;
    /// other capability failures are wrapped in [`GraphError::Run`]. A node
    /// that is already being pulled through the same ticket, or a pull nested
    /// deeper than the configured limit, fails with
    /// [`GraphError::CycleDetected`].
    pub fn run(&mut self, node: NodeId, plug: PlugId, ticket: &mut PixelAccessTicket) -> GraphResult<()> {
        let capability = self.node(node)?.capability.clone();

        if ticket.is_pulling(node) || ticket.pull_depth() >= ticket.max_resolve_depth() {
            tracing::warn!(
                "aborting pull through {} at depth {}",
                self.relatives(node),
                ticket.pull_depth()
            );
            return Err(GraphError::CycleDetected(self.relatives(node)));
        }

        ticket.enter(node);
        let result = capability.run(self, node, plug, ticket);
        ticket.leave(node);

        result.map_err(|source| match source.downcast::<GraphError>() {
            Ok(err) => err,
            Err(source) => GraphError::Run {
                node: self.relatives(node),
                source,
            },
        })?;

        self.emit(node, SignalKind::Visited, None);
        Ok(())
    }

    /// Cache a backend context on `node`.
    pub fn set_context(&mut self, node: NodeId, blob: Blob) -> GraphResult<()> {
        self.node_mut(node)?.context = Some(Arc::new(blob));
        Ok(())
    }

    pub fn context(&self, node: NodeId) -> GraphResult<Option<Arc<Blob>>> {
        Ok(self.node(node)?.context.clone())
    }

    pub fn clear_context(&mut self, node: NodeId) -> GraphResult<Option<Arc<Blob>>> {
        Ok(self.node_mut(node)?.context.take())
    }

    /// Next node downstream along socket 0's first requesting plug.
    pub fn linear_next(&self, node: NodeId) -> GraphResult<Option<NodeId>> {
        match self.node(node)?.sockets.first().copied().flatten() {
            Some(socket) => self.socket_node(socket, 0),
            None => Ok(None),
        }
    }

    /// Follow [`linear_next`](Self::linear_next) until the chain ends.
    ///
    /// Stops at the first repeated node when the chain loops.
    pub fn linear_last(&self, node: NodeId) -> GraphResult<NodeId> {
        let mut seen = HashSet::from([node]);
        let mut last = node;
        while let Some(next) = self.linear_next(last)? {
            if !seen.insert(next) {
                break;
            }
            last = next;
        }
        Ok(last)
    }

    /// Previous node upstream along plug 0.
    pub fn linear_previous(&self, node: NodeId) -> GraphResult<Option<NodeId>> {
        match self.node(node)?.plugs.first().copied().flatten() {
            Some(plug) => self.plug_remote_node(plug),
            None => Ok(None),
        }
    }
}
