//! Plugs, sockets and the links between them.
//!
//! A plug holds at most one link to a remote socket; a socket keeps the set
//! of plugs requesting from it. Both sides are updated together so that
//! `plug.remote() == Some(socket)` exactly when `socket.requesting()` lists
//! the plug.

use crate::image::Image;
use crate::pipeline::connector::{decl_for_position, Arity, ConnectorPattern, ConnectorRole};
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::events::SignalKind;
use crate::pipeline::id::{NodeId, PlugId, SocketId};
use crate::pipeline::session::Session;
use std::sync::Arc;

/// Input connector instance.
#[derive(Debug, Clone)]
pub struct Plug {
    node: NodeId,
    position: usize,
    remote: Option<SocketId>,
    pattern: Arc<ConnectorPattern>,
    relatives: String,
}

impl Plug {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remote(&self) -> Option<SocketId> {
        self.remote
    }

    pub fn is_connected(&self) -> bool {
        self.remote.is_some()
    }

    pub fn pattern(&self) -> &Arc<ConnectorPattern> {
        &self.pattern
    }

    pub fn relatives(&self) -> &str {
        &self.relatives
    }
}

/// Output connector instance with its cached payload.
#[derive(Debug, Clone)]
pub struct Socket {
    node: NodeId,
    position: usize,
    requesting: Vec<PlugId>,
    data: Option<Arc<Image>>,
    pattern: Arc<ConnectorPattern>,
    relatives: String,
}

impl Socket {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Plugs linked to this socket.
    pub fn requesting(&self) -> &[PlugId] {
        &self.requesting
    }

    pub fn is_connected(&self) -> bool {
        !self.requesting.is_empty()
    }

    pub fn data(&self) -> Option<&Arc<Image>> {
        self.data.as_ref()
    }

    pub fn pattern(&self) -> &Arc<ConnectorPattern> {
        &self.pattern
    }

    pub fn relatives(&self) -> &str {
        &self.relatives
    }
}

impl Session {
    /// Get or create the plug at `position` of `node`.
    pub fn plug(&mut self, node: NodeId, position: usize) -> GraphResult<PlugId> {
        let (pattern, relatives) = {
            let n = self.node(node)?;
            if let Some(Some(id)) = n.plug_slots().get(position) {
                return Ok(*id);
            }
            let decl = decl_for_position(n.plug_decls(), position).ok_or_else(|| {
                out_of_range("plug", position, Arity::of(n.plug_decls()))
            })?;
            check_growth("plug", position, Arity::of(n.plug_decls()), n.plug_slots().len())?;
            (
                decl.pattern().clone(),
                format!("{}: {}", node, n.category()),
            )
        };

        let id = self.plugs.insert(Plug {
            node,
            position,
            remote: None,
            pattern,
            relatives,
        });
        self.node_mut(node)?.store_plug(position, id);
        Ok(id)
    }

    /// Get or create the socket at `position` of `node`.
    pub fn socket(&mut self, node: NodeId, position: usize) -> GraphResult<SocketId> {
        let (pattern, relatives) = {
            let n = self.node(node)?;
            if let Some(Some(id)) = n.socket_slots().get(position) {
                return Ok(*id);
            }
            let decl = decl_for_position(n.socket_decls(), position).ok_or_else(|| {
                out_of_range("socket", position, Arity::of(n.socket_decls()))
            })?;
            check_growth("socket", position, Arity::of(n.socket_decls()), n.socket_slots().len())?;
            (
                decl.pattern().clone(),
                format!("{}: {}", node, n.category()),
            )
        };

        let id = self.sockets.insert(Socket {
            node,
            position,
            requesting: Vec::new(),
            data: None,
            pattern,
            relatives,
        });
        self.node_mut(node)?.store_socket(position, id);
        Ok(id)
    }

    pub fn plug_info(&self, plug: PlugId) -> GraphResult<&Plug> {
        self.plug_ref(plug)
    }

    pub fn socket_info(&self, socket: SocketId) -> GraphResult<&Socket> {
        self.socket_ref(socket)
    }

    /// Link `plug` to `socket`.
    ///
    /// A plug that is already linked elsewhere is released first. When the
    /// socket carries data and the plug's node has an empty first socket,
    /// the payload is shared forward so pass-through nodes start out with
    /// an image description.
    pub fn connect_plug(&mut self, plug: PlugId, socket: SocketId) -> GraphResult<()> {
        let (plug_node, plug_pattern, old_remote) = {
            let p = self.plug_ref(plug)?;
            (p.node, p.pattern.clone(), p.remote)
        };
        let (socket_node, socket_pattern, socket_data) = {
            let s = self.socket_ref(socket)?;
            (s.node, s.pattern.clone(), s.data.clone())
        };

        if plug_pattern.role() != ConnectorRole::Plug || socket_pattern.role() != ConnectorRole::Socket {
            return Err(GraphError::Mismatch(format!(
                "cannot link a {} to a {}",
                plug_pattern.role(),
                socket_pattern.role()
            )));
        }
        if !socket_pattern.matches(&plug_pattern) {
            tracing::warn!(
                "connector mismatch: plug '{}' on {} vs socket '{}' on {}",
                plug_pattern.type_path(),
                self.relatives(plug_node),
                socket_pattern.type_path(),
                self.relatives(socket_node)
            );
            return Err(GraphError::Mismatch(format!(
                "plug '{}' does not accept socket '{}'",
                plug_pattern.type_path(),
                socket_pattern.type_path()
            )));
        }

        if old_remote == Some(socket) {
            return Ok(());
        }
        if self.config().reject_cycles_on_connect && self.would_create_cycle(socket_node, plug_node)? {
            return Err(GraphError::CycleDetected(self.relatives(plug_node)));
        }
        if old_remote.is_some() {
            self.disconnect(plug)?;
        }

        self.plug_mut(plug)?.remote = Some(socket);
        let s = self.socket_mut(socket)?;
        if !s.requesting.contains(&plug) {
            s.requesting.push(plug);
        }

        if let Some(data) = socket_data {
            let has_sockets = !self.node(plug_node)?.socket_decls().is_empty();
            if has_sockets {
                let own = self.socket(plug_node, 0)?;
                if own != socket && self.socket_ref(own)?.data.is_none() {
                    self.set_socket_data(own, Some(data))?;
                }
            }
        }

        tracing::debug!(
            "connected {} -> {}",
            self.relatives(socket_node),
            self.relatives(plug_node)
        );
        self.emit_pair(socket_node, plug_node, SignalKind::Connected);
        Ok(())
    }

    /// Remove the link of `plug`, if any. Returns whether a link existed.
    pub fn disconnect(&mut self, plug: PlugId) -> GraphResult<bool> {
        let (plug_node, remote) = {
            let p = self.plug_mut(plug)?;
            (p.node, p.remote.take())
        };
        let Some(socket) = remote else {
            return Ok(false);
        };

        // The socket may already be gone if its node was released.
        let socket_node = match self.sockets.get_mut(socket) {
            Some(s) => {
                s.requesting.retain(|p| *p != plug);
                Some(s.node)
            }
            None => None,
        };

        match socket_node {
            Some(socket_node) => {
                tracing::debug!(
                    "released {} -> {}",
                    self.relatives(socket_node),
                    self.relatives(plug_node)
                );
                self.emit_pair(socket_node, plug_node, SignalKind::Released);
            }
            None => self.emit(plug_node, SignalKind::Released, None),
        }
        Ok(true)
    }

    /// Data cached on `socket`.
    pub fn socket_data(&self, socket: SocketId) -> GraphResult<Option<Arc<Image>>> {
        Ok(self.socket_ref(socket)?.data.clone())
    }

    /// Replace the data cached on `socket` and notify its node.
    pub fn set_socket_data(&mut self, socket: SocketId, data: Option<Arc<Image>>) -> GraphResult<()> {
        let s = self.socket_mut(socket)?;
        s.data = data;
        let node = s.node;
        self.emit(node, SignalKind::DataChanged, None);
        Ok(())
    }

    /// Node owning the socket `plug` is linked to.
    pub fn plug_remote_node(&self, plug: PlugId) -> GraphResult<Option<NodeId>> {
        match self.plug_ref(plug)?.remote {
            Some(socket) => Ok(Some(self.socket_ref(socket)?.node)),
            None => Ok(None),
        }
    }

    /// Plugs requesting from `socket`.
    pub fn socket_plugs(&self, socket: SocketId) -> GraphResult<&[PlugId]> {
        Ok(self.socket_ref(socket)?.requesting())
    }

    /// Node owning the `nth` plug requesting from `socket`.
    pub fn socket_node(&self, socket: SocketId, nth: usize) -> GraphResult<Option<NodeId>> {
        match self.socket_ref(socket)?.requesting.get(nth) {
            Some(plug) => Ok(Some(self.plug_ref(*plug)?.node)),
            None => Ok(None),
        }
    }

    /// Whether linking a socket of `upstream` into a plug of `downstream`
    /// would close a loop.
    pub fn would_create_cycle(&self, upstream: NodeId, downstream: NodeId) -> GraphResult<bool> {
        // If `downstream` already feeds `upstream`, the new link closes a loop.
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![downstream];

        while let Some(current) = stack.pop() {
            if current == upstream {
                return Ok(true);
            }
            if !visited.insert(current) {
                continue;
            }
            for socket in self.node(current)?.socket_slots().iter().flatten() {
                for plug in &self.socket_ref(*socket)?.requesting {
                    stack.push(self.plug_ref(*plug)?.node);
                }
            }
        }
        Ok(false)
    }
}

/// A repeat group grows one slot at a time: past the fixed slots, only
/// already materialized positions and the next one may be requested.
fn check_growth(what: &str, position: usize, arity: Arity, materialized: usize) -> GraphResult<()> {
    let next = materialized.max(arity.fixed);
    if position >= arity.fixed && position > next {
        return Err(GraphError::OutOfRange {
            what: what.to_string(),
            position,
            declared: format!("next repeat slot is {}", next),
        });
    }
    Ok(())
}

fn out_of_range(what: &str, position: usize, arity: Arity) -> GraphError {
    GraphError::OutOfRange {
        what: what.to_string(),
        position,
        declared: match arity.total() {
            Some(total) => total.to_string(),
            None => "unbounded".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{DataType, PixelLayout};
    use crate::pipeline::events::SignalKind;
    use crate::pipeline::testing::{plug_only, single_socket, socket_and_plug};

    #[test]
    fn test_get_or_create_is_memoized() {
        let mut session = Session::new();
        let n = session.create_node(socket_and_plug("img/rgb")).unwrap();
        let a = session.plug(n, 0).unwrap();
        let b = session.plug(n, 0).unwrap();
        assert_eq!(a, b);
        assert!(session.plug(n, 1).is_err());
    }

    #[test]
    fn test_out_of_range_leaves_arena_untouched() {
        use crate::pipeline::connector::{ConnectorDecl, ConnectorPattern};
        use crate::pipeline::testing::TestCapability;
        use std::sync::Arc;

        let mut session = Session::new();
        let split = session
            .create_node(Arc::new(TestCapability::new("org/test/split").with_sockets(vec![
                ConnectorDecl::fixed(ConnectorPattern::socket("img/rgb")),
                ConnectorDecl::repeat(ConnectorPattern::socket("img/rgb")),
            ])))
            .unwrap();

        assert!(session.socket(split, usize::MAX).is_err());
        assert!(session.socket(split, 2).is_err());
        assert_eq!(session.sockets.len(), 0);

        // fixed slot 0 may stay unmaterialized while the group starts at 1
        session.socket(split, 1).unwrap();
        session.socket(split, 2).unwrap();
        assert!(session.socket(split, 4).is_err());
        assert_eq!(session.sockets.len(), 2);
    }

    #[test]
    fn test_connect_is_bidirectional() {
        let mut session = Session::new();
        let src = session.create_node(single_socket("img/rgb")).unwrap();
        let dst = session.create_node(plug_only("img/rgb")).unwrap();
        let socket = session.socket(src, 0).unwrap();
        let plug = session.plug(dst, 0).unwrap();

        session.connect_plug(plug, socket).unwrap();
        assert_eq!(session.plug_info(plug).unwrap().remote(), Some(socket));
        assert_eq!(session.socket_plugs(socket).unwrap(), &[plug]);
        assert_eq!(session.plug_remote_node(plug).unwrap(), Some(src));
        assert_eq!(session.socket_node(socket, 0).unwrap(), Some(dst));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut session = Session::new();
        let src = session.create_node(single_socket("img/rgb")).unwrap();
        let dst = session.create_node(plug_only("img/cmyk")).unwrap();
        let socket = session.socket(src, 0).unwrap();
        let plug = session.plug(dst, 0).unwrap();

        let err = session.connect_plug(plug, socket).unwrap_err();
        assert!(matches!(err, GraphError::Mismatch(_)));
        assert!(session.plug_info(plug).unwrap().remote().is_none());
        assert!(session.socket_plugs(socket).unwrap().is_empty());
    }

    #[test]
    fn test_reconnect_releases_old_link() {
        let mut session = Session::new();
        let a = session.create_node(single_socket("img/rgb")).unwrap();
        let b = session.create_node(single_socket("img/rgb")).unwrap();
        let dst = session.create_node(plug_only("img/rgb")).unwrap();
        let sa = session.socket(a, 0).unwrap();
        let sb = session.socket(b, 0).unwrap();
        let plug = session.plug(dst, 0).unwrap();

        session.connect_plug(plug, sa).unwrap();
        let rx = session.subscribe(a);
        session.connect_plug(plug, sb).unwrap();

        assert!(session.socket_plugs(sa).unwrap().is_empty());
        assert_eq!(session.socket_plugs(sb).unwrap(), &[plug]);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SignalKind::Released);
    }

    #[test]
    fn test_bootstrap_data_propagates_forward() {
        let mut session = Session::new();
        let src = session.create_node(single_socket("img/rgb")).unwrap();
        let mid = session.create_node(socket_and_plug("img/rgb")).unwrap();
        let socket = session.socket(src, 0).unwrap();
        let image = Arc::new(Image::new(4, 2, PixelLayout::new(3, DataType::U8), "sRGB"));
        session.set_socket_data(socket, Some(image.clone())).unwrap();

        let plug = session.plug(mid, 0).unwrap();
        session.connect_plug(plug, socket).unwrap();

        let mid_socket = session.socket(mid, 0).unwrap();
        let forwarded = session.socket_data(mid_socket).unwrap().unwrap();
        assert!(Arc::ptr_eq(&forwarded, &image));
    }

    #[test]
    fn test_disconnect_unlinked_plug_is_noop() {
        let mut session = Session::new();
        let dst = session.create_node(plug_only("img/rgb")).unwrap();
        let plug = session.plug(dst, 0).unwrap();
        assert!(!session.disconnect(plug).unwrap());
    }

    #[test]
    fn test_cycle_rejected_on_connect() {
        let mut session = Session::new();
        let a = session.create_node(socket_and_plug("img/rgb")).unwrap();
        let b = session.create_node(socket_and_plug("img/rgb")).unwrap();

        let sa = session.socket(a, 0).unwrap();
        let pb = session.plug(b, 0).unwrap();
        session.connect_plug(pb, sa).unwrap();

        let sb = session.socket(b, 0).unwrap();
        let pa = session.plug(a, 0).unwrap();
        let err = session.connect_plug(pa, sb).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected(_)));
        assert!(session.plug_info(pa).unwrap().remote().is_none());
    }
}
