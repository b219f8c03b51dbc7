//! Filter graph snapshots.
//!
//! A [`FilterGraph`] is never edited directly; it is rebuilt by walking the
//! links of a session from a seed node. Traversal order is an implementation
//! detail, only membership counts.

use crate::options::Options;
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::id::{NodeId, PlugId};
use crate::pipeline::session::Session;
use crate::registration::registration_match;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Option key of the graph's dirty flag.
pub const DIRTY_KEY: &str = "org/chromagraph/graph/dirty";

/// Which links a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalMask {
    /// Follow plugs to the sockets feeding them.
    pub upstream: bool,
    /// Follow sockets to the plugs requesting from them.
    pub downstream: bool,
}

impl TraversalMask {
    pub const BOTH: TraversalMask = TraversalMask {
        upstream: true,
        downstream: true,
    };
    pub const UPSTREAM: TraversalMask = TraversalMask {
        upstream: true,
        downstream: false,
    };
    pub const DOWNSTREAM: TraversalMask = TraversalMask {
        upstream: false,
        downstream: true,
    };
    pub const SEED_ONLY: TraversalMask = TraversalMask {
        upstream: false,
        downstream: false,
    };
}

/// Nodes and edges reachable from a seed node.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    nodes: Vec<NodeId>,
    edges: Vec<PlugId>,
    options: Options,
}

#[derive(Debug, Serialize)]
struct NodeExport<'a> {
    id: String,
    registration: &'a str,
    category: &'a str,
    context: Option<&'a str>,
    tags: &'a Options,
}

#[derive(Debug, Serialize)]
struct EdgeExport<'a> {
    from: String,
    socket: usize,
    to: String,
    plug: usize,
    type_path: &'a str,
}

#[derive(Debug, Serialize)]
struct GraphExport<'a> {
    nodes: Vec<NodeExport<'a>>,
    edges: Vec<EdgeExport<'a>>,
    options: &'a Options,
}

impl FilterGraph {
    /// Build a snapshot by walking from `seed`.
    ///
    /// With a `tag`, a link is only followed when one of its two nodes
    /// carries the tag. The seed is always part of the graph.
    pub fn from_node(
        session: &Session,
        seed: NodeId,
        mask: TraversalMask,
        tag: Option<&str>,
    ) -> GraphResult<Self> {
        let mut graph = FilterGraph::default();
        graph.set_from_node(session, seed, mask, tag)?;
        Ok(graph)
    }

    /// Rebuild this snapshot in place; options are kept.
    pub fn set_from_node(
        &mut self,
        session: &Session,
        seed: NodeId,
        mask: TraversalMask,
        tag: Option<&str>,
    ) -> GraphResult<()> {
        self.nodes.clear();
        self.edges.clear();

        let mut visited = HashSet::new();
        let mut seen_edges = HashSet::new();
        let mut stack = vec![seed];
        let tag_ok = |a: NodeId, b: NodeId| -> GraphResult<bool> {
            match tag {
                Some(tag) => Ok(session.node(a)?.has_tag(tag) || session.node(b)?.has_tag(tag)),
                None => Ok(true),
            }
        };

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            self.nodes.push(current);
            let node = session.node(current)?;

            if mask.upstream {
                for plug in node.plug_slots().iter().flatten() {
                    let Some(remote) = session.plug_remote_node(*plug)? else {
                        continue;
                    };
                    if tag_ok(current, remote)? {
                        if seen_edges.insert(*plug) {
                            self.edges.push(*plug);
                        }
                        stack.push(remote);
                    }
                }
            }

            if mask.downstream {
                for socket in node.socket_slots().iter().flatten() {
                    for plug in session.socket_plugs(*socket)? {
                        let downstream = session.plug_info(*plug)?.node();
                        if tag_ok(current, downstream)? {
                            if seen_edges.insert(*plug) {
                                self.edges.push(*plug);
                            }
                            stack.push(downstream);
                        }
                    }
                }
            }
        }

        let needs_context = self.nodes.iter().any(|id| {
            session
                .node(*id)
                .map(|n| n.context_type().is_some() && n.context().is_none())
                .unwrap_or(false)
        });
        self.options.set(DIRTY_KEY, needs_context);

        tracing::debug!(
            "graph from {}: {} nodes, {} edges",
            session.relatives(seed),
            self.nodes.len(),
            self.edges.len()
        );
        Ok(())
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn edges(&self) -> &[PlugId] {
        &self.edges
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    fn selected<'a>(
        &'a self,
        session: &'a Session,
        type_pattern: Option<&'a str>,
        tag: Option<&'a str>,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes.iter().copied().filter(move |id| {
            let Ok(node) = session.node(*id) else {
                return false;
            };
            type_pattern.map_or(true, |p| registration_match(node.registration(), p) > 0)
                && tag.map_or(true, |t| node.has_tag(t))
        })
    }

    /// The `position`-th node matching the filters; `None` picks the first.
    pub fn node(
        &self,
        session: &Session,
        position: Option<usize>,
        type_pattern: Option<&str>,
        tag: Option<&str>,
    ) -> Option<NodeId> {
        self.selected(session, type_pattern, tag)
            .nth(position.unwrap_or(0))
    }

    pub fn count_nodes(&self, session: &Session, type_pattern: Option<&str>, tag: Option<&str>) -> usize {
        self.selected(session, type_pattern, tag).count()
    }

    pub fn edge(&self, position: usize) -> Option<PlugId> {
        self.edges.get(position).copied()
    }

    pub fn count_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn is_dirty(&self) -> bool {
        self.options.get(DIRTY_KEY).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn mark_dirty(&mut self) {
        self.options.set(DIRTY_KEY, true);
    }

    /// Fill missing backend contexts, or all of them with `force`.
    ///
    /// Returns how many contexts were produced and clears the dirty flag.
    pub fn prepare_contexts(&mut self, session: &mut Session, force: bool) -> GraphResult<usize> {
        let mut produced = 0;
        for &id in &self.nodes {
            let (capability, wanted) = {
                let node = session.node(id)?;
                let wanted = node.context_type().is_some() && (force || node.context().is_none());
                (node.capability().clone(), wanted)
            };
            if !wanted {
                continue;
            }
            let blob = capability
                .produce_context(session, id)
                .map_err(|source| GraphError::Run {
                    node: session.relatives(id),
                    source,
                })?;
            session.set_context(id, blob)?;
            produced += 1;
        }

        self.options.set(DIRTY_KEY, false);
        tracing::info!(
            "prepared {} contexts for {} nodes (force: {})",
            produced,
            self.nodes.len(),
            force
        );
        Ok(produced)
    }

    /// DOT-like dump of nodes and edges.
    pub fn to_text(&self, session: &Session) -> String {
        let mut text = String::from("digraph FilterGraph {\n  node [shape=box];\n");
        for id in &self.nodes {
            let label = session.relatives(*id);
            let _ = writeln!(text, "  n{} [label=\"{}\"];", id, label);
        }
        for plug in &self.edges {
            let Ok(info) = session.plug_info(*plug) else {
                continue;
            };
            let Some(socket) = info.remote() else {
                continue;
            };
            let Ok(socket) = session.socket_info(socket) else {
                continue;
            };
            let _ = writeln!(
                text,
                "  n{} -> n{} [label=\"{}:{} -> {}:{}\"];",
                socket.node(),
                info.node(),
                socket.pattern().nick(),
                socket.position(),
                info.pattern().nick(),
                info.position()
            );
        }
        text.push_str("}\n");
        text
    }

    /// JSON export of the same information as [`FilterGraph::to_text`].
    pub fn to_json(&self, session: &Session) -> GraphResult<String> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for id in &self.nodes {
            let node = session.node(*id)?;
            nodes.push(NodeExport {
                id: id.to_string(),
                registration: node.registration(),
                category: node.category(),
                context: node.context_type(),
                tags: node.tags(),
            });
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for plug in &self.edges {
            let info = session.plug_info(*plug)?;
            let Some(socket) = info.remote() else {
                continue;
            };
            let socket = session.socket_info(socket)?;
            edges.push(EdgeExport {
                from: socket.node().to_string(),
                socket: socket.position(),
                to: info.node().to_string(),
                plug: info.position(),
                type_path: info.pattern().type_path(),
            });
        }

        let export = GraphExport {
            nodes,
            edges,
            options: &self.options,
        };
        serde_json::to_string_pretty(&export)
            .map_err(|e| GraphError::Mismatch(format!("graph export failed: {}", e)))
    }
}
