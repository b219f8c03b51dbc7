//! Filter graph engine.
//!
//! Nodes, plugs and sockets live in a [`Session`] arena and refer to each
//! other through generation-checked handles. Running a node pulls its input
//! through [`resolve_image`], which runs upstream nodes on demand.
//!
//! # Architecture
//!
//! ```text
//! [RootNode] socket ──► plug [PassthroughNode] socket ──► plug [OutputNode]
//!                                                              ▲
//!                                           Conversion::run_pixels(ticket)
//! ```
//!
//! # Design
//!
//! - **Arena handles**: `NodeId`, `PlugId` and `SocketId` index the session;
//!   stale handles fail with [`GraphError::StaleHandle`].
//! - **Capabilities**: node behaviour is an injected [`Capability`] trait
//!   object, connector arity a [`ConnectorDecl`] enum.
//! - **Snapshots**: a [`FilterGraph`] is rebuilt by traversal, never edited.
//! - **Events**: structural changes go out on crossbeam channels.

pub mod connector;
pub mod error;
pub mod events;
pub mod graph;
pub mod id;
pub mod node;
pub mod nodes;
pub mod plug;
pub mod resolve;
pub mod session;
pub mod ticket;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::{Arity, ConnectorDecl, ConnectorPattern, ConnectorRole, RefineFn};
pub use error::{GraphError, GraphResult};
pub use events::{EventHub, NodeEvent, SignalKind};
pub use graph::{FilterGraph, TraversalMask};
pub use id::{Arena, ArenaId, NodeId, PlugId, SocketId};
pub use node::{Blob, Capability, EdgeFlags, EdgeState, FilterNode, TypeScope, UNBOUNDED};
pub use plug::{Plug, Socket};
pub use resolve::resolve_image;
pub use session::Session;
pub use ticket::{AccessType, PixelAccessTicket, SubPixelWarning};
