//! Built-in imaging nodes.
//!
//! A minimal chain is `root -> [passthrough ...] -> output`: the root node
//! holds the source image, pass-through stages forward it and the output
//! node is what a [`Conversion`](crate::conversion::Conversion) pulls from.

pub mod output;
pub mod passthrough;
pub mod root;

pub use output::OutputNode;
pub use passthrough::PassthroughNode;
pub use root::RootNode;

use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::id::NodeId;
use crate::pipeline::resolve::resolve_image;
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;

/// Type path shared by all image connectors of the built-in nodes.
pub const IMAGE_DATA_TYPE: &str = "//imaging/data";

/// Resolve the image feeding `node` and run the node upstream of it.
pub(crate) fn pull_through(
    session: &mut Session,
    node: NodeId,
    ticket: &mut PixelAccessTicket,
) -> GraphResult<()> {
    let plug = session.plug(node, 0)?;
    let socket = session.socket(node, 0)?;
    resolve_image(session, plug, socket, ticket)?;

    let upstream = session
        .plug_remote_node(plug)?
        .ok_or_else(|| GraphError::ResolveFailure {
            node: session.relatives(node),
        })?;
    // Runs upstream even when resolve_image just pulled it to fill an empty
    // socket; that pull only produced data, this one fills the ticket's ROI.
    session.run(upstream, plug, ticket)
}
