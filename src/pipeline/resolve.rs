//! Upstream pull used by capabilities before they process a ticket.

use crate::image::{Image, PixelLayout};
use crate::options::Options;
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::events::SignalKind;
use crate::pipeline::id::{NodeId, PlugId, SocketId};
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;
use std::sync::Arc;

/// Request key overriding the layout of images taken from a source node.
pub const PIXEL_LAYOUT_KEY: &str = "pixel_layout";

/// Obtain the image feeding `plug`, pulling further upstream when the remote
/// socket is still empty.
///
/// `plug` and `socket` belong to the calling node. While the upstream node
/// runs, the ticket's request queue carries the caller's `resolve` options
/// on top of the queue it arrived with; the original queue is restored
/// afterwards. An empty `socket` receives the upstream image, or for source
/// nodes a copy in the requested pixel layout. The returned image is always
/// the upstream one.
pub fn resolve_image(
    session: &mut Session,
    plug: PlugId,
    socket: SocketId,
    ticket: &mut PixelAccessTicket,
) -> GraphResult<Arc<Image>> {
    let node = session.socket_info(socket)?.node();
    let Some(remote) = session.plug_info(plug)?.remote() else {
        return Err(incomplete(session, node));
    };
    let upstream = session.socket_info(remote)?.node();

    let input = match session.socket_data(remote)? {
        Some(image) => image,
        None => {
            let requests = session.node(node)?.options().resolve_requests();
            let original = ticket.request_queue().clone();
            let mut queue = requests;
            queue.union(&original);
            *ticket.request_queue_mut() = queue.resolve_requests();

            let own_plug = session.plug(node, 0)?;
            let result = session.run(upstream, own_plug, ticket);
            *ticket.request_queue_mut() = original;
            result?;

            match session.socket_data(remote)? {
                Some(image) => image,
                None => return Err(incomplete(session, node)),
            }
        }
    };

    if session.socket_data(socket)?.is_none() {
        let is_source = session.node(upstream)?.plug_decls().is_empty();
        let mut derived = input.clone();
        if is_source {
            let mut requests = session.node(node)?.options().resolve_requests();
            requests.union(ticket.request_queue());
            if let Some(layout) = requested_layout(&requests) {
                let channels = layout.channels().max(input.channels());
                let layout = PixelLayout::new(channels.min(u8::MAX as usize) as u8, layout.data_type());
                tracing::debug!("{} takes source image as {}", session.relatives(node), layout);
                derived = Arc::new(input.with_layout(layout));
            }
        }
        session.set_socket_data(socket, Some(derived))?;
    }

    if ticket.output_image().is_none() {
        ticket.set_output_image(session.socket_data(socket)?);
    }
    Ok(input)
}

fn requested_layout(requests: &Options) -> Option<PixelLayout> {
    let value = requests.find_key(PIXEL_LAYOUT_KEY)?.as_int()?;
    u32::try_from(value).ok().map(PixelLayout)
}

fn incomplete(session: &mut Session, node: NodeId) -> GraphError {
    tracing::warn!("no data upstream of {}", session.relatives(node));
    session.emit(node, SignalKind::IncompleteGraph, None);
    GraphError::ResolveFailure {
        node: session.relatives(node),
    }
}
