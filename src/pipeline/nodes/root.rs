//! Source node holding the input image.

use crate::image::Image;
use crate::pipeline::connector::{ConnectorDecl, ConnectorPattern};
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::id::{NodeId, PlugId};
use crate::pipeline::node::Capability;
use crate::pipeline::nodes::IMAGE_DATA_TYPE;
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;
use std::sync::Arc;

pub const ROOT_REGISTRATION: &str = "org/chromagraph/imaging/root";

/// Source with a single image socket and no plugs.
///
/// Running it copies the ticket's region of interest, offset by the ticket
/// start, from the socket image's samples into the ticket array.
#[derive(Debug, Default)]
pub struct RootNode;

impl RootNode {
    /// Create a root node and place `image` on its socket.
    pub fn attach(session: &mut Session, image: Arc<Image>) -> GraphResult<NodeId> {
        let node = session.create_node(Arc::new(RootNode))?;
        let socket = session.socket(node, 0)?;
        session.set_socket_data(socket, Some(image))?;
        Ok(node)
    }
}

impl Capability for RootNode {
    fn registration(&self) -> String {
        ROOT_REGISTRATION.to_string()
    }

    fn plugs(&self) -> Vec<ConnectorDecl> {
        Vec::new()
    }

    fn sockets(&self) -> Vec<ConnectorDecl> {
        vec![ConnectorDecl::fixed(
            ConnectorPattern::socket(IMAGE_DATA_TYPE).with_nick("output"),
        )]
    }

    fn run(
        &self,
        session: &mut Session,
        node: NodeId,
        _plug: PlugId,
        ticket: &mut PixelAccessTicket,
    ) -> anyhow::Result<()> {
        let socket = session.socket(node, 0)?;
        let image = session
            .socket_data(socket)?
            .ok_or_else(|| GraphError::ResolveFailure {
                node: session.relatives(node),
            })?;

        if ticket.output_image().is_none() {
            ticket.set_output_image(Some(image.clone()));
        }
        if ticket.array().is_none() {
            ticket.set_array(Some(image.new_array()), false);
        }
        let Some(pixels) = image.pixels() else {
            tracing::debug!("{} has no samples, nothing to copy", session.relatives(node));
            return Ok(());
        };

        let was_focused = ticket.is_focused();
        let roi = ticket.roi_to_pixels(None)?;
        let channels = image.channels() as i64;
        let width = image.width() as f64;
        let (start_x, start_y) = ticket.start();
        let region = roi
            .checked_offset((start_x * width).round() as i64, (start_y * width).round() as i64)
            .and_then(|r| r.checked_samples(channels))
            .ok_or_else(|| GraphError::OutOfRange {
                what: format!("source region {} at start {:?}", roi, ticket.start()),
                position: image.channels(),
                declared: "i64 sample offsets".to_string(),
            })?;

        ticket.set_array_focus(false)?;
        let copied = ticket
            .array_mut()
            .map(|array| array.copy_region_from(pixels, region))
            .unwrap_or(0);
        if !was_focused {
            ticket.set_array_focus(true)?;
        }

        tracing::trace!("{} copied {} samples from {}", session.relatives(node), copied, region);
        Ok(())
    }
}
