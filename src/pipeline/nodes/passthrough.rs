//! Stage that forwards its input unchanged.

use crate::pipeline::connector::{ConnectorDecl, ConnectorPattern};
use crate::pipeline::id::{NodeId, PlugId};
use crate::pipeline::node::{Blob, Capability};
use crate::pipeline::nodes::{pull_through, IMAGE_DATA_TYPE};
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;
use anyhow::anyhow;

pub const PASSTHROUGH_REGISTRATION: &str = "org/chromagraph/imaging/passthrough";

/// One plug, one socket; runs whatever feeds it.
///
/// With a context type the node stands in for a colour transform: it
/// refuses to run until its graph has prepared a context, and builds that
/// context from the profile of the image on its socket.
#[derive(Debug, Default, Clone)]
pub struct PassthroughNode {
    context_type: Option<String>,
}

impl PassthroughNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context_type: impl Into<String>) -> Self {
        Self {
            context_type: Some(context_type.into()),
        }
    }
}

impl Capability for PassthroughNode {
    fn registration(&self) -> String {
        PASSTHROUGH_REGISTRATION.to_string()
    }

    fn plugs(&self) -> Vec<ConnectorDecl> {
        vec![ConnectorDecl::fixed(
            ConnectorPattern::plug(IMAGE_DATA_TYPE).with_nick("input"),
        )]
    }

    fn sockets(&self) -> Vec<ConnectorDecl> {
        vec![ConnectorDecl::fixed(
            ConnectorPattern::socket(IMAGE_DATA_TYPE).with_nick("output"),
        )]
    }

    fn context_type(&self) -> Option<String> {
        self.context_type.clone()
    }

    fn produce_context(&self, session: &Session, node: NodeId) -> anyhow::Result<Blob> {
        let context_type = self
            .context_type
            .clone()
            .ok_or_else(|| anyhow!("{} has no context type", session.relatives(node)))?;
        let image = match session.node(node)?.socket_slots().first().copied().flatten() {
            Some(socket) => session.socket_data(socket)?,
            None => None,
        };
        let image = image.ok_or_else(|| {
            anyhow!("{} has no image to build a context from", session.relatives(node))
        })?;
        Ok(Blob::new(context_type, image.profile().as_bytes().to_vec()))
    }

    fn run(
        &self,
        session: &mut Session,
        node: NodeId,
        _plug: PlugId,
        ticket: &mut PixelAccessTicket,
    ) -> anyhow::Result<()> {
        if self.context_type.is_some() && session.context(node)?.is_none() {
            return Err(anyhow!("{} runs without a prepared context", session.relatives(node)));
        }
        pull_through(session, node, ticket)?;
        Ok(())
    }
}
