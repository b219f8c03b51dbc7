//! Conversion driver.
//!
//! A [`Conversion`] names the two ends of a filter chain and pulls pixels
//! through it. It is the only place that recovers from a failed run: the
//! graph snapshot is rebuilt, missing data resolved, dirty contexts prepared
//! and the run repeated once.

use crate::image::Image;
use crate::pipeline::error::GraphResult;
use crate::pipeline::graph::{FilterGraph, TraversalMask};
use crate::pipeline::id::NodeId;
use crate::pipeline::resolve::resolve_image;
use crate::pipeline::session::Session;
use crate::pipeline::ticket::{AccessType, PixelAccessTicket};
use std::sync::Arc;

/// Which end of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionEnd {
    Input,
    Output,
}

/// Input and output node of a filter chain.
#[derive(Debug, Clone)]
pub struct Conversion {
    input: NodeId,
    output: NodeId,
    graph: Option<FilterGraph>,
}

impl Conversion {
    pub fn new(input: NodeId, output: NodeId) -> Self {
        Self {
            input,
            output,
            graph: None,
        }
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn node(&self, end: ConversionEnd) -> NodeId {
        match end {
            ConversionEnd::Input => self.input,
            ConversionEnd::Output => self.output,
        }
    }

    /// Snapshot of everything connected to the output node, rebuilt on
    /// each call.
    pub fn graph(&mut self, session: &Session) -> GraphResult<&FilterGraph> {
        let graph = FilterGraph::from_node(session, self.output, TraversalMask::BOTH, None)?;
        Ok(self.graph.insert(graph))
    }

    /// Image cached on the output node's socket.
    pub fn output_image(&self, session: &mut Session) -> GraphResult<Option<Arc<Image>>> {
        let socket = session.socket(self.output, 0)?;
        session.socket_data(socket)
    }

    /// Fresh ticket anchored at the output node's first plug.
    pub fn create_ticket(&self, session: &mut Session) -> GraphResult<PixelAccessTicket> {
        let plug = session.plug(self.output, 0)?;
        PixelAccessTicket::new(session, plug, AccessType::Image)
    }

    /// Pull pixels into a new ticket and hand it back.
    pub fn run(&mut self, session: &mut Session) -> GraphResult<PixelAccessTicket> {
        let mut ticket = self.create_ticket(session)?;
        self.run_pixels(session, Some(&mut ticket))?;
        Ok(ticket)
    }

    /// Pull the ticket's region through the chain.
    ///
    /// Without a ticket a default one is created and dropped afterwards. A
    /// ticket without an array gets one sized to the output image.
    pub fn run_pixels(
        &mut self,
        session: &mut Session,
        ticket: Option<&mut PixelAccessTicket>,
    ) -> GraphResult<()> {
        let mut owned;
        let ticket = match ticket {
            Some(ticket) => ticket,
            None => {
                owned = self.create_ticket(session)?;
                &mut owned
            }
        };

        if ticket.array().is_none() {
            let image = match ticket.output_image() {
                Some(image) => Some(image.clone()),
                None => self.output_image(session)?,
            };
            if let Some(image) = image {
                ticket.set_array(Some(image.new_array()), false);
            }
        }

        let plug = session.plug(self.output, 0)?;
        let err = match session.run(self.output, plug, ticket) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        tracing::debug!("conversion run failed ({}), refreshing graph", err);
        let mut graph = FilterGraph::from_node(session, self.output, TraversalMask::BOTH, None)?;
        let socket = session.socket(self.output, 0)?;
        if session.socket_data(socket)?.is_none() {
            if let Err(resolve_err) = resolve_image(session, plug, socket, ticket) {
                tracing::debug!("resolve before retry failed: {}", resolve_err);
            }
        }

        if !graph.is_dirty() {
            self.graph = Some(graph);
            return Err(err);
        }

        graph.prepare_contexts(session, false)?;
        ticket.set_graph(graph.clone());
        self.graph = Some(graph);
        tracing::info!("retrying conversion after context preparation");
        session.run(self.output, plug, ticket)
    }
}
