//! Terminal node a conversion pulls from.

use crate::pipeline::connector::{ConnectorDecl, ConnectorPattern};
use crate::pipeline::id::{NodeId, PlugId};
use crate::pipeline::node::Capability;
use crate::pipeline::nodes::{pull_through, IMAGE_DATA_TYPE};
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;

pub const OUTPUT_REGISTRATION: &str = "org/chromagraph/imaging/output";

#[derive(Debug, Default, Clone, Copy)]
pub struct OutputNode;

impl Capability for OutputNode {
    fn registration(&self) -> String {
        OUTPUT_REGISTRATION.to_string()
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

    fn run(
        &self,
        session: &mut Session,
        node: NodeId,
        _plug: PlugId,
        ticket: &mut PixelAccessTicket,
    ) -> anyhow::Result<()> {
        pull_through(session, node, ticket)?;
        Ok(())
    }
}
