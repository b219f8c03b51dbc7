//! Capabilities for unit tests.

use crate::options::Options;
use crate::pipeline::connector::{ConnectorDecl, ConnectorPattern};
use crate::pipeline::id::{NodeId, PlugId};
use crate::pipeline::node::{Blob, Capability};
use crate::pipeline::session::Session;
use crate::pipeline::ticket::PixelAccessTicket;
use std::sync::Arc;

/// Capability with configurable declarations and a no-op run.
pub struct TestCapability {
    registration: String,
    plugs: Vec<ConnectorDecl>,
    sockets: Vec<ConnectorDecl>,
    options: Options,
    context_type: Option<String>,
}

impl TestCapability {
    pub fn new(registration: &str) -> Self {
        Self {
            registration: registration.to_string(),
            plugs: Vec::new(),
            sockets: Vec::new(),
            options: Options::new(),
            context_type: None,
        }
    }

    pub fn with_plugs(mut self, plugs: Vec<ConnectorDecl>) -> Self {
        self.plugs = plugs;
        self
    }

    pub fn with_sockets(mut self, sockets: Vec<ConnectorDecl>) -> Self {
        self.sockets = sockets;
        self
    }

    pub fn with_option(mut self, key: &str, value: i64) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn with_context_type(mut self, context_type: &str) -> Self {
        self.context_type = Some(context_type.to_string());
        self
    }
}

impl Capability for TestCapability {
    fn registration(&self) -> String {
        self.registration.clone()
    }

    fn plugs(&self) -> Vec<ConnectorDecl> {
        self.plugs.clone()
    }

    fn sockets(&self) -> Vec<ConnectorDecl> {
        self.sockets.clone()
    }

    fn options(&self) -> Options {
        self.options.clone()
    }

    fn context_type(&self) -> Option<String> {
        self.context_type.clone()
    }

    fn produce_context(&self, session: &Session, node: NodeId) -> anyhow::Result<Blob> {
        Ok(Blob::new(
            self.context_type.clone().unwrap_or_default(),
            session.relatives(node).into_bytes(),
        ))
    }

    fn run(
        &self,
        _session: &mut Session,
        _node: NodeId,
        _plug: PlugId,
        _ticket: &mut PixelAccessTicket,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn single_socket(type_path: &str) -> Arc<dyn Capability> {
    Arc::new(
        TestCapability::new("org/test/source")
            .with_sockets(vec![ConnectorDecl::fixed(ConnectorPattern::socket(type_path))]),
    )
}

pub fn plug_only(type_path: &str) -> Arc<dyn Capability> {
    Arc::new(
        TestCapability::new("org/test/sink")
            .with_plugs(vec![ConnectorDecl::fixed(ConnectorPattern::plug(type_path))]),
    )
}

pub fn socket_and_plug(type_path: &str) -> Arc<dyn Capability> {
    Arc::new(
        TestCapability::new("org/test/filter")
            .with_plugs(vec![ConnectorDecl::fixed(ConnectorPattern::plug(type_path))])
            .with_sockets(vec![ConnectorDecl::fixed(ConnectorPattern::socket(type_path))]),
    )
}
