//! Test data builders for capabilities and images

use chromagraph::image::{Array2d, DataType, Image, PixelLayout};
use chromagraph::options::Options;
use chromagraph::pipeline::{
    Blob, Capability, ConnectorDecl, ConnectorPattern, NodeId, PixelAccessTicket, PlugId, Session,
};
use std::sync::Arc;

/// Capability whose run does nothing.
pub struct StubCapability {
    registration: String,
    plugs: Vec<ConnectorDecl>,
    sockets: Vec<ConnectorDecl>,
    options: Options,
    context_type: Option<String>,
}

impl Capability for StubCapability {
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

/// Builder for [`StubCapability`]
pub struct CapabilityBuilder {
    inner: StubCapability,
}

impl CapabilityBuilder {
    pub fn new(registration: &str) -> Self {
        Self {
            inner: StubCapability {
                registration: registration.to_string(),
                plugs: Vec::new(),
                sockets: Vec::new(),
                options: Options::new(),
                context_type: None,
            },
        }
    }

    pub fn plug(mut self, type_path: &str) -> Self {
        self.inner
            .plugs
            .push(ConnectorDecl::fixed(ConnectorPattern::plug(type_path)));
        self
    }

    pub fn repeat_plug(mut self, type_path: &str) -> Self {
        self.inner
            .plugs
            .push(ConnectorDecl::repeat(ConnectorPattern::plug(type_path)));
        self
    }

    pub fn socket(mut self, type_path: &str) -> Self {
        self.inner
            .sockets
            .push(ConnectorDecl::fixed(ConnectorPattern::socket(type_path)));
        self
    }

    pub fn repeat_socket(mut self, type_path: &str) -> Self {
        self.inner
            .sockets
            .push(ConnectorDecl::repeat(ConnectorPattern::socket(type_path)));
        self
    }

    pub fn option(mut self, key: &str, value: i64) -> Self {
        self.inner.options.set(key, value);
        self
    }

    pub fn context(mut self, context_type: &str) -> Self {
        self.inner.context_type = Some(context_type.to_string());
        self
    }

    pub fn build(self) -> Arc<dyn Capability> {
        Arc::new(self.inner)
    }
}

/// Image whose samples count up from zero, row by row.
pub fn gradient_image(width: usize, height: usize, channels: u8) -> Arc<Image> {
    let samples_per_row = width * channels as usize;
    let samples = (0..samples_per_row * height).map(|v| v as f32).collect();
    let pixels = Array2d::from_samples(DataType::Float, samples_per_row, height, samples)
        .expect("sample count matches");
    Arc::new(
        Image::new(width, height, PixelLayout::new(channels, DataType::Float), "sRGB")
            .with_pixels(pixels)
            .expect("array fits image"),
    )
}

/// Image descriptor without samples.
pub fn blank_image(width: usize, height: usize, channels: u8) -> Arc<Image> {
    Arc::new(Image::new(
        width,
        height,
        PixelLayout::new(channels, DataType::U8),
        "sRGB",
    ))
}
