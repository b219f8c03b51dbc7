//! Pixel access tickets.
//!
//! A ticket describes one pull: where to start, which region of the output
//! is wanted and which array receives the samples. The region of interest is
//! stored in units of the ticket's *pixel width*, which is the bound array's
//! native width divided by the channel count, or the output image width while
//! no array is bound. Keeping the ROI in these units lets the same ticket be
//! handed to nodes whose buffers differ in byte layout.

use crate::config::EngineConfig;
use crate::geometry::{NormalizedRect, PixelRect};
use crate::image::{Array2d, Image};
use crate::options::Options;
use crate::pipeline::error::{GraphError, GraphResult};
use crate::pipeline::graph::{FilterGraph, TraversalMask};
use crate::pipeline::id::{NodeId, PlugId};
use crate::pipeline::session::Session;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shape of the default region a fresh ticket asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    Point,
    Line,
    #[default]
    Image,
}

/// A start position that does not land on a whole pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubPixelWarning {
    pub start_x: f64,
    pub start_y: f64,
    /// Distance from the nearest pixel boundary, in samples.
    pub offset: f64,
}

impl fmt::Display for SubPixelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sub-pixel access at {}|{} ({:.3} samples off)",
            self.start_x, self.start_y, self.offset
        )
    }
}

/// State of one pull request.
#[derive(Clone)]
pub struct PixelAccessTicket {
    start: (f64, f64),
    start_old: (f64, f64),
    roi: NormalizedRect,
    array: Option<Array2d>,
    array_is_focused: bool,
    output_image: Option<Arc<Image>>,
    graph: FilterGraph,
    request_queue: Options,
    workspace_id: i32,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
    access: AccessType,
    subpixel_tolerance: f64,
    max_resolve_depth: usize,
    pulling: Vec<NodeId>,
}

impl PixelAccessTicket {
    /// Ticket not tied to a session, e.g. for driving nodes by hand.
    pub fn detached(output_image: Option<Arc<Image>>) -> Self {
        let config = EngineConfig::default();
        let mut ticket = Self {
            start: (0.0, 0.0),
            start_old: (0.0, 0.0),
            roi: NormalizedRect::default(),
            array: None,
            array_is_focused: false,
            output_image: None,
            graph: FilterGraph::default(),
            request_queue: Options::new(),
            workspace_id: 0,
            user_data: None,
            access: AccessType::Image,
            subpixel_tolerance: config.subpixel_tolerance,
            max_resolve_depth: config.max_resolve_depth,
            pulling: Vec::new(),
        };
        ticket.set_output_image(output_image);
        ticket
    }

    /// Ticket for pulling through `plug`.
    ///
    /// The output image is whatever the plug's remote socket holds; the graph
    /// snapshot and the initial request queue come from the socket's node.
    pub fn new(session: &Session, plug: PlugId, access: AccessType) -> GraphResult<Self> {
        let mut ticket = Self::detached(None)
            .with_config(session.config())
            .with_access(access);

        let info = session.plug_info(plug)?;
        let (anchor, image) = match info.remote() {
            Some(socket) => {
                let socket = session.socket_info(socket)?;
                (socket.node(), socket.data().cloned())
            }
            None => (info.node(), None),
        };

        ticket.graph = FilterGraph::from_node(session, anchor, TraversalMask::BOTH, None)?;
        ticket.request_queue = session.node(anchor)?.options().resolve_requests();
        ticket.set_output_image(image);
        Ok(ticket)
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.subpixel_tolerance = config.subpixel_tolerance;
        self.max_resolve_depth = config.max_resolve_depth;
        self
    }

    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    pub fn access(&self) -> AccessType {
        self.access
    }

    // ── Plain accessors ──

    pub fn start(&self) -> (f64, f64) {
        self.start
    }

    pub fn old_start(&self) -> (f64, f64) {
        self.start_old
    }

    pub fn set_old_start(&mut self, x: f64, y: f64) {
        self.start_old = (x, y);
    }

    pub fn roi(&self) -> NormalizedRect {
        self.roi
    }

    pub fn array(&self) -> Option<&Array2d> {
        self.array.as_ref()
    }

    pub fn array_mut(&mut self) -> Option<&mut Array2d> {
        self.array.as_mut()
    }

    pub fn take_array(&mut self) -> Option<Array2d> {
        self.array_is_focused = false;
        self.array.take()
    }

    pub fn is_focused(&self) -> bool {
        self.array_is_focused
    }

    pub fn output_image(&self) -> Option<&Arc<Image>> {
        self.output_image.as_ref()
    }

    /// Replace the output image. An unset ROI is initialized to the region
    /// the ticket's access type covers.
    pub fn set_output_image(&mut self, image: Option<Arc<Image>>) {
        if let Some(image) = &image {
            if self.roi.is_empty() && image.width() > 0 {
                let w = image.width() as f64;
                self.roi = match self.access {
                    AccessType::Image => NormalizedRect::new(0.0, 0.0, 1.0, image.height() as f64 / w),
                    AccessType::Line => NormalizedRect::new(0.0, 0.0, 1.0, 1.0 / w),
                    AccessType::Point => NormalizedRect::new(0.0, 0.0, 1.0 / w, 1.0 / w),
                };
            }
        }
        self.output_image = image;
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut FilterGraph {
        &mut self.graph
    }

    pub fn set_graph(&mut self, graph: FilterGraph) {
        self.graph = graph;
    }

    pub fn request_queue(&self) -> &Options {
        &self.request_queue
    }

    pub fn request_queue_mut(&mut self) -> &mut Options {
        &mut self.request_queue
    }

    pub fn workspace_id(&self) -> i32 {
        self.workspace_id
    }

    pub fn set_workspace_id(&mut self, id: i32) {
        self.workspace_id = id;
    }

    pub fn user_data(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.user_data.as_ref()
    }

    pub fn set_user_data(&mut self, data: Option<Arc<dyn Any + Send + Sync>>) {
        self.user_data = data;
    }

    /// Channels of the output image, 1 when unknown.
    pub fn channels(&self) -> usize {
        self.output_image
            .as_ref()
            .map(|i| i.channels())
            .filter(|&c| c > 0)
            .unwrap_or(1)
    }

    /// Reference width of the ROI unit.
    pub fn pixel_width(&self) -> Option<f64> {
        match (&self.array, &self.output_image) {
            (Some(a), _) => Some(a.data_width() as f64 / self.channels() as f64),
            (None, Some(image)) => Some(image.width() as f64),
            (None, None) => None,
        }
        .filter(|w| *w > 0.0)
    }

    fn require_pixel_width(&self) -> GraphResult<f64> {
        self.pixel_width()
            .ok_or(GraphError::TicketIncomplete("an array or output image"))
    }

    /// Whole area in pixels: the bound array, else the output image.
    fn full_extent(&self) -> GraphResult<PixelRect> {
        match (&self.array, &self.output_image) {
            (Some(a), _) => Ok(PixelRect::new(
                0,
                0,
                (a.data_width() / self.channels()) as i64,
                a.data_height() as i64,
            )),
            (None, Some(image)) => Ok(PixelRect::new(
                0,
                0,
                image.width() as i64,
                image.height() as i64,
            )),
            (None, None) => Err(GraphError::TicketIncomplete("an array or output image")),
        }
    }

    // ── Geometry ──

    /// Move the start position and optionally replace the ROI.
    ///
    /// A new ROI drops the array focus so the next focus request narrows to
    /// it. Start positions are relative to the output image width; when one
    /// misses a pixel boundary by more than the configured tolerance (counted
    /// in samples) a warning is logged and returned, but the call succeeds.
    pub fn change_rectangle(
        &mut self,
        start_x: f64,
        start_y: f64,
        rect: Option<NormalizedRect>,
    ) -> GraphResult<Option<SubPixelWarning>> {
        if !start_x.is_finite() || !start_y.is_finite() || rect.is_some_and(|r| !r.is_finite()) {
            return Err(GraphError::OutOfRange {
                what: format!("start {}|{} {:?}", start_x, start_y, rect),
                position: 0,
                declared: "finite coordinates".to_string(),
            });
        }

        if let Some(rect) = rect {
            self.set_array_focus(true)?;
            self.roi = rect;
        }

        let warning = self.check_subpixel(start_x, start_y);
        if let Some(w) = &warning {
            tracing::warn!("{}", w);
        }

        self.start_old = self.start;
        self.start = (start_x, start_y);
        Ok(warning)
    }

    fn check_subpixel(&self, start_x: f64, start_y: f64) -> Option<SubPixelWarning> {
        let image = self.output_image.as_ref()?;
        let width = image.width() as f64;
        let channels = self.channels() as f64;
        [start_x, start_y]
            .iter()
            .map(|v| {
                let pixels = v * width;
                (pixels - pixels.round()).abs() * channels
            })
            .find(|offset| *offset > self.subpixel_tolerance)
            .map(|offset| SubPixelWarning {
                start_x,
                start_y,
                offset,
            })
    }

    /// Narrow the bound array to the ROI, or with `undo` restore its native
    /// extent. Repeating a call in the same state does nothing, as does
    /// calling it without a bound array.
    pub fn set_array_focus(&mut self, undo: bool) -> GraphResult<()> {
        if self.array.is_none() {
            return Ok(());
        }
        if undo {
            if self.array_is_focused {
                if let Some(array) = self.array.as_mut() {
                    array.reset_focus();
                }
                self.array_is_focused = false;
            }
            return Ok(());
        }
        if self.array_is_focused {
            return Ok(());
        }

        let pixels = self.roi_to_pixels(None)?;
        let channels = self.channels() as i64;
        let window = pixels
            .checked_samples(channels)
            .ok_or_else(|| GraphError::OutOfRange {
                what: format!("array focus {} at {} channels", pixels, channels),
                position: self.channels(),
                declared: "i64 sample offsets".to_string(),
            })?;
        if let Some(array) = self.array.as_mut() {
            array.set_focus(window)?;
        }
        self.array_is_focused = true;
        Ok(())
    }

    /// ROI (or the ticket's own) in whole pixels. An empty ROI stands for the
    /// full extent.
    pub fn roi_to_pixels(&self, roi: Option<&NormalizedRect>) -> GraphResult<PixelRect> {
        let roi = roi.copied().unwrap_or(self.roi);
        if roi.is_empty() {
            return self.full_extent();
        }
        let width = self.require_pixel_width()?;
        Ok(PixelRect::from_rounded(roi.scaled(width)))
    }

    /// Pixel rectangle (or the ticket's own area) in ROI units.
    pub fn pixels_to_roi(&self, pixels: Option<&PixelRect>) -> GraphResult<NormalizedRect> {
        let width = self.require_pixel_width()?;
        match pixels {
            Some(p) => Ok(NormalizedRect::from(*p).scaled(1.0 / width)),
            None if !self.roi.is_empty() => Ok(self.roi),
            None => Ok(NormalizedRect::from(self.full_extent()?).scaled(1.0 / width)),
        }
    }

    /// Take over start and ROI from `src`, which may use a different output
    /// image width or array layout.
    pub fn synchronise_roi(&mut self, src: &PixelAccessTicket) -> GraphResult<()> {
        let src_width = src
            .output_image
            .as_ref()
            .map(|i| i.width() as f64)
            .filter(|w| *w > 0.0)
            .ok_or(GraphError::TicketIncomplete("a source output image"))?;
        let dst_width = self
            .output_image
            .as_ref()
            .map(|i| i.width() as f64)
            .filter(|w| *w > 0.0)
            .ok_or(GraphError::TicketIncomplete("an output image"))?;

        let start_pixels = (src.start.0 * src_width, src.start.1 * src_width);
        let pixels = src.roi.scaled(src.require_pixel_width()?).rounded();
        let dst_pixel_width = self.require_pixel_width()?;

        self.set_array_focus(true)?;
        self.roi = pixels.scaled(1.0 / dst_pixel_width);
        self.change_rectangle(start_pixels.0 / dst_width, start_pixels.1 / dst_width, None)?;
        Ok(())
    }

    /// Bind `array`, keeping the ROI on the same physical pixels when the
    /// new array's pixel width differs from the old reference width.
    pub fn set_array(&mut self, array: Option<Array2d>, has_roi_focus: bool) {
        let channels = self.channels() as f64;
        let old_width = self.pixel_width();
        let new_width = match &array {
            Some(a) => Some(a.data_width() as f64 / channels),
            None => self.output_image.as_ref().map(|i| i.width() as f64),
        }
        .filter(|w| *w > 0.0);

        if let (Some(old), Some(new)) = (old_width, new_width) {
            if old != new && !self.roi.is_empty() {
                self.roi = self.roi.scaled(old).rounded().scaled(1.0 / new);
            }
        }

        self.array = array;
        self.array_is_focused = has_roi_focus;
    }

    // ── Pull bookkeeping ──

    pub(crate) fn is_pulling(&self, node: NodeId) -> bool {
        self.pulling.contains(&node)
    }

    /// Number of node runs currently nested on this ticket.
    pub fn pull_depth(&self) -> usize {
        self.pulling.len()
    }

    pub(crate) fn max_resolve_depth(&self) -> usize {
        self.max_resolve_depth
    }

    pub(crate) fn enter(&mut self, node: NodeId) {
        self.pulling.push(node);
    }

    pub(crate) fn leave(&mut self, node: NodeId) {
        if let Some(pos) = self.pulling.iter().rposition(|n| *n == node) {
            self.pulling.remove(pos);
        }
    }

    /// Multi-line description for logs.
    pub fn show(&self) -> String {
        let mut text = format!(
            "start {}|{} (old {}|{}) roi {} focused {} workspace {}",
            self.start.0,
            self.start.1,
            self.start_old.0,
            self.start_old.1,
            self.roi,
            self.array_is_focused,
            self.workspace_id
        );
        if let Ok(pixels) = self.roi_to_pixels(None) {
            text.push_str(&format!(" = {} px", pixels));
        }
        if let Some(image) = &self.output_image {
            text.push_str(&format!("\n  image {}", image.show()));
        }
        if let Some(array) = &self.array {
            text.push_str(&format!("\n  array {}", array.show(self.channels())));
        }
        if !self.request_queue.is_empty() {
            text.push_str(&format!("\n  requests {}", self.request_queue.len()));
        }
        text
    }
}

impl fmt::Debug for PixelAccessTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelAccessTicket")
            .field("start", &self.start)
            .field("roi", &self.roi)
            .field("array_is_focused", &self.array_is_focused)
            .field("output_image", &self.output_image.as_ref().map(|i| i.show()))
            .field("workspace_id", &self.workspace_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{DataType, PixelLayout};
    use proptest::prelude::*;

    fn rgb_image(width: usize, height: usize) -> Arc<Image> {
        Arc::new(Image::new(width, height, PixelLayout::new(3, DataType::Float), "sRGB"))
    }

    fn ticket_with_array(width: usize, height: usize) -> PixelAccessTicket {
        let image = rgb_image(width, height);
        let mut ticket = PixelAccessTicket::detached(Some(image.clone()));
        ticket.set_array(Some(image.new_array()), false);
        ticket
    }

    #[test]
    fn test_default_roi_covers_image() {
        let ticket = PixelAccessTicket::detached(Some(rgb_image(200, 100)));
        assert_eq!(ticket.roi(), NormalizedRect::new(0.0, 0.0, 1.0, 0.5));
        assert_eq!(
            ticket.roi_to_pixels(None).unwrap(),
            PixelRect::new(0, 0, 200, 100)
        );
    }

    #[test]
    fn test_access_type_roi() {
        let mut line = PixelAccessTicket::detached(None).with_access(AccessType::Line);
        line.set_output_image(Some(rgb_image(10, 10)));
        assert_eq!(line.roi_to_pixels(None).unwrap(), PixelRect::new(0, 0, 10, 1));
    }

    #[test]
    fn test_full_normalized_roi_on_rgb_array() {
        let mut ticket = ticket_with_array(100, 100);
        ticket
            .change_rectangle(0.0, 0.0, Some(NormalizedRect::new(0.0, 0.0, 1.0, 1.0)))
            .unwrap();
        assert_eq!(
            ticket.roi_to_pixels(None).unwrap(),
            PixelRect::new(0, 0, 100, 100)
        );
    }

    #[test]
    fn test_subpixel_start_warns_but_succeeds() {
        let mut ticket = ticket_with_array(100, 100);
        let whole = ticket.change_rectangle(0.5, 0.25, None).unwrap();
        assert!(whole.is_none());

        let warning = ticket.change_rectangle(0.005, 0.0, None).unwrap();
        let warning = warning.expect("half a pixel off should warn");
        assert!((warning.offset - 1.5).abs() < 1e-9);
        assert_eq!(ticket.start(), (0.005, 0.0));
        assert_eq!(ticket.old_start(), (0.5, 0.25));
    }

    #[test]
    fn test_non_finite_start_rejected() {
        let mut ticket = ticket_with_array(10, 10);
        assert!(ticket.change_rectangle(f64::NAN, 0.0, None).is_err());
    }

    #[test]
    fn test_focus_narrows_and_restores() {
        let mut ticket = ticket_with_array(10, 4);
        ticket
            .change_rectangle(0.0, 0.0, Some(NormalizedRect::new(0.2, 0.1, 0.5, 0.2)))
            .unwrap();

        ticket.set_array_focus(false).unwrap();
        let window = ticket.array().unwrap().focus();
        assert_eq!(window, PixelRect::new(6, 1, 15, 2));

        ticket.set_array_focus(false).unwrap();
        assert_eq!(ticket.array().unwrap().focus(), window);

        ticket.set_array_focus(true).unwrap();
        let array = ticket.array().unwrap();
        assert_eq!(array.focus(), array.native_extent());
        assert!(!ticket.is_focused());
    }

    #[test]
    fn test_oversized_focus_is_an_error() {
        let mut ticket = ticket_with_array(10, 4);
        ticket
            .change_rectangle(0.0, 0.0, Some(NormalizedRect::new(0.0, 0.0, 1e18, 1e18)))
            .unwrap();
        let err = ticket.set_array_focus(false).unwrap_err();
        assert!(matches!(err, GraphError::OutOfRange { .. }));
        assert!(!ticket.is_focused());
    }

    #[test]
    fn test_new_rectangle_drops_focus() {
        let mut ticket = ticket_with_array(10, 4);
        ticket.set_array_focus(false).unwrap();
        assert!(ticket.is_focused());
        ticket
            .change_rectangle(0.0, 0.0, Some(NormalizedRect::new(0.0, 0.0, 0.5, 0.1)))
            .unwrap();
        assert!(!ticket.is_focused());
        ticket.set_array_focus(false).unwrap();
        assert_eq!(ticket.array().unwrap().focus(), PixelRect::new(0, 0, 15, 1));
    }

    #[test]
    fn test_set_array_keeps_physical_region() {
        let image = rgb_image(100, 50);
        let mut ticket = PixelAccessTicket::detached(Some(image));
        ticket
            .change_rectangle(0.0, 0.0, Some(NormalizedRect::new(0.1, 0.1, 0.5, 0.2)))
            .unwrap();
        let before = ticket.roi_to_pixels(None).unwrap();

        // Array covering only the left half of the image.
        ticket.set_array(Some(Array2d::new(DataType::Float, 150, 50)), false);
        assert_eq!(ticket.pixel_width(), Some(50.0));
        assert_eq!(ticket.roi_to_pixels(None).unwrap(), before);
        assert!((ticket.roi().width - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_synchronise_roi_across_widths() {
        let mut src = ticket_with_array(100, 100);
        src.change_rectangle(0.5, 0.0, Some(NormalizedRect::new(0.1, 0.2, 0.3, 0.4)))
            .unwrap();

        let mut dst = PixelAccessTicket::detached(Some(rgb_image(200, 100)));
        dst.set_array(Some(Array2d::new(DataType::Float, 300, 100)), false);
        dst.synchronise_roi(&src).unwrap();

        assert_eq!(dst.start(), (0.25, 0.0));
        assert_eq!(
            dst.roi_to_pixels(None).unwrap(),
            src.roi_to_pixels(None).unwrap()
        );
    }

    #[test]
    fn test_incomplete_ticket() {
        let ticket = PixelAccessTicket::detached(None);
        assert!(matches!(
            ticket.roi_to_pixels(None),
            Err(GraphError::TicketIncomplete(_))
        ));
    }

    #[test]
    fn test_user_data_and_workspace() {
        let mut ticket = PixelAccessTicket::detached(None);
        ticket.set_workspace_id(7);
        ticket.set_user_data(Some(Arc::new(42u32)));
        assert_eq!(ticket.workspace_id(), 7);
        let data = ticket.user_data().unwrap().downcast_ref::<u32>();
        assert_eq!(data, Some(&42));
    }

    proptest! {
        #[test]
        fn test_roi_round_trip(
            x in 0i64..500,
            y in 0i64..500,
            w in 1i64..500,
            h in 1i64..500,
            width in 1usize..640,
            channels in 1u8..5,
        ) {
            let image = Arc::new(Image::new(width, 480, PixelLayout::new(channels, DataType::U16), "gray"));
            let mut ticket = PixelAccessTicket::detached(Some(image.clone()));
            ticket.set_array(Some(image.new_array()), false);

            let rect = PixelRect::new(x, y, w, h);
            let roi = ticket.pixels_to_roi(Some(&rect)).unwrap();
            prop_assert_eq!(ticket.roi_to_pixels(Some(&roi)).unwrap(), rect);
        }

        #[test]
        fn test_focus_is_idempotent(
            x in 0.0f64..0.5,
            w in 0.05f64..0.5,
        ) {
            let mut ticket = ticket_with_array(64, 64);
            ticket.change_rectangle(0.0, 0.0, Some(NormalizedRect::new(x, x, w, w))).unwrap();
            ticket.set_array_focus(false).unwrap();
            let once = ticket.array().unwrap().focus();
            ticket.set_array_focus(false).unwrap();
            prop_assert_eq!(ticket.array().unwrap().focus(), once);
            ticket.set_array_focus(true).unwrap();
            let array = ticket.array().unwrap();
            prop_assert_eq!(array.focus(), array.native_extent());
        }
    }
}
