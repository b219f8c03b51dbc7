//! Image descriptors and sample arrays flowing through sockets.

use crate::geometry::PixelRect;
use crate::pipeline::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type a node expects for its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    #[default]
    U8 = 0,
    U16 = 1,
    Half = 2,
    Float = 3,
    Double = 4,
}

impl DataType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DataType::U8),
            1 => Some(DataType::U16),
            2 => Some(DataType::Half),
            3 => Some(DataType::Float),
            4 => Some(DataType::Double),
            _ => None,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 | DataType::Half => 2,
            DataType::Float => 4,
            DataType::Double => 8,
        }
    }
}

/// Packed channel count and data type.
///
/// Bits 0..8 hold the channel count, bits 24..32 the [`DataType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelLayout(pub u32);

impl PixelLayout {
    const CHANNEL_MASK: u32 = 0xff;
    const TYPE_SHIFT: u32 = 24;

    pub fn new(channels: u8, data_type: DataType) -> Self {
        Self(channels as u32 | ((data_type as u32) << Self::TYPE_SHIFT))
    }

    pub fn channels(self) -> usize {
        (self.0 & Self::CHANNEL_MASK) as usize
    }

    pub fn data_type(self) -> DataType {
        DataType::from_u8((self.0 >> Self::TYPE_SHIFT) as u8).unwrap_or_default()
    }

    pub fn with_channels(self, channels: u8) -> Self {
        Self::new(channels, self.data_type())
    }
}

impl Default for PixelLayout {
    fn default() -> Self {
        PixelLayout::new(3, DataType::U8)
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}c {:?}", self.channels(), self.data_type())
    }
}

/// Two dimensional sample buffer with a movable focus window.
///
/// Widths are in samples, so one pixel of an RGB image spans three columns.
/// All accessors except the `data_*` ones address the focus window.
#[derive(Debug, Clone, PartialEq)]
pub struct Array2d {
    data_type: DataType,
    data_width: usize,
    data_height: usize,
    samples: Vec<f32>,
    focus: PixelRect,
}

impl Array2d {
    pub fn new(data_type: DataType, width: usize, height: usize) -> Self {
        Self {
            data_type,
            data_width: width,
            data_height: height,
            samples: vec![0.0; width * height],
            focus: PixelRect::new(0, 0, width as i64, height as i64),
        }
    }

    pub fn from_samples(
        data_type: DataType,
        width: usize,
        height: usize,
        samples: Vec<f32>,
    ) -> GraphResult<Self> {
        if samples.len() != width * height {
            return Err(GraphError::OutOfRange {
                what: "array samples".to_string(),
                position: samples.len(),
                declared: format!("{}x{}", width, height),
            });
        }
        Ok(Self {
            data_type,
            data_width: width,
            data_height: height,
            samples,
            focus: PixelRect::new(0, 0, width as i64, height as i64),
        })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Native width in samples, independent of the focus window.
    pub fn data_width(&self) -> usize {
        self.data_width
    }

    pub fn data_height(&self) -> usize {
        self.data_height
    }

    pub fn width(&self) -> usize {
        self.focus.width as usize
    }

    pub fn height(&self) -> usize {
        self.focus.height as usize
    }

    pub fn focus(&self) -> PixelRect {
        self.focus
    }

    pub fn is_focused(&self) -> bool {
        self.focus != self.native_extent()
    }

    pub fn native_extent(&self) -> PixelRect {
        PixelRect::new(0, 0, self.data_width as i64, self.data_height as i64)
    }

    /// Narrow addressing to `window`, given in samples.
    pub fn set_focus(&mut self, window: PixelRect) -> GraphResult<()> {
        let clipped = window.clipped(self.data_width as i64, self.data_height as i64);
        if clipped != window {
            return Err(GraphError::OutOfRange {
                what: format!("array focus {}", window),
                position: window.x.saturating_add(window.width).max(0) as usize,
                declared: format!("{}x{}", self.data_width, self.data_height),
            });
        }
        self.focus = window;
        Ok(())
    }

    pub fn reset_focus(&mut self) {
        self.focus = self.native_extent();
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let col = self.focus.x as usize + x;
        let row = self.focus.y as usize + y;
        Some(row * self.data_width + col)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        self.offset(x, y).map(|i| self.samples[i])
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) -> bool {
        match self.offset(x, y) {
            Some(i) => {
                self.samples[i] = value;
                true
            }
            None => false,
        }
    }

    /// Row `y` of the focus window.
    pub fn row(&self, y: usize) -> Option<&[f32]> {
        let start = self.offset(0, y)?;
        Some(&self.samples[start..start + self.width()])
    }

    pub fn row_mut(&mut self, y: usize) -> Option<&mut [f32]> {
        let start = self.offset(0, y)?;
        let width = self.width();
        Some(&mut self.samples[start..start + width])
    }

    /// Copy `region` (in samples of `src`'s native extent) into this
    /// array's focus window, starting at its top-left corner.
    pub fn copy_region_from(&mut self, src: &Array2d, region: PixelRect) -> usize {
        let region = region.clipped(src.data_width as i64, src.data_height as i64);
        let rows = (region.height as usize).min(self.height());
        let cols = (region.width as usize).min(self.width());
        for y in 0..rows {
            let src_start = (region.y as usize + y) * src.data_width + region.x as usize;
            let src_row = &src.samples[src_start..src_start + cols];
            if let Some(dst_row) = self.row_mut(y) {
                dst_row[..cols].copy_from_slice(src_row);
            }
        }
        rows * cols
    }

    /// Text summary used in debug output.
    pub fn show(&self, channels: usize) -> String {
        let channels = channels.max(1);
        format!(
            "{}x{} ({} samples) focus {} {:?}",
            self.data_width / channels,
            self.data_height,
            self.data_width,
            self.focus,
            self.data_type
        )
    }
}

/// Image descriptor passed between sockets.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    layout: PixelLayout,
    profile: String,
    pixels: Option<Array2d>,
}

impl Image {
    pub fn new(width: usize, height: usize, layout: PixelLayout, profile: impl Into<String>) -> Self {
        Self {
            width,
            height,
            layout,
            profile: profile.into(),
            pixels: None,
        }
    }

    /// Attach backing samples; the array must hold `width * channels` columns.
    pub fn with_pixels(mut self, pixels: Array2d) -> GraphResult<Self> {
        let expected = self.width * self.layout.channels();
        if pixels.data_width() != expected || pixels.data_height() != self.height {
            return Err(GraphError::Mismatch(format!(
                "array {}x{} does not fit image {}x{} with {} channels",
                pixels.data_width(),
                pixels.data_height(),
                self.width,
                self.height,
                self.layout.channels()
            )));
        }
        self.pixels = Some(pixels);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn pixels(&self) -> Option<&Array2d> {
        self.pixels.as_ref()
    }

    /// Same geometry and profile under a different layout, without samples.
    pub fn with_layout(&self, layout: PixelLayout) -> Self {
        Image::new(self.width, self.height, layout, self.profile.clone())
    }

    /// Zeroed array covering the whole image.
    pub fn new_array(&self) -> Array2d {
        Array2d::new(
            self.layout.data_type(),
            self.width * self.channels(),
            self.height,
        )
    }

    pub fn show(&self) -> String {
        format!(
            "{}x{} {} \"{}\"{}",
            self.width,
            self.height,
            self.layout,
            self.profile,
            if self.pixels.is_some() { " +pixels" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_layout_bits() {
        let layout = PixelLayout::new(4, DataType::U16);
        assert_eq!(layout.channels(), 4);
        assert_eq!(layout.data_type(), DataType::U16);
        assert_eq!(layout.with_channels(3).channels(), 3);
        assert_eq!(layout.with_channels(3).data_type(), DataType::U16);
    }

    #[test]
    fn test_focus_window_addressing() {
        let samples: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let mut a = Array2d::from_samples(DataType::Float, 6, 2, samples).unwrap();
        a.set_focus(PixelRect::new(3, 1, 3, 1)).unwrap();
        assert_eq!(a.width(), 3);
        assert_eq!(a.row(0), Some(&[9.0, 10.0, 11.0][..]));
        assert_eq!(a.get(0, 1), None);
        a.reset_focus();
        assert!(!a.is_focused());
        assert_eq!(a.get(0, 1), Some(6.0));
    }

    #[test]
    fn test_focus_out_of_bounds_rejected() {
        let mut a = Array2d::new(DataType::U8, 6, 2);
        assert!(a.set_focus(PixelRect::new(4, 0, 3, 1)).is_err());
        assert_eq!(a.focus(), a.native_extent());
    }

    #[test]
    fn test_copy_region() {
        let samples: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let src = Array2d::from_samples(DataType::Float, 6, 2, samples).unwrap();
        let mut dst = Array2d::new(DataType::Float, 3, 1);
        let copied = dst.copy_region_from(&src, PixelRect::new(3, 1, 3, 1));
        assert_eq!(copied, 3);
        assert_eq!(dst.row(0), Some(&[9.0, 10.0, 11.0][..]));
    }

    #[test]
    fn test_image_pixels_must_fit() {
        let img = Image::new(2, 2, PixelLayout::new(3, DataType::Float), "sRGB");
        assert!(img.clone().with_pixels(Array2d::new(DataType::Float, 6, 2)).is_ok());
        assert!(img.with_pixels(Array2d::new(DataType::Float, 2, 2)).is_err());
    }
}
