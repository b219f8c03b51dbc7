//! Rectangles in the two coordinate systems the engine juggles.
//!
//! [`NormalizedRect`] is relative to a pixel width (ROI units), while
//! [`PixelRect`] counts whole pixels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rectangle in units of some reference pixel width.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of covered points; zero marks an unset rectangle.
    pub fn count_points(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.count_points() == 0.0
    }

    /// Multiply every component by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.x *= factor;
        self.y *= factor;
        self.width *= factor;
        self.height *= factor;
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        self.scale(factor);
        self
    }

    /// Round every component to the nearest integer.
    pub fn round(&mut self) {
        self.x = self.x.round();
        self.y = self.y.round();
        self.width = self.width.round();
        self.height = self.height.round();
    }

    pub fn rounded(mut self) -> Self {
        self.round();
        self
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

impl From<PixelRect> for NormalizedRect {
    fn from(r: PixelRect) -> Self {
        NormalizedRect::new(r.x as f64, r.y as f64, r.width as f64, r.height as f64)
    }
}

impl fmt::Display for NormalizedRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Rectangle counted in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Round a fractional rectangle into pixels.
    pub fn from_rounded(r: NormalizedRect) -> Self {
        let r = r.rounded();
        PixelRect::new(r.x as i64, r.y as i64, r.width as i64, r.height as i64)
    }

    pub fn count_points(&self) -> i64 {
        self.width.saturating_mul(self.height)
    }

    /// Horizontal extent multiplied by `channels`, turning pixels into
    /// samples. `None` when that leaves the `i64` range.
    pub fn checked_samples(&self, channels: i64) -> Option<Self> {
        Some(PixelRect::new(
            self.x.checked_mul(channels)?,
            self.y,
            self.width.checked_mul(channels)?,
            self.height,
        ))
    }

    pub fn checked_offset(&self, dx: i64, dy: i64) -> Option<Self> {
        Some(PixelRect::new(
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.width,
            self.height,
        ))
    }

    /// Clip to `0..max_width` x `0..max_height`.
    pub fn clipped(&self, max_width: i64, max_height: i64) -> Self {
        let x0 = self.x.clamp(0, max_width);
        let y0 = self.y.clamp(0, max_height);
        let x1 = self.x.saturating_add(self.width).clamp(0, max_width);
        let y1 = self.y.saturating_add(self.height).clamp(0, max_height);
        PixelRect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

impl fmt::Display for PixelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_then_round() {
        let r = NormalizedRect::new(0.1, 0.2, 0.5, 0.333).scaled(100.0).rounded();
        assert_eq!(r, NormalizedRect::new(10.0, 20.0, 50.0, 33.0));
    }

    #[test]
    fn test_count_points_marks_empty() {
        assert!(NormalizedRect::default().is_empty());
        assert!(!NormalizedRect::new(0.0, 0.0, 1.0, 0.5).is_empty());
    }

    #[test]
    fn test_pixel_rect_clip() {
        let r = PixelRect::new(-5, 2, 20, 100).clipped(10, 50);
        assert_eq!(r, PixelRect::new(0, 2, 10, 48));
    }

    #[test]
    fn test_checked_sample_math() {
        let r = PixelRect::new(2, 1, 4, 3);
        assert_eq!(r.checked_samples(3), Some(PixelRect::new(6, 1, 12, 3)));
        assert_eq!(r.checked_offset(1, 2), Some(PixelRect::new(3, 3, 4, 3)));
        assert!(PixelRect::new(i64::MAX / 2, 0, 1, 1).checked_samples(3).is_none());
        assert!(r.checked_offset(i64::MAX, 0).is_none());

        let wide = PixelRect::new(i64::MAX - 1, 0, i64::MAX, 1).clipped(10, 10);
        assert_eq!(wide.width, 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(PixelRect::new(1, 2, 3, 4).to_string(), "3x4+1+2");
    }
}
