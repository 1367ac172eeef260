/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The unit of a [`PhysicalQuantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// No physical unit: sizes are measured in pixels.
    #[default]
    Pixel,
    Meter,
    Second,
    Radian,
}

/// A magnitude with a unit, used to describe the physical extent of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalQuantity {
    pub magnitude: f64,
    pub unit: Unit,
}

impl PhysicalQuantity {
    pub const fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    /// One pixel: the size of a dimension without a physical calibration.
    pub const fn pixel() -> Self {
        Self::new(1.0, Unit::Pixel)
    }

    pub const fn meters(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::Meter)
    }

    pub fn micrometers(magnitude: f64) -> Self {
        Self::meters(magnitude * 1e-6)
    }

    /// Return `true` if the quantity is a length with a positive magnitude.
    pub fn is_metric(&self) -> bool {
        self.unit == Unit::Meter && self.magnitude > 0.0
    }

    /// Return `true` if this quantity carries no physical calibration.
    pub fn is_pixel(&self) -> bool {
        self.unit == Unit::Pixel
    }
}

impl Default for PhysicalQuantity {
    fn default() -> Self {
        Self::pixel()
    }
}

/// Image metadata carried along with a view: a color space tag and per-dimension
/// pixel sizes.
///
/// The color space is an opaque string such as `"RGB"` or `"Lab"`. An empty string means no
/// color space. Pixel sizes are stored for the leading dimensions only: dimensions beyond
/// the stored ones repeat the last stored size, and if nothing is stored every dimension
/// measures one [`Unit::Pixel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    color_space: String,
    pixel_size: SmallVec<[PhysicalQuantity; 4]>,
}

impl ImageMeta {
    pub fn color_space(&self) -> &str {
        &self.color_space
    }

    pub fn set_color_space(&mut self, color_space: impl Into<String>) {
        self.color_space = color_space.into();
    }

    pub fn is_color(&self) -> bool {
        !self.color_space.is_empty()
    }

    /// Return the pixel size along `dim`.
    pub fn pixel_size(&self, dim: usize) -> PhysicalQuantity {
        self.pixel_size
            .get(dim)
            .or_else(|| self.pixel_size.last())
            .copied()
            .unwrap_or_default()
    }

    /// Replace all pixel sizes.
    pub fn set_pixel_sizes(&mut self, sizes: &[PhysicalQuantity]) {
        self.pixel_size = sizes.iter().copied().collect();
    }

    /// Set the pixel size along `dim`, materializing any implicit sizes before it.
    pub fn set_pixel_size(&mut self, dim: usize, size: PhysicalQuantity) {
        while self.pixel_size.len() <= dim {
            let fill = self.pixel_size(self.pixel_size.len());
            self.pixel_size.push(fill);
        }
        self.pixel_size[dim] = size;
    }

    pub fn has_pixel_size(&self) -> bool {
        self.pixel_size.iter().any(|q| !q.is_pixel())
    }

    /// Reorder pixel sizes to follow a dimension permutation of an `ndims` image.
    pub(crate) fn permute(&mut self, order: &[usize]) {
        if self.pixel_size.is_empty() {
            return;
        }
        self.pixel_size = order.iter().map(|&d| self.pixel_size(d)).collect();
    }

    /// A subsampled dimension covers `step` times the extent per pixel.
    pub(crate) fn scale(&mut self, dim: usize, step: usize) {
        if step == 1 || self.pixel_size.is_empty() {
            return;
        }
        let mut size = self.pixel_size(dim);
        size.magnitude *= step as f64;
        self.set_pixel_size(dim, size);
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let meta = ImageMeta::default();
        assert_eq!(meta.color_space(), "");
        assert!(!meta.is_color());
        assert!(!meta.has_pixel_size());
        assert_eq!(meta.pixel_size(0), PhysicalQuantity::pixel());
        assert_eq!(meta.pixel_size(7), PhysicalQuantity::pixel());
    }

    #[test]
    fn pixel_sizes_extend_with_the_last_value() {
        let mut meta = ImageMeta::default();
        meta.set_pixel_sizes(&[
            PhysicalQuantity::micrometers(0.5),
            PhysicalQuantity::micrometers(2.0),
        ]);
        assert!(meta.has_pixel_size());
        assert_eq!(meta.pixel_size(1), PhysicalQuantity::micrometers(2.0));
        assert_eq!(meta.pixel_size(5), PhysicalQuantity::micrometers(2.0));

        meta.set_pixel_size(3, PhysicalQuantity::meters(1.0));
        assert_eq!(meta.pixel_size(2), PhysicalQuantity::micrometers(2.0));
        assert_eq!(meta.pixel_size(3), PhysicalQuantity::meters(1.0));
        assert_eq!(meta.pixel_size(4), PhysicalQuantity::meters(1.0));
    }

    #[test]
    fn permute_and_scale() {
        let mut meta = ImageMeta::default();
        meta.set_pixel_sizes(&[PhysicalQuantity::meters(1.0), PhysicalQuantity::meters(3.0)]);
        meta.permute(&[1, 0, 2]);
        assert_eq!(meta.pixel_size(0), PhysicalQuantity::meters(3.0));
        assert_eq!(meta.pixel_size(1), PhysicalQuantity::meters(1.0));
        assert_eq!(meta.pixel_size(2), PhysicalQuantity::meters(3.0));

        meta.scale(1, 4);
        assert_eq!(meta.pixel_size(1), PhysicalQuantity::meters(4.0));

        // Uncalibrated images stay uncalibrated.
        let mut meta = ImageMeta::default();
        meta.scale(0, 2);
        meta.permute(&[1, 0]);
        assert!(!meta.has_pixel_size());
    }

    #[test]
    fn metric() {
        assert!(PhysicalQuantity::micrometers(1.0).is_metric());
        assert!(!PhysicalQuantity::meters(0.0).is_metric());
        assert!(!PhysicalQuantity::pixel().is_metric());
        assert!(!PhysicalQuantity::new(1.0, Unit::Radian).is_metric());
    }

    #[test]
    fn serde() {
        let mut meta = ImageMeta::default();
        meta.set_color_space("RGB");
        let json = serde_json::to_string(&meta).unwrap();
        let back: ImageMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
