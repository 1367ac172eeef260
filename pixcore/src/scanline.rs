/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Strip-oriented emission of 2-D images for file format encoders.
//!
//! An encoder first builds an [`EncodingPlan`] describing the tags it needs to write
//! (geometry, sample layout, photometric interpretation and resolution), then receives the
//! image data as a sequence of strips of whole rows through a [`StripSink`].

use std::{convert::Infallible, num::NonZeroUsize, ops::Range};

use pixcore_types::{ClassSet, SampleType};
use serde::{Deserialize, Serialize};

use crate::{
    copy::{self, BufferFormat, CopyOptions},
    error::{Error, Result},
    view::StridedView,
};

/// The preferred number of bytes per strip when the row count is not configured.
pub const DEFAULT_STRIP_BYTES: usize = 8192;

/// What to do when the image carries information the encoder cannot represent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningPolicy {
    Ignore,
    /// Emit a `tracing` warning and continue.
    #[default]
    Log,
    /// Fail with [`Error::CodecWarning`].
    Error,
}

impl WarningPolicy {
    fn raise(self, message: String) -> Result<()> {
        match self {
            Self::Ignore => Ok(()),
            Self::Log => {
                tracing::warn!("{message}");
                Ok(())
            }
            Self::Error => Err(Error::CodecWarning(message)),
        }
    }
}

/// Per-call configuration of the encoding path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Rows per strip. When absent, strips hold about [`DEFAULT_STRIP_BYTES`] bytes and at
    /// least one row.
    pub rows_per_strip: Option<NonZeroUsize>,
    pub warnings: WarningPolicy,
    pub copy: CopyOptions,
}

/// How sample bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    Unsigned,
    Signed,
    Float,
}

/// The color interpretation of the samples of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Photometric {
    MinIsBlack,
    Rgb,
    CieLab,
    Separated,
}

impl Photometric {
    fn from_color_space(sample_type: SampleType, color_space: &str) -> Self {
        if sample_type.is_binary() {
            return Self::MinIsBlack;
        }
        match color_space {
            "RGB" => Self::Rgb,
            "Lab" => Self::CieLab,
            "CMY" | "CMYK" => Self::Separated,
            _ => Self::MinIsBlack,
        }
    }
}

/// The layout of a 2-D image as an encoder writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingPlan {
    width: usize,
    height: usize,
    samples_per_pixel: usize,
    sample_type: SampleType,
    bits_per_sample: usize,
    sample_format: SampleFormat,
    photometric: Photometric,
    row_bytes: usize,
    rows_per_strip: usize,
    resolution: [Option<f64>; 2],
}

impl EncodingPlan {
    /// Describe how `view` will be encoded.
    ///
    /// `view` must be a forged 2-D image of a non-complex sample type. Binary images must
    /// have a single channel. A pixel size that is neither metric nor uncalibrated cannot be
    /// stored and is reported according to `config.warnings`.
    pub fn new(view: &StridedView, config: &CodecConfig) -> Result<Self> {
        view.allocation()?;
        if view.ndims() != 2 {
            return Err(Error::Dimensionality {
                expected: 2,
                found: view.ndims(),
            });
        }

        let sample_type = view.sample_type();
        if !ClassSet::NON_COMPLEX.contains(sample_type) {
            return Err(Error::unsupported(sample_type, ClassSet::NON_COMPLEX));
        }
        let samples_per_pixel = view.tensor_elements();
        if sample_type.is_binary() && samples_per_pixel != 1 {
            return Err(Error::NotPackable {
                sample_type,
                elements: samples_per_pixel,
            });
        }

        let (width, height) = (view.size(0), view.size(1));
        let row_bytes = format_of(sample_type)
            .row_bytes(width, samples_per_pixel)
            .ok_or_else(|| Error::SizeOverflow {
                sizes: view.sizes().to_vec(),
                elements: samples_per_pixel,
                sample_type,
            })?;

        let rows_per_strip = match config.rows_per_strip {
            Some(rows) => rows.get(),
            None => DEFAULT_STRIP_BYTES.checked_div(row_bytes).unwrap_or(height).max(1),
        }
        .min(height.max(1));

        let mut resolution = [None; 2];
        for (dim, slot) in resolution.iter_mut().enumerate() {
            let size = view.pixel_size(dim);
            if size.is_metric() {
                // Pixels per centimetre.
                *slot = Some(0.01 / size.magnitude);
            } else if !size.is_pixel() {
                config.warnings.raise(format!(
                    "pixel size {} {:?} along dimension {dim} cannot be stored",
                    size.magnitude, size.unit,
                ))?;
            }
        }

        let sample_format = if sample_type.is_float() {
            SampleFormat::Float
        } else if sample_type.is_signed() {
            SampleFormat::Signed
        } else {
            SampleFormat::Unsigned
        };

        Ok(Self {
            width,
            height,
            samples_per_pixel,
            sample_type,
            bits_per_sample: if sample_type.is_binary() {
                1
            } else {
                8 * sample_type.size_of()
            },
            sample_format,
            photometric: Photometric::from_color_space(sample_type, view.color_space()),
            row_bytes,
            rows_per_strip,
            resolution,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn bits_per_sample(&self) -> usize {
        self.bits_per_sample
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    pub fn photometric(&self) -> Photometric {
        self.photometric
    }

    /// The number of bytes in one encoded row. Binary rows are bit packed.
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn rows_per_strip(&self) -> usize {
        self.rows_per_strip
    }

    /// The resolution along `dim` (0 or 1) in pixels per centimetre, if the image is
    /// calibrated in a metric unit.
    pub fn resolution(&self, dim: usize) -> Option<f64> {
        self.resolution.get(dim).copied().flatten()
    }

    /// The number of strips covering the image.
    pub fn strips(&self) -> usize {
        self.height.div_ceil(self.rows_per_strip)
    }

    /// The rows held by strip `strip`.
    pub fn strip_rows(&self, strip: usize) -> Range<usize> {
        let start = (strip * self.rows_per_strip).min(self.height);
        start..(start + self.rows_per_strip).min(self.height)
    }

    fn format(&self) -> BufferFormat {
        format_of(self.sample_type)
    }
}

fn format_of(sample_type: SampleType) -> BufferFormat {
    if sample_type.is_binary() {
        BufferFormat::packed()
    } else {
        BufferFormat::interleaved(sample_type)
    }
}

/// The consumer of encoded strips, implemented by file format encoders.
pub trait StripSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Receive strip number `strip`. Strips arrive in order.
    fn write_strip(&mut self, strip: usize, data: &[u8]) -> Result<(), Self::Error>;
}

/// Collects every strip separately.
impl StripSink for Vec<Vec<u8>> {
    type Error = Infallible;

    fn write_strip(&mut self, _strip: usize, data: &[u8]) -> Result<(), Infallible> {
        self.push(data.to_vec());
        Ok(())
    }
}

/// Concatenates all strips.
impl StripSink for Vec<u8> {
    type Error = Infallible;

    fn write_strip(&mut self, _strip: usize, data: &[u8]) -> Result<(), Infallible> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Emit `view` to `sink` as strips of whole rows, returning the plan that was followed.
///
/// Each strip holds `rows * row_bytes` bytes. Images with normal strides are handed to the
/// sink directly from their storage. All others, and every binary image, are assembled one
/// strip at a time.
pub fn write_strips<S: StripSink>(
    view: &StridedView,
    config: &CodecConfig,
    sink: &mut S,
) -> Result<EncodingPlan> {
    let plan = EncodingPlan::new(view, config)?;
    tracing::debug!(
        width = plan.width,
        height = plan.height,
        sample_type = %plan.sample_type,
        rows_per_strip = plan.rows_per_strip,
        strips = plan.strips(),
        "writing strips",
    );

    let emit = |sink: &mut S, strip: usize, data: &[u8]| {
        sink.write_strip(strip, data).map_err(|err| Error::Sink {
            strip,
            source: Box::new(err),
        })
    };

    if view.has_normal_strides() && !plan.sample_type.is_binary() {
        tracing::trace!("strips borrowed from storage");
        let origin = view.origin()?;
        // SAFETY: With normal strides the 2-D image is `height` contiguous rows of
        // `row_bytes` bytes starting at its origin, all within the allocation, which `view`
        // keeps alive for the duration of the borrow. `view` counts as a reference, so safe
        // writers reject the allocation until the borrow ends, and the `unsafe` writers
        // forbid borrowed slices.
        let data = unsafe {
            std::slice::from_raw_parts(origin.as_ptr().cast_const(), plan.height * plan.row_bytes)
        };
        for strip in 0..plan.strips() {
            let rows = plan.strip_rows(strip);
            emit(sink, strip, &data[rows.start * plan.row_bytes..rows.end * plan.row_bytes])?;
        }
        return Ok(plan);
    }

    tracing::trace!("strips assembled by copy");
    let format = plan.format();
    let mut buffer = Vec::new();
    for strip in 0..plan.strips() {
        let rows = plan.strip_rows(strip);
        buffer.resize(rows.len() * plan.row_bytes, 0);
        copy::write_rows(view, &format, rows, &mut buffer, &config.copy)?;
        emit(sink, strip, &buffer)?;
    }
    Ok(plan)
}

///////////
// Tests //
///////////
