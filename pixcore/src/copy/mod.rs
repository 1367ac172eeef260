/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Moving samples between strided views and contiguous buffers.
//!
//! Buffers hold pixels with dimension 0 varying fastest. Rows are lines along dimension 0.
//! Samples are converted between types on the way, using the clamping rules of [`Sample`].
//!
//! Views with normal strides whose sample type matches the buffer take a single bulk copy.
//! Every other combination goes through a typed per-row loop chosen by
//! [`crate::dispatch`]. Both paths produce identical bytes.

mod packing;

use std::ops::Range;

use pixcore_types::{Bin, ClassSet, Sample, SampleType};
use serde::{Deserialize, Serialize};

use crate::{
    dispatch::{
        dispatch, dispatch_view, dispatch_view_mut_aliased, Kernel, TypedView, TypedViewMut,
    },
    dispatch::{ViewKernel, ViewKernelMut},
    error::{Error, Result},
    view::StridedView,
};

/// How the channels of a pixel are laid out in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// All channels of a pixel are adjacent.
    #[default]
    Interleaved,
    /// One complete plane per channel.
    Planar,
}

/// The layout of a contiguous sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferFormat {
    pub sample_type: SampleType,
    pub order: ChannelOrder,
    /// Pack binary samples eight to a byte, most significant bit first. Every row starts on
    /// a byte boundary. Only scalar images with a `BIN` buffer type can be packed.
    pub bit_packed: bool,
}

impl BufferFormat {
    pub const fn interleaved(sample_type: SampleType) -> Self {
        Self {
            sample_type,
            order: ChannelOrder::Interleaved,
            bit_packed: false,
        }
    }

    pub const fn planar(sample_type: SampleType) -> Self {
        Self {
            sample_type,
            order: ChannelOrder::Planar,
            bit_packed: false,
        }
    }

    /// Binary samples, packed.
    pub const fn packed() -> Self {
        Self {
            sample_type: SampleType::Bin,
            order: ChannelOrder::Interleaved,
            bit_packed: true,
        }
    }

    /// The number of bytes in one row of `width` pixels with `channels` channels.
    ///
    /// For planar buffers this is the row of a single plane.
    pub fn row_bytes(&self, width: usize, channels: usize) -> Option<usize> {
        if self.bit_packed {
            return Some(packing::row_bytes(width));
        }
        let samples = match self.order {
            ChannelOrder::Interleaved => width.checked_mul(channels)?,
            ChannelOrder::Planar => width,
        };
        samples.checked_mul(self.sample_type.size_of())
    }

    /// The number of bytes needed to hold `rows` rows of `width` pixels with `channels`
    /// channels.
    pub fn buffer_len(&self, width: usize, rows: usize, channels: usize) -> Option<usize> {
        let planes = match self.order {
            ChannelOrder::Planar if !self.bit_packed => channels,
            _ => 1,
        };
        self.row_bytes(width, channels)?
            .checked_mul(rows)?
            .checked_mul(planes)
    }

    /// The number of bytes needed to hold all of `view`.
    pub fn buffer_len_for(&self, view: &StridedView) -> Result<usize> {
        self.buffer_len(view.width(), view.rows(), view.tensor_elements())
            .ok_or_else(|| Error::SizeOverflow {
                sizes: view.sizes().to_vec(),
                elements: view.tensor_elements(),
                sample_type: self.sample_type,
            })
    }

    fn check(&self, view: &StridedView) -> Result<()> {
        if self.bit_packed
            && (self.sample_type != SampleType::Bin || view.tensor_elements() != 1)
        {
            return Err(Error::NotPackable {
                sample_type: self.sample_type,
                elements: view.tensor_elements(),
            });
        }
        Ok(())
    }

    // Same type, no repacking: the buffer is a byte image of a normal-strided view.
    fn is_verbatim(&self, view: &StridedView) -> bool {
        !self.bit_packed
            && self.sample_type == view.sample_type()
            && (self.order == ChannelOrder::Interleaved || view.tensor_elements() == 1)
            && view.has_normal_strides()
    }
}

/// Selects how the copy engine distributes rows across threads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Parallelism {
    /// Use single-threaded execution.
    #[default]
    Sequential,

    /// Use Rayon based parallelism in the dynamically scoped Rayon thread pool.
    #[cfg(feature = "rayon")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rayon")))]
    Rayon,
}

/// Options for the copy engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    pub parallelism: Parallelism,
}

////////////////////
// View to buffer //
////////////////////

/// Materialize all of `view` into a new buffer laid out as `format`.
pub fn write_to_buffer(
    view: &StridedView,
    format: &BufferFormat,
    options: &CopyOptions,
) -> Result<Vec<u8>> {
    view.allocation()?;
    let mut buffer = vec![0u8; format.buffer_len_for(view)?];
    write_rows(view, format, 0..view.rows(), &mut buffer, options)?;
    Ok(buffer)
}

/// Materialize rows `rows` of `view` into `out`, laid out as `format`.
///
/// `out` must hold exactly the requested rows. Planar buffers hold one plane of `rows` per
/// channel.
pub fn write_rows(
    view: &StridedView,
    format: &BufferFormat,
    rows: Range<usize>,
    out: &mut [u8],
    options: &CopyOptions,
) -> Result<()> {
    view.allocation()?;
    format.check(view)?;
    if rows.start > rows.end || rows.end > view.rows() {
        return Err(Error::RangeOutOfBounds {
            dim: 1,
            start: rows.start,
            end: rows.end,
            size: view.rows(),
        });
    }

    let expected = format
        .buffer_len(view.width(), rows.len(), view.tensor_elements())
        .ok_or_else(|| Error::SizeOverflow {
            sizes: view.sizes().to_vec(),
            elements: view.tensor_elements(),
            sample_type: format.sample_type,
        })?;
    if out.len() != expected {
        return Err(Error::BufferLength {
            expected,
            found: out.len(),
        });
    }
    if expected == 0 {
        return Ok(());
    }

    if format.is_verbatim(view) {
        tracing::trace!(bytes = expected, "bulk copy to buffer");
        let row_bytes = expected / rows.len();
        let origin = view.origin()?;
        // SAFETY: With normal strides the rows of `view` are contiguous, starting at the
        // origin, so rows `rows` are `expected` bytes inside the allocation. `out` is a
        // distinct exclusive borrow.
        unsafe {
            std::ptr::copy_nonoverlapping(
                origin.as_ptr().add(rows.start * row_bytes),
                out.as_mut_ptr(),
                expected,
            )
        };
        return Ok(());
    }

    tracing::trace!(
        from = %view.sample_type(),
        to = %format.sample_type,
        order = ?format.order,
        packed = format.bit_packed,
        "strided copy to buffer",
    );
    dispatch_view(
        view,
        ClassSet::ALL,
        Encode {
            format,
            rows,
            out,
            parallelism: options.parallelism,
        },
    )?
}

struct Encode<'a> {
    format: &'a BufferFormat,
    rows: Range<usize>,
    out: &'a mut [u8],
    parallelism: Parallelism,
}

impl ViewKernel for Encode<'_> {
    type Output = Result<()>;

    fn run<S: Sample>(self, src: TypedView<'_, S>) -> Result<()> {
        dispatch(
            self.format.sample_type,
            ClassSet::ALL,
            EncodeAs { src, job: self },
        )
    }
}

struct EncodeAs<'a, 'b, S> {
    src: TypedView<'b, S>,
    job: Encode<'a>,
}

impl<S: Sample> Kernel for EncodeAs<'_, '_, S> {
    type Output = ();

    fn run<D: Sample>(self) {
        let Self { src, job } = self;
        let view = src.view();
        let width = view.width();
        let channels = view.tensor_elements();
        // `write_rows` checked the total, so the row size cannot overflow.
        let row_bytes = job.format.row_bytes(width, channels).unwrap_or(0);
        let rows = job.rows;

        if job.format.bit_packed {
            for_each_row(job.out, row_bytes, rows, job.parallelism, |row, out| {
                let bits = src.row_samples(row, 0..1).map(|s| s.convert::<Bin>().get());
                packing::pack_row(out, bits);
            });
            return;
        }

        let encode = |row: usize, range: Range<usize>, out: &mut [u8]| {
            let chunks = out.chunks_exact_mut(std::mem::size_of::<D>());
            for (chunk, s) in std::iter::zip(chunks, src.row_samples(row, range)) {
                chunk.copy_from_slice(bytemuck::bytes_of(&s.convert::<D>()));
            }
        };

        match job.format.order {
            ChannelOrder::Interleaved => {
                for_each_row(job.out, row_bytes, rows, job.parallelism, |row, out| {
                    encode(row, 0..channels, out)
                });
            }
            ChannelOrder::Planar => {
                let plane_bytes = row_bytes * rows.len();
                for (c, plane) in job.out.chunks_mut(plane_bytes).enumerate() {
                    for_each_row(plane, row_bytes, rows.clone(), job.parallelism, |row, out| {
                        encode(row, c..c + 1, out)
                    });
                }
            }
        }
    }
}

// Call `f(row, chunk)` for each row in `rows` and its `row_bytes` sized chunk of `out`.
fn for_each_row<F>(
    out: &mut [u8],
    row_bytes: usize,
    rows: Range<usize>,
    parallelism: Parallelism,
    f: F,
) where
    F: Fn(usize, &mut [u8]) + Send + Sync,
{
    match parallelism {
        Parallelism::Sequential => out
            .chunks_mut(row_bytes)
            .zip(rows)
            .for_each(|(chunk, row)| f(row, chunk)),
        #[cfg(feature = "rayon")]
        Parallelism::Rayon => {
            use rayon::prelude::*;
            out.par_chunks_mut(row_bytes)
                .zip(rows)
                .for_each(|(chunk, row)| f(row, chunk))
        }
    }
}

////////////////////
// Buffer to view //
////////////////////

/// Fill `dst` from a buffer laid out as `format`, converting samples to the type of `dst`.
///
/// `buffer` must hold exactly all of `dst`, and `dst` must be the only view of its
/// allocation.
pub fn read_from_buffer(
    buffer: &[u8],
    format: &BufferFormat,
    dst: &mut StridedView,
) -> Result<()> {
    dst.check_exclusive()?;
    // SAFETY: No other view references the allocation of `dst`.
    unsafe { read_from_buffer_aliased(buffer, format, dst) }
}

/// # Safety
///
/// The contract of [`TypedViewMut::new_aliased`] must hold for `dst` until this returns.
unsafe fn read_from_buffer_aliased(
    buffer: &[u8],
    format: &BufferFormat,
    dst: &mut StridedView,
) -> Result<()> {
    dst.allocation()?;
    format.check(dst)?;
    let expected = format.buffer_len_for(dst)?;
    if buffer.len() != expected {
        return Err(Error::BufferLength {
            expected,
            found: buffer.len(),
        });
    }
    if expected == 0 {
        return Ok(());
    }

    if format.is_verbatim(dst) {
        tracing::trace!(bytes = expected, "bulk copy from buffer");
        let origin = dst.origin()?;
        // SAFETY: With normal strides `dst` covers `expected` contiguous bytes starting at
        // its origin. `ptr::copy` tolerates `buffer` overlapping the allocation.
        unsafe { std::ptr::copy(buffer.as_ptr(), origin.as_ptr(), expected) };
        return Ok(());
    }

    tracing::trace!(
        from = %format.sample_type,
        to = %dst.sample_type(),
        order = ?format.order,
        packed = format.bit_packed,
        "strided copy from buffer",
    );
    // SAFETY: Forwarded from the caller.
    unsafe { dispatch_view_mut_aliased(dst, ClassSet::ALL, Decode { buffer, format }) }?
}

struct Decode<'a> {
    buffer: &'a [u8],
    format: &'a BufferFormat,
}

impl ViewKernelMut for Decode<'_> {
    type Output = Result<()>;

    fn run<D: Sample>(self, dst: TypedViewMut<'_, D>) -> Result<()> {
        dispatch(
            self.format.sample_type,
            ClassSet::ALL,
            DecodeAs { dst, job: self },
        )
    }
}

struct DecodeAs<'a, 'b, D> {
    dst: TypedViewMut<'b, D>,
    job: Decode<'a>,
}

impl<D: Sample> Kernel for DecodeAs<'_, '_, D> {
    type Output = ();

    fn run<S: Sample>(self) {
        let Self { mut dst, job } = self;
        let width = dst.view().width();
        let channels = dst.view().tensor_elements();
        let rows = dst.view().rows();
        let row_bytes = job.format.row_bytes(width, channels).unwrap_or(0);
        let decode = |chunk: &[u8]| {
            chunk
                .chunks_exact(std::mem::size_of::<S>())
                .map(|bytes| bytemuck::pod_read_unaligned::<S>(bytes).convert::<D>())
                .collect::<Vec<_>>()
        };

        if job.format.bit_packed {
            for (row, chunk) in job.buffer.chunks(row_bytes).take(rows).enumerate() {
                let bits = (0..width).map(|x| Bin::new(packing::get(chunk, x)).convert::<D>());
                dst.write_row(row, 0..1, bits);
            }
            return;
        }

        match job.format.order {
            ChannelOrder::Interleaved => {
                for (row, chunk) in job.buffer.chunks(row_bytes).take(rows).enumerate() {
                    dst.write_row(row, 0..channels, decode(chunk));
                }
            }
            ChannelOrder::Planar => {
                let plane_bytes = row_bytes * rows;
                for (c, plane) in job.buffer.chunks(plane_bytes).enumerate() {
                    for (row, chunk) in plane.chunks(row_bytes).take(rows).enumerate() {
                        dst.write_row(row, c..c + 1, decode(chunk));
                    }
                }
            }
        }
    }
}

//////////////////
// View to view //
//////////////////

/// Copy the samples of `src` into `dst`, converting to the sample type of `dst`.
///
/// Both views must have the same sizes and number of channels, and `dst` must be the only
/// view of its allocation. Use [`copy_aliased`] to copy between views of one allocation.
pub fn copy(src: &StridedView, dst: &mut StridedView, options: &CopyOptions) -> Result<()> {
    dst.check_exclusive()?;
    // SAFETY: No other view references the allocation of `dst`.
    unsafe { copy_aliased(src, dst, options) }
}

/// Like [`copy`], but `dst` may share its allocation with other views, including `src`.
///
/// Overlapping copies behave as if `src` was first copied to a temporary.
///
/// # Safety
///
/// While the copy runs, no view other than `src` may access the samples addressed by
/// `dst`, on this thread or any other. See [`TypedViewMut::new_aliased`].
pub unsafe fn copy_aliased(
    src: &StridedView,
    dst: &mut StridedView,
    options: &CopyOptions,
) -> Result<()> {
    src.allocation()?;
    dst.allocation()?;
    if src.sizes() != dst.sizes() {
        return Err(Error::SizeMismatch {
            left: src.sizes().to_vec(),
            right: dst.sizes().to_vec(),
        });
    }
    if src.tensor_elements() != dst.tensor_elements() {
        return Err(Error::TensorMismatch {
            left: src.tensor_elements(),
            right: dst.tensor_elements(),
        });
    }

    if src.shares_allocation(dst) {
        tracing::trace!("copy through a temporary buffer");
        let format = BufferFormat::interleaved(src.sample_type());
        let buffer = write_to_buffer(src, &format, options)?;
        // SAFETY: Forwarded from the caller. `src` is no longer accessed.
        return unsafe { read_from_buffer_aliased(&buffer, &format, dst) };
    }

    if src.sample_type() == dst.sample_type()
        && src.has_normal_strides()
        && dst.has_normal_strides()
    {
        let bytes = src.number_of_samples() * src.sample_type().size_of();
        tracing::trace!(bytes, "bulk copy between views");
        if bytes != 0 {
            let from = src.origin()?;
            let to = dst.origin()?;
            // SAFETY: Both views are contiguous with identical geometry and sample type, so
            // each covers `bytes` bytes from its origin. The allocations are distinct.
            unsafe { std::ptr::copy_nonoverlapping(from.as_ptr(), to.as_ptr(), bytes) };
        }
        return Ok(());
    }

    tracing::trace!(
        from = %src.sample_type(),
        to = %dst.sample_type(),
        "strided copy between views",
    );
    dispatch_view(src, ClassSet::ALL, CopyFrom { dst })?
}

/// Materialize `view` into a newly forged image of type `sample_type`.
///
/// The result has normal strides and carries the metadata of `view`.
pub fn convert(
    view: &StridedView,
    sample_type: SampleType,
    options: &CopyOptions,
) -> Result<StridedView> {
    view.allocation()?;
    let mut out = view.similar(sample_type)?;
    copy(view, &mut out, options)?;
    tracing::debug!(from = %view.sample_type(), to = %sample_type, "converted image");
    Ok(out)
}

struct CopyFrom<'a> {
    dst: &'a mut StridedView,
}

impl ViewKernel for CopyFrom<'_> {
    type Output = Result<()>;

    fn run<S: Sample>(self, src: TypedView<'_, S>) -> Result<()> {
        // SAFETY: Only run by `copy_aliased` on views of distinct allocations, and its
        // caller upholds the aliasing contract for `dst`.
        unsafe { dispatch_view_mut_aliased(self.dst, ClassSet::ALL, CopyInto { src }) }
    }
}

struct CopyInto<'a, S> {
    src: TypedView<'a, S>,
}

impl<S: Sample> ViewKernelMut for CopyInto<'_, S> {
    type Output = ();

    fn run<D: Sample>(self, mut dst: TypedViewMut<'_, D>) {
        let channels = dst.view().tensor_elements();
        for row in 0..dst.view().rows() {
            let samples = self.src.row_samples(row, 0..channels).map(|s| s.convert::<D>());
            dst.write_row(row, 0..channels, samples);
        }
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use pixcore_types::{Complex32, Complex64, TensorShape};
    use rand::{distr::Uniform, rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;

    use super::*;
    use crate::error::ErrorKind;

    fn options() -> CopyOptions {
        CopyOptions::default()
    }

    // A `UINT16` image whose samples count up in buffer order.
    fn counting(sizes: &[usize], channels: usize) -> StridedView {
        let tensor = TensorShape::column_vector(channels).unwrap();
        let mut image = StridedView::forge(sizes, tensor, SampleType::UInt16).unwrap();
        let mut typed = TypedViewMut::<u16>::new(&mut image).unwrap();
        let mut next = 0u16;
        typed.map_in_place(|_| {
            next += 1;
            next
        });
        image
    }

    fn u16s(buffer: &[u8]) -> Vec<u16> {
        buffer
            .chunks_exact(2)
            .map(bytemuck::pod_read_unaligned::<u16>)
            .collect()
    }

    #[test]
    fn interleaved_and_planar() {
        let image = counting(&[2, 2], 3);

        let interleaved =
            write_to_buffer(&image, &BufferFormat::interleaved(SampleType::UInt16), &options())
                .unwrap();
        assert_eq!(u16s(&interleaved), (1..=12).collect::<Vec<_>>());

        let planar =
            write_to_buffer(&image, &BufferFormat::planar(SampleType::UInt16), &options()).unwrap();
        assert_eq!(
            u16s(&planar),
            [1, 4, 7, 10, 2, 5, 8, 11, 3, 6, 9, 12]
        );

        // Reading the planar buffer back reproduces the image.
        let mut back = image.similar(SampleType::UInt16).unwrap();
        read_from_buffer(&planar, &BufferFormat::planar(SampleType::UInt16), &mut back).unwrap();
        let again =
            write_to_buffer(&back, &BufferFormat::interleaved(SampleType::UInt16), &options())
                .unwrap();
        assert_eq!(again, interleaved);
    }

    #[test]
    fn fast_and_strided_paths_agree() {
        let image = counting(&[5, 3], 2);
        let format = BufferFormat::interleaved(SampleType::UInt16);

        // Mirroring twice restores normal strides. Mirroring a singleton dimension does not
        // move any sample but leaves the strides abnormal.
        let normal = image.mirror(0).unwrap().mirror(0).unwrap();
        assert!(normal.has_normal_strides());
        let abnormal = image.slice(1, 0..1).unwrap().mirror(1).unwrap();
        assert!(!abnormal.has_normal_strides());

        let fast = write_to_buffer(&normal, &format, &options()).unwrap();
        assert_eq!(fast, write_to_buffer(&image, &format, &options()).unwrap());

        let slow = write_to_buffer(&abnormal, &format, &options()).unwrap();
        assert_eq!(slow, fast[..slow.len()]);
    }

    #[test]
    fn mirrored_rows() {
        let image = counting(&[3, 2], 1);
        let mirrored = image.mirror(0).unwrap();
        let buffer =
            write_to_buffer(&mirrored, &BufferFormat::interleaved(SampleType::UInt16), &options())
                .unwrap();
        assert_eq!(u16s(&buffer), [3, 2, 1, 6, 5, 4]);
    }

    #[rstest]
    #[case(300.7, 255)]
    #[case(-5.0, 0)]
    #[case(12.9, 12)]
    #[case(f64::NAN, 0)]
    fn narrowing(#[case] value: f64, #[case] expected: u8) {
        let mut image = StridedView::forge(&[1], TensorShape::scalar(), SampleType::DFloat).unwrap();
        image.set(&[0], 0, value).unwrap();
        let converted = convert(&image, SampleType::UInt8, &options()).unwrap();
        assert_eq!(converted.get::<u8>(&[0], 0).unwrap(), expected);
    }

    #[test]
    fn complex_conversions() {
        let mut image =
            StridedView::forge(&[2], TensorShape::scalar(), SampleType::DComplex).unwrap();
        image.set(&[0], 0, Complex64::new(3.0, 4.0)).unwrap();
        image.set(&[1], 0, Complex64::new(0.0, 0.0)).unwrap();

        let real = convert(&image, SampleType::SFloat, &options()).unwrap();
        assert_eq!(real.get::<f32>(&[0], 0).unwrap(), 5.0);

        let binary = convert(&image, SampleType::Bin, &options()).unwrap();
        assert_eq!(binary.get::<Bin>(&[0], 0).unwrap(), Bin::TRUE);
        assert_eq!(binary.get::<Bin>(&[1], 0).unwrap(), Bin::FALSE);

        let back = convert(&real, SampleType::SComplex, &options()).unwrap();
        assert_eq!(back.get::<Complex32>(&[0], 0).unwrap(), Complex32::new(5.0, 0.0));
    }

    #[test]
    fn packing_width_ten() {
        let mut image = StridedView::forge(&[10, 2], TensorShape::scalar(), SampleType::Bin).unwrap();
        for x in [0, 2, 3, 9] {
            image.set(&[x, 0], 0, Bin::TRUE).unwrap();
        }
        image.set(&[8, 1], 0, Bin::TRUE).unwrap();

        let packed = write_to_buffer(&image, &BufferFormat::packed(), &options()).unwrap();
        assert_eq!(packed, [0b1011_0000, 0b0100_0000, 0b0000_0000, 0b1000_0000]);

        let mut back = StridedView::forge(&[10, 2], TensorShape::scalar(), SampleType::Bin).unwrap();
        read_from_buffer(&packed, &BufferFormat::packed(), &mut back).unwrap();
        for x in 0..10 {
            for y in 0..2 {
                assert_eq!(
                    back.get::<Bin>(&[x, y], 0).unwrap(),
                    image.get::<Bin>(&[x, y], 0).unwrap(),
                );
            }
        }

        // Any type can be packed as long as there is one channel.
        let grey = convert(&image, SampleType::UInt8, &options()).unwrap();
        let again = write_to_buffer(&grey, &BufferFormat::packed(), &options()).unwrap();
        assert_eq!(again, packed);
    }

    #[test]
    fn packing_needs_one_binary_channel() {
        let image = counting(&[4], 2);
        let err = write_to_buffer(&image, &BufferFormat::packed(), &options()).unwrap_err();
        assert!(matches!(err, Error::NotPackable { elements: 2, .. }));

        let scalar = counting(&[4], 1);
        let format = BufferFormat {
            bit_packed: true,
            ..BufferFormat::interleaved(SampleType::UInt8)
        };
        let err = write_to_buffer(&scalar, &format, &options()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn buffer_lengths() {
        let mut image = counting(&[3, 3], 1);
        let format = BufferFormat::interleaved(SampleType::UInt16);
        let err = read_from_buffer(&[0u8; 17], &format, &mut image).unwrap_err();
        assert!(matches!(err, Error::BufferLength { expected: 18, found: 17 }));

        let mut rows = vec![0u8; 12];
        write_rows(&image, &format, 1..3, &mut rows, &options()).unwrap();
        assert_eq!(u16s(&rows), [4, 5, 6, 7, 8, 9]);

        let err = write_rows(&image, &format, 2..4, &mut rows, &options()).unwrap_err();
        assert!(matches!(err, Error::RangeOutOfBounds { .. }));
    }

    #[test]
    fn copy_checks_geometry() {
        let src = counting(&[3, 2], 1);
        let mut dst = StridedView::forge(&[2, 3], TensorShape::scalar(), SampleType::UInt8).unwrap();
        assert!(matches!(
            copy(&src, &mut dst, &options()).unwrap_err(),
            Error::SizeMismatch { .. }
        ));

        let mut dst =
            StridedView::forge(&[3, 2], TensorShape::column_vector(2).unwrap(), SampleType::UInt16)
                .unwrap();
        assert!(matches!(
            copy(&src, &mut dst, &options()).unwrap_err(),
            Error::TensorMismatch { left: 1, right: 2 }
        ));

        let mut unforged = StridedView::default();
        assert_eq!(
            copy(&src, &mut unforged, &options()).unwrap_err().kind(),
            ErrorKind::NotForged
        );
    }

    #[test]
    fn copy_into_a_strided_destination() {
        let src = counting(&[3, 2], 1);
        let dst = StridedView::forge(&[3, 2], TensorShape::scalar(), SampleType::SFloat).unwrap();
        let mut flipped = dst.mirror(1).unwrap();
        assert!(matches!(
            copy(&src, &mut flipped, &options()).unwrap_err(),
            Error::SharedStorage { refs: 2 }
        ));
        drop(dst);
        copy(&src, &mut flipped, &options()).unwrap();

        let unflipped = flipped.mirror(1).unwrap();
        let buffer = write_to_buffer(
            &unflipped,
            &BufferFormat::interleaved(SampleType::SFloat),
            &options(),
        )
        .unwrap();
        let values: Vec<f32> = buffer
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect();
        assert_eq!(values, [4.0, 5.0, 6.0, 1.0, 2.0, 3.0]);

        // Same type, both normal: the bulk path.
        let mut same = src.similar(SampleType::UInt16).unwrap();
        copy(&src, &mut same, &options()).unwrap();
        assert_eq!(same.get::<u16>(&[2, 1], 0).unwrap(), 6);
    }

    #[test]
    fn overlapping_copy() {
        let mut image = counting(&[4], 1);
        let reversed = image.mirror(0).unwrap();
        assert!(matches!(
            copy(&reversed, &mut image, &options()).unwrap_err(),
            Error::SharedStorage { .. }
        ));

        // SAFETY: Only `reversed` accesses the allocation during the copy.
        unsafe { copy_aliased(&reversed, &mut image, &options()) }.unwrap();
        let samples: Vec<_> = TypedView::<u16>::new(&image).unwrap().samples().collect();
        assert_eq!(samples, [4, 3, 2, 1]);
    }

    #[test]
    fn verbatim_binary_bytes_compare_by_truth() {
        let mut image = StridedView::forge(&[3], TensorShape::scalar(), SampleType::Bin).unwrap();
        let format = BufferFormat::interleaved(SampleType::Bin);
        assert!(format.is_verbatim(&image));
        read_from_buffer(&[0, 7, 1], &format, &mut image).unwrap();

        let bits: Vec<Bin> = TypedView::new(&image).unwrap().samples().collect();
        assert_eq!(bits, [Bin::FALSE, Bin::TRUE, Bin::TRUE]);
        assert_eq!(image.get::<Bin>(&[1], 0).unwrap(), Bin::TRUE);
    }

    #[test]
    fn random_layouts() {
        let mut rng = StdRng::seed_from_u64(0xc0ffee);
        let sizes = Uniform::new_inclusive(1usize, 6).unwrap();
        for _ in 0..20 {
            let dims = [rng.sample(sizes), rng.sample(sizes), rng.sample(sizes)];
            let image = counting(&dims, 2);
            let order = [2, 0, 1];
            let permuted = image.permute(&order).unwrap().mirror(1).unwrap();

            // Materializing the permuted view and permuting back must match the original.
            let dense = convert(&permuted, SampleType::UInt16, &options()).unwrap();
            let back = dense.permute(&[1, 2, 0]).unwrap().mirror(0).unwrap();
            let format = BufferFormat::interleaved(SampleType::UInt16);
            assert_eq!(
                write_to_buffer(&back, &format, &options()).unwrap(),
                write_to_buffer(&image, &format, &options()).unwrap(),
            );
        }
    }

    #[test]
    fn serde_options() {
        let options: CopyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.parallelism, Parallelism::Sequential);
        let options: CopyOptions =
            serde_json::from_str(r#"{"parallelism": "sequential"}"#).unwrap();
        assert_eq!(options, CopyOptions::default());

        let format: BufferFormat = serde_json::from_str(
            r#"{"sample_type": "UINT8", "order": "planar", "bit_packed": false}"#,
        )
        .unwrap();
        assert_eq!(format, BufferFormat::planar(SampleType::UInt8));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_rows_match_sequential() {
        let image = counting(&[33, 17], 3).mirror(1).unwrap();
        let parallel = CopyOptions {
            parallelism: Parallelism::Rayon,
        };
        for format in [
            BufferFormat::interleaved(SampleType::DFloat),
            BufferFormat::planar(SampleType::SInt8),
        ] {
            assert_eq!(
                write_to_buffer(&image, &format, &parallel).unwrap(),
                write_to_buffer(&image, &format, &options()).unwrap(),
            );
        }
    }
}
