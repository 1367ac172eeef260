/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{ops::Range, ptr::NonNull, sync::Arc};

use pixcore_types::{Sample, SampleType, TensorShape};
use smallvec::SmallVec;

use crate::{
    alloc::{Allocation, AllocatorCore},
    error::{Error, Result},
    meta::{ImageMeta, PhysicalQuantity},
};

/// Per-dimension sizes.
pub type Sizes = SmallVec<[usize; 4]>;

/// Per-dimension strides, in samples.
pub type Strides = SmallVec<[isize; 4]>;

/// Return the normal strides for an image with `sizes` and `elements` samples per pixel.
///
/// Channels are interleaved and dimension 0 varies fastest: `stride[0] = elements` and
/// `stride[d] = stride[d - 1] * sizes[d - 1]`. For an image with sizes `[W, H]` this is the
/// familiar layout of contiguous rows of `W` pixels.
///
/// Returns `None` if a stride does not fit in an `isize`.
pub fn normal_strides(sizes: &[usize], elements: usize) -> Option<Strides> {
    let mut strides = Strides::with_capacity(sizes.len());
    let mut stride = isize::try_from(elements).ok()?;
    for &size in sizes {
        strides.push(stride);
        stride = stride.checked_mul(isize::try_from(size).ok()?)?;
    }
    Some(strides)
}

// The number of samples addressed by `sizes` and `elements`, if it fits in an `isize`.
fn sample_count(sizes: &[usize], elements: usize) -> Option<usize> {
    sizes
        .iter()
        .try_fold(elements, |acc, &n| acc.checked_mul(n))
        .filter(|&n| isize::try_from(n).is_ok())
}

/// An N-dimensional, strided, multi-channel view of image samples.
///
/// A view is a descriptor: sizes, signed strides (in samples), a [`TensorShape`] describing
/// the channels of each pixel, a [`SampleType`], and an offset into a shared
/// [`Allocation`]. Dimension 0 is the fastest varying dimension (the `x` coordinate of an
/// image).
///
/// Views are created by *forging*, which allocates zero-initialized storage with normal
/// strides. All other views are derived from a forged view (by slicing, subsampling,
/// permuting, mirroring, broadcasting or selecting a channel) and share its allocation. The
/// allocation is released once the last view referencing it is dropped.
///
/// Every view upholds the following invariant: each sample addressed by an in-bounds index
/// and channel lies within the allocation. The invariant is checked whenever a view is
/// constructed, so element access never has to re-check it.
///
/// Views may be read from any number of threads. Writing through the safe API needs
/// exclusive storage: [`StridedView::set`], [`TypedViewMut`](crate::dispatch::TypedViewMut)
/// and everything built on them fail with [`Error::SharedStorage`] while another view of
/// the allocation is alive. Writers that must alias one another go through the `unsafe`
/// entry points, such as [`copy_aliased`](crate::copy::copy_aliased).
///
/// ```
/// use pixcore::{StridedView, pixcore_types::{SampleType, TensorShape}};
///
/// let mut image = StridedView::forge(&[4, 3], TensorShape::scalar(), SampleType::UInt8)?;
/// assert!(image.has_normal_strides());
/// assert_eq!(image.strides(), &[1, 4]);
///
/// image.set::<u8>(&[3, 0], 0, 42)?;
///
/// let mirrored = image.mirror(0)?;
/// assert!(!mirrored.has_normal_strides());
/// assert_eq!(mirrored.get::<u8>(&[0, 0], 0)?, 42);
/// assert_eq!(image.allocation_refs(), 2);
///
/// let err = image.set::<u8>(&[3, 0], 0, 7).unwrap_err();
/// assert!(matches!(err, pixcore::Error::SharedStorage { refs: 2 }));
/// # Ok::<(), pixcore::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct StridedView {
    sizes: Sizes,
    strides: Strides,
    tensor: TensorShape,
    sample_type: SampleType,
    // In samples, relative to the start of the allocation.
    offset: isize,
    data: Option<Arc<Allocation>>,
    meta: ImageMeta,
}

impl Default for StridedView {
    /// A zero-dimensional, scalar `SFLOAT` descriptor without storage.
    fn default() -> Self {
        Self {
            sizes: Sizes::new(),
            strides: Strides::new(),
            tensor: TensorShape::scalar(),
            sample_type: SampleType::default(),
            offset: 0,
            data: None,
            meta: ImageMeta::default(),
        }
    }
}

impl StridedView {
    //--------------//
    // Construction //
    //--------------//

    /// Describe an image with normal strides without allocating storage for it.
    ///
    /// Every operation that needs storage fails with [`Error::NotForged`] on the result.
    pub fn unforged(
        sizes: &[usize],
        tensor: TensorShape,
        sample_type: SampleType,
    ) -> Result<Self> {
        let elements = tensor.elements();
        let overflow = || Error::SizeOverflow {
            sizes: sizes.to_vec(),
            elements,
            sample_type,
        };

        sample_count(sizes, elements)
            .and_then(|n| n.checked_mul(sample_type.size_of()))
            .filter(|&n| isize::try_from(n).is_ok())
            .ok_or_else(overflow)?;
        let strides = normal_strides(sizes, elements).ok_or_else(overflow)?;

        Ok(Self {
            sizes: sizes.iter().copied().collect(),
            strides,
            tensor: tensor.with_stride(1),
            sample_type,
            offset: 0,
            data: None,
            meta: ImageMeta::default(),
        })
    }

    /// Allocate zero-initialized storage with normal strides from the global allocator.
    pub fn forge(sizes: &[usize], tensor: TensorShape, sample_type: SampleType) -> Result<Self> {
        Self::unforged(sizes, tensor, sample_type)?.forge_with(None)
    }

    /// Like [`Self::forge`], but takes the storage from `allocator`.
    pub fn forge_in(
        sizes: &[usize],
        tensor: TensorShape,
        sample_type: SampleType,
        allocator: Arc<dyn AllocatorCore>,
    ) -> Result<Self> {
        Self::unforged(sizes, tensor, sample_type)?.forge_with(Some(allocator))
    }

    /// Forge a new image with the sizes, tensor shape and metadata of `self` but with
    /// samples of type `sample_type`.
    pub fn similar(&self, sample_type: SampleType) -> Result<Self> {
        let mut image = Self::forge(&self.sizes, self.tensor, sample_type)?;
        image.meta = self.meta.clone();
        Ok(image)
    }

    fn forge_with(mut self, allocator: Option<Arc<dyn AllocatorCore>>) -> Result<Self> {
        // `unforged` checked that this product does not overflow.
        let bytes = self.number_of_samples() * self.sample_type.size_of();
        let allocation =
            Allocation::new(bytes, allocator).map_err(|source| Error::Allocation { bytes, source })?;

        tracing::debug!(
            sizes = ?self.sizes,
            channels = self.tensor.elements(),
            sample_type = %self.sample_type,
            bytes,
            "forged image",
        );

        self.data = Some(Arc::new(allocation));
        Ok(self)
    }

    /// Construct a view with arbitrary geometry over the allocation of `self`.
    ///
    /// `offset` is measured in samples from the start of the allocation. Fails if any
    /// addressed sample would fall outside of the allocation.
    pub fn from_parts(
        &self,
        sizes: &[usize],
        strides: &[isize],
        tensor: TensorShape,
        offset: isize,
    ) -> Result<Self> {
        self.allocation()?;
        if sizes.len() != strides.len() {
            return Err(Error::RankMismatch {
                sizes: sizes.len(),
                strides: strides.len(),
            });
        }

        let view = Self {
            sizes: sizes.iter().copied().collect(),
            strides: strides.iter().copied().collect(),
            tensor,
            sample_type: self.sample_type,
            offset,
            data: self.data.clone(),
            meta: self.meta.clone(),
        };
        if view.in_bounds() {
            Ok(view)
        } else {
            Err(Error::OutOfAllocation)
        }
    }

    //-------------//
    // Derivations //
    //-------------//

    /// Restrict dimension `dim` to `range`.
    pub fn slice(&self, dim: usize, range: Range<usize>) -> Result<Self> {
        self.subsample(dim, range, 1)
    }

    /// Restrict dimension `dim` to every `step`-th index of `range`.
    pub fn subsample(&self, dim: usize, range: Range<usize>, step: usize) -> Result<Self> {
        self.allocation()?;
        let size = self.checked_size(dim)?;
        if range.start > range.end || range.end > size {
            return Err(Error::RangeOutOfBounds {
                dim,
                start: range.start,
                end: range.end,
                size,
            });
        }
        if step == 0 {
            return Err(Error::ZeroStep);
        }

        let mut view = self.clone();
        let stride = self.strides[dim];
        view.offset = stride
            .checked_mul(range.start as isize)
            .and_then(|o| o.checked_add(self.offset))
            .ok_or(Error::DerivedOutOfAllocation)?;
        view.sizes[dim] = range.len().div_ceil(step);
        view.strides[dim] = stride
            .checked_mul(step as isize)
            .ok_or(Error::DerivedOutOfAllocation)?;
        view.meta.scale(dim, step);
        view.verified()
    }

    /// Reorder dimensions: dimension `d` of the result is dimension `order[d]` of `self`.
    pub fn permute(&self, order: &[usize]) -> Result<Self> {
        self.allocation()?;
        let ndims = self.ndims();
        let mut seen: SmallVec<[bool; 4]> = SmallVec::from_elem(false, ndims);
        let valid = order.len() == ndims
            && order
                .iter()
                .all(|&d| d < ndims && !std::mem::replace(&mut seen[d], true));
        if !valid {
            return Err(Error::InvalidPermutation {
                order: order.to_vec(),
                ndims,
            });
        }

        let mut view = self.clone();
        view.sizes = order.iter().map(|&d| self.sizes[d]).collect();
        view.strides = order.iter().map(|&d| self.strides[d]).collect();
        view.meta.permute(order);
        view.verified()
    }

    /// Reverse the direction of dimension `dim`.
    pub fn mirror(&self, dim: usize) -> Result<Self> {
        self.allocation()?;
        let size = self.checked_size(dim)?;

        let mut view = self.clone();
        let stride = self.strides[dim];
        if size > 0 {
            view.offset += stride * (size - 1) as isize;
        }
        view.strides[dim] = stride
            .checked_neg()
            .ok_or(Error::DerivedOutOfAllocation)?;
        view.verified()
    }

    /// Repeat a singleton dimension `size` times without copying, using a zero stride.
    pub fn broadcast(&self, dim: usize, size: usize) -> Result<Self> {
        self.allocation()?;
        let current = self.checked_size(dim)?;
        if current != 1 {
            return Err(Error::NotSingleton { dim, size: current });
        }

        let mut view = self.clone();
        view.sizes[dim] = size;
        view.strides[dim] = 0;
        if sample_count(&view.sizes, view.tensor.elements()).is_none() {
            return Err(Error::SizeOverflow {
                sizes: view.sizes.to_vec(),
                elements: view.tensor.elements(),
                sample_type: view.sample_type,
            });
        }
        view.verified()
    }

    /// A scalar view of channel `index`.
    ///
    /// The color space is dropped since a single channel no longer carries it.
    pub fn select_channel(&self, index: usize) -> Result<Self> {
        self.allocation()?;
        let elements = self.tensor.elements();
        if index >= elements {
            return Err(Error::channel(index, elements));
        }

        let mut view = self.clone();
        view.offset += self.tensor.stride() * index as isize;
        view.tensor = self.tensor.channel();
        view.meta.set_color_space("");
        view.verified()
    }

    fn verified(self) -> Result<Self> {
        if self.in_bounds() {
            Ok(self)
        } else {
            Err(Error::DerivedOutOfAllocation)
        }
    }

    // Check that every addressed sample lies within the allocation. Unforged views are
    // trivially in bounds.
    fn in_bounds(&self) -> bool {
        let Some(data) = &self.data else {
            return true;
        };
        let capacity = (data.len() / self.sample_type.size_of()) as isize;

        if sample_count(&self.sizes, self.tensor.elements()).is_none() {
            return false;
        }

        // A view without samples only has to keep its origin within (or one past) the
        // allocation.
        if self.sizes.contains(&0) {
            return (0..=capacity).contains(&self.offset);
        }

        let extents = std::iter::zip(&self.sizes, &self.strides)
            .map(|(&n, &s)| (n, s))
            .chain(std::iter::once((
                self.tensor.elements(),
                self.tensor.stride(),
            )));

        let mut lo = self.offset;
        let mut hi = self.offset;
        for (n, s) in extents {
            // `sample_count` bounds every size by `isize::MAX`.
            let Some(span) = s.checked_mul((n - 1) as isize) else {
                return false;
            };
            let bound = if span < 0 { &mut lo } else { &mut hi };
            match bound.checked_add(span) {
                Some(b) => *bound = b,
                None => return false,
            }
        }
        lo >= 0 && hi < capacity
    }

    //-----------//
    // Accessors //
    //-----------//

    pub fn ndims(&self) -> usize {
        self.sizes.len()
    }

    /// Return the size of dimension `dim`.
    ///
    /// # Panics
    ///
    /// Panics if `dim >= self.ndims()`.
    pub fn size(&self, dim: usize) -> usize {
        self.sizes[dim]
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Return the stride of dimension `dim`, in samples.
    ///
    /// # Panics
    ///
    /// Panics if `dim >= self.ndims()`.
    pub fn stride(&self, dim: usize) -> isize {
        self.strides[dim]
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn tensor(&self) -> TensorShape {
        self.tensor
    }

    /// The number of channels of each pixel.
    pub fn tensor_elements(&self) -> usize {
        self.tensor.elements()
    }

    /// The distance between channels of one pixel, in samples.
    pub fn tensor_stride(&self) -> isize {
        self.tensor.stride()
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn number_of_pixels(&self) -> usize {
        self.sizes.iter().product()
    }

    pub fn number_of_samples(&self) -> usize {
        self.number_of_pixels() * self.tensor.elements()
    }

    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut ImageMeta {
        &mut self.meta
    }

    pub fn color_space(&self) -> &str {
        self.meta.color_space()
    }

    pub fn set_color_space(&mut self, color_space: impl Into<String>) {
        self.meta.set_color_space(color_space);
    }

    pub fn pixel_size(&self, dim: usize) -> PhysicalQuantity {
        self.meta.pixel_size(dim)
    }

    pub fn set_pixel_size(&mut self, dim: usize, size: PhysicalQuantity) {
        self.meta.set_pixel_size(dim, size);
    }

    /// Return `true` if the strides (including the tensor stride of multi-channel images)
    /// are exactly the normal strides for the sizes of `self`.
    pub fn has_normal_strides(&self) -> bool {
        let elements = self.tensor.elements();
        if elements > 1 && self.tensor.stride() != 1 {
            return false;
        }
        normal_strides(&self.sizes, elements).is_some_and(|s| s == self.strides)
    }

    pub fn is_forged(&self) -> bool {
        self.data.is_some()
    }

    /// The number of views sharing the allocation of `self`, or 0 if not forged.
    pub fn allocation_refs(&self) -> usize {
        self.data.as_ref().map_or(0, Arc::strong_count)
    }

    /// Return `true` if `self` and `other` reference the same allocation.
    pub fn shares_allocation(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// A pointer to the first sample of the view: the sample at index zero, channel zero.
    ///
    /// The pointer may be used to access any sample addressed by the sizes and strides of
    /// `self` for as long as `self` is alive.
    pub fn origin(&self) -> Result<NonNull<u8>> {
        let data = self.allocation()?;
        let bytes = self.offset * self.sample_type.size_of() as isize;
        NonNull::new(data.as_ptr().wrapping_offset(bytes)).ok_or(Error::DerivedOutOfAllocation)
    }

    //---------------//
    // Typed samples //
    //---------------//

    /// Read channel `channel` of the pixel at `index`.
    pub fn get<T: Sample>(&self, index: &[usize], channel: usize) -> Result<T> {
        self.check_access::<T>()?;
        let offset = self.sample_offset(index, channel)?;
        // SAFETY: `check_access` verified the type and storage, and `sample_offset` only
        // returns offsets of samples addressed by `self`.
        Ok(unsafe { self.read::<T>(offset) })
    }

    /// Write channel `channel` of the pixel at `index`.
    ///
    /// Writing needs exclusive storage: fails with [`Error::SharedStorage`] if any other
    /// view references the allocation of `self`. See [`Self::make_exclusive`].
    pub fn set<T: Sample>(&mut self, index: &[usize], channel: usize, value: T) -> Result<()> {
        self.check_exclusive()?;
        // SAFETY: No other view can access the allocation.
        unsafe { self.store(index, channel, value) }
    }

    /// Write a sample without checking that the storage is exclusive.
    ///
    /// # Safety
    ///
    /// No other view may access the written sample concurrently, and no slice borrowed
    /// from the allocation may be alive.
    pub(crate) unsafe fn store<T: Sample>(
        &mut self,
        index: &[usize],
        channel: usize,
        value: T,
    ) -> Result<()> {
        self.check_access::<T>()?;
        let offset = self.sample_offset(index, channel)?;
        // SAFETY: `check_access` verified the type and storage, and `sample_offset` only
        // returns offsets of samples addressed by `self`. Exclusivity is up to the caller.
        unsafe { self.write::<T>(offset, value) };
        Ok(())
    }

    pub(crate) fn check_access<T: Sample>(&self) -> Result<()> {
        self.allocation()?;
        if T::TYPE != self.sample_type {
            return Err(Error::sample_type_mismatch(self.sample_type, T::TYPE));
        }
        Ok(())
    }

    /// Fails unless `self` is forged and is the only view of its allocation.
    ///
    /// Taking `&mut self` means no clone of `self` can appear while the caller holds the
    /// borrow, so a successful check stays valid until the borrow ends.
    pub(crate) fn check_exclusive(&mut self) -> Result<()> {
        let data = self.data.as_mut().ok_or(Error::NotForged)?;
        if Arc::get_mut(data).is_some() {
            Ok(())
        } else {
            Err(Error::SharedStorage {
                refs: Arc::strong_count(data),
            })
        }
    }

    /// Give `self` an allocation of its own, unless it already is the only view of its
    /// allocation.
    ///
    /// A shared view is replaced by a copy with normal strides, the same sample type and
    /// the same metadata. Other views of the old allocation are not affected.
    pub fn make_exclusive(&mut self) -> Result<()> {
        match self.check_exclusive() {
            Err(Error::SharedStorage { .. }) => {
                *self = crate::copy::convert(self, self.sample_type, &Default::default())?;
                Ok(())
            }
            other => other,
        }
    }

    // The offset, from the start of the allocation, of a sample addressed by `self`.
    fn sample_offset(&self, index: &[usize], channel: usize) -> Result<isize> {
        if index.len() != self.ndims() || std::iter::zip(index, &self.sizes).any(|(i, n)| i >= n)
        {
            return Err(Error::index(index, &self.sizes));
        }
        if channel >= self.tensor.elements() {
            return Err(Error::channel(channel, self.tensor.elements()));
        }
        Ok(self.pixel_offset(index) + self.tensor.stride() * channel as isize)
    }

    // The offset of the first sample of the pixel at `index`, which must be in bounds.
    pub(crate) fn pixel_offset(&self, index: &[usize]) -> isize {
        std::iter::zip(index, &self.strides).fold(self.offset, |acc, (&i, &s)| acc + i as isize * s)
    }

    /// # Safety
    ///
    /// `self` must be forged with sample type `T::TYPE`, and `offset` must be the offset of
    /// a sample addressed by `self`.
    #[inline(always)]
    pub(crate) unsafe fn read<T: Sample>(&self, offset: isize) -> T {
        debug_assert_eq!(T::TYPE, self.sample_type);
        let base = self.data.as_ref().map_or(std::ptr::null_mut(), |d| d.as_ptr());
        // SAFETY: By the view invariant, samples addressed by `self` are in bounds, and the
        // allocation is aligned for every sample type.
        unsafe { base.cast::<T>().offset(offset).read() }
    }

    /// # Safety
    ///
    /// Same as [`Self::read`]. Additionally, either `self` is the only view of its
    /// allocation or no other view accesses the sample while it is written.
    #[inline(always)]
    pub(crate) unsafe fn write<T: Sample>(&mut self, offset: isize, value: T) {
        debug_assert_eq!(T::TYPE, self.sample_type);
        let base = self.data.as_ref().map_or(std::ptr::null_mut(), |d| d.as_ptr());
        // SAFETY: See `read`.
        unsafe { base.cast::<T>().offset(offset).write(value) }
    }

    //-----------//
    // Iteration //
    //-----------//

    // Images are traversed as rows along dimension 0. Zero-dimensional images are a single
    // row holding one pixel.

    pub(crate) fn width(&self) -> usize {
        self.sizes.first().copied().unwrap_or(1)
    }

    pub(crate) fn x_stride(&self) -> isize {
        self.strides.first().copied().unwrap_or(0)
    }

    pub(crate) fn rows(&self) -> usize {
        self.sizes.iter().skip(1).product()
    }

    // The offset of the first pixel of row `row`, counting rows with dimension 1 fastest.
    pub(crate) fn row_offset(&self, row: usize) -> isize {
        let mut rem = row;
        let mut offset = self.offset;
        for (&n, &s) in std::iter::zip(&self.sizes, &self.strides).skip(1) {
            offset += (rem % n) as isize * s;
            rem /= n;
        }
        offset
    }

    /// The offsets of every pixel, with dimension 0 varying fastest.
    pub(crate) fn pixel_offsets(&self) -> PixelOffsets<'_> {
        PixelOffsets {
            sizes: &self.sizes,
            strides: &self.strides,
            coords: SmallVec::from_elem(0, self.ndims()),
            offset: self.offset,
            remaining: self.number_of_pixels(),
        }
    }

    pub(crate) fn allocation(&self) -> Result<&Arc<Allocation>> {
        self.data.as_ref().ok_or(Error::NotForged)
    }

    fn checked_size(&self, dim: usize) -> Result<usize> {
        self.sizes
            .get(dim)
            .copied()
            .ok_or_else(|| Error::dimension(dim, self.ndims()))
    }
}

/// An odometer over the pixels of a view.
#[derive(Debug, Clone)]
pub(crate) struct PixelOffsets<'a> {
    sizes: &'a [usize],
    strides: &'a [isize],
    coords: Sizes,
    offset: isize,
    remaining: usize,
}

impl Iterator for PixelOffsets<'_> {
    type Item = isize;

    fn next(&mut self) -> Option<isize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.offset;

        for d in 0..self.sizes.len() {
            self.coords[d] += 1;
            self.offset += self.strides[d];
            if self.coords[d] < self.sizes[d] {
                break;
            }
            self.offset -= self.strides[d] * self.sizes[d] as isize;
            self.coords[d] = 0;
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PixelOffsets<'_> {}

///////////
// Tests //
///////////
