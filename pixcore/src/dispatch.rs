/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Turning a runtime [`SampleType`] into a monomorphized code path.
//!
//! Generic code is written once against [`Sample`] as a [`Kernel`]. [`dispatch`] checks
//! the runtime type against the domain the kernel supports and then invokes the kernel with
//! the matching Rust type. This is the only place in the crate that switches on
//! [`SampleType`].
//!
//! ```
//! use pixcore::{
//!     dispatch::{dispatch, Kernel},
//!     pixcore_types::{ClassSet, Sample, SampleType},
//!     ErrorKind,
//! };
//!
//! // Report the size of the Rust type chosen for a sample type.
//! struct SizeOf;
//!
//! impl Kernel for SizeOf {
//!     type Output = usize;
//!     fn run<T: Sample>(self) -> usize {
//!         std::mem::size_of::<T>()
//!     }
//! }
//!
//! assert_eq!(dispatch(SampleType::UInt16, ClassSet::ALL, SizeOf).unwrap(), 2);
//!
//! let err = dispatch(SampleType::DComplex, ClassSet::REAL, SizeOf).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::UnsupportedType);
//! ```

use std::{marker::PhantomData, ops::Range};

use pixcore_types::{Bin, ClassSet, Complex32, Complex64, Sample, SampleType};

use crate::{
    error::{Error, Result},
    view::StridedView,
};

/// A computation generic over the sample type.
pub trait Kernel {
    type Output;

    /// Run the computation for samples of type `T`.
    fn run<T: Sample>(self) -> Self::Output;
}

/// Run `kernel` with the Rust type matching `sample_type`.
///
/// Fails with [`Error::UnsupportedType`] without running the kernel if `sample_type` is not
/// in `domain`.
pub fn dispatch<K: Kernel>(
    sample_type: SampleType,
    domain: ClassSet,
    kernel: K,
) -> Result<K::Output> {
    if !domain.contains(sample_type) {
        return Err(Error::unsupported(sample_type, domain));
    }

    let output = match sample_type {
        SampleType::Bin => kernel.run::<Bin>(),
        SampleType::UInt8 => kernel.run::<u8>(),
        SampleType::SInt8 => kernel.run::<i8>(),
        SampleType::UInt16 => kernel.run::<u16>(),
        SampleType::SInt16 => kernel.run::<i16>(),
        SampleType::UInt32 => kernel.run::<u32>(),
        SampleType::SInt32 => kernel.run::<i32>(),
        SampleType::SFloat => kernel.run::<f32>(),
        SampleType::DFloat => kernel.run::<f64>(),
        SampleType::SComplex => kernel.run::<Complex32>(),
        SampleType::DComplex => kernel.run::<Complex64>(),
    };
    Ok(output)
}

/////////////////
// Typed Views //
/////////////////

/// A read-only view whose sample type is known statically.
#[derive(Debug, Clone, Copy)]
pub struct TypedView<'a, T> {
    view: &'a StridedView,
    _type: PhantomData<T>,
}

impl<'a, T: Sample> TypedView<'a, T> {
    /// Fails unless `view` is forged with samples of type `T`.
    pub fn new(view: &'a StridedView) -> Result<Self> {
        view.check_access::<T>()?;
        Ok(Self {
            view,
            _type: PhantomData,
        })
    }

    pub fn view(&self) -> &'a StridedView {
        self.view
    }

    pub fn get(&self, index: &[usize], channel: usize) -> Result<T> {
        self.view.get(index, channel)
    }

    /// Every sample of the view: pixels with dimension 0 fastest, channels innermost.
    pub fn samples(&self) -> impl Iterator<Item = T> + 'a {
        let view = self.view;
        let elements = view.tensor_elements();
        let tensor_stride = view.tensor_stride();
        view.pixel_offsets().flat_map(move |pixel| {
            (0..elements).map(move |c| {
                // SAFETY: The sample type was checked on construction and the offset is of
                // a sample addressed by `view`.
                unsafe { view.read::<T>(pixel + tensor_stride * c as isize) }
            })
        })
    }

    /// The samples of row `row` in `channels`, pixel by pixel. Rows are lines along
    /// dimension 0, numbered with dimension 1 fastest.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `channels` are out of range.
    pub(crate) fn row_samples(
        &self,
        row: usize,
        channels: Range<usize>,
    ) -> impl Iterator<Item = T> + 'a {
        let view = self.view;
        assert!(
            row < view.rows() && channels.end <= view.tensor_elements(),
            "row {} or channels {:?} out of range",
            row,
            channels
        );

        let start = view.row_offset(row);
        let x_stride = view.x_stride();
        let tensor_stride = view.tensor_stride();
        (0..view.width()).flat_map(move |x| {
            let pixel = start + x_stride * x as isize;
            channels.clone().map(move |c| {
                // SAFETY: The sample type was checked on construction, and `row`, `x` and
                // `c` are in range, so the offset is of a sample addressed by `view`.
                unsafe { view.read::<T>(pixel + tensor_stride * c as isize) }
            })
        })
    }
}

/// A mutable view whose sample type is known statically.
///
/// The underlying [`StridedView`] is not handed out, so no clone of it can be made while
/// the typed view is alive.
#[derive(Debug)]
pub struct TypedViewMut<'a, T> {
    view: &'a mut StridedView,
    _type: PhantomData<T>,
}

impl<'a, T: Sample> TypedViewMut<'a, T> {
    /// Fails unless `view` is forged with samples of type `T` and is the only view of its
    /// allocation ([`Error::SharedStorage`] otherwise).
    pub fn new(view: &'a mut StridedView) -> Result<Self> {
        view.check_exclusive()?;
        view.check_access::<T>()?;
        Ok(Self {
            view,
            _type: PhantomData,
        })
    }

    /// Like [`Self::new`], but `view` may share its allocation with other views.
    ///
    /// # Safety
    ///
    /// While the returned view is alive, no other view may access any sample addressed by
    /// `view`, on this thread or any other. This includes slices of the allocation borrowed
    /// by [`write_strips`](crate::scanline::write_strips).
    pub unsafe fn new_aliased(view: &'a mut StridedView) -> Result<Self> {
        view.check_access::<T>()?;
        Ok(Self {
            view,
            _type: PhantomData,
        })
    }

    pub(crate) fn view(&self) -> &StridedView {
        self.view
    }

    pub fn sizes(&self) -> &[usize] {
        self.view.sizes()
    }

    pub fn tensor_elements(&self) -> usize {
        self.view.tensor_elements()
    }

    pub fn get(&self, index: &[usize], channel: usize) -> Result<T> {
        self.view.get(index, channel)
    }

    pub fn set(&mut self, index: &[usize], channel: usize, value: T) -> Result<()> {
        // SAFETY: Construction either checked that the storage is exclusive or the caller
        // of `new_aliased` promised that no other view accesses it.
        unsafe { self.view.store(index, channel, value) }
    }

    /// Write `values` into row `row` in `channels`, pixel by pixel, in the order of
    /// [`TypedView::row_samples`]. Stops early if `values` runs out.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `channels` are out of range.
    pub(crate) fn write_row<I>(&mut self, row: usize, channels: Range<usize>, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        assert!(
            row < self.view.rows() && channels.end <= self.view.tensor_elements(),
            "row {} or channels {:?} out of range",
            row,
            channels
        );

        let start = self.view.row_offset(row);
        let x_stride = self.view.x_stride();
        let tensor_stride = self.view.tensor_stride();
        let mut values = values.into_iter();
        for x in 0..self.view.width() {
            let pixel = start + x_stride * x as isize;
            for c in channels.clone() {
                let Some(value) = values.next() else {
                    return;
                };
                // SAFETY: The sample type was checked on construction, and `row`, `x` and
                // `c` are in range, so the offset is of a sample addressed by the view.
                unsafe { self.view.write::<T>(pixel + tensor_stride * c as isize, value) };
            }
        }
    }

    /// Set every sample to `value`.
    pub fn fill(&mut self, value: T) {
        self.map_in_place(|_| value);
    }

    /// Replace every sample `x` with `f(x)`, visiting samples in the order of
    /// [`TypedView::samples`].
    ///
    /// Samples reachable through more than one index (as in a broadcast view) are visited
    /// once per index.
    pub fn map_in_place<F>(&mut self, mut f: F)
    where
        F: FnMut(T) -> T,
    {
        let elements = self.view.tensor_elements();
        let tensor_stride = self.view.tensor_stride();
        let offsets: Vec<isize> = self.view.pixel_offsets().collect();
        for pixel in offsets {
            for c in 0..elements {
                let offset = pixel + tensor_stride * c as isize;
                // SAFETY: The sample type was checked on construction and the offset is of
                // a sample addressed by the view.
                unsafe {
                    let x = self.view.read::<T>(offset);
                    self.view.write::<T>(offset, f(x));
                }
            }
        }
    }
}

///////////////////
// View Dispatch //
///////////////////

/// A computation over a read-only view, generic over the sample type.
pub trait ViewKernel {
    type Output;

    fn run<T: Sample>(self, view: TypedView<'_, T>) -> Self::Output;
}

/// A computation over a mutable view, generic over the sample type.
pub trait ViewKernelMut {
    type Output;

    fn run<T: Sample>(self, view: TypedViewMut<'_, T>) -> Self::Output;
}

/// Run `kernel` on `view` with its statically typed counterpart.
pub fn dispatch_view<K: ViewKernel>(
    view: &StridedView,
    domain: ClassSet,
    kernel: K,
) -> Result<K::Output> {
    dispatch(view.sample_type(), domain, WithView { view, kernel })?
}

/// Run `kernel` on `view` with its statically typed counterpart.
///
/// The domain is checked before `view` is touched, so an unsupported sample type leaves
/// the view unmodified. Fails with [`Error::SharedStorage`] if `view` is not the only view
/// of its allocation.
pub fn dispatch_view_mut<K: ViewKernelMut>(
    view: &mut StridedView,
    domain: ClassSet,
    kernel: K,
) -> Result<K::Output> {
    view.check_exclusive()?;
    // SAFETY: No other view references the allocation.
    unsafe { dispatch_view_mut_aliased(view, domain, kernel) }
}

/// Like [`dispatch_view_mut`], but `view` may share its allocation with other views.
///
/// # Safety
///
/// The contract of [`TypedViewMut::new_aliased`] must hold until `kernel` returns.
pub unsafe fn dispatch_view_mut_aliased<K: ViewKernelMut>(
    view: &mut StridedView,
    domain: ClassSet,
    kernel: K,
) -> Result<K::Output> {
    dispatch(view.sample_type(), domain, WithViewMut { view, kernel })?
}

struct WithView<'a, K> {
    view: &'a StridedView,
    kernel: K,
}

impl<K: ViewKernel> Kernel for WithView<'_, K> {
    type Output = Result<K::Output>;

    fn run<T: Sample>(self) -> Self::Output {
        Ok(self.kernel.run(TypedView::<T>::new(self.view)?))
    }
}

// Only constructed by `dispatch_view_mut_aliased`.
struct WithViewMut<'a, K> {
    view: &'a mut StridedView,
    kernel: K,
}

impl<K: ViewKernelMut> Kernel for WithViewMut<'_, K> {
    type Output = Result<K::Output>;

    fn run<T: Sample>(self) -> Self::Output {
        // SAFETY: The caller of `dispatch_view_mut_aliased` upholds the aliasing contract.
        let view = unsafe { TypedViewMut::<T>::new_aliased(self.view)? };
        Ok(self.kernel.run(view))
    }
}

///////////
// Tests //
///////////
