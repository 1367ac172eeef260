/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

#![cfg_attr(docsrs, feature(doc_cfg))]

//! Runtime-typed, N-dimensional, strided, multi-channel image views.
//!
//! # Views
//!
//! A [`StridedView`] describes samples in a shared, reference counted [`Allocation`]: sizes
//! and signed strides per dimension, a [`TensorShape`](pixcore_types::TensorShape) for the
//! channels of each pixel and a runtime [`SampleType`](pixcore_types::SampleType). Slicing,
//! subsampling, permuting, mirroring, broadcasting and channel selection derive new views
//! over the same storage without copying. Every view is checked on construction to address
//! only samples inside its allocation.
//!
//! # Dispatch
//!
//! Algorithms are written once, generic over [`Sample`](pixcore_types::Sample), and
//! instantiated for the runtime sample type by [`dispatch`](crate::dispatch). Each call
//! declares the [`ClassSet`](pixcore_types::ClassSet) it supports and fails with
//! [`ErrorKind::UnsupportedType`] before doing any work on other types.
//!
//! # Copying
//!
//! The [`copy`](crate::copy) module materializes views into contiguous buffers
//! (interleaved, planar or bit packed), reads them back, and copies between views with
//! saturating sample conversion. The [`scanline`] module builds on it to hand 2-D images to
//! strip-oriented file encoders.
//!
//! # Features
//!
//! * `rayon`: parallelize copies over output rows with [`Parallelism::Rayon`].

pub mod alloc;
pub mod copy;
pub mod dispatch;
pub mod error;
pub mod meta;
pub mod scanline;
pub mod view;

#[cfg(test)]
mod test_util;

pub use pixcore_types;

pub use alloc::{Allocation, AllocatorCore, AllocatorError, GlobalAllocator, ALIGNMENT};
pub use copy::{
    convert, copy, copy_aliased, read_from_buffer, write_rows, write_to_buffer, BufferFormat,
    ChannelOrder, CopyOptions, Parallelism,
};
pub use error::{Error, ErrorKind, Result};
pub use meta::{ImageMeta, PhysicalQuantity, Unit};
pub use scanline::{
    write_strips, CodecConfig, EncodingPlan, Photometric, SampleFormat, StripSink,
    WarningPolicy,
};
pub use view::{normal_strides, Sizes, Strides, StridedView};
