/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use pixcore_types::{ClassSet, InvalidTag, SampleType, TensorShapeError, UnknownSampleType};
use thiserror::Error;

use crate::alloc::AllocatorError;

/// Convenience alias for a `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A caller supplied argument was rejected.
    InvalidArgument,
    /// An operation was asked to handle a sample type outside of the types it supports.
    UnsupportedType,
    /// The operation needs backing storage, but the view was never forged.
    NotForged,
    /// Internal state was found to be inconsistent. Indicates a bug.
    InternalInvariantViolation,
    /// A collaborator outside of this crate, such as a strip sink, failed.
    External,
}

/// Errors returned by operations on image views.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    UnknownSampleType(#[from] UnknownSampleType),

    #[error(transparent)]
    TensorShape(#[from] TensorShapeError),

    #[error(transparent)]
    InvalidTag(#[from] InvalidTag),

    #[error("the storage for sizes {sizes:?} with {elements} {sample_type} samples per pixel overflows")]
    SizeOverflow {
        sizes: Vec<usize>,
        elements: usize,
        sample_type: SampleType,
    },

    #[error("could not allocate {bytes} bytes of image storage")]
    Allocation {
        bytes: usize,
        #[source]
        source: AllocatorError,
    },

    #[error("the image is not forged")]
    NotForged,

    #[error("sample type {sample_type} is not one of {domain}")]
    UnsupportedType {
        sample_type: SampleType,
        domain: ClassSet,
    },

    #[error("expected sample type {expected}, found {found}")]
    SampleTypeMismatch {
        expected: SampleType,
        found: SampleType,
    },

    #[error("dimension {dim} is out of range for an image with {ndims} dimensions")]
    DimensionOutOfRange { dim: usize, ndims: usize },

    #[error("index {index:?} is out of bounds for sizes {sizes:?}")]
    IndexOutOfBounds { index: Vec<usize>, sizes: Vec<usize> },

    #[error("range {start}..{end} is out of bounds for dimension {dim} of size {size}")]
    RangeOutOfBounds {
        dim: usize,
        start: usize,
        end: usize,
        size: usize,
    },

    #[error("subsampling step must be positive")]
    ZeroStep,

    #[error("{order:?} is not a permutation of {ndims} dimensions")]
    InvalidPermutation { order: Vec<usize>, ndims: usize },

    #[error("channel {index} is out of range for a tensor with {elements} elements")]
    ChannelOutOfRange { index: usize, elements: usize },

    #[error("cannot broadcast dimension {dim} of size {size}, only singleton dimensions can be broadcast")]
    NotSingleton { dim: usize, size: usize },

    #[error("{sizes} sizes were given with {strides} strides")]
    RankMismatch { sizes: usize, strides: usize },

    #[error("the view addresses samples outside of its allocation")]
    OutOfAllocation,

    #[error("derived view addresses samples outside of its allocation")]
    DerivedOutOfAllocation,

    #[error("cannot write to storage shared by {refs} views")]
    SharedStorage { refs: usize },

    #[error("image sizes differ: {left:?} and {right:?}")]
    SizeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("tensor element counts differ: {left} and {right}")]
    TensorMismatch { left: usize, right: usize },

    #[error("buffer holds {found} bytes but {expected} are needed")]
    BufferLength { expected: usize, found: usize },

    #[error("bit packing needs a scalar binary image, found {elements} {sample_type} samples per pixel")]
    NotPackable {
        sample_type: SampleType,
        elements: usize,
    },

    #[error("expected a {expected}-dimensional image, found {found} dimensions")]
    Dimensionality { expected: usize, found: usize },

    #[error("{0}")]
    CodecWarning(String),

    #[error("strip {strip} could not be written")]
    Sink {
        strip: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Return the category of `self`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::NotForged => ErrorKind::NotForged,
            Self::InvalidTag(_) | Self::DerivedOutOfAllocation => {
                ErrorKind::InternalInvariantViolation
            }
            Self::Sink { .. } => ErrorKind::External,
            Self::UnknownSampleType(_)
            | Self::TensorShape(_)
            | Self::SizeOverflow { .. }
            | Self::Allocation { .. }
            | Self::SampleTypeMismatch { .. }
            | Self::DimensionOutOfRange { .. }
            | Self::IndexOutOfBounds { .. }
            | Self::RangeOutOfBounds { .. }
            | Self::ZeroStep
            | Self::InvalidPermutation { .. }
            | Self::ChannelOutOfRange { .. }
            | Self::NotSingleton { .. }
            | Self::RankMismatch { .. }
            | Self::OutOfAllocation
            | Self::SharedStorage { .. }
            | Self::SizeMismatch { .. }
            | Self::TensorMismatch { .. }
            | Self::BufferLength { .. }
            | Self::NotPackable { .. }
            | Self::Dimensionality { .. }
            | Self::CodecWarning(_) => ErrorKind::InvalidArgument,
        }
    }

    // Outlined constructors for errors raised from generic code.

    #[cold]
    #[inline(never)]
    pub(crate) fn unsupported(sample_type: SampleType, domain: ClassSet) -> Self {
        Self::UnsupportedType {
            sample_type,
            domain,
        }
    }

    #[cold]
    #[inline(never)]
    pub(crate) fn sample_type_mismatch(expected: SampleType, found: SampleType) -> Self {
        Self::SampleTypeMismatch { expected, found }
    }

    #[cold]
    #[inline(never)]
    pub(crate) fn dimension(dim: usize, ndims: usize) -> Self {
        Self::DimensionOutOfRange { dim, ndims }
    }

    #[cold]
    #[inline(never)]
    pub(crate) fn index(index: &[usize], sizes: &[usize]) -> Self {
        Self::IndexOutOfBounds {
            index: index.to_vec(),
            sizes: sizes.to_vec(),
        }
    }

    #[cold]
    #[inline(never)]
    pub(crate) fn channel(index: usize, elements: usize) -> Self {
        Self::ChannelOutOfRange { index, elements }
    }
}

///////////
// Tests //
///////////
