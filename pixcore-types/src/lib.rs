/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The value-level vocabulary of pixcore.
//!
//! * [`SampleType`]: the closed set of numeric sample representations, with canonical
//!   names, sizes, ranges and classification predicates.
//! * [`ClassSet`]: named groups of sample types, used to describe which types an
//!   operation accepts.
//! * Promotion rules such as [`SampleType::suggest_float`] and
//!   [`SampleType::suggest_arithmetic`], evaluated at compile time into lookup tables.
//! * [`TensorShape`]: the interpretation of the channels of a pixel.
//! * [`Sample`]: the Rust representation of each sample type, and the conversions
//!   between them.

mod classes;
mod promote;
mod sample;
mod sample_type;
mod tensor;

pub use classes::ClassSet;
pub use num_complex::{Complex32, Complex64};
pub use sample::{Bin, Sample};
pub use sample_type::{InvalidTag, SampleType, UnknownSampleType};
pub use tensor::{TensorKind, TensorShape, TensorShapeError};
