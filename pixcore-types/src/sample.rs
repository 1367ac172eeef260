/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Lifting a runtime [`SampleType`] into a Rust type.
//!
//! Each sample type has exactly one Rust representation implementing [`Sample`]. The trait
//! is sealed so that the set of representations stays in lockstep with [`SampleType`].

use std::{
    fmt::Debug,
    hash::{Hash, Hasher},
};

use bytemuck::{Pod, Zeroable};
use num_complex::{Complex32, Complex64};

use crate::SampleType;

/// A binary sample. Any non-zero byte is `true`.
///
/// Occupies one byte in memory. Sub-byte packing only happens in the copy engine.
/// Equality and hashing follow [`Bin::get`], so every non-zero byte compares equal to
/// [`Bin::TRUE`].
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bin(u8);

impl PartialEq for Bin {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for Bin {}

impl Hash for Bin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.get().hash(state);
    }
}

impl Bin {
    pub const FALSE: Self = Self(0);
    pub const TRUE: Self = Self(1);

    pub const fn new(value: bool) -> Self {
        Self(value as u8)
    }

    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bin {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

impl From<Bin> for bool {
    fn from(value: Bin) -> Self {
        value.get()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// The Rust representation of one [`SampleType`].
///
/// Conversions between representations go through `f64` (real targets) or [`Complex64`]
/// (complex targets). Every 32-bit integer is exactly representable in `f64`, so
/// integer-to-integer conversions are exact when the value fits.
///
/// When the target cannot represent a value:
///
/// * Integer targets clamp to their range, then truncate toward zero. `NaN` becomes 0.
/// * Binary targets map any non-zero value to 1. `NaN` becomes 0.
/// * Single precision targets clamp finite values to the largest finite `f32`.
/// * Real targets receive the modulus of complex values.
/// * Complex targets receive real values with a zero imaginary part.
pub trait Sample:
    sealed::Sealed + Pod + Default + PartialEq + Debug + Send + Sync + 'static
{
    /// The runtime tag for `Self`.
    const TYPE: SampleType;

    /// Widen `self` into an `f64`, taking the modulus of complex values.
    fn to_real(self) -> f64;

    /// Widen `self` into a [`Complex64`].
    fn to_complex(self) -> Complex64;

    /// Narrow a real value into `Self` according to the clamping rules above.
    fn from_real(value: f64) -> Self;

    /// Narrow a complex value into `Self` according to the clamping rules above.
    fn from_complex(value: Complex64) -> Self;

    /// Convert `self` into another representation.
    #[inline]
    fn convert<T: Sample>(self) -> T {
        if T::TYPE.is_complex() {
            T::from_complex(self.to_complex())
        } else {
            T::from_real(self.to_real())
        }
    }
}

macro_rules! integer_sample {
    ($T:ty, $tag:ident) => {
        impl sealed::Sealed for $T {}
        impl Sample for $T {
            const TYPE: SampleType = SampleType::$tag;

            #[inline]
            fn to_real(self) -> f64 {
                f64::from(self)
            }

            #[inline]
            fn to_complex(self) -> Complex64 {
                Complex64::new(f64::from(self), 0.0)
            }

            #[inline]
            fn from_real(value: f64) -> Self {
                if value.is_nan() {
                    0
                } else {
                    // The cast truncates toward zero.
                    value.clamp(<$T>::MIN.into(), <$T>::MAX.into()) as $T
                }
            }

            #[inline]
            fn from_complex(value: Complex64) -> Self {
                Self::from_real(value.norm())
            }
        }
    };
}

integer_sample!(u8, UInt8);
integer_sample!(i8, SInt8);
integer_sample!(u16, UInt16);
integer_sample!(i16, SInt16);
integer_sample!(u32, UInt32);
integer_sample!(i32, SInt32);

impl sealed::Sealed for Bin {}
impl Sample for Bin {
    const TYPE: SampleType = SampleType::Bin;

    #[inline]
    fn to_real(self) -> f64 {
        f64::from(self.0.min(1))
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self.to_real(), 0.0)
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        // `NaN != 0.0` holds, hence the explicit check.
        Self::new(value != 0.0 && !value.is_nan())
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        Self::from_real(value.norm())
    }
}

#[inline]
fn narrow_f32(value: f64) -> f32 {
    if value.is_finite() {
        value.clamp(f64::from(f32::MIN), f64::from(f32::MAX)) as f32
    } else {
        value as f32
    }
}

impl sealed::Sealed for f32 {}
impl Sample for f32 {
    const TYPE: SampleType = SampleType::SFloat;

    #[inline]
    fn to_real(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(f64::from(self), 0.0)
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        narrow_f32(value)
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        narrow_f32(value.norm())
    }
}

impl sealed::Sealed for f64 {}
impl Sample for f64 {
    const TYPE: SampleType = SampleType::DFloat;

    #[inline]
    fn to_real(self) -> f64 {
        self
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        value
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        value.norm()
    }
}

impl sealed::Sealed for Complex32 {}
impl Sample for Complex32 {
    const TYPE: SampleType = SampleType::SComplex;

    #[inline]
    fn to_real(self) -> f64 {
        self.to_complex().norm()
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self.re.into(), self.im.into())
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        Complex32::new(narrow_f32(value), 0.0)
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        Complex32::new(narrow_f32(value.re), narrow_f32(value.im))
    }
}

impl sealed::Sealed for Complex64 {}
impl Sample for Complex64 {
    const TYPE: SampleType = SampleType::DComplex;

    #[inline]
    fn to_real(self) -> f64 {
        self.norm()
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        self
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    #[inline]
    fn from_complex(value: Complex64) -> Self {
        value
    }
}

///////////
// Tests //
///////////
