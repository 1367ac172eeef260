/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{classes::ClassSet, promote};

/// The numeric representation of a single sample (one channel of one pixel).
///
/// The set of variants is closed. Every variant has a canonical uppercase name which is
/// the stable interchange format across language and serialization boundaries:
///
/// | Variant    | Name         | Bytes | Classes                                      |
/// |------------|--------------|-------|----------------------------------------------|
/// | `Bin`      | `"BIN"`      | 1     | Binary, IntOrBin, FlexBin, Unsigned          |
/// | `UInt8`    | `"UINT8"`    | 1     | UInt, Integer, IntOrBin, Real, Unsigned      |
/// | `SInt8`    | `"SINT8"`    | 1     | SInt, Integer, IntOrBin, Real, Signed        |
/// | `UInt16`   | `"UINT16"`   | 2     | UInt, Integer, IntOrBin, Real, Unsigned      |
/// | `SInt16`   | `"SINT16"`   | 2     | SInt, Integer, IntOrBin, Real, Signed        |
/// | `UInt32`   | `"UINT32"`   | 4     | UInt, Integer, IntOrBin, Real, Unsigned      |
/// | `SInt32`   | `"SINT32"`   | 4     | SInt, Integer, IntOrBin, Real, Signed        |
/// | `SFloat`   | `"SFLOAT"`   | 4     | Float, Real, Flex, FlexBin, Signed           |
/// | `DFloat`   | `"DFLOAT"`   | 8     | Float, Real, Flex, FlexBin, Signed           |
/// | `SComplex` | `"SCOMPLEX"` | 8     | Complex, Flex, FlexBin, Signed               |
/// | `DComplex` | `"DCOMPLEX"` | 16    | Complex, Flex, FlexBin, Signed               |
///
/// Binary samples are a single logical bit but occupy one byte in memory. Packing them
/// eight to a byte is the job of the copy engine, not of this type.
///
/// ```
/// use pixcore_types::SampleType;
///
/// let t: SampleType = "UINT16".parse().unwrap();
/// assert_eq!(t, SampleType::UInt16);
/// assert_eq!(t.size_of(), 2);
/// assert!(t.is_unsigned());
/// assert_eq!(SampleType::suggest_arithmetic(t, SampleType::SInt8), SampleType::SFloat);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum SampleType {
    Bin = 0,
    UInt8 = 1,
    SInt8 = 2,
    UInt16 = 3,
    SInt16 = 4,
    UInt32 = 5,
    SInt32 = 6,
    SFloat = 7,
    DFloat = 8,
    SComplex = 9,
    DComplex = 10,
}

/// Returned when parsing a name that is not one of the canonical sample type names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
#[error("illegal sample type name: {name:?}")]
pub struct UnknownSampleType {
    pub name: String,
}

/// Returned when a raw tag does not correspond to any [`SampleType`].
///
/// Tags only come from [`SampleType::ordinal`], so seeing this error means some state was
/// corrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
#[error("unknown sample type tag {tag}")]
pub struct InvalidTag {
    pub tag: u8,
}

impl SampleType {
    /// The number of sample types.
    pub const COUNT: usize = 11;

    /// All sample types in ordinal order.
    pub const ALL: [SampleType; Self::COUNT] = [
        Self::Bin,
        Self::UInt8,
        Self::SInt8,
        Self::UInt16,
        Self::SInt16,
        Self::UInt32,
        Self::SInt32,
        Self::SFloat,
        Self::DFloat,
        Self::SComplex,
        Self::DComplex,
    ];

    /// Return the canonical name of the sample type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bin => "BIN",
            Self::UInt8 => "UINT8",
            Self::SInt8 => "SINT8",
            Self::UInt16 => "UINT16",
            Self::SInt16 => "SINT16",
            Self::UInt32 => "UINT32",
            Self::SInt32 => "SINT32",
            Self::SFloat => "SFLOAT",
            Self::DFloat => "DFLOAT",
            Self::SComplex => "SCOMPLEX",
            Self::DComplex => "DCOMPLEX",
        }
    }

    /// Parse a canonical sample type name. Names are case sensitive.
    pub fn from_name(name: &str) -> Result<Self, UnknownSampleType> {
        let t = match name {
            "BIN" => Self::Bin,
            "UINT8" => Self::UInt8,
            "SINT8" => Self::SInt8,
            "UINT16" => Self::UInt16,
            "SINT16" => Self::SInt16,
            "UINT32" => Self::UInt32,
            "SINT32" => Self::SInt32,
            "SFLOAT" => Self::SFloat,
            "DFLOAT" => Self::DFloat,
            "SCOMPLEX" => Self::SComplex,
            "DCOMPLEX" => Self::DComplex,
            _ => {
                return Err(UnknownSampleType {
                    name: name.to_owned(),
                })
            }
        };
        Ok(t)
    }

    /// Return the dense tag of this sample type, in the range `0..SampleType::COUNT`.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Recover a sample type from its dense tag.
    pub fn from_ordinal(tag: u8) -> Result<Self, InvalidTag> {
        Self::ALL
            .get(usize::from(tag))
            .copied()
            .ok_or(InvalidTag { tag })
    }

    /// Return the number of bytes used to store one sample of this type in unpacked form.
    pub const fn size_of(self) -> usize {
        match self {
            Self::Bin | Self::UInt8 | Self::SInt8 => 1,
            Self::UInt16 | Self::SInt16 => 2,
            Self::UInt32 | Self::SInt32 | Self::SFloat => 4,
            Self::DFloat | Self::SComplex => 8,
            Self::DComplex => 16,
        }
    }

    /// Return `true` if the integer `value` can be represented exactly by this type.
    ///
    /// Floating point and complex types accept every integer.
    pub fn is_in_range(self, value: i64) -> bool {
        match self {
            Self::Bin => (0..=1).contains(&value),
            Self::UInt8 => (i64::from(u8::MIN)..=i64::from(u8::MAX)).contains(&value),
            Self::SInt8 => (i64::from(i8::MIN)..=i64::from(i8::MAX)).contains(&value),
            Self::UInt16 => (i64::from(u16::MIN)..=i64::from(u16::MAX)).contains(&value),
            Self::SInt16 => (i64::from(i16::MIN)..=i64::from(i16::MAX)).contains(&value),
            Self::UInt32 => (i64::from(u32::MIN)..=i64::from(u32::MAX)).contains(&value),
            Self::SInt32 => (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&value),
            Self::SFloat | Self::DFloat | Self::SComplex | Self::DComplex => true,
        }
    }

    /// Unsigned companion to [`Self::is_in_range`].
    pub fn is_in_range_unsigned(self, value: u64) -> bool {
        match i64::try_from(value) {
            Ok(value) => self.is_in_range(value),
            // Beyond `i64::MAX` only the floating point types remain.
            Err(_) => self.is_flex(),
        }
    }

    /// Return the real type matching a complex type's precision. Non-complex types map to
    /// themselves.
    pub const fn real(self) -> Self {
        match self {
            Self::SComplex => Self::SFloat,
            Self::DComplex => Self::DFloat,
            other => other,
        }
    }

    //----------------//
    // Classification //
    //----------------//

    /// Return `true` if `self` belongs to `classes`.
    pub const fn is_a(self, classes: ClassSet) -> bool {
        classes.contains(self)
    }

    pub const fn is_binary(self) -> bool {
        self.is_a(ClassSet::BINARY)
    }

    pub const fn is_uint(self) -> bool {
        self.is_a(ClassSet::UINT)
    }

    pub const fn is_sint(self) -> bool {
        self.is_a(ClassSet::SINT)
    }

    pub const fn is_integer(self) -> bool {
        self.is_a(ClassSet::INTEGER)
    }

    pub const fn is_float(self) -> bool {
        self.is_a(ClassSet::FLOAT)
    }

    /// Integer or floating point.
    pub const fn is_real(self) -> bool {
        self.is_a(ClassSet::REAL)
    }

    /// Floating point or complex.
    pub const fn is_flex(self) -> bool {
        self.is_a(ClassSet::FLEX)
    }

    /// Floating point, complex or binary.
    pub const fn is_flex_bin(self) -> bool {
        self.is_a(ClassSet::FLEX_BIN)
    }

    pub const fn is_complex(self) -> bool {
        self.is_a(ClassSet::COMPLEX)
    }

    /// Binary or unsigned integer.
    pub const fn is_unsigned(self) -> bool {
        self.is_a(ClassSet::UNSIGNED)
    }

    /// Signed integer, floating point or complex.
    pub const fn is_signed(self) -> bool {
        self.is_a(ClassSet::SIGNED)
    }

    //-----------//
    // Promotion //
    //-----------//

    /// An integer type that is most suitable to hold samples of `self`.
    pub fn suggest_integer(self) -> Self {
        promote::INTEGER[usize::from(self.ordinal())]
    }

    /// A signed type that is most suitable to hold samples of `self`.
    pub fn suggest_signed(self) -> Self {
        promote::SIGNED[usize::from(self.ordinal())]
    }

    /// A floating point type that can hold samples of `self`. Never narrows precision.
    pub fn suggest_float(self) -> Self {
        promote::FLOAT[usize::from(self.ordinal())]
    }

    /// A double precision type (real or complex) that can hold large sums of `self`.
    pub fn suggest_double(self) -> Self {
        promote::DOUBLE[usize::from(self.ordinal())]
    }

    /// A complex type of equal or greater precision than `self`.
    pub fn suggest_complex(self) -> Self {
        promote::COMPLEX[usize::from(self.ordinal())]
    }

    /// A floating point or complex type that can hold samples of `self`.
    pub fn suggest_flex(self) -> Self {
        promote::FLEX[usize::from(self.ordinal())]
    }

    /// A floating point, complex or binary type that can hold samples of `self`.
    pub fn suggest_flex_bin(self) -> Self {
        promote::FLEX_BIN[usize::from(self.ordinal())]
    }

    /// A type that can hold `abs(x)` for samples `x` of `self`.
    pub fn suggest_abs(self) -> Self {
        promote::ABS[usize::from(self.ordinal())]
    }

    /// A real type that can hold samples of `self`.
    pub fn suggest_real(self) -> Self {
        promote::REAL[usize::from(self.ordinal())]
    }

    /// A floating point, complex or binary type that can hold the result of arithmetic
    /// combining samples of `t1` and `t2`.
    pub fn suggest_arithmetic(t1: Self, t2: Self) -> Self {
        promote::ARITHMETIC[usize::from(t1.ordinal())][usize::from(t2.ordinal())]
    }

    /// A type that can hold samples of both `t1` and `t2`.
    pub fn suggest_dyadic_operation(t1: Self, t2: Self) -> Self {
        promote::DYADIC[usize::from(t1.ordinal())][usize::from(t2.ordinal())]
    }
}

impl Default for SampleType {
    fn default() -> Self {
        Self::SFloat
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleType {
    type Err = UnknownSampleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

///////////
// Tests //
///////////
