/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::{
    fmt,
    ops::{BitAnd, BitOr, Not},
};

use crate::SampleType;

/// A set of [`SampleType`]s.
///
/// Named classes such as [`ClassSet::INTEGER`] are unions of individual types, and can be
/// combined further with `|` and `&`. Membership tests are a single bit operation and
/// every constructor is `const`, so dispatch domains can be written as constants:
///
/// ```
/// use pixcore_types::{ClassSet, SampleType};
///
/// const DOMAIN: ClassSet = ClassSet::UINT.union(ClassSet::FLOAT);
/// assert!(DOMAIN.contains(SampleType::UInt16));
/// assert!(!DOMAIN.contains(SampleType::SInt16));
/// assert_eq!(DOMAIN.len(), 5);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClassSet(u16);

const fn bits(types: &[SampleType]) -> u16 {
    let mut acc = 0u16;
    let mut i = 0;
    while i < types.len() {
        acc |= 1 << types[i] as u8;
        i += 1;
    }
    acc
}

impl ClassSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    pub const BINARY: Self = Self(bits(&[SampleType::Bin]));

    pub const UINT: Self = Self(bits(&[
        SampleType::UInt8,
        SampleType::UInt16,
        SampleType::UInt32,
    ]));

    pub const SINT: Self = Self(bits(&[
        SampleType::SInt8,
        SampleType::SInt16,
        SampleType::SInt32,
    ]));

    pub const INTEGER: Self = Self::UINT.union(Self::SINT);

    pub const INT_OR_BIN: Self = Self::INTEGER.union(Self::BINARY);

    pub const FLOAT: Self = Self(bits(&[SampleType::SFloat, SampleType::DFloat]));

    pub const COMPLEX: Self = Self(bits(&[SampleType::SComplex, SampleType::DComplex]));

    pub const FLEX: Self = Self::FLOAT.union(Self::COMPLEX);

    pub const FLEX_BIN: Self = Self::FLEX.union(Self::BINARY);

    pub const UNSIGNED: Self = Self::BINARY.union(Self::UINT);

    pub const SIGNED: Self = Self::SINT.union(Self::FLEX);

    pub const REAL: Self = Self::INTEGER.union(Self::FLOAT);

    pub const SIGNED_REAL: Self = Self::SINT.union(Self::FLOAT);

    pub const NON_BINARY: Self = Self::BINARY.complement();

    pub const NON_COMPLEX: Self = Self::COMPLEX.complement();

    /// Every sample type.
    pub const ALL: Self = Self((1 << SampleType::COUNT) - 1);

    /// Construct a set containing exactly `t`.
    pub const fn of(t: SampleType) -> Self {
        Self(1 << t as u8)
    }

    pub const fn contains(self, t: SampleType) -> bool {
        self.0 & (1 << t as u8) != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Every sample type not in `self`.
    pub const fn complement(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate over the members of `self` in ordinal order.
    pub fn iter(self) -> impl Iterator<Item = SampleType> {
        SampleType::ALL
            .into_iter()
            .filter(move |t| self.contains(*t))
    }
}

impl From<SampleType> for ClassSet {
    fn from(t: SampleType) -> Self {
        Self::of(t)
    }
}

impl BitOr for ClassSet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<SampleType> for ClassSet {
    type Output = Self;
    fn bitor(self, rhs: SampleType) -> Self {
        self.union(Self::of(rhs))
    }
}

impl BitAnd for ClassSet {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl Not for ClassSet {
    type Output = Self;
    fn not(self) -> Self {
        self.complement()
    }
}

impl FromIterator<SampleType> for ClassSet {
    fn from_iter<I: IntoIterator<Item = SampleType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |acc, t| acc | t)
    }
}

impl fmt::Debug for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, t) in self.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            f.write_str(t.name())?;
        }
        f.write_str("}")
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions() {
        // Every type is in exactly one of the primitive classes.
        let primitive = [
            ClassSet::BINARY,
            ClassSet::UINT,
            ClassSet::SINT,
            ClassSet::FLOAT,
            ClassSet::COMPLEX,
        ];
        for t in SampleType::ALL {
            let n = primitive.iter().filter(|c| c.contains(t)).count();
            assert_eq!(n, 1, "{} is in {} primitive classes", t, n);
        }

        let pairs = [
            (ClassSet::UNSIGNED, ClassSet::SIGNED),
            (ClassSet::COMPLEX, ClassSet::NON_COMPLEX),
            (ClassSet::BINARY, ClassSet::NON_BINARY),
            (ClassSet::FLEX_BIN, ClassSet::INTEGER),
            (ClassSet::FLEX, ClassSet::INT_OR_BIN),
        ];
        for (a, b) in pairs {
            assert_eq!(a | b, ClassSet::ALL, "{} and {} do not cover", a, b);
            assert!((a & b).is_empty(), "{} and {} overlap", a, b);
        }

        let triple = [ClassSet::BINARY, ClassSet::REAL, ClassSet::COMPLEX];
        assert_eq!(triple[0] | triple[1] | triple[2], ClassSet::ALL);
        for (i, a) in triple.iter().enumerate() {
            for b in &triple[i + 1..] {
                assert!((*a & *b).is_empty());
            }
        }

        assert_eq!(ClassSet::NON_BINARY, ClassSet::REAL | ClassSet::COMPLEX);
        assert_eq!(ClassSet::NON_COMPLEX, ClassSet::BINARY | ClassSet::REAL);
    }

    #[test]
    fn sizes() {
        assert_eq!(ClassSet::EMPTY.len(), 0);
        assert_eq!(ClassSet::ALL.len(), SampleType::COUNT);
        assert_eq!(ClassSet::INTEGER.len(), 6);
        assert_eq!(ClassSet::FLEX_BIN.len(), 5);
        assert_eq!(ClassSet::NON_BINARY.len(), 10);
        assert_eq!(ClassSet::NON_COMPLEX.len(), 9);
        assert_eq!(ClassSet::SIGNED_REAL.len(), 5);
    }

    #[test]
    fn complement() {
        assert_eq!(!ClassSet::ALL, ClassSet::EMPTY);
        assert_eq!(!ClassSet::EMPTY, ClassSet::ALL);
        assert_eq!(!ClassSet::NON_COMPLEX, ClassSet::COMPLEX);
        for t in SampleType::ALL {
            let set = ClassSet::of(t);
            assert!(set.contains(t));
            assert!(!(!set).contains(t));
        }
    }

    #[test]
    fn iteration_is_ordered() {
        let types: Vec<_> = ClassSet::FLEX_BIN.iter().collect();
        assert_eq!(
            types,
            [
                SampleType::Bin,
                SampleType::SFloat,
                SampleType::DFloat,
                SampleType::SComplex,
                SampleType::DComplex
            ]
        );

        let collected: ClassSet = types.into_iter().collect();
        assert_eq!(collected, ClassSet::FLEX_BIN);
    }

    #[test]
    fn formatting() {
        assert_eq!(ClassSet::FLOAT.to_string(), "{SFLOAT, DFLOAT}");
        assert_eq!(ClassSet::EMPTY.to_string(), "{}");
        assert_eq!(format!("{:?}", ClassSet::BINARY), "{Bin}");
    }
}
