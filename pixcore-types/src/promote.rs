/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Type promotion tables.
//!
//! Each rule is a `const fn` over [`SampleType`], and the tables are evaluated from those
//! rules at compile time. Lookups at runtime are a single index.

use crate::SampleType::{self, *};

type Unary = [SampleType; SampleType::COUNT];
type Dyadic = [[SampleType; SampleType::COUNT]; SampleType::COUNT];

macro_rules! unary_table {
    ($rule:ident) => {
        [
            $rule(Bin),
            $rule(UInt8),
            $rule(SInt8),
            $rule(UInt16),
            $rule(SInt16),
            $rule(UInt32),
            $rule(SInt32),
            $rule(SFloat),
            $rule(DFloat),
            $rule(SComplex),
            $rule(DComplex),
        ]
    };
}

const fn integer(t: SampleType) -> SampleType {
    match t {
        Bin => UInt8,
        SFloat | DFloat | SComplex | DComplex => SInt32,
        other => other,
    }
}

const fn signed(t: SampleType) -> SampleType {
    match t {
        Bin => SInt8,
        UInt8 => SInt16,
        UInt16 | UInt32 => SInt32,
        other => other,
    }
}

const fn float(t: SampleType) -> SampleType {
    match t {
        UInt32 | SInt32 | DFloat | DComplex => DFloat,
        _ => SFloat,
    }
}

const fn double(t: SampleType) -> SampleType {
    match t {
        SComplex | DComplex => DComplex,
        _ => DFloat,
    }
}

const fn complex(t: SampleType) -> SampleType {
    match t {
        UInt32 | SInt32 | DFloat | DComplex => DComplex,
        _ => SComplex,
    }
}

const fn flex(t: SampleType) -> SampleType {
    match t {
        SComplex | DComplex => t,
        _ => float(t),
    }
}

const fn flex_bin(t: SampleType) -> SampleType {
    match t {
        Bin => Bin,
        _ => flex(t),
    }
}

const fn abs(t: SampleType) -> SampleType {
    match t {
        SInt8 => UInt8,
        SInt16 => UInt16,
        SInt32 => UInt32,
        _ => t.real(),
    }
}

const fn real(t: SampleType) -> SampleType {
    match t {
        Bin => UInt8,
        _ => t.real(),
    }
}

// Operands that force double precision when the result is floating point or complex.
const fn wants_double(t: SampleType) -> bool {
    matches!(t, UInt32 | SInt32 | DFloat | DComplex)
}

// The smallest signed type that holds every value of both operands, capped at 32 bits.
const fn mixed_sign(signed: SampleType, unsigned: SampleType) -> SampleType {
    let needed = unsigned.size_of() * 2;
    let width = if needed > signed.size_of() {
        needed
    } else {
        signed.size_of()
    };
    match width {
        1 | 2 => SInt16,
        _ => SInt32,
    }
}

const fn dyadic(a: SampleType, b: SampleType) -> SampleType {
    if a as u8 == b as u8 || matches!(b, Bin) {
        return a;
    }
    if matches!(a, Bin) {
        return b;
    }

    let double = wants_double(a) || wants_double(b);
    if a.is_complex() || b.is_complex() {
        return if double { DComplex } else { SComplex };
    }
    if a.is_float() || b.is_float() {
        return if double { DFloat } else { SFloat };
    }

    // Both operands are integers.
    match (a.is_signed(), b.is_signed()) {
        (true, false) => mixed_sign(a, b),
        (false, true) => mixed_sign(b, a),
        _ => {
            if a.size_of() >= b.size_of() {
                a
            } else {
                b
            }
        }
    }
}

const fn arithmetic(a: SampleType, b: SampleType) -> SampleType {
    dyadic(flex_bin(a), flex_bin(b))
}

const fn build_dyadic(arith: bool) -> Dyadic {
    let mut table = [[Bin; SampleType::COUNT]; SampleType::COUNT];
    let mut i = 0;
    while i < SampleType::COUNT {
        let mut j = 0;
        while j < SampleType::COUNT {
            let (a, b) = (SampleType::ALL[i], SampleType::ALL[j]);
            table[i][j] = if arith { arithmetic(a, b) } else { dyadic(a, b) };
            j += 1;
        }
        i += 1;
    }
    table
}

pub(crate) const INTEGER: Unary = unary_table!(integer);
pub(crate) const SIGNED: Unary = unary_table!(signed);
pub(crate) const FLOAT: Unary = unary_table!(float);
pub(crate) const DOUBLE: Unary = unary_table!(double);
pub(crate) const COMPLEX: Unary = unary_table!(complex);
pub(crate) const FLEX: Unary = unary_table!(flex);
pub(crate) const FLEX_BIN: Unary = unary_table!(flex_bin);
pub(crate) const ABS: Unary = unary_table!(abs);
pub(crate) const REAL: Unary = unary_table!(real);

pub(crate) const DYADIC: Dyadic = build_dyadic(false);
pub(crate) const ARITHMETIC: Dyadic = build_dyadic(true);

///////////
// Tests //
///////////
