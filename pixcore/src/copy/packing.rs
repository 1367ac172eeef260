/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Binary rows packed eight samples per byte, most significant bit first.

/// The number of bytes in a packed row of `width` samples.
pub(crate) const fn row_bytes(width: usize) -> usize {
    width.div_ceil(8)
}

// The bit holding sample `x` within its byte.
const fn mask(x: usize) -> u8 {
    0x80u8 >> (x % 8)
}

/// Pack `bits` into `row`. Padding bits past the last sample are cleared.
///
/// # Requires
///
/// Requires `row.len() == row_bytes(n)` where `n` is the number of bits yielded.
pub(crate) fn pack_row<I>(row: &mut [u8], bits: I)
where
    I: IntoIterator<Item = bool>,
{
    row.fill(0);
    for (x, bit) in bits.into_iter().enumerate() {
        if bit {
            row[x / 8] |= mask(x);
        }
    }
}

/// Return the sample at position `x` of a packed `row`.
pub(crate) fn get(row: &[u8], x: usize) -> bool {
    row[x / 8] & mask(x) != 0
}

///////////
// Tests //
///////////
