/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the channels of a pixel are interpreted as a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorKind {
    #[default]
    Scalar,
    ColumnVector,
    RowVector,
    ColumnMajorMatrix,
    RowMajorMatrix,
    DiagonalMatrix,
    SymmetricMatrix,
    UpperTriangularMatrix,
    LowerTriangularMatrix,
}

impl TensorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::ColumnVector => "column vector",
            Self::RowVector => "row vector",
            Self::ColumnMajorMatrix => "column-major matrix",
            Self::RowMajorMatrix => "row-major matrix",
            Self::DiagonalMatrix => "diagonal matrix",
            Self::SymmetricMatrix => "symmetric matrix",
            Self::UpperTriangularMatrix => "upper triangular matrix",
            Self::LowerTriangularMatrix => "lower triangular matrix",
        }
    }
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TensorShapeError {
    #[error("a tensor must have at least one element")]
    Empty,
    #[error("tensor element count overflows")]
    Overflow,
    #[error("a {kind} with {rows} rows cannot store {elements} elements")]
    Inconsistent {
        kind: TensorKind,
        elements: usize,
        rows: usize,
    },
}

/// The shape of the per-pixel tensor together with the distance, in samples, between
/// consecutive channels of the same pixel.
///
/// Only the non-redundant elements are stored: a diagonal matrix stores `rows` elements
/// and symmetric or triangular matrices store `rows * (rows + 1) / 2`.
///
/// ```
/// use pixcore_types::{TensorKind, TensorShape};
///
/// let rgb = TensorShape::column_vector(3).unwrap();
/// assert_eq!(rgb.elements(), 3);
/// assert_eq!(rgb.rows(), 3);
/// assert_eq!(rgb.columns(), 1);
///
/// let m = TensorShape::try_new(TensorKind::RowMajorMatrix, 6, 2).unwrap();
/// assert_eq!(m.columns(), 3);
/// assert!(TensorShape::try_new(TensorKind::SymmetricMatrix, 5, 2).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTensorShape")]
pub struct TensorShape {
    kind: TensorKind,
    elements: usize,
    rows: usize,
    stride: isize,
}

// The serialized form, validated through `TensorShape::try_new`.
#[derive(Deserialize)]
struct RawTensorShape {
    kind: TensorKind,
    elements: usize,
    rows: usize,
    stride: isize,
}

impl TryFrom<RawTensorShape> for TensorShape {
    type Error = TensorShapeError;

    fn try_from(raw: RawTensorShape) -> Result<Self, Self::Error> {
        Ok(Self::try_new(raw.kind, raw.elements, raw.rows)?.with_stride(raw.stride))
    }
}

impl TensorShape {
    /// A single channel.
    pub const fn scalar() -> Self {
        Self {
            kind: TensorKind::Scalar,
            elements: 1,
            rows: 1,
            stride: 1,
        }
    }

    /// A column vector with `n` channels. A single element is a scalar.
    pub fn column_vector(n: usize) -> Result<Self, TensorShapeError> {
        if n == 1 {
            Ok(Self::scalar())
        } else {
            Self::try_new(TensorKind::ColumnVector, n, n)
        }
    }

    /// A row vector with `n` channels. A single element is a scalar.
    pub fn row_vector(n: usize) -> Result<Self, TensorShapeError> {
        if n == 1 {
            Ok(Self::scalar())
        } else {
            Self::try_new(TensorKind::RowVector, n, 1)
        }
    }

    /// A `rows x columns` matrix stored column-major.
    pub fn matrix(rows: usize, columns: usize) -> Result<Self, TensorShapeError> {
        Self::try_new(TensorKind::ColumnMajorMatrix, Self::product(rows, columns)?, rows)
    }

    /// A `rows x columns` matrix stored row-major.
    pub fn row_major_matrix(rows: usize, columns: usize) -> Result<Self, TensorShapeError> {
        Self::try_new(TensorKind::RowMajorMatrix, Self::product(rows, columns)?, rows)
    }

    /// An `n x n` diagonal matrix, storing only the diagonal.
    pub fn diagonal(n: usize) -> Result<Self, TensorShapeError> {
        Self::try_new(TensorKind::DiagonalMatrix, n, n)
    }

    /// An `n x n` symmetric matrix, storing one triangle.
    pub fn symmetric(n: usize) -> Result<Self, TensorShapeError> {
        Self::try_new(TensorKind::SymmetricMatrix, Self::triangle(n)?, n)
    }

    pub fn upper_triangular(n: usize) -> Result<Self, TensorShapeError> {
        Self::try_new(TensorKind::UpperTriangularMatrix, Self::triangle(n)?, n)
    }

    pub fn lower_triangular(n: usize) -> Result<Self, TensorShapeError> {
        Self::try_new(TensorKind::LowerTriangularMatrix, Self::triangle(n)?, n)
    }

    fn product(rows: usize, columns: usize) -> Result<usize, TensorShapeError> {
        rows.checked_mul(columns).ok_or(TensorShapeError::Overflow)
    }

    fn triangle(n: usize) -> Result<usize, TensorShapeError> {
        n.checked_add(1)
            .and_then(|m| m.checked_mul(n))
            .map(|m| m / 2)
            .ok_or(TensorShapeError::Overflow)
    }

    /// Construct a tensor shape, checking that `elements` and `rows` agree with `kind`.
    ///
    /// The channel stride is initialized to 1.
    pub fn try_new(
        kind: TensorKind,
        elements: usize,
        rows: usize,
    ) -> Result<Self, TensorShapeError> {
        if elements == 0 {
            return Err(TensorShapeError::Empty);
        }

        let consistent = match kind {
            TensorKind::Scalar => elements == 1 && rows == 1,
            TensorKind::ColumnVector | TensorKind::DiagonalMatrix => rows == elements,
            TensorKind::RowVector => rows == 1,
            TensorKind::ColumnMajorMatrix | TensorKind::RowMajorMatrix => {
                rows != 0 && elements % rows == 0
            }
            TensorKind::SymmetricMatrix
            | TensorKind::UpperTriangularMatrix
            | TensorKind::LowerTriangularMatrix => rows
                .checked_add(1)
                .and_then(|r| r.checked_mul(rows))
                .is_some_and(|n| n / 2 == elements),
        };

        if !consistent {
            return Err(TensorShapeError::Inconsistent {
                kind,
                elements,
                rows,
            });
        }

        Ok(Self {
            kind,
            elements,
            rows,
            stride: 1,
        })
    }

    /// Return a copy of `self` with the channel stride replaced.
    pub const fn with_stride(self, stride: isize) -> Self {
        Self { stride, ..self }
    }

    /// The shape describing a single channel of `self`.
    pub const fn channel(self) -> Self {
        Self::scalar()
    }

    pub const fn kind(&self) -> TensorKind {
        self.kind
    }

    /// The number of stored samples per pixel.
    pub const fn elements(&self) -> usize {
        self.elements
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn columns(&self) -> usize {
        match self.kind {
            TensorKind::Scalar | TensorKind::ColumnVector => 1,
            TensorKind::RowVector => self.elements,
            TensorKind::ColumnMajorMatrix | TensorKind::RowMajorMatrix => {
                self.elements / self.rows
            }
            TensorKind::DiagonalMatrix
            | TensorKind::SymmetricMatrix
            | TensorKind::UpperTriangularMatrix
            | TensorKind::LowerTriangularMatrix => self.rows,
        }
    }

    /// The distance, in samples, between consecutive channels of one pixel.
    pub const fn stride(&self) -> isize {
        self.stride
    }

    pub const fn is_scalar(&self) -> bool {
        self.elements == 1
    }

    pub const fn is_vector(&self) -> bool {
        matches!(self.kind, TensorKind::ColumnVector | TensorKind::RowVector)
    }

    pub const fn is_square(&self) -> bool {
        self.rows() == self.columns()
    }
}

impl Default for TensorShape {
    fn default() -> Self {
        Self::scalar()
    }
}

///////////
// Tests //
///////////
