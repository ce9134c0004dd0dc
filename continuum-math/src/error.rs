// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

use thiserror::Error;

/// Failures of the point and metric primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// A coordinate or matrix entry is NaN or infinite.
    #[error("non-finite value at component {index}")]
    NonFinite { index: usize },

    /// Input slice has the wrong number of components.
    #[error("wrong dimension: expected {expected}, found {found}")]
    WrongDimension { expected: usize, found: usize },

    /// g_ij and g_ji differ by more than the tolerance.
    #[error("metric is not symmetric at ({row}, {col})")]
    NotSymmetric { row: usize, col: usize },

    /// Cholesky factorisation failed or det g ≤ 0.
    #[error("metric is not positive-definite")]
    NotPositiveDefinite,

    /// Gauss-Jordan found no usable pivot.
    #[error("metric is singular")]
    Singular,

    /// Cached inverse or determinant disagrees with g.
    #[error("cached inverse/determinant inconsistent with metric (deviation {deviation:e})")]
    InconsistentCache { deviation: f64 },
}

pub type MathResult<T> = Result<T, MathError>;
