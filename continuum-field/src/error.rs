// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

use continuum_math::MathError;
use thiserror::Error;

/// Errors reported at the call site of a field operation.
///
/// Numerical faults inside an evolution step are not errors; they are
/// absorbed and counted on the affected centers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Non-finite coefficient, non-positive width, bad fractal dimension.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid point or metric.
    #[error(transparent)]
    Math(#[from] MathError),

    #[error("center index {index} out of range ({len} centers)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The field moved on since the caller captured its version.
    #[error("stale result: captured at version {expected}, field is at version {found}")]
    Stale { expected: u64, found: u64 },

    /// A spatial index was consulted against a field it no longer describes.
    #[error("spatial index built at version {built}, field is at version {current}")]
    StaleIndex { built: u64, current: u64 },
}

pub type FieldResult<T> = Result<T, FieldError>;
