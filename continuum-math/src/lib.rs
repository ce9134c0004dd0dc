// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

pub mod complex;
pub mod error;
pub mod metric;
pub mod point;

pub use error::{MathError, MathResult};
pub use metric::Metric;
pub use point::{axis, Modality, Point, DIM};
