// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Points of the 6-D cognitive manifold
//!
//! Axis convention, fixed engine-wide:
//!
//! | index | name | range |
//! |-------|------|-------|
//! | 0..3  | x, y, z (spatial) | unbounded |
//! | 3     | τ₁ anticipation | ≥ 1 by convention |
//! | 4     | τ₂ memory | [-1, 1] |
//! | 5     | m modality | soft selector, see [`Modality`] |
//!
//! Points are immutable once built and always hold finite coordinates.

use serde::{Deserialize, Serialize};

use crate::error::{MathError, MathResult};

/// Manifold dimension.
pub const DIM: usize = 6;

/// Named axes of the manifold.
pub mod axis {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const Z: usize = 2;
    pub const ANTICIPATION: usize = 3;
    pub const MEMORY: usize = 4;
    pub const MODALITY: usize = 5;
}

/// Named sub-ranges of the modality coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    Visual,
    Auditory,
    Semantic,
}

impl Modality {
    /// Coordinate value on the modality axis.
    pub fn value(self) -> f32 {
        match self {
            Modality::Visual => 0.0,
            Modality::Auditory => 0.2,
            Modality::Semantic => 0.4,
        }
    }

    /// Nearest named modality for a coordinate value.
    pub fn nearest(m: f32) -> Self {
        [Modality::Visual, Modality::Auditory, Modality::Semantic]
            .into_iter()
            .min_by(|a, b| (a.value() - m).abs().total_cmp(&(b.value() - m).abs()))
            .unwrap_or(Modality::Visual)
    }
}

/// A point on the 6-D manifold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: [f32; DIM],
}

impl Point {
    /// Build a point; rejects NaN/Inf coordinates.
    pub fn new(coords: [f32; DIM]) -> MathResult<Self> {
        if let Some(index) = coords.iter().position(|c| !c.is_finite()) {
            return Err(MathError::NonFinite { index });
        }
        Ok(Self { coords })
    }

    /// Build a point from a slice that must hold exactly [`DIM`] values.
    pub fn from_slice(values: &[f32]) -> MathResult<Self> {
        let coords: [f32; DIM] = values.try_into().map_err(|_| MathError::WrongDimension {
            expected: DIM,
            found: values.len(),
        })?;
        Self::new(coords)
    }

    /// Spatial point at the neutral temporal frame (τ₁ = 1, τ₂ = 0) on the
    /// given modality.
    pub fn spatial(x: f32, y: f32, z: f32, modality: Modality) -> MathResult<Self> {
        Self::new([x, y, z, 1.0, 0.0, modality.value()])
    }

    #[inline]
    pub fn coords(&self) -> &[f32; DIM] {
        &self.coords
    }

    #[inline]
    pub fn get(&self, axis: usize) -> f32 {
        self.coords[axis]
    }

    /// Component-wise difference `self - other`.
    #[inline]
    pub fn delta(&self, other: &Point) -> [f32; DIM] {
        let mut d = [0.0f32; DIM];
        for (i, v) in d.iter_mut().enumerate() {
            *v = self.coords[i] - other.coords[i];
        }
        d
    }

    /// Squared Euclidean distance.
    #[inline]
    pub fn distance_sq(&self, other: &Point) -> f32 {
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// √ Σ (p_i − q_i)²
    #[inline]
    pub fn distance_euclid(&self, other: &Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Translate by `delta`; fails if the result overflows to a non-finite value.
    pub fn offset(&self, delta: &[f32; DIM]) -> MathResult<Point> {
        let mut coords = self.coords;
        for (c, d) in coords.iter_mut().zip(delta.iter()) {
            *c += d;
        }
        Point::new(coords)
    }

    /// Point at parameter `t` along the segment self → other.
    ///
    /// Both endpoints are finite, so any `t` in [0, 1] stays finite.
    pub fn lerp(&self, other: &Point, t: f32) -> Point {
        let mut coords = self.coords;
        for (i, c) in coords.iter_mut().enumerate() {
            *c += t * (other.coords[i] - self.coords[i]);
        }
        Point { coords }
    }

    /// Midpoint of the segment self → other.
    pub fn midpoint(&self, other: &Point) -> Point {
        let mut coords = [0.0f32; DIM];
        for (i, c) in coords.iter_mut().enumerate() {
            *c = 0.5 * (self.coords[i] + other.coords[i]);
        }
        Point { coords }
    }

    /// Finite coordinates inside `[-bound, bound]` with τ₂ in [-1, 1].
    pub fn is_in_range(&self, bound: f32) -> bool {
        self.coords.iter().all(|c| c.is_finite() && c.abs() <= bound)
            && (-1.0..=1.0).contains(&self.coords[axis::MEMORY])
    }

    /// Modality band this point belongs to.
    pub fn modality(&self) -> Modality {
        Modality::nearest(self.coords[axis::MODALITY])
    }
}

impl Default for Point {
    /// Spatial origin, neutral temporal frame, visual modality.
    fn default() -> Self {
        Self {
            coords: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_finite() {
        let err = Point::new([0.0, f32::NAN, 0.0, 1.0, 0.0, 0.4]).unwrap_err();
        assert_eq!(err, MathError::NonFinite { index: 1 });
        assert!(Point::new([0.0, 0.0, f32::INFINITY, 1.0, 0.0, 0.4]).is_err());
    }

    #[test]
    fn test_from_slice_dimension() {
        let err = Point::from_slice(&[0.0; 5]).unwrap_err();
        assert_eq!(err, MathError::WrongDimension { expected: 6, found: 5 });
        assert!(Point::from_slice(&[0.0; 6]).is_ok());
    }

    #[test]
    fn test_structural_equality() {
        let a = Point::new([0.1, 0.2, 0.3, 1.0, 0.0, 0.4]).unwrap();
        let b = Point::new([0.1, 0.2, 0.3, 1.0, 0.0, 0.4]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_euclidean_distance() {
        let p = Point::new([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]).unwrap();
        let q = Point::new([3.0, 4.0, 0.0, 1.0, 0.0, 0.4]).unwrap();
        assert!((p.distance_euclid(&q) - 5.0).abs() < 1e-6);
        assert!((q.distance_euclid(&p) - 5.0).abs() < 1e-6);
        assert!(p.distance_euclid(&p).abs() < 1e-12);
    }

    #[test]
    fn test_lerp_and_midpoint() {
        let p = Point::new([0.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        let q = Point::new([1.0, 2.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        let m = p.midpoint(&q);
        let l = p.lerp(&q, 0.5);
        assert_eq!(m, l);
        assert!((m.get(axis::Y) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_modality_bands() {
        assert_eq!(Modality::nearest(0.05), Modality::Visual);
        assert_eq!(Modality::nearest(0.21), Modality::Auditory);
        assert_eq!(Modality::nearest(0.9), Modality::Semantic);
        let p = Point::spatial(0.0, 0.0, 0.0, Modality::Semantic).unwrap();
        assert_eq!(p.modality(), Modality::Semantic);
    }

    #[test]
    fn test_in_range() {
        let p = Point::new([0.0, 0.0, 0.0, 1.0, 0.5, 0.4]).unwrap();
        assert!(p.is_in_range(10.0));
        let far = Point::new([50.0, 0.0, 0.0, 1.0, 0.5, 0.4]).unwrap();
        assert!(!far.is_in_range(10.0));
        let bad_memory = Point::new([0.0, 0.0, 0.0, 1.0, 1.5, 0.4]).unwrap();
        assert!(!bad_memory.is_in_range(10.0));
    }
}
