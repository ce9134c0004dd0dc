// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Metric Tensor of the 6-D manifold
//!
//! A metric is a symmetric positive-definite 6×6 matrix g with a cached
//! inverse g⁻¹ and determinant det g. Both caches are computed once at
//! construction, so every consumer sees a consistent triple.
//!
//! Storage: upper-triangle packed symmetric matrix (21 floats) for g and
//! for g⁻¹. Both caches come from one f64 Cholesky factor g = L·Lᵀ:
//! g⁻¹ = L⁻ᵀL⁻¹ and det g = ∏ L_ii², stored as f32.
//!
//! The engine's adaptive form is an isotropic boost of a base metric:
//!
//!   g_ij(x) = G_ij + α·|Φ(x)|²·δ_ij
//!
//! built with [`Metric::with_isotropic_boost`].

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::error::{MathError, MathResult};
use crate::point::DIM;

/// Absolute tolerance for symmetry checks.
pub const SYMMETRY_TOLERANCE: f32 = 1e-6;

/// Tolerance on max |(g·g⁻¹)_ij − δ_ij| for a valid cache.
pub const INVERSE_TOLERANCE: f64 = 1e-5;

/// Packed symmetric metric tensor with cached inverse and determinant.
/// Stores the upper triangle in row-major order:
/// [g00, g01, ..., g05, g11, g12, ..., g55]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Upper-triangle packed components of g
    components: Vec<f32>,
    /// Upper-triangle packed components of g⁻¹
    inverse: Vec<f32>,
    /// det g
    determinant: f32,
    /// Smallest eigenvalue of g
    min_eigenvalue: f32,
}

impl Metric {
    /// Number of independent components for a symmetric DIM×DIM matrix
    pub const PACKED_SIZE: usize = DIM * (DIM + 1) / 2;

    /// Packed index for (i, j), symmetric in its arguments.
    #[inline]
    pub fn packed_index(i: usize, j: usize) -> usize {
        let (r, c) = if i <= j { (i, j) } else { (j, i) };
        r * DIM - r * (r + 1) / 2 + c
    }

    /// Flat Euclidean metric.
    pub fn identity() -> Self {
        let mut components = vec![0.0f32; Self::PACKED_SIZE];
        for i in 0..DIM {
            components[Self::packed_index(i, i)] = 1.0;
        }
        Self {
            inverse: components.clone(),
            components,
            determinant: 1.0,
            min_eigenvalue: 1.0,
        }
    }

    /// Diagonal metric diag(d₀, …, d₅); every entry must be finite and > 0.
    pub fn diagonal(diag: &[f32; DIM]) -> MathResult<Self> {
        let mut full = [0.0f32; DIM * DIM];
        for (i, &d) in diag.iter().enumerate() {
            full[i * DIM + i] = d;
        }
        Self::from_full(&full)
    }

    /// Create a metric from a full symmetric matrix (flattened row-major).
    ///
    /// Fails on non-finite entries, asymmetry, or a matrix that is not
    /// positive-definite.
    pub fn from_full(full: &[f32]) -> MathResult<Self> {
        let components = pack_symmetric(full)?;
        let matrix = to_matrix(&components);
        let factored = factor(matrix.clone())?;
        if !(factored.determinant > 0.0 && factored.determinant.is_finite()) {
            return Err(MathError::NotPositiveDefinite);
        }
        let inverse = pack_upper(&factored.inverse);
        let determinant = factored.determinant;

        let metric = Self {
            components,
            inverse,
            determinant: determinant as f32,
            min_eigenvalue: min_eigenvalue(matrix) as f32,
        };
        metric.check_cache()?;
        Ok(metric)
    }

    /// Rebuild a metric from externally stored g, g⁻¹ and det g.
    ///
    /// The caches are kept as given and then validated against g; used by
    /// the persistence layer so that a corrupted cache is rejected rather
    /// than silently recomputed.
    pub fn from_cached(full: &[f32], inverse_full: &[f32], det: f32) -> MathResult<Self> {
        let components = pack_symmetric(full)?;
        let inverse = pack_symmetric(inverse_full)?;
        if !det.is_finite() || det <= 0.0 {
            return Err(MathError::NotPositiveDefinite);
        }
        let matrix = to_matrix(&components);
        if matrix.clone().cholesky().is_none() {
            return Err(MathError::NotPositiveDefinite);
        }
        let metric = Self {
            components,
            inverse,
            determinant: det,
            min_eigenvalue: min_eigenvalue(matrix) as f32,
        };
        metric.validate()?;
        Ok(metric)
    }

    /// g + s·I, the adaptive amplification of this metric.
    pub fn with_isotropic_boost(&self, s: f32) -> MathResult<Self> {
        if !s.is_finite() {
            return Err(MathError::NonFinite { index: 0 });
        }
        if s == 0.0 {
            return Ok(self.clone());
        }
        let mut full = self.to_full();
        for i in 0..DIM {
            full[i * DIM + i] += s;
        }
        Self::from_full(&full)
    }

    /// Get g_ij (symmetric, so g_ij = g_ji)
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.components[Self::packed_index(i, j)]
    }

    /// Get (g⁻¹)^ij
    #[inline]
    pub fn inv(&self, i: usize, j: usize) -> f32 {
        self.inverse[Self::packed_index(i, j)]
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.determinant
    }

    /// Smallest eigenvalue; bounds g-distances below by √λ_min · Euclidean.
    #[inline]
    pub fn min_eigenvalue(&self) -> f32 {
        self.min_eigenvalue
    }

    /// Convert to full DIM×DIM matrix (row-major)
    pub fn to_full(&self) -> Vec<f32> {
        unpack(&self.components)
    }

    /// Full g⁻¹ (row-major)
    pub fn inverse_full(&self) -> Vec<f32> {
        unpack(&self.inverse)
    }

    /// Whether g is the identity within `tol`.
    pub fn is_identity(&self, tol: f32) -> bool {
        (0..DIM).all(|i| {
            (i..DIM).all(|j| {
                let target = if i == j { 1.0 } else { 0.0 };
                (self.get(i, j) - target).abs() <= tol
            })
        })
    }

    /// Δᵀ g Δ
    pub fn quadratic_form(&self, delta: &[f32; DIM]) -> f32 {
        let mut acc = 0.0f64;
        for i in 0..DIM {
            let di = delta[i] as f64;
            acc += self.get(i, i) as f64 * di * di;
            for j in (i + 1)..DIM {
                acc += 2.0 * self.get(i, j) as f64 * di * delta[j] as f64;
            }
        }
        acc as f32
    }

    /// g·v
    pub fn apply(&self, v: &[f32; DIM]) -> [f32; DIM] {
        let mut out = [0.0f32; DIM];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (0..DIM).map(|j| self.get(i, j) * v[j]).sum();
        }
        out
    }

    /// g⁻¹ as an f64 matrix, for the geometry operators.
    pub fn inverse_f64(&self) -> [[f64; DIM]; DIM] {
        let mut out = [[0.0f64; DIM]; DIM];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.inv(i, j) as f64;
            }
        }
        out
    }

    /// max |(g·g⁻¹)_ij − δ_ij|
    pub fn inverse_deviation(&self) -> f64 {
        let mut worst = 0.0f64;
        for i in 0..DIM {
            for j in 0..DIM {
                let mut acc = 0.0f64;
                for k in 0..DIM {
                    acc += self.get(i, k) as f64 * self.inv(k, j) as f64;
                }
                let target = if i == j { 1.0 } else { 0.0 };
                worst = worst.max((acc - target).abs());
            }
        }
        worst
    }

    /// Symmetric (by packed storage), det > 0, and the cached inverse and
    /// determinant agree with g.
    pub fn validate(&self) -> MathResult<()> {
        if self.components.iter().chain(self.inverse.iter()).any(|v| !v.is_finite()) {
            return Err(MathError::NonFinite { index: 0 });
        }
        if !(self.determinant > 0.0) || !(self.min_eigenvalue > 0.0) {
            return Err(MathError::NotPositiveDefinite);
        }
        self.check_cache()
    }

    /// Boolean form of [`Metric::validate`].
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn check_cache(&self) -> MathResult<()> {
        let deviation = self.inverse_deviation();
        if deviation > INVERSE_TOLERANCE {
            return Err(MathError::InconsistentCache { deviation });
        }
        let det = factor(to_matrix(&self.components))?.determinant;
        let rel = ((det - self.determinant as f64) / det.abs().max(f64::MIN_POSITIVE)).abs();
        if rel > INVERSE_TOLERANCE {
            return Err(MathError::InconsistentCache { deviation: rel });
        }
        Ok(())
    }
}

impl Default for Metric {
    fn default() -> Self {
        Self::identity()
    }
}

// ---------------------------------------------------------------------------
// Dense helpers
// ---------------------------------------------------------------------------

fn pack_symmetric(full: &[f32]) -> MathResult<Vec<f32>> {
    if full.len() != DIM * DIM {
        return Err(MathError::WrongDimension {
            expected: DIM * DIM,
            found: full.len(),
        });
    }
    if let Some(index) = full.iter().position(|v| !v.is_finite()) {
        return Err(MathError::NonFinite { index });
    }
    for i in 0..DIM {
        for j in (i + 1)..DIM {
            let a = full[i * DIM + j];
            let b = full[j * DIM + i];
            let scale = a.abs().max(b.abs()).max(1.0);
            if (a - b).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(MathError::NotSymmetric { row: i, col: j });
            }
        }
    }
    let mut packed = vec![0.0f32; Metric::PACKED_SIZE];
    for i in 0..DIM {
        for j in i..DIM {
            packed[Metric::packed_index(i, j)] = full[i * DIM + j];
        }
    }
    Ok(packed)
}

fn pack_upper(full: &DMatrix<f64>) -> Vec<f32> {
    let mut packed = vec![0.0f32; Metric::PACKED_SIZE];
    for i in 0..DIM {
        for j in i..DIM {
            // Average the two triangles so round-off asymmetry does not leak.
            packed[Metric::packed_index(i, j)] = (0.5 * (full[(i, j)] + full[(j, i)])) as f32;
        }
    }
    packed
}

fn unpack(packed: &[f32]) -> Vec<f32> {
    let mut full = vec![0.0f32; DIM * DIM];
    for i in 0..DIM {
        for j in 0..DIM {
            full[i * DIM + j] = packed[Metric::packed_index(i, j)];
        }
    }
    full
}

/// Cholesky-derived caches of a symmetric matrix.
struct Factored {
    inverse: DMatrix<f64>,
    /// ∏ L_ii²
    determinant: f64,
}

/// Factor g = L·Lᵀ; fails unless g is positive-definite.
fn factor(matrix: DMatrix<f64>) -> MathResult<Factored> {
    let chol = matrix.cholesky().ok_or(MathError::NotPositiveDefinite)?;
    let determinant = chol.l_dirty().diagonal().iter().map(|d| d * d).product();
    Ok(Factored {
        inverse: chol.inverse(),
        determinant,
    })
}

fn to_matrix(packed: &[f32]) -> DMatrix<f64> {
    DMatrix::from_fn(DIM, DIM, |i, j| packed[Metric::packed_index(i, j)] as f64)
}

fn min_eigenvalue(matrix: DMatrix<f64>) -> f64 {
    let eigen = SymmetricEigen::new(matrix);
    eigen.eigenvalues.iter().cloned().fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_identity_error(g: &Metric) -> f64 {
        g.inverse_deviation()
    }

    #[test]
    fn test_identity_metric() {
        let g = Metric::identity();
        for i in 0..DIM {
            assert!((g.get(i, i) - 1.0).abs() < 1e-6);
            for j in (i + 1)..DIM {
                assert!(g.get(i, j).abs() < 1e-6);
            }
        }
        assert!(g.is_identity(1e-6));
        assert!(g.is_valid());
        assert!((g.determinant() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_packed_size() {
        assert_eq!(Metric::PACKED_SIZE, 21);
        assert_eq!(Metric::packed_index(0, 0), 0);
        assert_eq!(Metric::packed_index(5, 5), 20);
        assert_eq!(Metric::packed_index(1, 0), Metric::packed_index(0, 1));
    }

    #[test]
    fn test_inverse_diagonal() {
        let g = Metric::diagonal(&[2.0, 4.0, 0.5, 1.0, 1.0, 3.0]).unwrap();
        assert!((g.inv(0, 0) - 0.5).abs() < 1e-6);
        assert!((g.inv(1, 1) - 0.25).abs() < 1e-6);
        assert!((g.inv(2, 2) - 2.0).abs() < 1e-6);
        assert!((g.determinant() - 12.0).abs() < 1e-4);
        assert!(max_identity_error(&g) < 1e-6, "g·g⁻¹ deviation {}", max_identity_error(&g));
    }

    #[test]
    fn test_dense_inverse_consistent() {
        let mut full = [0.0f32; 36];
        for i in 0..DIM {
            full[i * DIM + i] = 2.0 + i as f32 * 0.1;
        }
        full[1] = 0.3;
        full[DIM] = 0.3;
        full[2 * DIM + 4] = -0.2;
        full[4 * DIM + 2] = -0.2;
        let g = Metric::from_full(&full).unwrap();
        assert!(g.is_valid());
        assert!(max_identity_error(&g) < 1e-5);
        assert!(g.min_eigenvalue() > 0.0);
    }

    #[test]
    fn test_caches_match_dense_reference() {
        let mut full = [0.0f32; 36];
        for i in 0..DIM {
            full[i * DIM + i] = 1.5 + 0.25 * i as f32;
        }
        for (i, j, v) in [(0, 3, 0.4f32), (1, 5, -0.3), (2, 4, 0.2)] {
            full[i * DIM + j] = v;
            full[j * DIM + i] = v;
        }
        let g = Metric::from_full(&full).unwrap();

        let dense = DMatrix::from_fn(DIM, DIM, |i, j| full[i * DIM + j] as f64);
        let det = dense.clone().determinant();
        assert!(((g.determinant() as f64 - det) / det).abs() < 1e-6, "{} vs {}", g.determinant(), det);
        let inv = dense.try_inverse().unwrap();
        for i in 0..DIM {
            for j in 0..DIM {
                assert!((g.inv(i, j) as f64 - inv[(i, j)]).abs() < 1e-6, "({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_rejects_indefinite() {
        let err = Metric::diagonal(&[1.0, 1.0, -1.0, 1.0, 1.0, 1.0]).unwrap_err();
        assert_eq!(err, MathError::NotPositiveDefinite);
    }

    #[test]
    fn test_rejects_asymmetric() {
        let mut full = [0.0f32; 36];
        for i in 0..DIM {
            full[i * DIM + i] = 1.0;
        }
        full[1] = 0.5;
        let err = Metric::from_full(&full).unwrap_err();
        assert_eq!(err, MathError::NotSymmetric { row: 0, col: 1 });
    }

    #[test]
    fn test_isotropic_boost() {
        let g = Metric::identity().with_isotropic_boost(0.5).unwrap();
        for i in 0..DIM {
            assert!((g.get(i, i) - 1.5).abs() < 1e-6);
            assert!((g.inv(i, i) - 1.0 / 1.5).abs() < 1e-6);
        }
        assert!((g.determinant() - 1.5f32.powi(6)).abs() < 1e-4);
        assert!(max_identity_error(&g) < 1e-6);
    }

    #[test]
    fn test_quadratic_form() {
        let g = Metric::diagonal(&[4.0, 1.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let d = [1.0, 2.0, 0.0, 0.0, 0.0, 0.0];
        assert!((g.quadratic_form(&d) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_cached_rejects_bad_inverse() {
        let g = Metric::diagonal(&[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]).unwrap();
        let full = g.to_full();
        let wrong_inverse = Metric::identity().to_full();
        assert!(Metric::from_cached(&full, &wrong_inverse, g.determinant()).is_err());
        let ok = Metric::from_cached(&full, &g.inverse_full(), g.determinant()).unwrap();
        assert_eq!(ok, g);
    }
}
