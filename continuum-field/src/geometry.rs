// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Geometry of the adaptive metric
//!
//! The manifold carries g(x) = G + h(x)·I with h = α|Φ(x)|² and G the field's
//! constant global metric. Everything below follows from the field jet
//! (Φ, ∇Φ, HΦ) at a point. With A = g⁻¹, B = A² and
//!
//!   ∇h   = 2α Re(Φ̄ ∇Φ)
//!   Hh   = 2α Re(∂Φ̄ ⊗ ∂Φ + Φ̄ HΦ)
//!
//! the operators are closed-form:
//!
//!   Δ_g Φ    = tr(A HΦ) − (B∇h)·∇Φ + ½ tr(A) (A∇h)·∇Φ
//!   Γ^k_ij   = ½ (A_kj h_i + A_ki h_j − δ_ij (A∇h)_k)
//!   ∂_m A    = −h_m B
//!   R_ij     = ∂_k Γ^k_ij − ∂_j Γ^k_ik + Γ^k_kl Γ^l_ij − Γ^k_jl Γ^l_ik
//!   R        = A_ij R_ij
//!
//! Curvature is accumulated in f64. For G = I the metric is conformally flat
//! and R reduces to −(10 Δf + 20 |∇f|²)/(1+h) with f = ½ ln(1+h); the leading
//! term in α is −α|Φ|², exposed as [`ricci_leading_order`].

use continuum_math::{MathError, Metric, Point, DIM};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};
use crate::field::{FieldJet, RbfField};

/// Midpoint samples along a segment for geodesic length.
pub const GEODESIC_SAMPLES: usize = 8;

const D3: usize = DIM * DIM * DIM;

#[inline]
fn idx3(k: usize, i: usize, j: usize) -> usize {
    (k * DIM + i) * DIM + j
}

#[inline]
fn delta(i: usize, j: usize) -> f64 {
    if i == j {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Pointwise geometry
// ---------------------------------------------------------------------------

/// Adaptive metric and its first derivatives at one point.
#[derive(Debug, Clone)]
pub struct LocalGeometry {
    pub jet: FieldJet,
    /// h = α|Φ|²
    pub h: f64,
    pub grad_h: [f64; DIM],
    /// g = G + h·I
    pub metric: [[f64; DIM]; DIM],
    /// A = g⁻¹
    pub inverse: [[f64; DIM]; DIM],
    alpha: f64,
}

impl LocalGeometry {
    pub fn at(field: &RbfField, x: &Point) -> FieldResult<Self> {
        Self::from_jet(field, field.jet(x))
    }

    /// Build from a jet the caller already evaluated at the point.
    pub fn from_jet(field: &RbfField, jet: FieldJet) -> FieldResult<Self> {
        let alpha = field.adaptive_alpha() as f64;
        let h = alpha * jet.norm_sq();
        let mut grad_h = [0.0f64; DIM];
        for (i, gh) in grad_h.iter_mut().enumerate() {
            *gh = 2.0 * alpha * (jet.value.conj() * jet.gradient[i]).re;
        }

        let global = field.global_metric();
        let mut metric = [[0.0f64; DIM]; DIM];
        for (i, row) in metric.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = global.get(i, j) as f64 + h * delta(i, j);
            }
        }
        if !h.is_finite() {
            return Err(FieldError::Math(MathError::NonFinite { index: 0 }));
        }

        let inverse = if global.is_identity(0.0) {
            let s = 1.0 / (1.0 + h);
            let mut a = [[0.0f64; DIM]; DIM];
            for (i, row) in a.iter_mut().enumerate() {
                row[i] = s;
            }
            a
        } else {
            let inv = DMatrix::from_fn(DIM, DIM, |i, j| metric[i][j])
                .try_inverse()
                .ok_or(MathError::Singular)?;
            let mut a = [[0.0f64; DIM]; DIM];
            for (i, row) in a.iter_mut().enumerate() {
                for (j, v) in row.iter_mut().enumerate() {
                    *v = inv[(i, j)];
                }
            }
            a
        };

        Ok(Self {
            jet,
            h,
            grad_h,
            metric,
            inverse,
            alpha,
        })
    }

    fn inverse_times(&self, v: &[f64; DIM]) -> [f64; DIM] {
        let mut out = [0.0f64; DIM];
        for (k, o) in out.iter_mut().enumerate() {
            *o = (0..DIM).map(|l| self.inverse[k][l] * v[l]).sum();
        }
        out
    }

    fn inverse_squared(&self) -> [[f64; DIM]; DIM] {
        let mut b = [[0.0f64; DIM]; DIM];
        for (i, row) in b.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (0..DIM).map(|l| self.inverse[i][l] * self.inverse[l][j]).sum();
            }
        }
        b
    }

    /// tr(A·M) for a constant metric M.
    pub fn trace_with(&self, m: &Metric) -> f64 {
        let mut acc = 0.0f64;
        for i in 0..DIM {
            for j in 0..DIM {
                acc += self.inverse[i][j] * m.get(j, i) as f64;
            }
        }
        acc
    }

    /// Hessian of h = α|Φ|².
    pub fn hess_h(&self) -> [[f64; DIM]; DIM] {
        let j = &self.jet;
        let mut hh = [[0.0f64; DIM]; DIM];
        for m in 0..DIM {
            for n in m..DIM {
                let v = 2.0
                    * self.alpha
                    * (j.gradient[m].conj() * j.gradient[n] + j.value.conj() * j.hessian[m][n]).re;
                hh[m][n] = v;
                hh[n][m] = v;
            }
        }
        hh
    }

    /// Δ_g Φ
    pub fn laplacian(&self) -> Complex<f64> {
        let jet = &self.jet;
        let mut second = Complex::new(0.0f64, 0.0);
        for i in 0..DIM {
            for j in 0..DIM {
                second += jet.hessian[i][j] * self.inverse[i][j];
            }
        }
        if self.alpha == 0.0 {
            return second;
        }

        let v = self.inverse_times(&self.grad_h);
        let b = self.inverse_squared();
        let tr_a: f64 = (0..DIM).map(|i| self.inverse[i][i]).sum();
        let mut first = Complex::new(0.0f64, 0.0);
        for j in 0..DIM {
            let b_grad: f64 = (0..DIM).map(|i| b[j][i] * self.grad_h[i]).sum();
            first += jet.gradient[j] * (0.5 * tr_a * v[j] - b_grad);
        }
        second + first
    }

    /// Γ^k_ij of the Levi-Civita connection of g.
    pub fn christoffel(&self) -> Christoffel {
        let v = self.inverse_times(&self.grad_h);
        let gh = &self.grad_h;
        let mut components = vec![0.0f64; D3];
        for k in 0..DIM {
            for i in 0..DIM {
                for j in 0..DIM {
                    components[idx3(k, i, j)] = 0.5
                        * (self.inverse[k][j] * gh[i] + self.inverse[k][i] * gh[j] - delta(i, j) * v[k]);
                }
            }
        }
        Christoffel { components }
    }

    /// Scalar curvature of g.
    pub fn ricci_scalar(&self) -> f64 {
        if self.alpha == 0.0 {
            return 0.0;
        }
        let gamma = self.christoffel();
        let a = &self.inverse;
        let b = self.inverse_squared();
        let gh = &self.grad_h;
        let hh = self.hess_h();

        let mut b_gh = [0.0f64; DIM];
        for (k, o) in b_gh.iter_mut().enumerate() {
            *o = (0..DIM).map(|l| b[k][l] * gh[l]).sum();
        }
        let mut a_hh = [[0.0f64; DIM]; DIM];
        for k in 0..DIM {
            for m in 0..DIM {
                a_hh[k][m] = (0..DIM).map(|l| a[k][l] * hh[l][m]).sum();
            }
        }

        // ∂_m Γ^k_ij
        let d_gamma = |m: usize, k: usize, i: usize, j: usize| -> f64 {
            0.5 * (-gh[m] * b[k][j] * gh[i] + a[k][j] * hh[i][m] - gh[m] * b[k][i] * gh[j]
                + a[k][i] * hh[j][m]
                - delta(i, j) * (-gh[m] * b_gh[k] + a_hh[k][m]))
        };

        // Γ^k_kl, contracted once
        let mut trace_gamma = [0.0f64; DIM];
        for (l, t) in trace_gamma.iter_mut().enumerate() {
            *t = (0..DIM).map(|k| gamma.get(k, k, l)).sum();
        }

        let mut scalar = 0.0f64;
        for i in 0..DIM {
            for j in 0..DIM {
                let mut r_ij = 0.0f64;
                for k in 0..DIM {
                    r_ij += d_gamma(k, k, i, j) - d_gamma(j, k, i, k);
                }
                for l in 0..DIM {
                    r_ij += trace_gamma[l] * gamma.get(l, i, j);
                    for k in 0..DIM {
                        r_ij -= gamma.get(k, j, l) * gamma.get(l, i, k);
                    }
                }
                scalar += a[i][j] * r_ij;
            }
        }
        scalar
    }
}

// ---------------------------------------------------------------------------
// Connection and torsion tensors
// ---------------------------------------------------------------------------

/// Christoffel symbols Γ^k_ij, indexed (k, i, j).
#[derive(Debug, Clone, PartialEq)]
pub struct Christoffel {
    components: Vec<f64>,
}

impl Christoffel {
    #[inline]
    pub fn get(&self, k: usize, i: usize, j: usize) -> f64 {
        self.components[idx3(k, i, j)]
    }

    /// T^k_ij = Γ^k_ij − Γ^k_ji
    pub fn antisymmetric_part(&self) -> TorsionTensor {
        TorsionTensor::from_fn(|k, i, j| (self.get(k, i, j) - self.get(k, j, i)) as f32)
    }
}

/// Rank-3 tensor T^k_ij antisymmetric in (i, j).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorsionTensor {
    components: Vec<f32>,
}

impl TorsionTensor {
    pub fn zero() -> Self {
        Self {
            components: vec![0.0; D3],
        }
    }

    /// Antisymmetrized ½(f(k,i,j) − f(k,j,i)).
    pub fn from_fn(f: impl Fn(usize, usize, usize) -> f32) -> Self {
        let mut t = Self::zero();
        for k in 0..DIM {
            for i in 0..DIM {
                for j in 0..DIM {
                    t.components[idx3(k, i, j)] = 0.5 * (f(k, i, j) - f(k, j, i));
                }
            }
        }
        t
    }

    /// Set T^k_ij = value and T^k_ji = −value.
    pub fn with_component(mut self, k: usize, i: usize, j: usize, value: f32) -> FieldResult<Self> {
        if k >= DIM || i >= DIM || j >= DIM {
            return Err(FieldError::InvalidInput(format!(
                "torsion index ({}, {}, {}) out of range",
                k, i, j
            )));
        }
        if !value.is_finite() {
            return Err(FieldError::InvalidInput(format!("non-finite torsion {}", value)));
        }
        if i == j {
            return Ok(self);
        }
        self.components[idx3(k, i, j)] = value;
        self.components[idx3(k, j, i)] = -value;
        Ok(self)
    }

    #[inline]
    pub fn get(&self, k: usize, i: usize, j: usize) -> f32 {
        self.components[idx3(k, i, j)]
    }

    /// ‖T‖ = √(½ Σ (T^k_ij)²), each independent component counted once.
    pub fn norm(&self) -> f32 {
        let sum: f64 = self.components.iter().map(|&t| (t as f64) * (t as f64)).sum();
        (0.5 * sum).sqrt() as f32
    }

    pub fn add(&self, other: &TorsionTensor) -> TorsionTensor {
        let components = self
            .components
            .iter()
            .zip(other.components.iter())
            .map(|(a, b)| a + b)
            .collect();
        TorsionTensor { components }
    }

    pub fn max_abs(&self) -> f32 {
        self.components.iter().fold(0.0f32, |m, t| m.max(t.abs()))
    }
}

impl Default for TorsionTensor {
    fn default() -> Self {
        Self::zero()
    }
}

// ---------------------------------------------------------------------------
// Field-level operators
// ---------------------------------------------------------------------------

/// g(x) as a validated [`Metric`].
pub fn metric_at(field: &RbfField, x: &Point) -> FieldResult<Metric> {
    let geo = LocalGeometry::at(field, x)?;
    let full: Vec<f32> = geo
        .metric
        .iter()
        .flat_map(|r| r.iter().map(|&v| v as f32))
        .collect();
    Ok(Metric::from_full(&full)?)
}

/// Δ_g Φ(x)
pub fn laplacian(field: &RbfField, x: &Point) -> FieldResult<Complex<f32>> {
    let l = LocalGeometry::at(field, x)?.laplacian();
    Ok(Complex::new(l.re as f32, l.im as f32))
}

pub fn christoffel(field: &RbfField, x: &Point) -> FieldResult<Christoffel> {
    Ok(LocalGeometry::at(field, x)?.christoffel())
}

/// Exact scalar curvature R(x).
pub fn ricci_scalar(field: &RbfField, x: &Point) -> FieldResult<f32> {
    Ok(LocalGeometry::at(field, x)?.ricci_scalar() as f32)
}

/// R ≈ −α|Φ(x)|²
pub fn ricci_leading_order(field: &RbfField, x: &Point) -> f32 {
    -field.adaptive_alpha() * field.evaluate(x).norm_sqr()
}

/// Full torsion at x: the connection's antisymmetric part plus any torsion
/// injected on the field.
pub fn torsion(field: &RbfField, x: &Point) -> FieldResult<TorsionTensor> {
    let own = christoffel(field, x)?.antisymmetric_part();
    Ok(match field.torsion() {
        Some(injected) => own.add(injected),
        None => own,
    })
}

/// T_term(x) = i·‖T(x)‖·Φ(x)
pub fn torsion_term(field: &RbfField, x: &Point) -> FieldResult<Complex<f32>> {
    let norm = torsion(field, x)?.norm();
    Ok(torsion_term_from(norm, field.evaluate(x)))
}

#[inline]
pub(crate) fn torsion_term_from(norm: f32, phi: Complex<f32>) -> Complex<f32> {
    Complex::new(0.0, norm) * phi
}

/// d_g(p, q) with [`GEODESIC_SAMPLES`] midpoint samples.
pub fn geodesic_distance(field: &RbfField, p: &Point, q: &Point) -> f32 {
    geodesic_distance_with(field, p, q, GEODESIC_SAMPLES)
}

/// Length of the straight segment p→q under the pointwise metric,
///
///   L = Σ_s √(Δᵀ g(x_s) Δ) / n,   x_s = p + (s + ½)/n · Δ
///
/// Euclidean when g is flat. Endpoints are put in a canonical order first so
/// the result is exactly symmetric.
pub fn geodesic_distance_with(field: &RbfField, p: &Point, q: &Point, samples: usize) -> f32 {
    let (a, b) = if lexicographic_le(p, q) { (p, q) } else { (q, p) };
    let global = field.global_metric();
    let alpha = field.adaptive_alpha();
    if alpha == 0.0 && global.is_identity(1e-7) {
        return a.distance_euclid(b);
    }

    let d = b.delta(a);
    let base = global.quadratic_form(&d) as f64;
    if alpha == 0.0 {
        return base.max(0.0).sqrt() as f32;
    }
    let d_sq: f64 = d.iter().map(|&v| (v as f64) * (v as f64)).sum();
    let n = samples.max(1);
    let mut length = 0.0f64;
    for s in 0..n {
        let t = (s as f32 + 0.5) / n as f32;
        let x = a.lerp(b, t);
        let h = alpha as f64 * field.evaluate(&x).norm_sqr() as f64;
        length += (base + h * d_sq).max(0.0).sqrt();
    }
    (length / n as f64) as f32
}

fn lexicographic_le(p: &Point, q: &Point) -> bool {
    for (a, b) in p.coords().iter().zip(q.coords().iter()) {
        match a.total_cmp(b) {
            std::cmp::Ordering::Less => return true,
            std::cmp::Ordering::Greater => return false,
            std::cmp::Ordering::Equal => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn pt(c: [f32; DIM]) -> Point {
        Point::new(c).unwrap()
    }

    fn blob_field(alpha: f32) -> RbfField {
        let mut field = RbfField::with_metric(16, 2.0, Metric::identity(), alpha).unwrap();
        field
            .add_center(pt([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]), Complex::new(1.2, 0.3), 0.4)
            .unwrap();
        field
            .add_center(pt([0.3, -0.1, 0.1, 1.1, 0.2, 0.4]), Complex::new(-0.5, 0.8), 0.35)
            .unwrap();
        field
            .add_center(pt([-0.2, 0.25, 0.0, 0.9, -0.1, 0.45]), Complex::new(0.7, -0.6), 0.5)
            .unwrap();
        field
    }

    #[test]
    fn test_single_center_flat_laplacian() {
        let mut field = RbfField::new(4, 2.0).unwrap();
        let p = pt([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]);
        field.add_center(p, Complex::new(1.0, 0.0), 0.5).unwrap();
        let l = laplacian(&field, &p).unwrap();
        // ΔG = (r²/σ⁴ − n/σ²) G, r = 0
        assert!((l.re - (-6.0 / 0.25)).abs() < 1e-4, "Δ = {}", l);
        assert!(l.im.abs() < 1e-9);
    }

    #[test]
    fn test_laplacian_matches_divergence_form() {
        let field = blob_field(0.6);
        let x = pt([0.05, 0.02, 0.01, 1.0, 0.05, 0.41]);
        let analytic = LocalGeometry::at(&field, &x).unwrap().laplacian();

        // (1/√det g) ∂_i (√det g A_ij ∂_j Φ) by central differences on the flux
        let flux = |y: &Point, i: usize| -> Complex<f64> {
            let geo = LocalGeometry::at(&field, y).unwrap();
            let sqrt_det = (1.0 + geo.h).powi(3);
            let mut f = Complex::new(0.0, 0.0);
            for j in 0..DIM {
                f += geo.jet.gradient[j] * geo.inverse[i][j];
            }
            f * sqrt_det
        };
        let step = 2e-3f32;
        let mut div = Complex::new(0.0f64, 0.0);
        for i in 0..DIM {
            let mut e = [0.0f32; DIM];
            e[i] = step;
            let mut e_neg = [0.0f32; DIM];
            e_neg[i] = -step;
            let xp = x.offset(&e).unwrap();
            let xm = x.offset(&e_neg).unwrap();
            let width = (xp.get(i) - xm.get(i)) as f64;
            div += (flux(&xp, i) - flux(&xm, i)) / width;
        }
        let h0 = LocalGeometry::at(&field, &x).unwrap().h;
        let numeric = div / (1.0 + h0).powi(3);
        let err = (numeric - analytic).norm();
        assert!(
            err < 1e-2 * analytic.norm().max(1.0),
            "analytic {} vs divergence form {}",
            analytic,
            numeric
        );
    }

    #[test]
    fn test_ricci_matches_conformal_formula() {
        let field = blob_field(0.5);
        let x = pt([0.1, 0.05, -0.02, 1.02, 0.03, 0.4]);
        let geo = LocalGeometry::at(&field, &x).unwrap();
        let exact = geo.ricci_scalar();

        let hh = geo.hess_h();
        let grad_sq: f64 = geo.grad_h.iter().map(|v| v * v).sum();
        let lap_h: f64 = (0..DIM).map(|i| hh[i][i]).sum();
        let s = 1.0 + geo.h;
        let grad_f_sq = grad_sq / (4.0 * s * s);
        let lap_f = lap_h / (2.0 * s) - grad_sq / (2.0 * s * s);
        let conformal = -(10.0 * lap_f + 20.0 * grad_f_sq) / s;

        assert!(
            (exact - conformal).abs() < 1e-8 * conformal.abs().max(1.0),
            "exact {} vs conformal {}",
            exact,
            conformal
        );
    }

    #[test]
    fn test_flat_field_has_no_curvature() {
        let field = blob_field(0.0);
        let x = pt([0.1, 0.0, 0.0, 1.0, 0.0, 0.4]);
        assert_eq!(ricci_scalar(&field, &x).unwrap(), 0.0);
        let gamma = christoffel(&field, &x).unwrap();
        for k in 0..DIM {
            for i in 0..DIM {
                for j in 0..DIM {
                    assert_eq!(gamma.get(k, i, j), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_leading_order_tracks_exact_for_small_alpha() {
        let field = blob_field(1e-3);
        let x = pt([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]);
        let lead = ricci_leading_order(&field, &x);
        let phi = field.evaluate(&x);
        assert!((lead + 1e-3 * phi.norm_sqr()).abs() < 1e-9);
        let exact = ricci_scalar(&field, &x).unwrap();
        assert!(exact.is_finite());
        assert!(exact.abs() < 1.0, "small α keeps curvature small, got {}", exact);
    }

    #[test]
    fn test_levi_civita_is_torsion_free() {
        let field = blob_field(0.4);
        let x = pt([0.05, 0.1, 0.0, 1.0, 0.0, 0.4]);
        let t = torsion(&field, &x).unwrap();
        assert!(t.max_abs() < 1e-12);
        assert!(torsion_term(&field, &x).unwrap().norm() < 1e-12);
    }

    #[test]
    fn test_injected_torsion_rotates_phase() {
        let mut field = blob_field(0.0);
        let injected = TorsionTensor::zero().with_component(2, 0, 1, 0.5).unwrap();
        assert_eq!(injected.get(2, 1, 0), -0.5);
        assert!((injected.norm() - 0.5).abs() < 1e-6);
        field.set_torsion(Some(injected));

        let x = pt([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]);
        let phi = field.evaluate(&x);
        let term = torsion_term(&field, &x).unwrap();
        let expected = Complex::new(0.0, 0.5) * phi;
        assert!((term - expected).norm() < 1e-6);
        // i·Φ is orthogonal to Φ
        assert!((term * phi.conj()).re.abs() < 1e-6);
    }

    #[test]
    fn test_metric_at_is_valid() {
        let field = blob_field(0.8);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let x = pt([
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                1.0,
                rng.gen_range(-0.5..0.5),
                0.4,
            ]);
            let g = metric_at(&field, &x).unwrap();
            assert!(g.determinant() > 0.0);
            assert!(g.inverse_deviation() < 1e-6, "deviation {}", g.inverse_deviation());
        }
    }

    #[test]
    fn test_geodesic_flat_is_euclidean() {
        let field = blob_field(0.0);
        let p = pt([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]);
        let q = pt([0.3, 0.4, 0.0, 1.0, 0.0, 0.4]);
        assert!((geodesic_distance(&field, &p, &q) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_geodesic_symmetric_and_stretched() {
        let field = blob_field(2.0);
        let p = pt([-0.3, 0.0, 0.0, 1.0, 0.0, 0.4]);
        let q = pt([0.3, 0.1, 0.0, 1.0, 0.0, 0.4]);
        let pq = geodesic_distance(&field, &p, &q);
        let qp = geodesic_distance(&field, &q, &p);
        assert_eq!(pq, qp);
        assert!(pq > p.distance_euclid(&q), "|Φ|² stretches lengths");
        assert_eq!(geodesic_distance(&field, &p, &p), 0.0);
    }

    #[test]
    fn test_geodesic_triangle_inequality() {
        let field = blob_field(0.5);
        let mut rng = StdRng::seed_from_u64(12);
        let mut rand_pt = || {
            pt([
                rng.gen_range(-0.6..0.6),
                rng.gen_range(-0.6..0.6),
                rng.gen_range(-0.2..0.2),
                1.0,
                0.0,
                0.4,
            ])
        };
        for _ in 0..30 {
            let (p, q, r) = (rand_pt(), rand_pt(), rand_pt());
            let direct = geodesic_distance(&field, &p, &q);
            let via = geodesic_distance(&field, &p, &r) + geodesic_distance(&field, &r, &q);
            assert!(direct <= via * 1.05 + 1e-4, "d(p,q) {} > d(p,r)+d(r,q) {}", direct, via);
        }
    }

    #[test]
    fn test_anisotropic_global_metric() {
        let mut diag = [1.0f32; DIM];
        diag[1] = 4.0;
        let g = Metric::diagonal(&diag).unwrap();
        let field = RbfField::with_metric(4, 2.0, g, 0.0).unwrap();
        let p = pt([0.0, 0.0, 0.0, 1.0, 0.0, 0.4]);
        let q = pt([0.0, 0.5, 0.0, 1.0, 0.0, 0.4]);
        assert!((geodesic_distance(&field, &p, &q) - 1.0).abs() < 1e-6);
        let geo = LocalGeometry::at(&field, &p).unwrap();
        assert!((geo.inverse[1][1] - 0.25).abs() < 1e-12);
    }
}
