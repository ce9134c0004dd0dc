// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Complex<f32> phase helpers shared by the monitor and the encoders.
//!
//! Phase alignment between two coefficients is
//!
//!   A(a, b) = 1 − |wrap(arg a − arg b)| / π  ∈ [0, 1]
//!
//! with the difference wrapped into [0, π].

use std::f32::consts::PI;

use num_complex::Complex;

/// Magnitude below which a coefficient has no meaningful phase.
pub const PHASE_EPSILON: f32 = 1e-9;

/// Absolute phase difference wrapped into [0, π].
#[inline]
pub fn wrapped_phase_distance(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let d = (a - b).rem_euclid(two_pi);
    if d > PI {
        two_pi - d
    } else {
        d
    }
}

/// 1 − |Δarg| / π for two complex values.
#[inline]
pub fn phase_alignment(a: Complex<f32>, b: Complex<f32>) -> f32 {
    let d = wrapped_phase_distance(a.arg(), b.arg());
    (1.0 - d / PI).clamp(0.0, 1.0)
}

/// Whether a value carries a usable phase.
#[inline]
pub fn has_phase(z: Complex<f32>) -> bool {
    z.norm() > PHASE_EPSILON
}

/// |Re(a·b̄)| / (|a||b| + 1e-6): how strongly two values agree in phase
/// structure, insensitive to a global sign.
#[inline]
pub fn phase_correlation(a: Complex<f32>, b: Complex<f32>) -> f32 {
    let dot = (a * b.conj()).re.abs();
    dot / (a.norm() * b.norm() + 1e-6)
}

/// r·e^{iθ}
#[inline]
pub fn polar(magnitude: f32, phase: f32) -> Complex<f32> {
    Complex::from_polar(magnitude, phase)
}

/// Σ |z_i|², accumulated in f64.
pub fn norm_sq_sum(values: &[Complex<f32>]) -> f64 {
    values.iter().map(|z| z.norm_sqr() as f64).sum()
}

/// ‖a − b‖₂ over two equally long slices, accumulated in f64.
pub fn l2_distance(a: &[Complex<f32>], b: &[Complex<f32>]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm_sqr() as f64)
        .sum::<f64>()
        .sqrt()
}

/// Whether both parts are finite.
#[inline]
pub fn is_finite(z: Complex<f32>) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_is_symmetric() {
        assert!((wrapped_phase_distance(0.1, -0.1) - 0.2).abs() < 1e-6);
        assert!((wrapped_phase_distance(-0.1, 0.1) - 0.2).abs() < 1e-6);
        // +π and −π are the same direction
        assert!(wrapped_phase_distance(PI, -PI).abs() < 1e-6);
        assert!((wrapped_phase_distance(3.0, -3.0) - (2.0 * PI - 6.0)).abs() < 1e-5);
    }

    #[test]
    fn test_alignment_extremes() {
        let one = Complex::new(1.0f32, 0.0);
        let minus = Complex::new(-1.0f32, 0.0);
        let minus_neg_zero = Complex::new(-1.0f32, -0.0);
        assert!((phase_alignment(one, one) - 1.0).abs() < 1e-6);
        assert!(phase_alignment(one, minus).abs() < 1e-6);
        assert!((phase_alignment(minus, minus_neg_zero) - 1.0).abs() < 1e-6);
        let i = Complex::new(0.0f32, 1.0);
        assert!((phase_alignment(one, i) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_phase_correlation_bounds() {
        let a = Complex::new(1.0f32, 1.0);
        let b = Complex::new(-2.0f32, -2.0);
        let c = phase_correlation(a, b);
        assert!(c > 0.99 && c <= 1.0, "anti-parallel values correlate fully, got {}", c);
        let orth = phase_correlation(Complex::new(1.0, 0.0), Complex::new(0.0, 1.0));
        assert!(orth < 1e-6);
    }

    #[test]
    fn test_norms() {
        let v = [Complex::new(3.0f32, 4.0), Complex::new(0.0, 1.0)];
        assert!((norm_sq_sum(&v) - 26.0).abs() < 1e-9);
        let w = [Complex::new(3.0f32, 4.0), Complex::new(0.0, 0.0)];
        assert!((l2_distance(&v, &w) - 1.0).abs() < 1e-9);
    }
}
