// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Dissonance and self-representation monitor
//!
//! Scalar reductions over Φ, recomputed on demand and stamped with the field
//! version they were taken at:
//!
//!   coherence    mean phase alignment over the first N center pairs (i < j)
//!   local        1 − coherence of the centers within d_g ≤ r of a sample point
//!   global       0.6·(1 − coherence) + 0.4·mean(local)
//!   reflexivity  Φ evaluated at points displaced by Φ itself, twice
//!   topology     Union-Find clusters, see [`crate::topology`]
//!
//! Every reduction is deterministic for a given field state and sample list.

use continuum_math::{complex, Point, DIM};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::field::{RbfField, VersionToken};
use crate::geometry::geodesic_distance;
use crate::topology::{TopologyReport, TopologyTracker};

/// Monitor tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorParams {
    /// Center pairs sampled for coherence
    pub coherence_pairs: usize,
    /// Sample points (first centers) for local dissonance
    pub local_samples: usize,
    /// Geodesic neighbourhood radius for local dissonance
    pub local_radius: f32,
    /// Weight of 1 − coherence in global dissonance
    pub coherence_weight: f32,
    /// Weight of mean local dissonance in global dissonance
    pub local_weight: f32,
    /// Sample points (first centers) for reflexivity
    pub reflexivity_samples: usize,
    /// Displacement scale ε for Φ(Φ)
    pub reflexivity_epsilon: f32,
    /// Euclidean clustering threshold
    pub cluster_threshold: f32,
}

impl Default for MonitorParams {
    fn default() -> Self {
        Self {
            coherence_pairs: 20,
            local_samples: 10,
            local_radius: 1.0,
            coherence_weight: 0.6,
            local_weight: 0.4,
            reflexivity_samples: 10,
            reflexivity_epsilon: 0.01,
            cluster_threshold: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Coherence and dissonance
// ---------------------------------------------------------------------------

/// Mean phase alignment over the first `max_pairs` pairs (i < j) of values
/// that carry a phase. An empty pair set is fully coherent.
pub fn phase_coherence(values: &[Complex<f32>], max_pairs: usize) -> f32 {
    let phased: Vec<Complex<f32>> = values.iter().copied().filter(|&c| complex::has_phase(c)).collect();
    let mut sum = 0.0f64;
    let mut count = 0usize;
    'outer: for i in 0..phased.len() {
        for j in (i + 1)..phased.len() {
            if count >= max_pairs {
                break 'outer;
            }
            sum += complex::phase_alignment(phased[i], phased[j]) as f64;
            count += 1;
        }
    }
    if count == 0 {
        1.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Field coherence over center coefficients in insertion order.
pub fn coherence(field: &RbfField, max_pairs: usize) -> f32 {
    phase_coherence(&field.coefficients(), max_pairs)
}

/// Local dissonance at one sample point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalDissonance {
    pub point: Point,
    /// Centers within the geodesic radius
    pub neighbours: usize,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissonanceReport {
    pub version: VersionToken,
    /// Simulated time of the measurement
    pub time: f32,
    pub coherence: f32,
    /// 0.6·(1 − coherence) + 0.4·mean(local), in [0, 1]
    pub global: f32,
    pub local: Vec<LocalDissonance>,
}

impl DissonanceReport {
    pub fn mean_local(&self) -> f32 {
        if self.local.is_empty() {
            0.0
        } else {
            self.local.iter().map(|l| l.value).sum::<f32>() / self.local.len() as f32
        }
    }
}

/// 1 − coherence of the centers within geodesic distance `radius` of `p`;
/// zero with fewer than two neighbours.
pub fn local_dissonance(field: &RbfField, p: &Point, radius: f32, max_pairs: usize) -> LocalDissonance {
    // g ≥ G, so d_g ≤ r implies Euclidean distance ≤ r / √λmin(G)
    let lambda = field.global_metric().min_eigenvalue().max(f32::MIN_POSITIVE);
    let euclid = radius / lambda.sqrt() * (1.0 + 1e-4) + 1e-6;
    let neighbours: Vec<Complex<f32>> = field
        .neighbors_within(p, euclid)
        .into_iter()
        .filter(|&j| geodesic_distance(field, p, field.centers()[j].point()) <= radius)
        .map(|j| field.centers()[j].coeff())
        .collect();
    let value = if neighbours.len() < 2 {
        0.0
    } else {
        (1.0 - phase_coherence(&neighbours, max_pairs)).clamp(0.0, 1.0)
    };
    LocalDissonance {
        point: *p,
        neighbours: neighbours.len(),
        value,
    }
}

/// Dissonance sampled at the first `params.local_samples` center positions.
pub fn dissonance(field: &RbfField, params: &MonitorParams) -> DissonanceReport {
    let samples: Vec<Point> = field
        .centers()
        .iter()
        .take(params.local_samples)
        .map(|c| *c.point())
        .collect();
    dissonance_at(field, params, &samples)
}

/// Dissonance with an explicit sample-point list.
pub fn dissonance_at(field: &RbfField, params: &MonitorParams, samples: &[Point]) -> DissonanceReport {
    let coherence = coherence(field, params.coherence_pairs);
    let local: Vec<LocalDissonance> = samples
        .iter()
        .map(|p| local_dissonance(field, p, params.local_radius, params.coherence_pairs))
        .collect();
    let mut report = DissonanceReport {
        version: field.token(),
        time: field.time(),
        coherence,
        global: 0.0,
        local,
    };
    let global = params.coherence_weight * (1.0 - coherence) + params.local_weight * report.mean_local();
    report.global = global.clamp(0.0, 1.0);
    report
}

// ---------------------------------------------------------------------------
// Reflexivity Φ(Φ)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflexivityReport {
    /// clamp(1 − ‖v1 − v0‖/‖v0‖) · (0.8 + 0.2·cross_modal)
    pub score: f32,
    /// Mean |Re(v0·v̄1)| / (|v0||v1|)
    pub cross_modal: f32,
    /// 1 / (1 + mean |v1 − v0|)
    pub self_awareness: f32,
    /// 1 / (1 + mean |v2 − v1|)
    pub meta_cognition: f32,
    pub samples: usize,
}

/// δ(v): every axis moves by ε·Re(v), the spatial axes also by ½ε·Im(v).
fn self_displacement(v: Complex<f32>, epsilon: f32) -> [f32; DIM] {
    let mut d = [epsilon * v.re; DIM];
    for x in d.iter_mut().take(3) {
        *x += 0.5 * epsilon * v.im;
    }
    d
}

/// Φ at a point displaced by δ(v); falls back to Φ(p) if the displaced point
/// is not representable.
fn reflect(field: &RbfField, p: &Point, v: Complex<f32>, epsilon: f32) -> Complex<f32> {
    match p.offset(&self_displacement(v, epsilon)) {
        Ok(q) => field.evaluate(&q),
        Err(_) => field.evaluate(p),
    }
}

/// Reflexivity sampled at the first `params.reflexivity_samples` center positions.
pub fn reflexivity(field: &RbfField, params: &MonitorParams) -> ReflexivityReport {
    let samples: Vec<Point> = field
        .centers()
        .iter()
        .take(params.reflexivity_samples)
        .map(|c| *c.point())
        .collect();
    reflexivity_at(field, params.reflexivity_epsilon, &samples)
}

/// v0 = Φ(p), v1 = Φ(p + δ(v0)), v2 = Φ(p + δ(v1)) over `samples`.
pub fn reflexivity_at(field: &RbfField, epsilon: f32, samples: &[Point]) -> ReflexivityReport {
    if samples.is_empty() {
        return ReflexivityReport {
            score: 0.0,
            cross_modal: 0.0,
            self_awareness: 1.0,
            meta_cognition: 1.0,
            samples: 0,
        };
    }
    let v0: Vec<Complex<f32>> = samples.iter().map(|p| field.evaluate(p)).collect();
    let v1: Vec<Complex<f32>> = samples
        .iter()
        .zip(v0.iter())
        .map(|(p, &v)| reflect(field, p, v, epsilon))
        .collect();
    let v2: Vec<Complex<f32>> = samples
        .iter()
        .zip(v1.iter())
        .map(|(p, &v)| reflect(field, p, v, epsilon))
        .collect();

    let n = samples.len() as f64;
    let norm0 = complex::norm_sq_sum(&v0).sqrt();
    let diff01 = complex::l2_distance(&v1, &v0);
    let base = if norm0 > 0.0 {
        (1.0 - diff01 / norm0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cross_modal = v0
        .iter()
        .zip(v1.iter())
        .map(|(&a, &b)| complex::phase_correlation(a, b) as f64)
        .sum::<f64>()
        / n;
    let mean_01 = v0.iter().zip(v1.iter()).map(|(a, b)| (a - b).norm() as f64).sum::<f64>() / n;
    let mean_12 = v1.iter().zip(v2.iter()).map(|(a, b)| (a - b).norm() as f64).sum::<f64>() / n;

    ReflexivityReport {
        score: (base * (0.8 + 0.2 * cross_modal)) as f32,
        cross_modal: cross_modal as f32,
        self_awareness: (1.0 / (1.0 + mean_01)) as f32,
        meta_cognition: (1.0 / (1.0 + mean_12)) as f32,
        samples: samples.len(),
    }
}

// ---------------------------------------------------------------------------
// Full monitor
// ---------------------------------------------------------------------------

/// Everything the monitor measures, at one field version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub version: VersionToken,
    pub time: f32,
    pub num_centers: usize,
    pub energy: f64,
    pub coherence: f32,
    pub dissonance: DissonanceReport,
    pub reflexivity: ReflexivityReport,
    pub topology: TopologyReport,
    /// Centers with at least one pending numerical fault
    pub faulted_centers: usize,
    /// Centers marked for removal
    pub marked_centers: usize,
}

/// Stateful monitor: parameters plus the topology stability history.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub params: MonitorParams,
    topology: TopologyTracker,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitorParams::default())
    }
}

impl Monitor {
    pub fn new(params: MonitorParams) -> Self {
        Self {
            params,
            topology: TopologyTracker::new(params.cluster_threshold),
        }
    }

    pub fn dissonance(&self, field: &RbfField) -> DissonanceReport {
        dissonance(field, &self.params)
    }

    pub fn measure(&mut self, field: &RbfField) -> MonitorReport {
        let dissonance = dissonance(field, &self.params);
        MonitorReport {
            version: field.token(),
            time: field.time(),
            num_centers: field.len(),
            energy: field.energy(),
            coherence: dissonance.coherence,
            reflexivity: reflexivity(field, &self.params),
            topology: self.topology.observe(field),
            faulted_centers: field.centers().iter().filter(|c| c.fault_count() > 0).count(),
            marked_centers: field.marked_count(),
            dissonance,
        }
    }

    pub fn reset(&mut self) {
        self.topology.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f32, y: f32) -> Point {
        Point::new([x, y, 0.0, 1.0, 0.0, 0.4]).unwrap()
    }

    fn field_with(coeffs: &[Complex<f32>]) -> RbfField {
        let mut field = RbfField::new(64, 2.0).unwrap();
        for (i, &c) in coeffs.iter().enumerate() {
            field.add_center(pt(0.05 * i as f32, 0.0), c, 0.2).unwrap();
        }
        field
    }

    #[test]
    fn test_coherence_aligned_and_opposed() {
        let aligned = field_with(&[Complex::new(1.0, 0.0); 5]);
        assert!((coherence(&aligned, 20) - 1.0).abs() < 1e-6);

        let mut mixed = vec![Complex::new(-1.0, 0.0); 8];
        mixed[0] = Complex::new(1.0, 0.0);
        // 7 opposed pairs (0, j), 13 aligned pairs among the rest
        let c = coherence(&field_with(&mixed), 20);
        assert!((c - 13.0 / 20.0).abs() < 1e-6, "coherence {}", c);
    }

    #[test]
    fn test_coherence_skips_phaseless_and_empty() {
        let field = field_with(&[Complex::new(0.0, 0.0), Complex::new(1.0, 0.0)]);
        assert_eq!(coherence(&field, 20), 1.0);
        assert_eq!(coherence(&field_with(&[]), 20), 1.0);
    }

    #[test]
    fn test_pair_cap() {
        let mut values = vec![Complex::new(1.0f32, 0.0); 30];
        values[29] = Complex::new(-1.0, 0.0);
        // center 29 only appears in pairs beyond the first 20
        assert_eq!(phase_coherence(&values, 20), 1.0);
    }

    #[test]
    fn test_dissonance_bounds_and_weights() {
        // more than 20 opposed pairs (0, j) fill the whole sample
        let mut coeffs = vec![Complex::new(-1.0, 0.0); 24];
        coeffs[0] = Complex::new(1.0, 0.0);
        let field = field_with(&coeffs);
        let report = dissonance(&field, &MonitorParams::default());
        assert!(report.global >= 0.0 && report.global <= 1.0);
        assert_eq!(report.local.len(), 10);
        let expected = 0.6 * (1.0 - report.coherence) + 0.4 * report.mean_local();
        assert!((report.global - expected).abs() < 1e-6);
        assert!(report.coherence < 1e-6);
        assert!(report.global > 0.95, "one flipped center in a tight cluster, d = {}", report.global);
        assert_eq!(report.version, field.token());
    }

    #[test]
    fn test_local_dissonance_needs_two_neighbours() {
        let mut field = RbfField::new(4, 2.0).unwrap();
        field.add_center(pt(0.0, 0.0), Complex::new(1.0, 0.0), 0.1).unwrap();
        field.add_center(pt(5.0, 0.0), Complex::new(-1.0, 0.0), 0.1).unwrap();
        let local = local_dissonance(&field, &pt(0.0, 0.0), 1.0, 20);
        assert_eq!(local.neighbours, 1);
        assert_eq!(local.value, 0.0);
    }

    #[test]
    fn test_deterministic() {
        let mut coeffs = vec![Complex::new(0.3, 0.7); 9];
        coeffs[4] = Complex::new(-0.2, 0.1);
        let field = field_with(&coeffs);
        let mut m1 = Monitor::default();
        let mut m2 = Monitor::default();
        assert_eq!(m1.measure(&field), m2.measure(&field));
    }

    #[test]
    fn test_reflexivity_of_smooth_field() {
        let field = field_with(&[Complex::new(0.1, 0.0); 6]);
        let r = reflexivity(&field, &MonitorParams::default());
        assert_eq!(r.samples, 6);
        assert!(r.score > 0.95 && r.score <= 1.0, "score {}", r.score);
        assert!(r.cross_modal > 0.99);
        assert!(r.self_awareness > 0.9 && r.meta_cognition > 0.9);
    }

    #[test]
    fn test_reflexivity_empty_field() {
        let r = reflexivity(&field_with(&[]), &MonitorParams::default());
        assert_eq!(r.samples, 0);
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn test_monitor_counts_faults() {
        let mut field = field_with(&[Complex::new(1.0, 0.0); 3]);
        field.commit_coefficients(&[
            Complex::new(f32::NAN, 0.0),
            Complex::new(1.0, 0.0),
            Complex::new(1.0, 0.0),
        ]);
        let report = Monitor::default().measure(&field);
        assert_eq!(report.faulted_centers, 1);
        assert_eq!(report.marked_centers, 0);
        assert_eq!(report.num_centers, 3);
    }
}
