// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! RBF Field Store
//!
//! Φ is a sum of Gaussian radial basis functions over an ordered center table:
//!
//!   Φ(x) = Σ_k c_k · ψ_k(x),   ψ_k(x) = exp(−u_k / 2),   u_k = (x − p_k)ᵀ M_k (x − p_k) / σ_k²
//!
//! where M_k is the center's local metric (a copy of the global metric G at
//! insertion time). A center contributes only where u_k ≤ 9, i.e. inside three
//! widths; the discarded tail is bounded by exp(−4.5)·|c_k|.
//!
//! Analytic derivatives per center (d = x − p_k):
//!
//!   ∂_i ψ  = −ψ · (M d)_i / σ²
//!   ∂_ij ψ =  ψ · ((M d)_i (M d)_j / σ⁴ − M_ij / σ²)
//!
//! All sums run in insertion order with f64 accumulators, so results are
//! reproducible for a given insertion history. Candidate centers come from the
//! owned KD-tree when it matches the field version, otherwise from a linear scan.

use continuum_math::{complex, Metric, Point, DIM};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FieldError, FieldResult};
use crate::geometry::TorsionTensor;
use crate::kdtree::{KdTree, KdTreeStats};

/// Kernel cutoff: u = r²/σ² ≤ CUTOFF_U (three widths).
pub const CUTOFF_U: f64 = 9.0;

/// Consecutive faulted steps after which a center is marked for removal.
pub const FAULT_LIMIT: u8 = 2;

/// Largest capacity a field accepts; snapshots store counts as u32.
pub const MAX_CAPACITY: usize = u32::MAX as usize;

// ---------------------------------------------------------------------------
// Center
// ---------------------------------------------------------------------------

/// One Gaussian RBF: position, complex weight, width, local metric.
///
/// Position, width and metric are fixed at creation; only the coefficient
/// changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Center {
    point: Point,
    coeff: Complex<f32>,
    sigma: f32,
    local_metric: Metric,
    faults: u8,
    marked: bool,
}

impl Center {
    pub(crate) fn new(point: Point, coeff: Complex<f32>, sigma: f32, local_metric: Metric) -> Self {
        Self {
            point,
            coeff,
            sigma,
            local_metric,
            faults: 0,
            marked: false,
        }
    }

    #[inline]
    pub fn point(&self) -> &Point {
        &self.point
    }

    #[inline]
    pub fn coeff(&self) -> Complex<f32> {
        self.coeff
    }

    #[inline]
    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    #[inline]
    pub fn local_metric(&self) -> &Metric {
        &self.local_metric
    }

    /// Consecutive evolution steps that produced a non-finite coefficient.
    pub fn fault_count(&self) -> u8 {
        self.faults
    }

    /// Marked for removal at the next controller tick.
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Euclidean radius outside which this center contributes nothing.
    pub fn euclidean_reach(&self) -> f32 {
        let lambda = self.local_metric.min_eigenvalue().max(f32::MIN_POSITIVE);
        3.0 * self.sigma / lambda.sqrt()
    }

    /// u = dᵀ M d / σ² and M d for d = x − p.
    #[inline]
    fn kernel_arg(&self, x: &Point) -> (f64, [f64; DIM]) {
        let d = x.delta(&self.point);
        let mut md = [0.0f64; DIM];
        let mut quad = 0.0f64;
        for i in 0..DIM {
            let mut acc = 0.0f64;
            for j in 0..DIM {
                acc += self.local_metric.get(i, j) as f64 * d[j] as f64;
            }
            md[i] = acc;
            quad += acc * d[i] as f64;
        }
        let s2 = (self.sigma as f64) * (self.sigma as f64);
        (quad / s2, md)
    }

    /// ψ_k(x), zero outside the cutoff.
    pub fn kernel(&self, x: &Point) -> f64 {
        let (u, _) = self.kernel_arg(x);
        if u > CUTOFF_U {
            0.0
        } else {
            (-0.5 * u).exp()
        }
    }
}

// ---------------------------------------------------------------------------
// Value + derivatives
// ---------------------------------------------------------------------------

/// Φ, ∇Φ and the Hessian of Φ at one point, in f64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldJet {
    pub value: Complex<f64>,
    pub gradient: [Complex<f64>; DIM],
    pub hessian: [[Complex<f64>; DIM]; DIM],
}

impl FieldJet {
    pub fn zero() -> Self {
        let z = Complex::new(0.0, 0.0);
        Self {
            value: z,
            gradient: [z; DIM],
            hessian: [[z; DIM]; DIM],
        }
    }

    /// |Φ|²
    pub fn norm_sq(&self) -> f64 {
        self.value.norm_sqr()
    }

    /// ‖∇Φ‖ = √ Σ_i |∂_i Φ|²
    pub fn gradient_norm(&self) -> f64 {
        self.gradient.iter().map(|g| g.norm_sqr()).sum::<f64>().sqrt()
    }

    /// Euclidean Laplacian Σ_i ∂_ii Φ.
    pub fn flat_laplacian(&self) -> Complex<f64> {
        (0..DIM).map(|i| self.hessian[i][i]).sum()
    }
}

// ---------------------------------------------------------------------------
// Index policy and versioning
// ---------------------------------------------------------------------------

/// When the field keeps a KD-tree and how eagerly it rebuilds it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPolicy {
    /// Maintain a KD-tree at all; otherwise every query scans linearly.
    pub enabled: bool,
    /// Rebuild once the unindexed tail exceeds this fraction of the indexed count.
    pub rebuild_fraction: f32,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            rebuild_fraction: 0.1,
        }
    }
}

impl IndexPolicy {
    pub fn linear_scan() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Field version captured by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(pub u64);

/// Outcome of committing a full coefficient vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    /// Centers whose proposed coefficient was non-finite and clamped to zero.
    pub clamped: Vec<usize>,
    /// Centers that reached the fault limit during this commit.
    pub newly_marked: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// The Φ-store: ordered centers, global metric, time and version.
#[derive(Debug, Clone)]
pub struct RbfField {
    centers: Vec<Center>,
    capacity: usize,
    fractal_dim: f32,
    global_metric: Metric,
    adaptive_alpha: f32,
    time: f32,
    version: u64,
    index: Option<KdTree>,
    index_policy: IndexPolicy,
    reach: f32,
    torsion: Option<TorsionTensor>,
}

impl RbfField {
    /// Empty field over the flat metric with α = 0.
    pub fn new(capacity: usize, fractal_dim: f32) -> FieldResult<Self> {
        Self::with_metric(capacity, fractal_dim, Metric::identity(), 0.0)
    }

    /// Empty field with a global metric G and adaptive coefficient α,
    /// g(x) = G + α|Φ(x)|²·I.
    pub fn with_metric(
        capacity: usize,
        fractal_dim: f32,
        global_metric: Metric,
        adaptive_alpha: f32,
    ) -> FieldResult<Self> {
        if !(2.0..3.0).contains(&fractal_dim) {
            return Err(FieldError::InvalidInput(format!(
                "fractal dimension {} outside [2, 3)",
                fractal_dim
            )));
        }
        if capacity > MAX_CAPACITY {
            return Err(FieldError::InvalidInput(format!(
                "capacity {} exceeds {}",
                capacity, MAX_CAPACITY
            )));
        }
        check_alpha(adaptive_alpha)?;
        global_metric.validate()?;
        Ok(Self {
            centers: Vec::with_capacity(capacity.min(4096)),
            capacity,
            fractal_dim,
            global_metric,
            adaptive_alpha,
            time: 0.0,
            version: 0,
            index: None,
            index_policy: IndexPolicy::default(),
            reach: 0.0,
            torsion: None,
        })
    }

    /// Reassemble a field from decoded parts. Centers are assumed validated.
    pub(crate) fn restore(
        capacity: usize,
        fractal_dim: f32,
        global_metric: Metric,
        adaptive_alpha: f32,
        time: f32,
        centers: Vec<Center>,
    ) -> FieldResult<Self> {
        let mut field = Self::with_metric(capacity, fractal_dim, global_metric, adaptive_alpha)?;
        if centers.len() > capacity {
            return Err(FieldError::InvalidInput(format!(
                "{} centers exceed capacity {}",
                centers.len(),
                capacity
            )));
        }
        field.time = time;
        field.centers = centers;
        field.recompute_reach();
        field.version = 1;
        field.rebuild_index();
        Ok(field)
    }

    // -- accessors ----------------------------------------------------------

    pub fn centers(&self) -> &[Center] {
        &self.centers
    }

    pub fn center(&self, index: usize) -> FieldResult<&Center> {
        self.centers.get(index).ok_or(FieldError::IndexOutOfRange {
            index,
            len: self.centers.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupied fraction of capacity, in [0, 1].
    pub fn load(&self) -> f32 {
        if self.capacity == 0 {
            1.0
        } else {
            self.centers.len() as f32 / self.capacity as f32
        }
    }

    pub fn fractal_dim(&self) -> f32 {
        self.fractal_dim
    }

    pub fn global_metric(&self) -> &Metric {
        &self.global_metric
    }

    pub fn adaptive_alpha(&self) -> f32 {
        self.adaptive_alpha
    }

    /// Simulated time.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn token(&self) -> VersionToken {
        VersionToken(self.version)
    }

    /// Fails with [`FieldError::Stale`] if the field moved past `token`.
    pub fn ensure_version(&self, token: VersionToken) -> FieldResult<()> {
        if token.0 == self.version {
            Ok(())
        } else {
            Err(FieldError::Stale {
                expected: token.0,
                found: self.version,
            })
        }
    }

    /// Largest Euclidean reach over all centers.
    pub fn reach(&self) -> f32 {
        self.reach
    }

    pub fn min_sigma(&self) -> Option<f32> {
        self.centers.iter().map(|c| c.sigma).reduce(f32::min)
    }

    pub fn coefficients(&self) -> Vec<Complex<f32>> {
        self.centers.iter().map(|c| c.coeff).collect()
    }

    /// E = Σ_k |c_k|²
    pub fn energy(&self) -> f64 {
        self.centers.iter().map(|c| c.coeff.norm_sqr() as f64).sum()
    }

    /// Centers currently marked for removal.
    pub fn marked_count(&self) -> usize {
        self.centers.iter().filter(|c| c.marked).count()
    }

    /// Per-axis (min, max) over center positions.
    pub fn bounds(&self) -> Option<([f32; DIM], [f32; DIM])> {
        let first = self.centers.first()?;
        let mut lo = *first.point.coords();
        let mut hi = lo;
        for c in &self.centers[1..] {
            for (a, &v) in c.point.coords().iter().enumerate() {
                lo[a] = lo[a].min(v);
                hi[a] = hi[a].max(v);
            }
        }
        Some((lo, hi))
    }

    pub fn torsion(&self) -> Option<&TorsionTensor> {
        self.torsion.as_ref()
    }

    // -- mutation -----------------------------------------------------------

    /// Append a center with the global metric as its local metric.
    ///
    /// Returns `Ok(false)` without touching the field when at capacity.
    pub fn add_center(&mut self, point: Point, coeff: Complex<f32>, sigma: f32) -> FieldResult<bool> {
        let metric = self.global_metric.clone();
        self.add_center_with_metric(point, coeff, sigma, metric)
    }

    /// Append a center with an explicit local metric.
    pub fn add_center_with_metric(
        &mut self,
        point: Point,
        coeff: Complex<f32>,
        sigma: f32,
        local_metric: Metric,
    ) -> FieldResult<bool> {
        if !complex::is_finite(coeff) {
            return Err(FieldError::InvalidInput(format!("non-finite coefficient {}", coeff)));
        }
        check_sigma(sigma)?;
        local_metric.validate()?;
        if self.centers.len() >= self.capacity {
            return Ok(false);
        }

        let center = Center::new(point, coeff, sigma, local_metric);
        self.reach = self.reach.max(center.euclidean_reach());
        self.centers.push(center);
        self.version += 1;
        self.after_append();
        Ok(true)
    }

    /// Remove and return the center at `index`; later centers shift down.
    pub fn remove_center(&mut self, index: usize) -> FieldResult<Center> {
        if index >= self.centers.len() {
            return Err(FieldError::IndexOutOfRange {
                index,
                len: self.centers.len(),
            });
        }
        let removed = self.centers.remove(index);
        self.version += 1;
        self.recompute_reach();
        self.rebuild_index();
        Ok(removed)
    }

    /// Drop every center marked for removal. Returns how many went.
    pub fn remove_marked(&mut self) -> usize {
        let before = self.centers.len();
        self.centers.retain(|c| !c.marked);
        let removed = before - self.centers.len();
        if removed > 0 {
            self.version += 1;
            self.recompute_reach();
            self.rebuild_index();
            debug!(removed, remaining = self.centers.len(), "removed faulted centers");
        }
        removed
    }

    /// Overwrite one coefficient.
    pub fn set_coefficient(&mut self, index: usize, coeff: Complex<f32>) -> FieldResult<()> {
        if !complex::is_finite(coeff) {
            return Err(FieldError::InvalidInput(format!("non-finite coefficient {}", coeff)));
        }
        let len = self.centers.len();
        let center = self
            .centers
            .get_mut(index)
            .ok_or(FieldError::IndexOutOfRange { index, len })?;
        center.coeff = coeff;
        self.bump_coefficients();
        Ok(())
    }

    /// Multiply one coefficient by a real factor.
    pub fn scale_coefficient(&mut self, index: usize, factor: f32) -> FieldResult<()> {
        let current = self.center(index)?.coeff;
        self.set_coefficient(index, current * factor)
    }

    /// Change α in g = G + α|Φ|²·I.
    pub fn set_adaptive_alpha(&mut self, alpha: f32) -> FieldResult<()> {
        check_alpha(alpha)?;
        self.adaptive_alpha = alpha;
        self.bump_coefficients();
        Ok(())
    }

    /// Inject (or clear) a non-symmetric torsion added to the connection's own.
    pub fn set_torsion(&mut self, torsion: Option<TorsionTensor>) {
        self.torsion = torsion;
        self.bump_coefficients();
    }

    /// Commit a full coefficient vector in one version bump.
    ///
    /// Non-finite entries are clamped to zero and counted on their center; a
    /// finite entry clears the count. Reaching [`FAULT_LIMIT`] consecutive
    /// faults marks the center for removal.
    pub(crate) fn commit_coefficients(&mut self, updated: &[Complex<f32>]) -> CommitReport {
        let mut report = CommitReport::default();
        for (k, (center, &c)) in self.centers.iter_mut().zip(updated.iter()).enumerate() {
            if complex::is_finite(c) {
                center.coeff = c;
                center.faults = 0;
            } else {
                center.coeff = Complex::new(0.0, 0.0);
                center.faults = center.faults.saturating_add(1);
                report.clamped.push(k);
                if center.faults >= FAULT_LIMIT && !center.marked {
                    center.marked = true;
                    report.newly_marked.push(k);
                }
            }
        }
        self.bump_coefficients();
        report
    }

    pub(crate) fn advance_time(&mut self, dt: f32) {
        self.time += dt;
    }

    // -- index --------------------------------------------------------------

    pub fn index_policy(&self) -> IndexPolicy {
        self.index_policy
    }

    pub fn set_index_policy(&mut self, policy: IndexPolicy) {
        self.index_policy = policy;
        self.rebuild_index();
    }

    /// The owned KD-tree, if the policy keeps one.
    pub fn index(&self) -> Option<&KdTree> {
        self.index.as_ref()
    }

    pub fn index_stats(&self) -> Option<KdTreeStats> {
        self.index.as_ref().map(KdTree::stats)
    }

    /// Rebuild the owned tree from scratch (or drop it when disabled).
    pub fn rebuild_index(&mut self) {
        self.index = if self.index_policy.enabled {
            Some(KdTree::build_over(&self.centers, self.version))
        } else {
            None
        };
    }

    fn after_append(&mut self) {
        if !self.index_policy.enabled {
            return;
        }
        let rebuild = match self.index.as_mut() {
            Some(tree) if tree.version() + 1 == self.version => {
                tree.restamp(self.version);
                let tail = self.centers.len() - tree.indexed();
                tail as f32 > self.index_policy.rebuild_fraction * tree.indexed() as f32
            }
            _ => true,
        };
        if rebuild {
            self.rebuild_index();
            debug!(centers = self.centers.len(), "rebuilt spatial index");
        }
    }

    /// Coefficients changed, positions did not: bump and carry the tree over.
    fn bump_coefficients(&mut self) {
        self.version += 1;
        let version = self.version;
        if let Some(tree) = self.index.as_mut() {
            if tree.version() + 1 == version {
                tree.restamp(version);
            }
        }
    }

    fn recompute_reach(&mut self) {
        self.reach = self
            .centers
            .iter()
            .map(Center::euclidean_reach)
            .fold(0.0f32, f32::max);
    }

    /// Indices of centers with Euclidean distance ≤ r from x, ascending by index.
    pub fn neighbors_within(&self, x: &Point, r: f32) -> Vec<usize> {
        let mut out: Vec<usize> = match self.index.as_ref() {
            Some(tree) if tree.version() == self.version => tree
                .radius_in(&self.centers, x, r)
                .into_iter()
                .map(|n| n.index)
                .collect(),
            _ => {
                let r_sq = r * r;
                return (0..self.centers.len())
                    .filter(|&k| x.distance_sq(&self.centers[k].point) <= r_sq)
                    .collect();
            }
        };
        out.sort_unstable();
        out
    }

    /// Centers that may contribute at x.
    fn contributors(&self, x: &Point) -> Vec<usize> {
        // slack keeps boundary centers that f32 rounding would drop
        let r = self.reach * (1.0 + 1e-4) + 1e-6;
        self.neighbors_within(x, r)
    }

    // -- evaluation ---------------------------------------------------------

    /// Φ(x)
    pub fn evaluate(&self, x: &Point) -> Complex<f32> {
        let mut acc = Complex::new(0.0f64, 0.0);
        for k in self.contributors(x) {
            let c = &self.centers[k];
            let psi = c.kernel(x);
            if psi > 0.0 {
                acc += to_f64(c.coeff) * psi;
            }
        }
        Complex::new(acc.re as f32, acc.im as f32)
    }

    /// ∇Φ(x) in the ambient coordinate basis.
    pub fn gradient(&self, x: &Point) -> [Complex<f32>; DIM] {
        let mut grad = [Complex::new(0.0f64, 0.0); DIM];
        for k in self.contributors(x) {
            let c = &self.centers[k];
            let (u, md) = c.kernel_arg(x);
            if u > CUTOFF_U {
                continue;
            }
            let s2 = (c.sigma as f64).powi(2);
            let w = to_f64(c.coeff) * (-0.5 * u).exp();
            for i in 0..DIM {
                grad[i] -= w * (md[i] / s2);
            }
        }
        grad.map(|g| Complex::new(g.re as f32, g.im as f32))
    }

    /// Φ, ∇Φ and Hessian at x in one pass.
    pub fn jet(&self, x: &Point) -> FieldJet {
        let mut jet = FieldJet::zero();
        for k in self.contributors(x) {
            let c = &self.centers[k];
            let (u, md) = c.kernel_arg(x);
            if u > CUTOFF_U {
                continue;
            }
            let s2 = (c.sigma as f64).powi(2);
            let s4 = s2 * s2;
            let w = to_f64(c.coeff) * (-0.5 * u).exp();
            jet.value += w;
            for i in 0..DIM {
                jet.gradient[i] -= w * (md[i] / s2);
                for j in i..DIM {
                    let h = w * (md[i] * md[j] / s4 - c.local_metric.get(i, j) as f64 / s2);
                    jet.hessian[i][j] += h;
                    if i != j {
                        jet.hessian[j][i] += h;
                    }
                }
            }
        }
        jet
    }
}

#[inline]
pub(crate) fn to_f64(z: Complex<f32>) -> Complex<f64> {
    Complex::new(z.re as f64, z.im as f64)
}

fn check_sigma(sigma: f32) -> FieldResult<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidInput(format!("width must be positive and finite, got {}", sigma)))
    }
}

fn check_alpha(alpha: f32) -> FieldResult<()> {
    if alpha.is_finite() && alpha >= 0.0 {
        Ok(())
    } else {
        Err(FieldError::InvalidInput(format!("adaptive alpha must be ≥ 0, got {}", alpha)))
    }
}
