// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Time-Discretized Evolution (TDE)
//!
//! Advances every center coefficient under
//!
//!   ∂Φ/∂t = D·Δ_g Φ − α|Φ|²Φ + β·T_term + γ·C_term
//!
//! All right-hand sides are read from the pre-step field. The step splits in two:
//!
//! 1. Diffusion. Euler takes c + Δt·D·L. The semi-implicit scheme treats each
//!    center's self-curvature λ_k = tr(g⁻¹(p_k)·M_k)/σ_k² implicitly:
//!
//!      c' = (c + Δt·D·(L + λc)) / (1 + Δt·D·λ)
//!
//!    The diffused vector is then rescaled to the pre-step energy Σ|c|²;
//!    diffusion moves energy between centers and neither creates nor destroys it.
//!
//! 2. Reaction, explicit: c'' = c' + Δt·(−α|φ|²φ + β·i‖T‖φ + γ·C).
//!
//! The coupling term relaxes each center toward a Gaussian-weighted average of
//! its neighbours within 3σ_c:
//!
//!   C_k = Σ_j w_kj φ_j / Σ_j w_kj − φ_k,   w_kj = exp(−|p_k − p_j|² / 2σ_c²)
//!
//! Non-finite results are clamped and counted by the field (see
//! [`RbfField::commit_coefficients`]).

use continuum_math::{complex, DIM};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FieldError, FieldResult};
use crate::field::{to_f64, RbfField, VersionToken};
use crate::geometry::{torsion_term_from, LocalGeometry};

/// Fractal dimension above which diffusion is boosted.
pub const FRACTAL_BOOST_THRESHOLD: f32 = 2.5;
pub const FRACTAL_BOOST: f32 = 1.2;

/// Integration method for the diffusion sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorMethod {
    /// Forward Euler, stable for Δt below [`stability_bound`].
    Euler,
    /// Self-curvature implicit, unconditionally stable in the diagonal part.
    SemiImplicit,
}

/// Coefficients of the evolution PDE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionParams {
    /// Default time step
    pub dt: f32,
    /// Diffusion D
    pub diffusion: f32,
    /// Cubic damping α
    pub alpha: f32,
    /// Torsion drive β
    pub beta: f32,
    /// Contextual coupling γ
    pub gamma: f32,
    /// Coupling length σ_c
    pub coupling_length: f32,
    pub method: IntegratorMethod,
    /// Rescale the diffused coefficients to the pre-step energy.
    pub conserve_diffusion_energy: bool,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            dt: 0.01,
            diffusion: 0.08,
            alpha: 0.01,
            beta: 0.005,
            gamma: 0.02,
            coupling_length: 0.5,
            method: IntegratorMethod::SemiImplicit,
            conserve_diffusion_energy: true,
        }
    }
}

impl EvolutionParams {
    /// α = β = γ = 0 with the given step and diffusion.
    pub fn diffusion_only(dt: f32, diffusion: f32) -> Self {
        Self {
            dt,
            diffusion,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FieldResult<()> {
        let checks = [
            ("dt", self.dt, self.dt > 0.0),
            ("diffusion", self.diffusion, self.diffusion >= 0.0),
            ("alpha", self.alpha, self.alpha >= 0.0),
            ("beta", self.beta, true),
            ("gamma", self.gamma, self.gamma >= 0.0),
            ("coupling_length", self.coupling_length, self.coupling_length > 0.0),
        ];
        for (name, value, ok) in checks {
            if !value.is_finite() || !ok {
                return Err(FieldError::InvalidInput(format!("evolution {} = {}", name, value)));
            }
        }
        Ok(())
    }
}

/// D, boosted by 20% on fields with d_f > 2.5.
pub fn effective_diffusion(field: &RbfField, params: &EvolutionParams) -> f32 {
    if field.fractal_dim() > FRACTAL_BOOST_THRESHOLD {
        params.diffusion * FRACTAL_BOOST
    } else {
        params.diffusion
    }
}

/// Largest explicit step for the diffusion term, (2σ_min)² / (4·D·6).
///
/// Infinite for an empty field or zero diffusion.
pub fn stability_bound(field: &RbfField, params: &EvolutionParams) -> f32 {
    let d = effective_diffusion(field, params);
    match field.min_sigma() {
        Some(sigma) if d > 0.0 => (2.0 * sigma).powi(2) / (4.0 * d * DIM as f32),
        _ => f32::INFINITY,
    }
}

/// Summary of one evolution step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Field version after the step.
    pub version: VersionToken,
    pub time: f32,
    pub dt: f32,
    pub energy_before: f64,
    pub energy_after: f64,
    /// Centers clamped to zero this step.
    pub clamped: usize,
    /// Centers that reached the fault limit this step.
    pub newly_marked: Vec<usize>,
    /// max_k |c_k(t+Δt) − c_k(t)| / Δt over finite updates
    pub max_rate: f32,
}

impl StepReport {
    /// |ΔE| / E, zero when the field started empty.
    pub fn relative_energy_change(&self) -> f64 {
        if self.energy_before > 0.0 {
            (self.energy_after - self.energy_before).abs() / self.energy_before
        } else {
            0.0
        }
    }
}

/// Right-hand side pieces at one center, from the pre-step field.
struct CenterTerms {
    phi: Complex<f64>,
    laplacian: Complex<f64>,
    self_curvature: f64,
    torsion_norm: f32,
}

fn center_terms(field: &RbfField, k: usize, need_torsion: bool) -> CenterTerms {
    let center = &field.centers()[k];
    let jet = field.jet(center.point());
    match LocalGeometry::from_jet(field, jet) {
        Ok(geo) => {
            let s2 = (center.sigma() as f64).powi(2);
            let torsion_norm = if need_torsion {
                let own = geo.christoffel().antisymmetric_part();
                match field.torsion() {
                    Some(injected) => own.add(injected).norm(),
                    None => own.norm(),
                }
            } else {
                0.0
            };
            CenterTerms {
                phi: jet.value,
                laplacian: geo.laplacian(),
                self_curvature: geo.trace_with(center.local_metric()) / s2,
                torsion_norm,
            }
        }
        // Overflowed geometry poisons this center's update; the commit clamps it.
        Err(_) => CenterTerms {
            phi: jet.value,
            laplacian: Complex::new(f64::NAN, f64::NAN),
            self_curvature: 0.0,
            torsion_norm: 0.0,
        },
    }
}

/// C_k for every center, from pre-step values φ.
fn coupling_terms(field: &RbfField, phis: &[Complex<f64>], length: f32) -> Vec<Complex<f64>> {
    let two_l2 = 2.0 * (length as f64).powi(2);
    field
        .centers()
        .iter()
        .enumerate()
        .map(|(k, center)| {
            let mut num = Complex::new(0.0f64, 0.0);
            let mut den = 0.0f64;
            for j in field.neighbors_within(center.point(), 3.0 * length) {
                let r2 = center.point().distance_sq(field.centers()[j].point()) as f64;
                let w = (-r2 / two_l2).exp();
                num += phis[j] * w;
                den += w;
            }
            if den > 0.0 {
                num / den - phis[k]
            } else {
                Complex::new(0.0, 0.0)
            }
        })
        .collect()
}

/// One TDE step of size `dt`.
pub fn evolve_step(field: &mut RbfField, params: &EvolutionParams, dt: f32) -> FieldResult<StepReport> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(FieldError::InvalidInput(format!("time step must be positive, got {}", dt)));
    }
    params.validate()?;

    let n = field.len();
    let energy_before = field.energy();
    let d = effective_diffusion(field, params) as f64;
    let dt64 = dt as f64;
    let need_torsion = params.beta != 0.0;

    // Pre-step terms; the field is only read here.
    let terms: Vec<CenterTerms> = (0..n).map(|k| center_terms(field, k, need_torsion)).collect();
    let phis: Vec<Complex<f64>> = terms.iter().map(|t| t.phi).collect();
    let coupling = if params.gamma != 0.0 {
        coupling_terms(field, &phis, params.coupling_length)
    } else {
        vec![Complex::new(0.0, 0.0); n]
    };
    let old: Vec<Complex<f64>> = field.centers().iter().map(|c| to_f64(c.coeff())).collect();

    // Diffusion sub-step
    let mut diffused: Vec<Complex<f64>> = old
        .iter()
        .zip(terms.iter())
        .map(|(&c, t)| match params.method {
            IntegratorMethod::Euler => c + t.laplacian * (dt64 * d),
            IntegratorMethod::SemiImplicit => {
                let lambda = t.self_curvature;
                (c + (t.laplacian + c * lambda) * (dt64 * d)) / (1.0 + dt64 * d * lambda)
            }
        })
        .collect();

    if params.conserve_diffusion_energy {
        let e0: f64 = old.iter().map(|c| c.norm_sqr()).sum();
        let e1: f64 = diffused.iter().map(|c| c.norm_sqr()).sum();
        if e1 > 0.0 && e1.is_finite() && e0.is_finite() {
            let scale = (e0 / e1).sqrt();
            for c in diffused.iter_mut() {
                *c *= scale;
            }
        }
    }

    // Reaction sub-step
    let alpha = params.alpha as f64;
    let beta = params.beta as f64;
    let gamma = params.gamma as f64;
    let mut updated = Vec::with_capacity(n);
    let mut max_rate = 0.0f32;
    for k in 0..n {
        let t = &terms[k];
        let phi = t.phi;
        let phi32 = Complex::new(phi.re as f32, phi.im as f32);
        let torsion = to_f64(torsion_term_from(t.torsion_norm, phi32));
        let reaction = -phi * (alpha * phi.norm_sqr()) + torsion * beta + coupling[k] * gamma;
        let next = diffused[k] + reaction * dt64;
        let next32 = Complex::new(next.re as f32, next.im as f32);
        if complex::is_finite(next32) {
            let rate = ((next - old[k]).norm() / dt64) as f32;
            max_rate = max_rate.max(rate);
        }
        updated.push(next32);
    }

    field.advance_time(dt);
    let commit = field.commit_coefficients(&updated);
    if !commit.clamped.is_empty() {
        warn!(
            clamped = commit.clamped.len(),
            marked = commit.newly_marked.len(),
            first = commit.clamped[0],
            time = field.time(),
            "non-finite coefficients clamped to zero"
        );
    }

    Ok(StepReport {
        version: field.token(),
        time: field.time(),
        dt,
        energy_before,
        energy_after: field.energy(),
        clamped: commit.clamped.len(),
        newly_marked: commit.newly_marked,
        max_rate,
    })
}

// ---------------------------------------------------------------------------
// Adaptive timestep
// ---------------------------------------------------------------------------

/// Energy-monitoring timestep controller.
///
/// For **Euler**: `dt_max` is the diffusion stability bound.
/// For **SemiImplicit**: `dt_max = 16·dt_base`, accuracy-limited.
///
/// Shrinks dt when energy increases, grows it after a run of stable steps.
/// dt is always clamped to `[dt_base/16, dt_max]`.
#[derive(Debug, Clone)]
pub struct AdaptiveTimestep {
    dt_current: f32,
    dt_min: f32,
    dt_max: f32,
    dt_base: f32,
    shrink_factor: f32,
    /// 1.05 for Euler, 1.1 for SemiImplicit
    grow_factor: f32,
    stable_steps: u32,
    grow_after: u32,
    prev_energy: Option<f64>,
}

impl AdaptiveTimestep {
    pub fn new(dt_base: f32, stability_limit: f32, method: IntegratorMethod) -> Self {
        let dt_min = dt_base / 16.0;
        let (dt_max, grow_factor) = match method {
            IntegratorMethod::Euler => (stability_limit.max(dt_min), 1.05),
            IntegratorMethod::SemiImplicit => (dt_base * 16.0, 1.1),
        };
        Self {
            dt_current: dt_base.min(dt_max),
            dt_min,
            dt_max,
            dt_base,
            shrink_factor: 0.5,
            grow_factor,
            stable_steps: 0,
            grow_after: 10,
            prev_energy: None,
        }
    }

    /// Controller sized for `field` under `params`.
    pub fn for_field(field: &RbfField, params: &EvolutionParams) -> Self {
        Self::new(params.dt, stability_bound(field, params), params.method)
    }

    /// Report the energy after a step and get the dt for the next one.
    pub fn adapt(&mut self, energy: f64) -> f32 {
        if let Some(prev) = self.prev_energy {
            if energy > prev * (1.0 + 1e-9) + 1e-9 {
                self.dt_current = (self.dt_current * self.shrink_factor).max(self.dt_min);
                self.stable_steps = 0;
            } else {
                self.stable_steps += 1;
                if self.stable_steps >= self.grow_after {
                    self.dt_current = (self.dt_current * self.grow_factor).min(self.dt_max);
                    self.stable_steps = 0;
                }
            }
        }
        self.prev_energy = Some(energy);
        self.dt_current
    }

    pub fn current_dt(&self) -> f32 {
        self.dt_current
    }

    pub fn dt_max(&self) -> f32 {
        self.dt_max
    }

    pub fn dt_min(&self) -> f32 {
        self.dt_min
    }

    pub fn reset(&mut self) {
        self.dt_current = self.dt_base.min(self.dt_max);
        self.stable_steps = 0;
        self.prev_energy = None;
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Parameters plus optional adaptive timestep, stepping a field repeatedly.
#[derive(Debug, Clone)]
pub struct Evolver {
    pub params: EvolutionParams,
    pub steps: u64,
    adaptive: Option<AdaptiveTimestep>,
}

impl Evolver {
    pub fn new(params: EvolutionParams) -> Self {
        Self {
            params,
            steps: 0,
            adaptive: None,
        }
    }

    /// Let an [`AdaptiveTimestep`] pick each dt.
    pub fn with_adaptive_timestep(mut self, field: &RbfField) -> Self {
        self.adaptive = Some(AdaptiveTimestep::for_field(field, &self.params));
        self
    }

    /// dt the next [`Evolver::step`] will use.
    pub fn next_dt(&self) -> f32 {
        self.adaptive
            .as_ref()
            .map_or(self.params.dt, AdaptiveTimestep::current_dt)
    }

    pub fn step(&mut self, field: &mut RbfField) -> FieldResult<StepReport> {
        let report = evolve_step(field, &self.params, self.next_dt())?;
        if let Some(adaptive) = self.adaptive.as_mut() {
            adaptive.adapt(report.energy_after);
        }
        self.steps += 1;
        Ok(report)
    }

    pub fn run(&mut self, field: &mut RbfField, num_steps: u64) -> FieldResult<Vec<StepReport>> {
        (0..num_steps).map(|_| self.step(field)).collect()
    }

    pub fn reset(&mut self) {
        self.steps = 0;
        if let Some(adaptive) = self.adaptive.as_mut() {
            adaptive.reset();
        }
    }
}
