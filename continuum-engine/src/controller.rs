// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Autopoietic controller and the DRC cycle
//!
//! Each tick measures the global dissonance d of Φ and classifies it:
//! - **Dissonance** (d > 0.7): self-create new centers where Φ is strong and
//!   unrepresented, self-regenerate weak coefficients if nothing was created,
//!   then relax with a d-scaled evolution step
//! - **Resonance** (0.3 < d ≤ 0.7): relax with a d-scaled evolution step and
//!   fold the post-step dissonance into the tracked value
//! - **Consonance** (d ≤ 0.3): no mutation, the stability counter advances
//!
//! Self-maintenance runs every tick. It re-grows the population while the
//! field holds fewer centers than the most it has held (after damage or
//! fault removal), then scores drift and integrity. The health score is
//!
//!   health = 0.3·creation + 0.4·maintenance + 0.3·regeneration
//!
//! Centers marked by repeated numerical faults are removed at the start of
//! the next tick. Capacity exhaustion stops creation and is counted, never
//! raised.

use continuum_field::evolution::{evolve_step, stability_bound, EvolutionParams, IntegratorMethod, StepReport};
use continuum_field::geometry::geodesic_distance;
use continuum_field::monitor::dissonance;
use continuum_field::{FieldError, FieldResult, MonitorParams, RbfField};
use continuum_math::{axis, Modality, Point, DIM};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ControllerConfig;

const CREATION_WEIGHT: f32 = 0.3;
const MAINTENANCE_WEIGHT: f32 = 0.4;
const REGENERATION_WEIGHT: f32 = 0.3;

/// Salt separating the repair sequence from the self-create sequence.
const REPAIR_STREAM: u64 = 0x5EED_4E9A_17C0_FFEE;

/// |Φ| below which a point has no usable phase.
const PHASE_FLOOR: f32 = 1e-6;

/// Candidate ranges used when the field has no centers yet.
const EMPTY_SPATIAL_RANGE: f32 = 1.0;
const EMPTY_ANTICIPATION: f32 = 1.0;

/// DRC state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrcState {
    Dissonance,
    Resonance,
    Consonance,
}

impl DrcState {
    pub fn classify(d: f32, config: &ControllerConfig) -> Self {
        if d > config.dissonance_threshold {
            DrcState::Dissonance
        } else if d > config.consonance_threshold {
            DrcState::Resonance
        } else {
            DrcState::Consonance
        }
    }
}

/// Outcome of one self-create pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfCreateReport {
    pub sampled: usize,
    /// Candidates passing the creation threshold
    pub qualified: usize,
    pub created: usize,
    /// Qualified candidates within the minimum separation of a center
    pub too_close: usize,
    pub capacity_exhausted: bool,
    /// τ = τ₀·(1 + load) at the start of the pass
    pub threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub energy: f64,
    /// ΔE since the previous maintenance pass
    pub energy_drift: f64,
    /// 1 / (1 + |ΔE|)
    pub maintenance_level: f32,
    /// Fraction of centers with in-range coordinates
    pub integrity: f32,
}

/// Everything one controller tick observed and did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrcTick {
    pub tick: u64,
    pub state: DrcState,
    pub previous: Option<DrcState>,
    /// Global dissonance measured at tick start
    pub dissonance: f32,
    pub coherence: f32,
    /// Dissonance re-measured after the relaxation step
    pub post_dissonance: Option<f32>,
    pub tracked_dissonance: f32,
    /// Marked centers removed at tick start
    pub removed: usize,
    pub creation: Option<SelfCreateReport>,
    pub regenerated: usize,
    /// Centers re-grown toward the population high-water mark
    pub repaired: usize,
    pub step: Option<StepReport>,
    pub maintenance: MaintenanceReport,
    pub health: f32,
}

/// Cumulative controller metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrcMetrics {
    pub ticks: u64,
    pub state: Option<DrcState>,
    /// Entries into Consonance
    pub cycle_count: u64,
    /// Consecutive ticks spent in Consonance
    pub consonance_ticks: u64,
    pub tracked_dissonance: f32,
    /// 1 − tracked / consonance threshold, floored at 0
    pub consonance_achievement: f32,
    pub centers_created: u64,
    pub centers_regenerated: u64,
    pub centers_removed: u64,
    pub centers_repaired: u64,
    pub regeneration_cycles: u64,
    pub capacity_events: u64,
    pub creation_score: f32,
    pub maintenance_score: f32,
    pub regeneration_score: f32,
    pub integrity: f32,
    pub energy_drift: f64,
    pub health: f32,
}

impl Default for DrcMetrics {
    fn default() -> Self {
        Self {
            ticks: 0,
            state: None,
            cycle_count: 0,
            consonance_ticks: 0,
            tracked_dissonance: 0.0,
            consonance_achievement: 0.0,
            centers_created: 0,
            centers_regenerated: 0,
            centers_removed: 0,
            centers_repaired: 0,
            regeneration_cycles: 0,
            capacity_events: 0,
            creation_score: 0.0,
            maintenance_score: 1.0,
            regeneration_score: 1.0,
            integrity: 1.0,
            energy_drift: 0.0,
            health: 1.0,
        }
    }
}

struct Candidate {
    point: Point,
    value: Complex<f32>,
    gradient_norm: f32,
    combined: f32,
}

/// The DRC controller. Owns its tunables; the field is passed per call.
#[derive(Debug, Clone)]
pub struct AutopoieticController {
    pub config: ControllerConfig,
    pub evolution: EvolutionParams,
    pub monitor: MonitorParams,
    metrics: DrcMetrics,
    last_energy: Option<f64>,
    tracked: Option<f32>,
    /// Most centers the field has held at a tick boundary
    population: usize,
}

impl AutopoieticController {
    pub fn new(config: ControllerConfig, evolution: EvolutionParams, monitor: MonitorParams) -> Self {
        Self {
            config,
            evolution,
            monitor,
            metrics: DrcMetrics::default(),
            last_energy: None,
            tracked: None,
            population: 0,
        }
    }

    pub fn metrics(&self) -> &DrcMetrics {
        &self.metrics
    }

    pub fn state(&self) -> Option<DrcState> {
        self.metrics.state
    }

    pub fn health(&self) -> f32 {
        self.metrics.health
    }

    /// One DRC tick over `field`.
    pub fn tick(&mut self, field: &mut RbfField) -> FieldResult<DrcTick> {
        self.metrics.ticks += 1;
        let tick = self.metrics.ticks;
        self.population = self.population.max(field.len());

        let removed = field.remove_marked();
        if removed > 0 {
            debug!(tick, removed, "removed faulted centers");
            self.metrics.centers_removed += removed as u64;
        }

        let report = dissonance(field, &self.monitor);
        let d = report.global;
        let state = DrcState::classify(d, &self.config);
        let previous = self.metrics.state;
        if previous != Some(state) {
            debug!(tick, ?previous, ?state, dissonance = d, "DRC transition");
        }

        let mut creation = None;
        let mut regenerated = 0;
        let mut step = None;
        let mut post_dissonance = None;

        match state {
            DrcState::Dissonance => {
                let created = self.self_create(field, tick)?;
                if created.created == 0 && d > self.config.dissonance_threshold {
                    regenerated = self.self_regenerate(field, d)?;
                }
                creation = Some(created);
                step = Some(self.relax(field, d)?);
                post_dissonance = Some(dissonance(field, &self.monitor).global);
            }
            DrcState::Resonance => {
                step = Some(self.relax(field, d)?);
                post_dissonance = Some(dissonance(field, &self.monitor).global);
            }
            DrcState::Consonance => {}
        }

        if state == DrcState::Consonance {
            if previous != Some(DrcState::Consonance) {
                self.metrics.cycle_count += 1;
                self.metrics.consonance_ticks = 0;
            }
            self.metrics.consonance_ticks += 1;
        } else {
            self.metrics.consonance_ticks = 0;
        }

        let observed = post_dissonance.unwrap_or(d);
        let lambda = self.config.tracking_rate;
        let tracked = match self.tracked {
            None => observed,
            Some(prev) => (1.0 - lambda) * prev + lambda * observed,
        };
        self.tracked = Some(tracked);
        self.metrics.tracked_dissonance = tracked;
        self.metrics.consonance_achievement = (1.0 - tracked / self.config.consonance_threshold.max(1e-6)).max(0.0);
        self.metrics.state = Some(state);

        let repaired = self.self_repair(field, tick)?;
        self.population = self.population.max(field.len());
        let maintenance = self.self_maintain(field);
        let health = self.update_health(field);

        Ok(DrcTick {
            tick,
            state,
            previous,
            dissonance: d,
            coherence: report.coherence,
            post_dissonance,
            tracked_dissonance: tracked,
            removed,
            creation,
            regenerated,
            repaired,
            step,
            maintenance,
            health,
        })
    }

    /// Sample candidate points and add centers where Φ is strong but
    /// unrepresented. The candidate sequence is fixed by `seed` and the tick.
    ///
    /// A candidate qualifies when
    ///
    ///   |Φ| + w·‖∇Φ‖ > τ    or    (‖∇Φ‖ > τ₀/2 and |Φ| > 0.7·τ),
    ///
    /// with τ = τ₀·(1 + load). Qualified candidates are tried strongest first
    /// and accepted if every center (including ones just added) is farther
    /// than the minimum separation in geodesic distance.
    pub fn self_create(&mut self, field: &mut RbfField, tick: u64) -> FieldResult<SelfCreateReport> {
        let c = &self.config;
        let load = field.load();
        let threshold = c.creation_threshold * (1.0 + load);
        let mut report = SelfCreateReport {
            threshold,
            ..SelfCreateReport::default()
        };

        if field.len() >= field.capacity() {
            report.capacity_exhausted = true;
            self.metrics.capacity_events += 1;
            warn!(tick, capacity = field.capacity(), "self-create skipped: field at capacity");
            return Ok(report);
        }

        let mut rng = StdRng::seed_from_u64(c.seed.wrapping_add(tick));
        let mut candidates = Vec::with_capacity(c.candidates);
        for _ in 0..c.candidates {
            let point = sample_candidate(field, c.sigma_base, &mut rng)?;
            let value = field.evaluate(&point);
            let gradient_norm = field
                .gradient(&point)
                .iter()
                .map(|g| g.norm_sqr())
                .sum::<f32>()
                .sqrt();
            let magnitude = value.norm();
            let combined = magnitude + c.gradient_weight * gradient_norm;
            report.sampled += 1;
            let strong = combined > threshold;
            let steep = gradient_norm > 0.5 * c.creation_threshold && magnitude > 0.7 * threshold;
            if strong || steep {
                candidates.push(Candidate {
                    point,
                    value,
                    gradient_norm,
                    combined,
                });
            }
        }
        report.qualified = candidates.len();

        // Stable: equal strength keeps sampling order.
        candidates.sort_by(|a, b| b.combined.total_cmp(&a.combined));

        let sigma = c.sigma_base * (0.8 + 0.4 * (1.0 - load));
        // g ≥ G, so d_g ≥ √λmin(G)·|p − q|
        let scale = field.global_metric().min_eigenvalue().max(0.0).sqrt();
        for cand in candidates {
            if !is_clear(field, &cand.point, c.min_separation, scale) {
                report.too_close += 1;
                continue;
            }
            let magnitude = c.value_gain * cand.value.norm() + c.gradient_gain * cand.gradient_norm;
            let coeff = Complex::from_polar(magnitude, cand.value.arg());
            if field.add_center(cand.point, coeff, sigma)? {
                report.created += 1;
            } else {
                report.capacity_exhausted = true;
                self.metrics.capacity_events += 1;
                warn!(tick, capacity = field.capacity(), "self-create stopped: field at capacity");
                break;
            }
        }

        self.metrics.centers_created += report.created as u64;
        let success = if report.created > 0 { 1.0 } else { 0.0 };
        let a = self.config.creation_smoothing;
        self.metrics.creation_score = (1.0 - a) * self.metrics.creation_score + a * success;
        debug!(
            tick,
            sampled = report.sampled,
            qualified = report.qualified,
            created = report.created,
            threshold,
            "self-create"
        );
        Ok(report)
    }

    /// Boost every weak non-zero coefficient by 1 + boost·(1 + d).
    /// Magnitudes never decrease.
    pub fn self_regenerate(&mut self, field: &mut RbfField, d: f32) -> FieldResult<usize> {
        let factor = 1.0 + self.config.regeneration_boost * (1.0 + d.max(0.0));
        let weak: Vec<usize> = field
            .centers()
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let m = c.coeff().norm();
                m > 0.0 && m < self.config.regeneration_magnitude
            })
            .map(|(i, _)| i)
            .collect();
        for &i in &weak {
            field.scale_coefficient(i, factor)?;
        }
        if !weak.is_empty() {
            self.metrics.regeneration_cycles += 1;
            self.metrics.centers_regenerated += weak.len() as u64;
            debug!(boosted = weak.len(), factor, "self-regenerate");
        }
        Ok(weak.len())
    }

    /// Re-grow toward the population high-water mark, at most
    /// `repair_per_tick` centers per call.
    ///
    /// Each new center lands at a sampled point clear of every center, with
    /// the field's RMS coefficient magnitude √(E/N), the mean width, and the
    /// phase of Φ there (the phase of Σc_k where Φ vanishes).
    pub fn self_repair(&mut self, field: &mut RbfField, tick: u64) -> FieldResult<usize> {
        let deficit = self.population.saturating_sub(field.len());
        let wanted = deficit.min(self.config.repair_per_tick);
        if wanted == 0 || field.is_empty() {
            return Ok(0);
        }
        let n = field.len() as f64;
        let magnitude = (field.energy() / n).sqrt() as f32;
        if !(magnitude > 0.0 && magnitude.is_finite()) {
            return Ok(0);
        }
        let sigma = (field.centers().iter().map(|c| c.sigma() as f64).sum::<f64>() / n) as f32;
        let mean: Complex<f32> = field.centers().iter().map(|c| c.coeff()).sum();
        let scale = field.global_metric().min_eigenvalue().max(0.0).sqrt();

        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(tick) ^ REPAIR_STREAM);
        let mut repaired = 0;
        for _ in 0..self.config.candidates.max(1) * wanted {
            if repaired == wanted {
                break;
            }
            let point = sample_candidate(field, sigma, &mut rng)?;
            if !is_clear(field, &point, self.config.min_separation, scale) {
                continue;
            }
            let value = field.evaluate(&point);
            let phase = if value.norm() > PHASE_FLOOR { value.arg() } else { mean.arg() };
            if field.add_center(point, Complex::from_polar(magnitude, phase), sigma)? {
                repaired += 1;
            } else {
                self.metrics.capacity_events += 1;
                warn!(tick, capacity = field.capacity(), "self-repair stopped: field at capacity");
                break;
            }
        }

        if repaired > 0 {
            self.metrics.centers_repaired += repaired as u64;
            debug!(tick, repaired, deficit, magnitude, sigma, "self-repair");
        }
        Ok(repaired)
    }

    /// Energy drift, maintenance level and integrity.
    pub fn self_maintain(&mut self, field: &RbfField) -> MaintenanceReport {
        let energy = field.energy();
        let energy_drift = match self.last_energy {
            Some(prev) => energy - prev,
            None => 0.0,
        };
        self.last_energy = Some(energy);
        let maintenance_level = (1.0 / (1.0 + energy_drift.abs())) as f32;
        let integrity = if field.is_empty() {
            1.0
        } else {
            let valid = field
                .centers()
                .iter()
                .filter(|c| c.point().is_in_range(self.config.integrity_bound))
                .count();
            valid as f32 / field.len() as f32
        };
        self.metrics.energy_drift = energy_drift;
        self.metrics.maintenance_score = maintenance_level;
        self.metrics.integrity = integrity;
        MaintenanceReport {
            energy,
            energy_drift,
            maintenance_level,
            integrity,
        }
    }

    fn update_health(&mut self, field: &RbfField) -> f32 {
        let regeneration = if field.is_empty() {
            1.0
        } else {
            let strong = field
                .centers()
                .iter()
                .filter(|c| c.coeff().norm() >= self.config.regeneration_magnitude)
                .count();
            strong as f32 / field.len() as f32
        };
        let m = &mut self.metrics;
        m.regeneration_score = regeneration;
        m.health = CREATION_WEIGHT * m.creation_score.min(1.0)
            + MAINTENANCE_WEIGHT * m.maintenance_score
            + REGENERATION_WEIGHT * regeneration;
        m.health
    }

    /// Evolution step of size relaxation_dt·d, held to the stability bound for Euler.
    fn relax(&self, field: &mut RbfField, d: f32) -> FieldResult<StepReport> {
        let mut dt = self.config.relaxation_dt * d;
        if self.evolution.method == IntegratorMethod::Euler {
            dt = dt.min(stability_bound(field, &self.evolution));
        }
        evolve_step(field, &self.evolution, dt)
    }

    pub fn reset(&mut self) {
        self.metrics = DrcMetrics::default();
        self.last_energy = None;
        self.tracked = None;
        self.population = 0;
    }
}

/// No center of `field` within `min_separation` of `point`, in geodesic
/// distance. g ≥ G, so d_g ≥ √λmin(G)·|p − q| settles most pairs cheaply.
fn is_clear(field: &RbfField, point: &Point, min_separation: f32, scale: f32) -> bool {
    field.centers().iter().all(|center| {
        scale * point.distance_euclid(center.point()) > min_separation
            || geodesic_distance(field, point, center.point()) > min_separation
    })
}

/// Spatial axes uniform over the center bounding box padded by `pad`; the
/// anticipation, memory and modality axes copied from a random center.
fn sample_candidate(field: &RbfField, pad: f32, rng: &mut StdRng) -> FieldResult<Point> {
    let mut coords = [0.0f32; DIM];
    match field.bounds() {
        Some((lo, hi)) => {
            for a in [axis::X, axis::Y, axis::Z] {
                // f64 keeps the padded range open where f32 spacing exceeds pad
                let min = lo[a] as f64 - pad as f64;
                let max = hi[a] as f64 + pad as f64;
                coords[a] = if min < max {
                    rng.gen_range(min..max).clamp(f32::MIN as f64, f32::MAX as f64) as f32
                } else {
                    lo[a]
                };
            }
            let donor = field.centers()[rng.gen_range(0..field.len())].point();
            for a in [axis::ANTICIPATION, axis::MEMORY, axis::MODALITY] {
                coords[a] = donor.get(a);
            }
        }
        None => {
            for a in [axis::X, axis::Y, axis::Z] {
                coords[a] = rng.gen_range(-EMPTY_SPATIAL_RANGE..EMPTY_SPATIAL_RANGE);
            }
            coords[axis::ANTICIPATION] = EMPTY_ANTICIPATION;
            coords[axis::MEMORY] = 0.0;
            coords[axis::MODALITY] = Modality::Semantic.value();
        }
    }
    Point::new(coords).map_err(FieldError::from)
}
