// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Capability scoring over repeated seeded trials
//!
//! A capability is a named scalar in [0, 1] measured on a freshly seeded
//! engine, with the range it is expected to land in. The validator runs each
//! registered capability over `trials` independent engines and attaches a
//! [`StatisticalRun`] of the per-trial scores against the lower bound.

use std::f32::consts::PI;

use anyhow::{bail, Context, Result};
use continuum_math::{Modality, Point};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::statistics::StatisticalRun;
use crate::config::EngineConfig;
use crate::engine::ContinuumEngine;

/// One capability measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityScore {
    pub id: String,
    /// Measured value, clamped to [0, 1]
    pub score: f32,
    pub min_expected: f32,
    pub max_expected: f32,
    /// Finite and inside [min_expected, max_expected]
    pub is_valid: bool,
    pub message: String,
}

impl CapabilityScore {
    pub fn new(id: &str, raw: f32, min_expected: f32, max_expected: f32) -> Self {
        if !raw.is_finite() {
            return Self {
                id: id.to_string(),
                score: 0.0,
                min_expected,
                max_expected,
                is_valid: false,
                message: format!("{}: non-finite score {}", id, raw),
            };
        }
        let score = raw.clamp(0.0, 1.0);
        let is_valid = (min_expected..=max_expected).contains(&score);
        let verdict = if is_valid { "within" } else { "outside" };
        Self {
            id: id.to_string(),
            score,
            min_expected,
            max_expected,
            is_valid,
            message: format!(
                "{}: {:.4} {} [{:.2}, {:.2}]",
                id, score, verdict, min_expected, max_expected
            ),
        }
    }
}

/// Scorer signature: measure (and possibly mutate) a trial engine.
pub type ScoreFn = fn(&mut ContinuumEngine) -> Result<f32>;

/// A registered capability.
#[derive(Clone, Copy)]
pub struct Capability {
    pub id: &'static str,
    pub min_expected: f32,
    pub max_expected: f32,
    pub scorer: ScoreFn,
}

impl Capability {
    pub fn evaluate(&self, engine: &mut ContinuumEngine) -> Result<CapabilityScore> {
        let raw = (self.scorer)(engine).with_context(|| format!("capability {} failed", self.id))?;
        Ok(CapabilityScore::new(self.id, raw, self.min_expected, self.max_expected))
    }
}

// ─── Scorers ───────────────────────────────────────────

/// Φ(Φ) reflexivity score.
pub fn score_reflexivity(engine: &mut ContinuumEngine) -> Result<f32> {
    Ok(engine.monitor().reflexivity.score)
}

/// Pairwise phase coherence.
pub fn score_coherence(engine: &mut ContinuumEngine) -> Result<f32> {
    Ok(engine.monitor().coherence)
}

fn energy_ratio(after: f64, before: f64) -> f32 {
    if before > 0.0 {
        (after / before).min(1.0) as f32
    } else {
        0.0
    }
}

/// Energy kept after 10 engine cycles.
pub fn score_energy_retention(engine: &mut ContinuumEngine) -> Result<f32> {
    let before = engine.field().energy();
    engine.run(10)?;
    Ok(energy_ratio(engine.field().energy(), before))
}

/// Cycles that settle the field before the recovery capability damages it.
const RECOVERY_SETTLE: u64 = 5;

/// Settle, remove every other center, run 20 cycles, compare to the
/// energy before the damage.
pub fn score_recovery(engine: &mut ContinuumEngine) -> Result<f32> {
    engine.run(RECOVERY_SETTLE)?;
    let converged = engine.field().energy();
    let n = engine.field().len();
    for i in (0..n).rev().filter(|i| i % 2 == 1) {
        engine.remove_center(i)?;
    }
    engine.run(20)?;
    Ok(energy_ratio(engine.field().energy(), converged))
}

/// Agreement of the exact Ricci scalar with −α|Φ|² at the centers,
/// 1 / (1 + mean |R − R₀|).
pub fn score_curvature_consistency(engine: &mut ContinuumEngine) -> Result<f32> {
    let points: Vec<Point> = engine.field().centers().iter().map(|c| *c.point()).collect();
    if points.is_empty() {
        return Ok(1.0);
    }
    let mut total = 0.0f64;
    for p in &points {
        let exact = engine.ricci_scalar(p)?;
        total += (exact - engine.ricci_leading_order(p)).abs() as f64;
    }
    Ok((1.0 / (1.0 + total / points.len() as f64)) as f32)
}

/// Cluster structures per center.
pub fn score_topology_complexity(engine: &mut ContinuumEngine) -> Result<f32> {
    Ok(engine.monitor().topology.complexity)
}

/// The standard registry.
pub fn standard_capabilities() -> Vec<Capability> {
    vec![
        Capability {
            id: "reflexivity",
            min_expected: 0.5,
            max_expected: 1.0,
            scorer: score_reflexivity,
        },
        Capability {
            id: "coherence",
            min_expected: 0.0,
            max_expected: 1.0,
            scorer: score_coherence,
        },
        Capability {
            id: "energy_retention",
            min_expected: 0.5,
            max_expected: 1.0,
            scorer: score_energy_retention,
        },
        Capability {
            id: "recovery",
            min_expected: 0.7,
            max_expected: 1.0,
            scorer: score_recovery,
        },
        Capability {
            id: "curvature_consistency",
            min_expected: 0.0,
            max_expected: 1.0,
            scorer: score_curvature_consistency,
        },
        Capability {
            id: "topology_complexity",
            min_expected: 0.0,
            max_expected: 0.5,
            scorer: score_topology_complexity,
        },
    ]
}

// ─── Trials ────────────────────────────────────────────

/// How each trial engine is seeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialFixture {
    pub centers: usize,
    /// Spatial coordinates uniform in [−spread, spread]
    pub spread: f32,
    pub sigma: f32,
    /// Coefficient magnitudes uniform in [min, max)
    pub amplitude: (f32, f32),
    /// Phases uniform in [−phase_spread, phase_spread]
    pub phase_spread: f32,
}

impl Default for TrialFixture {
    fn default() -> Self {
        Self {
            centers: 24,
            spread: 1.0,
            sigma: 0.3,
            amplitude: (0.5, 1.5),
            phase_spread: 1.0,
        }
    }
}

impl TrialFixture {
    pub fn build(&self, config: &EngineConfig, seed: u64) -> Result<ContinuumEngine> {
        if !(self.amplitude.0 < self.amplitude.1 && self.spread > 0.0) {
            bail!("trial fixture needs a non-empty amplitude range and positive spread");
        }
        let mut engine = ContinuumEngine::new(config.clone())?;
        let mut rng = StdRng::seed_from_u64(seed);
        let phase = self.phase_spread.clamp(0.0, PI);
        for _ in 0..self.centers {
            let point = Point::spatial(
                rng.gen_range(-self.spread..=self.spread),
                rng.gen_range(-self.spread..=self.spread),
                rng.gen_range(-self.spread..=self.spread),
                Modality::Semantic,
            )?;
            let coeff = Complex::from_polar(
                rng.gen_range(self.amplitude.0..self.amplitude.1),
                rng.gen_range(-phase..=phase),
            );
            if !engine.add_center(point, coeff, self.sigma)? {
                break;
            }
        }
        Ok(engine)
    }
}

/// Scores of one capability across all trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityReport {
    /// Score of the trial mean
    pub score: CapabilityScore,
    pub samples: Vec<f64>,
    /// Per-trial t-test against `min_expected`; None with fewer than two trials
    pub statistics: Option<StatisticalRun>,
}

pub struct CapabilityValidator {
    pub config: EngineConfig,
    pub fixture: TrialFixture,
    pub trials: usize,
    pub base_seed: u64,
    capabilities: Vec<Capability>,
}

impl Default for CapabilityValidator {
    fn default() -> Self {
        Self::new(EngineConfig::default(), TrialFixture::default(), 10)
    }
}

impl CapabilityValidator {
    pub fn new(config: EngineConfig, fixture: TrialFixture, trials: usize) -> Self {
        Self {
            config,
            fixture,
            trials,
            base_seed: 0,
            capabilities: standard_capabilities(),
        }
    }

    /// Add or replace a capability by id.
    pub fn register(&mut self, capability: Capability) {
        match self.capabilities.iter_mut().find(|c| c.id == capability.id) {
            Some(existing) => *existing = capability,
            None => self.capabilities.push(capability),
        }
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.capabilities.iter().map(|c| c.id).collect()
    }

    /// Run one capability over every trial.
    pub fn run_one(&self, id: &str) -> Result<CapabilityReport> {
        let capability = self
            .capabilities
            .iter()
            .find(|c| c.id == id)
            .with_context(|| format!("unknown capability {}", id))?;
        self.run_capability(capability)
    }

    /// Run every registered capability.
    pub fn run(&self) -> Result<Vec<CapabilityReport>> {
        self.capabilities.iter().map(|c| self.run_capability(c)).collect()
    }

    fn run_capability(&self, capability: &Capability) -> Result<CapabilityReport> {
        if self.trials == 0 {
            bail!("capability validator needs at least one trial");
        }
        let mut samples = Vec::with_capacity(self.trials);
        for trial in 0..self.trials {
            let seed = self.base_seed.wrapping_add(trial as u64);
            let mut engine = self
                .fixture
                .build(&self.config, seed)
                .with_context(|| format!("failed to build trial {} for {}", trial, capability.id))?;
            let score = capability.evaluate(&mut engine)?;
            samples.push(score.score as f64);
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let statistics = if samples.len() >= 2 {
            Some(StatisticalRun::from_samples(&samples, capability.min_expected as f64)?)
        } else {
            None
        };
        let score = CapabilityScore::new(
            capability.id,
            mean as f32,
            capability.min_expected,
            capability.max_expected,
        );
        debug!(
            id = capability.id,
            score = score.score,
            valid = score.is_valid,
            p_value = statistics.map(|s| s.p_value),
            "capability scored"
        );
        Ok(CapabilityReport {
            score,
            samples,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_validator(trials: usize) -> CapabilityValidator {
        let fixture = TrialFixture {
            centers: 8,
            ..TrialFixture::default()
        };
        CapabilityValidator::new(EngineConfig::default(), fixture, trials)
    }

    #[test]
    fn test_score_clamping_and_validity() {
        let s = CapabilityScore::new("x", 1.7, 0.0, 1.0);
        assert_eq!(s.score, 1.0);
        assert!(s.is_valid);
        let low = CapabilityScore::new("x", 0.2, 0.5, 1.0);
        assert!(!low.is_valid);
        assert!(low.message.contains("outside"), "{}", low.message);
        let nan = CapabilityScore::new("x", f32::NAN, 0.0, 1.0);
        assert!(!nan.is_valid);
        assert_eq!(nan.score, 0.0);
    }

    #[test]
    fn test_fixture_is_seeded() {
        let fixture = TrialFixture::default();
        let config = EngineConfig::default();
        let a = fixture.build(&config, 7).unwrap();
        let b = fixture.build(&config, 7).unwrap();
        let c = fixture.build(&config, 8).unwrap();
        assert_eq!(a.field().len(), 24);
        assert_eq!(a.field().centers(), b.field().centers());
        assert_ne!(a.field().centers(), c.field().centers());
    }

    #[test]
    fn test_suite_runs_every_capability() {
        let validator = small_validator(3);
        let reports = validator.run().unwrap();
        assert_eq!(reports.len(), validator.ids().len());
        for r in &reports {
            assert_eq!(r.samples.len(), 3);
            assert!((0.0..=1.0).contains(&r.score.score), "{}", r.score.message);
            let stats = r.statistics.unwrap();
            assert_eq!(stats.n, 3);
            assert!(stats.ci95.0 <= stats.mean && stats.mean <= stats.ci95.1);
        }
        let by_id = |id: &str| reports.iter().find(|r| r.score.id == id).unwrap();
        assert!(by_id("coherence").score.is_valid);
        assert!(by_id("topology_complexity").score.is_valid);
        assert!(by_id("reflexivity").score.is_valid, "{}", by_id("reflexivity").score.message);
    }

    #[test]
    fn test_run_one_is_deterministic() {
        let validator = small_validator(2);
        let a = validator.run_one("coherence").unwrap();
        let b = validator.run_one("coherence").unwrap();
        assert_eq!(a.samples, b.samples);
        assert!(validator.run_one("telepathy").is_err());
    }

    #[test]
    fn test_register_replaces_by_id() {
        fn always_half(_: &mut ContinuumEngine) -> Result<f32> {
            Ok(0.5)
        }
        let mut validator = small_validator(1);
        let n = validator.ids().len();
        validator.register(Capability {
            id: "coherence",
            min_expected: 0.4,
            max_expected: 0.6,
            scorer: always_half,
        });
        assert_eq!(validator.ids().len(), n);
        let report = validator.run_one("coherence").unwrap();
        assert_eq!(report.score.score, 0.5);
        assert!(report.score.is_valid);
        assert!(report.statistics.is_none());
    }
}
