// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Runtime configuration for the continuum engine
//!
//! Every tunable of the field, the evolution step, the monitor and the
//! autopoietic controller lives here, aggregated by [`EngineConfig`] and
//! (de)serialized as JSON.

use anyhow::{bail, Context, Result};
use continuum_field::evolution::{EvolutionParams, IntegratorMethod};
use continuum_field::{IndexPolicy, MonitorParams};
use continuum_math::{Metric, DIM};
use serde::{Deserialize, Serialize};

/// Shape of the Φ-store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Maximum number of RBF centers
    pub capacity: usize,
    /// Fractal dimension d_f in [2, 3)
    pub fractal_dim: f32,
    /// α in g = G + α|Φ|²·I
    pub adaptive_alpha: f32,
    /// Diagonal of the global metric G (None = identity)
    pub metric_diagonal: Option<[f32; DIM]>,
    /// KD-tree maintenance policy
    pub index_policy: IndexPolicy,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            fractal_dim: 2.0,
            adaptive_alpha: 0.01,
            metric_diagonal: None,
            index_policy: IndexPolicy::default(),
        }
    }
}

impl FieldConfig {
    /// The global metric G described by this config.
    pub fn global_metric(&self) -> Result<Metric> {
        match &self.metric_diagonal {
            None => Ok(Metric::identity()),
            Some(diag) => Metric::diagonal(diag).context("invalid global metric diagonal"),
        }
    }
}

/// Autopoietic (DRC) controller tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// d above this is DISSONANCE
    pub dissonance_threshold: f32,
    /// d at or below this is CONSONANCE
    pub consonance_threshold: f32,
    /// Candidate points sampled per self-create
    pub candidates: usize,
    /// τ₀, scaled by (1 + load) into the creation threshold
    pub creation_threshold: f32,
    /// Weight of ‖∇Φ‖ in the combined creation metric
    pub gradient_weight: f32,
    /// Minimum geodesic distance from a candidate to every center
    pub min_separation: f32,
    /// Base width of created centers, scaled by 0.8 + 0.4(1 − load)
    pub sigma_base: f32,
    /// New coefficient magnitude = value_gain·|Φ| + gradient_gain·‖∇Φ‖
    pub value_gain: f32,
    pub gradient_gain: f32,
    /// Relaxation step is relaxation_dt · d
    pub relaxation_dt: f32,
    /// EMA weight of the post-step dissonance in the tracked value
    pub tracking_rate: f32,
    /// Coefficients below this magnitude count as weak
    pub regeneration_magnitude: f32,
    /// Weak coefficients are scaled by 1 + boost·(1 + d)
    pub regeneration_boost: f32,
    /// EMA weight of each self-create outcome in the creation score
    pub creation_smoothing: f32,
    /// Coordinate bound used by the integrity check
    pub integrity_bound: f32,
    /// Centers re-grown per tick while the field is below its population
    /// high-water mark; 0 disables repair
    pub repair_per_tick: usize,
    /// Base seed of the per-tick candidate sequence
    pub seed: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dissonance_threshold: 0.7,
            consonance_threshold: 0.3,
            candidates: 15,
            creation_threshold: 0.5,
            gradient_weight: 0.3,
            min_separation: 0.2,
            sigma_base: 1.0,
            value_gain: 0.4,
            gradient_gain: 0.1,
            relaxation_dt: 0.05,
            tracking_rate: 0.5,
            regeneration_magnitude: 0.1,
            regeneration_boost: 0.2,
            creation_smoothing: 0.1,
            integrity_bound: 100.0,
            repair_per_tick: 1,
            seed: 0,
        }
    }
}

/// Full configuration for a [`crate::engine::ContinuumEngine`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub field: FieldConfig,
    pub evolution: EvolutionParams,
    pub monitor: MonitorParams,
    pub controller: ControllerConfig,
    /// Drive the evolution step through the energy-monitoring timestep controller
    pub adaptive_timestep: bool,
}

impl EngineConfig {
    /// Pure diffusion: α = β = γ = 0, no metric adaptation, Euler.
    pub fn diffusion_only(dt: f32, diffusion: f32) -> Self {
        let mut evolution = EvolutionParams::diffusion_only(dt, diffusion);
        evolution.method = IntegratorMethod::Euler;
        Self {
            field: FieldConfig {
                adaptive_alpha: 0.0,
                ..FieldConfig::default()
            },
            evolution,
            ..Self::default()
        }
    }

    /// Strong coupling and fast relaxation for controller experiments.
    pub fn exploratory() -> Self {
        Self {
            evolution: EvolutionParams {
                gamma: 4.0,
                diffusion: 0.01,
                ..EvolutionParams::default()
            },
            controller: ControllerConfig {
                sigma_base: 0.25,
                relaxation_dt: 0.1,
                ..ControllerConfig::default()
            },
            adaptive_timestep: true,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize engine config")
    }

    /// Check every section; the message names the offending field.
    pub fn validate(&self) -> Result<()> {
        let f = &self.field;
        if f.capacity == 0 {
            bail!("field.capacity must be positive");
        }
        if !(2.0..3.0).contains(&f.fractal_dim) {
            bail!("field.fractal_dim {} outside [2, 3)", f.fractal_dim);
        }
        if !(f.adaptive_alpha.is_finite() && f.adaptive_alpha >= 0.0) {
            bail!("field.adaptive_alpha must be finite and >= 0, got {}", f.adaptive_alpha);
        }
        if !(f.index_policy.rebuild_fraction.is_finite() && f.index_policy.rebuild_fraction >= 0.0) {
            bail!("field.index_policy.rebuild_fraction must be >= 0");
        }
        f.global_metric()?;

        self.evolution.validate().context("invalid evolution parameters")?;

        let m = &self.monitor;
        if !(m.local_radius.is_finite() && m.local_radius > 0.0) {
            bail!("monitor.local_radius must be positive, got {}", m.local_radius);
        }
        if !(m.coherence_weight >= 0.0 && m.local_weight >= 0.0) {
            bail!("monitor weights must be non-negative");
        }
        if !(m.reflexivity_epsilon.is_finite() && m.reflexivity_epsilon > 0.0) {
            bail!("monitor.reflexivity_epsilon must be positive");
        }
        if !(m.cluster_threshold.is_finite() && m.cluster_threshold > 0.0) {
            bail!("monitor.cluster_threshold must be positive");
        }

        let c = &self.controller;
        if !(0.0..=1.0).contains(&c.consonance_threshold)
            || !(0.0..=1.0).contains(&c.dissonance_threshold)
            || c.consonance_threshold >= c.dissonance_threshold
        {
            bail!(
                "controller thresholds must satisfy 0 <= consonance ({}) < dissonance ({}) <= 1",
                c.consonance_threshold,
                c.dissonance_threshold
            );
        }
        for (name, v) in [
            ("controller.creation_threshold", c.creation_threshold),
            ("controller.sigma_base", c.sigma_base),
            ("controller.relaxation_dt", c.relaxation_dt),
            ("controller.integrity_bound", c.integrity_bound),
        ] {
            if !(v.is_finite() && v > 0.0) {
                bail!("{} must be positive, got {}", name, v);
            }
        }
        for (name, v) in [
            ("controller.gradient_weight", c.gradient_weight),
            ("controller.min_separation", c.min_separation),
            ("controller.value_gain", c.value_gain),
            ("controller.gradient_gain", c.gradient_gain),
            ("controller.regeneration_magnitude", c.regeneration_magnitude),
            ("controller.regeneration_boost", c.regeneration_boost),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                bail!("{} must be non-negative, got {}", name, v);
            }
        }
        for (name, v) in [
            ("controller.tracking_rate", c.tracking_rate),
            ("controller.creation_smoothing", c.creation_smoothing),
        ] {
            if !(0.0..=1.0).contains(&v) {
                bail!("{} must lie in [0, 1], got {}", name, v);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.controller.candidates, 15);
        assert!((config.controller.dissonance_threshold - 0.7).abs() < 1e-6);
        assert!((config.evolution.dt - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_presets() {
        let diffusion = EngineConfig::diffusion_only(0.001, 0.1);
        diffusion.validate().unwrap();
        assert_eq!(diffusion.evolution.alpha, 0.0);
        assert_eq!(diffusion.evolution.beta, 0.0);
        assert_eq!(diffusion.evolution.gamma, 0.0);
        assert_eq!(diffusion.field.adaptive_alpha, 0.0);
        assert_eq!(diffusion.evolution.method, IntegratorMethod::Euler);

        let exploratory = EngineConfig::exploratory();
        exploratory.validate().unwrap();
        assert!(exploratory.evolution.gamma > EngineConfig::default().evolution.gamma);
        assert!(exploratory.adaptive_timestep);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = EngineConfig::exploratory();
        config.field.metric_diagonal = Some([1.0, 2.0, 1.0, 1.0, 0.5, 1.0]);
        let json = config.to_json_string().unwrap();
        let restored = EngineConfig::from_json_str(&json).unwrap();
        assert_eq!(restored.field.metric_diagonal, config.field.metric_diagonal);
        assert!((restored.evolution.gamma - 4.0).abs() < 1e-6);
        assert_eq!(restored.controller.seed, config.controller.seed);
    }

    #[test]
    fn test_validate_names_bad_field() {
        let mut config = EngineConfig::default();
        config.controller.sigma_base = 0.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sigma_base"), "message: {}", err);

        let mut config = EngineConfig::default();
        config.controller.consonance_threshold = 0.8;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.field.fractal_dim = 3.5;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("fractal_dim"), "message: {}", err);
    }

    #[test]
    fn test_bad_metric_rejected() {
        let mut config = EngineConfig::default();
        config.field.metric_diagonal = Some([1.0, -1.0, 1.0, 1.0, 1.0, 1.0]);
        assert!(config.validate().is_err());
        assert!(EngineConfig::from_json_str("{ not json").is_err());
    }
}
