// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! ContinuumEngine: top-level orchestrator
//!
//! The engine owns the RBF field, its evolution solver, the monitor and the
//! autopoietic controller. Each call to `step()` advances the system by one
//! full cycle: evolution → DRC tick.

use std::path::Path;

use anyhow::{Context, Result};
use continuum_field::evolution::{evolve_step, Evolver, StepReport};
use continuum_field::{geometry, persistence};
use continuum_field::{Center, KdTreeStats, Monitor, MonitorReport, RbfField};
use continuum_math::{Point, DIM};
use num_complex::Complex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::controller::{AutopoieticController, DrcMetrics, DrcState, DrcTick};
use crate::encoding::SeedEncoder;

/// Statistics from the engine at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub steps: u64,
    pub num_centers: usize,
    pub capacity: usize,
    pub load: f32,
    pub energy: f64,
    pub time: f32,
    pub version: u64,
    pub drc_state: Option<DrcState>,
    pub cycle_count: u64,
    pub health: f32,
    pub index: Option<KdTreeStats>,
}

/// One full engine cycle.
#[derive(Debug, Clone)]
pub struct EngineStep {
    pub evolution: StepReport,
    pub drc: DrcTick,
}

/// Outcome of feeding an encoder's seeds into the field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub encoder: String,
    /// Seeds the encoder produced
    pub proposed: usize,
    /// Seeds that became centers
    pub added: usize,
    /// The field filled up before every seed was placed
    pub capacity_exhausted: bool,
}

/// The continuum field engine.
///
/// Single logical owner of the field; every mutation goes through `&mut self`.
pub struct ContinuumEngine {
    pub config: EngineConfig,
    field: RbfField,
    evolver: Evolver,
    monitor: Monitor,
    controller: AutopoieticController,
    /// Total engine cycles executed
    pub total_steps: u64,
}

impl ContinuumEngine {
    /// Create an engine with an empty field.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().context("invalid engine configuration")?;
        let metric = config.field.global_metric()?;
        let mut field = RbfField::with_metric(
            config.field.capacity,
            config.field.fractal_dim,
            metric,
            config.field.adaptive_alpha,
        )
        .context("failed to create field")?;
        field.set_index_policy(config.field.index_policy);
        Ok(Self::assemble(config, field))
    }

    /// Wrap an existing field. Field shape in `config` is replaced by the field's.
    pub fn from_field(mut config: EngineConfig, mut field: RbfField) -> Result<Self> {
        config.field.capacity = field.capacity();
        config.field.fractal_dim = field.fractal_dim();
        config.field.adaptive_alpha = field.adaptive_alpha();
        config.validate().context("invalid engine configuration")?;
        field.set_index_policy(config.field.index_policy);
        Ok(Self::assemble(config, field))
    }

    fn assemble(config: EngineConfig, field: RbfField) -> Self {
        let mut evolver = Evolver::new(config.evolution);
        if config.adaptive_timestep {
            evolver = evolver.with_adaptive_timestep(&field);
        }
        let controller = AutopoieticController::new(config.controller.clone(), config.evolution, config.monitor);
        Self {
            monitor: Monitor::new(config.monitor),
            config,
            field,
            evolver,
            controller,
            total_steps: 0,
        }
    }

    pub fn field(&self) -> &RbfField {
        &self.field
    }

    // -- center set --------------------------------------------------------

    /// Add one center; `Ok(false)` when the field is full.
    pub fn add_center(&mut self, point: Point, coeff: Complex<f32>, sigma: f32) -> Result<bool> {
        self.field
            .add_center(point, coeff, sigma)
            .context("failed to add center")
    }

    pub fn remove_center(&mut self, index: usize) -> Result<Center> {
        self.field
            .remove_center(index)
            .with_context(|| format!("failed to remove center {}", index))
    }

    /// Encode `input` and add the resulting seeds in order, stopping at capacity.
    pub fn ingest<E: SeedEncoder>(&mut self, encoder: &E, input: &E::Input) -> Result<IngestReport> {
        let seeds = encoder
            .encode(input)
            .with_context(|| format!("{} encoder failed", encoder.name()))?;
        let mut report = IngestReport {
            encoder: encoder.name().to_string(),
            proposed: seeds.len(),
            added: 0,
            capacity_exhausted: false,
        };
        for seed in &seeds {
            let added = self
                .field
                .add_center(seed.point, seed.coeff, seed.sigma)
                .with_context(|| format!("invalid {} seed", encoder.name()))?;
            if !added {
                warn!(
                    encoder = encoder.name(),
                    added = report.added,
                    dropped = seeds.len() - report.added,
                    "field capacity reached during ingest"
                );
                report.capacity_exhausted = true;
                break;
            }
            report.added += 1;
        }
        Ok(report)
    }

    // -- geometry ----------------------------------------------------------

    pub fn evaluate(&self, x: &Point) -> Complex<f32> {
        self.field.evaluate(x)
    }

    pub fn gradient(&self, x: &Point) -> [Complex<f32>; DIM] {
        self.field.gradient(x)
    }

    pub fn laplacian(&self, x: &Point) -> Result<Complex<f32>> {
        geometry::laplacian(&self.field, x).context("laplacian failed")
    }

    pub fn geodesic_distance(&self, p: &Point, q: &Point) -> f32 {
        geometry::geodesic_distance(&self.field, p, q)
    }

    pub fn ricci_scalar(&self, x: &Point) -> Result<f32> {
        geometry::ricci_scalar(&self.field, x).context("ricci scalar failed")
    }

    /// −α|Φ(x)|², the leading-order curvature.
    pub fn ricci_leading_order(&self, x: &Point) -> f32 {
        geometry::ricci_leading_order(&self.field, x)
    }

    // -- dynamics ----------------------------------------------------------

    /// One evolution step of explicit size `dt`, bypassing the solver's timestep.
    pub fn evolve_step(&mut self, dt: f32) -> Result<StepReport> {
        evolve_step(&mut self.field, &self.config.evolution, dt).context("evolution step failed")
    }

    /// One DRC tick without an evolution step.
    pub fn drc_tick(&mut self) -> Result<DrcTick> {
        self.controller.tick(&mut self.field).context("DRC tick failed")
    }

    /// Execute one full engine cycle:
    /// 1. Evolution step at the solver's current dt
    /// 2. DRC tick (remove faulted, create/relax, maintain)
    pub fn step(&mut self) -> Result<EngineStep> {
        let evolution = self.evolver.step(&mut self.field).context("evolution step failed")?;
        let drc = self.controller.tick(&mut self.field).context("DRC tick failed")?;
        self.total_steps += 1;
        Ok(EngineStep { evolution, drc })
    }

    /// Run N cycles.
    pub fn run(&mut self, num_steps: u64) -> Result<Vec<EngineStep>> {
        (0..num_steps).map(|_| self.step()).collect()
    }

    /// Measure everything the monitor reports. Advances topology stability.
    pub fn monitor(&mut self) -> MonitorReport {
        self.monitor.measure(&self.field)
    }

    pub fn drc_metrics(&self) -> &DrcMetrics {
        self.controller.metrics()
    }

    /// Forget solver, monitor and controller history; the field is untouched.
    pub fn reset(&mut self) {
        self.evolver.reset();
        self.monitor.reset();
        self.controller.reset();
        self.total_steps = 0;
    }

    pub fn stats(&self) -> EngineStats {
        let metrics = self.controller.metrics();
        EngineStats {
            steps: self.total_steps,
            num_centers: self.field.len(),
            capacity: self.field.capacity(),
            load: self.field.load(),
            energy: self.field.energy(),
            time: self.field.time(),
            version: self.field.version(),
            drc_state: metrics.state,
            cycle_count: metrics.cycle_count,
            health: metrics.health,
            index: self.field.index_stats(),
        }
    }

    // -- persistence -------------------------------------------------------

    pub fn to_bytes(&self) -> Vec<u8> {
        persistence::encode(&self.field)
    }

    pub fn from_bytes(config: EngineConfig, bytes: &[u8]) -> Result<Self> {
        let field = persistence::decode(bytes).context("failed to decode field snapshot")?;
        Self::from_field(config, field)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        persistence::save(&self.field, path)
            .with_context(|| format!("failed to save field to {}", path.display()))
    }

    pub fn load(config: EngineConfig, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let field = persistence::load(path)
            .with_context(|| format!("failed to load field from {}", path.display()))?;
        let engine = Self::from_field(config, field)?;
        info!(
            capacity = engine.config.field.capacity,
            fractal_dim = engine.config.field.fractal_dim,
            "engine restored from snapshot"
        );
        Ok(engine)
    }
}
