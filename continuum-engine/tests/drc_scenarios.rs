// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Autopoietic controller scenarios
//!
//! 1. DRC cycle: a phase-frustrated field becomes less dissonant in 10 ticks
//! 2. Recovery: half the centers removed, 50 cycles later the field holds
//!    ≥ 70% of its converged energy again
//! 3. Self-create never removes centers
//! 4. Self-regenerate never shrinks a coefficient
//! 5. Numerical faults degrade the field instead of aborting
//! 6. Clusters far from the origin tick without aborting
//!
//! Run with: `cargo test -p continuum-engine --test drc_scenarios`

use continuum_engine::{
    AutopoieticController, ContinuumEngine, ControllerConfig, EngineConfig, FieldConfig,
};
use continuum_field::evolution::EvolutionParams;
use continuum_field::monitor::dissonance;
use continuum_field::{MonitorParams, RbfField};
use continuum_math::{Modality, Point};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

// ═══════════════════════════════════════════════════════════
// Fixtures
// ═══════════════════════════════════════════════════════════

fn spatial(rng: &mut StdRng, spread: f32) -> Point {
    Point::spatial(
        rng.gen_range(-spread..spread),
        rng.gen_range(-spread..spread),
        rng.gen_range(-spread..spread),
        Modality::Semantic,
    )
    .unwrap()
}

/// 24 tightly packed centers: the first at +1, every other at −1.
fn frustrated_field(seed: u64) -> RbfField {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut field = RbfField::new(200, 2.0).unwrap();
    for i in 0..24 {
        let c = if i == 0 { 1.0 } else { -1.0 };
        field.add_center(spatial(&mut rng, 0.4), Complex::new(c, 0.0), 0.25).unwrap();
    }
    field
}

fn cycle_controller(seed: u64) -> AutopoieticController {
    let config = ControllerConfig {
        sigma_base: 0.25,
        relaxation_dt: 0.05,
        creation_threshold: 0.5,
        seed,
        ..ControllerConfig::default()
    };
    let evolution = EvolutionParams {
        gamma: 4.0,
        diffusion: 0.01,
        ..EvolutionParams::default()
    };
    AutopoieticController::new(config, evolution, MonitorParams::default())
}

/// Random phases over a dense cloud.
fn incoherent_field(seed: u64, n: usize) -> RbfField {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut field = RbfField::new(n + 40, 2.0).unwrap();
    for _ in 0..n {
        let c = Complex::from_polar(rng.gen_range(0.05..1.2), rng.gen_range(-3.1..3.1));
        field.add_center(spatial(&mut rng, 0.6), c, 0.3).unwrap();
    }
    field
}

// ═══════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════

#[test]
fn drc_cycle_reduces_dissonance() {
    for seed in 0..4 {
        let mut field = frustrated_field(seed);
        let mut controller = cycle_controller(seed);
        let initial = dissonance(&field, &controller.monitor).global;
        let n0 = field.len();

        let mut counts = vec![n0];
        for _ in 0..10 {
            let tick = controller.tick(&mut field).unwrap();
            assert!(tick.health >= 0.0 && tick.health <= 1.0 + 1e-6, "health {}", tick.health);
            counts.push(field.len());
        }

        let last = dissonance(&field, &controller.monitor).global;
        assert!(last < initial, "seed {}: dissonance {} → {}", seed, initial, last);
        assert!(field.len() >= n0);
        assert!(counts.windows(2).all(|w| w[1] >= w[0]), "seed {}: counts {:?}", seed, counts);
        assert!(field.energy().is_finite());
        assert_eq!(controller.metrics().ticks, 10);
    }
}

#[test]
fn recovery_after_losing_half_the_centers() {
    let config = EngineConfig {
        field: FieldConfig {
            capacity: 100,
            ..FieldConfig::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = ContinuumEngine::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(6);
    for _ in 0..40 {
        let p = spatial(&mut rng, 1.0);
        assert!(engine.add_center(p, Complex::new(1.0, 0.0), 0.3).unwrap());
    }
    engine.run(20).unwrap();
    let converged = engine.field().energy();

    let mut indices: Vec<usize> = (0..engine.field().len()).collect();
    indices.shuffle(&mut rng);
    let n = indices.len();
    let mut doomed: Vec<usize> = indices[..n / 2].to_vec();
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    for i in doomed {
        engine.remove_center(i).unwrap();
    }
    assert_eq!(engine.field().len(), n - n / 2);
    let damaged = engine.field().energy();
    assert!(damaged < 0.7 * converged, "damage removed too little: {} of {}", damaged, converged);

    let steps = engine.run(50).unwrap();
    let recovered = engine.field().energy();
    assert!(
        recovered >= 0.7 * converged,
        "energy {} after recovery, {} converged, {} right after damage",
        recovered,
        converged,
        damaged
    );
    assert_eq!(engine.field().len(), n, "population not restored");
    assert_eq!(engine.drc_metrics().centers_repaired, (n / 2) as u64);
    assert!(steps.iter().all(|s| s.evolution.clamped == 0));
    assert!(engine.stats().health.is_finite());
}

#[test]
fn self_create_never_removes_centers() {
    for seed in 0..6 {
        let mut field = incoherent_field(seed, 30);
        let mut controller = cycle_controller(seed);
        for tick in 1..=4 {
            let before = field.len();
            let report = controller.self_create(&mut field, tick).unwrap();
            assert_eq!(field.len(), before + report.created);
            assert!(report.created <= report.qualified);
            assert!(report.qualified <= report.sampled);
        }
    }
}

#[test]
fn self_regenerate_never_shrinks_coefficients() {
    let mut field = incoherent_field(42, 40);
    let before: Vec<f32> = field.coefficients().iter().map(|c| c.norm()).collect();
    let mut controller = cycle_controller(0);
    let boosted = controller.self_regenerate(&mut field, 0.9).unwrap();
    let after: Vec<f32> = field.coefficients().iter().map(|c| c.norm()).collect();
    assert_eq!(before.len(), after.len());
    for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
        assert!(a >= b, "center {}: |c| {} → {}", i, b, a);
    }
    let weak = before.iter().filter(|&&m| m > 0.0 && m < 0.1).count();
    assert_eq!(boosted, weak);
}

#[test]
fn overflowing_center_is_removed_not_fatal() {
    let mut engine = ContinuumEngine::new(EngineConfig::default()).unwrap();
    for i in 0..4 {
        let p = Point::spatial(5.0 * i as f32, 0.0, 0.0, Modality::Visual).unwrap();
        engine.add_center(p, Complex::new(1.0, 0.0), 0.2).unwrap();
    }
    // |Φ|²Φ overflows f32 for this coefficient; two steps in a row mark it.
    let big = Complex::new(1e20, 0.0);
    let p = *engine.field().centers()[2].point();
    engine.remove_center(2).unwrap();
    engine.add_center(p, big, 0.2).unwrap();
    let first = engine.evolve_step(0.01).unwrap();
    assert_eq!(first.clamped, 1);

    let mut field_copy = engine.field().clone();
    let idx = field_copy.len() - 1;
    field_copy.set_coefficient(idx, big).unwrap();
    let mut engine = ContinuumEngine::from_field(EngineConfig::default(), field_copy).unwrap();
    let second = engine.evolve_step(0.01).unwrap();
    assert_eq!(second.newly_marked, vec![idx]);

    let tick = engine.drc_tick().unwrap();
    assert_eq!(tick.removed, 1);
    assert_eq!(engine.field().marked_count(), 0);
    let created = tick.creation.map_or(0, |c| c.created);
    assert_eq!(engine.field().len(), 3 + created + tick.repaired);
    assert!(engine.field().energy().is_finite());
}

#[test]
fn distant_dissonant_cluster_ticks_without_abort() {
    // f32 spacing at 1e8 is 8, far wider than the candidate padding.
    let mut rng = StdRng::seed_from_u64(8);
    let mut field = RbfField::new(200, 2.0).unwrap();
    for i in 0..24 {
        let c = if i == 0 { 1.0 } else { -1.0 };
        let p = Point::spatial(1.0e8, rng.gen_range(-0.4..0.4), rng.gen_range(-0.4..0.4), Modality::Semantic)
            .unwrap();
        field.add_center(p, Complex::new(c, 0.0), 0.25).unwrap();
    }
    let mut controller = cycle_controller(0);
    let n0 = field.len();
    for _ in 0..3 {
        let tick = controller.tick(&mut field).unwrap();
        assert!(tick.health.is_finite());
        assert!(field.len() >= n0);
    }
    assert!(field.energy().is_finite());
    assert!(field.centers().iter().all(|c| c.point().coords().iter().all(|v| v.is_finite())));
}
