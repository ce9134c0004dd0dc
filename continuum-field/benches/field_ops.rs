// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Criterion benchmarks for the field hot paths: evaluation, Laplace–Beltrami,
//! KD-tree build and one evolution step.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use continuum_field::evolution::{evolve_step, EvolutionParams};
use continuum_field::geometry::laplacian;
use continuum_field::{KdTree, RbfField};
use continuum_math::{Metric, Point};

fn make_field(n: usize) -> RbfField {
    let mut rng = StdRng::seed_from_u64(42);
    let mut field = RbfField::with_metric(n, 2.2, Metric::identity(), 0.01).unwrap();
    for _ in 0..n {
        let p = Point::new([
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(-2.0..2.0),
            rng.gen_range(1.0..2.0),
            rng.gen_range(-1.0..1.0),
            0.4,
        ])
        .unwrap();
        let c = Complex::from_polar(rng.gen_range(0.1..1.0), rng.gen_range(-3.0..3.0));
        field.add_center(p, c, 0.3).unwrap();
    }
    field
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for n in [100usize, 1000, 5000] {
        let field = make_field(n);
        let x = Point::new([0.1, -0.2, 0.3, 1.5, 0.0, 0.4]).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &field, |b, f| {
            b.iter(|| black_box(f.evaluate(black_box(&x))))
        });
    }
    group.finish();
}

fn bench_laplacian(c: &mut Criterion) {
    let field = make_field(1000);
    let x = Point::new([0.1, -0.2, 0.3, 1.5, 0.0, 0.4]).unwrap();
    c.bench_function("laplace_beltrami_1000", |b| {
        b.iter(|| black_box(laplacian(&field, black_box(&x)).unwrap()))
    });
}

fn bench_kdtree_build(c: &mut Criterion) {
    let field = make_field(5000);
    c.bench_function("kdtree_build_5000", |b| b.iter(|| black_box(KdTree::build(&field))));
}

fn bench_evolve_step(c: &mut Criterion) {
    let field = make_field(500);
    let params = EvolutionParams::default();
    c.bench_function("evolve_step_500", |b| {
        b.iter_batched(
            || field.clone(),
            |mut f| black_box(evolve_step(&mut f, &params, params.dt).unwrap()),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_evaluate, bench_laplacian, bench_kdtree_build, bench_evolve_step);
criterion_main!(benches);
