//! Benchmarks for the resolution pipeline.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use crucible_core::{
    Atom, Constraint, DottedVersionOrd, Package, PackageName, Relop, Request, Universe, Version, VersionOrd,
};
use crucible_resolver::{resolve, ResolverConfig};

/// Builds a synthetic universe of `num_packages` packages, each with
/// `versions_per_package` versions, every version depending on up to
/// `deps_per_version` other randomly-chosen packages. When
/// `mark_oldest_installed` is set, each package's lowest version is
/// flagged installed, simulating an existing install base.
fn generate_universe(
    num_packages: usize,
    versions_per_package: usize,
    deps_per_version: usize,
    mark_oldest_installed: bool,
) -> Universe {
    let mut rng = rand::thread_rng();
    let names: Vec<PackageName> = (0..num_packages)
        .map(|i| PackageName::new(format!("pkg{i}")).unwrap())
        .collect();

    let mut universe = Universe::new(Arc::new(DottedVersionOrd));
    for (idx, name) in names.iter().enumerate() {
        for v in 0..versions_per_package {
            let version = Version::new(format!("{}.{}.0", v / 10 + 1, v % 10));
            let mut depends = Vec::new();
            for _ in 0..deps_per_version {
                let dep_idx = rng.gen_range(0..num_packages);
                if dep_idx != idx {
                    depends.push(vec![Atom::new(
                        names[dep_idx].clone(),
                        Constraint::Versioned(Relop::Ge, Version::new("1.0")),
                    )]);
                }
            }
            let mut pkg = Package::new(name.clone(), version).with_depends(depends);
            if mark_oldest_installed && v == 0 {
                pkg.installed = true;
            }
            universe.insert(pkg).unwrap();
        }
    }
    universe
}

fn bench_version_ordering(c: &mut Criterion) {
    let order = DottedVersionOrd;
    let versions: Vec<_> = (0..100)
        .map(|i| Version::new(format!("{}.{}.{}", i / 100, (i / 10) % 10, i % 10)))
        .collect();

    c.bench_function("version_compare_100", |b| {
        b.iter(|| {
            for pair in versions.windows(2) {
                black_box(order.compare(&pair[0], &pair[1]));
            }
        });
    });
}

fn bench_constraint_matching(c: &mut Criterion) {
    let order = DottedVersionOrd;
    let constraint = Constraint::Versioned(Relop::Ge, Version::new("1.0.0"));
    let versions: Vec<_> = (0..100)
        .map(|i| Version::new(format!("{}.{}.0", i / 10, i % 10)))
        .collect();

    c.bench_function("constraint_match_100", |b| {
        b.iter(|| {
            for v in &versions {
                black_box(constraint.is_satisfied_by(v, &order));
            }
        });
    });
}

/// Benchmark full resolution (minimizing resolver + diff + action graph)
/// at a few universe sizes, on a clean install request.
fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    for size in [10, 50, 100] {
        let universe = generate_universe(size, 5, 2, false);
        let request = Request::new().install(Atom::any(PackageName::new("pkg0").unwrap())).install(
            Atom::any(PackageName::new(format!("pkg{}", size / 2)).unwrap()),
        );

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("packages", size), &size, |b, _| {
            b.iter(|| black_box(resolve(&universe, &request, &ResolverConfig::default())));
        });
    }

    group.finish();
}

/// Benchmark the minimizing resolver's extra probes on an upgrade
/// request against an already-populated installed set, which is the
/// case that pays for the seven-step pin-back algorithm rather than a
/// single base-solver call.
fn bench_upgrade_resolution(c: &mut Criterion) {
    let universe = generate_universe(50, 5, 2, true);
    let request = Request::new().upgrade(Atom::any(PackageName::new("pkg0").unwrap()));

    c.bench_function("resolution_upgrade_50", |b| {
        b.iter(|| black_box(resolve(&universe, &request, &ResolverConfig::default())));
    });
}

criterion_group!(
    benches,
    bench_version_ordering,
    bench_constraint_matching,
    bench_resolution,
    bench_upgrade_resolution,
);
criterion_main!(benches);
