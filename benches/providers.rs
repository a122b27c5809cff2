//! Provider operation benchmarks
//!
//! Runs every built-in provider case through criterion at both dataset size
//! classes, as a statistically steadier cross-check of the runner's own timings.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ta_latency_bench::dataset::{get_dataset, DatasetSource, SizeClass};
use ta_latency_bench::providers::ProviderKind;

fn bench_providers(c: &mut Criterion) {
    // Random walk so min/max windows actually move
    let source = DatasetSource::RandomWalk { seed: 42 };

    for size in [SizeClass::Small, SizeClass::Large] {
        let ds = get_dataset(size, &source).expect("generated dataset");
        let mut group = c.benchmark_group(format!("providers_{size}"));
        if size == SizeClass::Large {
            group.sample_size(20);
        }

        for kind in ProviderKind::all() {
            let provider = kind.build();
            for spec in provider.cases() {
                let Some(mut op) = provider.operation(&spec.id, &ds) else {
                    continue;
                };
                group.bench_function(BenchmarkId::new(provider.id(), &spec.id), |b| {
                    b.iter(&mut op)
                });
            }
        }

        group.finish();
    }
}

criterion_group!(benches, bench_providers);
criterion_main!(benches);
