use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use ising_rust::observer::NoObserver;
use ising_rust::{run_with, Lattice, Params, SeedSource, StrategyKind};

const BENCH_SIZE: usize = 128;
const BENCH_STEPS: usize = 400_000;

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("metropolis");
    group.sample_size(10);

    for kind in StrategyKind::ALL {
        let sweep: &[usize] = if kind == StrategyKind::Serial {
            &[1]
        } else {
            &[1, 2, 4, 8]
        };
        for &threads in sweep {
            let params = Params::new(2.0, BENCH_STEPS, threads).with_seed(SeedSource::Fixed(1));
            let mut lattice = Lattice::new(BENCH_SIZE, SeedSource::Fixed(1)).unwrap();
            let id = BenchmarkId::new(format!("{kind:?}"), threads);
            group.bench_with_input(id, &params, |b, params| {
                b.iter(|| {
                    lattice.randomize(params.seed);
                    run_with(kind, &lattice, params, &NoObserver).unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
