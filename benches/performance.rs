//! Performance benchmarks for breakout-sweep
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use breakout_sweep::optimizer::Optimizer;
use breakout_sweep::{PriceSeries, SimulationOptions, Simulator, StrategyParams, SweepConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn wave(count: usize) -> PriceSeries {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let t = i as f64;
            1000.0 + t * 0.5 + (t / 9.0).sin() * 40.0 + (t / 3.0).cos() * 10.0
        })
        .collect();
    PriceSeries::from_closes(&closes)
}

fn benchmark_simulation(c: &mut Criterion) {
    let series = wave(5_000);
    let params = StrategyParams {
        stop_percentage: 0.1,
        buy_window: 14,
        sell_window: 10,
        go_percentage: 0.5,
        bad_percentage: 0.1,
        ..Default::default()
    };

    c.bench_function("simulate_5000_bars", |b| {
        let sim = Simulator::new(params, SimulationOptions::new(14));
        b.iter(|| black_box(sim.run(black_box(&series))))
    });

    c.bench_function("simulate_5000_bars_traced", |b| {
        let sim = Simulator::new(params, SimulationOptions::new(14).traced());
        b.iter(|| black_box(sim.run(black_box(&series))))
    });
}

fn benchmark_sweep(c: &mut Criterion) {
    let series = wave(1_000);
    let optimizer = Optimizer::new(SweepConfig {
        min_window: 5,
        max_window: 9,
        ..Default::default()
    });

    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);
    group.bench_function("default_percentages_4x4_windows", |b| {
        b.iter(|| black_box(optimizer.run(&series)))
    });
    group.finish();
}

criterion_group!(benches, benchmark_simulation, benchmark_sweep);
criterion_main!(benches);
