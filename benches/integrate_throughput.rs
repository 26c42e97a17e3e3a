use cellpop_core::rng::RngHandle;
use cellpop_graph::load_interaction_data;
use cellpop_sim::{
    simulate_adaptive, simulate_euler, simulate_tau_leaping, CellPopulation, DormandPrince,
    ProteinRnaRateModel, TestRateModel,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const MASTER_SEED: u64 = 2024;
const N_CELLS: usize = 16;

fn grid(points: usize, end: f64) -> Vec<f64> {
    (0..points)
        .map(|i| end * i as f64 / (points - 1) as f64)
        .collect()
}

fn integrate_benchmark(c: &mut Criterion) {
    let data = load_interaction_data("test").expect("built-in dataset");
    let mut rng = RngHandle::for_parameters(MASTER_SEED);
    let mut test_population =
        CellPopulation::new(&data, TestRateModel, N_CELLS, &mut rng).expect("test population");
    let mut protein_population =
        CellPopulation::new(&data, ProteinRnaRateModel::default(), N_CELLS, &mut rng)
            .expect("protein population");
    let time_range = grid(50, 0.1);

    c.bench_function("euler_test_50_steps", |b| {
        b.iter(|| {
            test_population.reset_state().expect("reset");
            black_box(simulate_euler(&mut test_population, &time_range).expect("euler"));
        });
    });

    c.bench_function("dopri5_protein_rna", |b| {
        let solver = DormandPrince::default();
        b.iter(|| {
            protein_population.reset_state().expect("reset");
            black_box(
                simulate_adaptive(&mut protein_population, &time_range, &solver, "dopri5")
                    .expect("dopri5"),
            );
        });
    });

    c.bench_function("tau_leaping_test_50_steps", |b| {
        b.iter(|| {
            test_population.reset_state().expect("reset");
            let mut rng = RngHandle::for_jumps(MASTER_SEED);
            black_box(
                simulate_tau_leaping(&mut test_population, &time_range, &mut rng)
                    .expect("tau-leaping"),
            );
        });
    });
}

criterion_group!(benches, integrate_benchmark);
criterion_main!(benches);
