mod common;

use cellpop_core::errors::CellPopError;
use cellpop_core::rng::RngHandle;
use cellpop_core::DynamicalSystem;
use cellpop_graph::load_interaction_data;
use cellpop_sim::{
    simulate_adaptive, simulate_euler, simulate_tau_leaping, DormandPrince, TestRateModel,
};
use common::{
    bounded_model, constant_rate_model, flaky_model, gene_pair, isolated_nodes,
    linear_decay_model, population,
};
use proptest::prelude::*;

#[test]
fn euler_step_with_constant_rate_is_exact() {
    let mut population = population(&isolated_nodes(3), constant_rate_model(1.5), 2);
    let trajectory = simulate_euler(&mut population, &[0.0, 0.25]).unwrap();
    assert_eq!(trajectory.states().shape(), &[2, 2, 3, 1]);
    let initial = trajectory.at(0).unwrap();
    let after = trajectory.at(1).unwrap();
    for (before, after) in initial.iter().zip(after.iter()) {
        assert!((after - before - 0.25 * 1.5).abs() < 1e-12);
    }
    assert_eq!(population.state(), after);
}

#[test]
fn euler_records_every_grid_point() {
    let data = load_interaction_data("test").unwrap();
    let mut population = population(&data, TestRateModel, 2);
    let grid: Vec<f64> = (0..5).map(|i| i as f64 * 0.01).collect();
    let trajectory = simulate_euler(&mut population, &grid).unwrap();
    assert_eq!(trajectory.len(), 5);
    assert_eq!(trajectory.times(), grid.as_slice());
    assert_eq!(trajectory.states().shape(), &[5, 2, 60, 1]);
    assert!(trajectory.at(0).unwrap().iter().all(|value| *value == 10.0));
}

#[test]
fn invalid_grid_leaves_state_untouched() {
    let mut population = population(&isolated_nodes(2), constant_rate_model(1.0), 1);
    let before = population.state().to_owned();
    let err = simulate_euler(&mut population, &[0.0, 0.5, 0.5]).unwrap_err();
    assert!(matches!(err, CellPopError::Integration(_)));
    assert_eq!(population.state(), before);
}

#[test]
fn failing_step_keeps_last_committed_state() {
    let mut population = population(&isolated_nodes(1), bounded_model(1.0, 10.5), 1);
    let err = simulate_euler(&mut population, &[0.0, 0.3, 0.6, 0.9, 1.2]).unwrap_err();
    assert_eq!(err.info().code, "limit-exceeded");
    // 10.0 -> 10.3 -> 10.6, then the third evaluation fails.
    assert!((population.state()[[0, 0, 0]] - 10.6).abs() < 1e-12);
}

#[test]
fn euler_error_keeps_previous_step() {
    let mut population = population(&isolated_nodes(2), flaky_model(4.0, 2), 1);
    let err = simulate_euler(&mut population, &[0.0, 0.5, 1.0]).unwrap_err();
    assert_eq!(err.info().code, "transient-failure");
    assert!(population.state().iter().all(|value| *value == 12.0));
}

#[test]
fn adaptive_failure_restores_initial_state() {
    let mut stiff = population(&isolated_nodes(2), linear_decay_model(50.0), 1);
    let before = stiff.state().to_owned();
    let solver = DormandPrince {
        max_steps: 1,
        ..DormandPrince::default()
    };
    let err = simulate_adaptive(&mut stiff, &[0.0, 10.0], &solver, "dopri5").unwrap_err();
    assert_eq!(err.info().code, "max-steps");
    assert_eq!(stiff.state(), before);

    let mut flaky = population(&isolated_nodes(3), flaky_model(1.0, 4), 2);
    let before = flaky.state().to_owned();
    let err = simulate_adaptive(&mut flaky, &[0.0, 1.0], &DormandPrince::default(), "dopri5")
        .unwrap_err();
    assert_eq!(err.info().code, "transient-failure");
    assert_eq!(flaky.state(), before);
}

#[test]
fn tau_leaping_error_keeps_previous_step() {
    let mut reference = population(&isolated_nodes(3), flaky_model(4.0, usize::MAX), 2);
    simulate_tau_leaping(&mut reference, &[0.0, 0.5], &mut RngHandle::from_seed(21)).unwrap();

    let mut population = population(&isolated_nodes(3), flaky_model(4.0, 2), 2);
    let err = simulate_tau_leaping(&mut population, &[0.0, 0.5, 1.0], &mut RngHandle::from_seed(21))
        .unwrap_err();
    assert_eq!(err.info().code, "transient-failure");
    assert_eq!(population.state(), reference.state());
    assert!(population.state().iter().any(|value| *value != 10.0));
}

#[test]
fn dopri5_tracks_exponential_decay() {
    let mut population = population(&isolated_nodes(2), linear_decay_model(2.0), 1);
    let grid: Vec<f64> = (0..=20).map(|i| i as f64 * 0.05).collect();
    let trajectory =
        simulate_adaptive(&mut population, &grid, &DormandPrince::default(), "dopri5").unwrap();
    for (index, t) in grid.iter().enumerate() {
        let expected = 10.0 * (-2.0 * t).exp();
        let recorded = trajectory.at(index).unwrap();
        assert!(recorded.iter().all(|value| (value - expected).abs() < 1e-5));
    }
    assert_eq!(population.state(), trajectory.final_state().unwrap());
}

#[test]
fn adaptive_passes_method_through() {
    let mut population = population(&isolated_nodes(1), linear_decay_model(1.0), 1);
    let err = simulate_adaptive(&mut population, &[0.0, 1.0], &DormandPrince::default(), "lsoda")
        .unwrap_err();
    assert_eq!(err.info().code, "unknown-method");

    let trajectory =
        simulate_adaptive(&mut population, &[0.0, 0.5, 1.0], &DormandPrince::default(), "rk4")
            .unwrap();
    assert_eq!(trajectory.len(), 3);
}

#[test]
fn adaptive_agrees_with_fine_euler_on_test_graph() {
    let data = load_interaction_data("test").unwrap();
    let mut adaptive = population(&data, TestRateModel, 1);
    let mut euler = population(&data, TestRateModel, 1);
    let coarse = [0.0, 0.05];
    let fine: Vec<f64> = (0..=500).map(|i| i as f64 * 0.0001).collect();

    let adaptive_end = simulate_adaptive(&mut adaptive, &coarse, &DormandPrince::default(), "dopri5")
        .unwrap()
        .final_state()
        .unwrap()
        .to_owned();
    let euler_end = simulate_euler(&mut euler, &fine)
        .unwrap()
        .final_state()
        .unwrap()
        .to_owned();
    for (a, b) in adaptive_end.iter().zip(euler_end.iter()) {
        assert!((a - b).abs() < 1e-2 * (1.0 + b.abs()));
    }
}

#[test]
fn tau_leaping_is_reproducible_per_seed() {
    let data = load_interaction_data("test").unwrap();
    let grid: Vec<f64> = (0..10).map(|i| i as f64 * 0.01).collect();
    let run = |seed: u64| {
        let mut population = population(&data, TestRateModel, 2);
        let mut rng = RngHandle::from_seed(seed);
        simulate_tau_leaping(&mut population, &grid, &mut rng).unwrap()
    };
    assert_eq!(run(11), run(11));
    assert_ne!(run(11), run(12));
}

#[test]
fn tau_leaping_moves_by_whole_molecules() {
    let mut population = population(&gene_pair(), TestRateModel, 3);
    let mut rng = RngHandle::from_seed(5);
    let trajectory = simulate_tau_leaping(&mut population, &[0.0, 0.1, 0.2], &mut rng).unwrap();
    assert!(trajectory
        .states()
        .iter()
        .all(|value| value.fract() == 0.0 && *value >= 0.0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tau_leaping_never_goes_negative(
        seed in any::<u64>(),
        rate in 0.5f64..50.0,
        steps in 1usize..12,
        tau in 0.05f64..1.0,
    ) {
        let mut population = population(&isolated_nodes(4), linear_decay_model(rate), 3);
        let grid: Vec<f64> = (0..=steps).map(|i| i as f64 * tau).collect();
        let mut rng = RngHandle::from_seed(seed);
        let trajectory = simulate_tau_leaping(&mut population, &grid, &mut rng).unwrap();
        prop_assert!(trajectory.states().iter().all(|value| *value >= 0.0));
        prop_assert!(population.state().iter().all(|value| *value >= 0.0));
    }
}
