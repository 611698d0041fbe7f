// Tests for fit_linear / fit_logistic: convergence, solver choice, option
// handling, failures and the execution context

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use regrad::optim::Optimizer;
use regrad::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{a} vs {b} (tol={tol})");
}

const HOURS: [f64; 10] = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0];
const PASSED: [f64; 10] = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0];

fn line() -> ([f64; 5], [f64; 5]) {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0];
    let y = x.map(|v| 2.0 + 3.0 * v);
    (x, y)
}

// Linear regression

#[test]
fn linear_default_options_recover_the_line() {
    init_logging();
    let (x, y) = line();
    let thetas = fit_linear(&[x], &y, &FitOptions::default()).unwrap();
    assert_eq!(thetas.len(), 2);
    assert_close(thetas[0], 2.0, 0.1);
    assert_close(thetas[1], 3.0, 0.1);
}

#[test]
fn every_solver_converges_on_the_line() {
    let (x, y) = line();
    let cases = [
        FitOptions::new().with_vanilla(0.05),
        FitOptions::new().with_adam(0.1),
        FitOptions::new().with_adagrad(0.5),
        FitOptions::new().with_vanilla(0.01).with_momentum(0.9),
    ];
    for options in cases {
        let thetas = fit_linear(&[x], &y, &options).unwrap();
        assert_close(thetas[0], 2.0, 0.1);
        assert_close(thetas[1], 3.0, 0.1);
    }
}

#[test]
fn two_features_keep_their_order() {
    let x1 = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let x2 = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 1.0 + 2.0 * a - b).collect();
    let thetas = fit_linear(&[x1, x2], &y, &FitOptions::default()).unwrap();
    assert_eq!(thetas.len(), 3);
    assert_close(thetas[0], 1.0, 0.05);
    assert_close(thetas[1], 2.0, 0.05);
    assert_close(thetas[2], -1.0, 0.05);
}

#[test]
fn parameter_count_is_features_plus_one() {
    let y = [1.0, 2.0, 3.0, 5.0];
    for n in 1..=4 {
        let features: Vec<Vec<f64>> = (0..n)
            .map(|j| (0..4).map(|i| ((i * (j + 2)) % 5) as f64).collect())
            .collect();
        let options = FitOptions::new().with_iterations(10);
        assert_eq!(fit_linear(&features, &y, &options).unwrap().len(), n + 1);
    }
}

#[test]
fn noisy_samples_fit_within_tolerance() {
    let mut rng = StdRng::seed_from_u64(7);
    let x: Vec<f64> = (0..50).map(|_| rng.gen_range(0.0..5.0)).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|v| 2.0 + 3.0 * v + rng.gen_range(-0.1..0.1))
        .collect();
    let thetas = fit_linear(&[x], &y, &FitOptions::default()).unwrap();
    assert_close(thetas[0], 2.0, 0.1);
    assert_close(thetas[1], 3.0, 0.1);
}

#[test]
fn zero_iterations_return_initial_thetas() {
    let (x, y) = line();
    let options = FitOptions::new().with_iterations(0);
    assert_eq!(fit_linear(&[x], &y, &options).unwrap(), vec![1.0, 1.0]);
    assert_eq!(
        fit_logistic(&[HOURS, HOURS], &PASSED, &options).unwrap(),
        vec![1.0, 1.0, 1.0]
    );
}

// Logistic regression

#[test]
fn study_hours_weight_is_positive_and_predictions_increase() {
    init_logging();
    let report = fit(
        ModelKind::Logistic,
        &[HOURS],
        &PASSED,
        &FitOptions::default().with_record_every(1000),
    )
    .unwrap();
    let thetas = report.parameters();
    assert!(thetas[1] > 0.0, "theta_1 = {}", thetas[1]);

    let predictions = report.model.predict_columns(&[HOURS]).unwrap();
    assert!(predictions.windows(2).all(|w| w[0] < w[1]));
    assert!(predictions[0] < 0.5 && predictions[9] > 0.5);

    assert_eq!(report.training.iterations, 10_000);
    assert_eq!(report.training.history.len(), 10);
    let first = report.training.history[0].cost;
    let last = report.training.final_cost.unwrap();
    assert!(last < first);
}

#[test]
fn five_sample_pass_fail_scenario() {
    let thetas = fit_logistic(
        &[[1.0, 2.0, 3.0, 4.0, 5.0]],
        &[0.0, 0.0, 0.0, 1.0, 1.0],
        &FitOptions::default(),
    )
    .unwrap();
    assert_eq!(thetas.len(), 2);
    assert!(thetas[1] > 0.0, "theta_1 = {}", thetas[1]);

    let model = FittedModel {
        kind: ModelKind::Logistic,
        link: LogisticLink::Sigmoid,
        parameters: thetas,
    };
    let predictions = model.predict_columns(&[[1.0, 2.0, 3.0, 4.0, 5.0]]).unwrap();
    assert!(predictions.windows(2).all(|w| w[0] < w[1]), "{predictions:?}");
    assert!(predictions[2] < 0.5 && predictions[3] > 0.5);
}

#[test]
fn saturated_sample_does_not_poison_gradients() {
    // exp(999) overflows for the first sample at the initial thetas
    let features = [[-1000.0, -2.0, 1.0, 3.0]];
    let target = [0.0, 0.0, 1.0, 1.0];
    for mode in [ExecutionMode::Tape, ExecutionMode::Interpreted] {
        let options = FitOptions::new()
            .with_iterations(5)
            .with_execution_mode(mode);
        let thetas = fit_logistic(&features, &target, &options).unwrap();
        assert!(thetas.iter().all(|t| t.is_finite()), "{mode}: {thetas:?}");

        let flipped = options.with_link(LogisticLink::Complement);
        let features = [[1000.0, -2.0, 1.0, 3.0]];
        let thetas = fit_logistic(&features, &target, &flipped).unwrap();
        assert!(thetas.iter().all(|t| t.is_finite()), "{mode}: {thetas:?}");
    }
}

#[test]
fn logistic_predictions_stay_inside_the_unit_interval() {
    let thetas = fit_logistic(&[HOURS], &PASSED, &FitOptions::default()).unwrap();
    let model = FittedModel {
        kind: ModelKind::Logistic,
        link: LogisticLink::Sigmoid,
        parameters: thetas,
    };
    for i in -50..=150 {
        let p = model.predict(&[i as f64 / 10.0]).unwrap();
        assert!(p > 0.0 && p < 1.0, "prediction {p} at {}", i as f64 / 10.0);
    }
}

#[test]
fn complement_link_flips_the_weights() {
    let sigmoid = fit_logistic(&[HOURS], &PASSED, &FitOptions::default()).unwrap();
    let options = FitOptions::default().with_link(LogisticLink::Complement);
    let report = fit(ModelKind::Logistic, &[HOURS], &PASSED, &options).unwrap();
    let complement = report.parameters();
    assert!(complement[1] < 0.0);
    assert_close(complement[0], -sigmoid[0], 0.05);
    assert_close(complement[1], -sigmoid[1], 0.05);

    let predictions = report.model.predict_columns(&[HOURS]).unwrap();
    assert!(predictions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn logistic_from_csv_file() {
    let dir = std::env::temp_dir().join(format!("regrad-fit-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("study.csv");
    let mut csv = String::from("Hours,Pass\n");
    for (h, p) in HOURS.iter().zip(PASSED) {
        csv.push_str(&format!("{h},{p}\n"));
    }
    std::fs::write(&path, csv).unwrap();

    let cols = read_columns(&path, &ColumnSpec::new("Pass").feature("Hours")).unwrap();
    let from_file =
        fit_logistic(&cols.feature_slices(), &cols.target, &FitOptions::default()).unwrap();
    let in_memory = fit_logistic(&[HOURS], &PASSED, &FitOptions::default()).unwrap();
    assert_eq!(from_file, in_memory);
}

// Input and configuration errors

#[test]
fn mismatched_lengths_are_shape_errors() {
    let err = fit_linear(&[[1.0, 2.0, 3.0]], &[1.0, 2.0], &FitOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);

    let err = fit_logistic(
        &[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]],
        &[0.0, 1.0],
        &FitOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        Error::SampleCountMismatch { feature: 1, .. }
    ));
}

#[test]
fn empty_inputs_are_shape_errors() {
    let none: [&[f64]; 0] = [];
    let err = fit_linear(&none, &[1.0], &FitOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    let err = fit_linear(&[[0.0f64; 0]], &[], &FitOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn configuration_errors_come_first() {
    // Mismatched columns would be a shape error; the bad option wins.
    let bad_columns = [vec![1.0, 2.0, 3.0]];
    let bad_target = [1.0];

    let err = fit_linear(
        &bad_columns,
        &bad_target,
        &FitOptions::new().with_adam(0.1).with_momentum(0.5),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = fit_linear(
        &bad_columns,
        &bad_target,
        &FitOptions::new().with_learning_rate(-1.0),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    // Linear defaults to Adam, so bare momentum conflicts.
    let (x, y) = line();
    let err = fit_linear(&[x], &y, &FitOptions::new().with_momentum(0.5)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    // Logistic defaults to vanilla, where momentum is allowed.
    let options = FitOptions::new().with_momentum(0.5).with_iterations(5);
    assert!(fit_logistic(&[HOURS], &PASSED, &options).is_ok());
}

#[test]
fn string_options() {
    let err = FitOptions::from_pairs([("solver", "newton")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    let err = FitOptions::from_pairs([("epochs", "10")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let options = FitOptions::from_pairs([
        ("solver", "adagrad"),
        ("learning_rate", "0.5"),
        ("execution_mode", "interpreted"),
    ])
    .unwrap();
    let (x, y) = line();
    let thetas = fit_linear(&[x], &y, &options).unwrap();
    assert_close(thetas[1], 3.0, 0.1);
}

// Failures during training

#[test]
fn divergence_stops_with_iteration_context() {
    let (x, y) = line();
    let options = FitOptions::new().with_vanilla(10.0).with_iterations(1000);
    let err = fit_linear(&[x], &y, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().starts_with("iteration "), "{err}");
    assert!(matches!(err.root_cause(), Error::NonFinite { .. }));
}

struct Poisoned;

impl Optimizer for Poisoned {
    fn step(&mut self, params: &mut [f64], _grads: &[f64]) -> regrad::Result<()> {
        params.iter_mut().for_each(|p| *p = f64::NAN);
        Ok(())
    }
    fn learning_rate(&self) -> f64 {
        1.0
    }
    fn len(&self) -> usize {
        2
    }
    fn name(&self) -> &'static str {
        "poisoned"
    }
    fn state(&self) -> regrad::optim::OptimizerState {
        regrad::optim::OptimizerState::new("poisoned")
    }
}

#[test]
fn injected_optimizer_failure_names_the_iteration() {
    let (x, y) = line();
    let mut model = RegressionGraph::build_linear(&[x], &y).unwrap();
    let engine =
        regrad::exec::engine_for(ExecutionMode::Tape, model.graph(), model.cost()).unwrap();
    let adam = SolverKind::Adam.build(2, 0.1, None).unwrap();
    let mut trainer = Trainer::new(engine, adam, 10)
        .with_optimizer(Box::new(Poisoned))
        .unwrap();
    let err = trainer.train(&mut model).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().starts_with("iteration 1: forward pass"), "{err}");
}

// Execution context

#[test]
fn accelerator_is_released_after_success_and_failure() {
    let (x, y) = line();
    let ctx = ExecutionContext::accelerator(1);

    let ok = FitOptions::new().with_iterations(50).with_context(ctx);
    fit_linear(&[x], &y, &ok).unwrap();
    assert!(ctx.try_acquire().unwrap().is_some());

    let failing = FitOptions::new()
        .with_vanilla(10.0)
        .with_iterations(1000)
        .with_context(ctx);
    assert!(fit_linear(&[x], &y, &failing).is_err());
    assert!(ctx.try_acquire().unwrap().is_some());

    let shape_error = fit_linear(&[[1.0, 2.0]], &y, &ok);
    assert!(shape_error.is_err());
    assert!(ctx.try_acquire().unwrap().is_some());
}

#[test]
fn accelerator_results_match_host() {
    let (x, y) = line();
    let host = FitOptions::new().with_iterations(300);
    let device = host.clone().with_context(ExecutionContext::accelerator(2));
    assert_eq!(
        fit_linear(&[x], &y, &host).unwrap(),
        fit_linear(&[x], &y, &device).unwrap()
    );
}

#[test]
fn out_of_range_accelerator_is_a_config_error() {
    let (x, y) = line();
    let options =
        FitOptions::new().with_context(ExecutionContext::accelerator(regrad::MAX_ACCELERATORS));
    let err = fit_linear(&[x], &y, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn concurrent_fits_are_independent() {
    let (x, y) = line();
    let options = FitOptions::new().with_iterations(500);
    let expected = fit_linear(&[x], &y, &options).unwrap();
    let results: Vec<Vec<f64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let options = options
                    .clone()
                    .with_context(ExecutionContext::accelerator(3 + i % 2));
                s.spawn(move || fit_linear(&[x], &y, &options).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for r in results {
        assert_eq!(r, expected);
    }
}
