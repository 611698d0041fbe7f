// Tests for the execution engines: tape vs interpreter agreement, pass
// ordering, and the Engine contract

use regrad::exec::{engine_for, Engine, Interpreter, TapeMachine};
use regrad::prelude::*;
use regrad::Graph;

fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{a} vs {b} (tol={tol})");
}

fn study_graph(link: LogisticLink) -> RegressionGraph {
    let hours = vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0];
    let sleep = vec![8.0, 6.5, 7.0, 5.0, 7.5, 6.0];
    let passed = vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0];
    RegressionGraph::build_logistic(&[hours, sleep], &passed, link).unwrap()
}

#[test]
fn engines_agree_on_cost_and_gradients() {
    for link in [LogisticLink::Sigmoid, LogisticLink::Complement] {
        let model = study_graph(link);
        let g = model.graph();
        let mut tape = TapeMachine::compile(g, model.cost()).unwrap();
        let mut interp = Interpreter::new(g, model.cost()).unwrap();

        let c1 = tape.forward(g).unwrap();
        let c2 = interp.forward(g).unwrap();
        assert_eq!(c1, c2);

        let g1 = tape.backward(g).unwrap();
        let g2 = interp.backward(g).unwrap();
        for &p in model.parameters() {
            assert_eq!(g1.scalar(p).unwrap(), g2.scalar(p).unwrap());
        }
        assert_eq!(g1.len(), g2.len());
        assert_eq!(
            tape.value(model.hypothesis()),
            interp.value(model.hypothesis())
        );
    }
}

#[test]
fn gradient_of_linear_cost_matches_closed_form() {
    // cost = mean((t0 + t1 x - y)²) at t0 = t1 = 1
    let x = [1.0, 2.0, 4.0];
    let y = [2.0, 3.0, 9.0];
    let model = RegressionGraph::build_linear(&[x], &y).unwrap();
    let mut engine = engine_for(ExecutionMode::Tape, model.graph(), model.cost()).unwrap();
    let cost = engine.forward(model.graph()).unwrap();
    let grads = engine.backward(model.graph()).unwrap();

    let resid: Vec<f64> = x.iter().zip(&y).map(|(xi, yi)| 1.0 + xi - yi).collect();
    let n = x.len() as f64;
    let expected_cost = resid.iter().map(|r| r * r).sum::<f64>() / n;
    let d0 = 2.0 / n * resid.iter().sum::<f64>();
    let d1 = 2.0 / n * resid.iter().zip(&x).map(|(r, xi)| r * xi).sum::<f64>();

    let params = model.parameters();
    assert_close(cost, expected_cost, 1e-12);
    assert_close(grads.scalar(params[0]).unwrap(), d0, 1e-12);
    assert_close(grads.scalar(params[1]).unwrap(), d1, 1e-12);
}

#[test]
fn engine_for_selects_strategy() {
    let model = study_graph(LogisticLink::Sigmoid);
    for mode in [ExecutionMode::Tape, ExecutionMode::Interpreted] {
        let engine = engine_for(mode, model.graph(), model.cost()).unwrap();
        assert_eq!(engine.mode(), mode);
    }
}

#[test]
fn backward_requires_forward_on_both_engines() {
    let model = study_graph(LogisticLink::Sigmoid);
    for mode in [ExecutionMode::Tape, ExecutionMode::Interpreted] {
        let mut engine = engine_for(mode, model.graph(), model.cost()).unwrap();
        let err = engine.backward(model.graph()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        engine.forward(model.graph()).unwrap();
        assert!(engine.backward(model.graph()).is_ok());

        engine.reset();
        assert!(engine.value(model.cost()).is_none());
        assert!(engine.backward(model.graph()).is_err());
    }
}

#[test]
fn non_scalar_root_is_rejected() {
    let model = study_graph(LogisticLink::Sigmoid);
    for mode in [ExecutionMode::Tape, ExecutionMode::Interpreted] {
        let err = engine_for(mode, model.graph(), model.hypothesis()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }
}

#[test]
fn forward_picks_up_parameter_updates() {
    let mut g = Graph::new();
    let w = g.parameter("w", 2.0);
    let x = g.data("x", vec![1.0, 3.0]).unwrap();
    let wx = g.mul(w, x).unwrap();
    let cost = g.mean(wx).unwrap();

    let mut tape = TapeMachine::compile(&g, cost).unwrap();
    assert_eq!(tape.forward(&g).unwrap(), 4.0);
    tape.reset();
    g.set_parameter(w, -1.0).unwrap();
    assert_eq!(tape.forward(&g).unwrap(), -2.0);
}

#[test]
fn full_runs_are_identical_across_engines() {
    let hours = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0];
    let passed = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0];
    for solver in SolverKind::ALL {
        let base = FitOptions::new()
            .with_solver(solver)
            .with_learning_rate(0.05)
            .with_iterations(1500);
        let tape = fit_logistic(
            &[hours],
            &passed,
            &base.clone().with_execution_mode(ExecutionMode::Tape),
        )
        .unwrap();
        let interp = fit_logistic(
            &[hours],
            &passed,
            &base.with_execution_mode(ExecutionMode::Interpreted),
        )
        .unwrap();
        assert_eq!(tape, interp, "{solver}");
    }
}
