// Demo: Linear Regression with regrad
//
// Fits y = 2 + 3x from noisy samples with every solver and both execution
// engines, then shows the expression graph and the compiled tape behind one
// fit.
//
// Run with RUST_LOG=debug to see the training loop's cost log.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regrad::exec::TapeMachine;
use regrad::prelude::*;

fn main() -> regrad::Result<()> {
    env_logger::init();

    println!(" regrad Linear Regression \n");

    //  Step 1: Synthetic data around y = 2 + 3x
    let mut rng = StdRng::seed_from_u64(42);
    let x: Vec<f64> = (0..50).map(|_| rng.gen_range(0.0..5.0)).collect();
    let y: Vec<f64> = x
        .iter()
        .map(|v| 2.0 + 3.0 * v + rng.gen_range(-0.1..0.1))
        .collect();
    log::info!("generated {} noisy samples around y = 2 + 3x", x.len());
    println!("{} samples, true line: y = 2 + 3x\n", x.len());

    //  Step 2: One fit per solver and engine
    let runs = [
        ("adam", FitOptions::new().with_adam(0.1)),
        ("vanilla", FitOptions::new().with_vanilla(0.02)),
        ("adagrad", FitOptions::new().with_adagrad(0.5)),
        (
            "vanilla + momentum",
            FitOptions::new().with_vanilla(0.005).with_momentum(0.9),
        ),
    ];
    for (label, options) in runs {
        for mode in [ExecutionMode::Tape, ExecutionMode::Interpreted] {
            let options = options.clone().with_execution_mode(mode);
            let thetas = fit_linear(&[&x], &y, &options)?;
            log::debug!("{label} on {mode}: {thetas:?}");
            println!(
                "{label:>20} [{:>11}]: theta_0 = {:.4}, theta_1 = {:.4}",
                mode.name(),
                thetas[0],
                thetas[1]
            );
        }
    }

    //  Step 3: Full report with cost history
    let report = fit(
        ModelKind::Linear,
        &[&x],
        &y,
        &FitOptions::default().with_record_every(2_000),
    )?;
    println!("\n{}", report.training);
    println!("prediction at x = 10: {:.4}", report.model.predict(&[10.0])?);

    //  Step 4: What the engine actually runs
    let small = RegressionGraph::build_linear(&[[1.0, 2.0, 3.0]], &[5.0, 8.0, 11.0])?;
    println!("\n Expression graph \n{}", small.graph());
    let tape = TapeMachine::compile(small.graph(), small.cost())?;
    println!("{}", tape.dump());

    Ok(())
}
