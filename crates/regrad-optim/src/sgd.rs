use regrad_core::Result;

use crate::optimizer::{check_lengths, Optimizer, OptimizerState};

/// Plain gradient descent, with optional heavy-ball momentum.
///
/// Each step computes `v ← μ·v + g` and then `θ ← θ − rate·v`. With the
/// default `μ = 0` this is exactly `θ ← θ − rate·g`.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
    momentum: f64,
    velocity: Box<[f64]>,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `len` - The number of parameters this instance should hold.
    /// * `learning_rate` - The coefficient applied to every update.
    pub fn new(len: usize, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            velocity: vec![0.0; len].into_boxed_slice(),
        }
    }

    /// Set the momentum coefficient `μ`.
    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut [f64], grads: &[f64]) -> Result<()> {
        check_lengths(self.velocity.len(), params, grads)?;

        let lr = self.learning_rate;
        let mu = self.momentum;

        params
            .iter_mut()
            .zip(grads)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, g), v)| {
                *v = mu * *v + g;
                *p -= lr * *v;
            });

        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn len(&self) -> usize {
        self.velocity.len()
    }

    fn name(&self) -> &'static str {
        "vanilla"
    }

    fn state(&self) -> OptimizerState {
        let mut state = OptimizerState::new(self.name());
        state.set_scalar("lr", self.learning_rate);
        state.set_scalar("momentum", self.momentum);
        state.set_buffer("velocity", self.velocity.to_vec());
        state
    }
}
