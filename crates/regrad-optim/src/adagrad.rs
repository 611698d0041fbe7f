use regrad_core::Result;

use crate::optimizer::{check_lengths, Optimizer, OptimizerState};

/// AdaGrad: per-parameter rates shrinking with the accumulated squared
/// gradient.
///
/// `G ← G + g²`, then `θ ← θ − rate · g / (√G + ε)`.
#[derive(Debug, Clone)]
pub struct AdaGrad {
    learning_rate: f64,
    epsilon: f64,
    sum_sq: Box<[f64]>,
}

impl AdaGrad {
    pub const DEFAULT_EPSILON: f64 = 1e-8;

    pub fn new(len: usize, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            epsilon: Self::DEFAULT_EPSILON,
            sum_sq: vec![0.0; len].into_boxed_slice(),
        }
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

impl Optimizer for AdaGrad {
    fn step(&mut self, params: &mut [f64], grads: &[f64]) -> Result<()> {
        check_lengths(self.sum_sq.len(), params, grads)?;

        let lr = self.learning_rate;
        let eps = self.epsilon;

        params
            .iter_mut()
            .zip(grads)
            .zip(self.sum_sq.iter_mut())
            .for_each(|((p, g), s)| {
                *s += g * g;
                *p -= lr * g / (s.sqrt() + eps);
            });

        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn len(&self) -> usize {
        self.sum_sq.len()
    }

    fn name(&self) -> &'static str {
        "adagrad"
    }

    fn state(&self) -> OptimizerState {
        let mut state = OptimizerState::new(self.name());
        state.set_scalar("lr", self.learning_rate);
        state.set_scalar("epsilon", self.epsilon);
        state.set_buffer("sum_sq", self.sum_sq.to_vec());
        state
    }
}
