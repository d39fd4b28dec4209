use crate::prelude::*;

/// Stochastic gradient descent parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Parameters {
    /// Number of latent features.
    pub rank: usize,

    /// Learning step.
    pub gamma: f64,

    /// Regularization parameter.
    pub lambda: f64,

    /// Number of training passes over each rating.
    pub iterations: u32,

    /// Maximum absolute error applied in a single step, `0` disables clipping.
    pub clip: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            rank: 10,
            gamma: 0.001,
            lambda: 0.01,
            iterations: 1,
            clip: 0.0,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result {
        ensure!(self.rank > 0, "rank must be positive");
        ensure!(self.iterations >= 1, "at least one iteration is needed");
        ensure!(self.gamma.is_finite(), "gamma must be finite");
        ensure!(self.lambda.is_finite(), "lambda must be finite");
        ensure!(
            self.clip.is_finite() && self.clip >= 0.0,
            "clip must be a finite non-negative number, got {}",
            self.clip,
        );
        Ok(())
    }
}
