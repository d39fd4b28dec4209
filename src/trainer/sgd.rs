//! Stochastic gradient descent for matrix factorization.
//!
//! https://blog.insightdatascience.com/explicit-matrix-factorization-als-sgd-and-all-that-jazz-b00e4d9b21ea

use std::sync::{PoisonError, RwLock};

use crate::trainer::features::Features;
use crate::trainer::parameters::Parameters;

/// Applies the gradient steps and keeps the running mean of the observed scores,
/// which is the global bias of every prediction.
///
/// One instance is shared by all the keys of a learner, hence the lock around the bias.
pub struct Sgd {
    gamma: f64,
    lambda: f64,
    clip: f64,
    bias: RwLock<RunningBias>,
}

#[derive(Default)]
struct RunningBias {
    sum: f64,
    count: u64,
    mean: f64,
}

impl Sgd {
    #[must_use]
    pub fn new(parameters: &Parameters) -> Self {
        Self {
            gamma: parameters.gamma,
            lambda: parameters.lambda,
            clip: parameters.clip,
            bias: RwLock::default(),
        }
    }

    /// Adds the score to the running mean.
    pub fn add_observation(&self, score: f64) {
        let mut bias = self.bias.write().unwrap_or_else(PoisonError::into_inner);
        bias.sum += score;
        bias.count += 1;
        bias.mean = bias.sum / bias.count as f64;
    }

    /// Current global bias.
    #[must_use]
    pub fn bias(&self) -> f64 {
        self.bias.read().unwrap_or_else(PoisonError::into_inner).mean
    }

    /// Number of the observations behind the global bias.
    #[must_use]
    pub fn n_observations(&self) -> u64 {
        self.bias.read().unwrap_or_else(PoisonError::into_inner).count
    }

    /// Residual error of the prediction made with `features` and `other`.
    #[must_use]
    pub fn error(&self, features: &Features, other: &Features, score: f64) -> f64 {
        score - features.predict(other, self.bias())
    }

    /// Steps `features` against `other` by the error. `other` stays untouched.
    ///
    /// The error is clamped to `[-clip, clip]` when clipping is enabled.
    /// Nothing else is limited: a large enough `gamma` diverges into `NaN`.
    pub fn apply_error(&self, features: &mut Features, other: &Features, error: f64) {
        let error = if self.clip > 0.0 { error.clamp(-self.clip, self.clip) } else { error };
        features
            .vector
            .sgd_assign(&other.vector, error, self.gamma, self.lambda);
        features.bias += self.gamma * (error - self.lambda * features.bias);
    }

    /// Observes the score and steps `features` towards it.
    pub fn apply(&self, features: &mut Features, other: &Features, score: f64) {
        self.add_observation(score);
        let error = self.error(features, other, score);
        self.apply_error(features, other, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Arc;

    fn parameters(gamma: f64, lambda: f64, clip: f64) -> Parameters {
        Parameters {
            gamma,
            lambda,
            clip,
            ..Default::default()
        }
    }

    #[test]
    fn gradient_descent_ok() {
        let user = Features::from(vec![0.5, 0.5, 0.5]);
        let product = Features::from(vec![0.1, 0.1, 0.1]);
        let sgd = Sgd::new(&Parameters::default());

        let mut negative = user.clone();
        sgd.apply(&mut negative, &product, -1.0);
        let mut positive = user;
        sgd.apply(&mut positive, &product, 1.0);

        assert!(negative.dot(&product) < positive.dot(&product));
        assert_eq!(product, Features::from(vec![0.1, 0.1, 0.1]));
    }

    #[test]
    fn step_reduces_error_ok() {
        let sgd = Sgd::new(&parameters(0.1, 0.01, 0.0));
        let product = Features::from(vec![0.1, 0.2, 0.3]);
        let mut user = Features::from(vec![0.5, 0.5, 0.5]);
        sgd.add_observation(3.0);
        let before = sgd.error(&user, &product, 3.0);
        sgd.apply_error(&mut user, &product, before);
        let after = sgd.error(&user, &product, 3.0);
        assert!(after.abs() < before.abs(), "{} >= {}", after, before);
    }

    #[test]
    fn running_bias_ok() {
        let sgd = Sgd::new(&Parameters::default());
        assert_eq!(sgd.bias(), 0.0);
        sgd.add_observation(1.0);
        sgd.add_observation(2.0);
        sgd.add_observation(6.0);
        assert_eq!(sgd.bias(), 3.0);
        assert_eq!(sgd.n_observations(), 3);
    }

    #[test]
    fn running_bias_concurrent_ok() {
        let sgd = Arc::new(Sgd::new(&Parameters::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sgd = Arc::clone(&sgd);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        sgd.add_observation(2.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("the thread should not panic");
        }
        assert_eq!(sgd.n_observations(), 8000);
        assert_eq!(sgd.bias(), 2.0);
    }

    #[test]
    fn unclipped_diverges_ok() {
        let mut user = Features::from(vec![0.5, 0.5, 0.5]);
        let product = Features::from(vec![0.1, 0.1, 0.1]);
        let sgd = Sgd::new(&parameters(1e33, 0.001, 0.0));

        let mut prediction = 0.0;
        for _ in 0..11 {
            sgd.apply(&mut user, &product, -1.0);
            prediction = user.predict(&product, 0.0);
        }
        assert!(prediction.is_nan());
    }

    #[test]
    fn clipped_does_not_diverge_into_nan_ok() {
        let mut user = Features::from(vec![0.5, 0.5, 0.5]);
        let product = Features::from(vec![0.1, 0.1, 0.1]);
        let sgd = Sgd::new(&parameters(1e33, 0.001, 0.2));

        let mut prediction = 0.0;
        for _ in 0..11 {
            sgd.apply(&mut user, &product, -1.0);
            prediction = user.predict(&product, 0.0);
        }
        assert!(!prediction.is_nan());
    }
}
