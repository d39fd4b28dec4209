use std::sync::{PoisonError, RwLock};

use crate::prelude::*;

/// Receives the prediction made for every processed rating.
pub trait Validator: Send + Sync {
    fn validate(&self, prediction: f64, score: f64);
}

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn validate(&self, prediction: f64, score: f64) {
        (**self).validate(prediction, score);
    }
}

/// Root mean square error of the validated predictions.
///
/// Safe to share between partitions.
#[derive(Default)]
pub struct ErrorValidator(RwLock<SquaredError>);

#[derive(Default)]
struct SquaredError {
    sum: f64,
    count: usize,
}

impl SquaredError {
    fn rmse(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum / self.count as f64).sqrt()
    }
}

impl Validator for ErrorValidator {
    fn validate(&self, prediction: f64, score: f64) {
        let residual_error = score - prediction;
        let mut error = self.0.write().unwrap_or_else(PoisonError::into_inner);
        error.sum += residual_error * residual_error;
        error.count += 1;
    }
}

impl ErrorValidator {
    #[must_use]
    pub fn rmse(&self) -> f64 {
        self.0.read().unwrap_or_else(PoisonError::into_inner).rmse()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).count
    }

    /// Zeroes the accumulated error and returns the last RMSE.
    pub fn reset(&self) -> f64 {
        let mut error = self.0.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *error).rmse()
    }
}
