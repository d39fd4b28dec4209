use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Vector(pub SmallVec<[f64; 32]>);

impl From<Vec<f64>> for Vector {
    fn from(vec: Vec<f64>) -> Self {
        Self(vec.into())
    }
}

impl Vector {
    #[must_use]
    pub fn zeros(length: usize) -> Self {
        Self(smallvec::smallvec![0.0; length])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Dot product over the common prefix of the two vectors.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(&other.0).map(|(xi, yi)| xi * yi).sum()
    }

    /// Adjusts the latent factors:
    /// `self += rhs * (error * rate) + self * (-regularization * rate)`.
    /// Components missing from `rhs` are only regularized.
    /// See: https://sifter.org/~simon/journal/20061211.html.
    pub fn sgd_assign(&mut self, rhs: &Self, error: f64, learning_rate: f64, regularization: f64) {
        debug_assert!(learning_rate >= 0.0);
        debug_assert!(regularization >= 0.0);

        let step = error * learning_rate;
        let decay = -regularization * learning_rate;
        for (i, left) in self.0.iter_mut().enumerate() {
            let penalty = *left * decay;
            *left += rhs.0.get(i).map_or(0.0, |right| right * step);
            *left += penalty;
        }
    }
}
