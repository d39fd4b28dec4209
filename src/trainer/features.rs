use std::hash::BuildHasher;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::trainer::vector::Vector;

/// Latent factors of a single entity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Features {
    pub vector: Vector,
    pub bias: f64,
}

impl From<Vec<f64>> for Features {
    fn from(vector: Vec<f64>) -> Self {
        Self {
            vector: vector.into(),
            bias: 0.0,
        }
    }
}

impl Features {
    #[must_use]
    pub fn new(rank: usize) -> Self {
        Self {
            vector: Vector::zeros(rank),
            bias: 0.0,
        }
    }

    /// Features with the components drawn uniformly from `[0, 1)` and zero bias.
    #[must_use]
    pub fn random(rank: usize, rng: &mut impl Rng) -> Self {
        let mut features = Self::new(rank);
        for factor in features.vector.0.iter_mut() {
            *factor = rng.gen();
        }
        features
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.vector.len()
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.vector.dot(&other.vector)
    }

    /// Predicts the score for the pair given a global bias.
    #[must_use]
    pub fn predict(&self, other: &Self, global_bias: f64) -> f64 {
        global_bias + self.bias + other.bias + self.dot(other)
    }
}

/// Which side of a rating the features belong to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    User,
    Product,
}

/// Creates the initial features for a key.
///
/// The generator is seeded by the key and the side, so the same seed yields the same
/// initial features for a key no matter in which order the keys are first seen.
#[derive(Copy, Clone, Debug)]
pub struct Initializer {
    seed: u64,
}

impl Initializer {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    #[must_use]
    pub fn features(&self, key: &str, side: Side, rank: usize) -> Features {
        let state = ahash::RandomState::with_seeds(self.seed, side as u64, 0, 0);
        let mut rng = StdRng::seed_from_u64(BuildHasher::hash_one(&state, key));
        Features::random(rank, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_ok() {
        let mut user = Features::from(vec![1.0, 2.0, 3.0]);
        user.bias = 0.5;
        let mut product = Features::from(vec![3.0, 2.0, 1.0]);
        product.bias = -0.25;
        assert_eq!(user.predict(&product, 1.0), 1.0 + 0.5 - 0.25 + 10.0);
        assert_eq!(user.predict(&product, 1.0), product.predict(&user, 1.0));
    }

    #[test]
    fn random_ok() {
        let mut rng = StdRng::seed_from_u64(42);
        let features = Features::random(10, &mut rng);
        assert_eq!(features.rank(), 10);
        assert_eq!(features.bias, 0.0);
        assert!(features.vector.0.iter().all(|factor| (0.0..1.0).contains(factor)));
    }

    #[test]
    fn initializer_is_deterministic_ok() {
        let initializer = Initializer::new(1);
        assert_eq!(
            initializer.features("42", Side::User, 8),
            initializer.features("42", Side::User, 8),
        );
        assert_ne!(
            initializer.features("42", Side::User, 8),
            initializer.features("42", Side::Product, 8),
        );
        assert_ne!(
            initializer.features("42", Side::User, 8),
            Initializer::new(2).features("42", Side::User, 8),
        );
    }
}
