//! Sequential in-memory training, handy to tune the parameters without the partitioned runtime.

use crate::opts::LocalOpts;
use crate::prelude::*;
use crate::trainer::dataset;
use crate::trainer::features::{Initializer, Side};
use crate::trainer::holdout;
use crate::trainer::models::{Entry, Rating};
use crate::trainer::parameters::Parameters;
use crate::trainer::sgd::Sgd;
use crate::trainer::validator::{ErrorValidator, Validator};

pub struct LocalTrainer {
    parameters: Parameters,
    initializer: Initializer,
    sgd: Sgd,
    validator: ErrorValidator,
    model: AHashMap<String, Entry>,
}

impl LocalTrainer {
    pub fn new(parameters: Parameters, initializer: Initializer) -> Result<Self> {
        parameters.validate()?;
        Ok(Self {
            sgd: Sgd::new(&parameters),
            parameters,
            initializer,
            validator: ErrorValidator::default(),
            model: AHashMap::default(),
        })
    }

    #[must_use]
    pub const fn model(&self) -> &AHashMap<String, Entry> {
        &self.model
    }

    /// Makes a single pass over the ratings in the same order of steps as the learner does,
    /// and returns the training error of the pass.
    pub fn fit(&mut self, ratings: &[Rating]) -> f64 {
        let rank = self.parameters.rank;
        for rating in ratings {
            let user = self.model.entry(rating.user_id.clone()).or_default().u.take();
            let mut user = user.unwrap_or_else(|| {
                self.initializer.features(&rating.user_id, Side::User, rank)
            });

            let entry = self.model.entry(rating.product_id.clone()).or_default();
            let product = entry.p.get_or_insert_with(|| {
                self.initializer.features(&rating.product_id, Side::Product, rank)
            });
            self.validator
                .validate(product.predict(&user, self.sgd.bias()), rating.score);
            self.sgd.apply(product, &user, rating.score);
            let product = product.clone();

            self.sgd.apply(&mut user, &product, rating.score);
            self.model.entry(rating.user_id.clone()).or_default().u = Some(user);
        }
        self.validator.reset()
    }
}

#[instrument(skip_all)]
pub fn run(opts: LocalOpts) -> Result {
    let seed = opts.dataset.seed.unwrap_or_else(rand::random);
    info!(seed, "starting…");
    let ratings = dataset::read_ratings(&opts.dataset.input, seed)?;
    let (train, test) = dataset::split(ratings, opts.dataset.sample);
    info!(n_train = train.len(), n_test = test.len(), "split");

    let parameters = Parameters::from(opts.parameters);
    let mut trainer = LocalTrainer::new(parameters, Initializer::new(seed))?;
    for iteration in 1..=parameters.iterations {
        let train_rmse = trainer.fit(&train);
        let holdout = holdout::evaluate(trainer.model(), &test, &parameters)?;
        info!(
            iteration,
            train_rmse,
            test_rmse = holdout.rmse(),
            n_test = holdout.count(),
            bias = trainer.sgd.bias(),
            "pass",
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores made of hidden rank-2 factors.
    fn synthetic_ratings() -> Vec<Rating> {
        let mut ratings = Vec::new();
        for user in 0..12 {
            for product in 0..10 {
                let u = [(user % 3) as f64 / 2.0, (user % 4) as f64 / 3.0];
                let p = [(product % 2) as f64, (product % 5) as f64 / 4.0];
                ratings.push(Rating {
                    user_id: format!("u{}", user),
                    product_id: format!("p{}", product),
                    score: 1.0 + 2.0 * (u[0] * p[0] + u[1] * p[1]),
                });
            }
        }
        ratings
    }

    #[test]
    fn fit_reduces_error_ok() -> Result {
        let parameters = Parameters {
            rank: 3,
            gamma: 0.02,
            ..Parameters::default()
        };
        let ratings = synthetic_ratings();
        let mut trainer = LocalTrainer::new(parameters, Initializer::new(42))?;
        let first = trainer.fit(&ratings);
        let mut last = first;
        for _ in 0..20 {
            last = trainer.fit(&ratings);
        }
        assert!(last < first, "{} >= {}", last, first);
        assert_eq!(trainer.model().len(), 22);
        assert!(trainer.model().values().all(|entry| entry.u.is_some() != entry.p.is_some()));
        Ok(())
    }

    #[test]
    fn holdout_after_fit_ok() -> Result {
        let parameters = Parameters {
            rank: 3,
            gamma: 0.02,
            ..Parameters::default()
        };
        let ratings = synthetic_ratings();
        let mut trainer = LocalTrainer::new(parameters, Initializer::new(42))?;
        trainer.fit(&ratings);
        let validator = holdout::evaluate(trainer.model(), &ratings, &parameters)?;
        assert_eq!(validator.count(), ratings.len());
        Ok(())
    }
}
