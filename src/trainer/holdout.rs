//! Holdout validation against a read-only view of the model.

use tokio::time::interval;

use crate::prelude::*;
use crate::runtime::shutdown::Shutdown;
use crate::runtime::table::View;
use crate::trainer::models::Rating;
use crate::trainer::parameters::Parameters;
use crate::trainer::sgd::Sgd;
use crate::trainer::validator::{ErrorValidator, Validator};

/// Calculates the error over the ratings whose user and product are both already trained.
///
/// A separate running bias is maintained, the features are never changed.
pub fn evaluate(
    view: &impl View,
    ratings: &[Rating],
    parameters: &Parameters,
) -> Result<ErrorValidator> {
    let validator = ErrorValidator::default();
    let sgd = Sgd::new(parameters);
    for rating in ratings {
        let user = match view.get(&rating.user_id)?.and_then(|entry| entry.u) {
            Some(user) => user,
            None => continue,
        };
        let product = match view.get(&rating.product_id)?.and_then(|entry| entry.p) {
            Some(product) => product,
            None => continue,
        };
        sgd.add_observation(rating.score);
        validator.validate(user.predict(&product, sgd.bias()), rating.score);
    }
    Ok(validator)
}

/// Periodically logs the holdout error until the shutdown.
#[instrument(skip_all, fields(n_ratings = ratings.len()))]
pub async fn run(
    view: impl View,
    ratings: Vec<Rating>,
    parameters: Parameters,
    period: StdDuration,
    mut shutdown: Shutdown,
) -> Result {
    ensure!(!period.is_zero(), "holdout validation interval must be positive");
    let mut interval = interval(period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            _ = interval.tick() => {
                let validator = evaluate(&view, &ratings, &parameters)?;
                if validator.count() != 0 {
                    info!(rmse = validator.rmse(), count = validator.count(), "holdout");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::shutdown;
    use crate::trainer::features::Features;
    use crate::trainer::models::Entry;

    fn rating(user_id: &str, product_id: &str, score: f64) -> Rating {
        Rating {
            user_id: user_id.to_owned(),
            product_id: product_id.to_owned(),
            score,
        }
    }

    #[test]
    fn evaluate_ok() -> Result {
        let mut model = AHashMap::default();
        model.insert(
            "u1".to_owned(),
            Entry {
                u: Some(Features::from(vec![1.0, 0.0])),
                p: None,
            },
        );
        model.insert(
            "p1".to_owned(),
            Entry {
                u: None,
                p: Some(Features::from(vec![0.5, 1.0])),
            },
        );
        model.insert("p2".to_owned(), Entry::default());

        let ratings = [
            rating("u1", "p1", 2.0),
            rating("u1", "p2", 5.0),
            rating("u2", "p1", 5.0),
            rating("p1", "u1", 5.0),
        ];
        let validator = evaluate(&model, &ratings, &Parameters::default())?;

        // Only the first rating is known: bias 2.0, prediction 2.0 + 0.5.
        assert_eq!(validator.count(), 1);
        assert_eq!(validator.rmse(), 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn zero_interval_err() {
        let (_signal, shutdown) = shutdown::channel();
        let model: AHashMap<String, Entry> = AHashMap::default();
        let result =
            run(model, Vec::new(), Parameters::default(), StdDuration::ZERO, shutdown).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_ok() -> Result {
        let (signal, shutdown) = shutdown::channel();
        let model: AHashMap<String, Entry> = AHashMap::default();
        signal.trigger();
        run(model, Vec::new(), Parameters::default(), StdDuration::from_secs(1), shutdown).await
    }
}
