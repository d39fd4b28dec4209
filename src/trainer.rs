//! Factorizes the user-product rating matrix on a stream of ratings.
//!
//! See [`learner`] for the training protocol.

use tokio::time::interval;

use crate::helpers::tracing::format_duration;
use crate::opts::LearnOpts;
use crate::prelude::*;
use crate::runtime::shutdown::Shutdown;
use crate::trainer::features::Initializer;
use crate::trainer::learner::Learner;
use crate::trainer::local::LocalTrainer;
use crate::trainer::parameters::Parameters;
use crate::trainer::pipeline::Pipeline;
use crate::trainer::validator::ErrorValidator;

pub mod codec;
pub mod dataset;
pub mod features;
pub mod holdout;
pub mod learner;
pub mod local;
pub mod models;
pub mod parameters;
pub mod pipeline;
pub mod refeeder;
pub mod sgd;
pub mod validator;
pub mod vector;

#[instrument(skip_all)]
pub async fn run(opts: LearnOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "learner"));

    let seed = opts.dataset.seed.unwrap_or_else(rand::random);
    let ratings = dataset::read_ratings(&opts.dataset.input, seed)?;
    let (train, test) = dataset::split(ratings, opts.dataset.sample);
    let parameters = Parameters::from(opts.parameters);
    info!(
        seed,
        n_train = train.len(),
        n_test = test.len(),
        ?parameters,
        delay = format_duration(opts.delay).as_str(),
        "starting…",
    );

    let validator = Arc::new(ErrorValidator::default());
    let mut pipeline = Pipeline::start(
        &opts.group,
        parameters,
        opts.delay,
        opts.partitions,
        seed,
        Arc::clone(&validator),
    )?;
    let report = report(
        Arc::clone(&validator),
        Arc::clone(pipeline.learner()),
        opts.log_interval,
        pipeline.shutdown(),
    );
    pipeline.spawn(report);
    let holdout = holdout::run(
        pipeline.view(),
        test.clone(),
        parameters,
        opts.validate_interval,
        pipeline.shutdown(),
    );
    pipeline.spawn(holdout);

    if opts.warm_start != 0 {
        let mut trainer = LocalTrainer::new(parameters, Initializer::new(seed))?;
        for _ in 0..opts.warm_start {
            let rmse = trainer.fit(&train);
            debug!(rmse, "warm-start pass");
        }
        pipeline.load(trainer.model()).await?;
    }

    pipeline.produce(&train)?;
    tokio::select! {
        result = pipeline.wait_idle() => {
            result?;
            info!("all the passes are done");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            warn!("interrupted");
        }
    }

    let view = pipeline.view();
    pipeline.stop().await?;
    if view.is_empty() {
        warn!("nothing has been learned");
    }
    let holdout = holdout::evaluate(&view, &test, &parameters)?;
    info!(
        rmse = holdout.rmse(),
        count = holdout.count(),
        n_keys = view.len(),
        "final holdout",
    );
    Ok(())
}

/// Periodically logs the training error, which is then reset.
async fn report(
    validator: Arc<ErrorValidator>,
    learner: Arc<Learner<Arc<ErrorValidator>>>,
    period: StdDuration,
    mut shutdown: Shutdown,
) -> Result {
    ensure!(!period.is_zero(), "training error logging interval must be positive");
    let mut interval = interval(period);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            _ = interval.tick() => {
                let count = validator.count();
                if count != 0 {
                    let rmse = validator.reset();
                    let sgd = learner.sgd();
                    info!(
                        rmse,
                        count,
                        bias = sgd.bias(),
                        n_observations = sgd.n_observations(),
                        "training",
                    );
                }
            }
        }
    }
    Ok(())
}
