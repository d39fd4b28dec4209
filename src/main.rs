use clap::Parser;

use crate::opts::{Opts, Subcommand};
use crate::prelude::*;

mod helpers;
mod opts;
mod prelude;
mod runtime;
mod trainer;

#[tokio::main]
async fn main() -> Result {
    let opts = Opts::parse();
    let _sentry_guard = helpers::tracing::init(opts.sentry_dsn.clone(), opts.traces_sample_rate)?;
    let result = run_subcommand(opts).await;
    if let Err(error) = &result {
        sentry::integrations::anyhow::capture_anyhow(error);
        error!("fatal error: {:#}", error);
    }
    result
}

async fn run_subcommand(opts: Opts) -> Result {
    match opts.subcommand {
        Subcommand::Learn(opts) => trainer::run(opts).await,
        Subcommand::Local(opts) => {
            tokio::task::spawn_blocking(move || trainer::local::run(opts)).await?
        }
    }
}
