//! CLI options.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand as ClapSubcommand};

use crate::prelude::*;
use crate::trainer::parameters::Parameters;

pub mod parsers;

#[derive(Parser)]
#[command(author, version, about, long_about = None, propagate_version = true)]
pub struct Opts {
    /// Sentry DSN
    #[arg(short, long, env = "SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Performance monitoring sample rate for Sentry
    #[arg(long, default_value = "0", env = "COFACTOR_TRACES_SAMPLE_RATE")]
    pub traces_sample_rate: f32,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(ClapSubcommand)]
pub enum Subcommand {
    Learn(LearnOpts),
    Local(LocalOpts),
}

/// Runs the partitioned learner, the refeeder and the holdout validator in-process
#[derive(Args)]
pub struct LearnOpts {
    #[command(flatten)]
    pub dataset: DatasetOpts,

    #[command(flatten)]
    pub parameters: ParametersOpts,

    /// Learner group name, also the topic prefix
    #[arg(long, default_value = "cofactor-mlens")]
    pub group: String,

    /// Number of learner partitions
    #[arg(long, default_value = "8", value_parser = parsers::non_zero_usize)]
    pub partitions: usize,

    /// Delay before a rating is fed back for the next training pass
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub delay: StdDuration,

    /// Training error logging interval
    #[arg(long, default_value = "1s", value_parser = parsers::non_zero_duration)]
    pub log_interval: StdDuration,

    /// Holdout validation interval
    #[arg(long, default_value = "3s", value_parser = parsers::non_zero_duration)]
    pub validate_interval: StdDuration,

    /// Sequential passes used to initialize the model before the partitioned training, 0 disables
    #[arg(long, default_value = "0")]
    pub warm_start: u32,
}

/// Trains the model sequentially in memory, without the partitioned runtime
#[derive(Args)]
pub struct LocalOpts {
    #[command(flatten)]
    pub dataset: DatasetOpts,

    #[command(flatten)]
    pub parameters: ParametersOpts,
}

#[derive(Args)]
pub struct DatasetOpts {
    /// Input ratings file in the MovieLens CSV format
    #[arg(short, long, default_value = "/tmp/ratings")]
    pub input: PathBuf,

    /// Percentage of the input ratings used for training, the rest is the holdout set
    #[arg(long, default_value = "80", value_parser = parsers::percentage)]
    pub sample: usize,

    /// Seed for shuffling and feature initialization, random if omitted
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Stochastic gradient descent options.
#[derive(Args, Clone, Copy)]
pub struct ParametersOpts {
    /// Number of latent features
    #[arg(long, default_value = "10", value_parser = parsers::non_zero_usize)]
    pub rank: usize,

    /// Learning step
    #[arg(long, default_value = "0.001", value_parser = parsers::non_negative_f64)]
    pub gamma: f64,

    /// Regularization parameter
    #[arg(long, default_value = "0.01", value_parser = parsers::non_negative_f64)]
    pub lambda: f64,

    /// Number of training passes over each rating
    #[arg(long, default_value = "1", value_parser = parsers::non_zero_u32)]
    pub iterations: u32,

    /// Maximum absolute error applied in a single step, 0 disables clipping
    #[arg(long, default_value = "0", value_parser = parsers::non_negative_f64)]
    pub clip: f64,
}

impl From<ParametersOpts> for Parameters {
    fn from(opts: ParametersOpts) -> Self {
        Self {
            rank: opts.rank,
            gamma: opts.gamma,
            lambda: opts.lambda,
            iterations: opts.iterations,
            clip: opts.clip,
        }
    }
}
