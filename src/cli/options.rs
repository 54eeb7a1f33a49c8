//! Command-line options
use crate::tune::TuneConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    version,
    about = "Reinforcement learning hyperparameter tuner",
    after_help = "Tunes the hyperparameters of a policy-gradient agent with BOHB."
)]
pub struct Options {
    /// Environment (name or configuration JSON file)
    pub environment: String,

    /// Level or game id, like `CartPole-v1`, if supported
    #[arg(short, long)]
    pub level: Option<String>,

    /// Maximum number of repetitions
    #[arg(short, long, default_value_t = 10)]
    pub max_repeats: u32,

    /// Number of BOHB iterations
    #[arg(short, long, default_value_t = 1)]
    pub num_iterations: usize,

    /// Output directory
    #[arg(short, long, default_value = "tuner")]
    pub directory: PathBuf,

    /// Restore from given directory
    #[arg(short, long)]
    pub restore: Option<PathBuf>,

    /// Unique worker id
    #[arg(long, default_value = "worker")]
    pub id: String,

    /// Number of evaluation threads. One per CPU if 0.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Random seed
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Maximum number of steps per episode. Overrides the environment default.
    #[arg(long)]
    pub max_episode_timesteps: Option<u64>,

    /// Seconds between displays of the logged statistics
    #[arg(long, default_value_t = 10)]
    pub display_period: u64,
}

impl From<&Options> for TuneConfig {
    fn from(opts: &Options) -> Self {
        Self {
            max_repeats: opts.max_repeats,
            num_iterations: opts.num_iterations,
            directory: opts.directory.clone(),
            restore: opts.restore.clone(),
            run_id: opts.id.clone(),
            num_workers: opts.workers,
            seed: opts.seed,
        }
    }
}
