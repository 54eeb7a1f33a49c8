//! Hyperparameter tuning of policy-gradient agents with BOHB
pub mod bohb;
mod kde;
pub mod result;
pub mod space;
pub mod worker;

pub use bohb::{Bohb, BohbConfig, Bracket, ConfigGenerator};
pub use kde::{MultivariateKde, VarType};
pub use result::{logged_results, ConfigId, ConfigRecord, JsonResultLogger, Run, TuneResult};
pub use space::{
    policy_gradient_space, Condition, ConfigSpace, Domain, Hyperparameter, Sample, SampleError,
    SpaceError, Value,
};
pub use worker::{EnvRunner, Evaluation, EvaluationInfo, RunEpisodes, Worker};

use crate::agents::BuildAgentError;
use crate::envs::Environment;
use crate::logging::Logger;
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace};
use crate::Prng;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error evaluating configurations or running the tuner.
#[derive(Debug, Error)]
pub enum TuneError {
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error("error building agent")]
    BuildAgent(#[from] BuildAgentError),
    #[error("budget {0} rounds to zero repetitions")]
    EmptyBudget(f64),
    #[error("{num_episodes} episodes is too few for a {window}-episode reward window")]
    TooFewEpisodes { num_episodes: usize, window: usize },
    #[error("invalid tuner settings: {0}")]
    InvalidSettings(&'static str),
    #[error("no configuration with id {0}")]
    UnknownConfig(ConfigId),
    #[error("evaluation workers stopped")]
    WorkersStopped,
    #[error("an evaluation worker panicked")]
    WorkerPanic,
    #[error("error reading or writing results")]
    Io(#[from] io::Error),
    #[error("invalid results data")]
    Json(#[from] serde_json::Error),
}

/// Tuning session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TuneConfig {
    /// Maximum number of repetitions per evaluation; the largest budget.
    pub max_repeats: u32,
    /// Number of Hyperband iterations.
    pub num_iterations: usize,
    /// Output directory.
    pub directory: PathBuf,
    /// Directory of a previous session to continue from.
    pub restore: Option<PathBuf>,
    pub run_id: String,
    /// Number of evaluation threads. One per CPU if zero.
    pub num_workers: usize,
    pub seed: u64,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            max_repeats: 10,
            num_iterations: 1,
            directory: "tuner".into(),
            restore: None,
            run_id: "worker".into(),
            num_workers: 1,
            seed: 1,
        }
    }
}

impl TuneConfig {
    pub fn bohb_config(&self) -> BohbConfig {
        BohbConfig {
            max_budget: self.max_repeats.into(),
            num_workers: if self.num_workers == 0 {
                num_cpus::get()
            } else {
                self.num_workers
            },
            run_id: self.run_id.clone(),
            ..BohbConfig::default()
        }
    }
}

/// Tune policy-gradient agent hyperparameters for an environment.
///
/// Configurations and runs are logged to `configs.jsonl` and `runs.jsonl`
/// in the output directory as they happen and the final result is saved to `results.json`.
pub fn tune<E>(
    env: &E,
    max_episode_timesteps: Option<u64>,
    config: &TuneConfig,
    logger: &mut dyn Logger,
) -> Result<TuneResult, TuneError>
where
    E: Environment + Sync + ?Sized,
    E::ObservationSpace: FeatureSpace,
    E::ActionSpace: FiniteSpace + SampleSpace,
{
    let previous = match &config.restore {
        Some(directory) => Some(logged_results(directory)?),
        None => None,
    };
    let mut result_logger = JsonResultLogger::new(&config.directory, true)?;

    let mut bohb = Bohb::new(
        policy_gradient_space()?,
        config.bohb_config(),
        Prng::seed_from_u64(config.seed),
    )?;
    if let Some(previous) = previous {
        bohb.warm_start(previous);
    }
    let worker = Worker::new(EnvRunner::new(env, max_episode_timesteps));
    let result = bohb.run(
        config.num_iterations,
        &worker,
        Some(&mut result_logger),
        logger,
    )?;
    result.save(&config.directory)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::Bandit;

    #[test]
    fn tune_bandit() {
        let dir = tempfile::tempdir().unwrap();
        let config = TuneConfig {
            max_repeats: 1,
            num_iterations: 1,
            directory: dir.path().into(),
            num_workers: 2,
            ..TuneConfig::default()
        };
        let env = Bandit::deterministic(vec![0.0, 1.0]);
        let result = tune(&env, None, &config, &mut ()).unwrap();

        // min and max budget differ by less than eta: a single stage of one config
        assert_eq!(result.num_configs(), 1);
        assert_eq!(result.all_runs().len(), 1);
        assert!(result.incumbent_id().is_some());

        let saved = TuneResult::load(dir.path().join(result::RESULTS_FILE)).unwrap();
        assert_eq!(saved, result);
        assert_eq!(logged_results(dir.path()).unwrap(), result);
    }

    #[test]
    fn restore_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = TuneConfig {
            directory: dir.path().join("out"),
            restore: Some(dir.path().join("missing")),
            ..TuneConfig::default()
        };
        let env = Bandit::default();
        assert!(matches!(
            tune(&env, None, &config, &mut ()),
            Err(TuneError::Io(_))
        ));
    }

    #[test]
    fn workers_default_to_cpus() {
        let config = TuneConfig {
            num_workers: 0,
            ..TuneConfig::default()
        };
        assert_eq!(config.bohb_config().num_workers, num_cpus::get());
        assert_eq!(config.bohb_config().max_budget, 10.0);
    }
}
