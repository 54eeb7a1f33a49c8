//! Tuning objective: evaluate a policy-gradient configuration by running episodes
use super::space::{Sample, SampleError};
use super::TuneError;
use crate::agents::{
    BaselineOptimizer, BuildAgentError, HorizonValues, MemoryKind, NetworkSpec,
    PolicyGradientConfig, PolicyGradientObjective, PolicySpec, RewardEstimation, UpdateSpec,
    UpdateUnit, ValueObjective,
};
use crate::envs::Environment;
use crate::nn::AdamConfig;
use crate::simulation::Runner;
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace};
use crate::utils::stats;
use crate::Prng;
use serde::{Deserialize, Serialize};

/// Number of episodes run per repetition.
pub const NUM_EPISODES: u64 = 200;
/// Number of episodes in a reward window.
pub const REWARD_WINDOW: usize = 20;
/// Entropy regularization values below this are set to zero.
pub const ENTROPY_THRESHOLD: f64 = 3e-5;

/// Number of episodes between updates: a fraction of the batch size, at least one.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn update_frequency(frequency: f64, batch_size: usize) -> usize {
    ((frequency * batch_size as f64) as usize).max(1)
}

pub fn clamp_entropy_regularization(entropy_regularization: f64) -> f64 {
    if entropy_regularization < ENTROPY_THRESHOLD {
        0.0
    } else {
        entropy_regularization
    }
}

/// Round half to even, as in banker's rounding.
pub fn round_half_even(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        x.round()
    }
}

/// How the baseline is provided.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BaselineMode {
    /// No baseline.
    No,
    /// Value head on the policy network.
    Same,
    /// Separate baseline network.
    Yes,
}

impl BaselineMode {
    pub fn from_sample(sample: &Sample) -> Result<Self, SampleError> {
        match sample.get_choice("baseline")? {
            "no" => Ok(Self::No),
            "same" => Ok(Self::Same),
            "yes" => Ok(Self::Yes),
            other => Err(SampleError::InvalidChoice {
                name: "baseline".into(),
                value: other.into(),
            }),
        }
    }
}

/// Baseline-related agent settings selected by a [`BaselineMode`].
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineBundle {
    pub predict_horizon_values: Option<HorizonValues>,
    pub estimate_advantage: bool,
    pub predict_action_values: bool,
    pub baseline_policy: Option<PolicySpec>,
    pub baseline_optimizer: Option<BaselineOptimizer>,
    pub baseline_objective: Option<ValueObjective>,
}

impl BaselineBundle {
    pub fn from_sample(sample: &Sample) -> Result<Self, SampleError> {
        let bundle = match BaselineMode::from_sample(sample)? {
            BaselineMode::No => Self {
                predict_horizon_values: None,
                estimate_advantage: false,
                predict_action_values: false,
                baseline_policy: None,
                baseline_optimizer: None,
                baseline_objective: None,
            },
            BaselineMode::Same => Self {
                predict_horizon_values: Some(HorizonValues::Early),
                estimate_advantage: sample.get_flag("estimate_advantage")?,
                predict_action_values: false,
                baseline_policy: None,
                baseline_optimizer: Some(BaselineOptimizer::Weight(
                    sample.get_float("baseline_weight")?,
                )),
                baseline_objective: Some(ValueObjective::state()),
            },
            BaselineMode::Yes => Self {
                predict_horizon_values: Some(HorizonValues::Early),
                estimate_advantage: sample.get_flag("estimate_advantage")?,
                predict_action_values: false,
                baseline_policy: Some(default_policy()),
                baseline_optimizer: Some(BaselineOptimizer::Adam(AdamConfig::with_learning_rate(
                    sample.get_float("baseline_learning_rate")?,
                ))),
                baseline_objective: Some(ValueObjective::state()),
            },
        };
        Ok(bundle)
    }
}

fn default_policy() -> PolicySpec {
    PolicySpec {
        network: NetworkSpec::default(),
    }
}

/// Positive integer hyperparameter.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn get_count(sample: &Sample, name: &str) -> Result<usize, SampleError> {
    Ok(sample.get_int(name)?.max(1) as usize)
}

/// Policy-gradient agent configuration for a hyperparameter sample.
pub fn agent_config(sample: &Sample) -> Result<PolicyGradientConfig, SampleError> {
    let batch_size = get_count(sample, "batch_size")?;
    let baseline = BaselineBundle::from_sample(sample)?;
    Ok(PolicyGradientConfig {
        policy: default_policy(),
        memory: MemoryKind::Recent,
        update: UpdateSpec {
            unit: UpdateUnit::Episodes,
            batch_size,
            frequency: update_frequency(sample.get_float("frequency")?, batch_size),
        },
        optimizer: AdamConfig::with_learning_rate(sample.get_float("learning_rate")?),
        objective: PolicyGradientObjective {
            ratio_based: sample.get_flag("ratio_based")?,
            clipping_value: 0.2,
        },
        reward_estimation: RewardEstimation {
            horizon: Some(get_count(sample, "horizon")?),
            discount: sample.get_float("discount")?,
            predict_horizon_values: baseline.predict_horizon_values,
            estimate_advantage: baseline.estimate_advantage,
            predict_action_values: baseline.predict_action_values,
        },
        baseline_policy: baseline.baseline_policy,
        baseline_optimizer: baseline.baseline_optimizer,
        baseline_objective: baseline.baseline_objective,
        entropy_regularization: clamp_entropy_regularization(
            sample.get_float("entropy_regularization")?,
        ),
    })
}

/// Runs episodes of freshly built agents.
pub trait RunEpisodes {
    /// Build an agent from `config`, run it for `num_episodes` episodes,
    /// and return the total reward of each episode.
    fn run_episodes(
        &self,
        config: &PolicyGradientConfig,
        num_episodes: u64,
        rng: &mut Prng,
    ) -> Result<Vec<f64>, BuildAgentError>;
}

/// Runs episodes in a shared environment.
#[derive(Debug)]
pub struct EnvRunner<'a, E: ?Sized> {
    env: &'a E,
    max_episode_timesteps: Option<u64>,
}

impl<'a, E: ?Sized> EnvRunner<'a, E> {
    pub const fn new(env: &'a E, max_episode_timesteps: Option<u64>) -> Self {
        Self {
            env,
            max_episode_timesteps,
        }
    }
}

impl<'a, E> RunEpisodes for EnvRunner<'a, E>
where
    E: Environment + ?Sized,
    E::ObservationSpace: FeatureSpace,
    E::ActionSpace: FiniteSpace + SampleSpace,
{
    fn run_episodes(
        &self,
        config: &PolicyGradientConfig,
        num_episodes: u64,
        rng: &mut Prng,
    ) -> Result<Vec<f64>, BuildAgentError> {
        let mut runner = Runner::from_config(config, self.env, self.max_episode_timesteps, rng)?;
        runner.run(num_episodes, false, &mut ());
        Ok(runner.close())
    }
}

/// Auxiliary evaluation information.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInfo {
    /// Episode rewards of each repetition.
    pub rewards: Vec<Vec<f64>>,
}

/// Result of evaluating a hyperparameter sample. Lower loss is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f64,
    pub info: EvaluationInfo,
}

fn check_num_episodes(rewards: &[f64]) -> Result<(), TuneError> {
    if rewards.len() > REWARD_WINDOW {
        Ok(())
    } else {
        Err(TuneError::TooFewEpisodes {
            num_episodes: rewards.len(),
            window: REWARD_WINDOW,
        })
    }
}

/// Mean reward of the last [`REWARD_WINDOW`] episodes.
pub fn final_reward(rewards: &[f64]) -> Result<f64, TuneError> {
    check_num_episodes(rewards)?;
    let last = &rewards[rewards.len() - REWARD_WINDOW..];
    stats::mean(last).ok_or(TuneError::TooFewEpisodes {
        num_episodes: rewards.len(),
        window: REWARD_WINDOW,
    })
}

/// Largest mean reward of [`REWARD_WINDOW`] consecutive episodes.
///
/// Windows start at `0 .. len - REWARD_WINDOW` (exclusive)
/// so the window ending on the final episode is not considered.
pub fn max_windowed_reward(rewards: &[f64]) -> Result<f64, TuneError> {
    check_num_episodes(rewards)?;
    Ok(stats::window_means(&rewards[..rewards.len() - 1], REWARD_WINDOW)
        .fold(f64::NEG_INFINITY, f64::max))
}

/// Evaluates hyperparameter samples.
#[derive(Debug)]
pub struct Worker<R> {
    runner: R,
}

impl<R: RunEpisodes> Worker<R> {
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Evaluate a sample with `round(budget)` independent repetitions.
    ///
    /// The loss is `-mean(final rewards) - mean(max window rewards)` over the repetitions.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn compute(
        &self,
        sample: &Sample,
        budget: f64,
        rng: &mut Prng,
    ) -> Result<Evaluation, TuneError> {
        let config = agent_config(sample)?;
        let repetitions = round_half_even(budget);
        if repetitions.is_nan() || repetitions < 1.0 {
            return Err(TuneError::EmptyBudget(budget));
        }

        let mut final_rewards = Vec::new();
        let mut max_rewards = Vec::new();
        let mut rewards = Vec::new();
        for _ in 0..repetitions as u64 {
            let episode_rewards = self.runner.run_episodes(&config, NUM_EPISODES, rng)?;
            final_rewards.push(final_reward(&episode_rewards)?);
            max_rewards.push(max_windowed_reward(&episode_rewards)?);
            rewards.push(episode_rewards);
        }

        let mean_final_reward = stats::mean(&final_rewards).unwrap_or(f64::NAN);
        let mean_max_reward = stats::mean(&max_rewards).unwrap_or(f64::NAN);
        Ok(Evaluation {
            loss: -mean_final_reward - mean_max_reward,
            info: EvaluationInfo { rewards },
        })
    }
}
