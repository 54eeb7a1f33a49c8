use super::schedules::ExplorationRateSchedule;
use super::value_fns::{DeepQNetwork, DeepQNetworkConfig};
use super::{Actor, ActorMode, Agent, BuildAgent, BuildAgentError, Step};
use crate::envs::EnvStructure;
use crate::logging::{Event, Logger};
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace};
use crate::Prng;
use ndarray::{Array1, Array2};
use ndarray_stats::QuantileExt;
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration for [`DqnAgent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub exploration_rate: ExplorationRateSchedule,
    /// Number of transitions per minibatch.
    pub batch_size: usize,
    /// Maximum number of transitions in the replay memory.
    pub memory_capacity: usize,
    /// Number of transitions to collect before the first update.
    pub min_replay_size: usize,
    /// Number of steps between updates.
    pub update_frequency: u64,
    /// Number of steps between target network synchronizations.
    pub target_update_frequency: u64,
    /// Discount factor; uses the environment discount factor if `None`.
    pub discount_factor: Option<f64>,
    pub value_function: DeepQNetworkConfig,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            exploration_rate: ExplorationRateSchedule::default(),
            batch_size: 32,
            memory_capacity: 10_000,
            min_replay_size: 500,
            update_frequency: 4,
            target_update_frequency: 500,
            discount_factor: None,
            value_function: DeepQNetworkConfig::default(),
        }
    }
}

impl<OS, AS> BuildAgent<OS, AS> for DqnConfig
where
    OS: FeatureSpace,
    AS: FiniteSpace + SampleSpace,
{
    type Agent = DqnAgent<OS, AS>;

    fn build_agent<E>(&self, env: &E, rng: &mut Prng) -> Result<Self::Agent, BuildAgentError>
    where
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
    {
        DqnAgent::new(env, self, Prng::seed_from_u64(rng.gen()))
    }
}

/// A stored environment transition.
#[derive(Debug, Clone, PartialEq)]
struct Transition {
    features: Array1<f64>,
    action: usize,
    reward: f64,
    /// Features of the next observation; `None` if the successor state is terminal.
    next_features: Option<Array1<f64>>,
}

/// Deep Q-Learning Agent
///
/// Based on
/// "[Playing Atari with Deep Reinforcement Learning][dqn]"
/// by Volodymyr Mnih et al. (2013)
///
/// [dqn]: https://arxiv.org/pdf/1312.5602.pdf
#[derive(Debug, Clone, PartialEq)]
pub struct DqnAgent<OS, AS> {
    observation_space: OS,
    action_space: AS,
    action_value_fn: DeepQNetwork,

    exploration_rate: ExplorationRateSchedule,
    batch_size: usize,
    memory_capacity: usize,
    min_replay_size: usize,
    update_frequency: u64,
    target_update_frequency: u64,
    discount_factor: f64,

    memory: VecDeque<Transition>,
    /// Total number of observed training steps.
    global_steps: u64,
    mode: ActorMode,
    rng: Prng,
}

impl<OS, AS> DqnAgent<OS, AS>
where
    OS: FeatureSpace,
    AS: FiniteSpace,
{
    pub fn new<E>(env: &E, config: &DqnConfig, mut rng: Prng) -> Result<Self, BuildAgentError>
    where
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
    {
        let observation_space = env.observation_space();
        let action_space = env.action_space();
        let num_actions = action_space.size();
        if num_actions == 0 {
            return Err(BuildAgentError::EmptyActionSpace);
        }
        let action_value_fn =
            config
                .value_function
                .build(observation_space.num_features(), num_actions, &mut rng);

        Ok(Self {
            observation_space,
            action_space,
            action_value_fn,
            exploration_rate: config.exploration_rate,
            batch_size: config.batch_size.max(1),
            memory_capacity: config.memory_capacity.max(1),
            min_replay_size: config.min_replay_size.max(config.batch_size),
            update_frequency: config.update_frequency.max(1),
            target_update_frequency: config.target_update_frequency.max(1),
            discount_factor: config
                .discount_factor
                .unwrap_or_else(|| env.discount_factor()),
            memory: VecDeque::new(),
            global_steps: 0,
            mode: ActorMode::Training,
            rng,
        })
    }

    /// Estimated value of an observation: the largest estimated action value.
    pub fn state_value(&self, observation: &OS::Element) -> f64 {
        let features = self.observation_space.features(observation);
        let values = self.action_value_fn.action_values(features.view());
        values.max().copied().unwrap_or(f64::NAN)
    }

    /// Number of transitions in the replay memory.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn greedy_action(&self, features: &Array1<f64>) -> Option<usize> {
        self.action_value_fn
            .action_values(features.view())
            .argmax()
            .ok()
    }

    #[allow(clippy::cast_precision_loss)]
    fn train_minibatch(&mut self, logger: &mut dyn Logger) {
        let index_dist = Uniform::new(0, self.memory.len());
        let batch: Vec<&Transition> = (0..self.batch_size)
            .map(|_| &self.memory[index_dist.sample(&mut self.rng)])
            .collect();

        let num_features = self.observation_space.num_features();
        let mut features = Array2::zeros((batch.len(), num_features));
        let mut next_features = Array2::zeros((batch.len(), num_features));
        for (i, transition) in batch.iter().enumerate() {
            features.row_mut(i).assign(&transition.features);
            if let Some(next) = &transition.next_features {
                next_features.row_mut(i).assign(next);
            }
        }
        let next_values = self.action_value_fn.target_max_values(next_features.view());
        let targets: Array1<f64> = batch
            .iter()
            .zip(&next_values)
            .map(|(t, next_value)| match t.next_features {
                Some(_) => t.reward + self.discount_factor * next_value,
                None => t.reward,
            })
            .collect();
        let actions: Vec<usize> = batch.iter().map(|t| t.action).collect();

        let loss = self
            .action_value_fn
            .train(features, &actions, targets.view());
        logger.log_scalar(Event::Update, "loss", loss);
        logger.log_scalar(Event::Update, "memory_size", self.memory.len() as f64);
        logger.done(Event::Update);
    }
}

impl<OS, AS> Actor<OS::Element, AS::Element> for DqnAgent<OS, AS>
where
    OS: FeatureSpace,
    AS: FiniteSpace + SampleSpace,
{
    fn act(&mut self, observation: &OS::Element, _new_episode: bool) -> AS::Element {
        let epsilon = self
            .exploration_rate
            .exploration_rate(self.global_steps, self.mode);
        if self.rng.gen::<f64>() >= epsilon {
            let features = self.observation_space.features(observation);
            if let Some(action) = self
                .greedy_action(&features)
                .and_then(|i| self.action_space.from_index(i))
            {
                return action;
            }
        }
        self.action_space.sample(&mut self.rng)
    }
}

impl<OS, AS> Agent<OS::Element, AS::Element> for DqnAgent<OS, AS>
where
    OS: FeatureSpace,
    AS: FiniteSpace + SampleSpace,
{
    fn update(&mut self, step: Step<OS::Element, AS::Element>, logger: &mut dyn Logger) {
        if self.mode == ActorMode::Evaluation {
            return;
        }
        if self.memory.len() >= self.memory_capacity {
            self.memory.pop_front();
        }
        self.memory.push_back(Transition {
            features: self.observation_space.features(&step.observation),
            action: self.action_space.to_index(&step.action),
            reward: step.reward,
            next_features: step
                .next_observation
                .map(|o| self.observation_space.features(o)),
        });
        self.global_steps += 1;

        if self.memory.len() >= self.min_replay_size
            && self.global_steps % self.update_frequency == 0
        {
            self.train_minibatch(logger);
        }
        if self.global_steps % self.target_update_frequency == 0 {
            self.action_value_fn.sync_target();
        }
    }

    fn set_actor_mode(&mut self, mode: ActorMode) {
        self.mode = mode;
    }
}
