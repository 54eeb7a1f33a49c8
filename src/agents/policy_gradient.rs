//! Policy-gradient agent
use super::{Actor, ActorMode, Agent, BuildAgent, BuildAgentError, Step};
use crate::envs::EnvStructure;
use crate::logging::{Event, Logger};
use crate::nn::{functional, Activation, Adam, AdamConfig, Mlp, MlpConfig};
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace};
use crate::Prng;
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::mem;

/// Network architecture family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    /// Stack of `depth` dense tanh layers of width `size`.
    Auto,
}

/// Network specification for policies and baselines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    #[serde(rename = "type")]
    pub kind: NetworkType,
    /// Hidden layer width
    pub size: usize,
    /// Number of hidden layers
    pub depth: usize,
    /// Whether to add a recurrent layer. Not supported.
    pub rnn: bool,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            kind: NetworkType::Auto,
            size: 64,
            depth: 2,
            rnn: false,
        }
    }
}

impl NetworkSpec {
    pub fn mlp_config(&self) -> Result<MlpConfig, BuildAgentError> {
        if self.rnn {
            return Err(BuildAgentError::Unsupported("recurrent networks"));
        }
        match self.kind {
            NetworkType::Auto => Ok(MlpConfig {
                hidden_sizes: vec![self.size; self.depth],
                activation: Activation::Tanh,
                output_activation: Activation::Identity,
                ..MlpConfig::default()
            }),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySpec {
    pub network: NetworkSpec,
}

/// Experience memory type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Keep the most recent episodes needed for one update batch.
    Recent,
}

impl Default for MemoryKind {
    fn default() -> Self {
        Self::Recent
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateUnit {
    Episodes,
}

impl Default for UpdateUnit {
    fn default() -> Self {
        Self::Episodes
    }
}

/// When and on how much data to update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSpec {
    pub unit: UpdateUnit,
    /// Number of units in each update batch.
    pub batch_size: usize,
    /// Number of units between updates.
    pub frequency: usize,
}

impl Default for UpdateSpec {
    fn default() -> Self {
        Self {
            unit: UpdateUnit::Episodes,
            batch_size: 10,
            frequency: 10,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyGradientObjective {
    /// Use the clipped probability-ratio objective instead of log-likelihood.
    pub ratio_based: bool,
    /// Ratio clipping range `[1 - c, 1 + c]`.
    pub clipping_value: f64,
}

impl Default for PolicyGradientObjective {
    fn default() -> Self {
        Self {
            ratio_based: false,
            clipping_value: 0.2,
        }
    }
}

/// When horizon values are predicted by the baseline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonValues {
    /// When the episode is stored in memory.
    Early,
    /// When the episode is used in an update.
    Late,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardEstimation {
    /// Number of reward steps summed for each return; the whole episode if `None`.
    pub horizon: Option<usize>,
    pub discount: f64,
    /// Bootstrap returns beyond the horizon with baseline state values.
    pub predict_horizon_values: Option<HorizonValues>,
    /// Subtract the baseline state value from the return.
    pub estimate_advantage: bool,
    /// Predict action values instead of state values. Not supported.
    pub predict_action_values: bool,
}

impl Default for RewardEstimation {
    fn default() -> Self {
        Self {
            horizon: None,
            discount: 0.99,
            predict_horizon_values: None,
            estimate_advantage: false,
            predict_action_values: false,
        }
    }
}

/// Baseline optimizer: either a weight on the baseline loss in the policy objective
/// or a separate optimizer.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaselineOptimizer {
    Weight(f64),
    Adam(AdamConfig),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    State,
    Action,
}

/// Objective for training the baseline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueObjective {
    pub value: ValueKind,
}

impl ValueObjective {
    pub const fn state() -> Self {
        Self {
            value: ValueKind::State,
        }
    }
}

/// Configuration for [`PolicyGradientAgent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyGradientConfig {
    pub policy: PolicySpec,
    pub memory: MemoryKind,
    pub update: UpdateSpec,
    pub optimizer: AdamConfig,
    pub objective: PolicyGradientObjective,
    pub reward_estimation: RewardEstimation,
    /// Separate baseline network. The baseline shares the policy network if `None`.
    pub baseline_policy: Option<PolicySpec>,
    pub baseline_optimizer: Option<BaselineOptimizer>,
    pub baseline_objective: Option<ValueObjective>,
    /// Weight of the policy entropy bonus.
    pub entropy_regularization: f64,
}

impl Default for PolicyGradientConfig {
    fn default() -> Self {
        Self {
            policy: PolicySpec::default(),
            memory: MemoryKind::Recent,
            update: UpdateSpec::default(),
            optimizer: AdamConfig::default(),
            objective: PolicyGradientObjective::default(),
            reward_estimation: RewardEstimation::default(),
            baseline_policy: None,
            baseline_optimizer: None,
            baseline_objective: None,
            entropy_regularization: 0.0,
        }
    }
}

impl<OS, AS> BuildAgent<OS, AS> for PolicyGradientConfig
where
    OS: FeatureSpace,
    AS: FiniteSpace + SampleSpace,
{
    type Agent = PolicyGradientAgent<OS, AS>;

    fn build_agent<E>(&self, env: &E, rng: &mut Prng) -> Result<Self::Agent, BuildAgentError>
    where
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
    {
        PolicyGradientAgent::new(env, self, Prng::seed_from_u64(rng.gen()))
    }
}

/// State-value baseline.
#[derive(Debug, Clone, PartialEq)]
enum Baseline {
    None,
    /// Extra value output on the policy network with this loss weight.
    Shared { weight: f64 },
    /// Separate value network.
    Separate { network: Mlp, optimizer: Adam },
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Episode {
    features: Vec<Array1<f64>>,
    actions: Vec<usize>,
    /// Action log probabilities under the policy that selected them.
    log_probs: Vec<f64>,
    rewards: Vec<f64>,
    /// Features of the observation after the last step, unless it was terminal.
    final_features: Option<Array1<f64>>,
    /// Returns computed when the episode was stored.
    returns: Option<Vec<f64>>,
}

impl Episode {
    fn len(&self) -> usize {
        self.rewards.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingAction {
    features: Array1<f64>,
    action: usize,
    log_prob: f64,
}

/// Policy-gradient agent with a softmax policy over a finite action space.
///
/// Learns from batches of recent episodes using either the log-likelihood
/// ([REINFORCE][reinforce]) or the clipped probability-ratio ([PPO][ppo]) objective,
/// with optional state-value baseline, bootstrapped horizon returns, advantage estimation
/// and entropy regularization.
///
/// [reinforce]: https://link.springer.com/article/10.1007/BF00992696
/// [ppo]: https://arxiv.org/abs/1707.06347
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyGradientAgent<OS, AS> {
    observation_space: OS,
    action_space: AS,
    num_actions: usize,

    policy: Mlp,
    optimizer: Adam,
    baseline: Baseline,

    batch_size: usize,
    frequency: usize,
    ratio_based: bool,
    clipping_value: f64,
    horizon: Option<usize>,
    discount: f64,
    horizon_values: Option<HorizonValues>,
    estimate_advantage: bool,
    entropy_regularization: f64,

    memory: VecDeque<Episode>,
    current: Episode,
    pending: Option<PendingAction>,
    episodes_since_update: usize,
    mode: ActorMode,
    rng: Prng,
}

impl<OS, AS> PolicyGradientAgent<OS, AS>
where
    OS: FeatureSpace,
    AS: FiniteSpace,
{
    pub fn new<E>(
        env: &E,
        config: &PolicyGradientConfig,
        mut rng: Prng,
    ) -> Result<Self, BuildAgentError>
    where
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
    {
        let observation_space = env.observation_space();
        let action_space = env.action_space();
        let num_features = observation_space.num_features();
        let num_actions = action_space.size();
        if num_actions == 0 {
            return Err(BuildAgentError::EmptyActionSpace);
        }
        let estimation = &config.reward_estimation;
        if estimation.predict_action_values
            || matches!(config.baseline_objective, Some(ValueObjective { value: ValueKind::Action }))
        {
            return Err(BuildAgentError::Unsupported("action-value baselines"));
        }

        let baseline = match (&config.baseline_policy, config.baseline_optimizer) {
            (Some(spec), optimizer) => {
                let network = spec.network.mlp_config()?.build(num_features, 1, &mut rng);
                let optimizer_config = match optimizer {
                    Some(BaselineOptimizer::Adam(c)) => c,
                    Some(BaselineOptimizer::Weight(weight)) => AdamConfig {
                        learning_rate: config.optimizer.learning_rate * weight,
                        ..config.optimizer
                    },
                    None => config.optimizer,
                };
                Baseline::Separate {
                    optimizer: optimizer_config.build(&network),
                    network,
                }
            }
            (None, Some(BaselineOptimizer::Weight(weight))) => Baseline::Shared { weight },
            (None, Some(BaselineOptimizer::Adam(_))) => {
                return Err(BuildAgentError::Unsupported(
                    "a separate baseline optimizer without a baseline policy",
                ))
            }
            (None, None)
                if config.baseline_objective.is_some()
                    || estimation.predict_horizon_values.is_some()
                    || estimation.estimate_advantage =>
            {
                Baseline::Shared { weight: 1.0 }
            }
            (None, None) => Baseline::None,
        };

        let policy_outputs = match baseline {
            Baseline::Shared { .. } => num_actions + 1,
            _ => num_actions,
        };
        let policy = config
            .policy
            .network
            .mlp_config()?
            .build(num_features, policy_outputs, &mut rng);
        let optimizer = config.optimizer.build(&policy);
        let batch_size = config.update.batch_size.max(1);

        Ok(Self {
            observation_space,
            action_space,
            num_actions,
            policy,
            optimizer,
            baseline,
            batch_size,
            frequency: config.update.frequency.max(1),
            ratio_based: config.objective.ratio_based,
            clipping_value: config.objective.clipping_value,
            horizon: estimation.horizon,
            discount: estimation.discount,
            horizon_values: estimation.predict_horizon_values,
            estimate_advantage: estimation.estimate_advantage,
            entropy_regularization: config.entropy_regularization,
            memory: VecDeque::with_capacity(batch_size),
            current: Episode::default(),
            pending: None,
            episodes_since_update: 0,
            mode: ActorMode::Training,
            rng,
        })
    }

    /// Action log probabilities for a batch of feature vectors.
    fn log_policy(&self, features: ArrayView2<f64>) -> Array2<f64> {
        let output = self.policy.forward(features);
        functional::log_softmax(&output.slice(s![.., ..self.num_actions]).to_owned())
    }

    /// Baseline state values for a batch of feature vectors.
    fn state_values(&self, features: ArrayView2<f64>) -> Array1<f64> {
        match &self.baseline {
            Baseline::None => Array1::zeros(features.nrows()),
            Baseline::Shared { .. } => self
                .policy
                .forward(features)
                .index_axis_move(Axis(1), self.num_actions),
            Baseline::Separate { network, .. } => {
                network.forward(features).index_axis_move(Axis(1), 0)
            }
        }
    }

    /// Returns of each step of an episode, bootstrapped if horizon values are predicted.
    fn episode_returns(&self, episode: &Episode) -> Vec<f64> {
        let bootstrap = self.horizon_values.map(|_| {
            let mut values = self
                .state_values(stack_rows(&episode.features, self.observation_space.num_features()).view())
                .to_vec();
            values.push(episode.final_features.as_ref().map_or(0.0, |f| {
                self.state_values(f.view().insert_axis(Axis(0)))[0]
            }));
            values
        });
        horizon_returns(
            &episode.rewards,
            self.discount,
            self.horizon,
            bootstrap.as_deref(),
        )
    }

    fn finish_episode(&mut self, final_features: Option<Array1<f64>>, logger: &mut dyn Logger) {
        let mut episode = mem::take(&mut self.current);
        if episode.rewards.is_empty() {
            return;
        }
        episode.final_features = final_features;
        if self.horizon_values == Some(HorizonValues::Early) {
            episode.returns = Some(self.episode_returns(&episode));
        }
        if self.memory.len() >= self.batch_size {
            self.memory.pop_front();
        }
        self.memory.push_back(episode);
        self.episodes_since_update += 1;

        if self.episodes_since_update >= self.frequency && self.memory.len() >= self.batch_size {
            self.update_policy(logger);
            self.episodes_since_update = 0;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_policy(&mut self, logger: &mut dyn Logger) {
        let num_features = self.observation_space.num_features();
        let num_steps: usize = self.memory.iter().map(Episode::len).sum();
        let n = num_steps as f64;

        let mut returns = Vec::with_capacity(num_steps);
        for episode in &self.memory {
            match &episode.returns {
                Some(r) => returns.extend_from_slice(r),
                None => returns.extend(self.episode_returns(episode)),
            }
        }
        let returns = Array1::from(returns);
        let features = stack_rows(
            self.memory.iter().flat_map(|e| &e.features),
            num_features,
        );
        let actions: Vec<usize> = self.memory.iter().flat_map(|e| e.actions.iter().copied()).collect();
        let old_log_probs: Vec<f64> = self.memory.iter().flat_map(|e| e.log_probs.iter().copied()).collect();

        let values = self.state_values(features.view());
        let advantages = if self.estimate_advantage {
            &returns - &values
        } else {
            returns.clone()
        };

        let trace = self.policy.forward_trace(features.clone());
        let log_probs =
            functional::log_softmax(&trace.output().slice(s![.., ..self.num_actions]).to_owned());
        let mut output_grad = Array2::zeros(trace.output().raw_dim());
        let mut policy_loss = 0.0;
        let mut entropy_sum = 0.0;
        for (i, log_probs_i) in log_probs.axis_iter(Axis(0)).enumerate() {
            let action = actions[i];
            let advantage = advantages[i];
            let log_prob = log_probs_i[action];
            let scale = if self.ratio_based {
                let ratio = (log_prob - old_log_probs[i]).exp();
                let clipped_ratio = ratio.clamp(1.0 - self.clipping_value, 1.0 + self.clipping_value);
                policy_loss -= (ratio * advantage).min(clipped_ratio * advantage);
                // Zero gradient where the clipped term is the active minimum
                if (advantage > 0.0 && ratio > 1.0 + self.clipping_value)
                    || (advantage < 0.0 && ratio < 1.0 - self.clipping_value)
                {
                    0.0
                } else {
                    advantage * ratio
                }
            } else {
                policy_loss -= advantage * log_prob;
                advantage
            };
            let entropy = functional::entropy(log_probs_i);
            entropy_sum += entropy;
            for (j, &lp) in log_probs_i.iter().enumerate() {
                let p = lp.exp();
                let indicator = if j == action { 1.0 } else { 0.0 };
                output_grad[[i, j]] = (-scale * (indicator - p)
                    + self.entropy_regularization * p * (lp + entropy))
                    / n;
            }
        }

        let mut baseline_loss = None;
        if let Baseline::Shared { weight } = self.baseline {
            let mut loss = 0.0;
            for i in 0..num_steps {
                let residual = values[i] - returns[i];
                loss += 0.5 * residual * residual;
                output_grad[[i, self.num_actions]] = weight * residual / n;
            }
            baseline_loss = Some(loss / n);
        }
        let gradients = self.policy.backward(&trace, output_grad);
        self.optimizer.step(&mut self.policy, &gradients);

        if let Baseline::Separate { network, optimizer } = &mut self.baseline {
            let trace = network.forward_trace(features);
            let residuals = trace.output().column(0).to_owned() - &returns;
            baseline_loss = Some(0.5 * residuals.mapv(|r| r * r).sum() / n);
            let value_grad = (residuals / n).insert_axis(Axis(1));
            let gradients = network.backward(&trace, value_grad);
            optimizer.step(network, &gradients);
        }

        logger.log_scalar(Event::Update, "policy_loss", policy_loss / n);
        logger.log_scalar(Event::Update, "entropy", entropy_sum / n);
        if let Some(loss) = baseline_loss {
            logger.log_scalar(Event::Update, "baseline_loss", loss);
        }
        logger.log_scalar(Event::Update, "batch_num_steps", n);
        logger.log_scalar(Event::Update, "batch_num_episodes", self.memory.len() as f64);
        logger.done(Event::Update);
    }
}

impl<OS, AS> Actor<OS::Element, AS::Element> for PolicyGradientAgent<OS, AS>
where
    OS: FeatureSpace,
    AS: FiniteSpace + SampleSpace,
{
    fn act(&mut self, observation: &OS::Element, _new_episode: bool) -> AS::Element {
        let features = self.observation_space.features(observation);
        let log_probs = self
            .log_policy(features.view().insert_axis(Axis(0)))
            .index_axis_move(Axis(0), 0);
        let chosen = match self.mode {
            ActorMode::Training => WeightedIndex::new(log_probs.iter().map(|lp| lp.exp()))
                .ok()
                .map(|dist| dist.sample(&mut self.rng)),
            ActorMode::Evaluation => log_probs.argmax().ok(),
        };
        let action = chosen.unwrap_or_else(|| self.rng.gen_range(0..self.num_actions));
        self.pending = Some(PendingAction {
            features,
            action,
            log_prob: log_probs[action],
        });
        match self.action_space.from_index(action) {
            Some(element) => element,
            None => self.action_space.sample(&mut self.rng),
        }
    }
}

impl<OS, AS> Agent<OS::Element, AS::Element> for PolicyGradientAgent<OS, AS>
where
    OS: FeatureSpace,
    AS: FiniteSpace + SampleSpace,
{
    fn update(&mut self, step: Step<OS::Element, AS::Element>, logger: &mut dyn Logger) {
        if self.mode == ActorMode::Evaluation {
            self.pending = None;
            return;
        }
        let action = self.action_space.to_index(&step.action);
        let (features, log_prob) = match self.pending.take() {
            Some(pending) if pending.action == action => (pending.features, pending.log_prob),
            _ => {
                let features = self.observation_space.features(&step.observation);
                let log_prob =
                    self.log_policy(features.view().insert_axis(Axis(0)))[[0, action]];
                (features, log_prob)
            }
        };
        self.current.features.push(features);
        self.current.actions.push(action);
        self.current.log_probs.push(log_prob);
        self.current.rewards.push(step.reward);

        if step.episode_done {
            let final_features = step
                .next_observation
                .map(|o| self.observation_space.features(o));
            self.finish_episode(final_features, logger);
        }
    }

    fn set_actor_mode(&mut self, mode: ActorMode) {
        self.mode = mode;
    }
}

/// Stack feature vectors as the rows of a matrix.
fn stack_rows<'a, I>(rows: I, num_features: usize) -> Array2<f64>
where
    I: IntoIterator<Item = &'a Array1<f64>>,
{
    let rows: Vec<_> = rows.into_iter().collect();
    let mut matrix = Array2::zeros((rows.len(), num_features));
    for (mut dst, src) in matrix.rows_mut().into_iter().zip(rows) {
        dst.assign(src);
    }
    matrix
}

/// Discounted returns over at most `horizon` steps.
///
/// # Args
/// * `rewards` - Rewards of each step of an episode.
/// * `discount` - Discount factor.
/// * `horizon` - Maximum number of rewards in each return; unlimited if `None`.
/// * `bootstrap` - State values of the episode states followed by the value of the state
///     after the last step (zero if terminal). If given, each return is completed by the
///     discounted value of the state where it stops.
fn horizon_returns(
    rewards: &[f64],
    discount: f64,
    horizon: Option<usize>,
    bootstrap: Option<&[f64]>,
) -> Vec<f64> {
    let len = rewards.len();
    (0..len)
        .map(|t| {
            let end = horizon.map_or(len, |h| len.min(t.saturating_add(h.max(1))));
            let mut weight = 1.0;
            let mut value = 0.0;
            for reward in &rewards[t..end] {
                value += weight * reward;
                weight *= discount;
            }
            if let Some(values) = bootstrap {
                value += weight * values[end];
            }
            value
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use crate::envs::Bandit;
    use crate::logging::{LogError, Loggable};
    use rstest::rstest;

    #[rstest]
    #[case::full_episode(None, None, vec![1.75, 1.5, 1.0])]
    #[case::horizon_one(Some(1), None, vec![1.0, 1.0, 1.0])]
    #[case::horizon_two(Some(2), None, vec![1.5, 1.5, 1.0])]
    #[case::bootstrap_one(Some(1), Some(vec![0.0, 10.0, 20.0, 4.0]), vec![6.0, 11.0, 3.0])]
    #[case::bootstrap_terminal(None, Some(vec![9.0, 9.0, 9.0, 0.0]), vec![1.75, 1.5, 1.0])]
    fn returns(
        #[case] horizon: Option<usize>,
        #[case] bootstrap: Option<Vec<f64>>,
        #[case] expected: Vec<f64>,
    ) {
        let actual = horizon_returns(&[1.0, 1.0, 1.0], 0.5, horizon, bootstrap.as_deref());
        assert_eq!(actual, expected);
    }

    fn bandit_config() -> PolicyGradientConfig {
        PolicyGradientConfig {
            update: UpdateSpec {
                unit: UpdateUnit::Episodes,
                batch_size: 4,
                frequency: 1,
            },
            optimizer: AdamConfig::with_learning_rate(1e-2),
            ..PolicyGradientConfig::default()
        }
    }

    #[test]
    fn learns_deterministic_bandit() {
        testing::train_deterministic_bandit(&bandit_config(), 1000, 0.9);
    }

    #[test]
    fn learns_deterministic_bandit_ratio_based() {
        let config = PolicyGradientConfig {
            objective: PolicyGradientObjective {
                ratio_based: true,
                clipping_value: 0.2,
            },
            ..bandit_config()
        };
        testing::train_deterministic_bandit(&config, 1000, 0.9);
    }

    #[test]
    fn learns_deterministic_bandit_shared_baseline() {
        let config = PolicyGradientConfig {
            reward_estimation: RewardEstimation {
                horizon: Some(1),
                predict_horizon_values: Some(HorizonValues::Early),
                estimate_advantage: true,
                ..RewardEstimation::default()
            },
            baseline_optimizer: Some(BaselineOptimizer::Weight(0.5)),
            baseline_objective: Some(ValueObjective::state()),
            entropy_regularization: 1e-3,
            ..bandit_config()
        };
        testing::train_deterministic_bandit(&config, 1000, 0.9);
    }

    #[test]
    fn learns_deterministic_bandit_separate_baseline() {
        let config = PolicyGradientConfig {
            reward_estimation: RewardEstimation {
                predict_horizon_values: Some(HorizonValues::Late),
                estimate_advantage: true,
                ..RewardEstimation::default()
            },
            baseline_policy: Some(PolicySpec::default()),
            baseline_optimizer: Some(BaselineOptimizer::Adam(AdamConfig::with_learning_rate(
                1e-2,
            ))),
            baseline_objective: Some(ValueObjective::state()),
            ..bandit_config()
        };
        testing::train_deterministic_bandit(&config, 1000, 0.9);
    }

    #[test]
    fn rnn_unsupported() {
        let config = PolicyGradientConfig {
            policy: PolicySpec {
                network: NetworkSpec {
                    rnn: true,
                    ..NetworkSpec::default()
                },
            },
            ..PolicyGradientConfig::default()
        };
        let env = Bandit::default();
        let result = config.build_agent(&env, &mut Prng::seed_from_u64(0));
        assert!(matches!(result, Err(BuildAgentError::Unsupported(_))));
    }

    /// Counts completed updates.
    #[derive(Debug, Default)]
    struct UpdateCounter(usize);

    impl Logger for UpdateCounter {
        fn log(&mut self, _: Event, _: &str, _: Loggable) -> Result<(), LogError> {
            Ok(())
        }

        fn done(&mut self, event: Event) {
            if event == Event::Update {
                self.0 += 1;
            }
        }
    }

    #[test]
    fn update_schedule() {
        let config = PolicyGradientConfig {
            update: UpdateSpec {
                unit: UpdateUnit::Episodes,
                batch_size: 3,
                frequency: 2,
            },
            ..PolicyGradientConfig::default()
        };
        let env = Bandit::deterministic(vec![0.0, 1.0]);
        let mut agent = config
            .build_agent(&env, &mut Prng::seed_from_u64(0))
            .unwrap();
        let mut counter = UpdateCounter::default();
        for _ in 0..7 {
            let action = agent.act(&0, true);
            let step = Step {
                observation: 0,
                action,
                reward: env.means[action],
                next_observation: None,
                episode_done: true,
            };
            agent.update(step, &mut counter);
        }
        // Full batch first available after episode 3, then every 2 episodes
        assert_eq!(counter.0, 3);
    }

    #[test]
    fn config_from_tuner_json() {
        let config: PolicyGradientConfig = serde_json::from_str(
            r#"{
                "policy": {"network": {"type": "auto", "size": 64, "depth": 2, "rnn": false}},
                "memory": "recent",
                "update": {"unit": "episodes", "batch_size": 8, "frequency": 4},
                "optimizer": {"learning_rate": 0.001},
                "objective": {"ratio_based": true, "clipping_value": 0.2},
                "reward_estimation": {
                    "horizon": 10,
                    "discount": 0.95,
                    "predict_horizon_values": "early",
                    "estimate_advantage": true,
                    "predict_action_values": false
                },
                "baseline_policy": null,
                "baseline_optimizer": 2.5,
                "baseline_objective": {"value": "state"},
                "entropy_regularization": 0.01
            }"#,
        )
        .unwrap();
        assert_eq!(config.update.batch_size, 8);
        assert_eq!(config.reward_estimation.horizon, Some(10));
        assert_eq!(
            config.reward_estimation.predict_horizon_values,
            Some(HorizonValues::Early)
        );
        assert_eq!(config.baseline_optimizer, Some(BaselineOptimizer::Weight(2.5)));
        assert!(config.objective.ratio_based);
    }

    #[test]
    fn baseline_optimizer_adam_from_json() {
        let optimizer: BaselineOptimizer =
            serde_json::from_str(r#"{"learning_rate": 0.01}"#).unwrap();
        assert_eq!(
            optimizer,
            BaselineOptimizer::Adam(AdamConfig::with_learning_rate(0.01))
        );
    }
}
