//! Reinforcement learning agents
mod dqn;
mod policy_gradient;
mod random;
mod registry;
pub mod schedules;
#[cfg(test)]
pub mod testing;
pub mod value_fns;

pub use dqn::{DqnAgent, DqnConfig};
pub use policy_gradient::{
    BaselineOptimizer, HorizonValues, MemoryKind, NetworkSpec, NetworkType, PolicyGradientAgent,
    PolicyGradientConfig, PolicyGradientObjective, PolicySpec, RewardEstimation, UpdateSpec,
    UpdateUnit, ValueKind, ValueObjective,
};
pub use random::{RandomAgent, RandomAgentConfig};
pub use registry::{create_agent, get_default_config, AgentType, BoxAgent, UnknownAgentError};

use crate::config::ConfigError;
use crate::envs::EnvStructure;
use crate::logging::Logger;
use crate::spaces::Space;
use crate::Prng;
use thiserror::Error;

/// Description of an environment step
#[derive(Debug, Clone, PartialEq)]
pub struct Step<'a, O, A> {
    /// The initial observation.
    pub observation: O,
    /// The action taken from the initial state given the initial observation.
    pub action: A,
    /// The resulting reward.
    pub reward: f64,
    /// The resulting successor state; is None if the successor state is terminal.
    /// All trajectories from a terminal state have 0 reward on each step.
    pub next_observation: Option<&'a O>,
    /// Whether this step ends the episode.
    /// An episode is always done if it reaches a terminal state.
    /// An episode may be done for other reasons, like a step limit.
    pub episode_done: bool,
}

/// Whether an actor is collecting experience for training or being evaluated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ActorMode {
    /// Explore and learn.
    Training,
    /// Act greedily without learning.
    Evaluation,
}

impl Default for ActorMode {
    fn default() -> Self {
        Self::Training
    }
}

/// An actor that produces actions given observations.
pub trait Actor<O, A> {
    /// Choose an action in the environment.
    ///
    /// This must be called sequentially within an episode.
    ///
    /// # Args
    /// * `observation`: The current observation of the environment state.
    /// * `new_episode`: Whether this observation is the start of a new episode.
    fn act(&mut self, observation: &O, new_episode: bool) -> A;
}

/// A learning agent.
///
/// Can interact with an environment and learns from the interaction.
pub trait Agent<O, A>: Actor<O, A> {
    /// Update the agent based on the most recent action.
    ///
    /// # Args
    /// * `step`: The environment step resulting from the  most recent call to [`Actor::act`].
    /// * `logger`: Logger for update statistics.
    fn update(&mut self, step: Step<O, A>, logger: &mut dyn Logger);

    /// Switch between training and evaluation behaviour.
    fn set_actor_mode(&mut self, _mode: ActorMode) {}
}

impl<O, A, T: Actor<O, A> + ?Sized> Actor<O, A> for Box<T> {
    fn act(&mut self, observation: &O, new_episode: bool) -> A {
        T::act(self, observation, new_episode)
    }
}

impl<O, A, T: Agent<O, A> + ?Sized> Agent<O, A> for Box<T> {
    fn update(&mut self, step: Step<O, A>, logger: &mut dyn Logger) {
        T::update(self, step, logger)
    }

    fn set_actor_mode(&mut self, mode: ActorMode) {
        T::set_actor_mode(self, mode)
    }
}

/// Build an agent instance for an environment structure.
pub trait BuildAgent<OS: Space, AS: Space> {
    type Agent: Agent<OS::Element, AS::Element>;

    /// Build an agent for the given environment structure.
    ///
    /// # Args:
    /// `env` - The structure of the environment in which the agent is to operate.
    /// `rng` - Used to seed the agent's random state and initialize its parameters.
    fn build_agent<E>(&self, env: &E, rng: &mut Prng) -> Result<Self::Agent, BuildAgentError>
    where
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized;
}

/// Error building an agent
#[derive(Debug, Error)]
pub enum BuildAgentError {
    #[error(transparent)]
    UnknownAgent(#[from] UnknownAgentError),
    #[error("invalid agent configuration")]
    InvalidConfig(#[from] ConfigError),
    #[error("unsupported agent configuration: {0}")]
    Unsupported(&'static str),
    #[error("action space must not be empty")]
    EmptyActionSpace,
}
