//! Reinforcement learning environments
mod bandits;
mod builder;
mod cartpole;
mod chain;
#[cfg(test)]
pub mod testing;

pub use bandits::{ArmDistribution, Bandit};
pub use builder::{BuildEnvError, EnvDef, EnvKind, EnvVisitor};
pub use cartpole::{CartPole, CartPoleConfig, EnvironmentParams, PhysicalConstants, Push};
pub use chain::{Chain, Move};

use crate::spaces::Space;
use crate::Prng;

/// Observation and action spaces, reward bounds and discount of an environment.
pub trait EnvStructure {
    type ObservationSpace: Space;
    type ActionSpace: Space;

    /// Contains every observation the environment can produce (possibly more).
    fn observation_space(&self) -> Self::ObservationSpace;

    /// Every element of the action space is a valid action in every state.
    fn action_space(&self) -> Self::ActionSpace;

    /// Bounds `(min, max)` on the reward of a single step.
    fn reward_range(&self) -> (f64, f64);

    /// Discount factor in `[0, 1]` applied to future rewards.
    fn discount_factor(&self) -> f64;
}

/// The successor state of an environment step.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Successor<S> {
    /// The episode continues from the given state.
    Continue(S),
    /// The episode ends in a terminal state.
    ///
    /// All trajectories from a terminal state yield 0 reward on each step.
    Terminate,
}

impl<S> Successor<S> {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminate)
    }

    pub fn into_continue(self) -> Option<S> {
        match self {
            Self::Continue(state) => Some(state),
            Self::Terminate => None,
        }
    }
}

/// A reinforcement learning environment.
///
/// This defines the environment dynamics and structure.
/// It does not internally manage state so a single environment may be shared by many
/// concurrent simulations.
pub trait Environment: EnvStructure {
    type State;

    /// Sample a new initial state.
    fn initial_state(&self, rng: &mut Prng) -> Self::State;

    /// Sample an observation for a state.
    fn observe(
        &self,
        state: &Self::State,
        rng: &mut Prng,
    ) -> <Self::ObservationSpace as Space>::Element;

    /// Sample a state transition.
    ///
    /// # Returns
    /// * `successor`: The resulting state, or [`Successor::Terminate`] if the episode ended.
    /// * `reward`: The reward value for this transition.
    fn step(
        &self,
        state: Self::State,
        action: &<Self::ActionSpace as Space>::Element,
        rng: &mut Prng,
    ) -> (Successor<Self::State>, f64);
}
