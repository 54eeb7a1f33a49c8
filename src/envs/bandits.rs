//! Multi-armed bandit environments
use super::{EnvStructure, Environment, Successor};
use crate::spaces::IndexSpace;
use crate::Prng;
use rand::distributions::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

/// Reward distribution of the bandit arms.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmDistribution {
    /// Each arm always gives its mean as the reward.
    Deterministic,
    /// Each arm gives reward 1 with probability equal to its mean, otherwise 0.
    Bernoulli,
}

/// A multi-armed bandit.
///
/// Every episode is a single step with a single constant observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bandit {
    /// Mean reward of each arm.
    pub means: Vec<f64>,
    pub distribution: ArmDistribution,
}

impl Bandit {
    pub fn new(means: Vec<f64>, distribution: ArmDistribution) -> Self {
        Self {
            means,
            distribution,
        }
    }

    /// A bandit whose arms give their values as fixed rewards.
    pub fn deterministic(values: Vec<f64>) -> Self {
        Self::new(values, ArmDistribution::Deterministic)
    }

    /// A bandit whose arms give 0-1 rewards with the given success probabilities.
    pub fn bernoulli(probabilities: Vec<f64>) -> Self {
        Self::new(probabilities, ArmDistribution::Bernoulli)
    }
}

impl Default for Bandit {
    fn default() -> Self {
        Self::bernoulli(vec![0.2, 0.8])
    }
}

impl EnvStructure for Bandit {
    type ObservationSpace = IndexSpace;
    type ActionSpace = IndexSpace;

    fn observation_space(&self) -> Self::ObservationSpace {
        IndexSpace::new(1)
    }

    fn action_space(&self) -> Self::ActionSpace {
        IndexSpace::new(self.means.len())
    }

    fn reward_range(&self) -> (f64, f64) {
        match self.distribution {
            ArmDistribution::Bernoulli => (0.0, 1.0),
            ArmDistribution::Deterministic => self
                .means
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| {
                    (lo.min(m), hi.max(m))
                }),
        }
    }

    fn discount_factor(&self) -> f64 {
        1.0
    }
}

impl Environment for Bandit {
    type State = ();

    fn initial_state(&self, _: &mut Prng) -> Self::State {}

    fn observe(&self, _: &Self::State, _: &mut Prng) -> usize {
        0
    }

    fn step(&self, _: Self::State, action: &usize, rng: &mut Prng) -> (Successor<()>, f64) {
        let mean = self.means[*action];
        let reward = match self.distribution {
            ArmDistribution::Deterministic => mean,
            ArmDistribution::Bernoulli => {
                let success = Bernoulli::new(mean.clamp(0.0, 1.0))
                    .map(|d| d.sample(rng))
                    .unwrap_or(false);
                if success {
                    1.0
                } else {
                    0.0
                }
            }
        };
        (Successor::Terminate, reward)
    }
}
