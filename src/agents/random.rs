use super::value_fns::{NullValueFunction, NullValueFunctionConfig};
use super::{Actor, Agent, BuildAgent, BuildAgentError, Step};
use crate::envs::EnvStructure;
use crate::logging::Logger;
use crate::spaces::{SampleSpace, Space};
use crate::Prng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for [`RandomAgent`]
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomAgentConfig {
    pub value_function: NullValueFunctionConfig,
}

impl<OS, AS> BuildAgent<OS, AS> for RandomAgentConfig
where
    OS: Space,
    AS: SampleSpace,
{
    type Agent = RandomAgent<AS>;

    fn build_agent<E>(&self, env: &E, rng: &mut Prng) -> Result<Self::Agent, BuildAgentError>
    where
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
    {
        Ok(RandomAgent::new(env.action_space(), rng.gen()))
    }
}

/// An agent that always acts randomly.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomAgent<AS> {
    action_space: AS,
    value_function: NullValueFunction,
    rng: Prng,
}

impl<AS> RandomAgent<AS> {
    pub fn new(action_space: AS, seed: u64) -> Self {
        Self {
            action_space,
            value_function: NullValueFunction,
            rng: Prng::seed_from_u64(seed),
        }
    }

    /// Estimated value of an observation; a random agent has no estimate beyond zero.
    pub fn state_value<O>(&self, observation: &O) -> f64 {
        self.value_function.state_value(observation)
    }
}

impl<O, AS: SampleSpace> Actor<O, AS::Element> for RandomAgent<AS> {
    fn act(&mut self, _observation: &O, _new_episode: bool) -> AS::Element {
        self.action_space.sample(&mut self.rng)
    }
}

impl<O, AS: SampleSpace> Agent<O, AS::Element> for RandomAgent<AS> {
    fn update(&mut self, _step: Step<O, AS::Element>, _logger: &mut dyn Logger) {}
}

impl<AS: fmt::Display> fmt::Display for RandomAgent<AS> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RandomAgent({})", self.action_space)
    }
}
