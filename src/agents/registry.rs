//! Agent registry: agent types by name with their default configurations
use super::{Agent, BuildAgent, BuildAgentError, DqnConfig, RandomAgentConfig};
use crate::config::{Config, ConfigError};
use crate::envs::EnvStructure;
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace, Space};
use crate::Prng;
use enum_map::Enum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Agent type name not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("no such agent: {name}")]
pub struct UnknownAgentError {
    pub name: String,
}

/// The registered agent types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum AgentType {
    #[serde(rename = "RandomAgent")]
    Random,
    #[serde(rename = "DQNAgent")]
    Dqn,
}

/// Boxed agent acting in an environment with observation space `OS` and action space `AS`.
pub type BoxAgent<OS, AS> = Box<dyn Agent<<OS as Space>::Element, <AS as Space>::Element>>;

impl AgentType {
    pub const ALL: [Self; 2] = [Self::Random, Self::Dqn];

    /// Registered name of the agent type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Random => "RandomAgent",
            Self::Dqn => "DQNAgent",
        }
    }

    /// Default agent configuration paired with the default value function configuration.
    pub fn default_config(self) -> Result<(Config, Config), ConfigError> {
        let mut agent = match self {
            Self::Random => Config::from_serializable(&RandomAgentConfig::default())?,
            Self::Dqn => Config::from_serializable(&DqnConfig::default())?,
        };
        let value_function = match agent.remove("value_function") {
            Some(value) => Config::try_from(value)?,
            None => Config::new(),
        };
        Ok((agent, value_function))
    }

    /// Full agent configuration: defaults overridden by the given configurations.
    ///
    /// # Args
    /// * `agent_config` - Overrides the agent defaults.
    ///     Its `value_function` entry, if any, overrides the value function defaults.
    /// * `network_config` - Overrides the value function network.
    pub fn resolve_config(
        self,
        agent_config: &Config,
        network_config: &Config,
    ) -> Result<Config, ConfigError> {
        let (agent_default, mut value_function) = self.default_config()?;
        let mut config = agent_default.with_update(agent_config);
        if let Some(overrides) = agent_config.get_config("value_function") {
            value_function.update(&overrides);
        }
        if !network_config.is_empty() {
            let mut overrides = Config::new();
            overrides.set("network", network_config.clone().into_value());
            value_function.update(&overrides);
        }
        config.set("value_function", value_function.into_value());
        Ok(config)
    }

    /// Create an agent of this type for an environment.
    pub fn create<OS, AS, E>(
        self,
        agent_config: &Config,
        network_config: &Config,
        env: &E,
        rng: &mut Prng,
    ) -> Result<BoxAgent<OS, AS>, BuildAgentError>
    where
        OS: FeatureSpace + 'static,
        AS: FiniteSpace + SampleSpace + 'static,
        E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
    {
        let config = self.resolve_config(agent_config, network_config)?;
        let agent: BoxAgent<OS, AS> = match self {
            Self::Random => Box::new(
                config
                    .deserialize::<RandomAgentConfig>()?
                    .build_agent(env, rng)?,
            ),
            Self::Dqn => Box::new(config.deserialize::<DqnConfig>()?.build_agent(env, rng)?),
        };
        Ok(agent)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentType {
    type Err = UnknownAgentError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|agent_type| agent_type.name() == name)
            .ok_or_else(|| UnknownAgentError { name: name.into() })
    }
}

/// Create an agent by type name.
///
/// # Args
/// * `agent_type` - Registered agent type name: `RandomAgent` or `DQNAgent`.
/// * `agent_config` - Agent configuration, merged over the agent defaults.
/// * `network_config` - Network configuration, merged over the value function network.
/// * `env` - Structure of the environment the agent acts in.
/// * `rng` - Seeds the agent's random state and parameter initialization.
pub fn create_agent<OS, AS, E>(
    agent_type: &str,
    agent_config: &Config,
    network_config: &Config,
    env: &E,
    rng: &mut Prng,
) -> Result<BoxAgent<OS, AS>, BuildAgentError>
where
    OS: FeatureSpace + 'static,
    AS: FiniteSpace + SampleSpace + 'static,
    E: EnvStructure<ObservationSpace = OS, ActionSpace = AS> + ?Sized,
{
    agent_type
        .parse::<AgentType>()?
        .create(agent_config, network_config, env, rng)
}

/// Default agent configuration and default value function configuration of an agent type.
pub fn get_default_config(agent_type: &str) -> Result<(Config, Config), BuildAgentError> {
    Ok(agent_type.parse::<AgentType>()?.default_config()?)
}

#[cfg(test)]
mod tests {
    use super::super::value_fns::{DeepQNetworkConfig, NullValueFunctionConfig};
    use super::*;
    use crate::envs::{Bandit, Chain};
    use crate::spaces::IndexSpace;
    use rand::SeedableRng;
    use rstest::rstest;
    use serde_json::json;

    fn config(value: serde_json::Value) -> Config {
        Config::try_from(value).unwrap()
    }

    #[rstest]
    #[case("RandomAgent", AgentType::Random)]
    #[case("DQNAgent", AgentType::Dqn)]
    fn parse_names(#[case] name: &str, #[case] expected: AgentType) {
        assert_eq!(name.parse::<AgentType>().unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[rstest]
    #[case("")]
    #[case("dqnagent")]
    #[case("PPOAgent")]
    fn unknown_names(#[case] name: &str) {
        assert_eq!(
            name.parse::<AgentType>(),
            Err(UnknownAgentError { name: name.into() })
        );
        assert!(matches!(
            get_default_config(name),
            Err(BuildAgentError::UnknownAgent(_))
        ));
    }

    #[test]
    fn create_unknown_fails() {
        let env = Bandit::default();
        let result = create_agent(
            "NoSuchAgent",
            &Config::new(),
            &Config::new(),
            &env,
            &mut Prng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(BuildAgentError::UnknownAgent(_))));
    }

    #[test]
    fn default_configs_match_typed_defaults() {
        let (agent, value_function) = get_default_config("DQNAgent").unwrap();
        let mut expected_agent = Config::from_serializable(&DqnConfig::default()).unwrap();
        expected_agent.remove("value_function");
        assert_eq!(agent, expected_agent);
        assert_eq!(
            value_function,
            Config::from_serializable(&DeepQNetworkConfig::default()).unwrap()
        );

        let (agent, value_function) = get_default_config("RandomAgent").unwrap();
        assert!(agent.is_empty());
        assert_eq!(
            value_function,
            Config::from_serializable(&NullValueFunctionConfig::default()).unwrap()
        );
    }

    #[rstest]
    fn create_every_type_with_defaults(
        #[values(AgentType::Random, AgentType::Dqn)] agent_type: AgentType,
    ) {
        let env = Chain::default();
        let mut agent = create_agent(
            agent_type.name(),
            &Config::new(),
            &Config::new(),
            &env,
            &mut Prng::seed_from_u64(0),
        )
        .unwrap();
        let action = agent.act(&0, true);
        assert!(env.action_space().contains(&action));
    }

    #[test]
    fn network_config_overrides_value_function() {
        let agent_config = config(json!({
            "batch_size": 8,
            "value_function": {"huber_delta": 2.0, "network": {"hidden_sizes": [4, 4]}}
        }));
        let network_config = config(json!({"hidden_sizes": [16]}));
        let resolved = AgentType::Dqn
            .resolve_config(&agent_config, &network_config)
            .unwrap();
        let dqn: DqnConfig = resolved.deserialize().unwrap();
        assert_eq!(dqn.batch_size, 8);
        assert_eq!(dqn.value_function.huber_delta, 2.0);
        assert_eq!(dqn.value_function.network.hidden_sizes, vec![16]);
        assert_eq!(dqn.memory_capacity, DqnConfig::default().memory_capacity);
    }

    #[test]
    fn invalid_config_fails() {
        let env = Bandit::default();
        let result = create_agent::<IndexSpace, IndexSpace, _>(
            "DQNAgent",
            &config(json!({"batch_size": "large"})),
            &Config::new(),
            &env,
            &mut Prng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(BuildAgentError::InvalidConfig(_))));
    }
}
