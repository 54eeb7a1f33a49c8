//! Environment definitions and creation from names or configuration files
use super::{Bandit, CartPoleConfig, Chain, Environment};
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace, Space};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

/// Error building an environment
#[derive(Debug, Error)]
pub enum BuildEnvError {
    #[error("no such environment: {0}")]
    UnknownEnvironment(String),
    #[error("environment {environment} does not support level {level}")]
    UnsupportedLevel { environment: String, level: String },
    #[error("invalid environment configuration")]
    InvalidConfig(#[from] serde_json::Error),
    #[error("error reading environment configuration")]
    Io(#[from] io::Error),
}

/// Environment type and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvKind {
    Bandit(Bandit),
    Chain(Chain),
    CartPole(CartPoleConfig),
}

/// Environment definition: what to simulate and for how long an episode may run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvDef {
    pub kind: EnvKind,
    /// Maximum number of steps in an episode. `None` means unlimited.
    pub max_episode_timesteps: Option<u64>,
}

impl EnvDef {
    pub fn new(kind: EnvKind) -> Self {
        let max_episode_timesteps = match kind {
            EnvKind::Bandit(_) => None,
            EnvKind::Chain(_) => Some(100),
            EnvKind::CartPole(_) => Some(500),
        };
        Self {
            kind,
            max_episode_timesteps,
        }
    }

    /// Create an environment definition.
    ///
    /// # Args
    /// * `environment` - Either an environment name (`bandit`, `chain`, `cartpole`)
    ///     or the path of a JSON configuration file of the form
    ///     `{"type": "<name>", "max_episode_timesteps": <n>, ...parameters}`.
    /// * `level` - Environment variant, if the environment has any.
    ///     `cartpole` accepts `CartPole-v0` (200 step episodes) and `CartPole-v1` (500).
    pub fn create(environment: &str, level: Option<&str>) -> Result<Self, BuildEnvError> {
        let path = Path::new(environment);
        let mut def = if path.is_file() {
            Self::from_file(path)?
        } else {
            Self::from_name(environment)?
        };
        if let Some(level) = level {
            def.set_level(level)?;
        }
        Ok(def)
    }

    /// Default environment definition for a name.
    pub fn from_name(name: &str) -> Result<Self, BuildEnvError> {
        let kind = match name.to_ascii_lowercase().replace(&['-', '_'][..], "").as_str() {
            "bandit" => EnvKind::Bandit(Bandit::default()),
            "chain" => EnvKind::Chain(Chain::default()),
            "cartpole" => EnvKind::CartPole(CartPoleConfig::default()),
            _ => return Err(BuildEnvError::UnknownEnvironment(name.into())),
        };
        Ok(Self::new(kind))
    }

    /// Load an environment definition from a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BuildEnvError> {
        let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self, BuildEnvError> {
        let max_episode_timesteps = match value.as_object_mut() {
            Some(map) => map.remove("max_episode_timesteps"),
            None => None,
        };
        let mut def = Self::new(serde_json::from_value(value)?);
        if let Some(max_steps) = max_episode_timesteps {
            def.max_episode_timesteps = serde_json::from_value(max_steps)?;
        }
        Ok(def)
    }

    fn set_level(&mut self, level: &str) -> Result<(), BuildEnvError> {
        match (&self.kind, level) {
            (EnvKind::CartPole(_), "CartPole-v0") => self.max_episode_timesteps = Some(200),
            (EnvKind::CartPole(_), "CartPole-v1") => self.max_episode_timesteps = Some(500),
            _ => {
                return Err(BuildEnvError::UnsupportedLevel {
                    environment: self.name().into(),
                    level: level.into(),
                })
            }
        }
        Ok(())
    }

    pub const fn name(&self) -> &'static str {
        match self.kind {
            EnvKind::Bandit(_) => "bandit",
            EnvKind::Chain(_) => "chain",
            EnvKind::CartPole(_) => "cartpole",
        }
    }

    /// Build the environment and pass it to a visitor.
    pub fn visit<V: EnvVisitor>(&self, visitor: V) -> V::Output {
        match &self.kind {
            EnvKind::Bandit(env) => visitor.visit(env, self.max_episode_timesteps),
            EnvKind::Chain(env) => visitor.visit(env, self.max_episode_timesteps),
            EnvKind::CartPole(config) => visitor.visit(&config.build(), self.max_episode_timesteps),
        }
    }
}

/// Operation generic over the environment type of an [`EnvDef`].
pub trait EnvVisitor {
    type Output;

    fn visit<E, OS, AS>(self, env: &E, max_episode_timesteps: Option<u64>) -> Self::Output
    where
        E: Environment<ObservationSpace = OS, ActionSpace = AS> + Sync,
        OS: FeatureSpace + Clone + 'static,
        <OS as Space>::Element: Clone + 'static,
        AS: FiniteSpace + SampleSpace + Clone + 'static,
        <AS as Space>::Element: Clone + 'static;
}
