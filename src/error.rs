//! Error type
use crate::agents::BuildAgentError;
use crate::config::ConfigError;
use crate::envs::BuildEnvError;
use crate::tune::TuneError;
use thiserror::Error;

/// Error from the rltune crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("error building agent")]
    BuildAgent(#[from] BuildAgentError),
    #[error("error building environment")]
    BuildEnv(#[from] BuildEnvError),
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("error tuning hyperparameters")]
    Tune(#[from] TuneError),
}
