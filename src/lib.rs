//! Reinforcement learning agent registry and hyperparameter tuner.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::for_kv_map)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
pub mod agents;
pub mod cli;
pub mod config;
pub mod envs;
mod error;
pub mod logging;
pub mod nn;
pub mod simulation;
pub mod spaces;
pub mod tune;
pub mod utils;

pub use agents::{
    create_agent, get_default_config, Actor, ActorMode, Agent, AgentType, BuildAgent, Step,
};
pub use config::Config;
pub use envs::{EnvDef, EnvStructure, Environment, Successor};
pub use error::Error;
pub use simulation::Runner;

/// Pseudo-random number generator type used by agents, environments and the tuner.
pub type Prng = rand_chacha::ChaCha8Rng;
