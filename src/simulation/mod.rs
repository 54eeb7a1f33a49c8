//! Simulating agent-environment interaction
mod runner;

pub use runner::Runner;
