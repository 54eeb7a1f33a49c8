//! Command-line tuner
mod options;

pub use options::Options;

use crate::envs::{EnvDef, EnvVisitor, Environment};
use crate::logging::{CLILogger, Logger};
use crate::spaces::{FeatureSpace, FiniteSpace, SampleSpace, Space};
use crate::tune::{self, TuneConfig, TuneError, TuneResult};
use crate::Error;
use std::time::Duration;

/// Tunes an agent for the visited environment.
pub struct TuneVisitor<'a> {
    pub config: &'a TuneConfig,
    /// Overrides the environment episode step limit.
    pub max_episode_timesteps: Option<u64>,
    pub logger: &'a mut dyn Logger,
}

impl EnvVisitor for TuneVisitor<'_> {
    type Output = Result<TuneResult, TuneError>;

    fn visit<E, OS, AS>(self, env: &E, max_episode_timesteps: Option<u64>) -> Self::Output
    where
        E: Environment<ObservationSpace = OS, ActionSpace = AS> + Sync,
        OS: FeatureSpace + Clone + 'static,
        <OS as Space>::Element: Clone + 'static,
        AS: FiniteSpace + SampleSpace + Clone + 'static,
        <AS as Space>::Element: Clone + 'static,
    {
        tune::tune(
            env,
            self.max_episode_timesteps.or(max_episode_timesteps),
            self.config,
            self.logger,
        )
    }
}

/// Run the tuner as configured on the command line and print a summary.
pub fn run(opts: &Options) -> Result<TuneResult, Error> {
    let env_def = EnvDef::create(&opts.environment, opts.level.as_deref())?;
    println!("Environment: {:?}", env_def);
    let config = TuneConfig::from(opts);
    println!("Tuning run {} writing to {}", config.run_id, config.directory.display());

    let mut logger = CLILogger::new(Duration::from_secs(opts.display_period), true);
    let result = env_def.visit(TuneVisitor {
        config: &config,
        max_episode_timesteps: opts.max_episode_timesteps,
        logger: &mut logger,
    })?;
    drop(logger);

    print_summary(&result, opts.max_repeats);
    Ok(result)
}

/// Print the incumbent configuration and run statistics.
pub fn print_summary(result: &TuneResult, max_repeats: u32) {
    match result.incumbent() {
        Some(incumbent) => {
            println!("Best found configuration: {}", incumbent.config);
            let runs: Vec<_> = result
                .runs_by_id(incumbent.config_id)
                .into_iter()
                .map(ToString::to_string)
                .collect();
            println!("Runs: [{}]", runs.join(", "));
        }
        None => println!("No configuration was evaluated."),
    }
    println!(
        "A total of {} unique configurations were sampled.",
        result.num_configs()
    );
    println!("A total of {} runs were executed.", result.all_runs().len());
    println!(
        "Total budget corresponds to {:.1} full function evaluations.",
        result.total_budget() / f64::from(max_repeats)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn run_bandit() {
        let dir = tempfile::tempdir().unwrap();
        let directory = dir.path().join("tuner");
        let opts = Options::try_parse_from([
            "rltune",
            "bandit",
            "-m",
            "1",
            "-d",
            directory.to_str().unwrap(),
        ])
        .unwrap();
        let result = run(&opts).unwrap();
        assert_eq!(result.all_runs().len(), 1);
        assert!(directory.join("results.json").is_file());
        assert!(directory.join("configs.jsonl").is_file());
        assert!(directory.join("runs.jsonl").is_file());
    }

    #[test]
    fn unknown_environment() {
        let opts = Options::try_parse_from(["rltune", "pong"]).unwrap();
        assert!(matches!(run(&opts), Err(Error::BuildEnv(_))));
    }

    #[test]
    fn invalid_level() {
        let opts = Options::try_parse_from(["rltune", "bandit", "-l", "CartPole-v1"]).unwrap();
        assert!(matches!(run(&opts), Err(Error::BuildEnv(_))));
    }
}
