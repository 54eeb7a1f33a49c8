//! Episode runner
use crate::agents::{Agent, BuildAgent, BuildAgentError, Step};
use crate::envs::{Environment, Successor};
use crate::logging::{Event, Logger};
use crate::spaces::Space;
use crate::utils::stats;
use crate::Prng;
use rand::{Rng, SeedableRng};

/// Runs episodes of an agent in an environment and records the episode rewards.
///
/// The environment is only borrowed; since environments do not hold state, any number of
/// runners may share one.
#[derive(Debug)]
pub struct Runner<'e, E: ?Sized, T> {
    agent: T,
    env: &'e E,
    max_episode_timesteps: Option<u64>,
    rng: Prng,
    episode_rewards: Vec<f64>,
    episode_lengths: Vec<u64>,
}

impl<'e, E, T> Runner<'e, E, T>
where
    E: Environment + ?Sized,
    T: Agent<<E::ObservationSpace as Space>::Element, <E::ActionSpace as Space>::Element>,
{
    /// Create a new runner.
    ///
    /// # Args
    /// * `agent` - The agent to run.
    /// * `env` - The environment to run in.
    /// * `max_episode_timesteps` - Episodes are cut off after this many steps. No limit if `None`.
    /// * `rng` - Environment randomness.
    pub fn new(agent: T, env: &'e E, max_episode_timesteps: Option<u64>, rng: Prng) -> Self {
        Self {
            agent,
            env,
            max_episode_timesteps,
            rng,
            episode_rewards: Vec::new(),
            episode_lengths: Vec::new(),
        }
    }

    /// Run `num_episodes` episodes.
    ///
    /// If `progress` is set, prints a status line after every tenth of the episodes.
    #[allow(clippy::cast_precision_loss)]
    pub fn run(&mut self, num_episodes: u64, progress: bool, logger: &mut dyn Logger) {
        let report_period = (num_episodes / 10).max(1);
        for i in 1..=num_episodes {
            let (reward, length) = self.run_episode(logger);
            logger.log_scalar(Event::Episode, "reward", reward);
            logger.log_scalar(Event::Episode, "length", length as f64);
            logger.done(Event::Episode);

            if progress && (i % report_period == 0 || i == num_episodes) {
                let recent = &self.episode_rewards[self.episode_rewards.len().saturating_sub(20)..];
                println!(
                    "Episode {}/{}: reward {:.2}, mean reward (last {}) {:.2}",
                    i,
                    num_episodes,
                    reward,
                    recent.len(),
                    stats::mean(recent).unwrap_or(f64::NAN)
                );
            }
        }
    }

    /// Run a single episode.
    ///
    /// # Returns
    /// The total (undiscounted) episode reward and the number of steps.
    pub fn run_episode(&mut self, logger: &mut dyn Logger) -> (f64, u64) {
        let env = self.env;
        let mut state = env.initial_state(&mut self.rng);
        let mut observation = env.observe(&state, &mut self.rng);
        let mut new_episode = true;
        let mut total_reward = 0.0;
        let mut num_steps = 0;
        loop {
            let action = self.agent.act(&observation, new_episode);
            new_episode = false;
            let (successor, reward) = env.step(state, &action, &mut self.rng);
            total_reward += reward;
            num_steps += 1;
            let at_limit = self
                .max_episode_timesteps
                .map_or(false, |max_steps| num_steps >= max_steps);

            match successor {
                Successor::Continue(next_state) => {
                    let next_observation = env.observe(&next_state, &mut self.rng);
                    let step = Step {
                        observation,
                        action,
                        reward,
                        next_observation: Some(&next_observation),
                        episode_done: at_limit,
                    };
                    self.agent.update(step, logger);
                    if at_limit {
                        break;
                    }
                    state = next_state;
                    observation = next_observation;
                }
                Successor::Terminate => {
                    let step = Step {
                        observation,
                        action,
                        reward,
                        next_observation: None,
                        episode_done: true,
                    };
                    self.agent.update(step, logger);
                    break;
                }
            }
        }
        self.episode_rewards.push(total_reward);
        self.episode_lengths.push(num_steps);
        (total_reward, num_steps)
    }
}

impl<'e, E: ?Sized, T> Runner<'e, E, T> {
    /// Total reward of each completed episode, in order.
    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }

    /// Number of steps of each completed episode, in order.
    pub fn episode_lengths(&self) -> &[u64] {
        &self.episode_lengths
    }

    pub const fn agent(&self) -> &T {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut T {
        &mut self.agent
    }

    /// Close the runner, releasing the agent and returning the episode rewards.
    pub fn close(self) -> Vec<f64> {
        self.episode_rewards
    }
}

impl<'e, E> Runner<'e, E, ()>
where
    E: Environment + ?Sized,
{
    /// Create a runner with a fresh agent built from a configuration.
    ///
    /// The agent and the environment randomness are both seeded from `rng`.
    pub fn from_config<C>(
        config: &C,
        env: &'e E,
        max_episode_timesteps: Option<u64>,
        rng: &mut Prng,
    ) -> Result<Runner<'e, E, C::Agent>, BuildAgentError>
    where
        C: BuildAgent<E::ObservationSpace, E::ActionSpace>,
    {
        let agent = config.build_agent(env, rng)?;
        let env_rng = Prng::seed_from_u64(rng.gen());
        Ok(Runner::new(agent, env, max_episode_timesteps, env_rng))
    }
}
