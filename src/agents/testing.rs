//! Agent testing utilities
use super::{Actor, ActorMode, Agent, BuildAgent};
use crate::envs::Bandit;
use crate::simulation::Runner;
use crate::spaces::IndexSpace;
use crate::Prng;
use rand::SeedableRng;

/// Train an agent on a two-armed bandit with deterministic rewards 0 and 1,
/// then check that it picks the better arm in evaluation mode.
///
/// # Args
/// * `config` - Agent configuration.
/// * `num_train_episodes` - Number of single-step training episodes.
/// * `threshold` - Minimum fraction of evaluation actions that must pick the better arm.
pub fn train_deterministic_bandit<C>(config: &C, num_train_episodes: u64, threshold: f64)
where
    C: BuildAgent<IndexSpace, IndexSpace>,
{
    let env = Bandit::deterministic(vec![0.0, 1.0]);
    let mut rng = Prng::seed_from_u64(0);
    let mut runner = Runner::from_config(config, &env, None, &mut rng).unwrap();
    runner.run(num_train_episodes, false, &mut ());

    let agent = runner.agent_mut();
    agent.set_actor_mode(ActorMode::Evaluation);
    let num_eval_steps = 1000;
    let num_good = (0..num_eval_steps)
        .filter(|_| agent.act(&0, true) == 1)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let good_fraction = num_good as f64 / f64::from(num_eval_steps);
    assert!(
        good_fraction >= threshold,
        "better arm chosen {} of the time",
        good_fraction
    );
}
