//! Environment testing utilities
use super::{Environment, Successor};
use crate::spaces::{SampleSpace, Space};
use crate::Prng;
use rand::distributions::Distribution;
use rand::SeedableRng;

/// Run an environment with random actions and check that invariants are satisfied.
///
/// Episodes are restarted when they terminate.
pub fn check_structured_env<E>(env: &E, num_steps: u64, seed: u64)
where
    E: Environment,
    E::ActionSpace: SampleSpace,
{
    let observation_space = env.observation_space();
    let action_space = env.action_space();
    let (min_reward, max_reward) = env.reward_range();
    let discount_factor = env.discount_factor();
    assert!(discount_factor >= 0.0);
    assert!(discount_factor <= 1.0);

    let mut rng = Prng::seed_from_u64(seed);
    let mut state = env.initial_state(&mut rng);
    for _ in 0..num_steps {
        let observation = env.observe(&state, &mut rng);
        assert!(observation_space.contains(&observation));

        let action = action_space.sample(&mut rng);
        assert!(action_space.contains(&action));

        let (successor, reward) = env.step(state, &action, &mut rng);
        assert!(reward >= min_reward, "reward {} < {}", reward, min_reward);
        assert!(reward <= max_reward, "reward {} > {}", reward, max_reward);
        state = match successor {
            Successor::Continue(next) => next,
            Successor::Terminate => env.initial_state(&mut rng),
        };
    }
}
