//! Parameter schedules: functions of the global step count during training.
use super::ActorMode;
use serde::{Deserialize, Serialize};

/// Selects the exploration rate as a function the elapsed step count.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationRateSchedule {
    Constant(f64),
    LinearAnnealed {
        start: f64,
        end: f64,
        /// Number of steps to reach the `end` value.
        period: u64,
    },
}

/// Anneals from fully random to 5% random actions over the first 10k steps.
impl Default for ExplorationRateSchedule {
    fn default() -> Self {
        Self::LinearAnnealed {
            start: 1.0,
            end: 0.05,
            period: 10_000,
        }
    }
}

impl ExplorationRateSchedule {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn exploration_rate(&self, global_steps: u64, mode: ActorMode) -> f64 {
        use ExplorationRateSchedule::{Constant, LinearAnnealed};
        match (mode, self) {
            (ActorMode::Evaluation, _) => 0.0,
            (ActorMode::Training, Constant(rate)) => *rate,
            (ActorMode::Training, LinearAnnealed { start, end, period }) => {
                let progress = if *period == 0 {
                    1.0
                } else {
                    (global_steps as f64 / *period as f64).min(1.0)
                };
                progress * (end - start) + start
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1.0)]
    #[case(50, 0.55)]
    #[case(100, 0.1)]
    #[case(1000, 0.1)]
    fn linear_annealed(#[case] steps: u64, #[case] expected: f64) {
        let schedule = ExplorationRateSchedule::LinearAnnealed {
            start: 1.0,
            end: 0.1,
            period: 100,
        };
        let rate = schedule.exploration_rate(steps, ActorMode::Training);
        assert!((rate - expected).abs() < 1e-12);
    }

    #[test]
    fn evaluation_is_greedy() {
        let schedule = ExplorationRateSchedule::Constant(0.3);
        assert_eq!(schedule.exploration_rate(5, ActorMode::Evaluation), 0.0);
        assert_eq!(schedule.exploration_rate(5, ActorMode::Training), 0.3);
    }
}
