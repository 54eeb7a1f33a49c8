//! Bayesian optimization and Hyperband (BOHB)
//!
//! Falkner, Klein and Hutter, "BOHB: Robust and Efficient Hyperparameter Optimization at Scale", 2018.
use super::kde::{MultivariateKde, VarType};
use super::result::{ConfigId, ConfigRecord, JsonResultLogger, Run, TuneResult};
use super::space::{ConfigSpace, Domain, Sample};
use super::worker::{Evaluation, RunEpisodes, Worker};
use super::TuneError;
use crate::logging::{Event, Logger};
use crate::Prng;
use crossbeam::channel::{self, Receiver, Sender};
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

/// BOHB settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BohbConfig {
    /// Successive halving keeps `1 / eta` of the configurations at each stage.
    pub eta: f64,
    pub min_budget: f64,
    pub max_budget: f64,
    /// Minimum number of observations on a budget before fitting a model.
    /// The number of hyperparameters plus one if `None`.
    pub min_points_in_model: Option<usize>,
    /// Percentage of observations considered good.
    pub top_n_percent: f64,
    /// Number of candidates drawn from the model per proposed configuration.
    pub num_samples: usize,
    /// Fraction of configurations sampled uniformly at random.
    pub random_fraction: f64,
    /// Scales the model bandwidths when drawing candidates.
    pub bandwidth_factor: f64,
    pub min_bandwidth: f64,
    /// Number of evaluation threads.
    pub num_workers: usize,
    /// Run identifier; names the evaluation threads.
    pub run_id: String,
}

impl Default for BohbConfig {
    fn default() -> Self {
        Self {
            eta: 3.0,
            min_budget: 0.5,
            max_budget: 10.0,
            min_points_in_model: None,
            top_n_percent: 15.0,
            num_samples: 64,
            random_fraction: 1.0 / 3.0,
            bandwidth_factor: 3.0,
            min_bandwidth: 1e-3,
            num_workers: 1,
            run_id: "worker".into(),
        }
    }
}

/// One Hyperband bracket: a successive-halving schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    /// Number of configurations evaluated at each stage.
    pub num_configs: Vec<usize>,
    /// Budget of each stage.
    pub budgets: Vec<f64>,
}

impl BohbConfig {
    fn validate(&self) -> Result<(), TuneError> {
        let message = if self.eta <= 1.0 {
            "eta must be greater than 1"
        } else if self.min_budget <= 0.0 {
            "min_budget must be positive"
        } else if self.max_budget < self.min_budget {
            "max_budget must be at least min_budget"
        } else if self.top_n_percent <= 0.0 || self.top_n_percent >= 100.0 {
            "top_n_percent must be between 0 and 100"
        } else if self.num_samples == 0 {
            "num_samples must be positive"
        } else if !(0.0..=1.0).contains(&self.random_fraction) {
            "random_fraction must be between 0 and 1"
        } else if self.min_bandwidth <= 0.0 {
            "min_bandwidth must be positive"
        } else {
            return Ok(());
        };
        Err(TuneError::InvalidSettings(message))
    }

    /// Number of successive halving stages in the largest bracket.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn max_stages(&self) -> usize {
        // Tolerance so that exact powers of eta are not rounded down
        ((self.max_budget / self.min_budget).ln() / self.eta.ln() + 1e-9).floor() as usize + 1
    }

    /// Successive halving schedule of a Hyperband iteration.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    pub fn bracket(&self, iteration: usize) -> Bracket {
        let max_stages = self.max_stages();
        let s = max_stages - 1 - iteration % max_stages;
        let n0 = (max_stages / (s + 1)) as f64 * self.eta.powi(s as i32);
        let num_configs = (0..=s)
            .map(|k| ((n0 * self.eta.powi(-(k as i32))) as usize).max(1))
            .collect();
        let budgets = (0..=s)
            .map(|k| self.max_budget * self.eta.powi(k as i32 - s as i32))
            .collect();
        Bracket {
            num_configs,
            budgets,
        }
    }
}

/// Good and bad configuration densities fit on one budget.
#[derive(Debug, Clone, PartialEq)]
struct DensityModel {
    good: MultivariateKde,
    bad: MultivariateKde,
}

/// Observations at one budget.
#[derive(Debug, Clone, PartialEq)]
struct BudgetObservations {
    budget: f64,
    points: Vec<Vec<Option<f64>>>,
    losses: Vec<f64>,
    model: Option<DensityModel>,
}

/// Proposes configurations from density models of the good and bad observations.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigGenerator {
    space: ConfigSpace,
    var_types: Vec<VarType>,
    min_points_in_model: usize,
    top_n_percent: f64,
    num_samples: usize,
    random_fraction: f64,
    bandwidth_factor: f64,
    min_bandwidth: f64,
    observations: Vec<BudgetObservations>,
}

impl ConfigGenerator {
    pub fn new(space: ConfigSpace, config: &BohbConfig) -> Self {
        let var_types: Vec<_> = space
            .hyperparameters()
            .iter()
            .map(|h| match &h.domain {
                Domain::Categorical { choices } => VarType::Unordered {
                    num_choices: choices.len(),
                },
                _ => VarType::Continuous,
            })
            .collect();
        Self {
            min_points_in_model: config
                .min_points_in_model
                .unwrap_or(var_types.len() + 1)
                .max(var_types.len() + 1),
            var_types,
            space,
            top_n_percent: config.top_n_percent,
            num_samples: config.num_samples,
            random_fraction: config.random_fraction,
            bandwidth_factor: config.bandwidth_factor,
            min_bandwidth: config.min_bandwidth,
            observations: Vec::new(),
        }
    }

    pub const fn space(&self) -> &ConfigSpace {
        &self.space
    }

    /// Largest budget with a fitted model.
    pub fn model_budget(&self) -> Option<f64> {
        self.model().map(|(budget, _)| budget)
    }

    fn model(&self) -> Option<(f64, &DensityModel)> {
        self.observations
            .iter()
            .filter_map(|obs| obs.model.as_ref().map(|model| (obs.budget, model)))
            .max_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Propose a configuration.
    ///
    /// # Returns
    /// The configuration and whether it was proposed by the model.
    pub fn get_config(&self, rng: &mut Prng) -> (Sample, bool) {
        if rng.gen::<f64>() >= self.random_fraction {
            if let Some((_, model)) = self.model() {
                if let Some(vector) = self.best_candidate(model, rng) {
                    let vector: Vec<_> = vector.into_iter().map(Some).collect();
                    return (self.space.from_vector(&vector), true);
                }
            }
        }
        (self.space.sample(rng), false)
    }

    /// Candidate with the largest ratio of good to bad density.
    #[allow(clippy::cast_precision_loss)]
    fn best_candidate(&self, model: &DensityModel, rng: &mut Prng) -> Option<Vec<f64>> {
        let good_data = model.good.data();
        let mut best: Option<(f64, Vec<f64>)> = None;
        for _ in 0..self.num_samples {
            let datum = &good_data[rng.gen_range(0..good_data.len())];
            let candidate: Vec<f64> = self
                .var_types
                .iter()
                .zip(model.good.bandwidths())
                .zip(datum)
                .map(|((var_type, &bw), &center)| {
                    let bw = (bw * self.bandwidth_factor).max(self.min_bandwidth);
                    match *var_type {
                        VarType::Continuous => truncated_normal(center, bw, rng),
                        VarType::Unordered { num_choices } => {
                            if rng.gen::<f64>() < 1.0 - bw {
                                center
                            } else {
                                rng.gen_range(0..num_choices.max(1)) as f64
                            }
                        }
                    }
                })
                .collect();
            let ratio = model.good.pdf(&candidate).max(1e-32) / model.bad.pdf(&candidate).max(1e-32);
            if ratio.is_finite() && best.as_ref().map_or(true, |(r, _)| ratio > *r) {
                best = Some((ratio, candidate));
            }
        }
        best.map(|(_, candidate)| candidate)
    }

    /// Record an evaluation and refit the model of its budget.
    ///
    /// Non-finite losses are ranked as the worst.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new_result(&mut self, sample: &Sample, budget: f64, loss: f64, rng: &mut Prng) {
        let point = self.space.to_vector(sample);
        let loss = if loss.is_finite() { loss } else { f64::INFINITY };
        let index = match self.observations.iter().position(|o| o.budget == budget) {
            Some(index) => index,
            None => {
                self.observations.push(BudgetObservations {
                    budget,
                    points: Vec::new(),
                    losses: Vec::new(),
                    model: None,
                });
                self.observations.len() - 1
            }
        };
        let observations = &mut self.observations[index];
        observations.points.push(point);
        observations.losses.push(loss);

        let n = observations.points.len();
        if n < self.min_points_in_model {
            return;
        }
        let num_dims = self.var_types.len();
        let n_good = self
            .min_points_in_model
            .max((self.top_n_percent * n as f64 / 100.0) as usize)
            .min(n);
        let n_bad = self
            .min_points_in_model
            .max(((100.0 - self.top_n_percent) * n as f64 / 100.0) as usize);
        let mut order: Vec<usize> = (0..n).collect();
        let losses = &observations.losses;
        order.sort_by(|&a, &b| losses[a].total_cmp(&losses[b]));
        let good_idx = &order[..n_good];
        let bad_idx = &order[n_good..(n_good + n_bad).min(n)];
        if good_idx.len() <= num_dims || bad_idx.len() <= num_dims {
            return;
        }

        let good = impute(&observations.points, good_idx, &self.var_types, rng);
        let bad = impute(&observations.points, bad_idx, &self.var_types, rng);
        let good = MultivariateKde::new(good, self.var_types.clone(), self.min_bandwidth);
        let bad = MultivariateKde::new(bad, self.var_types.clone(), self.min_bandwidth);
        if let (Some(good), Some(bad)) = (good, bad) {
            observations.model = Some(DensityModel { good, bad });
        }
    }
}

/// Fill inactive values of the selected points.
///
/// An inactive value takes the value of a random other selected point where it is active,
/// or a uniformly random value if it is inactive everywhere.
#[allow(clippy::cast_precision_loss)]
fn impute(
    points: &[Vec<Option<f64>>],
    indices: &[usize],
    var_types: &[VarType],
    rng: &mut Prng,
) -> Vec<Vec<f64>> {
    indices
        .iter()
        .map(|&i| {
            var_types
                .iter()
                .enumerate()
                .map(|(d, var_type)| {
                    if let Some(x) = points[i][d] {
                        return x;
                    }
                    let active: Vec<f64> = indices.iter().filter_map(|&j| points[j][d]).collect();
                    if active.is_empty() {
                        match *var_type {
                            VarType::Continuous => rng.gen(),
                            VarType::Unordered { num_choices } => {
                                rng.gen_range(0..num_choices.max(1)) as f64
                            }
                        }
                    } else {
                        active[rng.gen_range(0..active.len())]
                    }
                })
                .collect()
        })
        .collect()
}

/// Sample a normal distribution truncated to `[0, 1]`.
fn truncated_normal(mean: f64, stddev: f64, rng: &mut Prng) -> f64 {
    if let Ok(normal) = Normal::new(mean, stddev) {
        for _ in 0..100 {
            let x = normal.sample(rng);
            if (0.0..=1.0).contains(&x) {
                return x;
            }
        }
    }
    mean.clamp(0.0, 1.0)
}

#[derive(Debug)]
struct Job {
    config_id: ConfigId,
    sample: Sample,
    budget: f64,
    seed: u64,
}

type JobResult = (Job, Result<Evaluation, TuneError>);

/// Channels to the evaluation threads.
struct Pool {
    jobs: Sender<Job>,
    results: Receiver<JobResult>,
    num_workers: usize,
}

/// Configurations evaluated in one stage of successive halving.
enum StageConfigs {
    /// Propose this many new configurations.
    New(usize),
    /// Evaluate configurations promoted from the previous stage.
    Promoted(Vec<ConfigId>),
}

impl StageConfigs {
    fn len(&self) -> usize {
        match self {
            Self::New(n) => *n,
            Self::Promoted(ids) => ids.len(),
        }
    }
}

/// BOHB optimizer.
#[derive(Debug)]
pub struct Bohb {
    config: BohbConfig,
    generator: ConfigGenerator,
    rng: Prng,
    result: TuneResult,
    next_iteration: usize,
}

impl Bohb {
    pub fn new(space: ConfigSpace, config: BohbConfig, rng: Prng) -> Result<Self, TuneError> {
        config.validate()?;
        Ok(Self {
            generator: ConfigGenerator::new(space, &config),
            config,
            rng,
            result: TuneResult::new(),
            next_iteration: 0,
        })
    }

    pub const fn config(&self) -> &BohbConfig {
        &self.config
    }

    pub const fn generator(&self) -> &ConfigGenerator {
        &self.generator
    }

    /// Seed the model with the runs of a previous result and include them in this result.
    ///
    /// Iterations continue from the last iteration of the previous result.
    pub fn warm_start(&mut self, previous: TuneResult) {
        for run in previous.all_runs() {
            if let Some(record) = previous.id2config().get(&run.config_id) {
                self.generator
                    .new_result(&record.config, run.budget, run.loss, &mut self.rng);
            }
        }
        self.result.merge(previous);
        self.next_iteration = self.next_iteration.max(self.result.next_iteration());
    }

    /// Run Hyperband iterations.
    ///
    /// Evaluations of each successive-halving stage run concurrently on
    /// `num_workers` threads. The first failed evaluation aborts the run;
    /// a panicking evaluation fails with [`TuneError::WorkerPanic`].
    ///
    /// # Returns
    /// All configurations and runs so far, including those of a warm start.
    pub fn run<R>(
        &mut self,
        num_iterations: usize,
        worker: &Worker<R>,
        mut result_logger: Option<&mut JsonResultLogger>,
        logger: &mut dyn Logger,
    ) -> Result<TuneResult, TuneError>
    where
        R: RunEpisodes + Sync,
    {
        let num_workers = self.config.num_workers.max(1);
        let outcome = crossbeam::scope(|scope| -> Result<(), TuneError> {
            let (job_sender, job_receiver) = channel::unbounded::<Job>();
            let (result_sender, result_receiver) = channel::unbounded::<JobResult>();
            for i in 0..num_workers {
                let jobs = job_receiver.clone();
                let results = result_sender.clone();
                scope
                    .builder()
                    .name(format!("{}-{}", self.config.run_id, i))
                    .spawn(move |_| {
                        for job in jobs.iter() {
                            let mut rng = Prng::seed_from_u64(job.seed);
                            let evaluation = panic::catch_unwind(AssertUnwindSafe(|| {
                                worker.compute(&job.sample, job.budget, &mut rng)
                            }))
                            .unwrap_or(Err(TuneError::WorkerPanic));
                            if results.send((job, evaluation)).is_err() {
                                break;
                            }
                        }
                    })?;
            }
            drop(result_sender);

            let mut pool = Pool {
                jobs: job_sender,
                results: result_receiver,
                num_workers,
            };
            for _ in 0..num_iterations {
                let iteration = self.next_iteration;
                self.next_iteration += 1;
                self.run_iteration(iteration, &mut pool, result_logger.as_deref_mut(), logger)?;
            }
            Ok(())
        });
        // Err only if a thread panicked outside of an evaluation
        outcome.map_err(|_| TuneError::WorkerPanic)??;
        Ok(self.result.clone())
    }

    fn run_iteration(
        &mut self,
        iteration: usize,
        pool: &mut Pool,
        mut result_logger: Option<&mut JsonResultLogger>,
        logger: &mut dyn Logger,
    ) -> Result<(), TuneError> {
        let bracket = self.config.bracket(iteration);
        let mut configs = StageConfigs::New(bracket.num_configs[0]);
        for (stage, &budget) in bracket.budgets.iter().enumerate() {
            let mut losses = self.run_stage(
                iteration,
                configs,
                budget,
                pool,
                result_logger.as_deref_mut(),
                logger,
            )?;
            let num_promoted = match bracket.num_configs.get(stage + 1) {
                Some(&n) => n,
                None => break,
            };
            losses.sort_by(|a, b| a.1.total_cmp(&b.1));
            configs = StageConfigs::Promoted(
                losses
                    .into_iter()
                    .take(num_promoted)
                    .map(|(id, _)| id)
                    .collect(),
            );
        }
        Ok(())
    }

    /// Evaluate a stage, keeping up to `num_workers` jobs in flight.
    ///
    /// New configurations are proposed when a worker becomes free
    /// so they benefit from the results that came in before.
    ///
    /// # Returns
    /// The loss of each evaluated configuration, with non-finite losses as infinity.
    fn run_stage(
        &mut self,
        iteration: usize,
        configs: StageConfigs,
        budget: f64,
        pool: &mut Pool,
        mut result_logger: Option<&mut JsonResultLogger>,
        logger: &mut dyn Logger,
    ) -> Result<Vec<(ConfigId, f64)>, TuneError> {
        let total = configs.len();
        let mut dispatched = 0;
        let mut in_flight = 0;
        let mut losses = Vec::with_capacity(total);
        while losses.len() < total {
            while in_flight < pool.num_workers && dispatched < total {
                let (config_id, sample) = match &configs {
                    StageConfigs::New(_) => {
                        let (sample, model_based_pick) = self.generator.get_config(&mut self.rng);
                        let record = ConfigRecord {
                            config_id: ConfigId(iteration, 0, dispatched),
                            config: sample.clone(),
                            model_based_pick,
                        };
                        if let Some(result_logger) = result_logger.as_deref_mut() {
                            result_logger.new_config(&record)?;
                        }
                        let config_id = record.config_id;
                        self.result.add_config(record);
                        (config_id, sample)
                    }
                    StageConfigs::Promoted(ids) => {
                        let config_id = ids[dispatched];
                        let record = self
                            .result
                            .id2config()
                            .get(&config_id)
                            .ok_or(TuneError::UnknownConfig(config_id))?;
                        (config_id, record.config.clone())
                    }
                };
                let job = Job {
                    config_id,
                    sample,
                    budget,
                    seed: self.rng.gen(),
                };
                pool.jobs.send(job).map_err(|_| TuneError::WorkersStopped)?;
                dispatched += 1;
                in_flight += 1;
            }

            let (job, evaluation) = pool
                .results
                .recv()
                .map_err(|_| TuneError::WorkersStopped)?;
            in_flight -= 1;
            let evaluation = evaluation?;

            self.generator
                .new_result(&job.sample, job.budget, evaluation.loss, &mut self.rng);
            logger.log_scalar(Event::Evaluation, "loss", evaluation.loss);
            logger.log_scalar(Event::Evaluation, "budget", job.budget);
            logger.done(Event::Evaluation);

            let run = Run {
                config_id: job.config_id,
                budget: job.budget,
                loss: evaluation.loss,
                info: evaluation.info,
            };
            if let Some(result_logger) = result_logger.as_deref_mut() {
                result_logger.log_run(&run)?;
            }
            self.result.add_run(run);
            let loss = if evaluation.loss.is_finite() {
                evaluation.loss
            } else {
                f64::INFINITY
            };
            losses.push((job.config_id, loss));
        }
        Ok(losses)
    }
}

#[cfg(test)]
mod tests {
    use super::super::space::{policy_gradient_space, Hyperparameter};
    use super::super::worker::NUM_EPISODES;
    use super::*;
    use crate::agents::{BuildAgentError, PolicyGradientConfig};
    use crate::logging::{LogError, Loggable};
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Episode rewards are the negated learning rate so smaller rates are better.
    struct LearningRateRunner;

    impl RunEpisodes for LearningRateRunner {
        fn run_episodes(
            &self,
            config: &PolicyGradientConfig,
            num_episodes: u64,
            _: &mut Prng,
        ) -> Result<Vec<f64>, BuildAgentError> {
            Ok(vec![-config.optimizer.learning_rate; num_episodes as usize])
        }
    }

    struct FailingRunner;

    impl RunEpisodes for FailingRunner {
        fn run_episodes(
            &self,
            _: &PolicyGradientConfig,
            _: u64,
            _: &mut Prng,
        ) -> Result<Vec<f64>, BuildAgentError> {
            Err(BuildAgentError::Unsupported("testing"))
        }
    }

    /// Panics on the first call, then behaves like [`LearningRateRunner`].
    #[derive(Default)]
    struct PanicOnceRunner {
        panicked: AtomicBool,
    }

    impl RunEpisodes for PanicOnceRunner {
        fn run_episodes(
            &self,
            config: &PolicyGradientConfig,
            num_episodes: u64,
            rng: &mut Prng,
        ) -> Result<Vec<f64>, BuildAgentError> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("evaluation failed");
            }
            LearningRateRunner.run_episodes(config, num_episodes, rng)
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn first_bracket() {
        let config = BohbConfig::default();
        assert_eq!(config.max_stages(), 3);
        let bracket = config.bracket(0);
        assert_eq!(bracket.num_configs, vec![9, 3, 1]);
        assert_close(bracket.budgets[0], 10.0 / 9.0);
        assert_close(bracket.budgets[1], 10.0 / 3.0);
        assert_close(bracket.budgets[2], 10.0);
    }

    #[rstest]
    #[case(1, vec![3, 1], vec![10.0 / 3.0, 10.0])]
    #[case(2, vec![3], vec![10.0])]
    #[case(3, vec![9, 3, 1], vec![10.0 / 9.0, 10.0 / 3.0, 10.0])]
    fn later_brackets(
        #[case] iteration: usize,
        #[case] num_configs: Vec<usize>,
        #[case] budgets: Vec<f64>,
    ) {
        let bracket = BohbConfig::default().bracket(iteration);
        assert_eq!(bracket.num_configs, num_configs);
        assert_eq!(bracket.budgets.len(), budgets.len());
        for (a, b) in bracket.budgets.into_iter().zip(budgets) {
            assert_close(a, b);
        }
    }

    #[test]
    fn exact_power_budgets() {
        let config = BohbConfig {
            min_budget: 1.0,
            max_budget: 27.0,
            ..BohbConfig::default()
        };
        assert_eq!(config.max_stages(), 4);
        assert_eq!(config.bracket(0).num_configs, vec![27, 9, 3, 1]);
    }

    #[rstest]
    #[case(BohbConfig { eta: 1.0, ..BohbConfig::default() })]
    #[case(BohbConfig { min_budget: 0.0, ..BohbConfig::default() })]
    #[case(BohbConfig { max_budget: 0.1, ..BohbConfig::default() })]
    #[case(BohbConfig { random_fraction: 1.5, ..BohbConfig::default() })]
    fn invalid_settings(#[case] config: BohbConfig) {
        assert!(matches!(
            Bohb::new(ConfigSpace::new(), config, Prng::seed_from_u64(0)),
            Err(TuneError::InvalidSettings(_))
        ));
    }

    #[test]
    fn model_prefers_good_region() {
        let mut space = ConfigSpace::new();
        space
            .add_hyperparameter(Hyperparameter::float("x", 0.0, 1.0, false))
            .unwrap();
        space
            .add_hyperparameter(Hyperparameter::categorical("c", &["a", "b"]))
            .unwrap();
        let config = BohbConfig {
            random_fraction: 0.0,
            ..BohbConfig::default()
        };
        let mut generator = ConfigGenerator::new(space.clone(), &config);
        let mut rng = Prng::seed_from_u64(0);
        for _ in 0..60 {
            let sample = space.sample(&mut rng);
            let x = sample.get_float("x").unwrap();
            let penalty = if sample.get_choice("c").unwrap() == "b" { 1.0 } else { 0.0 };
            generator.new_result(&sample, 1.0, x + penalty, &mut rng);
        }
        assert_eq!(generator.model_budget(), Some(1.0));

        let mut total_x = 0.0;
        let mut num_a = 0;
        for _ in 0..100 {
            let (sample, model_based) = generator.get_config(&mut rng);
            assert!(model_based);
            total_x += sample.get_float("x").unwrap();
            if sample.get_choice("c").unwrap() == "a" {
                num_a += 1;
            }
        }
        assert!(total_x / 100.0 < 0.35, "mean x = {}", total_x / 100.0);
        assert!(num_a > 80, "num_a = {}", num_a);
    }

    #[test]
    fn no_model_before_enough_points() {
        let space = policy_gradient_space().unwrap();
        let mut generator = ConfigGenerator::new(space.clone(), &BohbConfig::default());
        let mut rng = Prng::seed_from_u64(1);
        for i in 0..10 {
            generator.new_result(&space.sample(&mut rng), 1.0, f64::from(i), &mut rng);
        }
        assert_eq!(generator.model_budget(), None);
        assert!(!generator.get_config(&mut rng).1);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn run_iterations(#[case] num_workers: usize) {
        let config = BohbConfig {
            num_workers,
            ..BohbConfig::default()
        };
        let space = policy_gradient_space().unwrap();
        let mut bohb = Bohb::new(space, config, Prng::seed_from_u64(2)).unwrap();
        let worker = Worker::new(LearningRateRunner);
        let mut losses = Vec::new();
        let result = bohb
            .run(3, &worker, None, &mut LossesLogger(&mut losses))
            .unwrap();

        assert_eq!(result.num_configs(), 9 + 3 + 3);
        assert_eq!(result.all_runs().len(), 9 + 3 + 1 + 3 + 1 + 3);
        assert_eq!(losses.len(), result.all_runs().len());
        assert_close(
            result.total_budget(),
            9.0 * 10.0 / 9.0 + 3.0 * 10.0 / 3.0 + 10.0 + 3.0 * 10.0 / 3.0 + 10.0 + 3.0 * 10.0,
        );

        // Loss is twice the learning rate
        let incumbent = result.incumbent().unwrap();
        let best_rate = result
            .all_runs()
            .iter()
            .filter(|run| run.budget == 10.0)
            .map(|run| run.loss / 2.0)
            .fold(f64::INFINITY, f64::min);
        assert_close(
            incumbent.config.get_float("learning_rate").unwrap(),
            best_rate,
        );
        for run in result.all_runs() {
            assert_eq!(run.info.rewards[0].len(), NUM_EPISODES as usize);
        }
    }

    #[test]
    fn promotes_best_configs() {
        let space = policy_gradient_space().unwrap();
        let mut bohb = Bohb::new(space, BohbConfig::default(), Prng::seed_from_u64(3)).unwrap();
        let result = bohb
            .run(1, &Worker::new(LearningRateRunner), None, &mut ())
            .unwrap();
        let mut first_stage: Vec<_> = result
            .all_runs()
            .iter()
            .filter(|run| run.budget < 2.0)
            .map(|run| (run.loss, run.config_id))
            .collect();
        first_stage.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut promoted: Vec<_> = result
            .all_runs()
            .iter()
            .filter(|run| run.budget > 2.0 && run.budget < 5.0)
            .map(|run| run.config_id)
            .collect();
        promoted.sort();
        let mut expected: Vec<_> = first_stage.iter().take(3).map(|(_, id)| *id).collect();
        expected.sort();
        assert_eq!(promoted, expected);
    }

    #[test]
    fn failure_aborts() {
        let space = policy_gradient_space().unwrap();
        let config = BohbConfig {
            num_workers: 2,
            ..BohbConfig::default()
        };
        let mut bohb = Bohb::new(space, config, Prng::seed_from_u64(4)).unwrap();
        assert!(matches!(
            bohb.run(1, &Worker::new(FailingRunner), None, &mut ()),
            Err(TuneError::BuildAgent(_))
        ));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    fn evaluation_panic_aborts(#[case] num_workers: usize) {
        let space = policy_gradient_space().unwrap();
        let config = BohbConfig {
            num_workers,
            ..BohbConfig::default()
        };
        let mut bohb = Bohb::new(space, config, Prng::seed_from_u64(7)).unwrap();
        let worker = Worker::new(PanicOnceRunner::default());
        assert!(matches!(
            bohb.run(1, &worker, None, &mut ()),
            Err(TuneError::WorkerPanic)
        ));
    }

    #[test]
    fn warm_start_continues() {
        let dir = tempfile::tempdir().unwrap();
        let space = policy_gradient_space().unwrap();
        let worker = Worker::new(LearningRateRunner);
        {
            let mut logger = JsonResultLogger::new(dir.path(), true).unwrap();
            let mut bohb =
                Bohb::new(space.clone(), BohbConfig::default(), Prng::seed_from_u64(5)).unwrap();
            bohb.run(1, &worker, Some(&mut logger), &mut ()).unwrap();
        }
        let previous = super::super::result::logged_results(dir.path()).unwrap();
        assert_eq!(previous.num_configs(), 9);
        assert_eq!(previous.all_runs().len(), 13);

        let mut bohb = Bohb::new(space, BohbConfig::default(), Prng::seed_from_u64(6)).unwrap();
        bohb.warm_start(previous);
        let result = bohb.run(1, &worker, None, &mut ()).unwrap();
        // The second iteration uses the second bracket
        assert_eq!(result.num_configs(), 9 + 3);
        assert_eq!(result.all_runs().len(), 13 + 3 + 1);
        assert!(result.id2config().contains_key(&ConfigId(1, 0, 2)));
    }

    /// Records logged losses.
    struct LossesLogger<'a>(&'a mut Vec<f64>);

    impl Logger for LossesLogger<'_> {
        fn log(
            &mut self,
            event: Event,
            name: &str,
            value: Loggable,
        ) -> Result<(), LogError> {
            if let (Event::Evaluation, "loss", Loggable::Scalar(loss)) =
                (event, name, value)
            {
                self.0.push(loss);
            }
            Ok(())
        }

        fn done(&mut self, _: Event) {}
    }
}
