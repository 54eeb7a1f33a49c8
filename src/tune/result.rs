//! Tuning results and result logging
use super::space::Sample;
use super::worker::EvaluationInfo;
use super::TuneError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CONFIGS_FILE: &str = "configs.jsonl";
pub const RUNS_FILE: &str = "runs.jsonl";
pub const RESULTS_FILE: &str = "results.json";

/// Identifies a sampled configuration: (iteration, bracket stage, index within the stage).
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ConfigId(pub usize, pub usize, pub usize);

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}

/// A sampled configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub config_id: ConfigId,
    pub config: Sample,
    /// Whether the configuration was proposed by the density model rather than at random.
    pub model_based_pick: bool,
}

/// A completed evaluation of a configuration at some budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub config_id: ConfigId,
    pub budget: f64,
    pub loss: f64,
    pub info: EvaluationInfo,
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Run(config_id={}, budget={:.2}, loss={:.4})",
            self.config_id, self.budget, self.loss
        )
    }
}

#[derive(Serialize, Deserialize)]
struct ResultFile {
    configs: Vec<ConfigRecord>,
    runs: Vec<Run>,
}

/// All configurations sampled and all runs executed by a tuning session.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ResultFile", into = "ResultFile")]
pub struct TuneResult {
    configs: BTreeMap<ConfigId, ConfigRecord>,
    runs: Vec<Run>,
}

impl From<ResultFile> for TuneResult {
    fn from(file: ResultFile) -> Self {
        let mut result = Self::new();
        for record in file.configs {
            result.add_config(record);
        }
        result.runs = file.runs;
        result
    }
}

impl From<TuneResult> for ResultFile {
    fn from(result: TuneResult) -> Self {
        Self {
            configs: result.configs.into_values().collect(),
            runs: result.runs,
        }
    }
}

impl TuneResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_config(&mut self, record: ConfigRecord) {
        self.configs.insert(record.config_id, record);
    }

    pub fn add_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Add all configurations and runs of another result.
    pub fn merge(&mut self, other: Self) {
        self.configs.extend(other.configs);
        self.runs.extend(other.runs);
    }

    /// All sampled configurations by ID.
    pub const fn id2config(&self) -> &BTreeMap<ConfigId, ConfigRecord> {
        &self.configs
    }

    pub fn all_runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn runs_by_id(&self, config_id: ConfigId) -> Vec<&Run> {
        self.runs
            .iter()
            .filter(|run| run.config_id == config_id)
            .collect()
    }

    pub fn num_configs(&self) -> usize {
        self.configs.len()
    }

    /// Sum of the budgets of all runs.
    pub fn total_budget(&self) -> f64 {
        self.runs.iter().map(|run| run.budget).sum()
    }

    /// First iteration number not used by any configuration.
    pub fn next_iteration(&self) -> usize {
        self.configs
            .keys()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0)
    }

    /// The configuration with the lowest loss among runs at the largest evaluated budget.
    pub fn incumbent_id(&self) -> Option<ConfigId> {
        let max_budget = self
            .runs
            .iter()
            .map(|run| run.budget)
            .fold(f64::NEG_INFINITY, f64::max);
        self.runs
            .iter()
            .filter(|run| run.budget == max_budget && !run.loss.is_nan())
            .min_by(|a, b| a.loss.total_cmp(&b.loss))
            .map(|run| run.config_id)
    }

    pub fn incumbent(&self) -> Option<&ConfigRecord> {
        self.incumbent_id().and_then(|id| self.configs.get(&id))
    }

    /// Save as pretty-printed JSON to `results.json` in a directory.
    pub fn save<P: AsRef<Path>>(&self, directory: P) -> Result<PathBuf, TuneError> {
        fs::create_dir_all(&directory)?;
        let path = directory.as_ref().join(RESULTS_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(path)
    }

    /// Load from a file written by [`TuneResult::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TuneError> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }
}

/// Logs configurations and runs as they happen, one JSON object per line.
#[derive(Debug)]
pub struct JsonResultLogger {
    configs: BufWriter<File>,
    runs: BufWriter<File>,
    logged_configs: HashSet<ConfigId>,
}

impl JsonResultLogger {
    /// Create a logger writing to `configs.jsonl` and `runs.jsonl` in a directory.
    ///
    /// Existing files are truncated if `overwrite` and appended to otherwise.
    pub fn new<P: AsRef<Path>>(directory: P, overwrite: bool) -> Result<Self, TuneError> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;
        let open = |name: &str| -> Result<BufWriter<File>, TuneError> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(!overwrite)
                .truncate(overwrite)
                .open(directory.join(name))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self {
            configs: open(CONFIGS_FILE)?,
            runs: open(RUNS_FILE)?,
            logged_configs: HashSet::new(),
        })
    }

    /// Log a configuration. Configurations already logged by this logger are skipped.
    pub fn new_config(&mut self, record: &ConfigRecord) -> Result<(), TuneError> {
        if self.logged_configs.insert(record.config_id) {
            write_line(&mut self.configs, record)?;
        }
        Ok(())
    }

    pub fn log_run(&mut self, run: &Run) -> Result<(), TuneError> {
        write_line(&mut self.runs, run)
    }
}

fn write_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), TuneError> {
    serde_json::to_writer(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn read_lines<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, TuneError> {
    let mut values = Vec::new();
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            values.push(serde_json::from_str(&line)?);
        }
    }
    Ok(values)
}

/// Rebuild a result from the files written by a [`JsonResultLogger`].
pub fn logged_results<P: AsRef<Path>>(directory: P) -> Result<TuneResult, TuneError> {
    let directory = directory.as_ref();
    let mut result = TuneResult::new();
    for record in read_lines(&directory.join(CONFIGS_FILE))? {
        result.add_config(record);
    }
    for run in read_lines(&directory.join(RUNS_FILE))? {
        result.add_run(run);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn record(config_id: ConfigId, batch_size: i64) -> ConfigRecord {
        let mut config = Sample::new();
        config.insert("batch_size", batch_size);
        config.insert("baseline", "no");
        ConfigRecord {
            config_id,
            config,
            model_based_pick: false,
        }
    }

    fn run(config_id: ConfigId, budget: f64, loss: f64) -> Run {
        Run {
            config_id,
            budget,
            loss,
            info: EvaluationInfo {
                rewards: vec![vec![1.0, 2.0]],
            },
        }
    }

    #[fixture]
    fn result() -> TuneResult {
        let mut result = TuneResult::new();
        for i in 0..3 {
            result.add_config(record(ConfigId(0, 0, i), i as i64 + 1));
        }
        result.add_run(run(ConfigId(0, 0, 0), 1.0, -5.0));
        result.add_run(run(ConfigId(0, 0, 1), 1.0, -3.0));
        result.add_run(run(ConfigId(0, 0, 2), 1.0, -1.0));
        result.add_run(run(ConfigId(0, 0, 1), 3.0, -4.0));
        result.add_run(run(ConfigId(0, 0, 2), 3.0, -2.0));
        result
    }

    #[rstest]
    fn incumbent_at_largest_budget(result: TuneResult) {
        // ConfigId(0, 0, 0) has the lowest loss overall but only at the smaller budget
        assert_eq!(result.incumbent_id(), Some(ConfigId(0, 0, 1)));
        assert_eq!(
            result.incumbent().unwrap().config.get_int("batch_size"),
            Ok(2)
        );
    }

    #[test]
    fn empty_has_no_incumbent() {
        assert_eq!(TuneResult::new().incumbent_id(), None);
    }

    #[rstest]
    fn summary_values(result: TuneResult) {
        assert_eq!(result.num_configs(), 3);
        assert_eq!(result.all_runs().len(), 5);
        assert_eq!(result.total_budget(), 9.0);
        assert_eq!(result.runs_by_id(ConfigId(0, 0, 2)).len(), 2);
        assert_eq!(result.next_iteration(), 1);
    }

    #[rstest]
    fn save_load(result: TuneResult) {
        let dir = tempfile::tempdir().unwrap();
        let path = result.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(RESULTS_FILE));
        assert_eq!(TuneResult::load(&path).unwrap(), result);
    }

    #[rstest]
    fn logged_results_restore(result: TuneResult) {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut logger = JsonResultLogger::new(dir.path(), true).unwrap();
            for record in result.id2config().values() {
                logger.new_config(record).unwrap();
                // Repeats are ignored
                logger.new_config(record).unwrap();
            }
            for run in result.all_runs() {
                logger.log_run(run).unwrap();
            }
        }
        assert_eq!(logged_results(dir.path()).unwrap(), result);
    }

    #[rstest]
    fn overwrite_truncates(result: TuneResult) {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let mut logger = JsonResultLogger::new(dir.path(), true).unwrap();
            for run in result.all_runs() {
                logger.log_run(run).unwrap();
            }
        }
        assert_eq!(logged_results(dir.path()).unwrap().all_runs().len(), 5);
    }

    #[rstest]
    fn append_keeps_previous(result: TuneResult) {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let mut logger = JsonResultLogger::new(dir.path(), false).unwrap();
            for run in result.all_runs() {
                logger.log_run(run).unwrap();
            }
        }
        assert_eq!(logged_results(dir.path()).unwrap().all_runs().len(), 10);
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            logged_results(dir.path().join("nope")),
            Err(TuneError::Io(_))
        ));
    }

    #[rstest]
    fn merge(result: TuneResult) {
        let mut merged = TuneResult::new();
        merged.add_config(record(ConfigId(1, 0, 0), 7));
        merged.add_run(run(ConfigId(1, 0, 0), 10.0, 0.0));
        merged.merge(result);
        assert_eq!(merged.num_configs(), 4);
        assert_eq!(merged.incumbent_id(), Some(ConfigId(1, 0, 0)));
    }
}
