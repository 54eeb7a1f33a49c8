//! Hyperparameter search spaces with conditional hyperparameters
use crate::Prng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Error declaring a search space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceError {
    #[error("hyperparameter {0} is already declared")]
    DuplicateName(String),
    #[error("no hyperparameter named {0}")]
    UnknownName(String),
    #[error("hyperparameter {0} has an empty or invalid domain")]
    InvalidDomain(String),
    #[error("condition parent {0} is not categorical")]
    NotCategorical(String),
    #[error("{value} is not a choice of {name}")]
    InvalidChoice { name: String, value: String },
    #[error("hyperparameter {0} already has a condition")]
    DuplicateCondition(String),
}

/// Error reading a value from a [`Sample`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("hyperparameter {0} missing from sample")]
    Missing(String),
    #[error("hyperparameter {name} is not {expected}")]
    WrongType { name: String, expected: &'static str },
    #[error("{value} is not a valid choice of {name}")]
    InvalidChoice { name: String, value: String },
}

/// Set of values a hyperparameter may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    /// Integers in `[lower, upper]`, optionally log-scaled.
    Integer { lower: i64, upper: i64, log: bool },
    /// Reals in `[lower, upper]`, optionally log-scaled.
    Float { lower: f64, upper: f64, log: bool },
    /// One of a list of named choices.
    Categorical { choices: Vec<String> },
}

impl Domain {
    fn is_valid(&self) -> bool {
        match self {
            Self::Integer { lower, upper, log } => lower <= upper && (!log || *lower >= 1),
            Self::Float { lower, upper, log } => {
                lower.is_finite() && upper.is_finite() && lower <= upper && (!log || *lower > 0.0)
            }
            Self::Categorical { choices } => !choices.is_empty(),
        }
    }

    /// Continuous bounds of a numeric domain, in the (optionally log) transformed scale.
    #[allow(clippy::cast_precision_loss)]
    fn transformed_bounds(&self) -> Option<(f64, f64, bool)> {
        let (lower, upper, log) = match *self {
            // Each integer owns the unit-width interval around it
            Self::Integer { lower, upper, log } => (lower as f64 - 0.5, upper as f64 + 0.5, log),
            Self::Float { lower, upper, log } => (lower, upper, log),
            Self::Categorical { .. } => return None,
        };
        Some(if log {
            (lower.ln(), upper.ln(), true)
        } else {
            (lower, upper, false)
        })
    }

    /// Number of choices of a categorical domain.
    pub fn num_choices(&self) -> Option<usize> {
        match self {
            Self::Categorical { choices } => Some(choices.len()),
            _ => None,
        }
    }

    /// Vector representation of a value.
    ///
    /// Numeric values map to `[0, 1]`; categorical values map to their choice index.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_unit(&self, value: &Value) -> Option<f64> {
        match (self, value) {
            (Self::Categorical { choices }, Value::Choice(choice)) => {
                choices.iter().position(|c| c == choice).map(|i| i as f64)
            }
            (Self::Integer { .. }, Value::Int(x)) => self.numeric_to_unit(*x as f64),
            (Self::Float { .. }, Value::Float(x)) => self.numeric_to_unit(*x),
            _ => None,
        }
    }

    fn numeric_to_unit(&self, x: f64) -> Option<f64> {
        let (low, high, log) = self.transformed_bounds()?;
        let t = if log { x.ln() } else { x };
        Some(if high > low {
            ((t - low) / (high - low)).clamp(0.0, 1.0)
        } else {
            0.5
        })
    }

    /// Value of a vector representation; inverse of [`Domain::to_unit`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_unit(&self, u: f64) -> Value {
        match self {
            Self::Categorical { choices } => {
                let index = (u.round().max(0.0) as usize).min(choices.len().saturating_sub(1));
                Value::Choice(choices.get(index).cloned().unwrap_or_default())
            }
            Self::Integer { lower, upper, .. } => {
                let x = self.numeric_from_unit(u).round() as i64;
                Value::Int(x.clamp(*lower, *upper))
            }
            Self::Float { lower, upper, .. } => {
                Value::Float(self.numeric_from_unit(u).clamp(*lower, *upper))
            }
        }
    }

    fn numeric_from_unit(&self, u: f64) -> f64 {
        match self.transformed_bounds() {
            Some((low, high, log)) => {
                let t = low + u.clamp(0.0, 1.0) * (high - low);
                if log {
                    t.exp()
                } else {
                    t
                }
            }
            None => u,
        }
    }

    /// Sample uniformly (in the transformed scale).
    pub fn sample(&self, rng: &mut Prng) -> Value {
        match self {
            Self::Categorical { choices } => {
                Value::Choice(choices[rng.gen_range(0..choices.len())].clone())
            }
            _ => self.from_unit(rng.gen()),
        }
    }
}

/// A named hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameter {
    pub name: String,
    pub domain: Domain,
}

impl Hyperparameter {
    pub fn integer(name: &str, lower: i64, upper: i64, log: bool) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Integer { lower, upper, log },
        }
    }

    pub fn float(name: &str, lower: f64, upper: f64, log: bool) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Float { lower, upper, log },
        }
    }

    pub fn categorical(name: &str, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Categorical {
                choices: choices.iter().map(|&c| c.into()).collect(),
            },
        }
    }
}

/// Activation condition of a hyperparameter on a categorical parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Active when `parent == value`.
    Equals {
        child: String,
        parent: String,
        value: String,
    },
    /// Active when `parent != value`.
    NotEquals {
        child: String,
        parent: String,
        value: String,
    },
}

impl Condition {
    pub fn equals(child: &str, parent: &str, value: &str) -> Self {
        Self::Equals {
            child: child.into(),
            parent: parent.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(child: &str, parent: &str, value: &str) -> Self {
        Self::NotEquals {
            child: child.into(),
            parent: parent.into(),
            value: value.into(),
        }
    }

    pub fn child(&self) -> &str {
        match self {
            Self::Equals { child, .. } | Self::NotEquals { child, .. } => child,
        }
    }

    pub fn parent(&self) -> &str {
        match self {
            Self::Equals { parent, .. } | Self::NotEquals { parent, .. } => parent,
        }
    }

    fn value(&self) -> &str {
        match self {
            Self::Equals { value, .. } | Self::NotEquals { value, .. } => value,
        }
    }

    /// Whether the condition holds for a parent value. An absent parent never satisfies.
    pub fn is_satisfied(&self, parent_value: Option<&Value>) -> bool {
        match (self, parent_value) {
            (_, None) => false,
            (Self::Equals { value, .. }, Some(v)) => v.as_choice() == Some(value.as_str()),
            (Self::NotEquals { value, .. }, Some(v)) => v.as_choice() != Some(value.as_str()),
        }
    }
}

/// A hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Choice(String),
}

impl Value {
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            Self::Choice(choice) => Some(choice),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{}", x),
            Self::Float(x) => write!(f, "{}", x),
            Self::Choice(c) => f.write_str(c),
        }
    }
}

/// A point in a search space: values of the active hyperparameters.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample(BTreeMap<String, Value>);

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert<V: Into<Value>>(&mut self, name: &str, value: V) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, name: &str) -> Result<&Value, SampleError> {
        self.get(name)
            .ok_or_else(|| SampleError::Missing(name.into()))
    }

    pub fn get_int(&self, name: &str) -> Result<i64, SampleError> {
        match self.require(name)? {
            Value::Int(x) => Ok(*x),
            _ => Err(SampleError::WrongType {
                name: name.into(),
                expected: "an integer",
            }),
        }
    }

    /// Get a real value; integer values are converted.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_float(&self, name: &str) -> Result<f64, SampleError> {
        match self.require(name)? {
            Value::Float(x) => Ok(*x),
            Value::Int(x) => Ok(*x as f64),
            Value::Choice(_) => Err(SampleError::WrongType {
                name: name.into(),
                expected: "a number",
            }),
        }
    }

    pub fn get_choice(&self, name: &str) -> Result<&str, SampleError> {
        self.require(name)?
            .as_choice()
            .ok_or_else(|| SampleError::WrongType {
                name: name.into(),
                expected: "a choice",
            })
    }

    /// Get a yes/no choice as a boolean.
    pub fn get_flag(&self, name: &str) -> Result<bool, SampleError> {
        match self.get_choice(name)? {
            "yes" => Ok(true),
            "no" => Ok(false),
            other => Err(SampleError::InvalidChoice {
                name: name.into(),
                value: other.into(),
            }),
        }
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Self::Int(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(choice: &str) -> Self {
        Self::Choice(choice.into())
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

/// A search space of hyperparameters, some active only under conditions on others.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpace {
    hyperparameters: Vec<Hyperparameter>,
    conditions: Vec<Condition>,
}

impl ConfigSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hyperparameters(&self) -> &[Hyperparameter] {
        &self.hyperparameters
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Number of hyperparameters.
    pub fn len(&self) -> usize {
        self.hyperparameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyperparameters.is_empty()
    }

    pub fn hyperparameter(&self, name: &str) -> Option<&Hyperparameter> {
        self.hyperparameters.iter().find(|h| h.name == name)
    }

    pub fn add_hyperparameter(&mut self, hyperparameter: Hyperparameter) -> Result<(), SpaceError> {
        if self.hyperparameter(&hyperparameter.name).is_some() {
            return Err(SpaceError::DuplicateName(hyperparameter.name));
        }
        if !hyperparameter.domain.is_valid() {
            return Err(SpaceError::InvalidDomain(hyperparameter.name));
        }
        self.hyperparameters.push(hyperparameter);
        Ok(())
    }

    /// Add an activation condition. Each hyperparameter may have at most one.
    pub fn add_condition(&mut self, condition: Condition) -> Result<(), SpaceError> {
        let child = condition.child();
        if self.hyperparameter(child).is_none() {
            return Err(SpaceError::UnknownName(child.into()));
        }
        if self.condition(child).is_some() || child == condition.parent() {
            return Err(SpaceError::DuplicateCondition(child.into()));
        }
        let parent = self
            .hyperparameter(condition.parent())
            .ok_or_else(|| SpaceError::UnknownName(condition.parent().into()))?;
        match &parent.domain {
            Domain::Categorical { choices } => {
                if !choices.iter().any(|c| c == condition.value()) {
                    return Err(SpaceError::InvalidChoice {
                        name: parent.name.clone(),
                        value: condition.value().into(),
                    });
                }
            }
            _ => return Err(SpaceError::NotCategorical(parent.name.clone())),
        }
        self.conditions.push(condition);
        Ok(())
    }

    fn condition(&self, child: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.child() == child)
    }

    /// Whether a hyperparameter is active given the other values in a sample.
    ///
    /// Unconditional hyperparameters are always active.
    /// A conditional hyperparameter is active if its condition holds for the parent value
    /// and the parent is itself active.
    pub fn is_active(&self, name: &str, sample: &Sample) -> bool {
        let mut name = name;
        // Conditions form a forest so following parents terminates; bound it anyway
        for _ in 0..=self.conditions.len() {
            match self.condition(name) {
                None => return true,
                Some(condition) => {
                    if !condition.is_satisfied(sample.get(condition.parent())) {
                        return false;
                    }
                    name = condition.parent();
                }
            }
        }
        false
    }

    /// Remove the values of inactive hyperparameters from a sample.
    pub fn deactivate_inactive(&self, sample: &mut Sample) {
        loop {
            let inactive: Vec<String> = sample
                .iter()
                .filter(|(name, _)| !self.is_active(name, sample))
                .map(|(name, _)| name.to_owned())
                .collect();
            if inactive.is_empty() {
                break;
            }
            for name in inactive {
                sample.remove(&name);
            }
        }
    }

    /// Sample a configuration uniformly at random (in each hyperparameter's scale).
    pub fn sample(&self, rng: &mut Prng) -> Sample {
        let mut sample = Sample::new();
        for hyperparameter in &self.hyperparameters {
            sample.insert(&hyperparameter.name, hyperparameter.domain.sample(rng));
        }
        self.deactivate_inactive(&mut sample);
        sample
    }

    /// Vector representation of a sample in declaration order; `None` for inactive values.
    pub fn to_vector(&self, sample: &Sample) -> Vec<Option<f64>> {
        self.hyperparameters
            .iter()
            .map(|h| sample.get(&h.name).and_then(|v| h.domain.to_unit(v)))
            .collect()
    }

    /// Sample from a vector representation. Inactive values are dropped.
    pub fn from_vector(&self, vector: &[Option<f64>]) -> Sample {
        let mut sample = Sample::new();
        for (hyperparameter, x) in self.hyperparameters.iter().zip(vector) {
            if let Some(x) = x {
                sample.insert(&hyperparameter.name, hyperparameter.domain.from_unit(*x));
            }
        }
        self.deactivate_inactive(&mut sample);
        sample
    }
}

/// Search space of the policy-gradient agent hyperparameters.
pub fn policy_gradient_space() -> Result<ConfigSpace, SpaceError> {
    let mut space = ConfigSpace::new();
    space.add_hyperparameter(Hyperparameter::integer("batch_size", 1, 50, true))?;
    space.add_hyperparameter(Hyperparameter::float("frequency", 1e-2, 1.0, true))?;
    space.add_hyperparameter(Hyperparameter::float("learning_rate", 1e-5, 0.1, true))?;
    space.add_hyperparameter(Hyperparameter::integer("horizon", 1, 100, true))?;
    space.add_hyperparameter(Hyperparameter::float("discount", 0.8, 1.0, true))?;
    space.add_hyperparameter(Hyperparameter::categorical("ratio_based", &["no", "yes"]))?;
    space.add_hyperparameter(Hyperparameter::categorical("baseline", &["no", "same", "yes"]))?;
    space.add_hyperparameter(Hyperparameter::float("baseline_weight", 1e-2, 1e2, false))?;
    space.add_hyperparameter(Hyperparameter::float(
        "baseline_learning_rate",
        1e-5,
        0.1,
        true,
    ))?;
    space.add_hyperparameter(Hyperparameter::categorical("estimate_advantage", &["no", "yes"]))?;
    space.add_hyperparameter(Hyperparameter::float(
        "entropy_regularization",
        1e-5,
        1.0,
        true,
    ))?;

    space.add_condition(Condition::not_equals("estimate_advantage", "baseline", "no"))?;
    space.add_condition(Condition::equals("baseline_weight", "baseline", "same"))?;
    space.add_condition(Condition::equals("baseline_learning_rate", "baseline", "yes"))?;
    Ok(space)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rstest::{fixture, rstest};

    #[fixture]
    fn space() -> ConfigSpace {
        policy_gradient_space().unwrap()
    }

    #[rstest]
    fn samples_respect_conditions(space: ConfigSpace) {
        let mut rng = Prng::seed_from_u64(0);
        for _ in 0..200 {
            let sample = space.sample(&mut rng);
            let baseline = sample.get_choice("baseline").unwrap();
            assert_eq!(sample.contains("estimate_advantage"), baseline != "no");
            assert_eq!(sample.contains("baseline_weight"), baseline == "same");
            assert_eq!(sample.contains("baseline_learning_rate"), baseline == "yes");
            assert_eq!(sample.len(), 9);
        }
    }

    #[rstest]
    fn samples_within_bounds(space: ConfigSpace) {
        let mut rng = Prng::seed_from_u64(1);
        for _ in 0..200 {
            let sample = space.sample(&mut rng);
            let batch_size = sample.get_int("batch_size").unwrap();
            assert!((1..=50).contains(&batch_size));
            let horizon = sample.get_int("horizon").unwrap();
            assert!((1..=100).contains(&horizon));
            let discount = sample.get_float("discount").unwrap();
            assert!((0.8..=1.0).contains(&discount));
            let lr = sample.get_float("learning_rate").unwrap();
            assert!((1e-5..=0.1).contains(&lr));
        }
    }

    #[rstest]
    fn log_scale_favours_small_values(space: ConfigSpace) {
        let mut rng = Prng::seed_from_u64(2);
        let small = (0..1000)
            .filter(|_| space.sample(&mut rng).get_float("learning_rate").unwrap() < 1e-3)
            .count();
        // Two of the four decades are below 1e-3
        assert!(small > 400 && small < 600, "{}", small);
    }

    #[rstest]
    fn vector_round_trip(space: ConfigSpace) {
        let mut rng = Prng::seed_from_u64(3);
        for _ in 0..50 {
            let sample = space.sample(&mut rng);
            let vector = space.to_vector(&sample);
            assert_eq!(vector.len(), space.len());
            let restored = space.from_vector(&vector);
            assert_eq!(restored.len(), sample.len());
            for (name, value) in sample.iter() {
                match (value, restored.get(name).unwrap()) {
                    (Value::Float(a), Value::Float(b)) => assert!((a - b).abs() <= 1e-9 * a.abs()),
                    (a, b) => assert_eq!(a, b),
                }
            }
        }
    }

    #[rstest]
    fn inactive_values_removed(space: ConfigSpace) {
        let mut sample = Sample::new();
        sample.insert("baseline", "no");
        sample.insert("baseline_weight", 3.0);
        sample.insert("estimate_advantage", "yes");
        space.deactivate_inactive(&mut sample);
        assert!(!sample.contains("baseline_weight"));
        assert!(!sample.contains("estimate_advantage"));
        assert!(sample.contains("baseline"));
    }

    #[test]
    fn nested_conditions_deactivate_transitively() {
        let mut space = ConfigSpace::new();
        space
            .add_hyperparameter(Hyperparameter::categorical("a", &["on", "off"]))
            .unwrap();
        space
            .add_hyperparameter(Hyperparameter::categorical("b", &["on", "off"]))
            .unwrap();
        space
            .add_hyperparameter(Hyperparameter::float("c", 0.0, 1.0, false))
            .unwrap();
        space.add_condition(Condition::equals("b", "a", "on")).unwrap();
        space.add_condition(Condition::equals("c", "b", "on")).unwrap();

        let mut sample = Sample::new();
        sample.insert("a", "off");
        sample.insert("b", "on");
        sample.insert("c", 0.5);
        space.deactivate_inactive(&mut sample);
        assert_eq!(sample.len(), 1);
    }

    #[rstest]
    #[case(Hyperparameter::float("learning_rate", 0.0, 1.0, false), SpaceError::DuplicateName("learning_rate".into()))]
    #[case(Hyperparameter::float("x", 0.0, 1.0, true), SpaceError::InvalidDomain("x".into()))]
    #[case(Hyperparameter::integer("x", 5, 1, false), SpaceError::InvalidDomain("x".into()))]
    #[case(Hyperparameter::categorical("x", &[]), SpaceError::InvalidDomain("x".into()))]
    fn invalid_hyperparameters(
        mut space: ConfigSpace,
        #[case] hyperparameter: Hyperparameter,
        #[case] expected: SpaceError,
    ) {
        assert_eq!(space.add_hyperparameter(hyperparameter), Err(expected));
    }

    #[rstest]
    #[case(Condition::equals("nope", "baseline", "no"), SpaceError::UnknownName("nope".into()))]
    #[case(Condition::equals("batch_size", "nope", "no"), SpaceError::UnknownName("nope".into()))]
    #[case(Condition::equals("batch_size", "horizon", "no"), SpaceError::NotCategorical("horizon".into()))]
    #[case(
        Condition::equals("batch_size", "baseline", "maybe"),
        SpaceError::InvalidChoice { name: "baseline".into(), value: "maybe".into() }
    )]
    #[case(
        Condition::equals("baseline_weight", "ratio_based", "yes"),
        SpaceError::DuplicateCondition("baseline_weight".into())
    )]
    fn invalid_conditions(
        mut space: ConfigSpace,
        #[case] condition: Condition,
        #[case] expected: SpaceError,
    ) {
        assert_eq!(space.add_condition(condition), Err(expected));
    }

    #[test]
    fn sample_getters() {
        let mut sample = Sample::new();
        sample.insert("n", 3);
        sample.insert("x", 0.5);
        sample.insert("flag", "yes");
        sample.insert("mode", "maybe");
        assert_eq!(sample.get_int("n"), Ok(3));
        assert_eq!(sample.get_float("n"), Ok(3.0));
        assert_eq!(sample.get_float("x"), Ok(0.5));
        assert_eq!(sample.get_flag("flag"), Ok(true));
        assert_eq!(sample.get_int("missing"), Err(SampleError::Missing("missing".into())));
        assert!(matches!(sample.get_int("x"), Err(SampleError::WrongType { .. })));
        assert!(matches!(sample.get_flag("mode"), Err(SampleError::InvalidChoice { .. })));
    }

    #[test]
    fn sample_json() {
        let mut sample = Sample::new();
        sample.insert("batch_size", 4);
        sample.insert("discount", 0.9);
        sample.insert("baseline", "same");
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"baseline":"same","batch_size":4,"discount":0.9}"#);
        let restored: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sample);
    }
}
