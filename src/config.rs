//! Opaque configuration objects
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

/// A configuration object: a JSON object of named settings.
///
/// Configurations are opaque to the code that passes them around.
/// They are interpreted only when converted to a typed configuration with
/// [`Config::deserialize`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(Map<String, Value>);

/// Error creating or interpreting a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration must be a JSON object, got {0}")]
    NotAnObject(Value),
    #[error("invalid configuration")]
    Json(#[from] serde_json::Error),
    #[error("error reading configuration")]
    Io(#[from] io::Error),
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration object from any value that serializes to a JSON object.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, ConfigError> {
        Self::try_from(serde_json::to_value(value)?)
    }

    /// Load a configuration object from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let value: Value = serde_json::from_reader(reader)?;
        Self::try_from(value)
    }

    /// Interpret the configuration as a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a nested configuration object, if `key` is present and is an object.
    pub fn get_config(&self, key: &str) -> Option<Self> {
        match self.0.get(key) {
            Some(Value::Object(map)) => Some(Self(map.clone())),
            _ => None,
        }
    }

    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Recursively merge another configuration into this one.
    ///
    /// Nested objects are merged key by key; any other value in `other` replaces the
    /// value in `self`.
    pub fn update(&mut self, other: &Self) {
        merge_maps(&mut self.0, &other.0);
    }

    /// Builder-style version of [`Config::update`].
    #[must_use]
    pub fn with_update(mut self, other: &Self) -> Self {
        self.update(other);
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(target_map)), Value::Object(source_map)) => {
                merge_maps(target_map, source_map)
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

impl TryFrom<Value> for Config {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ConfigError::NotAnObject(other)),
        }
    }
}

impl From<Map<String, Value>> for Config {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = Value::Object(self.0.clone());
        if f.alternate() {
            write!(f, "{:#}", value)
        } else {
            write!(f, "{}", value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Config {
        Config::try_from(value).unwrap()
    }

    #[test]
    fn update_merges_nested_objects() {
        let mut base = config(json!({"a": 1, "nested": {"x": 1, "y": 2}}));
        base.update(&config(json!({"b": 2, "nested": {"y": 3}})));
        assert_eq!(
            base,
            config(json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 3}}))
        );
    }

    #[test]
    fn update_replaces_non_objects() {
        let mut base = config(json!({"a": {"x": 1}}));
        base.update(&config(json!({"a": 5})));
        assert_eq!(base, config(json!({"a": 5})));
    }

    #[test]
    fn not_an_object() {
        assert!(matches!(
            Config::try_from(json!([1, 2])),
            Err(ConfigError::NotAnObject(_))
        ));
    }

    #[test]
    fn null_is_empty() {
        assert!(Config::try_from(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: f64,
            y: f64,
        }
        let point = Point { x: 1.0, y: -2.0 };
        let config = Config::from_serializable(&point).unwrap();
        assert_eq!(config.get("x"), Some(&json!(1.0)));
        assert_eq!(config.deserialize::<Point>().unwrap(), point);
    }

    #[test]
    fn get_config_only_objects() {
        let base = config(json!({"inner": {"a": 1}, "scalar": 2}));
        assert_eq!(base.get_config("inner"), Some(config(json!({"a": 1}))));
        assert_eq!(base.get_config("scalar"), None);
        assert_eq!(base.get_config("missing"), None);
    }
}
