// Config: named, typed lookups over a configuration record
//
// Nodes are constructed from a record of named values produced by whatever
// front end describes the network. The node only ever needs two things
// from it:
//
//   exists(key)   is the key present?
//   get::<T>(key) the value as T, or an error if absent / wrong-typed
//
// `ConfigRecord` is that interface. `Record` is an in-memory implementation
// that can be built in code or parsed from a JSON object:
//
//   let rec = Record::from_json(r#"{ "shape": [0, 784], "init": "gaussian" }"#)?;
//   let shape: TensorShape = rec.get("shape")?;

use std::collections::BTreeMap;
use std::fmt;

use crate::device::DeviceId;
use crate::error::{Error, Result};
use crate::shape::TensorShape;

/// One configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn is_string(&self) -> bool {
        matches!(self, ConfigValue::String(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON value. Objects and null have no counterpart.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;
        Ok(match value {
            Value::String(s) => ConfigValue::String(s.clone()),
            Value::Bool(b) => ConfigValue::Bool(*b),
            Value::Number(n) => ConfigValue::Number(
                n.as_f64()
                    .ok_or_else(|| Error::invalid_argument(format!("number {n} out of range")))?,
            ),
            Value::Array(items) => ConfigValue::Array(
                items
                    .iter()
                    .map(ConfigValue::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Null | Value::Object(_) => {
                return Err(Error::invalid_argument(format!(
                    "unsupported configuration value: {value}"
                )))
            }
        })
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "'{}'", s),
            ConfigValue::Number(n) => write!(f, "{}", n),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Array(items) => {
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ":")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Number(n)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Number(n as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<&[usize]> for ConfigValue {
    fn from(dims: &[usize]) -> Self {
        ConfigValue::Array(dims.iter().map(|&d| ConfigValue::Number(d as f64)).collect())
    }
}

impl<const N: usize> From<[usize; N]> for ConfigValue {
    fn from(dims: [usize; N]) -> Self {
        ConfigValue::from(&dims[..])
    }
}

// Typed extraction

/// Types that can be read out of a [`ConfigValue`].
pub trait FromConfigValue: Sized {
    /// Description used in type errors ("a number", ...).
    const EXPECTED: &'static str;

    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for ConfigValue {
    const EXPECTED: &'static str = "any value";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromConfigValue for f64 {
    const EXPECTED: &'static str = "a number";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromConfigValue for f32 {
    const EXPECTED: &'static str = "a number";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_f64().map(|n| n as f32)
    }
}

impl FromConfigValue for i64 {
    const EXPECTED: &'static str = "an integer";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_f64().filter(|n| n.fract() == 0.0).map(|n| n as i64)
    }
}

impl FromConfigValue for u64 {
    const EXPECTED: &'static str = "a non-negative integer";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        i64::from_config_value(value).and_then(|n| u64::try_from(n).ok())
    }
}

impl FromConfigValue for usize {
    const EXPECTED: &'static str = "a non-negative integer";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        u64::from_config_value(value).and_then(|n| usize::try_from(n).ok())
    }
}

impl FromConfigValue for bool {
    const EXPECTED: &'static str = "a boolean";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromConfigValue for String {
    const EXPECTED: &'static str = "a string";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromConfigValue for TensorShape {
    const EXPECTED: &'static str = "a dimension or an array of dimensions";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Array(items) => items
                .iter()
                .map(usize::from_config_value)
                .collect::<Option<Vec<_>>>()
                .map(TensorShape::new),
            other => usize::from_config_value(other).map(TensorShape::from),
        }
    }
}

impl FromConfigValue for DeviceId {
    const EXPECTED: &'static str = "a device id";
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) => DeviceId::parse(s).ok(),
            other => i64::from_config_value(other).map(DeviceId::from_config_id),
        }
    }
}

// ConfigRecord

/// Named optional lookups with existence checks.
pub trait ConfigRecord {
    /// The raw value under `key`, if present.
    fn find(&self, key: &str) -> Option<&ConfigValue>;

    /// Is `key` present?
    fn exists(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// The value under `key` as `T`; fails if absent or of the wrong type.
    fn get<T: FromConfigValue>(&self, key: &str) -> Result<T>
    where
        Self: Sized,
    {
        let value = self.find(key).ok_or_else(|| Error::MissingConfig {
            key: key.to_string(),
        })?;
        T::from_config_value(value).ok_or_else(|| Error::ConfigType {
            key: key.to_string(),
            expected: T::EXPECTED,
            got: value.to_string(),
        })
    }

    /// Like [`ConfigRecord::get`], but an absent key yields `default`.
    /// A present key of the wrong type is still an error.
    fn get_or<T: FromConfigValue>(&self, key: &str, default: T) -> Result<T>
    where
        Self: Sized,
    {
        if self.exists(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }
}

/// In-memory configuration record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: BTreeMap<String, ConfigValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Parse a JSON object into a record.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::invalid_argument(format!("invalid configuration JSON: {e}")))?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_argument("configuration JSON must be an object"))?;
        let mut record = Record::new();
        for (key, v) in object {
            record.insert(key.clone(), ConfigValue::from_json(v)?);
        }
        Ok(record)
    }
}

impl ConfigRecord for Record {
    fn find(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }
}
