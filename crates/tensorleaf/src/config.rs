// ParameterConfig: everything needed to construct a LearnableParameter
//
// Built in code with chained setters, or read from a configuration record:
//
//   let cfg = ParameterConfig::default()
//       .name("W1")
//       .shape((0, 784))
//       .init(InitDirectives::default().init("gaussian").init_value_scale(2.0));
//
//   let cfg = ParameterConfig::from_record(&Record::from_json(r#"{
//       "shape": [0, 784], "init": "gaussian", "initValueScale": 2
//   }"#)?)?;
//
// RECORD KEYS:
//
//   name                    node name (default "<placeholder>")
//   deviceId                negative = CPU (default), n >= 0 = GPU n
//   shape                   required; a number or an array, 0 = infer
//   learningRateMultiplier  default 1; 0 freezes the parameter
//   init, initValue, initFromFilePath, initFromLiteral, value,
//   initValueScale (1), randomSeed (-1), initOnCPUOnly (true)
//
// The old needsGradient / needGradient / computeGradient keys are rejected.

use std::path::PathBuf;

use tensorleaf_core::{ConfigRecord, ConfigValue, DeviceId, Error, Result, TensorShape};

use crate::init::InitDirectives;

const DEPRECATED_GRADIENT_KEYS: [&str; 3] = ["needsGradient", "needGradient", "computeGradient"];

/// Construction parameters of a learnable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterConfig {
    pub name: String,
    pub device: DeviceId,
    pub shape: TensorShape,
    /// Learning-rate multiplier; 0 means frozen.
    pub gradient_multiplier: f32,
    pub init: InitDirectives,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            name: "<placeholder>".to_string(),
            device: DeviceId::Cpu,
            shape: TensorShape::empty(),
            gradient_multiplier: 1.0,
            init: InitDirectives::default(),
        }
    }
}

impl ParameterConfig {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
    pub fn device(mut self, device: DeviceId) -> Self {
        self.device = device;
        self
    }
    pub fn shape(mut self, shape: impl Into<TensorShape>) -> Self {
        self.shape = shape.into();
        self
    }
    pub fn gradient_multiplier(mut self, m: f32) -> Self {
        self.gradient_multiplier = m;
        self
    }
    pub fn init(mut self, init: InitDirectives) -> Self {
        self.init = init;
        self
    }

    /// Read a configuration record.
    pub fn from_record<C: ConfigRecord>(record: &C) -> Result<Self> {
        let defaults = ParameterConfig::default();

        let gradient_multiplier = if record.exists("learningRateMultiplier") {
            record.get::<f32>("learningRateMultiplier")?
        } else if DEPRECATED_GRADIENT_KEYS.iter().any(|k| record.exists(k)) {
            return Err(Error::invalid_argument(
                "deprecated parameter names needsGradient|needGradient|computeGradient are not supported; use learningRateMultiplier instead",
            ));
        } else {
            defaults.gradient_multiplier
        };

        Ok(ParameterConfig {
            name: record.get_or("name", defaults.name)?,
            device: record.get_or("deviceId", defaults.device)?,
            shape: record.get("shape")?,
            gradient_multiplier,
            init: InitDirectives::from_record(record)?,
        })
    }
}

impl InitDirectives {
    /// Read the initialization keys of a configuration record. Empty strings
    /// count as absent.
    pub fn from_record<C: ConfigRecord>(record: &C) -> Result<Self> {
        let defaults = InitDirectives::default();
        let non_empty = |key: &str| -> Result<Option<String>> {
            let s: String = record.get_or(key, String::new())?;
            Ok(Some(s).filter(|s| !s.is_empty()))
        };
        Ok(InitDirectives {
            init: non_empty("init")?,
            init_value: record.find("initValue").cloned(),
            init_from_file_path: non_empty("initFromFilePath")?.map(PathBuf::from),
            init_from_literal: non_empty("initFromLiteral")?,
            value: match record.find("value") {
                Some(ConfigValue::Number(v)) => Some(*v),
                Some(_) => Some(record.get::<f64>("value")?),
                None => None,
            },
            init_value_scale: record.get_or("initValueScale", defaults.init_value_scale)?,
            random_seed: record.get_or("randomSeed", defaults.random_seed)?,
            init_on_cpu_only: record.get_or("initOnCPUOnly", defaults.init_on_cpu_only)?,
        })
    }
}
