// Initialization strategies: from configuration vocabulary to a closed enum
//
// A parameter's configuration may ask for its initial values in several
// overlapping ways, old and new:
//
//   init="uniform" | "gaussian"      random, scaled by initValueScale
//   init="zero"                      same as initValue=0
//   initValue=<number>               constant fill
//   initValue=<array>                reserved, not implemented
//   initFromFilePath="..."           load a text matrix; shape inferred from it
//   init="fixedValue", value=<n>     deprecated spelling of initValue=<n>
//   init="fromLiteral",
//     initFromLiteral="1 2; 3 4"     deprecated; load an inline matrix
//
// `InitToken` is the normalization layer: it maps every accepted spelling to
// one canonical token. `InitDirectives::resolve` then turns the directives
// into exactly one `InitRequest`:
//
//   Deferred(PendingInit)    fills that only need the shape; they run as
//                            soon as every dimension is known
//   FromFile / FromLiteral   loads that bring their own geometry and run
//                            immediately at construction
//
// Nothing downstream of this module compares strings.

use std::fmt;
use std::path::PathBuf;

use tensorleaf_core::{runtime_error, ConfigValue, Error, Result};

/// Canonical initialization tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitToken {
    Uniform,
    Gaussian,
    Zero,
    FromValue,
    FromValueArray,
    FromFile,
    /// Deprecated: constant from the `value` key.
    FixedValue,
    /// Deprecated: matrix from the `initFromLiteral` key.
    FromLiteral,
}

impl InitToken {
    /// Parse a configuration spelling. Unknown tokens are invalid arguments.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "uniform" => Ok(InitToken::Uniform),
            "gaussian" => Ok(InitToken::Gaussian),
            "zero" => Ok(InitToken::Zero),
            "fromValue" => Ok(InitToken::FromValue),
            "fromValueArray" => Ok(InitToken::FromValueArray),
            "fromFile" => Ok(InitToken::FromFile),
            "fixedValue" => Ok(InitToken::FixedValue),
            "fromLiteral" => Ok(InitToken::FromLiteral),
            other => Err(Error::invalid_argument(format!(
                "init must be one of [ uniform | gaussian | zero | fixedValue | fromFile | fromLiteral ], got '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InitToken::Uniform => "uniform",
            InitToken::Gaussian => "gaussian",
            InitToken::Zero => "zero",
            InitToken::FromValue => "fromValue",
            InitToken::FromValueArray => "fromValueArray",
            InitToken::FromFile => "fromFile",
            InitToken::FixedValue => "fixedValue",
            InitToken::FromLiteral => "fromLiteral",
        }
    }

    /// Spellings kept only for old configurations.
    pub fn is_deprecated(&self) -> bool {
        matches!(
            self,
            InitToken::FixedValue | InitToken::FromLiteral | InitToken::FromFile
        )
    }
}

impl fmt::Display for InitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distribution of a random initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RandomKind {
    /// U[-0.05 * scale, 0.05 * scale]
    Uniform,
    /// N(0, 0.2 * scale / sqrt(cols))
    Gaussian,
}

impl fmt::Display for RandomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandomKind::Uniform => write!(f, "uniform"),
            RandomKind::Gaussian => write!(f, "gaussian"),
        }
    }
}

/// An initialization that only needs the shape to be known.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingInit {
    /// Fill every element with the constant.
    FromValue(f64),
    /// Seeded random draw.
    Random {
        kind: RandomKind,
        seed: u64,
        scale: f64,
        /// Draw with the buffer on the CPU, then move it back.
        cpu_only: bool,
    },
}

impl PendingInit {
    pub fn uniform(seed: u64, scale: f64) -> Self {
        PendingInit::Random {
            kind: RandomKind::Uniform,
            seed,
            scale,
            cpu_only: true,
        }
    }

    pub fn gaussian(seed: u64, scale: f64) -> Self {
        PendingInit::Random {
            kind: RandomKind::Gaussian,
            seed,
            scale,
            cpu_only: true,
        }
    }
}

impl fmt::Display for PendingInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingInit::FromValue(v) => write!(f, "fromValue({})", v),
            PendingInit::Random {
                kind,
                seed,
                scale,
                cpu_only,
            } => write!(
                f,
                "{}(seed={}, scale={}, onCPU={})",
                kind, seed, scale, cpu_only
            ),
        }
    }
}

/// What construction must do about initial values.
#[derive(Debug, Clone, PartialEq)]
pub enum InitRequest {
    /// Record and run once the shape is complete.
    Deferred(PendingInit),
    /// Load a text matrix file now.
    FromFile(PathBuf),
    /// Parse a literal array now.
    FromLiteral(String),
}

// SeedAllocator

/// Hands out default random seeds.
///
/// A parameter asking for seed -1 (or any negative seed) gets the next value
/// of a counter starting at 1, so that every parameter in one construction
/// context is seeded differently but reproducibly. The allocator is passed in
/// explicitly; tests create their own to pin the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAllocator {
    next: u64,
}

impl SeedAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        SeedAllocator { next: first }
    }

    /// The seed to use for a request: `requested` if non-negative, otherwise
    /// the next counter value.
    pub fn allocate(&mut self, requested: i64) -> u64 {
        if requested >= 0 {
            return requested as u64;
        }
        let seed = self.next;
        self.next += 1;
        seed
    }

    /// The seed the next defaulted request will receive.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for SeedAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// InitDirectives

/// Every initialization-related directive a configuration may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct InitDirectives {
    /// Named strategy token; `None` or empty means "infer from the rest".
    pub init: Option<String>,
    /// Empty string, number or array.
    pub init_value: Option<ConfigValue>,
    pub init_from_file_path: Option<PathBuf>,
    pub init_from_literal: Option<String>,
    /// Constant for the deprecated `fixedValue` token.
    pub value: Option<f64>,
    pub init_value_scale: f64,
    /// Negative means "allocate one".
    pub random_seed: i64,
    pub init_on_cpu_only: bool,
}

impl Default for InitDirectives {
    fn default() -> Self {
        Self {
            init: None,
            init_value: None,
            init_from_file_path: None,
            init_from_literal: None,
            value: None,
            init_value_scale: 1.0,
            random_seed: -1,
            init_on_cpu_only: true,
        }
    }
}

impl InitDirectives {
    pub fn init(mut self, token: impl Into<String>) -> Self {
        self.init = Some(token.into());
        self
    }
    pub fn init_value(mut self, v: impl Into<ConfigValue>) -> Self {
        self.init_value = Some(v.into());
        self
    }
    pub fn init_from_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_from_file_path = Some(path.into());
        self
    }
    pub fn init_from_literal(mut self, literal: impl Into<String>) -> Self {
        self.init_from_literal = Some(literal.into());
        self
    }
    pub fn value(mut self, v: f64) -> Self {
        self.value = Some(v);
        self
    }
    pub fn init_value_scale(mut self, s: f64) -> Self {
        self.init_value_scale = s;
        self
    }
    pub fn random_seed(mut self, seed: i64) -> Self {
        self.random_seed = seed;
        self
    }
    pub fn init_on_cpu_only(mut self, cpu_only: bool) -> Self {
        self.init_on_cpu_only = cpu_only;
        self
    }

    fn file_path(&self) -> Option<&PathBuf> {
        self.init_from_file_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Pick the canonical token, inferring it when no name was given.
    ///
    /// Priority without a name: file path, then a non-string initValue,
    /// then (an empty initValue string or nothing) uniform.
    pub fn token(&self) -> Result<InitToken> {
        if let Some(name) = self.init.as_deref().filter(|s| !s.is_empty()) {
            return InitToken::parse(name);
        }
        if self.file_path().is_some() {
            return Ok(InitToken::FromFile);
        }
        match &self.init_value {
            Some(ConfigValue::Number(_)) => Ok(InitToken::FromValue),
            Some(ConfigValue::Array(_)) => Ok(InitToken::FromValueArray),
            Some(ConfigValue::Bool(_)) => Err(Error::invalid_argument(
                "'initValue' must be numerical",
            )),
            Some(ConfigValue::String(s)) if !s.is_empty() => Err(Error::invalid_argument(
                "'initValue' must be an empty string or not a string",
            )),
            Some(ConfigValue::String(_)) | None => Ok(InitToken::Uniform),
        }
    }

    /// Resolve to exactly one request. Random strategies with a negative
    /// seed draw their seed from `seeds`.
    pub fn resolve(&self, seeds: &mut SeedAllocator) -> Result<InitRequest> {
        let token = self.token()?;
        let request = match token {
            InitToken::Uniform | InitToken::Gaussian => {
                let kind = if token == InitToken::Uniform {
                    RandomKind::Uniform
                } else {
                    RandomKind::Gaussian
                };
                InitRequest::Deferred(PendingInit::Random {
                    kind,
                    seed: seeds.allocate(self.random_seed),
                    scale: self.init_value_scale,
                    cpu_only: self.init_on_cpu_only,
                })
            }
            InitToken::Zero => InitRequest::Deferred(PendingInit::FromValue(0.0)),
            InitToken::FromValue => match &self.init_value {
                Some(ConfigValue::Number(v)) => InitRequest::Deferred(PendingInit::FromValue(*v)),
                Some(ConfigValue::Array(_)) => return Err(array_init_unsupported()),
                _ => {
                    return Err(Error::invalid_argument(
                        "'initValue' must be a number when init=\"fromValue\"",
                    ))
                }
            },
            InitToken::FromValueArray => return Err(array_init_unsupported()),
            InitToken::FromFile => match self.file_path() {
                Some(path) => InitRequest::FromFile(path.clone()),
                None => {
                    runtime_error!(
                        "initFromFilePath parameter must be provided when using \"fromFile\" initialization method"
                    )
                }
            },
            InitToken::FixedValue => match self.value {
                Some(v) => InitRequest::Deferred(PendingInit::FromValue(v)),
                None => {
                    return Err(Error::MissingConfig {
                        key: "value".to_string(),
                    })
                }
            },
            InitToken::FromLiteral => match self.init_from_literal.as_deref() {
                Some(lit) if !lit.trim().is_empty() => InitRequest::FromLiteral(lit.to_string()),
                _ => {
                    runtime_error!(
                        "initFromLiteral parameter must be provided when using \"fromLiteral\" initialization method"
                    )
                }
            },
        };
        if token.is_deprecated() && self.init.is_some() {
            log::debug!("deprecated init token '{}' in use", token);
        }
        Ok(request)
    }
}

fn array_init_unsupported() -> Error {
    Error::UnsupportedFeature("'initValue' for arrays not yet implemented".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorleaf_core::ErrorKind;

    fn resolve(d: InitDirectives) -> Result<InitRequest> {
        d.resolve(&mut SeedAllocator::new())
    }

    #[test]
    fn test_default_is_uniform_with_allocated_seed() {
        let mut seeds = SeedAllocator::new();
        let a = InitDirectives::default().resolve(&mut seeds).unwrap();
        let b = InitDirectives::default().resolve(&mut seeds).unwrap();
        assert_eq!(
            a,
            InitRequest::Deferred(PendingInit::Random {
                kind: RandomKind::Uniform,
                seed: 1,
                scale: 1.0,
                cpu_only: true
            })
        );
        match b {
            InitRequest::Deferred(PendingInit::Random { seed, .. }) => assert_eq!(seed, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(seeds.peek(), 3);
    }

    #[test]
    fn test_explicit_seed_does_not_advance_counter() {
        let mut seeds = SeedAllocator::starting_at(10);
        let req = InitDirectives::default()
            .init("gaussian")
            .random_seed(42)
            .init_value_scale(3.0)
            .resolve(&mut seeds)
            .unwrap();
        assert_eq!(
            req,
            InitRequest::Deferred(PendingInit::Random {
                kind: RandomKind::Gaussian,
                seed: 42,
                scale: 3.0,
                cpu_only: true
            })
        );
        assert_eq!(seeds.peek(), 10);
    }

    #[test]
    fn test_file_path_wins_over_init_value() {
        let req = resolve(
            InitDirectives::default()
                .init_from_file_path("w.txt")
                .init_value(2.0),
        )
        .unwrap();
        assert_eq!(req, InitRequest::FromFile(PathBuf::from("w.txt")));
    }

    #[test]
    fn test_scalar_init_value() {
        let req = resolve(InitDirectives::default().init_value(0.5)).unwrap();
        assert_eq!(req, InitRequest::Deferred(PendingInit::FromValue(0.5)));
    }

    #[test]
    fn test_empty_init_value_string_means_uniform() {
        let token = InitDirectives::default().init_value("").token().unwrap();
        assert_eq!(token, InitToken::Uniform);
    }

    #[test]
    fn test_non_empty_init_value_string_rejected() {
        let err = resolve(InitDirectives::default().init_value("abc")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("empty string or not a string"));
    }

    #[test]
    fn test_array_init_value_unsupported() {
        let arr = ConfigValue::Array(vec![1.0.into(), 2.0.into()]);
        let err = resolve(InitDirectives::default().init_value(arr)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn test_zero_is_from_value() {
        let req = resolve(InitDirectives::default().init("zero")).unwrap();
        assert_eq!(req, InitRequest::Deferred(PendingInit::FromValue(0.0)));
    }

    #[test]
    fn test_fixed_value_reads_value() {
        let req = resolve(InitDirectives::default().init("fixedValue").value(7.0)).unwrap();
        assert_eq!(req, InitRequest::Deferred(PendingInit::FromValue(7.0)));
        assert!(resolve(InitDirectives::default().init("fixedValue")).is_err());
    }

    #[test]
    fn test_from_file_requires_path() {
        let err = resolve(InitDirectives::default().init("fromFile")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_from_literal() {
        let req = resolve(
            InitDirectives::default()
                .init("fromLiteral")
                .init_from_literal("1 2; 3 4"),
        )
        .unwrap();
        assert_eq!(req, InitRequest::FromLiteral("1 2; 3 4".to_string()));
        let err = resolve(InitDirectives::default().init("fromLiteral")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_unknown_token() {
        let err = resolve(InitDirectives::default().init("xavier")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_token_roundtrip() {
        for t in [
            InitToken::Uniform,
            InitToken::Gaussian,
            InitToken::Zero,
            InitToken::FromValue,
            InitToken::FromValueArray,
            InitToken::FromFile,
            InitToken::FixedValue,
            InitToken::FromLiteral,
        ] {
            assert_eq!(InitToken::parse(t.as_str()).unwrap(), t);
        }
    }
}
