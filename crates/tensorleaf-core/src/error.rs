use std::fmt;

// Error: the failure taxonomy shared by every tensorleaf crate
//
// Four kinds of failure matter to callers:
//
//   InvalidArgument     the user's configuration is malformed or contradictory
//   Runtime             an operation failed for a clear external reason
//                       (missing file path, unreadable file, bad text data)
//   UnsupportedFeature  the request is well formed but not implemented
//   Logic               an internal invariant was violated; the caller
//                       sequenced operations wrongly (e.g. saving a parameter
//                       that is still waiting for its shape)
//
// Config, I/O, parse and stream-format errors carry their own variants so the
// message stays precise; `Error::kind()` folds them back into the four kinds.

/// All errors that can occur within tensorleaf.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or contradictory user-supplied configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operational failure with a clear external cause.
    #[error("{0}")]
    Runtime(String),

    /// The requested behavior exists in the vocabulary but is not implemented.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Internal-consistency violation. No code path recovers from this.
    #[error("logic error: {0}")]
    Logic(String),

    /// A required configuration key is absent.
    #[error("missing configuration value '{key}'")]
    MissingConfig { key: String },

    /// A configuration key exists but holds the wrong type of value.
    #[error("configuration value '{key}' must be {expected}, got {got}")]
    ConfigType {
        key: String,
        expected: &'static str,
        got: String,
    },

    /// Text matrix data could not be parsed.
    #[error("{source_name}, line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    /// A binary stream does not follow the expected layout.
    #[error("malformed stream: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Runtime,
    UnsupportedFeature,
    Logic,
}

impl Error {
    /// Which of the four failure kinds this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::MissingConfig { .. } | Error::ConfigType { .. } => {
                ErrorKind::InvalidArgument
            }
            Error::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Error::Logic(_) => ErrorKind::Logic,
            Error::Runtime(_) | Error::Parse { .. } | Error::Format(_) | Error::Io(_) => {
                ErrorKind::Runtime
            }
        }
    }

    pub fn invalid_argument(s: impl Into<String>) -> Self {
        Error::InvalidArgument(s.into())
    }

    pub fn runtime(s: impl Into<String>) -> Self {
        Error::Runtime(s.into())
    }

    pub fn logic(s: impl Into<String>) -> Self {
        Error::Logic(s.into())
    }

    pub fn format(s: impl Into<String>) -> Self {
        Error::Format(s.into())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Runtime => "runtime error",
            ErrorKind::UnsupportedFeature => "unsupported feature",
            ErrorKind::Logic => "logic error",
        };
        write!(f, "{}", s)
    }
}

/// Convenience Result type used throughout tensorleaf.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with an [`Error::InvalidArgument`].
/// Usage: `invalid_argument!("shape {} cannot be inferred", shape)`
#[macro_export]
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        return Err($crate::Error::InvalidArgument(format!($($arg)*)))
    };
}

/// Early return with an [`Error::Runtime`].
#[macro_export]
macro_rules! runtime_error {
    ($($arg:tt)*) => {
        return Err($crate::Error::Runtime(format!($($arg)*)))
    };
}

/// Early return with an [`Error::Logic`].
#[macro_export]
macro_rules! logic_error {
    ($($arg:tt)*) => {
        return Err($crate::Error::Logic(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails_with_logic() -> Result<()> {
        logic_error!("node {} is pending", "W");
    }

    #[test]
    fn test_macro_builds_variant() {
        let err = fails_with_logic().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Logic);
        assert_eq!(err.to_string(), "logic error: node W is pending");
    }

    #[test]
    fn test_config_errors_are_invalid_arguments() {
        let err = Error::MissingConfig { key: "shape".into() };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = Error::ConfigType {
            key: "init".into(),
            expected: "a string",
            got: "a number".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_io_errors_are_runtime() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }
}
