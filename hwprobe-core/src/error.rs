use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    NotFound {
        name: String,
    },
    TypeMismatch {
        name: String,
        expected: &'static str,
        detail: String,
    },
    InvalidBoolean {
        name: String,
        value: i64,
    },
    Unsupported(&'static str),
    Os {
        name: String,
        errno: i32,
    },
    Io(#[from] std::io::Error),
    Parse(String),
    Config(String),
}

impl ProbeError {
    pub fn not_found(name: impl Into<String>) -> Self {
        ProbeError::NotFound { name: name.into() }
    }

    pub fn type_mismatch(
        name: impl Into<String>,
        expected: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        ProbeError::TypeMismatch {
            name: name.into(),
            expected,
            detail: detail.into(),
        }
    }

    /// True when the source reported that the entry does not exist at all,
    /// as opposed to existing with an unusable value.
    pub fn is_not_found(&self) -> bool {
        match self {
            ProbeError::NotFound { .. } => true,
            ProbeError::Os { errno, .. } => *errno == ENOENT,
            ProbeError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// POSIX value; kept local so this crate stays free of libc.
const ENOENT: i32 = 2;

impl Display for ProbeError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ProbeError::NotFound { name } => write!(f, "No such entry: {}", name),
            ProbeError::TypeMismatch {
                name,
                expected,
                detail,
            } => write!(
                f,
                "Entry {} is not a valid {}: {}",
                name, expected, detail
            ),
            ProbeError::InvalidBoolean { name, value } => write!(
                f,
                "Entry {} holds {} where a boolean (0 or 1) was expected",
                name, value
            ),
            ProbeError::Unsupported(what) => {
                write!(f, "Not supported on this platform: {}", what)
            }
            ProbeError::Os { name, errno } => {
                write!(f, "OS query for {} failed with errno {}", name, errno)
            }
            ProbeError::Io(e) => write!(f, "I/O error: {}", e),
            ProbeError::Parse(s) => write!(f, "Parse error: {}", s),
            ProbeError::Config(s) => write!(f, "Configuration error: {}", s),
        }
    }
}

impl From<serde_yaml_ng::Error> for ProbeError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ProbeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Parse(err.to_string())
    }
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
