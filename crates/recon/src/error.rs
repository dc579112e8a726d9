use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// Report cannot be merged: no id assigned yet, or observations absent.
    InvalidReport(String),
    /// Key map is missing an entry or holds an unparseable value.
    InvalidKey { field: String, reason: String },
    /// Caller supplied a malformed argument (unknown enum name, null status, ...).
    InvalidArgument(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error.
    ConfigValidation(String),
    /// IO error (config file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidReport(msg) => write!(f, "invalid report: {msg}"),
            Self::InvalidKey { field, reason } => write!(f, "invalid key field '{field}': {reason}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
