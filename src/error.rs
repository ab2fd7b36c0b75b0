//! Error types for imagebot.
//!
//! All errors use `thiserror` so callers can match on the failure kind;
//! the CLI front end converts them into `anyhow` context chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imagebot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imagebot.
#[derive(Error, Debug)]
pub enum Error {
    #[error("build of '{alias}:{tag}' failed with exit code {code}")]
    BuildFailed {
        alias: String,
        tag: String,
        code: i32,
    },

    #[error("on_success hook failed with exit code {code}")]
    HookFailed { code: i32 },

    #[error("circular tag reference involving alias '{alias}'")]
    CircularReference { alias: String },

    #[error("unknown image alias '{alias}'")]
    UnknownAlias { alias: String },

    #[error("image alias '{alias}' has no build workdir")]
    NoWorkdir { alias: String },

    #[error("no value for placeholder '{{{key}}}' in hook template")]
    MissingHookKey { key: String },

    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to run '{program}': {source}")]
    Process {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse image definitions: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("failed to serialize image definitions: {0}")]
    SerializeConfig(#[from] toml::ser::Error),
}

impl Error {
    /// Attach a path to an `std::io::Error`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
