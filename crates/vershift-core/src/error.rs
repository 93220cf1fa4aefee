//! Error types for vershift-core

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::document::DocumentError;
use crate::query::QueryError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that abort a version check.
///
/// Only extraction of the *current* version surfaces these; failures while
/// looking at the previous commit are downgraded to warnings.
#[derive(Error, Debug)]
pub enum CheckError {
    /// The version file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// File that was being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file format is unsupported or the content is malformed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The key path did not lead to a version value.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Result type alias using [`CheckError`].
pub type CheckResult<T> = Result<T, CheckError>;
