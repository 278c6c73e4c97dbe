// ⚠️ Error Types
// One enum per failure domain: catalog loading, ownership persistence, config

use std::path::PathBuf;
use thiserror::Error;

/// Catalog population failures
///
/// Any of these aborts the whole load: a partial catalog is never produced.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The loader could not fetch or parse a partition
    #[error("Failed to load partition '{partition}': {message}")]
    Partition { partition: String, message: String },

    /// A partition fetch did not finish in time
    #[error("Timed out loading partition '{partition}' after {seconds}s")]
    Timeout { partition: String, seconds: u64 },

    /// A record had no usable `name` field
    #[error("Record #{index} in partition '{partition}' has no name")]
    MissingName { partition: String, index: usize },

    /// Two records share a name (names are the catalog's identity key)
    #[error("Duplicate entry name '{name}' (first in '{first}', again in '{second}')")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

impl LoadError {
    /// Wrap any loader-side error for a given partition
    pub fn partition(partition: &str, err: impl std::fmt::Display) -> Self {
        LoadError::Partition {
            partition: partition.to_string(),
            message: err.to_string(),
        }
    }
}

/// Ownership tracking and persistence failures
#[derive(Error, Debug)]
pub enum OwnershipError {
    /// Channel is not one of the tracker's configured channels
    #[error("Unknown acquisition channel '{channel}' (expected one of: {expected})")]
    UnknownChannel { channel: String, expected: String },

    /// Reading persisted ownership state failed
    #[error("Failed to read ownership state: {0}")]
    PersistRead(String),

    /// Writing ownership state failed; the in-memory change is kept
    #[error("Failed to save ownership state: {0}")]
    PersistWrite(String),
}

/// Configuration file problems
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
