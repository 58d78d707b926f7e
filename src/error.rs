// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for cascade simulation, data loading, and the execution harness.
//!
//! Every failure terminates a run with exactly one of these variants. The
//! harness forwards them across its channel as an [`ErrorKind`] plus a
//! rendered message, so callers can pattern-match on the failure mode
//! without owning the error value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors arising from fuel parsing, simulation, collaborators, or the harness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// A fuel entry did not match any accepted nuclide notation.
    #[error("invalid nuclide format: {0:?}")]
    InvalidNuclideFormat(String),

    /// The fuel list parsed to nothing.
    #[error("no valid fuel nuclides supplied")]
    NoValidFuel,

    /// A run was requested while another run is active on the same harness.
    #[error("a simulation is already running on this harness")]
    AlreadyRunning,

    /// Cooperative cancellation was observed at a generation boundary.
    #[error("simulation cancelled")]
    Cancelled,

    /// The reaction, temperature, or classification query layer failed.
    #[error("collaborator query failed: {0}")]
    Collaborator(String),

    /// The harness was asked to run before its reaction source was attached.
    #[error("reaction database not initialized")]
    DatabaseNotInitialized,

    /// Reading or parsing a database or configuration file failed.
    #[error("data loading failed: {0}")]
    DataLoad(String),

    /// A simulation parameter is outside its admissible domain.
    #[error("invalid simulation parameters: {0}")]
    InvalidParameters(String),
}

/// Failure discriminant carried by the harness `Failed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`CascadeError::InvalidNuclideFormat`].
    InvalidNuclideFormat,
    /// See [`CascadeError::NoValidFuel`].
    NoValidFuel,
    /// See [`CascadeError::AlreadyRunning`].
    AlreadyRunning,
    /// See [`CascadeError::Cancelled`].
    Cancelled,
    /// See [`CascadeError::Collaborator`].
    CollaboratorError,
    /// See [`CascadeError::DatabaseNotInitialized`].
    DatabaseNotInitialized,
    /// See [`CascadeError::DataLoad`].
    DataLoad,
    /// See [`CascadeError::InvalidParameters`].
    InvalidParameters,
}

impl CascadeError {
    /// Discriminant of this error, for message passing.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidNuclideFormat(_) => ErrorKind::InvalidNuclideFormat,
            Self::NoValidFuel => ErrorKind::NoValidFuel,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Collaborator(_) => ErrorKind::CollaboratorError,
            Self::DatabaseNotInitialized => ErrorKind::DatabaseNotInitialized,
            Self::DataLoad(_) => ErrorKind::DataLoad,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
        }
    }
}

impl From<std::io::Error> for CascadeError {
    fn from(err: std::io::Error) -> Self {
        Self::DataLoad(err.to_string())
    }
}

impl From<serde_json::Error> for CascadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataLoad(format!("JSON: {err}"))
    }
}
