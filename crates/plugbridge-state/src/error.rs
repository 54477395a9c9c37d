//! Error types for state persistence

use crate::state::Version;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Invalid plugin id: expected '{expected}', found '{found}'")]
    InvalidPluginId { expected: String, found: String },

    #[error("State version {version} is newer than supported version {max}")]
    VersionTooNew { version: Version, max: Version },

    #[error("Duplicate parameter id {0}")]
    DuplicateParameter(u32),

    #[error("Preset name cannot be empty")]
    EmptyPresetName,

    #[error("Preset data cannot be empty")]
    EmptyPresetData,

    #[error("No migrator found for version {0}")]
    NoMigratorFound(Version),

    #[error("Migration from version {from} to {to} failed: {source}")]
    MigrationFailed {
        from: Version,
        to: Version,
        #[source]
        source: Box<StateError>,
    },

    #[error("Invalid migrator: target version {target} must be newer than source version {from}")]
    InvalidMigrator { from: Version, target: Version },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Corrupt state data: {0}")]
    Corrupt(String),

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("State worker disconnected before completing")]
    WorkerDisconnected,

    #[error("IO error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Blob(#[from] bincode::Error),
}

impl StateError {
    /// Cancellation and deadline expiry.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, StateError::Cancelled | StateError::Timeout(_))
    }

    /// Wrap for transport through `std::io` adapters; recovered by `From<io::Error>`.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }

    /// Route serde_json failures so that I/O errors (including wrapped
    /// cancellation) keep their identity.
    pub(crate) fn from_json(err: serde_json::Error) -> Self {
        if err.is_io() {
            io::Error::from(err).into()
        } else if err.is_eof() {
            StateError::UnexpectedEof
        } else {
            StateError::Json(err)
        }
    }
}

impl From<io::Error> for StateError {
    fn from(err: io::Error) -> Self {
        let kind = err.kind();
        let carries_state_error = err
            .get_ref()
            .map(|inner| inner.is::<StateError>())
            .unwrap_or(false);

        if !carries_state_error {
            return match kind {
                io::ErrorKind::UnexpectedEof => StateError::UnexpectedEof,
                _ => StateError::Io(err),
            };
        }

        match err.into_inner() {
            Some(inner) => match inner.downcast::<StateError>() {
                Ok(state_err) => *state_err,
                Err(other) => StateError::Io(io::Error::new(kind, other)),
            },
            None => StateError::Io(io::Error::from(kind)),
        }
    }
}

pub type Result<T> = std::result::Result<T, StateError>;
