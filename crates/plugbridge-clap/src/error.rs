//! Error types for the CLAP surface

use plugbridge_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClapError {
    #[error("Null pointer passed for {0}")]
    NullPointer(&'static str),

    #[error("Host CLAP version {major}.{minor}.{revision} is not compatible")]
    IncompatibleHost { major: u32, minor: u32, revision: u32 },

    #[error("Bridge is shutting down")]
    BridgeGone,

    #[error("Failed to instantiate plugin {0}")]
    InstantiationFailed(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, ClapError>;
