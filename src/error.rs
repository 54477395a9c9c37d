//! Centralized error type for the plugbridge umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] plugbridge_core::CoreError),

    #[error("State: {0}")]
    State(#[from] plugbridge_state::StateError),

    #[cfg(feature = "clap")]
    #[error("CLAP: {0}")]
    Clap(#[from] plugbridge_clap::ClapError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
