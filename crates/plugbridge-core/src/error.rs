//! Error types for the bridge runtime

use crate::instance::LifecycleState;
use plugbridge_state::StateError;
use thiserror::Error;

/// Lifecycle step that failed inside a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Construction,
    Initialization,
    Activation,
    StartProcessing,
    StateSave,
    StateLoad,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Construction => write!(f, "constructing plugin"),
            Stage::Initialization => write!(f, "initializing"),
            Stage::Activation => write!(f, "activating"),
            Stage::StartProcessing => write!(f, "starting processing"),
            Stage::StateSave => write!(f, "saving state"),
            Stage::StateLoad => write!(f, "loading state"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown plugin id: {0}")]
    UnknownPlugin(String),

    #[error("Plugin failed at {stage} stage: {reason}")]
    PluginFailed { stage: Stage, reason: String },

    #[error("Cannot {operation} while plugin is {state}")]
    InvalidLifecycle {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Remote controls page is full ({0} slots)")]
    PageFull(usize),

    #[error("Remote controls slot {slot} out of range (0..{count})")]
    SlotOutOfRange { slot: usize, count: usize },

    #[error("Remote controls page name cannot be empty")]
    EmptyPageName,

    #[error("Remote controls page {0} has no parameters")]
    NoParameters(u32),

    #[error("Duplicate remote controls page id {0}")]
    DuplicatePageId(u32),

    #[error("State: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn plugin(stage: Stage, reason: impl Into<String>) -> Self {
        CoreError::PluginFailed {
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
