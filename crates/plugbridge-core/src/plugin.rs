//! The trait plugin authors implement.

use crate::controls::RemoteControlsManager;
use crate::error::Result;
use crate::process::{ProcessContext, ProcessStatus};
use crate::threadpool::ThreadPoolDelegator;
use std::io::{Read, Write};
use std::sync::Arc;

/// Identity the host reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub name: String,
    pub vendor: String,
    pub url: String,
    pub version: String,
}

impl HostInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Audio configuration fixed between activate and deactivate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: f64,
    pub min_frames: u32,
    pub max_frames: u32,
}

/// Services handed to a plugin during `init`.
pub struct InitContext<'a> {
    pub host: &'a HostInfo,
    /// Pages registered here are what the host's controller surface sees.
    pub controls: &'a Arc<RemoteControlsManager>,
    /// Clone and keep it to fan work out during `process`.
    pub thread_pool: &'a Arc<ThreadPoolDelegator>,
}

/// Optional capabilities an instance may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    State,
    ThreadPool,
    RemoteControls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Supported(Extension),
    NotSupported,
}

impl Capability {
    pub fn is_supported(self) -> bool {
        matches!(self, Capability::Supported(_))
    }
}

/// Plugin logic driven by the bridge.
///
/// Every method but [`Plugin::process`] has a default. Lifecycle methods run
/// on the main thread, `process` and `reset` on the audio thread.
pub trait Plugin: Send {
    fn init(&mut self, _ctx: &InitContext<'_>) -> Result<()> {
        Ok(())
    }

    fn activate(&mut self, _config: &AudioConfig) -> Result<()> {
        Ok(())
    }

    fn deactivate(&mut self) {}

    fn start_processing(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop_processing(&mut self) {}

    fn reset(&mut self) {}

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> ProcessStatus;

    /// Host-scheduled callback on the main thread.
    fn on_main_thread(&mut self) {}

    /// Whether [`Plugin::save_state`] and [`Plugin::load_state`] are implemented.
    fn has_state(&self) -> bool {
        false
    }

    fn save_state(&mut self, _out: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    fn load_state(&mut self, _input: &mut dyn Read) -> Result<()> {
        Ok(())
    }

    /// Whether `process` fans work out through the thread pool.
    fn uses_thread_pool(&self) -> bool {
        false
    }
}
