//! A live plugin and its lifecycle state machine.

use crate::config::BridgeConfig;
use crate::controls::RemoteControlsManager;
use crate::descriptor::PluginDescriptor;
use crate::error::{CoreError, Result, Stage};
use crate::plugin::{AudioConfig, Capability, Extension, HostInfo, InitContext, Plugin};
use crate::process::{ProcessContext, ProcessStatus};
use crate::thread_check::{audio_scope, ThreadChecker};
use crate::threadpool::{FallbackPool, ThreadPoolDelegator};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle position of an instance.
///
/// `Created → Initialized → Activated ⇄ Processing`, and any state steps down
/// to `Destroyed` on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initialized,
    Activated,
    Processing,
    Destroyed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Created => write!(f, "created"),
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Activated => write!(f, "activated"),
            LifecycleState::Processing => write!(f, "processing"),
            LifecycleState::Destroyed => write!(f, "destroyed"),
        }
    }
}

struct Inner {
    plugin: Box<dyn Plugin>,
    state: LifecycleState,
    audio: Option<AudioConfig>,
}

impl Inner {
    fn expect(&self, operation: &'static str, allowed: &[LifecycleState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CoreError::InvalidLifecycle {
                operation,
                state: self.state,
            })
        }
    }
}

/// Run a plugin callback, turning a panic or a foreign error into a stage failure.
fn guarded<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err @ CoreError::PluginFailed { .. })) => Err(err),
        Ok(Err(err)) => Err(CoreError::plugin(stage, err.to_string())),
        Err(_) => Err(CoreError::plugin(stage, "plugin panicked")),
    }
}

/// A constructed plugin owned by the handle registry.
pub struct PluginInstance {
    descriptor: Arc<PluginDescriptor>,
    host: HostInfo,
    inner: Mutex<Inner>,
    /// Fixed at construction; read without the plugin lock, which `process` holds.
    has_state: bool,
    uses_thread_pool: bool,
    controls: Arc<RemoteControlsManager>,
    thread_pool: Arc<ThreadPoolDelegator>,
    checker: ThreadChecker,
}

impl PluginInstance {
    pub fn new(
        descriptor: Arc<PluginDescriptor>,
        plugin: Box<dyn Plugin>,
        host: HostInfo,
        pool: Arc<FallbackPool>,
        config: &BridgeConfig,
    ) -> Self {
        let has_state = plugin.has_state();
        let uses_thread_pool = plugin.uses_thread_pool();
        Self {
            descriptor,
            host,
            has_state,
            uses_thread_pool,
            inner: Mutex::new(Inner {
                plugin,
                state: LifecycleState::Created,
                audio: None,
            }),
            controls: Arc::new(RemoteControlsManager::new()),
            thread_pool: Arc::new(ThreadPoolDelegator::new(pool)),
            checker: ThreadChecker::new(config.thread_checks),
        }
    }

    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    pub fn audio_config(&self) -> Option<AudioConfig> {
        self.inner.lock().audio
    }

    pub fn controls(&self) -> &Arc<RemoteControlsManager> {
        &self.controls
    }

    pub fn thread_pool(&self) -> &Arc<ThreadPoolDelegator> {
        &self.thread_pool
    }

    pub fn thread_checker(&self) -> &ThreadChecker {
        &self.checker
    }

    pub fn init(&self) -> Result<()> {
        self.checker.mark_main_thread();
        self.checker.assert_main("init");
        let mut inner = self.inner.lock();
        inner.expect("init", &[LifecycleState::Created])?;

        let ctx = InitContext {
            host: &self.host,
            controls: &self.controls,
            thread_pool: &self.thread_pool,
        };
        guarded(Stage::Initialization, || inner.plugin.init(&ctx))?;
        inner.state = LifecycleState::Initialized;
        info!(id = %self.descriptor.id, host = %self.host.name, "Plugin initialized");
        Ok(())
    }

    pub fn activate(&self, sample_rate: f64, min_frames: u32, max_frames: u32) -> Result<()> {
        self.checker.assert_main("activate");
        let mut inner = self.inner.lock();
        inner.expect("activate", &[LifecycleState::Initialized])?;

        let valid_rate = sample_rate.is_finite() && sample_rate > 0.0;
        if !valid_rate || max_frames == 0 || min_frames > max_frames {
            return Err(CoreError::plugin(
                Stage::Activation,
                format!(
                    "invalid audio configuration: {} Hz, {}..{} frames",
                    sample_rate, min_frames, max_frames
                ),
            ));
        }

        let config = AudioConfig {
            sample_rate,
            min_frames,
            max_frames,
        };
        guarded(Stage::Activation, || inner.plugin.activate(&config))?;
        inner.audio = Some(config);
        inner.state = LifecycleState::Activated;
        debug!(id = %self.descriptor.id, sample_rate, max_frames, "Plugin activated");
        Ok(())
    }

    pub fn deactivate(&self) -> Result<()> {
        self.checker.assert_main("deactivate");
        let mut inner = self.inner.lock();
        inner.expect("deactivate", &[LifecycleState::Activated])?;
        inner.plugin.deactivate();
        inner.audio = None;
        inner.state = LifecycleState::Initialized;
        Ok(())
    }

    pub fn start_processing(&self) -> Result<()> {
        self.checker.assert_audio("start_processing");
        let mut inner = self.inner.lock();
        inner.expect("start processing", &[LifecycleState::Activated])?;
        guarded(Stage::StartProcessing, || inner.plugin.start_processing())?;
        inner.state = LifecycleState::Processing;
        Ok(())
    }

    pub fn stop_processing(&self) -> Result<()> {
        self.checker.assert_audio("stop_processing");
        let mut inner = self.inner.lock();
        inner.expect("stop processing", &[LifecycleState::Processing])?;
        inner.plugin.stop_processing();
        inner.state = LifecycleState::Activated;
        Ok(())
    }

    pub fn reset(&self) -> Result<()> {
        self.checker.assert_audio("reset");
        let mut inner = self.inner.lock();
        inner.expect(
            "reset",
            &[LifecycleState::Activated, LifecycleState::Processing],
        )?;
        inner.plugin.reset();
        Ok(())
    }

    /// Render one block. Anything but a processing instance yields `Error`.
    pub fn process(&self, ctx: &mut ProcessContext<'_>) -> ProcessStatus {
        self.checker.assert_audio("process");
        let _scope = audio_scope();
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Processing {
            return ProcessStatus::Error;
        }
        match catch_unwind(AssertUnwindSafe(|| inner.plugin.process(ctx))) {
            Ok(status) => status,
            Err(_) => ProcessStatus::Error,
        }
    }

    pub fn on_main_thread(&self) {
        self.checker.assert_main("on_main_thread");
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Destroyed {
            inner.plugin.on_main_thread();
        }
    }

    pub fn save_state(&self, out: &mut dyn Write) -> Result<()> {
        self.checker.assert_main("save_state");
        self.checker.assert_not_audio("save_state");
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Destroyed || !self.has_state {
            return Err(CoreError::plugin(Stage::StateSave, "state not supported"));
        }
        guarded(Stage::StateSave, || inner.plugin.save_state(out))
    }

    pub fn load_state(&self, input: &mut dyn Read) -> Result<()> {
        self.checker.assert_main("load_state");
        self.checker.assert_not_audio("load_state");
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Destroyed || !self.has_state {
            return Err(CoreError::plugin(Stage::StateLoad, "state not supported"));
        }
        let result = guarded(Stage::StateLoad, || inner.plugin.load_state(input));
        if let Err(e) = &result {
            warn!(id = %self.descriptor.id, "Failed to load state: {}", e);
        }
        result
    }

    /// Whether this instance exposes `extension` right now.
    ///
    /// Never takes the plugin lock: hosts may ask from any thread, including
    /// a pool worker serving a `process` call in progress.
    pub fn capability(&self, extension: Extension) -> Capability {
        let supported = match extension {
            Extension::State => self.has_state,
            Extension::ThreadPool => self.uses_thread_pool,
            Extension::RemoteControls => self.controls.page_count() > 0,
        };
        if supported {
            Capability::Supported(extension)
        } else {
            Capability::NotSupported
        }
    }

    /// Step the state machine down to `Destroyed`. Safe to call repeatedly.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Processing {
            inner.plugin.stop_processing();
            inner.state = LifecycleState::Activated;
        }
        if inner.state == LifecycleState::Activated {
            inner.plugin.deactivate();
            inner.audio = None;
            inner.state = LifecycleState::Initialized;
        }
        if inner.state != LifecycleState::Destroyed {
            inner.state = LifecycleState::Destroyed;
            self.thread_pool.detach_host();
            self.controls.clear_notifier();
            self.checker.clear_oracle();
            debug!(id = %self.descriptor.id, "Plugin torn down");
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.descriptor.id)
            .field("state", &self.state())
            .finish()
    }
}
