//! Runtime machinery for plugbridge
//!
//! Everything between a plugin implementation and the ABI layer that is not
//! tied to a particular ABI: plugin and handle registries, the instance
//! lifecycle, borrowed audio and event views, thread-pool delegation, remote
//! controls and thread-context checks.
//!
//! ## Usage
//!
//! ```ignore
//! use plugbridge_core::{BridgeConfig, HandleRegistry, HostInfo, PluginDescriptor, PluginRegistry};
//!
//! let handles = HandleRegistry::new(PluginRegistry::new(), BridgeConfig::default());
//! handles.register(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
//!     Ok(Box::new(Gain::default()))
//! });
//!
//! let handle = handles.create("demo.gain", HostInfo::new("My DAW")).unwrap();
//! let instance = handles.resolve(handle).unwrap();
//! instance.init()?;
//! instance.activate(48_000.0, 1, 512)?;
//!
//! handles.release(handle);
//! assert!(handles.resolve(handle).is_none());
//! ```

pub mod error;
pub use error::{CoreError, Result, Stage};

mod config;
pub use config::BridgeConfig;

mod descriptor;
pub use descriptor::{features, PluginDescriptor};

pub mod events;
pub use events::{Event, EventFlags, EventKind, InputEvents, NoEvents, OutputEvents};

pub mod audio;
pub use audio::{InputChannels, InputPort, OutputChannels, OutputPort};

mod process;
pub use process::{InputPorts, OutputPorts, ProcessContext, ProcessStatus};

mod plugin;
pub use plugin::{AudioConfig, Capability, Extension, HostInfo, InitContext, Plugin};

pub mod threadpool;
pub use threadpool::{ExecuteReport, FallbackPool, HostThreadPool, Strategy, ThreadPoolDelegator};

pub mod controls;
pub use controls::{
    PageBuilder, RemoteControlsManager, RemoteControlsNotifier, RemoteControlsPage,
    REMOTE_CONTROLS_COUNT,
};

pub mod thread_check;
pub use thread_check::{ThreadChecker, ThreadContext, ThreadOracle};

mod instance;
pub use instance::{LifecycleState, PluginInstance};

mod registry;
pub use registry::{PluginConstructor, PluginRegistry};

mod handle;
pub use handle::{Handle, HandleRegistry};
