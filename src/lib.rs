//! # plugbridge - Rust plugins behind the CLAP ABI
//!
//! Plugin logic written against a safe trait, exposed to hosts through the
//! CLAP C ABI.
//!
//! ## Architecture
//!
//! plugbridge is an umbrella crate that coordinates:
//! - **plugbridge-state** - Versioned state (JSON and binary), migration, presets, cancellable and async I/O
//! - **plugbridge-core** - Plugin and handle registries, instance lifecycle, audio and event views,
//!   thread-pool delegation, remote controls, thread checks
//! - **plugbridge-clap** - The CLAP surface: `clap_entry`, factory, plugin shims, extensions
//!
//! ## Quick Start
//!
//! ```ignore
//! use plugbridge::prelude::*;
//!
//! struct Gain { gain: f32 }
//!
//! impl Plugin for Gain {
//!     fn process(&mut self, ctx: &mut ProcessContext<'_>) -> ProcessStatus {
//!         let (inputs, outputs) = ctx.io();
//!         // ...
//!         ProcessStatus::Continue
//!     }
//! }
//!
//! fn setup() -> Arc<Bridge> {
//!     BridgeBuilder::new()
//!         .logging(true)
//!         .plugin(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
//!             Ok(Box::new(Gain { gain: 1.0 }))
//!         })
//!         .build_or_default()
//! }
//!
//! export_clap_entry!(setup);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - CLAP surface
//! - `clap` - `plugbridge-clap` and the `export_clap_entry!` macro

/// Crate version reported to hosts and in logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export of plugbridge-core for direct access
pub use plugbridge_core as core;

/// Re-export of plugbridge-state for direct access
pub use plugbridge_state as state;

// Core types
pub use plugbridge_core::{
    features,
    AudioConfig,
    // Runtime configuration
    BridgeConfig,
    Capability,
    // Events
    Event,
    EventFlags,
    EventKind,
    ExecuteReport,
    Extension,
    // Handles and instances
    Handle,
    HandleRegistry,
    HostInfo,
    InitContext,
    InputEvents,
    InputPort,
    LifecycleState,
    OutputEvents,
    OutputPort,
    // Remote controls
    PageBuilder,
    // Plugin model
    Plugin,
    PluginDescriptor,
    PluginInstance,
    PluginRegistry,
    ProcessContext,
    ProcessStatus,
    RemoteControlsManager,
    RemoteControlsPage,
    // Thread pool
    ThreadPoolDelegator,
};

// State types
pub use plugbridge_state::{
    CancelToken, Completion, Format, FormatType, MigrationChain, Migrator, Parameter, Preset,
    PresetBank, PresetMetadata, SimpleMigrator, State, StateManager, Version,
};

// CLAP surface
#[cfg(feature = "clap")]
pub use plugbridge_clap as clap;

#[cfg(feature = "clap")]
pub use plugbridge_clap::{export_clap_entry, Bridge, EntryPoint};

mod error;
pub use error::{Error, Result};

pub mod logging;

mod builder;
pub use builder::BridgeBuilder;

/// Convenience prelude for common imports
pub mod prelude {
    // Assembly
    pub use crate::BridgeBuilder;

    // Plugin authoring
    pub use crate::core::{
        features, AudioConfig, EventKind, InitContext, PageBuilder, Plugin, PluginDescriptor,
        ProcessContext, ProcessStatus,
    };

    // State
    pub use crate::state::{Parameter, State, StateManager, Version};

    pub use std::sync::Arc;

    // CLAP
    #[cfg(feature = "clap")]
    pub use crate::clap::{export_clap_entry, Bridge};
}
