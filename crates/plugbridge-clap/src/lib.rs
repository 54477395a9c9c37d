//! CLAP ABI surface for plugbridge
//!
//! Exposes plugins registered with a [`Bridge`] through the CLAP C ABI:
//! `clap_entry`, the plugin factory, one `clap_plugin` shim per instance and
//! the state, thread-pool and remote-controls extensions. Every callback is
//! null-checked and panic-guarded; a failure is reported with the callback's
//! failure value and a log line.
//!
//! ## Usage
//!
//! ```ignore
//! use plugbridge_clap::{export_clap_entry, Bridge};
//! use plugbridge_core::{PluginDescriptor, PluginRegistry};
//! use std::sync::Arc;
//!
//! fn setup() -> Arc<Bridge> {
//!     let bridge = Bridge::new(PluginRegistry::new());
//!     bridge.register(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
//!         Ok(Box::new(Gain::default()))
//!     });
//!     bridge
//! }
//!
//! export_clap_entry!(setup);
//! ```

pub use clap_sys;

pub mod error;
pub use error::{ClapError, Result};

mod util;

pub mod events;
pub use events::{decode_event, ClapInputEvents, ClapOutputEvents};

pub mod marshal;
pub use marshal::{process_context, Scratch};

pub mod stream;
pub use stream::{ClapInputStream, ClapOutputStream};

pub mod host;
pub use host::{ClapHost, CLAP_EXT_REMOTE_CONTROLS_COMPAT};

mod extensions;
pub use extensions::extension_for_id;

mod shim;
mod factory;

mod bridge;
pub use bridge::Bridge;

mod entry;
pub use entry::EntryPoint;

#[cfg(test)]
mod fixtures;
