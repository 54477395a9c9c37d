//! Versioned plugin state for plugbridge
//!
//! Serializes a plugin's parameters and custom data to a human-readable JSON
//! document or a compact little-endian binary stream, validates snapshots
//! against the owning plugin, and migrates older formats forward.
//!
//! ## Usage
//!
//! ```ignore
//! use plugbridge_state::{Parameter, StateManager, Version};
//!
//! let manager = StateManager::new("demo.gain", "Demo Gain", Version::V1);
//! let state = manager.new_state(vec![Parameter::named(1, 0.5, "Gain")]);
//!
//! let bytes = manager.save_json(&state)?;
//! let restored = manager.load_json(&bytes)?;
//! assert_eq!(restored.value(1), Some(0.5));
//! ```

pub mod error;
pub use error::{Result, StateError};

mod state;
pub use state::{FormatType, Header, Parameter, State, Version};

pub mod stream;
pub use stream::{StreamReader, StreamWriter};

pub mod codec;
pub use codec::{Format, BINARY_MAGIC};

mod migration;
pub use migration::{MigrationChain, Migrator, SimpleMigrator};

mod cancel;
pub use cancel::{CancelToken, CancellableReader, CancellableWriter, DEFAULT_CHUNK_SIZE};

mod manager;
pub use manager::{StateManager, DEFAULT_STATE_TIMEOUT};

mod async_io;
pub use async_io::Completion;

mod preset;
pub use preset::{Preset, PresetBank, PresetMetadata};
