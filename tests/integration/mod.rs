//! Integration test modules for plugbridge
//!
//! - registry: Plugin registration, enumeration and construction
//! - handles: Handle issue, resolution and release
//! - lifecycle: State machine, processing, thread checks
//! - threadpool: Host and fallback delegation
//! - state: Plugin state, migration, presets, cancellable and async I/O
//! - controls: Remote-controls pages and notifications

pub mod handles;
pub mod lifecycle;
pub mod registry;
pub mod state;
