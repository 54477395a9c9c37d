//! Diagnostic checks that callbacks arrive on the right thread.
//!
//! Disabled checkers cost one branch. Enabled checkers panic with a
//! description of the offending call; the ABI layer catches the panic at the
//! boundary and reports the failure value instead of unwinding into the host.

use arc_swap::ArcSwapOption;
use std::cell::Cell;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

thread_local! {
    static AUDIO_DEPTH: Cell<u32> = const { Cell::new(0) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadContext {
    Main,
    Audio,
    Unknown,
}

/// Authoritative answers supplied by the host, when it offers them.
pub trait ThreadOracle: Send + Sync {
    fn is_main_thread(&self) -> bool;
    fn is_audio_thread(&self) -> bool;
}

pub struct ThreadChecker {
    enabled: bool,
    main: OnceLock<ThreadId>,
    oracle: ArcSwapOption<Box<dyn ThreadOracle>>,
}

/// Marks the current thread as running audio code until dropped.
#[must_use]
pub struct AudioScope(());

impl Drop for AudioScope {
    fn drop(&mut self) {
        AUDIO_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Enter an audio scope on the current thread. Scopes nest.
pub fn audio_scope() -> AudioScope {
    AUDIO_DEPTH.with(|depth| depth.set(depth.get() + 1));
    AudioScope(())
}

fn in_audio_scope() -> bool {
    AUDIO_DEPTH.with(|depth| depth.get() > 0)
}

impl ThreadChecker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            main: OnceLock::new(),
            oracle: ArcSwapOption::empty(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record the calling thread as the main thread. The first caller wins.
    pub fn mark_main_thread(&self) {
        let _ = self.main.set(thread::current().id());
    }

    pub fn set_oracle(&self, oracle: impl ThreadOracle + 'static) {
        self.oracle
            .store(Some(Arc::new(Box::new(oracle) as Box<dyn ThreadOracle>)));
    }

    pub fn clear_oracle(&self) {
        self.oracle.store(None);
    }

    pub fn current(&self) -> ThreadContext {
        if let Some(oracle) = &*self.oracle.load() {
            if oracle.is_audio_thread() {
                return ThreadContext::Audio;
            }
            if oracle.is_main_thread() {
                return ThreadContext::Main;
            }
            return ThreadContext::Unknown;
        }
        if in_audio_scope() {
            return ThreadContext::Audio;
        }
        match self.main.get() {
            Some(id) if *id == thread::current().id() => ThreadContext::Main,
            _ => ThreadContext::Unknown,
        }
    }

    /// Whether the calling thread is known not to be the main thread.
    fn known_off_main(&self) -> bool {
        if let Some(oracle) = &*self.oracle.load() {
            return !oracle.is_main_thread();
        }
        if in_audio_scope() {
            return true;
        }
        matches!(self.main.get(), Some(id) if *id != thread::current().id())
    }

    pub fn assert_main(&self, operation: &str) {
        if self.enabled && self.known_off_main() {
            panic!(
                "{} must be called from the main thread (called from {:?})",
                operation,
                self.current()
            );
        }
    }

    pub fn assert_audio(&self, operation: &str) {
        if self.enabled && self.current() == ThreadContext::Main {
            panic!("{} must be called from the audio thread", operation);
        }
    }

    pub fn assert_not_audio(&self, operation: &str) {
        if self.enabled && self.current() == ThreadContext::Audio {
            panic!("{} must not be called from the audio thread", operation);
        }
    }
}

impl std::fmt::Debug for ThreadChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadChecker")
            .field("enabled", &self.enabled)
            .field("main", &self.main.get())
            .field("has_oracle", &self.oracle.load().is_some())
            .finish()
    }
}
