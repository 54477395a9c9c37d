//! Builder for assembling the plugins a binary exports.

use crate::core::{BridgeConfig, HandleRegistry, HostInfo, Plugin, PluginDescriptor, PluginRegistry};
use crate::Result;
use std::time::Duration;

#[cfg(feature = "clap")]
use crate::clap::Bridge;
#[cfg(feature = "clap")]
use std::sync::Arc;

/// Collects plugin registrations and runtime settings, then builds either the
/// ABI-neutral [`HandleRegistry`] or, with the `clap` feature, a CLAP [`Bridge`].
///
/// # Example
///
/// ```ignore
/// use plugbridge::prelude::*;
///
/// fn setup() -> Arc<Bridge> {
///     BridgeBuilder::new()
///         .logging(true)
///         .plugin(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
///             Ok(Box::new(Gain::default()))
///         })
///         .build_or_default()
/// }
///
/// export_clap_entry!(setup);
/// ```
pub struct BridgeBuilder {
    plugins: PluginRegistry,
    config: BridgeConfig,
    logging: bool,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            plugins: PluginRegistry::new(),
            config: BridgeConfig::default(),
            logging: false,
        }
    }
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole runtime configuration.
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config = self.config.max_workers(max_workers);
        self
    }

    pub fn thread_checks(mut self, enabled: bool) -> Self {
        self.config = self.config.thread_checks(enabled);
        self
    }

    pub fn state_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.state_timeout(timeout);
        self
    }

    /// Install the `RUST_LOG`-filtered subscriber when building.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Register a plugin type. Enumeration follows registration order.
    pub fn plugin<F>(self, descriptor: PluginDescriptor, constructor: F) -> Self
    where
        F: Fn(&HostInfo) -> crate::core::Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.plugins.register(descriptor, constructor);
        self
    }

    fn prepare(&self) -> Result<()> {
        if self.logging {
            crate::logging::init();
        }
        self.config.validate()?;
        Ok(())
    }

    /// Build the handle registry without any ABI surface.
    pub fn build_registry(self) -> Result<HandleRegistry> {
        self.prepare()?;
        Ok(HandleRegistry::new(self.plugins, self.config))
    }

    #[cfg(feature = "clap")]
    pub fn build(self) -> Result<Arc<Bridge>> {
        self.prepare()?;
        Ok(Bridge::with_config(self.plugins, self.config)?)
    }

    /// Build, falling back to the default configuration if the configured one
    /// is invalid. Meant for `export_clap_entry!` setup functions, which
    /// cannot fail.
    #[cfg(feature = "clap")]
    pub fn build_or_default(self) -> Arc<Bridge> {
        if self.logging {
            crate::logging::init();
        }
        match self.config.validate() {
            Ok(()) => Bridge::with_config(self.plugins.clone(), self.config)
                .unwrap_or_else(|_| Bridge::new(self.plugins)),
            Err(e) => {
                tracing::warn!("Invalid bridge config, using defaults: {}", e);
                Bridge::new(self.plugins)
            }
        }
    }
}
