//! Composition root: one handle registry, its CLAP factory and the
//! descriptor strings handed to hosts.

use crate::error::{ClapError, Result};
use crate::factory::ClapFactory;
use crate::host::ClapHost;
use crate::shim::ClapPluginShim;
use clap_sys::factory::plugin_factory::clap_plugin_factory;
use clap_sys::host::clap_host;
use clap_sys::plugin::{clap_plugin, clap_plugin_descriptor};
use clap_sys::version::CLAP_VERSION;
use parking_lot::Mutex;
use plugbridge_core::{
    BridgeConfig, HandleRegistry, HostInfo, Plugin, PluginDescriptor, PluginRegistry,
};
use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, info};

fn c_string(value: &str) -> CString {
    CString::new(value.replace('\0', "")).unwrap_or_default()
}

/// A descriptor laid out for the ABI. Pointers in `raw` point into the owned
/// strings, whose heap buffers do not move with the struct.
struct CachedDescriptor {
    source: Arc<PluginDescriptor>,
    raw: clap_plugin_descriptor,
    _strings: Vec<CString>,
    _features: Vec<*const c_char>,
}

// Only read after construction.
unsafe impl Send for CachedDescriptor {}
unsafe impl Sync for CachedDescriptor {}

impl CachedDescriptor {
    fn new(source: Arc<PluginDescriptor>) -> Box<Self> {
        let fields = [
            &source.id,
            &source.name,
            &source.vendor,
            &source.url,
            &source.manual_url,
            &source.support_url,
            &source.version,
            &source.description,
        ];
        let mut strings: Vec<CString> = fields.iter().map(|s| c_string(s)).collect();
        let feature_start = strings.len();
        strings.extend(source.features.iter().map(|f| c_string(f)));

        let mut features: Vec<*const c_char> =
            strings[feature_start..].iter().map(|f| f.as_ptr()).collect();
        features.push(ptr::null());

        let raw = clap_plugin_descriptor {
            clap_version: CLAP_VERSION,
            id: strings[0].as_ptr(),
            name: strings[1].as_ptr(),
            vendor: strings[2].as_ptr(),
            url: strings[3].as_ptr(),
            manual_url: strings[4].as_ptr(),
            support_url: strings[5].as_ptr(),
            version: strings[6].as_ptr(),
            description: strings[7].as_ptr(),
            features: features.as_ptr(),
        };

        Box::new(Self {
            source,
            raw,
            _strings: strings,
            _features: features,
        })
    }
}

/// ABI descriptors by plugin id. Entries replaced by a re-registration are
/// retired, not freed, because hosts may still hold their pointers.
#[derive(Default)]
struct DescriptorCache {
    current: HashMap<String, Box<CachedDescriptor>>,
    retired: Vec<Box<CachedDescriptor>>,
}

impl DescriptorCache {
    fn get(&mut self, descriptor: &Arc<PluginDescriptor>) -> *const clap_plugin_descriptor {
        if let Some(cached) = self.current.get(&descriptor.id) {
            if Arc::ptr_eq(&cached.source, descriptor) {
                return &cached.raw;
            }
        }
        let fresh = CachedDescriptor::new(Arc::clone(descriptor));
        let raw: *const clap_plugin_descriptor = &fresh.raw;
        if let Some(stale) = self.current.insert(descriptor.id.clone(), fresh) {
            debug!(id = %descriptor.id, "Retiring replaced plugin descriptor");
            self.retired.push(stale);
        }
        raw
    }
}

/// Everything one plugin binary exposes through CLAP.
///
/// # Example
/// ```ignore
/// let bridge = Bridge::new(PluginRegistry::new());
/// bridge.register(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
///     Ok(Box::new(Gain::default()))
/// });
/// let factory = bridge.factory();
/// ```
pub struct Bridge {
    handles: HandleRegistry,
    descriptors: Mutex<DescriptorCache>,
    factory: ClapFactory,
}

impl Bridge {
    /// Create a bridge with the default configuration
    pub fn new(plugins: PluginRegistry) -> Arc<Self> {
        Self::build(plugins, BridgeConfig::default())
    }

    pub fn with_config(plugins: PluginRegistry, config: BridgeConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Self::build(plugins, config))
    }

    fn build(plugins: PluginRegistry, config: BridgeConfig) -> Arc<Self> {
        info!(
            plugins = plugins.count(),
            max_workers = config.max_workers,
            thread_checks = config.thread_checks,
            "Creating plugin bridge"
        );
        Arc::new_cyclic(|bridge| Self {
            handles: HandleRegistry::new(plugins, config),
            descriptors: Mutex::new(DescriptorCache::default()),
            factory: ClapFactory::new(bridge.clone()),
        })
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn plugins(&self) -> &PluginRegistry {
        self.handles.plugins()
    }

    pub fn config(&self) -> &BridgeConfig {
        self.handles.config()
    }

    /// Register a plugin type
    pub fn register<F>(&self, descriptor: PluginDescriptor, constructor: F)
    where
        F: Fn(&HostInfo) -> plugbridge_core::Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.handles.register(descriptor, constructor);
    }

    /// The plugin factory to return from `clap_entry.get_factory`. Valid for
    /// as long as the bridge is alive.
    pub fn factory(&self) -> *const clap_plugin_factory {
        self.factory.as_raw()
    }

    /// ABI descriptor for the plugin at `index`, null past the end.
    pub fn clap_descriptor_at(&self, index: u32) -> *const clap_plugin_descriptor {
        match self.handles.descriptor_at(index) {
            Some(descriptor) => self.descriptors.lock().get(&descriptor),
            None => ptr::null(),
        }
    }

    /// Instantiate `id` for `host` and wrap it in a `clap_plugin`.
    ///
    /// # Safety
    ///
    /// `host` must be null or a host that outlives the returned plugin.
    pub unsafe fn create_plugin(
        self: &Arc<Self>,
        host: *const clap_host,
        id: &str,
    ) -> Result<*const clap_plugin> {
        let host = ClapHost::new(host)?;
        let handle = self
            .handles
            .create(id, host.info())
            .ok_or_else(|| ClapError::InstantiationFailed(id.to_string()))?;
        let Some(instance) = self.handles.resolve(handle) else {
            return Err(ClapError::InstantiationFailed(id.to_string()));
        };
        let descriptor = self.descriptors.lock().get(instance.descriptor());
        Ok(ClapPluginShim::create(
            Arc::clone(self),
            handle,
            host,
            descriptor,
        ))
    }

    /// Release every live instance. Shims still held by a host resolve to
    /// nothing afterwards.
    pub fn shutdown(&self) -> usize {
        let released = self.handles.release_all();
        if released > 0 {
            info!(released, "Released plugin instances on shutdown");
        }
        released
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("handles", &self.handles)
            .finish()
    }
}
