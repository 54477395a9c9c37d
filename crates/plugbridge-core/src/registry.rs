//! Plugin Registry
//!
//! Maps stable plugin ids to a descriptor and a constructor. Hosts enumerate
//! it during discovery and instantiate through it.

use crate::descriptor::PluginDescriptor;
use crate::error::{CoreError, Result, Stage};
use crate::plugin::{HostInfo, Plugin};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Function that constructs a plugin for a host
pub type PluginConstructor = Arc<dyn Fn(&HostInfo) -> Result<Box<dyn Plugin>> + Send + Sync>;

struct PluginEntry {
    descriptor: Arc<PluginDescriptor>,
    constructor: PluginConstructor,
}

#[derive(Default)]
struct Entries {
    /// Registration order, which is the enumeration order.
    order: Vec<PluginEntry>,
    index: HashMap<String, usize>,
}

/// Registry of plugin types
pub struct PluginRegistry {
    entries: Arc<RwLock<Entries>>,
    revision: Arc<AtomicU64>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a plugin type
    ///
    /// An empty id is rejected. Registering an existing id replaces the entry
    /// in place, keeping its enumeration position.
    ///
    /// # Example
    /// ```ignore
    /// registry.register(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
    ///     Ok(Box::new(Gain::default()))
    /// });
    /// ```
    pub fn register<F>(&self, descriptor: PluginDescriptor, constructor: F)
    where
        F: Fn(&HostInfo) -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        if descriptor.id.is_empty() {
            warn!(name = %descriptor.name, "Refusing to register plugin with empty id");
            return;
        }

        let id = descriptor.id.clone();
        let entry = PluginEntry {
            descriptor: Arc::new(descriptor),
            constructor: Arc::new(constructor),
        };

        let mut entries = self.entries.write();
        match entries.index.get(&id).copied() {
            Some(position) => {
                warn!(id = %id, "Plugin already registered, replacing");
                entries.order[position] = entry;
            }
            None => {
                let position = entries.order.len();
                entries.order.push(entry);
                entries.index.insert(id.clone(), position);
                info!(id = %id, "Registered plugin");
            }
        }
        self.revision.fetch_add(1, Ordering::Release);
    }

    /// Number of registered plugin types
    pub fn count(&self) -> u32 {
        self.entries.read().order.len() as u32
    }

    /// Descriptor by enumeration index, `None` past the end
    pub fn descriptor_at(&self, index: u32) -> Option<Arc<PluginDescriptor>> {
        self.entries
            .read()
            .order
            .get(index as usize)
            .map(|e| Arc::clone(&e.descriptor))
    }

    pub fn descriptor(&self, id: &str) -> Option<Arc<PluginDescriptor>> {
        let entries = self.entries.read();
        entries
            .index
            .get(id)
            .map(|&i| Arc::clone(&entries.order[i].descriptor))
    }

    /// List registered ids in enumeration order
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .order
            .iter()
            .map(|e| e.descriptor.id.clone())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().index.contains_key(id)
    }

    /// Unregister a plugin type
    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(position) = entries.index.remove(id) else {
            return false;
        };
        entries.order.remove(position);
        for slot in entries.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        self.revision.fetch_add(1, Ordering::Release);
        true
    }

    /// Clear all registrations
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.order.clear();
        entries.index.clear();
        self.revision.fetch_add(1, Ordering::Release);
    }

    /// Bumped on every change, so callers can tell when cached descriptors are stale.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Construct a plugin by id
    ///
    /// The constructor runs outside the registry lock. A panicking constructor
    /// is reported as a construction failure.
    pub fn create(
        &self,
        id: &str,
        host: &HostInfo,
    ) -> Result<(Arc<PluginDescriptor>, Box<dyn Plugin>)> {
        let (descriptor, constructor) = {
            let entries = self.entries.read();
            let entry = entries
                .index
                .get(id)
                .map(|&i| &entries.order[i])
                .ok_or_else(|| CoreError::UnknownPlugin(id.to_string()))?;
            (Arc::clone(&entry.descriptor), Arc::clone(&entry.constructor))
        };

        let plugin = catch_unwind(AssertUnwindSafe(|| constructor(host))).map_err(|_| {
            CoreError::plugin(Stage::Construction, "constructor panicked")
        })??;
        Ok((descriptor, plugin))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PluginRegistry {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            revision: Arc::clone(&self.revision),
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("ids", &self.ids())
            .field("revision", &self.revision())
            .finish()
    }
}
