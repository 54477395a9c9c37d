//! Handle Registry
//!
//! Owns every live plugin instance and hands the ABI layer opaque [`Handle`]
//! tokens instead of references. A handle packs a slot index with the slot's
//! generation, so a token kept after release never resolves to whichever
//! instance reuses the slot.

use crate::config::BridgeConfig;
use crate::descriptor::PluginDescriptor;
use crate::instance::PluginInstance;
use crate::plugin::{HostInfo, Plugin};
use crate::registry::PluginRegistry;
use crate::threadpool::FallbackPool;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opaque token for a live instance: slot index in the low 32 bits,
/// generation in the high 32 bits. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    fn new(index: u32, generation: u32) -> Self {
        Handle(((generation as u64) << 32) | index as u64)
    }

    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn index(self) -> u32 {
        self.0 as u32
    }

    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

struct Slot {
    /// Starts at 1 and skips 0 on wrap, so no issued handle is zero.
    generation: u32,
    instance: Option<Arc<PluginInstance>>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Slots {
    fn get(&self, handle: Handle) -> Option<&Arc<PluginInstance>> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.instance.as_ref()
    }

    fn insert(&mut self, instance: Arc<PluginInstance>) -> Option<Handle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot {
                    generation: 1,
                    instance: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.instance = Some(instance);
        self.live += 1;
        Some(Handle::new(index, slot.generation))
    }

    fn remove(&mut self, handle: Handle) -> Option<Arc<PluginInstance>> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let instance = slot.instance.take()?;
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.free.push(handle.index());
        self.live -= 1;
        Some(instance)
    }
}

/// Registry of live instances
///
/// `resolve` takes the read lock only, so it is safe on the audio thread as
/// long as instances are not being created or released at the same time.
pub struct HandleRegistry {
    plugins: PluginRegistry,
    config: BridgeConfig,
    pool: Arc<FallbackPool>,
    slots: RwLock<Slots>,
}

impl HandleRegistry {
    pub fn new(plugins: PluginRegistry, config: BridgeConfig) -> Self {
        let pool = Arc::new(FallbackPool::new(config.max_workers));
        Self {
            plugins,
            config,
            pool,
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register a plugin type with the underlying plugin registry
    pub fn register<F>(&self, descriptor: PluginDescriptor, constructor: F)
    where
        F: Fn(&HostInfo) -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.plugins.register(descriptor, constructor);
    }

    pub fn count(&self) -> u32 {
        self.plugins.count()
    }

    pub fn descriptor_at(&self, index: u32) -> Option<Arc<PluginDescriptor>> {
        self.plugins.descriptor_at(index)
    }

    /// Instantiate a plugin by id. `None` for an unknown id or a failed constructor.
    pub fn create(&self, id: &str, host: HostInfo) -> Option<Handle> {
        let (descriptor, plugin) = match self.plugins.create(id, &host) {
            Ok(created) => created,
            Err(e) => {
                warn!(id, "Failed to create plugin: {}", e);
                return None;
            }
        };
        let instance = Arc::new(PluginInstance::new(
            descriptor,
            plugin,
            host,
            Arc::clone(&self.pool),
            &self.config,
        ));
        let handle = self.slots.write().insert(instance);
        match handle {
            Some(handle) => debug!(id, %handle, "Created plugin instance"),
            None => warn!(id, "Failed to create plugin: handle table full"),
        }
        handle
    }

    /// The instance behind `handle`, `None` once released or if never issued.
    pub fn resolve(&self, handle: Handle) -> Option<Arc<PluginInstance>> {
        self.slots.read().get(handle).cloned()
    }

    /// Tear down and drop the instance. Unknown or stale handles are ignored.
    pub fn release(&self, handle: Handle) -> bool {
        let removed = self.slots.write().remove(handle);
        match removed {
            Some(instance) => {
                instance.teardown();
                debug!(%handle, id = %instance.descriptor().id, "Released plugin instance");
                true
            }
            None => {
                debug!(%handle, "Release of unknown handle ignored");
                false
            }
        }
    }

    /// Release every live instance.
    pub fn release_all(&self) -> usize {
        let handles = self.handles();
        handles.into_iter().filter(|h| self.release(*h)).count()
    }

    pub fn len(&self) -> usize {
        self.slots.read().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live handles.
    pub fn handles(&self) -> Vec<Handle> {
        let slots = self.slots.read();
        slots
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.instance.is_some())
            .map(|(index, slot)| Handle::new(index as u32, slot.generation))
            .collect()
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("plugins", &self.plugins)
            .field("live", &self.len())
            .finish()
    }
}
