//! The `clap_entry` symbol a plugin binary exports.

use crate::bridge::Bridge;
use crate::util::{boundary, check_null_ptr, string_from_ptr};
use clap_sys::factory::plugin_factory::CLAP_PLUGIN_FACTORY_ID;
use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Process-wide state behind `clap_entry`.
///
/// The bridge is built lazily on the first `init`. `init` and `deinit` are
/// counted so that nested loads of the same binary share one bridge and
/// instances are released only when the last loader lets go.
pub struct EntryPoint {
    setup: fn() -> Arc<Bridge>,
    bridge: OnceLock<Arc<Bridge>>,
    inits: AtomicUsize,
}

impl EntryPoint {
    pub const fn new(setup: fn() -> Arc<Bridge>) -> Self {
        Self {
            setup,
            bridge: OnceLock::new(),
            inits: AtomicUsize::new(0),
        }
    }

    pub fn init(&self, plugin_path: &str) -> bool {
        let bridge = self.bridge.get_or_init(self.setup);
        let previous = self.inits.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            info!(
                path = plugin_path,
                plugins = bridge.handles().count(),
                "Plugin entry initialized"
            );
        } else {
            debug!(path = plugin_path, inits = previous + 1, "Nested entry init");
        }
        true
    }

    pub fn deinit(&self) {
        let previous = self
            .inits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => {
                if let Some(bridge) = self.bridge.get() {
                    bridge.shutdown();
                }
                info!("Plugin entry deinitialized");
            }
            Ok(_) => {}
            Err(_) => debug!("Unbalanced entry deinit ignored"),
        }
    }

    /// The factory for `factory_id`, or null when unknown or not initialized.
    pub fn factory(&self, factory_id: &CStr) -> *const c_void {
        if self.inits.load(Ordering::Acquire) == 0 {
            return ptr::null();
        }
        match self.bridge.get() {
            Some(bridge) if factory_id == CLAP_PLUGIN_FACTORY_ID => {
                bridge.factory() as *const c_void
            }
            _ => ptr::null(),
        }
    }

    pub fn bridge(&self) -> Option<&Arc<Bridge>> {
        self.bridge.get()
    }

    /// `clap_plugin_entry.init`.
    ///
    /// # Safety
    ///
    /// `plugin_path` must be null or point to a NUL-terminated string.
    pub unsafe fn clap_init(&self, plugin_path: *const c_char) -> bool {
        let path = string_from_ptr(plugin_path);
        boundary("clap_entry.init", false, || self.init(&path))
    }

    pub fn clap_deinit(&self) {
        boundary("clap_entry.deinit", (), || self.deinit())
    }

    /// `clap_plugin_entry.get_factory`.
    ///
    /// # Safety
    ///
    /// `factory_id` must be null or point to a NUL-terminated string.
    pub unsafe fn clap_get_factory(&self, factory_id: *const c_char) -> *const c_void {
        check_null_ptr!(ptr::null(), factory_id);
        let id = CStr::from_ptr(factory_id);
        boundary("clap_entry.get_factory", ptr::null(), || self.factory(id))
    }
}

/// Export `clap_entry` for a bridge built by `$setup`, a `fn() -> Arc<Bridge>`.
///
/// ```ignore
/// fn setup() -> Arc<Bridge> {
///     let bridge = Bridge::new(PluginRegistry::new());
///     bridge.register(PluginDescriptor::new("demo.gain", "Demo Gain"), |_host| {
///         Ok(Box::new(Gain::default()))
///     });
///     bridge
/// }
///
/// plugbridge_clap::export_clap_entry!(setup);
/// ```
#[macro_export]
macro_rules! export_clap_entry {
    ($setup:expr) => {
        static PLUGBRIDGE_ENTRY: $crate::EntryPoint = $crate::EntryPoint::new($setup);

        unsafe extern "C" fn plugbridge_entry_init(
            plugin_path: *const ::std::ffi::c_char,
        ) -> bool {
            PLUGBRIDGE_ENTRY.clap_init(plugin_path)
        }

        unsafe extern "C" fn plugbridge_entry_deinit() {
            PLUGBRIDGE_ENTRY.clap_deinit()
        }

        unsafe extern "C" fn plugbridge_entry_get_factory(
            factory_id: *const ::std::ffi::c_char,
        ) -> *const ::std::ffi::c_void {
            PLUGBRIDGE_ENTRY.clap_get_factory(factory_id)
        }

        #[no_mangle]
        #[used]
        #[allow(non_upper_case_globals)]
        pub static clap_entry: $crate::clap_sys::entry::clap_plugin_entry =
            $crate::clap_sys::entry::clap_plugin_entry {
                clap_version: $crate::clap_sys::version::CLAP_VERSION,
                init: Some(plugbridge_entry_init),
                deinit: Some(plugbridge_entry_deinit),
                get_factory: Some(plugbridge_entry_get_factory),
            };
    };
}
