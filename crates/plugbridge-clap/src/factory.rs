//! `clap_plugin_factory` over a [`Bridge`].

use crate::bridge::Bridge;
use crate::util::{boundary, check_null_ptr};
use clap_sys::factory::plugin_factory::clap_plugin_factory;
use clap_sys::host::clap_host;
use clap_sys::plugin::{clap_plugin, clap_plugin_descriptor};
use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::{Arc, Weak};
use tracing::warn;

/// The vtable comes first so the host's factory pointer is also a pointer to
/// this struct.
#[repr(C)]
pub(crate) struct ClapFactory {
    raw: clap_plugin_factory,
    bridge: Weak<Bridge>,
}

impl ClapFactory {
    pub(crate) fn new(bridge: Weak<Bridge>) -> Self {
        Self {
            raw: clap_plugin_factory {
                get_plugin_count: Some(get_plugin_count),
                get_plugin_descriptor: Some(get_plugin_descriptor),
                create_plugin: Some(create_plugin),
            },
            bridge,
        }
    }

    pub(crate) fn as_raw(&self) -> *const clap_plugin_factory {
        &self.raw
    }

    unsafe fn bridge(factory: *const clap_plugin_factory) -> Option<Arc<Bridge>> {
        (*(factory as *const ClapFactory)).bridge.upgrade()
    }
}

unsafe extern "C" fn get_plugin_count(factory: *const clap_plugin_factory) -> u32 {
    check_null_ptr!(0, factory);
    boundary("factory.get_plugin_count", 0, || {
        ClapFactory::bridge(factory).map_or(0, |bridge| bridge.handles().count())
    })
}

unsafe extern "C" fn get_plugin_descriptor(
    factory: *const clap_plugin_factory,
    index: u32,
) -> *const clap_plugin_descriptor {
    check_null_ptr!(ptr::null(), factory);
    boundary("factory.get_plugin_descriptor", ptr::null(), || {
        ClapFactory::bridge(factory)
            .map_or(ptr::null(), |bridge| bridge.clap_descriptor_at(index))
    })
}

unsafe extern "C" fn create_plugin(
    factory: *const clap_plugin_factory,
    host: *const clap_host,
    plugin_id: *const c_char,
) -> *const clap_plugin {
    check_null_ptr!(ptr::null(), factory, host, plugin_id);
    boundary("factory.create_plugin", ptr::null(), || {
        let Some(bridge) = ClapFactory::bridge(factory) else {
            return ptr::null();
        };
        let id = CStr::from_ptr(plugin_id).to_string_lossy();
        match bridge.create_plugin(host, &id) {
            Ok(plugin) => plugin,
            Err(e) => {
                warn!(id = %id, "Failed to create plugin: {}", e);
                ptr::null()
            }
        }
    })
}
