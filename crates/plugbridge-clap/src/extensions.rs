//! Plugin-side extension vtables and the id lookup behind `get_extension`.

use crate::host::CLAP_EXT_REMOTE_CONTROLS_COMPAT;
use crate::shim::ClapPluginShim;
use crate::stream::{ClapInputStream, ClapOutputStream};
use crate::util::{boundary, check_null_ptr, write_c_string};
use clap_sys::ext::remote_controls::{
    clap_plugin_remote_controls, clap_remote_controls_page, CLAP_EXT_REMOTE_CONTROLS,
};
use clap_sys::ext::state::{clap_plugin_state, CLAP_EXT_STATE};
use clap_sys::ext::thread_pool::{clap_plugin_thread_pool, CLAP_EXT_THREAD_POOL};
use clap_sys::plugin::clap_plugin;
use clap_sys::stream::{clap_istream, clap_ostream};
use plugbridge_core::Extension;
use std::ffi::{c_void, CStr};
use tracing::warn;

/// Map an extension id onto the capability it names.
pub fn extension_for_id(id: &CStr) -> Option<Extension> {
    if id == CLAP_EXT_STATE {
        Some(Extension::State)
    } else if id == CLAP_EXT_THREAD_POOL {
        Some(Extension::ThreadPool)
    } else if id == CLAP_EXT_REMOTE_CONTROLS || id == CLAP_EXT_REMOTE_CONTROLS_COMPAT {
        Some(Extension::RemoteControls)
    } else {
        None
    }
}

/// The vtable handed to the host for `extension`.
pub(crate) fn vtable(extension: Extension) -> *const c_void {
    match extension {
        Extension::State => &PLUGIN_STATE as *const clap_plugin_state as *const c_void,
        Extension::ThreadPool => {
            &PLUGIN_THREAD_POOL as *const clap_plugin_thread_pool as *const c_void
        }
        Extension::RemoteControls => {
            &PLUGIN_REMOTE_CONTROLS as *const clap_plugin_remote_controls as *const c_void
        }
    }
}

static PLUGIN_STATE: clap_plugin_state = clap_plugin_state {
    save: Some(state_save),
    load: Some(state_load),
};

unsafe extern "C" fn state_save(plugin: *const clap_plugin, stream: *const clap_ostream) -> bool {
    check_null_ptr!(false, plugin, (*plugin).plugin_data, stream);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("state.save", false, || {
        let Some(instance) = shim.instance() else {
            return false;
        };
        let mut writer = ClapOutputStream::new(&*stream);
        match instance.save_state(&mut writer) {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %instance.descriptor().id, "Failed to save state: {}", e);
                false
            }
        }
    })
}

unsafe extern "C" fn state_load(plugin: *const clap_plugin, stream: *const clap_istream) -> bool {
    check_null_ptr!(false, plugin, (*plugin).plugin_data, stream);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("state.load", false, || {
        let Some(instance) = shim.instance() else {
            return false;
        };
        let mut reader = ClapInputStream::new(&*stream);
        // The instance logs load failures itself.
        instance.load_state(&mut reader).is_ok()
    })
}

static PLUGIN_THREAD_POOL: clap_plugin_thread_pool = clap_plugin_thread_pool {
    exec: Some(thread_pool_exec),
};

/// Runs on host worker threads. Resolves the handle without touching the
/// instance lock, which the audio thread holds while it waits.
unsafe extern "C" fn thread_pool_exec(plugin: *const clap_plugin, task_index: u32) {
    check_null_ptr!((), plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("thread_pool.exec", (), || {
        if let Some(instance) = shim.instance() {
            instance.thread_pool().exec(task_index);
        }
    })
}

static PLUGIN_REMOTE_CONTROLS: clap_plugin_remote_controls = clap_plugin_remote_controls {
    count: Some(remote_controls_count),
    get: Some(remote_controls_get),
};

unsafe extern "C" fn remote_controls_count(plugin: *const clap_plugin) -> u32 {
    check_null_ptr!(0, plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("remote_controls.count", 0, || {
        shim.instance()
            .map_or(0, |instance| instance.controls().page_count())
    })
}

unsafe extern "C" fn remote_controls_get(
    plugin: *const clap_plugin,
    page_index: u32,
    page: *mut clap_remote_controls_page,
) -> bool {
    check_null_ptr!(false, plugin, (*plugin).plugin_data, page);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("remote_controls.get", false, || {
        let Some(source) = shim
            .instance()
            .and_then(|instance| instance.controls().page(page_index))
        else {
            return false;
        };
        let out = &mut *page;
        write_c_string(&mut out.section_name, &source.section_name);
        out.page_id = source.page_id;
        write_c_string(&mut out.page_name, &source.page_name);
        out.param_ids = source.param_ids;
        out.is_for_preset = source.is_for_preset;
        true
    })
}
