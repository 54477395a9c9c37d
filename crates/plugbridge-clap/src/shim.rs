//! One `clap_plugin` per instance.
//!
//! The shim owns nothing but the instance's handle: every callback resolves
//! the handle again, so a callback racing `destroy` sees a dead handle
//! instead of freed memory.

use crate::bridge::Bridge;
use crate::events::{ClapInputEvents, ClapOutputEvents};
use crate::extensions::{extension_for_id, vtable};
use crate::host::ClapHost;
use crate::marshal::{process_context, Scratch};
use crate::util::{boundary, check_null_ptr};
use clap_sys::plugin::{clap_plugin, clap_plugin_descriptor};
use clap_sys::process::{clap_process, clap_process_status, CLAP_PROCESS_ERROR};
use parking_lot::Mutex;
use plugbridge_core::{Handle, PluginInstance};
use std::ffi::{c_char, c_void, CStr};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct ClapPluginShim {
    raw: clap_plugin,
    handle: Handle,
    bridge: Arc<Bridge>,
    host: Mutex<ClapHost>,
    scratch: Mutex<Scratch>,
}

impl ClapPluginShim {
    /// Box a shim and return the `clap_plugin` the host will own.
    pub(crate) fn create(
        bridge: Arc<Bridge>,
        handle: Handle,
        host: ClapHost,
        descriptor: *const clap_plugin_descriptor,
    ) -> *const clap_plugin {
        let shim = Box::new(Self {
            raw: clap_plugin {
                desc: descriptor,
                plugin_data: ptr::null_mut(),
                init: Some(init),
                destroy: Some(destroy),
                activate: Some(activate),
                deactivate: Some(deactivate),
                start_processing: Some(start_processing),
                stop_processing: Some(stop_processing),
                reset: Some(reset),
                process: Some(process),
                get_extension: Some(get_extension),
                on_main_thread: Some(on_main_thread),
            },
            handle,
            bridge,
            host: Mutex::new(host),
            scratch: Mutex::new(Scratch::new()),
        });
        let shim = Box::into_raw(shim);
        unsafe {
            (*shim).raw.plugin_data = shim as *mut c_void;
            &(*shim).raw
        }
    }

    /// # Safety
    ///
    /// `plugin` must be a non-null pointer returned by [`ClapPluginShim::create`]
    /// that has not been destroyed.
    pub(crate) unsafe fn from_plugin<'a>(plugin: *const clap_plugin) -> &'a Self {
        &*((*plugin).plugin_data as *const Self)
    }

    pub(crate) fn instance(&self) -> Option<Arc<PluginInstance>> {
        self.bridge.handles().resolve(self.handle)
    }
}

/// Wire the host's extensions into the instance, then initialize it.
unsafe extern "C" fn init(plugin: *const clap_plugin) -> bool {
    check_null_ptr!(false, plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("init", false, || {
        let Some(instance) = shim.instance() else {
            return false;
        };

        let host = {
            let mut host = shim.host.lock();
            host.query_extensions();
            *host
        };
        if host.has_thread_check() {
            instance.thread_checker().set_oracle(host);
        }
        if host.has_thread_pool() {
            instance.thread_pool().attach_host(host);
        }
        if host.has_remote_controls() {
            instance.controls().set_notifier(host);
        }

        match instance.init() {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %instance.descriptor().id, "Failed to initialize plugin: {}", e);
                false
            }
        }
    })
}

/// Release the handle and free the shim. The host must not use `plugin` again.
unsafe extern "C" fn destroy(plugin: *const clap_plugin) {
    check_null_ptr!((), plugin, (*plugin).plugin_data);
    let shim = Box::from_raw((*plugin).plugin_data as *mut ClapPluginShim);
    boundary("destroy", (), || {
        shim.bridge.handles().release(shim.handle);
    });
    debug!(handle = %shim.handle, "Destroyed plugin shim");
}

unsafe extern "C" fn activate(
    plugin: *const clap_plugin,
    sample_rate: f64,
    min_frames_count: u32,
    max_frames_count: u32,
) -> bool {
    check_null_ptr!(false, plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("activate", false, || {
        let Some(instance) = shim.instance() else {
            return false;
        };
        match instance.activate(sample_rate, min_frames_count, max_frames_count) {
            Ok(()) => {
                let channels = shim.bridge.config().max_in_place_channels;
                shim.scratch
                    .lock()
                    .reserve(channels, max_frames_count as usize);
                true
            }
            Err(e) => {
                warn!(id = %instance.descriptor().id, "Failed to activate plugin: {}", e);
                false
            }
        }
    })
}

unsafe extern "C" fn deactivate(plugin: *const clap_plugin) {
    check_null_ptr!((), plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("deactivate", (), || {
        if let Some(Err(e)) = shim.instance().map(|instance| instance.deactivate()) {
            warn!("Failed to deactivate plugin: {}", e);
        }
    })
}

unsafe extern "C" fn start_processing(plugin: *const clap_plugin) -> bool {
    check_null_ptr!(false, plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("start_processing", false, || {
        shim.instance()
            .is_some_and(|instance| instance.start_processing().is_ok())
    })
}

unsafe extern "C" fn stop_processing(plugin: *const clap_plugin) {
    check_null_ptr!((), plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("stop_processing", (), || {
        if let Some(instance) = shim.instance() {
            let _ = instance.stop_processing();
        }
    })
}

unsafe extern "C" fn reset(plugin: *const clap_plugin) {
    check_null_ptr!((), plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("reset", (), || {
        if let Some(instance) = shim.instance() {
            let _ = instance.reset();
        }
    })
}

unsafe extern "C" fn process(
    plugin: *const clap_plugin,
    process: *const clap_process,
) -> clap_process_status {
    check_null_ptr!(CLAP_PROCESS_ERROR, plugin, (*plugin).plugin_data, process);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("process", CLAP_PROCESS_ERROR, || {
        let Some(instance) = shim.instance() else {
            return CLAP_PROCESS_ERROR;
        };
        let process = &*process;
        let in_events = ClapInputEvents::new(process.in_events);
        let mut out_events = ClapOutputEvents::new(process.out_events);
        let mut scratch = shim.scratch.lock();
        let mut ctx = process_context(process, &mut scratch, &in_events, &mut out_events);
        instance.process(&mut ctx).raw()
    })
}

unsafe extern "C" fn get_extension(
    plugin: *const clap_plugin,
    id: *const c_char,
) -> *const c_void {
    check_null_ptr!(ptr::null(), plugin, (*plugin).plugin_data, id);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("get_extension", ptr::null(), || {
        let Some(extension) = extension_for_id(CStr::from_ptr(id)) else {
            return ptr::null();
        };
        match shim.instance() {
            Some(instance) if instance.capability(extension).is_supported() => vtable(extension),
            _ => ptr::null(),
        }
    })
}

unsafe extern "C" fn on_main_thread(plugin: *const clap_plugin) {
    check_null_ptr!((), plugin, (*plugin).plugin_data);
    let shim = ClapPluginShim::from_plugin(plugin);
    boundary("on_main_thread", (), || {
        if let Some(instance) = shim.instance() {
            instance.on_main_thread();
        }
    })
}
