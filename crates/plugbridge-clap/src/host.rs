//! The host as seen from a plugin instance.

use crate::error::{ClapError, Result};
use crate::util::string_from_ptr;
use clap_sys::ext::remote_controls::{clap_host_remote_controls, CLAP_EXT_REMOTE_CONTROLS};
use clap_sys::ext::thread_check::{clap_host_thread_check, CLAP_EXT_THREAD_CHECK};
use clap_sys::ext::thread_pool::{clap_host_thread_pool, CLAP_EXT_THREAD_POOL};
use clap_sys::host::clap_host;
use clap_sys::version::clap_version_is_compatible;
use plugbridge_core::{HostInfo, HostThreadPool, RemoteControlsNotifier, ThreadOracle};
use std::ffi::CStr;
use std::ptr;
use tracing::debug;

/// Id older hosts use for the remote-controls extension.
pub const CLAP_EXT_REMOTE_CONTROLS_COMPAT: &CStr = c"clap.remote-controls.draft/2";

/// Host pointer plus whichever host extensions were found.
///
/// Copies share the same host; the CLAP ABI keeps it valid for as long as the
/// plugin instance exists.
#[derive(Debug, Clone, Copy)]
pub struct ClapHost {
    raw: *const clap_host,
    thread_pool: *const clap_host_thread_pool,
    remote_controls: *const clap_host_remote_controls,
    thread_check: *const clap_host_thread_check,
}

// The host extensions used here are thread-safe per the CLAP ABI.
unsafe impl Send for ClapHost {}
unsafe impl Sync for ClapHost {}

impl ClapHost {
    /// # Safety
    ///
    /// `raw` must be null or a host that outlives every copy of the result.
    pub unsafe fn new(raw: *const clap_host) -> Result<Self> {
        let Some(host) = raw.as_ref() else {
            return Err(ClapError::NullPointer("host"));
        };
        if !clap_version_is_compatible(host.clap_version) {
            return Err(ClapError::IncompatibleHost {
                major: host.clap_version.major,
                minor: host.clap_version.minor,
                revision: host.clap_version.revision,
            });
        }
        Ok(Self {
            raw,
            thread_pool: ptr::null(),
            remote_controls: ptr::null(),
            thread_check: ptr::null(),
        })
    }

    pub fn raw(&self) -> *const clap_host {
        self.raw
    }

    /// Identity strings the host reports.
    pub fn info(&self) -> HostInfo {
        let host = unsafe { &*self.raw };
        unsafe {
            HostInfo {
                name: string_from_ptr(host.name),
                vendor: string_from_ptr(host.vendor),
                url: string_from_ptr(host.url),
                version: string_from_ptr(host.version),
            }
        }
    }

    unsafe fn extension<T>(&self, id: &CStr) -> *const T {
        match (*self.raw).get_extension {
            Some(get_extension) => get_extension(self.raw, id.as_ptr()) as *const T,
            None => ptr::null(),
        }
    }

    /// Look up the host extensions the bridge forwards to. CLAP allows this
    /// from `init` onwards, not during creation.
    ///
    /// # Safety
    ///
    /// Must be called from the main thread.
    pub unsafe fn query_extensions(&mut self) {
        self.thread_pool = self.extension(CLAP_EXT_THREAD_POOL);
        self.thread_check = self.extension(CLAP_EXT_THREAD_CHECK);
        self.remote_controls = self.extension(CLAP_EXT_REMOTE_CONTROLS);
        if self.remote_controls.is_null() {
            self.remote_controls = self.extension(CLAP_EXT_REMOTE_CONTROLS_COMPAT);
        }
        debug!(
            thread_pool = self.has_thread_pool(),
            thread_check = self.has_thread_check(),
            remote_controls = self.has_remote_controls(),
            "Queried host extensions"
        );
    }

    pub fn has_thread_pool(&self) -> bool {
        !self.thread_pool.is_null()
    }

    pub fn has_thread_check(&self) -> bool {
        !self.thread_check.is_null()
    }

    pub fn has_remote_controls(&self) -> bool {
        !self.remote_controls.is_null()
    }

    /// Ask the host for an `on_main_thread` callback.
    pub fn request_callback(&self) {
        unsafe {
            if let Some(request_callback) = (*self.raw).request_callback {
                request_callback(self.raw);
            }
        }
    }
}

impl HostThreadPool for ClapHost {
    fn request_exec(&self, task_count: u32) -> bool {
        unsafe {
            match self.thread_pool.as_ref().and_then(|ext| ext.request_exec) {
                Some(request_exec) => request_exec(self.raw, task_count),
                None => false,
            }
        }
    }
}

impl RemoteControlsNotifier for ClapHost {
    fn changed(&self) {
        unsafe {
            if let Some(changed) = self.remote_controls.as_ref().and_then(|ext| ext.changed) {
                changed(self.raw);
            }
        }
    }

    fn suggest_page(&self, page_id: u32) {
        unsafe {
            if let Some(suggest_page) = self
                .remote_controls
                .as_ref()
                .and_then(|ext| ext.suggest_page)
            {
                suggest_page(self.raw, page_id);
            }
        }
    }
}

impl ThreadOracle for ClapHost {
    fn is_main_thread(&self) -> bool {
        unsafe {
            match self.thread_check.as_ref().and_then(|ext| ext.is_main_thread) {
                Some(is_main_thread) => is_main_thread(self.raw),
                None => false,
            }
        }
    }

    fn is_audio_thread(&self) -> bool {
        unsafe {
            match self.thread_check.as_ref().and_then(|ext| ext.is_audio_thread) {
                Some(is_audio_thread) => is_audio_thread(self.raw),
                None => false,
            }
        }
    }
}
