//! Host-side stand-ins for exercising the ABI layer in unit tests.

use crate::events::decode_event;
use crate::host::CLAP_EXT_REMOTE_CONTROLS_COMPAT;
use clap_sys::audio_buffer::clap_audio_buffer;
use clap_sys::events::{
    clap_event_header, clap_event_midi, clap_event_midi_sysex, clap_event_note,
    clap_event_param_value, clap_event_transport, clap_input_events, clap_output_events,
    CLAP_CORE_EVENT_SPACE_ID, CLAP_EVENT_MIDI, CLAP_EVENT_MIDI_SYSEX, CLAP_EVENT_PARAM_VALUE,
    CLAP_EVENT_TRANSPORT,
};
use clap_sys::ext::remote_controls::{clap_host_remote_controls, CLAP_EXT_REMOTE_CONTROLS};
use clap_sys::ext::thread_check::{clap_host_thread_check, CLAP_EXT_THREAD_CHECK};
use clap_sys::ext::thread_pool::{
    clap_host_thread_pool, clap_plugin_thread_pool, CLAP_EXT_THREAD_POOL,
};
use clap_sys::host::clap_host;
use clap_sys::plugin::clap_plugin;
use clap_sys::stream::{clap_istream, clap_ostream};
use clap_sys::version::CLAP_VERSION;
use parking_lot::Mutex;
use plugbridge_core::Event;
use std::cell::Cell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

thread_local! {
    static ON_AUDIO_THREAD: Cell<bool> = const { Cell::new(false) };
}

#[derive(Clone, Copy)]
struct PluginPool {
    plugin: *const clap_plugin,
    exec: unsafe extern "C" fn(*const clap_plugin, u32),
}

unsafe impl Send for PluginPool {}
unsafe impl Sync for PluginPool {}

struct HostState {
    name: CString,
    vendor: CString,
    url: CString,
    version: CString,
    creator: ThreadId,
    extensions: bool,
    thread_pool: bool,
    accept_exec: bool,
    compat_only: bool,
    plugin_pool: Mutex<Option<PluginPool>>,
    exec_requests: Mutex<Vec<u32>>,
    controls_changed: AtomicUsize,
    suggested_pages: Mutex<Vec<u32>>,
    callbacks: AtomicUsize,
}

/// A CLAP host with thread-check, remote-controls and optionally thread-pool
/// support. The thread that creates it is its main thread.
pub(crate) struct MockHost {
    state: Box<HostState>,
}

impl MockHost {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            state: Box::new(HostState {
                name: CString::new(name).unwrap(),
                vendor: CString::new("plugbridge").unwrap(),
                url: CString::new("").unwrap(),
                version: CString::new("1.0.0").unwrap(),
                creator: thread::current().id(),
                extensions: true,
                thread_pool: false,
                accept_exec: false,
                compat_only: false,
                plugin_pool: Mutex::new(None),
                exec_requests: Mutex::new(Vec::new()),
                controls_changed: AtomicUsize::new(0),
                suggested_pages: Mutex::new(Vec::new()),
                callbacks: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn with_thread_pool(mut self, accept: bool) -> Self {
        self.state.thread_pool = true;
        self.state.accept_exec = accept;
        self
    }

    pub(crate) fn without_extensions(mut self) -> Self {
        self.state.extensions = false;
        self
    }

    pub(crate) fn remote_controls_compat_only(mut self) -> Self {
        self.state.compat_only = true;
        self
    }

    pub(crate) fn raw(&self) -> clap_host {
        clap_host {
            clap_version: CLAP_VERSION,
            host_data: &*self.state as *const HostState as *mut c_void,
            name: self.state.name.as_ptr(),
            vendor: self.state.vendor.as_ptr(),
            url: self.state.url.as_ptr(),
            version: self.state.version.as_ptr(),
            get_extension: Some(host_get_extension),
            request_restart: Some(host_request_noop),
            request_process: Some(host_request_noop),
            request_callback: Some(host_request_callback),
        }
    }

    /// Run accepted thread-pool requests against `plugin`. Looks the
    /// extension up now, on the main thread, as a real host would.
    pub(crate) fn attach_plugin(&self, plugin: *const clap_plugin) {
        let pool = unsafe {
            let get_extension = (*plugin).get_extension.unwrap();
            let ext = get_extension(plugin, CLAP_EXT_THREAD_POOL.as_ptr())
                as *const clap_plugin_thread_pool;
            assert!(!ext.is_null(), "plugin does not expose a thread pool");
            PluginPool {
                plugin,
                exec: (*ext).exec.unwrap(),
            }
        };
        *self.state.plugin_pool.lock() = Some(pool);
    }

    /// Run `f` with this thread reported as the audio thread.
    pub(crate) fn on_audio_thread<R>(&self, f: impl FnOnce() -> R) -> R {
        ON_AUDIO_THREAD.with(|flag| flag.set(true));
        let result = f();
        ON_AUDIO_THREAD.with(|flag| flag.set(false));
        result
    }

    pub(crate) fn exec_requests(&self) -> Vec<u32> {
        self.state.exec_requests.lock().clone()
    }

    pub(crate) fn controls_changed(&self) -> usize {
        self.state.controls_changed.load(Ordering::SeqCst)
    }

    pub(crate) fn suggested_pages(&self) -> Vec<u32> {
        self.state.suggested_pages.lock().clone()
    }

    pub(crate) fn callbacks_requested(&self) -> usize {
        self.state.callbacks.load(Ordering::SeqCst)
    }
}

unsafe fn host_state<'a>(host: *const clap_host) -> &'a HostState {
    &*((*host).host_data as *const HostState)
}

static HOST_THREAD_POOL: clap_host_thread_pool = clap_host_thread_pool {
    request_exec: Some(host_request_exec),
};

static HOST_THREAD_CHECK: clap_host_thread_check = clap_host_thread_check {
    is_main_thread: Some(host_is_main_thread),
    is_audio_thread: Some(host_is_audio_thread),
};

static HOST_REMOTE_CONTROLS: clap_host_remote_controls = clap_host_remote_controls {
    changed: Some(host_controls_changed),
    suggest_page: Some(host_suggest_page),
};

unsafe extern "C" fn host_get_extension(
    host: *const clap_host,
    id: *const c_char,
) -> *const c_void {
    let state = host_state(host);
    let id = CStr::from_ptr(id);
    if !state.extensions {
        return ptr::null();
    }
    if id == CLAP_EXT_THREAD_POOL && state.thread_pool {
        &HOST_THREAD_POOL as *const clap_host_thread_pool as *const c_void
    } else if id == CLAP_EXT_THREAD_CHECK {
        &HOST_THREAD_CHECK as *const clap_host_thread_check as *const c_void
    } else if (id == CLAP_EXT_REMOTE_CONTROLS && !state.compat_only)
        || (id == CLAP_EXT_REMOTE_CONTROLS_COMPAT && state.compat_only)
    {
        &HOST_REMOTE_CONTROLS as *const clap_host_remote_controls as *const c_void
    } else {
        ptr::null()
    }
}

unsafe extern "C" fn host_request_noop(_host: *const clap_host) {}

unsafe extern "C" fn host_request_callback(host: *const clap_host) {
    host_state(host).callbacks.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn host_request_exec(host: *const clap_host, task_count: u32) -> bool {
    let state = host_state(host);
    state.exec_requests.lock().push(task_count);
    if !state.accept_exec {
        return false;
    }
    let Some(pool) = *state.plugin_pool.lock() else {
        return true;
    };
    let next = AtomicU32::new(0);
    thread::scope(|scope| {
        for _ in 0..task_count.min(3) {
            scope.spawn(|| {
                let pool = &pool;
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= task_count {
                        break;
                    }
                    unsafe { (pool.exec)(pool.plugin, index) };
                }
            });
        }
    });
    true
}

unsafe extern "C" fn host_is_main_thread(host: *const clap_host) -> bool {
    host_state(host).creator == thread::current().id() && !ON_AUDIO_THREAD.with(Cell::get)
}

unsafe extern "C" fn host_is_audio_thread(_host: *const clap_host) -> bool {
    ON_AUDIO_THREAD.with(Cell::get)
}

unsafe extern "C" fn host_controls_changed(host: *const clap_host) {
    host_state(host)
        .controls_changed
        .fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn host_suggest_page(host: *const clap_host, page_id: u32) {
    host_state(host).suggested_pages.lock().push(page_id);
}

enum HostEvent {
    Note(clap_event_note),
    Param(clap_event_param_value),
    Midi(clap_event_midi),
    Sysex(clap_event_midi_sysex, Box<[u8]>),
    Header(clap_event_header),
}

impl HostEvent {
    fn header(&self) -> *const clap_event_header {
        match self {
            HostEvent::Note(e) => &e.header,
            HostEvent::Param(e) => &e.header,
            HostEvent::Midi(e) => &e.header,
            HostEvent::Sysex(e, _) => &e.header,
            HostEvent::Header(h) => h,
        }
    }
}

fn core_header<T>(type_: u16, time: u32) -> clap_event_header {
    clap_event_header {
        size: size_of::<T>() as u32,
        time,
        space_id: CLAP_CORE_EVENT_SPACE_ID,
        type_,
        flags: 0,
    }
}

/// A host input queue. Must stay in place while its `raw()` view is in use.
#[derive(Default)]
pub(crate) struct HostEventList {
    events: Vec<HostEvent>,
}

impl HostEventList {
    pub(crate) fn transport_header() -> clap_event_header {
        core_header::<clap_event_transport>(CLAP_EVENT_TRANSPORT, 0)
    }

    pub(crate) fn push_note(&mut self, type_: u16, time: u32, key: i16, velocity: f64) {
        self.events.push(HostEvent::Note(clap_event_note {
            header: core_header::<clap_event_note>(type_, time),
            note_id: -1,
            port_index: 0,
            channel: 0,
            key,
            velocity,
        }));
    }

    pub(crate) fn push_param_value(&mut self, time: u32, param_id: u32, value: f64, cookie: usize) {
        self.events.push(HostEvent::Param(clap_event_param_value {
            header: core_header::<clap_event_param_value>(CLAP_EVENT_PARAM_VALUE, time),
            param_id,
            cookie: cookie as *mut c_void,
            note_id: -1,
            port_index: -1,
            channel: -1,
            key: -1,
            value,
        }));
    }

    pub(crate) fn push_midi(&mut self, time: u32, data: [u8; 3]) {
        self.events.push(HostEvent::Midi(clap_event_midi {
            header: core_header::<clap_event_midi>(CLAP_EVENT_MIDI, time),
            port_index: 0,
            data,
        }));
    }

    pub(crate) fn push_sysex(&mut self, time: u32, data: &[u8]) {
        let buffer: Box<[u8]> = data.into();
        let event = clap_event_midi_sysex {
            header: core_header::<clap_event_midi_sysex>(CLAP_EVENT_MIDI_SYSEX, time),
            port_index: 0,
            buffer: buffer.as_ptr(),
            size: buffer.len() as u32,
        };
        self.events.push(HostEvent::Sysex(event, buffer));
    }

    pub(crate) fn push_raw_header(&mut self, header: clap_event_header) {
        self.events.push(HostEvent::Header(header));
    }

    pub(crate) fn raw(&self) -> clap_input_events {
        clap_input_events {
            ctx: self as *const Self as *mut c_void,
            size: Some(list_size),
            get: Some(list_get),
        }
    }
}

unsafe extern "C" fn list_size(list: *const clap_input_events) -> u32 {
    let this = &*((*list).ctx as *const HostEventList);
    this.events.len() as u32
}

unsafe extern "C" fn list_get(list: *const clap_input_events, index: u32) -> *const clap_event_header {
    let this = &*((*list).ctx as *const HostEventList);
    this.events
        .get(index as usize)
        .map_or(ptr::null(), HostEvent::header)
}

/// A host output queue that decodes whatever it accepts.
pub(crate) struct HostEventSink {
    accept: bool,
    events: Mutex<Vec<Event>>,
}

impl HostEventSink {
    pub(crate) fn accepting() -> Self {
        Self {
            accept: true,
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            accept: false,
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn raw(&mut self) -> clap_output_events {
        clap_output_events {
            ctx: self as *mut Self as *mut c_void,
            try_push: Some(sink_push),
        }
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

unsafe extern "C" fn sink_push(
    list: *const clap_output_events,
    event: *const clap_event_header,
) -> bool {
    let this = &*((*list).ctx as *const HostEventSink);
    if !this.accept {
        return false;
    }
    this.events.lock().push(decode_event(&*event));
    true
}

/// Collects what the plugin writes to a host `clap_ostream`.
#[derive(Default)]
pub(crate) struct HostOutputStream {
    bytes: Vec<u8>,
    failing: bool,
}

impl HostOutputStream {
    pub(crate) fn failing() -> Self {
        Self {
            bytes: Vec::new(),
            failing: true,
        }
    }

    pub(crate) fn raw(&mut self) -> clap_ostream {
        clap_ostream {
            ctx: self as *mut Self as *mut c_void,
            write: Some(ostream_write),
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

unsafe extern "C" fn ostream_write(
    stream: *const clap_ostream,
    buffer: *const c_void,
    size: u64,
) -> i64 {
    let this = &mut *((*stream).ctx as *mut HostOutputStream);
    if this.failing {
        return -1;
    }
    let data = std::slice::from_raw_parts(buffer as *const u8, size as usize);
    this.bytes.extend_from_slice(data);
    size as i64
}

/// Serves bytes to the plugin through a host `clap_istream`.
pub(crate) struct HostInputStream {
    data: Vec<u8>,
    position: usize,
    max_chunk: usize,
    failing: bool,
}

impl HostInputStream {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            position: 0,
            max_chunk: usize::MAX,
            failing: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    /// Return at most `max_chunk` bytes per read, like a host streaming from disk.
    pub(crate) fn max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    pub(crate) fn raw(&mut self) -> clap_istream {
        clap_istream {
            ctx: self as *mut Self as *mut c_void,
            read: Some(istream_read),
        }
    }
}

unsafe extern "C" fn istream_read(stream: *const clap_istream, buffer: *mut c_void, size: u64) -> i64 {
    let this = &mut *((*stream).ctx as *mut HostInputStream);
    if this.failing {
        return -1;
    }
    let remaining = &this.data[this.position..];
    let n = remaining.len().min(size as usize).min(this.max_chunk);
    ptr::copy_nonoverlapping(remaining.as_ptr(), buffer as *mut u8, n);
    this.position += n;
    n as i64
}

/// Host-owned audio port records and channel buffers.
pub(crate) struct AudioPorts {
    frames: usize,
    _f32: Vec<Vec<Vec<f32>>>,
    _f64: Vec<Vec<Vec<f64>>>,
    pointers32: Vec<Vec<*mut f32>>,
    pointers64: Vec<Vec<*mut f64>>,
    records: Vec<clap_audio_buffer>,
}

impl AudioPorts {
    pub(crate) fn f32(channel_counts: &[u32], frames: usize) -> Self {
        let mut data: Vec<Vec<Vec<f32>>> = channel_counts
            .iter()
            .map(|&count| vec![vec![0.0; frames]; count as usize])
            .collect();
        let mut pointers32: Vec<Vec<*mut f32>> = data
            .iter_mut()
            .map(|port| port.iter_mut().map(|c| c.as_mut_ptr()).collect())
            .collect();
        let records = pointers32
            .iter_mut()
            .map(|channels| clap_audio_buffer {
                data32: channels.as_mut_ptr(),
                data64: ptr::null_mut(),
                channel_count: channels.len() as u32,
                latency: 0,
                constant_mask: 0,
            })
            .collect();
        Self {
            frames,
            _f32: data,
            _f64: Vec::new(),
            pointers32,
            pointers64: Vec::new(),
            records,
        }
    }

    pub(crate) fn f64(channel_counts: &[u32], frames: usize) -> Self {
        let mut data: Vec<Vec<Vec<f64>>> = channel_counts
            .iter()
            .map(|&count| vec![vec![0.0; frames]; count as usize])
            .collect();
        let mut pointers64: Vec<Vec<*mut f64>> = data
            .iter_mut()
            .map(|port| port.iter_mut().map(|c| c.as_mut_ptr()).collect())
            .collect();
        let records = pointers64
            .iter_mut()
            .map(|channels| clap_audio_buffer {
                data32: ptr::null_mut(),
                data64: channels.as_mut_ptr(),
                channel_count: channels.len() as u32,
                latency: 0,
                constant_mask: 0,
            })
            .collect();
        Self {
            frames,
            _f32: Vec::new(),
            _f64: data,
            pointers32: Vec::new(),
            pointers64,
            records,
        }
    }

    /// Fill every f32 sample with `f(port, channel, frame)`.
    pub(crate) fn fill_with(&mut self, f: impl Fn(usize, usize, usize) -> f32) {
        for (port, channels) in self.pointers32.iter().enumerate() {
            for (channel, &data) in channels.iter().enumerate() {
                for frame in 0..self.frames {
                    unsafe { *data.add(frame) = f(port, channel, frame) };
                }
            }
        }
    }

    pub(crate) fn set_constant_mask(&mut self, port: usize, mask: u64) {
        self.records[port].constant_mask = mask;
    }

    pub(crate) fn as_ptr(&self) -> *const clap_audio_buffer {
        self.records.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut clap_audio_buffer {
        self.records.as_mut_ptr()
    }

    pub(crate) fn channel(&self, port: usize, channel: usize) -> &[f32] {
        unsafe { std::slice::from_raw_parts(self.pointers32[port][channel], self.frames) }
    }
}
