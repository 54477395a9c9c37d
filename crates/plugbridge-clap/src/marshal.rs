//! Builds a [`ProcessContext`] over one `clap_process`.
//!
//! Port records are a contiguous array of `clap_audio_buffer` and are read as
//! a slice of records, never through a second indirection. Channel
//! samples are borrowed in place. The only copy happens when the host
//! processes in place: an input channel sharing memory with an output channel
//! is copied into preallocated scratch first, so the views never alias.

use crate::events::transport_from_clap;
use clap_sys::audio_buffer::clap_audio_buffer;
use clap_sys::process::clap_process;
use plugbridge_core::audio::{ChannelList, ChannelListMut};
use plugbridge_core::{
    InputEvents, InputPort, InputPorts, OutputEvents, OutputPort, OutputPorts, ProcessContext,
};
use std::{mem, slice};
use tracing::debug;

/// Copy-aside space for in-place channels, sized at activation.
#[derive(Debug, Default)]
pub struct Scratch {
    f32: Vec<f32>,
    f64: Vec<f64>,
    /// Output channel addresses of the current block.
    addresses: Vec<usize>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room for `channels` channels of `frames` samples in either width.
    pub fn reserve(&mut self, channels: usize, frames: usize) {
        let len = channels.saturating_mul(frames);
        if self.f32.len() < len {
            self.f32.resize(len, 0.0);
        }
        if self.f64.len() < len {
            self.f64.resize(len, 0.0);
        }
        self.addresses.reserve(channels.saturating_sub(self.addresses.len()));
    }

    pub fn capacity_samples(&self) -> usize {
        self.f32.len().min(self.f64.len())
    }
}

/// Hands out disjoint chunks of a scratch slice.
struct Carver<'a, T> {
    rest: &'a mut [T],
}

impl<'a, T: Copy> Carver<'a, T> {
    fn copy_of(&mut self, source: &[T]) -> Option<&'a [T]> {
        if self.rest.len() < source.len() {
            return None;
        }
        let (chunk, rest) = mem::take(&mut self.rest).split_at_mut(source.len());
        self.rest = rest;
        chunk.copy_from_slice(source);
        Some(chunk)
    }
}

/// Channel pointers of one port, or an empty iterator when the array is null.
unsafe fn channel_ptrs<T>(data: *mut *mut T, count: u32) -> impl Iterator<Item = *mut T> {
    let count = if data.is_null() { 0 } else { count as usize };
    (0..count).map(move |c| *data.add(c))
}

unsafe fn ports<'p>(base: *const clap_audio_buffer, count: u32) -> &'p [clap_audio_buffer] {
    if base.is_null() || count == 0 {
        &[]
    } else {
        slice::from_raw_parts(base, count as usize)
    }
}

/// Refill `addresses` with this block's non-null output channel pointers.
unsafe fn output_addresses(outputs: &[clap_audio_buffer], addresses: &mut Vec<usize>) {
    addresses.clear();
    for port in outputs {
        if !port.data32.is_null() {
            let channels = channel_ptrs(port.data32, port.channel_count);
            addresses.extend(channels.map(|p| p as usize));
        } else if !port.data64.is_null() {
            let channels = channel_ptrs(port.data64, port.channel_count);
            addresses.extend(channels.map(|p| p as usize));
        }
    }
    addresses.retain(|&p| p != 0);
}

/// Input channels that share memory with an output channel.
unsafe fn aliased_channels(inputs: &[clap_audio_buffer], outputs: &[usize]) -> usize {
    let aliased = |p: usize| p != 0 && outputs.contains(&p);
    inputs
        .iter()
        .map(|port| {
            if !port.data32.is_null() {
                channel_ptrs(port.data32, port.channel_count)
                    .filter(|&p| aliased(p as usize))
                    .count()
            } else {
                channel_ptrs(port.data64, port.channel_count)
                    .filter(|&p| aliased(p as usize))
                    .count()
            }
        })
        .sum()
}

unsafe fn input_channel<'a, T: Copy>(
    ptr: *mut T,
    frames: usize,
    outputs: &[usize],
    scratch: &mut Carver<'a, T>,
) -> &'a [T] {
    if ptr.is_null() {
        return &[];
    }
    let samples = slice::from_raw_parts(ptr as *const T, frames);
    if !outputs.contains(&(ptr as usize)) {
        return samples;
    }
    // Scratch is sized before marshaling, so this only misses if that failed.
    scratch.copy_of(samples).unwrap_or(&[])
}

unsafe fn input_port<'a>(
    port: &clap_audio_buffer,
    frames: usize,
    outputs: &[usize],
    scratch32: &mut Carver<'a, f32>,
    scratch64: &mut Carver<'a, f64>,
) -> InputPort<'a> {
    let mut view = if !port.data32.is_null() {
        let channels: ChannelList<'a, f32> = channel_ptrs(port.data32, port.channel_count)
            .map(|p| input_channel(p, frames, outputs, scratch32))
            .collect();
        InputPort::f32(channels)
    } else if !port.data64.is_null() {
        let channels: ChannelList<'a, f64> = channel_ptrs(port.data64, port.channel_count)
            .map(|p| input_channel(p, frames, outputs, scratch64))
            .collect();
        InputPort::f64(channels)
    } else {
        InputPort::empty()
    };
    view.constant_mask = port.constant_mask;
    view.latency = port.latency;
    view
}

unsafe fn output_channel<'a, T>(ptr: *mut T, frames: usize) -> &'a mut [T] {
    if ptr.is_null() {
        &mut []
    } else {
        slice::from_raw_parts_mut(ptr, frames)
    }
}

unsafe fn output_port<'a>(port: &clap_audio_buffer, frames: usize) -> OutputPort<'a> {
    let mut view = if !port.data32.is_null() {
        let channels: ChannelListMut<'a, f32> = channel_ptrs(port.data32, port.channel_count)
            .map(|p| output_channel(p, frames))
            .collect();
        OutputPort::f32(channels)
    } else {
        let channels: ChannelListMut<'a, f64> = channel_ptrs(port.data64, port.channel_count)
            .map(|p| output_channel(p, frames))
            .collect();
        OutputPort::f64(channels)
    };
    view.constant_mask = port.constant_mask;
    view.latency = port.latency;
    view
}

/// Borrow one process call's buffers and events.
///
/// Null port arrays yield no ports, null channel arrays yield ports without
/// channels and a negative steady time is reported as `None`.
///
/// # Safety
///
/// Every non-null pointer reachable from `process` must be valid for `'a` as
/// described by the CLAP ABI, with `frames_count` samples per channel, and no
/// two output channels may share memory.
pub unsafe fn process_context<'a>(
    process: &'a clap_process,
    scratch: &'a mut Scratch,
    in_events: &'a dyn InputEvents,
    out_events: &'a mut dyn OutputEvents,
) -> ProcessContext<'a> {
    let frames = process.frames_count as usize;
    let inputs = ports(process.audio_inputs, process.audio_inputs_count);
    let outputs = ports(process.audio_outputs, process.audio_outputs_count);

    let reserved = scratch.addresses.capacity();
    output_addresses(outputs, &mut scratch.addresses);
    if scratch.addresses.capacity() != reserved {
        debug!(
            channels = scratch.addresses.len(),
            "Growing output address table beyond activation size"
        );
    }
    let aliased = aliased_channels(inputs, &scratch.addresses);
    if aliased * frames > scratch.capacity_samples() {
        debug!(aliased, frames, "Growing in-place scratch beyond activation size");
        scratch.reserve(aliased, frames);
    }

    let Scratch {
        f32,
        f64,
        addresses,
    } = scratch;
    let mut scratch32 = Carver {
        rest: f32.as_mut_slice(),
    };
    let mut scratch64 = Carver {
        rest: f64.as_mut_slice(),
    };

    // Inputs first: in-place channels are copied out before any output
    // slice over the same memory exists.
    let input_views: InputPorts<'a> = inputs
        .iter()
        .map(|port| {
            input_port(port, frames, addresses.as_slice(), &mut scratch32, &mut scratch64)
        })
        .collect();
    let output_views: OutputPorts<'a> = outputs
        .iter()
        .map(|port| output_port(port, frames))
        .collect();

    let mut ctx = ProcessContext::new(process.frames_count, in_events, out_events);
    ctx.steady_time = u64::try_from(process.steady_time).ok();
    ctx.transport = process.transport.as_ref().map(transport_from_clap);
    ctx.inputs = input_views;
    ctx.outputs = output_views;
    ctx
}
