//! Borrowed per-port channel views for one process call.

use smallvec::SmallVec;

/// Channel lists stay inline up to this many channels per port.
pub const INLINE_CHANNELS: usize = 8;

pub type ChannelList<'a, T> = SmallVec<[&'a [T]; INLINE_CHANNELS]>;
pub type ChannelListMut<'a, T> = SmallVec<[&'a mut [T]; INLINE_CHANNELS]>;

/// Input channels of one port, in whichever sample width the host supplied.
#[derive(Debug)]
pub enum InputChannels<'a> {
    F32(ChannelList<'a, f32>),
    F64(ChannelList<'a, f64>),
}

#[derive(Debug)]
pub enum OutputChannels<'a> {
    F32(ChannelListMut<'a, f32>),
    F64(ChannelListMut<'a, f64>),
}

#[derive(Debug)]
pub struct InputPort<'a> {
    pub channels: InputChannels<'a>,
    /// Bit `n` set means channel `n` holds a constant value for the whole block.
    pub constant_mask: u64,
    pub latency: u32,
}

#[derive(Debug)]
pub struct OutputPort<'a> {
    pub channels: OutputChannels<'a>,
    pub constant_mask: u64,
    pub latency: u32,
}

impl<'a> InputPort<'a> {
    pub fn f32(channels: ChannelList<'a, f32>) -> Self {
        Self {
            channels: InputChannels::F32(channels),
            constant_mask: 0,
            latency: 0,
        }
    }

    pub fn f64(channels: ChannelList<'a, f64>) -> Self {
        Self {
            channels: InputChannels::F64(channels),
            constant_mask: 0,
            latency: 0,
        }
    }

    pub fn empty() -> Self {
        Self::f32(SmallVec::new())
    }

    pub fn channel_count(&self) -> usize {
        match &self.channels {
            InputChannels::F32(c) => c.len(),
            InputChannels::F64(c) => c.len(),
        }
    }

    pub fn as_f32(&self) -> Option<&[&'a [f32]]> {
        match &self.channels {
            InputChannels::F32(c) => Some(c),
            InputChannels::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[&'a [f64]]> {
        match &self.channels {
            InputChannels::F64(c) => Some(c),
            InputChannels::F32(_) => None,
        }
    }

    pub fn is_constant(&self, channel: usize) -> bool {
        channel < 64 && self.constant_mask & (1 << channel) != 0
    }
}

impl<'a> OutputPort<'a> {
    pub fn f32(channels: ChannelListMut<'a, f32>) -> Self {
        Self {
            channels: OutputChannels::F32(channels),
            constant_mask: 0,
            latency: 0,
        }
    }

    pub fn f64(channels: ChannelListMut<'a, f64>) -> Self {
        Self {
            channels: OutputChannels::F64(channels),
            constant_mask: 0,
            latency: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        match &self.channels {
            OutputChannels::F32(c) => c.len(),
            OutputChannels::F64(c) => c.len(),
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [&'a mut [f32]]> {
        match &mut self.channels {
            OutputChannels::F32(c) => Some(c),
            OutputChannels::F64(_) => None,
        }
    }

    pub fn as_f64_mut(&mut self) -> Option<&mut [&'a mut [f64]]> {
        match &mut self.channels {
            OutputChannels::F64(c) => Some(c),
            OutputChannels::F32(_) => None,
        }
    }

    /// Zero every channel.
    pub fn silence(&mut self) {
        match &mut self.channels {
            OutputChannels::F32(c) => c.iter_mut().for_each(|ch| ch.fill(0.0)),
            OutputChannels::F64(c) => c.iter_mut().for_each(|ch| ch.fill(0.0)),
        }
        self.constant_mask = u64::MAX;
    }
}
