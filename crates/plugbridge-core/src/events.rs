//! Timed events exchanged with the host during a process call.
//!
//! Input events are read through [`InputEvents`], which the ABI layer
//! implements lazily over the host's queue so nothing is copied up front.
//! Output events are handed to an [`OutputEvents`] sink.

use smallvec::SmallVec;

/// Longest sysex message carried by [`EventKind::MidiSysex`].
pub const MAX_SYSEX_LEN: usize = 256;

/// Sysex bytes, stored inline up to [`MAX_SYSEX_LEN`].
pub type SysexData = SmallVec<[u8; MAX_SYSEX_LEN]>;

/// Event flag bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventFlags(u32);

impl EventFlags {
    /// Produced by a live user action rather than playback.
    pub const IS_LIVE: u32 = 1 << 0;
    /// Should not be recorded.
    pub const DONT_RECORD: u32 = 1 << 1;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_live(self) -> bool {
        self.0 & Self::IS_LIVE != 0
    }

    pub fn dont_record(self) -> bool {
        self.0 & Self::DONT_RECORD != 0
    }
}

/// Note payload shared by note on/off/choke/end.
///
/// `-1` in `note_id`, `port_index`, `channel` or `key` is a wildcard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub note_id: i32,
    pub port_index: i16,
    pub channel: i16,
    pub key: i16,
    pub velocity: f64,
}

impl Note {
    pub fn new(key: i16, velocity: f64) -> Self {
        Self {
            note_id: -1,
            port_index: 0,
            channel: 0,
            key,
            velocity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteExpression {
    Volume,
    Pan,
    Tuning,
    Vibrato,
    Expression,
    Brightness,
    Pressure,
    Other(i32),
}

impl NoteExpression {
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => NoteExpression::Volume,
            1 => NoteExpression::Pan,
            2 => NoteExpression::Tuning,
            3 => NoteExpression::Vibrato,
            4 => NoteExpression::Expression,
            5 => NoteExpression::Brightness,
            6 => NoteExpression::Pressure,
            other => NoteExpression::Other(other),
        }
    }

    pub fn id(self) -> i32 {
        match self {
            NoteExpression::Volume => 0,
            NoteExpression::Pan => 1,
            NoteExpression::Tuning => 2,
            NoteExpression::Vibrato => 3,
            NoteExpression::Expression => 4,
            NoteExpression::Brightness => 5,
            NoteExpression::Pressure => 6,
            NoteExpression::Other(id) => id,
        }
    }
}

/// Target of a parameter event. Wildcards are `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamTarget {
    pub param_id: u32,
    /// Opaque host cookie, passed back untouched.
    pub cookie: usize,
    pub note_id: i32,
    pub port_index: i16,
    pub channel: i16,
    pub key: i16,
}

impl ParamTarget {
    pub fn global(param_id: u32) -> Self {
        Self {
            param_id,
            cookie: 0,
            note_id: -1,
            port_index: -1,
            channel: -1,
            key: -1,
        }
    }
}

/// Transport snapshot. Beat and second positions are fixed point as in the ABI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transport {
    pub flags: u32,
    pub song_pos_beats: i64,
    pub song_pos_seconds: i64,
    pub tempo: f64,
    pub tempo_inc: f64,
    pub loop_start_beats: i64,
    pub loop_end_beats: i64,
    pub loop_start_seconds: i64,
    pub loop_end_seconds: i64,
    pub bar_start: i64,
    pub bar_number: i32,
    pub tsig_num: u16,
    pub tsig_denom: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    NoteOn(Note),
    NoteOff(Note),
    NoteChoke(Note),
    NoteEnd(Note),
    NoteExpression {
        expression: NoteExpression,
        note_id: i32,
        port_index: i16,
        channel: i16,
        key: i16,
        value: f64,
    },
    ParamValue {
        target: ParamTarget,
        value: f64,
    },
    ParamMod {
        target: ParamTarget,
        amount: f64,
    },
    ParamGestureBegin {
        param_id: u32,
    },
    ParamGestureEnd {
        param_id: u32,
    },
    Transport(Transport),
    Midi {
        port_index: u16,
        data: [u8; 3],
    },
    /// Bytes are copied out of the host buffer into inline storage.
    MidiSysex {
        port_index: u16,
        data: SysexData,
    },
    Midi2 {
        port_index: u16,
        data: [u32; 4],
    },
    /// An event this bridge cannot decode, kept so nothing is silently lost.
    Unknown {
        space_id: u16,
        type_id: u16,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Sample offset within the current block.
    pub time: u32,
    pub flags: EventFlags,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: u32, kind: EventKind) -> Self {
        Self {
            time,
            flags: EventFlags::default(),
            kind,
        }
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn param_value(time: u32, param_id: u32, value: f64) -> Self {
        Self::new(
            time,
            EventKind::ParamValue {
                target: ParamTarget::global(param_id),
                value,
            },
        )
    }

    pub fn note_on(time: u32, key: i16, velocity: f64) -> Self {
        Self::new(time, EventKind::NoteOn(Note::new(key, velocity)))
    }

    pub fn note_off(time: u32, key: i16, velocity: f64) -> Self {
        Self::new(time, EventKind::NoteOff(Note::new(key, velocity)))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, EventKind::Unknown { .. })
    }
}

/// Read access to one process call's input events.
pub trait InputEvents {
    fn len(&self) -> u32;

    /// `None` for an out-of-range index or an entry the host failed to provide.
    fn get(&self, index: u32) -> Option<Event>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'e> dyn InputEvents + 'e {
    pub fn iter(&self) -> InputEventsIter<'_, 'e> {
        InputEventsIter {
            events: self,
            index: 0,
            len: self.len(),
        }
    }
}

pub struct InputEventsIter<'a, 'e> {
    events: &'a (dyn InputEvents + 'e),
    index: u32,
    len: u32,
}

impl Iterator for InputEventsIter<'_, '_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        while self.index < self.len {
            let index = self.index;
            self.index += 1;
            if let Some(event) = self.events.get(index) {
                return Some(event);
            }
        }
        None
    }
}

impl InputEvents for [Event] {
    fn len(&self) -> u32 {
        <[Event]>::len(self) as u32
    }

    fn get(&self, index: u32) -> Option<Event> {
        <[Event]>::get(self, index as usize).cloned()
    }
}

impl InputEvents for Vec<Event> {
    fn len(&self) -> u32 {
        self.as_slice().len() as u32
    }

    fn get(&self, index: u32) -> Option<Event> {
        self.as_slice().get(index as usize).cloned()
    }
}

/// Queue standing in for a missing host queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl InputEvents for NoEvents {
    fn len(&self) -> u32 {
        0
    }

    fn get(&self, _index: u32) -> Option<Event> {
        None
    }
}

/// Destination for events the plugin produces.
pub trait OutputEvents {
    /// `false` when the event was not accepted.
    fn try_push(&mut self, event: &Event) -> bool;
}

impl OutputEvents for Vec<Event> {
    fn try_push(&mut self, event: &Event) -> bool {
        self.push(event.clone());
        true
    }
}

impl OutputEvents for NoEvents {
    fn try_push(&mut self, _event: &Event) -> bool {
        false
    }
}
