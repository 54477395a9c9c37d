//! CLAP event queues seen through the bridge's event views.
//!
//! Input events are decoded one at a time through the host's `size`/`get`
//! accessors; nothing is copied up front. Output events are encoded into the
//! matching CLAP struct on the stack and handed to the host's `try_push`.

use clap_sys::events::{
    clap_event_header, clap_event_midi, clap_event_midi2, clap_event_midi_sysex, clap_event_note,
    clap_event_note_expression, clap_event_param_gesture, clap_event_param_mod,
    clap_event_param_value, clap_event_transport, clap_input_events, clap_output_events,
    CLAP_CORE_EVENT_SPACE_ID, CLAP_EVENT_MIDI, CLAP_EVENT_MIDI2, CLAP_EVENT_MIDI_SYSEX,
    CLAP_EVENT_NOTE_CHOKE, CLAP_EVENT_NOTE_END, CLAP_EVENT_NOTE_EXPRESSION, CLAP_EVENT_NOTE_OFF,
    CLAP_EVENT_NOTE_ON, CLAP_EVENT_PARAM_GESTURE_BEGIN, CLAP_EVENT_PARAM_GESTURE_END,
    CLAP_EVENT_PARAM_MOD, CLAP_EVENT_PARAM_VALUE, CLAP_EVENT_TRANSPORT,
};
use plugbridge_core::events::{
    Note, NoteExpression, ParamTarget, SysexData, Transport, MAX_SYSEX_LEN,
};
use plugbridge_core::{Event, EventFlags, EventKind, InputEvents, OutputEvents};
use std::ffi::c_void;
use std::mem::size_of;
use std::slice;

/// The payload behind `header`, or `None` when the host declared a smaller event.
unsafe fn payload<T>(header: &clap_event_header) -> Option<&T> {
    if (header.size as usize) < size_of::<T>() {
        return None;
    }
    Some(&*(header as *const clap_event_header as *const T))
}

fn note(e: &clap_event_note) -> Note {
    Note {
        note_id: e.note_id,
        port_index: e.port_index,
        channel: e.channel,
        key: e.key,
        velocity: e.velocity,
    }
}

fn param_target(
    param_id: u32,
    cookie: *mut c_void,
    note_id: i32,
    port_index: i16,
    channel: i16,
    key: i16,
) -> ParamTarget {
    ParamTarget {
        param_id,
        cookie: cookie as usize,
        note_id,
        port_index,
        channel,
        key,
    }
}

pub(crate) fn transport_from_clap(e: &clap_event_transport) -> Transport {
    Transport {
        flags: e.flags,
        song_pos_beats: e.song_pos_beats,
        song_pos_seconds: e.song_pos_seconds,
        tempo: e.tempo,
        tempo_inc: e.tempo_inc,
        loop_start_beats: e.loop_start_beats,
        loop_end_beats: e.loop_end_beats,
        loop_start_seconds: e.loop_start_seconds,
        loop_end_seconds: e.loop_end_seconds,
        bar_start: e.bar_start,
        bar_number: e.bar_number,
        tsig_num: e.tsig_num,
        tsig_denom: e.tsig_denom,
    }
}

/// Decode one host event. The tag is read first; unknown or truncated events
/// come back as [`EventKind::Unknown`] with their time and flags intact.
///
/// # Safety
///
/// `header` must be the header of an event at least `header.size` bytes long.
pub unsafe fn decode_event(header: &clap_event_header) -> Event {
    let unknown = || EventKind::Unknown {
        space_id: header.space_id,
        type_id: header.type_,
    };

    let kind = if header.space_id != CLAP_CORE_EVENT_SPACE_ID {
        None
    } else {
        match header.type_ {
            CLAP_EVENT_NOTE_ON => {
                payload::<clap_event_note>(header).map(|e| EventKind::NoteOn(note(e)))
            }
            CLAP_EVENT_NOTE_OFF => {
                payload::<clap_event_note>(header).map(|e| EventKind::NoteOff(note(e)))
            }
            CLAP_EVENT_NOTE_CHOKE => {
                payload::<clap_event_note>(header).map(|e| EventKind::NoteChoke(note(e)))
            }
            CLAP_EVENT_NOTE_END => {
                payload::<clap_event_note>(header).map(|e| EventKind::NoteEnd(note(e)))
            }
            CLAP_EVENT_NOTE_EXPRESSION => {
                payload::<clap_event_note_expression>(header).map(|e| EventKind::NoteExpression {
                    expression: NoteExpression::from_id(e.expression_id),
                    note_id: e.note_id,
                    port_index: e.port_index,
                    channel: e.channel,
                    key: e.key,
                    value: e.value,
                })
            }
            CLAP_EVENT_PARAM_VALUE => {
                payload::<clap_event_param_value>(header).map(|e| EventKind::ParamValue {
                    target: param_target(
                        e.param_id,
                        e.cookie,
                        e.note_id,
                        e.port_index,
                        e.channel,
                        e.key,
                    ),
                    value: e.value,
                })
            }
            CLAP_EVENT_PARAM_MOD => {
                payload::<clap_event_param_mod>(header).map(|e| EventKind::ParamMod {
                    target: param_target(
                        e.param_id,
                        e.cookie,
                        e.note_id,
                        e.port_index,
                        e.channel,
                        e.key,
                    ),
                    amount: e.amount,
                })
            }
            CLAP_EVENT_PARAM_GESTURE_BEGIN => payload::<clap_event_param_gesture>(header)
                .map(|e| EventKind::ParamGestureBegin {
                    param_id: e.param_id,
                }),
            CLAP_EVENT_PARAM_GESTURE_END => payload::<clap_event_param_gesture>(header)
                .map(|e| EventKind::ParamGestureEnd {
                    param_id: e.param_id,
                }),
            CLAP_EVENT_TRANSPORT => payload::<clap_event_transport>(header)
                .map(|e| EventKind::Transport(transport_from_clap(e))),
            CLAP_EVENT_MIDI => payload::<clap_event_midi>(header).map(|e| EventKind::Midi {
                port_index: e.port_index,
                data: e.data,
            }),
            // Messages too long for inline storage decode as unknown.
            CLAP_EVENT_MIDI_SYSEX => payload::<clap_event_midi_sysex>(header).and_then(|e| {
                let bytes = if e.buffer.is_null() || e.size == 0 {
                    &[][..]
                } else {
                    slice::from_raw_parts(e.buffer, e.size as usize)
                };
                (bytes.len() <= MAX_SYSEX_LEN).then(|| EventKind::MidiSysex {
                    port_index: e.port_index,
                    data: SysexData::from_slice(bytes),
                })
            }),
            CLAP_EVENT_MIDI2 => payload::<clap_event_midi2>(header).map(|e| EventKind::Midi2 {
                port_index: e.port_index,
                data: e.data,
            }),
            _ => None,
        }
    };

    Event {
        time: header.time,
        flags: EventFlags::from_bits(header.flags),
        kind: kind.unwrap_or_else(unknown),
    }
}

/// The host's input queue for one process call.
pub struct ClapInputEvents<'a> {
    list: Option<&'a clap_input_events>,
}

impl<'a> ClapInputEvents<'a> {
    /// A null queue reads as empty.
    ///
    /// # Safety
    ///
    /// `list` must be null or valid for `'a`.
    pub unsafe fn new(list: *const clap_input_events) -> Self {
        Self {
            list: list.as_ref(),
        }
    }
}

impl InputEvents for ClapInputEvents<'_> {
    fn len(&self) -> u32 {
        match self.list {
            Some(list) => match list.size {
                Some(size) => unsafe { size(list) },
                None => 0,
            },
            None => 0,
        }
    }

    fn get(&self, index: u32) -> Option<Event> {
        let list = self.list?;
        let get = list.get?;
        let header = unsafe { get(list, index) };
        if header.is_null() {
            return None;
        }
        Some(unsafe { decode_event(&*header) })
    }
}

/// The host's output queue for one process call.
pub struct ClapOutputEvents<'a> {
    list: Option<&'a clap_output_events>,
    dropped: u32,
}

impl<'a> ClapOutputEvents<'a> {
    /// A null queue refuses every event.
    ///
    /// # Safety
    ///
    /// `list` must be null or valid for `'a`.
    pub unsafe fn new(list: *const clap_output_events) -> Self {
        Self {
            list: list.as_ref(),
            dropped: 0,
        }
    }

    /// Events the host refused or that have no CLAP encoding.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

fn header<T>(event: &Event, type_: u16) -> clap_event_header {
    clap_event_header {
        size: size_of::<T>() as u32,
        time: event.time,
        space_id: CLAP_CORE_EVENT_SPACE_ID,
        type_,
        flags: event.flags.bits(),
    }
}

fn note_event(event: &Event, type_: u16, n: &Note) -> clap_event_note {
    clap_event_note {
        header: header::<clap_event_note>(event, type_),
        note_id: n.note_id,
        port_index: n.port_index,
        channel: n.channel,
        key: n.key,
        velocity: n.velocity,
    }
}

impl OutputEvents for ClapOutputEvents<'_> {
    fn try_push(&mut self, event: &Event) -> bool {
        let Some(list) = self.list else {
            self.dropped += 1;
            return false;
        };
        let Some(try_push) = list.try_push else {
            self.dropped += 1;
            return false;
        };

        // Every CLAP event struct starts with its header.
        let push = |raw: *const clap_event_header| unsafe { try_push(list, raw) };
        fn raw<T>(event: &T) -> *const clap_event_header {
            event as *const T as *const clap_event_header
        }

        let pushed = match &event.kind {
            EventKind::NoteOn(n) => push(raw(&note_event(event, CLAP_EVENT_NOTE_ON, n))),
            EventKind::NoteOff(n) => push(raw(&note_event(event, CLAP_EVENT_NOTE_OFF, n))),
            EventKind::NoteChoke(n) => push(raw(&note_event(event, CLAP_EVENT_NOTE_CHOKE, n))),
            EventKind::NoteEnd(n) => push(raw(&note_event(event, CLAP_EVENT_NOTE_END, n))),
            EventKind::NoteExpression {
                expression,
                note_id,
                port_index,
                channel,
                key,
                value,
            } => push(raw(&clap_event_note_expression {
                header: header::<clap_event_note_expression>(event, CLAP_EVENT_NOTE_EXPRESSION),
                expression_id: expression.id(),
                note_id: *note_id,
                port_index: *port_index,
                channel: *channel,
                key: *key,
                value: *value,
            })),
            EventKind::ParamValue { target, value } => push(raw(&clap_event_param_value {
                header: header::<clap_event_param_value>(event, CLAP_EVENT_PARAM_VALUE),
                param_id: target.param_id,
                cookie: target.cookie as *mut c_void,
                note_id: target.note_id,
                port_index: target.port_index,
                channel: target.channel,
                key: target.key,
                value: *value,
            })),
            EventKind::ParamMod { target, amount } => push(raw(&clap_event_param_mod {
                header: header::<clap_event_param_mod>(event, CLAP_EVENT_PARAM_MOD),
                param_id: target.param_id,
                cookie: target.cookie as *mut c_void,
                note_id: target.note_id,
                port_index: target.port_index,
                channel: target.channel,
                key: target.key,
                amount: *amount,
            })),
            EventKind::ParamGestureBegin { param_id } => push(raw(&clap_event_param_gesture {
                header: header::<clap_event_param_gesture>(event, CLAP_EVENT_PARAM_GESTURE_BEGIN),
                param_id: *param_id,
            })),
            EventKind::ParamGestureEnd { param_id } => push(raw(&clap_event_param_gesture {
                header: header::<clap_event_param_gesture>(event, CLAP_EVENT_PARAM_GESTURE_END),
                param_id: *param_id,
            })),
            EventKind::Transport(t) => push(raw(&clap_event_transport {
                header: header::<clap_event_transport>(event, CLAP_EVENT_TRANSPORT),
                flags: t.flags,
                song_pos_beats: t.song_pos_beats,
                song_pos_seconds: t.song_pos_seconds,
                tempo: t.tempo,
                tempo_inc: t.tempo_inc,
                loop_start_beats: t.loop_start_beats,
                loop_end_beats: t.loop_end_beats,
                loop_start_seconds: t.loop_start_seconds,
                loop_end_seconds: t.loop_end_seconds,
                bar_start: t.bar_start,
                bar_number: t.bar_number,
                tsig_num: t.tsig_num,
                tsig_denom: t.tsig_denom,
            })),
            EventKind::Midi { port_index, data } => push(raw(&clap_event_midi {
                header: header::<clap_event_midi>(event, CLAP_EVENT_MIDI),
                port_index: *port_index,
                data: *data,
            })),
            // The host copies the buffer before try_push returns.
            EventKind::MidiSysex { port_index, data } => push(raw(&clap_event_midi_sysex {
                header: header::<clap_event_midi_sysex>(event, CLAP_EVENT_MIDI_SYSEX),
                port_index: *port_index,
                buffer: data.as_ptr(),
                size: data.len() as u32,
            })),
            EventKind::Midi2 { port_index, data } => push(raw(&clap_event_midi2 {
                header: header::<clap_event_midi2>(event, CLAP_EVENT_MIDI2),
                port_index: *port_index,
                data: *data,
            })),
            EventKind::Unknown { .. } => false,
        };

        if !pushed {
            self.dropped += 1;
        }
        pushed
    }
}
