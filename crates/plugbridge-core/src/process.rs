//! Process call context and status.

use crate::audio::{InputPort, OutputPort};
use crate::events::{Event, InputEvents, OutputEvents, Transport};
use smallvec::SmallVec;

pub type InputPorts<'a> = SmallVec<[InputPort<'a>; 2]>;
pub type OutputPorts<'a> = SmallVec<[OutputPort<'a>; 2]>;

/// Result of one process call. Discriminants match the CLAP status codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Error = 0,
    Continue = 1,
    ContinueIfNotQuiet = 2,
    Tail = 3,
    Sleep = 4,
}

impl ProcessStatus {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ProcessStatus::Error),
            1 => Some(ProcessStatus::Continue),
            2 => Some(ProcessStatus::ContinueIfNotQuiet),
            3 => Some(ProcessStatus::Tail),
            4 => Some(ProcessStatus::Sleep),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// Borrowed view of one process call.
///
/// Input and output channels never alias: when the host processes in place
/// the inputs point at a scratch copy.
pub struct ProcessContext<'a> {
    /// `None` when the host has no steady clock.
    pub steady_time: Option<u64>,
    pub frames: u32,
    pub transport: Option<Transport>,
    pub inputs: InputPorts<'a>,
    pub outputs: OutputPorts<'a>,
    pub in_events: &'a dyn InputEvents,
    pub out_events: &'a mut dyn OutputEvents,
}

impl<'a> ProcessContext<'a> {
    pub fn new(
        frames: u32,
        in_events: &'a dyn InputEvents,
        out_events: &'a mut dyn OutputEvents,
    ) -> Self {
        Self {
            steady_time: None,
            frames,
            transport: None,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            in_events,
            out_events,
        }
    }

    pub fn steady_time(mut self, time: u64) -> Self {
        self.steady_time = Some(time);
        self
    }

    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn input(mut self, port: InputPort<'a>) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: OutputPort<'a>) -> Self {
        self.outputs.push(port);
        self
    }

    /// Inputs and outputs at once, for plugins reading one while writing the other.
    pub fn io(&mut self) -> (&[InputPort<'a>], &mut [OutputPort<'a>]) {
        (&self.inputs, &mut self.outputs)
    }

    /// `false` when the host refused the event.
    pub fn push_event(&mut self, event: &Event) -> bool {
        self.out_events.try_push(event)
    }
}
