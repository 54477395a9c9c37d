//! Instance lifecycle and processing integration tests
//!
//! Pattern: create → init → activate → start → process blocks → stop →
//! deactivate, checking the state machine refuses out-of-order calls.

use crate::helpers::*;
use approx::assert_relative_eq;
use plugbridge::core::events::Note;
use plugbridge::core::{CoreError, Stage};
use plugbridge::prelude::*;
use plugbridge::HostInfo;
use plugbridge::{Event, HandleRegistry, LifecycleState};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;

#[test]
fn test_full_lifecycle() {
    let (handles, _tap) = demo_handles();
    let handle = handles.create(DEMO_ID, HostInfo::new("Host")).unwrap();
    let instance = handles.resolve(handle).unwrap();

    instance.init().unwrap();
    assert_eq!(instance.state(), LifecycleState::Initialized);

    instance.activate(TEST_SAMPLE_RATE, 32, 512).unwrap();
    assert_eq!(instance.state(), LifecycleState::Activated);
    let config = instance.audio_config().unwrap();
    assert_eq!(config.sample_rate, TEST_SAMPLE_RATE);
    assert_eq!((config.min_frames, config.max_frames), (32, 512));

    instance.start_processing().unwrap();
    assert_eq!(instance.state(), LifecycleState::Processing);
    instance.reset().unwrap();

    instance.stop_processing().unwrap();
    assert_eq!(instance.state(), LifecycleState::Activated);
    instance.deactivate().unwrap();
    assert_eq!(instance.state(), LifecycleState::Initialized);
    assert!(instance.audio_config().is_none());

    // Reactivation at another rate is allowed.
    instance.activate(44_100.0, 1, 64).unwrap();
    assert!(handles.release(handle));
    assert_eq!(instance.state(), LifecycleState::Destroyed);
}

#[test]
fn test_out_of_order_calls_are_refused() {
    let (handles, _tap) = demo_handles();
    let instance = handles
        .resolve(handles.create(DEMO_ID, HostInfo::new("Host")).unwrap())
        .unwrap();

    assert!(matches!(
        instance.activate(TEST_SAMPLE_RATE, 1, 256),
        Err(CoreError::InvalidLifecycle { state: LifecycleState::Created, .. })
    ));
    instance.init().unwrap();
    assert!(instance.init().is_err());
    assert!(instance.start_processing().is_err());
    assert!(instance.deactivate().is_err());

    instance.activate(TEST_SAMPLE_RATE, 1, 256).unwrap();
    assert!(instance.stop_processing().is_err());

    // Processing is refused until start_processing.
    let input = stereo_block();
    let mut output = outputs_like(&input);
    let (status, _) = run_block(&instance, &input, &mut output, Vec::new());
    assert_eq!(status, ProcessStatus::Error);
    assert_eq!(peak(&output[0]), 0.0);
}

#[test]
fn test_invalid_audio_config() {
    let (handles, _tap) = demo_handles();
    let instance = handles
        .resolve(handles.create(DEMO_ID, HostInfo::new("Host")).unwrap())
        .unwrap();
    instance.init().unwrap();

    for (rate, min, max) in [(0.0, 1, 256), (f64::NAN, 1, 256), (48_000.0, 1, 0), (48_000.0, 512, 256)] {
        assert!(matches!(
            instance.activate(rate, min, max),
            Err(CoreError::PluginFailed { stage: Stage::Activation, .. })
        ));
    }
    assert_eq!(instance.state(), LifecycleState::Initialized);
}

/// Unity gain passes audio through; parameter events change the gain
/// from the block they arrive in.
#[test]
fn test_process_applies_parameter_events() {
    let (handles, tap) = demo_handles();
    let (_, instance) = running_instance(&handles);
    let input = stereo_block();

    let mut output = outputs_like(&input);
    let (status, _) = run_block(&instance, &input, &mut output, Vec::new());
    assert_eq!(status, ProcessStatus::Continue);
    for (src, dst) in input.iter().zip(&output) {
        for (s, d) in src.iter().zip(dst) {
            assert_relative_eq!(*s, *d, epsilon = FLOAT_EPSILON);
        }
    }

    let mut output = outputs_like(&input);
    let events = vec![Event::param_value(0, GAIN, 0.25)];
    run_block(&instance, &input, &mut output, events);
    assert_relative_eq!(peak(&output[0]), peak(&input[0]) * 0.25, epsilon = FLOAT_EPSILON);

    // Half mix: 0.5 * 0.25 + 0.5 dry.
    let mut output = outputs_like(&input);
    run_block(&instance, &input, &mut output, vec![Event::param_value(0, MIX, 0.5)]);
    assert_relative_eq!(peak(&output[1]), peak(&input[1]) * 0.625, epsilon = FLOAT_EPSILON);

    assert_eq!(tap.blocks.load(Ordering::SeqCst), 3);
}

/// Note events are echoed to the output queue with their timing intact.
#[test]
fn test_note_events_pass_through() {
    let (handles, _tap) = demo_handles();
    let (_, instance) = running_instance(&handles);
    let input = stereo_block();
    let mut output = outputs_like(&input);

    let events = vec![
        Event::note_on(3, 60, 0.8),
        Event::param_value(4, GAIN, 0.5),
        Event::note_off(100, 60, 0.0),
    ];
    let (_, echoed) = run_block(&instance, &input, &mut output, events);

    assert_eq!(echoed.len(), 2);
    assert_eq!(echoed[0].time, 3);
    assert!(matches!(&echoed[0].kind, EventKind::NoteOn(Note { key: 60, .. })));
    assert_eq!(echoed[1].time, 100);
    assert!(matches!(&echoed[1].kind, EventKind::NoteOff(_)));
}

#[test]
fn test_on_main_thread_reaches_plugin() {
    let (handles, tap) = demo_handles();
    let (handle, instance) = running_instance(&handles);
    instance.on_main_thread();
    instance.on_main_thread();
    assert_eq!(tap.main_thread_calls.load(Ordering::SeqCst), 2);

    handles.release(handle);
    instance.on_main_thread();
    assert_eq!(tap.main_thread_calls.load(Ordering::SeqCst), 2);
}

struct Faulty;

impl Plugin for Faulty {
    fn init(&mut self, _ctx: &InitContext<'_>) -> plugbridge::core::Result<()> {
        Err(CoreError::InvalidConfig("no licence".to_string()))
    }

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> ProcessStatus {
        panic!("process is never reached")
    }
}

/// Plugin errors are reported against the lifecycle stage that failed.
#[test]
fn test_plugin_failure_reports_stage() {
    let handles = BridgeBuilder::new()
        .config(test_config())
        .plugin(PluginDescriptor::new("demo.faulty", "Faulty"), |_| {
            Ok(Box::new(Faulty))
        })
        .build_registry()
        .unwrap();
    let instance = handles
        .resolve(handles.create("demo.faulty", HostInfo::new("Host")).unwrap())
        .unwrap();

    let err = instance.init().unwrap_err();
    assert!(matches!(err, CoreError::PluginFailed { stage: Stage::Initialization, .. }));
    assert!(err.to_string().contains("no licence"));
    assert_eq!(instance.state(), LifecycleState::Created);
}

fn checked_handles() -> HandleRegistry {
    let tap = Arc::new(Tap::default());
    demo_builder(&tap)
        .config(test_config().thread_checks(true))
        .build_registry()
        .unwrap()
}

/// With checks on, audio-thread calls made from the main thread panic, and
/// the same calls from another thread go through.
#[test]
fn test_thread_checks() {
    let handles = checked_handles();
    let instance = handles
        .resolve(handles.create(DEMO_ID, HostInfo::new("Host")).unwrap())
        .unwrap();
    instance.init().unwrap();
    instance.activate(TEST_SAMPLE_RATE, 1, 256).unwrap();

    let on_main = catch_unwind(AssertUnwindSafe(|| instance.start_processing()));
    assert!(on_main.is_err());

    let input = stereo_block();
    let status = std::thread::scope(|s| {
        s.spawn(|| {
            instance.start_processing().unwrap();
            let mut output = outputs_like(&input);
            let (status, _) = run_block(&instance, &input, &mut output, Vec::new());

            // State I/O is main-thread only.
            let mut bytes = Vec::new();
            let save = catch_unwind(AssertUnwindSafe(|| instance.save_state(&mut bytes)));
            assert!(save.is_err());
            status
        })
        .join()
        .unwrap()
    });
    assert_eq!(status, ProcessStatus::Continue);

    let mut bytes = Vec::new();
    instance.save_state(&mut bytes).unwrap();
    assert!(!bytes.is_empty());
}

#[test]
fn test_thread_context_detection() {
    use plugbridge::core::{ThreadChecker, ThreadContext};

    let checker = ThreadChecker::new(true);
    assert_eq!(checker.current(), ThreadContext::Unknown);
    checker.mark_main_thread();
    assert_eq!(checker.current(), ThreadContext::Main);

    {
        let _audio = plugbridge::core::thread_check::audio_scope();
        assert_eq!(checker.current(), ThreadContext::Audio);
    }

    let elsewhere = std::thread::scope(|s| s.spawn(|| checker.current()).join().unwrap());
    assert_eq!(elsewhere, ThreadContext::Unknown);
}
