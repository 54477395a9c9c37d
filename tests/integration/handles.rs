//! Handle registry integration tests
//!
//! Handles are opaque generation-checked tokens: stale handles must never
//! reach whichever instance later occupies the same slot.

use crate::helpers::*;
use plugbridge::prelude::*;
use plugbridge::HostInfo;
use plugbridge::{Handle, LifecycleState};
use proptest::prelude::*;

#[test]
fn test_create_resolve_release() {
    let (handles, _tap) = demo_handles();
    let host = HostInfo::new("Test Host");

    let a = handles.create(DEMO_ID, host.clone()).unwrap();
    let b = handles.create(DEMO_ID, host.clone()).unwrap();
    assert_ne!(a, b);
    assert_ne!(a.raw(), 0);
    assert_eq!(handles.len(), 2);

    let instance = handles.resolve(a).unwrap();
    assert_eq!(instance.descriptor().id, DEMO_ID);
    assert_eq!(instance.host().name, "Test Host");
    assert_eq!(instance.state(), LifecycleState::Created);

    assert!(handles.release(a));
    assert!(handles.resolve(a).is_none());
    assert!(!handles.release(a));
    assert_eq!(handles.len(), 1);

    // A released instance someone still holds is torn down, not leaked live.
    assert_eq!(instance.state(), LifecycleState::Destroyed);
}

/// The slot is reused with a new generation; the old token stays dead.
#[test]
fn test_stale_handle_after_slot_reuse() {
    let (handles, _tap) = demo_handles();
    let first = handles.create(DEMO_ID, HostInfo::new("Host")).unwrap();
    handles.release(first);

    let second = handles.create(DEMO_ID, HostInfo::new("Host")).unwrap();
    assert_eq!(first.index(), second.index());
    assert_ne!(first.generation(), second.generation());
    assert!(handles.resolve(first).is_none());
    assert!(handles.resolve(second).is_some());
    assert!(!handles.release(first));
    assert_eq!(handles.len(), 1);
}

#[test]
fn test_unknown_and_forged_handles() {
    let (handles, _tap) = demo_handles();
    assert!(handles.create("demo.missing", HostInfo::new("Host")).is_none());
    assert!(handles.resolve(Handle::from_raw(0)).is_none());
    assert!(handles.resolve(Handle::from_raw(u64::MAX)).is_none());
    assert!(!handles.release(Handle::from_raw(42)));
}

/// Releasing everything tears every instance down, running or not.
#[test]
fn test_release_all() {
    let (handles, _tap) = demo_handles();
    let (_, running) = running_instance(&handles);
    let idle = handles
        .resolve(handles.create(DEMO_ID, HostInfo::new("Host")).unwrap())
        .unwrap();

    assert_eq!(handles.release_all(), 2);
    assert!(handles.is_empty());
    assert!(handles.handles().is_empty());
    assert_eq!(running.state(), LifecycleState::Destroyed);
    assert_eq!(idle.state(), LifecycleState::Destroyed);
    assert!(running.audio_config().is_none());
}

#[test]
fn test_handle_display() {
    let handle = Handle::from_raw((3u64 << 32) | 7);
    assert_eq!(handle.index(), 7);
    assert_eq!(handle.generation(), 3);
    assert_eq!(handle.to_string(), "7v3");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any interleaving of creates and releases keeps live handles resolvable
    /// and released ones dead.
    #[test]
    fn prop_released_handles_never_resolve(ops in prop::collection::vec(any::<Option<u8>>(), 1..64)) {
        let (handles, _tap) = demo_handles();
        let mut live: Vec<Handle> = Vec::new();
        let mut dead: Vec<Handle> = Vec::new();

        for op in ops {
            match op {
                None => {
                    let handle = handles.create(DEMO_ID, HostInfo::new("Host")).unwrap();
                    prop_assert!(!live.contains(&handle));
                    live.push(handle);
                }
                Some(pick) if !live.is_empty() => {
                    let handle = live.remove(pick as usize % live.len());
                    prop_assert!(handles.release(handle));
                    dead.push(handle);
                }
                Some(_) => {}
            }
        }

        prop_assert_eq!(handles.len(), live.len());
        for handle in &live {
            prop_assert!(handles.resolve(*handle).is_some());
        }
        for handle in &dead {
            prop_assert!(handles.resolve(*handle).is_none());
        }
    }
}
