//! Plugin registry integration tests
//!
//! Registration order, lookup, replacement and construction failures.

use crate::helpers::*;
use parking_lot::Mutex;
use plugbridge::core::{CoreError, Stage};
use plugbridge::prelude::*;
use plugbridge::HostInfo;
use plugbridge::PluginRegistry;

struct Silence;

impl Plugin for Silence {
    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> ProcessStatus {
        ProcessStatus::Sleep
    }
}

fn silence(_host: &HostInfo) -> plugbridge::core::Result<Box<dyn Plugin>> {
    Ok(Box::new(Silence))
}

/// Enumeration follows registration order and survives lookups by id.
#[test]
fn test_enumeration_order() {
    let registry = PluginRegistry::new();
    registry.register(PluginDescriptor::new("demo.c", "C"), silence);
    registry.register(PluginDescriptor::new("demo.a", "A"), silence);
    registry.register(demo_descriptor(), silence);

    assert_eq!(registry.count(), 3);
    assert_eq!(registry.ids(), vec!["demo.c", "demo.a", DEMO_ID]);
    assert_eq!(registry.descriptor_at(1).unwrap().name, "A");
    assert!(registry.descriptor_at(3).is_none());

    let demo = registry.descriptor(DEMO_ID).unwrap();
    assert!(demo.has_feature(features::AUDIO_EFFECT));
    assert!(demo.has_feature(features::STEREO));
    assert!(!demo.has_feature(features::INSTRUMENT));
}

/// Re-registering an id keeps its position; unregistering closes the gap.
#[test]
fn test_replace_and_unregister() {
    let registry = PluginRegistry::new();
    registry.register(PluginDescriptor::new("demo.a", "A"), silence);
    registry.register(PluginDescriptor::new("demo.b", "B"), silence);
    registry.register(PluginDescriptor::new("demo.c", "C"), silence);
    let before = registry.revision();

    registry.register(PluginDescriptor::new("demo.a", "A v2").version("2.0.0"), silence);
    assert_eq!(registry.count(), 3);
    assert_eq!(registry.descriptor_at(0).unwrap().name, "A v2");
    assert!(registry.revision() > before);

    assert!(registry.unregister("demo.b"));
    assert!(!registry.unregister("demo.b"));
    assert_eq!(registry.ids(), vec!["demo.a", "demo.c"]);
    assert_eq!(registry.descriptor("demo.c").unwrap().name, "C");
    assert!(registry.create("demo.c", &HostInfo::new("Host")).is_ok());

    registry.clear();
    assert_eq!(registry.count(), 0);
    assert!(!registry.contains("demo.a"));
}

/// Empty ids are refused; clones share the same entries.
#[test]
fn test_empty_id_and_shared_clones() {
    let registry = PluginRegistry::new();
    let view = registry.clone();
    registry.register(PluginDescriptor::new("", "Nameless"), silence);
    assert_eq!(view.count(), 0);

    registry.register(PluginDescriptor::new("demo.a", "A"), silence);
    assert!(view.contains("demo.a"));
    assert_eq!(view.revision(), registry.revision());
}

/// Descriptor defaults when only id and name are given.
#[test]
fn test_descriptor_defaults() {
    let descriptor = PluginDescriptor::new("demo.a", "A");
    assert_eq!(descriptor.version, "1.0.0");
    assert!(descriptor.vendor.is_empty());
    assert!(descriptor.features.is_empty());
}

/// Constructors see the host identity they are created for.
#[test]
fn test_constructor_receives_host() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let registry = PluginRegistry::new();
    let record = Arc::clone(&seen);
    registry.register(PluginDescriptor::new("demo.a", "A"), move |host: &HostInfo| {
        record.lock().push(host.name.clone());
        Ok(Box::new(Silence) as Box<dyn Plugin>)
    });

    let (descriptor, _plugin) = registry.create("demo.a", &HostInfo::new("Bitwig")).unwrap();
    assert_eq!(descriptor.id, "demo.a");
    assert_eq!(*seen.lock(), vec!["Bitwig".to_string()]);
}

/// Unknown ids, failing and panicking constructors all surface as errors.
#[test]
fn test_construction_failures() {
    let registry = PluginRegistry::new();
    registry.register(PluginDescriptor::new("demo.fail", "Fail"), |_| {
        Err(CoreError::plugin(Stage::Construction, "out of licences"))
    });
    registry.register(PluginDescriptor::new("demo.panic", "Panic"), |_| {
        panic!("constructor exploded")
    });
    let host = HostInfo::new("Host");

    assert!(matches!(
        registry.create("demo.missing", &host),
        Err(CoreError::UnknownPlugin(id)) if id == "demo.missing"
    ));
    assert!(matches!(
        registry.create("demo.fail", &host),
        Err(CoreError::PluginFailed { stage: Stage::Construction, .. })
    ));
    assert!(matches!(
        registry.create("demo.panic", &host),
        Err(CoreError::PluginFailed { stage: Stage::Construction, .. })
    ));

    let handles = plugbridge::HandleRegistry::new(registry, test_config());
    assert!(handles.create("demo.fail", host).is_none());
    assert!(handles.is_empty());
}
