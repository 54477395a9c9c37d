//! State persistence integration tests
//!
//! Round-trips through a live instance, migration of older snapshots,
//! presets on disk, and cancellable and background I/O.

use crate::helpers::*;
use approx::assert_relative_eq;
use plugbridge::core::CoreError;
use plugbridge::prelude::*;
use plugbridge::BridgeConfig;
use plugbridge::state::{Header, StateError};
use plugbridge::{CancelToken, Event, Format, FormatType, Preset, PresetBank, PresetMetadata};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::time::Duration;

/// Save from one instance, load into a fresh one, and hear the same gain.
#[test]
fn test_instance_state_roundtrip() {
    let (handles, _tap) = demo_handles();
    let (_, source) = running_instance(&handles);
    let input = stereo_block();
    let mut output = outputs_like(&input);
    run_block(
        &source,
        &input,
        &mut output,
        vec![Event::param_value(0, GAIN, 0.5), Event::param_value(0, MIX, 0.8)],
    );

    let mut bytes = Vec::new();
    source.save_state(&mut bytes).unwrap();
    assert!(bytes.starts_with(&plugbridge::state::BINARY_MAGIC));

    let saved = demo_state_manager().load_binary(&bytes).unwrap();
    assert_eq!(saved.version(), Version::V2);
    assert_eq!(saved.value(GAIN), Some(0.5));
    assert_eq!(saved.value(MIX), Some(0.8));
    assert_eq!(saved.header.format_type, Some(FormatType::Project));

    let (_, target) = running_instance(&handles);
    target.load_state(&mut Cursor::new(bytes)).unwrap();
    let mut restored = outputs_like(&input);
    run_block(&target, &input, &mut restored, Vec::new());
    assert_eq!(output, restored);
}

/// Version 1 JSON snapshots predate the mix parameter and load as fully wet.
#[test]
fn test_instance_loads_migrated_json() {
    let v1 = json!({
        "header": { "version": 1, "plugin_id": DEMO_ID },
        "parameters": [{ "id": GAIN, "value": 2.0, "name": "Gain" }]
    });
    let bytes = serde_json::to_vec(&v1).unwrap();

    let migrated = demo_state_manager().load_auto(&bytes).unwrap();
    assert_eq!(migrated.version(), Version::V2);
    assert_eq!(migrated.value(MIX), Some(1.0));

    let (handles, _tap) = demo_handles();
    let (_, instance) = running_instance(&handles);
    instance.load_state(&mut Cursor::new(bytes)).unwrap();

    let input = stereo_block();
    let mut output = outputs_like(&input);
    run_block(&instance, &input, &mut output, Vec::new());
    assert_relative_eq!(peak(&output[0]), peak(&input[0]) * 2.0, epsilon = FLOAT_EPSILON);
}

/// Foreign and corrupt data is rejected and leaves the instance untouched.
#[test]
fn test_instance_rejects_bad_state() {
    let (handles, _tap) = demo_handles();
    let (_, instance) = running_instance(&handles);

    let other = StateManager::new("demo.other", "Other", Version::V1);
    let foreign = other
        .save_binary(&other.new_state(vec![Parameter::new(GAIN, 9.0)]))
        .unwrap();
    let err = instance.load_state(&mut Cursor::new(foreign)).unwrap_err();
    assert!(matches!(err, CoreError::PluginFailed { .. }));
    assert!(err.to_string().contains("demo.other"));

    let mut truncated = Vec::new();
    instance.save_state(&mut truncated).unwrap();
    truncated.truncate(truncated.len() / 2);
    assert!(instance.load_state(&mut Cursor::new(truncated)).is_err());

    let input = stereo_block();
    let mut output = outputs_like(&input);
    run_block(&instance, &input, &mut output, Vec::new());
    assert_relative_eq!(peak(&output[0]), peak(&input[0]), epsilon = FLOAT_EPSILON);
}

#[test]
fn test_manager_formats_and_custom_data() {
    let manager = demo_state_manager();
    let state = manager
        .new_state(vec![Parameter::named(GAIN, 0.7, "Gain")])
        .with_custom("curve", json!({ "points": [0.0, 0.5, 1.0] }))
        .with_custom("label", "Lead");

    let json_bytes = manager.save_json(&state).unwrap();
    let binary_bytes = manager.save_binary(&state).unwrap();
    assert!(json_bytes.starts_with(b"{"));
    assert_eq!(Format::detect(&binary_bytes), Format::Binary);

    for bytes in [&json_bytes, &binary_bytes] {
        let loaded = manager.load_auto(bytes).unwrap();
        assert_eq!(loaded.value(GAIN), Some(0.7));
        assert_eq!(loaded.custom("label"), Some(&json!("Lead")));
        assert_eq!(loaded.custom("curve").unwrap()["points"][1], json!(0.5));
        assert_eq!(loaded.header.plugin_name, DEMO_NAME);
    }

    let blob = manager.encode_blob(&vec![1u16, 2, 3]).unwrap();
    let decoded: Vec<u16> = manager.decode_blob(&blob).unwrap();
    assert_eq!(decoded, vec![1, 2, 3]);
}

#[test]
fn test_validation_errors() {
    let manager = demo_state_manager();

    let too_new = State::new(Header::new(DEMO_ID, Version::V3));
    assert!(matches!(
        manager.validate(&too_new),
        Err(StateError::VersionTooNew { .. })
    ));

    let duplicate = manager
        .new_state(vec![Parameter::new(GAIN, 0.1), Parameter::new(GAIN, 0.2)]);
    assert!(matches!(
        manager.save_json(&duplicate),
        Err(StateError::DuplicateParameter(GAIN))
    ));

    let foreign = State::new(Header::new("demo.other", Version::V1));
    assert!(matches!(
        manager.validate(&foreign),
        Err(StateError::InvalidPluginId { .. })
    ));

    assert!(matches!(
        manager.load_json(b"{ \"header\": "),
        Err(StateError::UnexpectedEof)
    ));
}

/// A chain with a gap cannot bring an old snapshot forward.
#[test]
fn test_migration_gap() {
    let manager = StateManager::new(DEMO_ID, DEMO_NAME, Version::V3).with_migrations(
        plugbridge::MigrationChain::new()
            .with(plugbridge::SimpleMigrator::new(Version::V2, Version::V3, |state: State| {
                Ok(state)
            }))
            .unwrap(),
    );
    let v1 = State::new(Header::new(DEMO_ID, Version::V1));
    let bytes = serde_json::to_vec(&v1).unwrap();
    assert!(matches!(
        manager.load_json(&bytes),
        Err(StateError::NoMigratorFound(Version::V1))
    ));

    let v2 = State::new(Header::new(DEMO_ID, Version::V2));
    let upgraded = manager.upgrade(v2).unwrap();
    assert_eq!(upgraded.version(), Version::V3);
}

#[test]
fn test_presets_on_disk() {
    let manager = demo_state_manager();
    let known = [Parameter::named(GAIN, 1.0, "Gain"), Parameter::named(MIX, 1.0, "Mix")];

    let mut custom = BTreeMap::new();
    custom.insert("param_9".to_string(), json!(0.3));
    custom.insert("color".to_string(), json!("blue"));
    let preset = manager
        .create_preset(
            PresetMetadata::new("Warm").author("Tester").tag("bass"),
            &[Parameter::named(GAIN, 0.4, "Gain"), Parameter::new(MIX, 0.6)],
            custom,
        )
        .unwrap();
    assert_eq!(preset.metadata.version, DEMO_NAME);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presets").join("warm.json");
    manager.save_preset_file(&path, &preset).unwrap();
    assert!(!path.with_extension("tmp").exists());

    let loaded: Preset = manager.load_preset_file(&path).unwrap();
    assert_eq!(loaded, preset);

    let mut values = loaded.parameters(&known);
    values.sort_by_key(|p| p.id);
    let ids: Vec<u32> = values.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![GAIN, MIX, 9]);
    assert_eq!(values[1].value, 0.6);
    assert_eq!(values[1].name, "Mix");

    assert!(matches!(
        manager.create_preset(PresetMetadata::new("  "), &known, BTreeMap::new()),
        Err(StateError::EmptyPresetName)
    ));
    assert!(matches!(
        manager.create_preset(PresetMetadata::new("Empty"), &[], BTreeMap::new()),
        Err(StateError::EmptyPresetData)
    ));
    assert!(manager.load_preset_file(dir.path().join("missing.json")).is_err());
}

#[test]
fn test_preset_bank() {
    let manager = demo_state_manager();
    let mut bank = PresetBank::new("Factory");
    for (name, gain) in [("Quiet", 0.25), ("Loud", 2.0)] {
        bank.push(
            manager
                .create_preset(
                    PresetMetadata::new(name),
                    &[Parameter::named(GAIN, gain, "Gain")],
                    BTreeMap::new(),
                )
                .unwrap(),
        );
    }

    let bytes = manager.save_bank(&bank).unwrap();
    let loaded = manager.load_bank(&bytes).unwrap();
    assert_eq!(loaded.presets.len(), 2);
    assert_eq!(loaded.find("Loud").unwrap().preset_data["Gain"], json!(2.0));
    assert!(loaded.find("Missing").is_none());
}

#[test]
fn test_cancelled_io() {
    let manager = demo_state_manager();
    let state = manager.new_state(vec![Parameter::new(GAIN, 0.5)]);

    let token = CancelToken::new();
    token.cancel();
    let mut out = Vec::new();
    let err = manager
        .save_with_cancel(&state, Format::Json, &mut out, &token)
        .unwrap_err();
    assert!(matches!(err, StateError::Cancelled));
    assert!(out.is_empty());

    let expired = CancelToken::with_timeout(Duration::ZERO);
    let bytes = manager.save_binary(&state).unwrap();
    assert!(matches!(
        manager.load_with_cancel(Cursor::new(bytes.clone()), Format::Binary, &expired),
        Err(StateError::Timeout(_))
    ));

    let live = CancelToken::with_timeout(Duration::from_secs(10));
    let loaded = manager
        .load_with_cancel(Cursor::new(bytes), Format::Binary, &live)
        .unwrap();
    assert_eq!(loaded.value(GAIN), Some(0.5));
}

#[test]
fn test_async_roundtrip() {
    let manager = BridgeConfig::default()
        .state_timeout(Duration::from_secs(5))
        .configure_state(demo_state_manager());
    assert_eq!(manager.timeout(), Duration::from_secs(5));

    let state = manager.new_state(vec![Parameter::named(GAIN, 0.9, "Gain")]);
    let bytes = manager
        .save_async(state, Format::Json, Vec::new())
        .unwrap()
        .wait()
        .unwrap();

    let completion = manager.load_async(Cursor::new(bytes), Format::Json).unwrap();
    let loaded = completion.wait().unwrap();
    assert_eq!(loaded.value(GAIN), Some(0.9));
}

/// Reader that never finishes, as a stuck network share would.
struct StalledReader;

impl Read for StalledReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(Duration::from_millis(5));
        buf.fill(b' ');
        Ok(buf.len())
    }
}

#[test]
fn test_async_timeout_and_cancel() {
    let manager = demo_state_manager().with_timeout(Duration::from_millis(50));
    let err = manager
        .load_async(StalledReader, Format::Json)
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, StateError::Timeout(_)));
    assert!(err.is_interrupted());

    let manager = demo_state_manager().with_timeout(Duration::from_secs(10));
    let completion = manager.load_async(StalledReader, Format::Json).unwrap();
    assert!(completion.try_result().is_none());
    completion.cancel();
    assert!(completion.token().is_cancelled());
    assert!(matches!(completion.wait(), Err(StateError::Cancelled)));
}
