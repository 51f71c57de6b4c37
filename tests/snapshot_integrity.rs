//! Snapshot Integrity Tests
//!
//! Persisted snapshots are checksum-verified on every read. A corrupted
//! or truncated snapshot is always rejected, never partially loaded.

use std::fs;

use aeroconf::cli::{
    apply, load_snapshot, save_snapshot, CliErrorCode, SnapshotFormat, ToolConfig,
};
use aeroconf::configuration::{
    config_key, decode_snapshot, encode_snapshot, fingerprint, AutoCountDefaults,
    ConfigurationError, DatabaseConfiguration, RawConfiguration,
};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn triple() -> DatabaseConfiguration {
    let raw: RawConfiguration = [
        ("initialized", ""),
        ("log_replicas", "3"),
        ("log_anti_quorum", "0"),
        ("log_engine", "1"),
        ("storage_quorum", "3"),
        ("storage_replicas", "3"),
        ("storage_engine", "1"),
        ("regions", r#"[{"datacenter":"dc1","priority":1}]"#),
    ]
    .into_iter()
    .map(|(k, v)| (config_key(k), v))
    .collect();
    DatabaseConfiguration::from_key_values(raw)
}

// =============================================================================
// Codec
// =============================================================================

#[test]
fn test_encoding_is_deterministic() {
    let mut a = triple();
    let mut b = DatabaseConfiguration::new();
    for entry in a.to_canonical().clone().iter().rev() {
        b.set(entry.key.clone(), entry.value.clone());
    }
    assert_eq!(a.encode_snapshot(), b.encode_snapshot());
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn test_every_single_bit_flip_is_detected() {
    let mut config = triple();
    let bytes = config.encode_snapshot();
    for idx in 0..bytes.len() {
        let mut corrupted = bytes.clone();
        corrupted[idx] ^= 0x01;
        assert!(
            decode_snapshot(&corrupted).is_err(),
            "flip at byte {} went undetected",
            idx
        );
    }
}

#[test]
fn test_truncation_is_detected() {
    let raw = triple().to_canonical().clone();
    let bytes = encode_snapshot(&raw);
    for len in 0..bytes.len() {
        assert!(decode_snapshot(&bytes[..len]).is_err());
    }
    assert_eq!(decode_snapshot(&bytes).unwrap(), raw);
}

#[test]
fn test_checksum_error_reports_both_values() {
    let raw = triple().to_canonical().clone();
    let mut bytes = encode_snapshot(&raw);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    match decode_snapshot(&bytes) {
        Err(err @ ConfigurationError::ChecksumMismatch { .. }) => {
            assert_eq!(err.code(), "AERO_CONFIG_CHECKSUM_MISMATCH");
        }
        other => panic!("expected checksum mismatch, got {:?}", other),
    }
    assert_ne!(fingerprint(&raw), 0);
}

// =============================================================================
// Snapshot Files
// =============================================================================

#[test]
fn test_binary_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.bin");
    let mut config = triple();

    save_snapshot(&path, &mut config, SnapshotFormat::Binary).unwrap();
    let (loaded, format) = load_snapshot(&path, AutoCountDefaults::default()).unwrap();
    assert_eq!(format, SnapshotFormat::Binary);
    assert_eq!(loaded, config);
    assert_eq!(loaded.regions()[0].dc_id, "dc1");
}

#[test]
fn test_json_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.json");
    let mut config = triple();

    save_snapshot(&path, &mut config, SnapshotFormat::Json).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"log_replicas\": \"3\""));

    let (loaded, format) = load_snapshot(&path, AutoCountDefaults::default()).unwrap();
    assert_eq!(format, SnapshotFormat::Json);
    assert_eq!(loaded, config);
}

#[test]
fn test_corrupted_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf.bin");
    save_snapshot(&path, &mut triple(), SnapshotFormat::Binary).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let err = load_snapshot(&path, AutoCountDefaults::default()).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::SnapshotError);
}

#[test]
fn test_apply_converts_between_formats() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("conf.bin");
    let output = dir.path().join("edited.json");
    save_snapshot(&input, &mut triple(), SnapshotFormat::Binary).unwrap();

    let result = apply(
        &ToolConfig::default(),
        &input,
        &["storage_engine=2".to_string(), "log_engine=2".to_string()],
        &[],
        Some(output.as_path()),
    )
    .unwrap();
    assert_eq!(result["recovery_required"], true);
    assert_eq!(result["valid"], true);

    let (edited, format) = load_snapshot(&output, AutoCountDefaults::default()).unwrap();
    assert_eq!(format, SnapshotFormat::Json);
    assert_eq!(edited.storage_engine_name(), "ssd-2");
    assert_eq!(result["fingerprint"], edited.fingerprint());

    // Input untouched when an output path is given.
    let (original, _) = load_snapshot(&input, AutoCountDefaults::default()).unwrap();
    assert_eq!(original.storage_engine_name(), "memory");
}
