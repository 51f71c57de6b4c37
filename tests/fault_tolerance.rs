//! Fault Tolerance Tests
//!
//! Derived numbers over realistic topologies: a single datacenter, a
//! primary with satellites, and a two-region layout with a remote.

use aeroconf::configuration::{config_key, DatabaseConfiguration, RawConfiguration};

// =============================================================================
// Test Utilities
// =============================================================================

fn config(pairs: &[(&str, &str)]) -> DatabaseConfiguration {
    let raw: RawConfiguration = pairs
        .iter()
        .map(|(k, v)| (config_key(k), v.to_string()))
        .collect();
    DatabaseConfiguration::from_key_values(raw)
}

fn base() -> Vec<(&'static str, &'static str)> {
    vec![
        ("initialized", ""),
        ("log_replicas", "3"),
        ("log_anti_quorum", "0"),
        ("log_engine", "0"),
        ("storage_quorum", "3"),
        ("storage_replicas", "3"),
        ("storage_engine", "0"),
    ]
}

const TWO_REGIONS: &str = r#"[
    {"datacenter":"east","priority":1,
     "satellite_log_replicas":2,"satellite_anti_quorum":0,
     "satellites":[{"datacenter":"east-sat","priority":1}]},
    {"datacenter":"west","priority":0,
     "satellite_log_replicas":2,"satellite_anti_quorum":0,
     "satellites":[{"datacenter":"west-sat","priority":1}]}
]"#;

// =============================================================================
// Single Datacenter
// =============================================================================

#[test]
fn test_single_datacenter_triple() {
    let c = config(&base());
    assert!(c.is_valid());
    assert_eq!(c.max_machine_failures_tolerated(), 2);
    assert_eq!(c.min_datacenters_required(), 0);
    assert_eq!(c.min_machines_required_per_datacenter(), 3);
    assert_eq!(c.expected_log_sets(None), 1);
}

#[test]
fn test_storage_quorum_bounds_tolerance() {
    let mut pairs = base();
    pairs.retain(|(k, _)| *k != "storage_quorum" && *k != "storage_replicas");
    pairs.push(("storage_quorum", "2"));
    pairs.push(("storage_replicas", "2"));
    assert_eq!(config(&pairs).max_machine_failures_tolerated(), 1);
}

// =============================================================================
// Two Regions With Remote
// =============================================================================

#[test]
fn test_two_regions_with_remote() {
    let mut pairs = base();
    pairs.push(("remote_log_replicas", "3"));
    pairs.push(("regions", TWO_REGIONS));
    let c = config(&pairs);

    assert!(c.is_valid());
    assert_eq!(c.min_datacenters_required(), 4);
    // 1 + min(max(3 - 1 - 0, 2 - 1), 3 - 1)
    assert_eq!(c.max_machine_failures_tolerated(), 3);
    assert_eq!(c.expected_log_sets(Some("east")), 3);
    assert_eq!(c.get_desired_satellite_logs(Some("east")), 3);
    assert_eq!(c.get_desired_remote_logs(), 3);
}

#[test]
fn test_remote_needs_two_regions() {
    let mut pairs = base();
    pairs.push(("remote_log_replicas", "3"));
    pairs.push(("regions", r#"[{"datacenter":"east"}]"#));
    assert!(!config(&pairs).is_valid());
}

#[test]
fn test_remote_needs_full_storage_quorum() {
    let mut pairs = base();
    pairs.retain(|(k, _)| *k != "storage_quorum");
    pairs.push(("storage_quorum", "2"));
    pairs.push(("remote_log_replicas", "3"));
    pairs.push(("regions", TWO_REGIONS));
    assert!(!config(&pairs).is_valid());
}

// =============================================================================
// Region Rules
// =============================================================================

#[test]
fn test_region_order_and_lookup() {
    let mut pairs = base();
    pairs.push((
        "regions",
        r#"[{"datacenter":"low","priority":-1},{"datacenter":"high","priority":5}]"#,
    ));
    let c = config(&pairs);

    assert_eq!(c.regions()[0].dc_id, "high");
    assert_eq!(c.get_region(Some("low")).priority, -1);
    assert!(c.is_valid());
}

#[test]
fn test_negative_primary_priority_is_invalid() {
    let mut pairs = base();
    pairs.push(("regions", r#"[{"datacenter":"only","priority":-1}]"#));
    assert!(!config(&pairs).is_valid());
}

#[test]
fn test_three_regions_invalid() {
    let mut pairs = base();
    pairs.push((
        "regions",
        r#"[{"datacenter":"a"},{"datacenter":"b"},{"datacenter":"c"}]"#,
    ));
    let c = config(&pairs);
    assert_eq!(c.regions().len(), 3);
    assert!(!c.is_valid());
}

#[test]
fn test_duplicate_region_list_is_dropped() {
    let mut pairs = base();
    pairs.push((
        "regions",
        r#"[{"datacenter":"a"},{"datacenter":"a","priority":2}]"#,
    ));
    let c = config(&pairs);
    assert!(c.regions().is_empty());
    // The blob itself stays in the table.
    assert!(c.get(&config_key("regions")).is_some());
}

// =============================================================================
// Automatic Counts
// =============================================================================

#[test]
fn test_explicit_counts_override_automatic() {
    let mut pairs = base();
    pairs.push(("logs", "8"));
    pairs.push(("auto_proxies", "4"));
    let c = config(&pairs);
    assert_eq!(c.get_desired_logs(), 8);
    assert_eq!(c.get_desired_remote_logs(), 8);
    assert_eq!(c.get_desired_proxies(), 4);
    assert_eq!(c.get_desired_satellite_logs(None), 3);
}

#[test]
fn test_zero_auto_count_is_invalid() {
    let mut pairs = base();
    pairs.push(("auto_resolvers", "0"));
    assert!(!config(&pairs).is_valid());
}
