//! Database configuration object
//!
//! `DatabaseConfiguration` owns the raw configuration table and a snapshot
//! of the typed fields decoded from it. Callers never edit fields: every
//! mutation edits the raw table and swaps in a freshly decoded snapshot, so
//! a cloned configuration or a held `Arc<ConfigurationFields>` never
//! observes a half-applied change.
//!
//! Equality, hashing and serialization are defined on the raw table only.
//! Two configurations that decode to the same fields but carry different
//! unknown keys are not equal.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::observability::{log_event_with_fields, Event};

use super::decoder::{self, AutoCountDefaults, ConfigurationFields};
use super::keys::{self, KeyRange};
use super::mutation::Mutation;
use super::raw::{RawConfiguration, RawStore};
use super::region::{check_datacenter_ids, RegionInfo};
use super::AUTO_COUNT;

static NO_REGION: RegionInfo = RegionInfo::NONE;

/// Replication topology configuration of one database.
#[derive(Debug, Clone)]
pub struct DatabaseConfiguration {
    raw: RawStore,
    fields: Arc<ConfigurationFields>,
    defaults: AutoCountDefaults,
}

impl Default for DatabaseConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseConfiguration {
    /// Empty, invalid configuration.
    pub fn new() -> Self {
        Self::with_defaults(AutoCountDefaults::default())
    }

    /// Empty configuration whose automatic counts start at `defaults`.
    pub fn with_defaults(defaults: AutoCountDefaults) -> Self {
        Self {
            raw: RawStore::default(),
            fields: Arc::new(ConfigurationFields::reset(defaults)),
            defaults,
        }
    }

    /// Configuration decoded from a full table.
    pub fn from_key_values(raw: RawConfiguration) -> Self {
        let mut config = Self::new();
        config.load_key_values(raw);
        config
    }

    /// Replace the whole table and decode it from scratch.
    pub fn load_key_values(&mut self, raw: RawConfiguration) {
        let entries = raw.len().to_string();
        self.raw = RawStore::Canonical(raw);
        self.rederive();
        log_event_with_fields(
            Event::ConfigurationLoaded,
            &[
                ("entries", entries.as_str()),
                ("valid", if self.is_valid() { "true" } else { "false" }),
            ],
        );
    }

    fn rederive(&mut self) {
        self.fields = Arc::new(ConfigurationFields::decode(self.raw.iter(), self.defaults));
    }

    /// Apply a committed mutation. Only configuration keys are considered.
    ///
    /// Returns true if the change needs a cluster recovery to take effect.
    pub fn apply_mutation(&mut self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::SetValue { key, value } => {
                if keys::config_suffix(key).is_none() {
                    return false;
                }
                self.set(key.clone(), value.clone())
            }
            Mutation::ClearRange(range) => {
                let config_keys = KeyRange::config_keys();
                if !range.intersects(&config_keys) {
                    return false;
                }
                self.clear(&range.intersection(&config_keys))
            }
        }
    }

    /// Write one key. Returns true if the key needs a cluster recovery to
    /// take effect, whatever the value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> bool {
        let key = key.into();
        let requires_recovery = decoder::classify(&key).is_some_and(|class| class.requires_recovery());

        self.raw.set(key.clone(), value);
        self.rederive();

        log_event_with_fields(Event::MutationApplied, &[("key", key.as_str()), ("op", "set")]);
        if requires_recovery {
            log_event_with_fields(Event::RecoveryRequired, &[("key", key.as_str())]);
        }
        requires_recovery
    }

    /// Remove every key in `range`. Returns true if any removed key needs a
    /// cluster recovery to take effect.
    pub fn clear(&mut self, range: &KeyRange) -> bool {
        let removed = self.raw.clear(range);
        if removed.is_empty() {
            return false;
        }
        self.rederive();

        let requires_recovery = removed.iter().any(|entry| {
            decoder::classify(&entry.key).is_some_and(|class| class.requires_recovery())
        });

        let count = removed.len().to_string();
        log_event_with_fields(
            Event::MutationApplied,
            &[
                ("begin", range.begin.as_str()),
                ("end", range.end.as_str()),
                ("op", "clear"),
                ("removed", count.as_str()),
            ],
        );
        if requires_recovery {
            log_event_with_fields(
                Event::RecoveryRequired,
                &[("begin", range.begin.as_str()), ("end", range.end.as_str())],
            );
        }
        requires_recovery
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.raw.get(key)
    }

    /// Return to canonical form and expose the sorted table.
    pub fn to_canonical(&mut self) -> &RawConfiguration {
        self.raw.to_canonical()
    }

    /// The sorted table, or `None` while edits are buffered.
    pub fn raw(&self) -> Option<&RawConfiguration> {
        self.raw.canonical()
    }

    pub fn is_buffered(&self) -> bool {
        self.raw.is_buffered()
    }

    pub(crate) fn raw_store(&self) -> &RawStore {
        &self.raw
    }

    /// Decoded fields of the current table.
    pub fn fields(&self) -> &ConfigurationFields {
        &self.fields
    }

    /// Shared handle to the current decoded fields.
    pub fn snapshot(&self) -> Arc<ConfigurationFields> {
        Arc::clone(&self.fields)
    }

    pub fn auto_count_defaults(&self) -> AutoCountDefaults {
        self.defaults
    }

    /// Whether the decoded configuration can run a cluster.
    pub fn is_valid(&self) -> bool {
        let f = &*self.fields;
        let remote_ok = f.remote_log_replication_factor == 0
            || (f.remote_log_policy.is_some()
                && f.regions.len() == 2
                && f.durable_storage_quorum == f.storage_team_size);
        let regions_ok = f.regions.len() <= 2
            && f.regions.first().map_or(true, |region| region.priority >= 0);

        f.initialized
            && f.log_write_anti_quorum >= 0
            && f.log_replication_factor >= 1
            && f.durable_storage_quorum >= 1
            && f.storage_team_size >= 1
            && self.get_desired_proxies() >= 1
            && self.get_desired_logs() >= 1
            && self.get_desired_resolvers() >= 1
            && f.durable_storage_quorum <= f.storage_team_size
            && f.log_store_type.is_some()
            && f.storage_store_type.is_some()
            && f.auto_proxy_count >= 1
            && f.auto_resolver_count >= 1
            && f.auto_desired_log_count >= 1
            && f.storage_policy.is_some()
            && f.log_policy.is_some()
            && self.get_desired_remote_logs() >= 1
            && f.remote_log_replication_factor >= 0
            && remote_ok
            && regions_ok
            && check_datacenter_ids(&f.regions).is_ok()
    }

    /// Region for a datacenter. Unknown or absent ids get `RegionInfo::NONE`,
    /// meaning no region-specific configuration applies.
    pub fn get_region(&self, dc_id: Option<&str>) -> &RegionInfo {
        let Some(dc_id) = dc_id else {
            return &NO_REGION;
        };
        self.fields
            .regions
            .iter()
            .find(|region| region.dc_id == dc_id)
            .unwrap_or(&NO_REGION)
    }

    pub fn regions(&self) -> &[RegionInfo] {
        &self.fields.regions
    }

    // ==================
    // Desired counts
    // ==================

    pub fn get_desired_proxies(&self) -> i32 {
        resolve_auto(self.fields.proxy_count, self.fields.auto_proxy_count)
    }

    pub fn get_desired_resolvers(&self) -> i32 {
        resolve_auto(self.fields.resolver_count, self.fields.auto_resolver_count)
    }

    pub fn get_desired_logs(&self) -> i32 {
        resolve_auto(self.fields.desired_log_count, self.fields.auto_desired_log_count)
    }

    /// Falls back to the primary desired log count, itself possibly automatic.
    pub fn get_desired_remote_logs(&self) -> i32 {
        resolve_auto(self.fields.remote_desired_log_count, self.get_desired_logs())
    }

    pub fn get_desired_satellite_logs(&self, dc_id: Option<&str>) -> i32 {
        resolve_auto(
            self.get_region(dc_id).satellite_desired_log_count,
            self.fields.auto_desired_log_count,
        )
    }
}

fn resolve_auto(explicit: i32, automatic: i32) -> i32 {
    if explicit == AUTO_COUNT {
        automatic
    } else {
        explicit
    }
}

impl PartialEq for DatabaseConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for DatabaseConfiguration {}

impl Hash for DatabaseConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a str,
    value: &'a [u8],
}

impl Serialize for DatabaseConfiguration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.raw.iter().map(|(key, value)| EntryRef { key, value }))
    }
}

impl<'de> Deserialize<'de> for DatabaseConfiguration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawConfiguration::deserialize(deserializer).map(Self::from_key_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::keys::config_key;

    fn triple() -> DatabaseConfiguration {
        let raw: RawConfiguration = [
            ("initialized", ""),
            ("log_replicas", "3"),
            ("log_anti_quorum", "0"),
            ("log_engine", "0"),
            ("storage_quorum", "3"),
            ("storage_replicas", "3"),
            ("storage_engine", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (config_key(k), v))
        .collect();
        DatabaseConfiguration::from_key_values(raw)
    }

    #[test]
    fn test_new_is_invalid() {
        let config = DatabaseConfiguration::new();
        assert!(!config.is_valid());
        assert!(config.raw().unwrap().is_empty());
    }

    #[test]
    fn test_triple_is_valid() {
        let config = triple();
        assert!(config.is_valid());
        assert_eq!(config.get_desired_proxies(), 3);
        assert_eq!(config.get_desired_resolvers(), 1);
        assert_eq!(config.get_desired_logs(), 3);
    }

    #[test]
    fn test_set_reports_recovery_class() {
        let mut config = triple();
        assert!(!config.set(config_key("proxies"), "5"));
        assert!(config.set(config_key("log_replicas"), "2"));
        assert!(config.set(config_key("log_replicas"), "not a number"));
        assert!(!config.set(config_key("some_future_knob"), "1"));
        assert_eq!(config.get_desired_proxies(), 5);
    }

    #[test]
    fn test_set_buffers_until_canonical() {
        let mut config = triple();
        config.set(config_key("resolvers"), "2");
        assert!(config.is_buffered());
        assert!(config.raw().is_none());
        assert_eq!(config.get(&config_key("resolvers")), Some(&b"2"[..]));

        let raw = config.to_canonical().clone();
        assert!(!config.is_buffered());
        assert_eq!(raw.get(&config_key("resolvers")), Some(&b"2"[..]));
    }

    #[test]
    fn test_clear_reverts_fields() {
        let mut config = triple();
        config.set(config_key("proxies"), "7");
        assert!(!config.clear(&KeyRange::single(&config_key("proxies"))));
        assert_eq!(config.get_desired_proxies(), 3);

        assert!(config.clear(&KeyRange::single(&config_key("log_replicas"))));
        assert_eq!(config.fields().log_replication_factor, -1);
        assert!(!config.is_valid());
    }

    #[test]
    fn test_clear_empty_range_is_noop() {
        let mut config = triple();
        assert!(!config.clear(&KeyRange::new("a", "b")));
        assert!(!config.is_buffered());
    }

    #[test]
    fn test_apply_mutation_ignores_foreign_keys() {
        let mut config = triple();
        assert!(!config.apply_mutation(&Mutation::set("\u{ff}/keyServers/x", "1")));
        assert_eq!(config.get("\u{ff}/keyServers/x"), None);

        // A clear spanning everything only touches configuration keys.
        assert!(config.apply_mutation(&Mutation::clear_range("", "\u{ff}\u{ff}")));
        assert!(config.raw_store().is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutations() {
        let mut config = triple();
        let before = config.snapshot();
        config.set(config_key("proxies"), "9");
        assert_eq!(before.proxy_count, AUTO_COUNT);
        assert_eq!(config.fields().proxy_count, 9);
    }

    #[test]
    fn test_equality_ignores_representation() {
        let mut buffered = triple();
        buffered.set(config_key("proxies"), "4");
        let mut canonical = triple();
        canonical.set(config_key("proxies"), "4");
        canonical.to_canonical();
        assert_eq!(buffered, canonical);
    }

    #[test]
    fn test_unknown_keys_participate_in_equality() {
        let plain = triple();
        let mut extra = triple();
        extra.set(config_key("future_knob"), "1");
        assert_eq!(plain.fields(), extra.fields());
        assert_ne!(plain, extra);
    }

    #[test]
    fn test_get_region_defaults() {
        let config = triple();
        assert_eq!(config.get_region(None), &RegionInfo::NONE);
        assert_eq!(config.get_region(Some("nowhere")), &RegionInfo::NONE);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_fields() {
        let mut config = triple();
        config.set(config_key("future_knob"), "x");
        let json = serde_json::to_string(&config).unwrap();
        let restored: DatabaseConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
        assert!(restored.is_valid());
        assert_eq!(restored.fields(), config.fields());
    }
}
