//! Field decoder
//!
//! Maps configuration key suffixes to typed fields. Every recognized suffix
//! has one entry in a static registry that names its recovery class and its
//! decode function. A suffix missing from the registry is the explicit
//! ignore path: the entry stays in the raw table and no field changes.
//!
//! Values that fail to decode are ignored the same way, so a table written
//! by newer or older software always decodes.
//!
//! Decoding is always done over a whole table:
//!
//! 1. start from reset defaults
//! 2. apply every entry in key order
//! 3. run the normalization pass once (default replication policies)

use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, Event};

use super::engine::StoreType;
use super::errors::{ConfigurationError, ConfigurationResult};
use super::keys;
use super::policy::ReplicationPolicy;
use super::region::{decode_regions, RegionInfo};
use super::AUTO_COUNT;

/// Whether a field change needs a cluster recovery to take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryClass {
    /// Applied by the running cluster without recovery
    HotReconfigurable,
    /// Only takes effect after the recovery protocol restarts
    RecoveryRequired,
}

impl RecoveryClass {
    pub fn requires_recovery(&self) -> bool {
        matches!(self, RecoveryClass::RecoveryRequired)
    }
}

/// Values used for the automatic counts until the table overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCountDefaults {
    pub proxies: i32,
    pub resolvers: i32,
    pub logs: i32,
}

impl Default for AutoCountDefaults {
    fn default() -> Self {
        Self {
            proxies: 3,
            resolvers: 1,
            logs: 3,
        }
    }
}

/// Typed configuration fields derived from the raw table.
///
/// Counts use `AUTO_COUNT` (-1) for "derive from the paired automatic
/// count"; replication factors and quorums use -1 for "never set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationFields {
    pub initialized: bool,

    // Proxies
    pub proxy_count: i32,
    pub auto_proxy_count: i32,

    // Resolvers
    pub resolver_count: i32,
    pub auto_resolver_count: i32,

    // Logs
    pub log_policy: Option<ReplicationPolicy>,
    pub desired_log_count: i32,
    pub auto_desired_log_count: i32,
    pub log_write_anti_quorum: i32,
    pub log_replication_factor: i32,
    pub log_store_type: Option<StoreType>,

    // Storage servers
    pub storage_policy: Option<ReplicationPolicy>,
    pub durable_storage_quorum: i32,
    pub storage_team_size: i32,
    pub storage_store_type: Option<StoreType>,

    // Remote logs
    pub remote_desired_log_count: i32,
    pub remote_log_replication_factor: i32,
    pub remote_log_policy: Option<ReplicationPolicy>,

    /// Sorted by descending priority
    pub regions: Vec<RegionInfo>,
}

impl ConfigurationFields {
    /// Fields of a table with no recognized keys.
    pub fn reset(defaults: AutoCountDefaults) -> Self {
        Self {
            initialized: false,
            proxy_count: AUTO_COUNT,
            auto_proxy_count: defaults.proxies,
            resolver_count: AUTO_COUNT,
            auto_resolver_count: defaults.resolvers,
            log_policy: None,
            desired_log_count: AUTO_COUNT,
            auto_desired_log_count: defaults.logs,
            log_write_anti_quorum: -1,
            log_replication_factor: -1,
            log_store_type: None,
            storage_policy: None,
            durable_storage_quorum: -1,
            storage_team_size: -1,
            storage_store_type: None,
            remote_desired_log_count: AUTO_COUNT,
            remote_log_replication_factor: 0,
            remote_log_policy: None,
            regions: Vec::new(),
        }
    }

    /// Decode a whole table, in key order.
    pub fn decode<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a [u8])>,
        defaults: AutoCountDefaults,
    ) -> Self {
        let mut fields = Self::reset(defaults);
        for (key, value) in entries {
            fields.apply(key, value);
        }
        fields.apply_default_policies();
        fields
    }

    /// Apply one entry. Keys outside the configuration prefix are skipped.
    fn apply(&mut self, key: &str, value: &[u8]) {
        let (suffix, decoder) = match KeyKind::of(key) {
            KeyKind::Foreign | KeyKind::Excluded => return,
            KeyKind::Unknown(suffix) => {
                log_event_with_fields(Event::UnknownKeyIgnored, &[("key", suffix)]);
                return;
            }
            KeyKind::Field(suffix, decoder) => (suffix, decoder),
        };

        if let Err(err) = (decoder.decode)(self, value) {
            let event = match &err {
                ConfigurationError::InvalidRegions(_) | ConfigurationError::DuplicateDatacenter(_) => {
                    Event::RegionListRejected
                }
                _ => Event::MalformedValueIgnored,
            };
            let reason = err.to_string();
            log_event_with_fields(
                event,
                &[("code", err.code()), ("key", suffix), ("reason", reason.as_str())],
            );
        }
    }

    /// Fill replication policies the table left unset.
    ///
    /// Runs once after all keys are applied so the result does not depend
    /// on the order keys were decoded in.
    fn apply_default_policies(&mut self) {
        if self.storage_policy.is_none() && self.storage_team_size > 0 {
            self.storage_policy = Some(ReplicationPolicy::across_zones(self.storage_team_size as u32));
        }
        if self.log_policy.is_none() && self.log_replication_factor > 0 {
            self.log_policy = Some(ReplicationPolicy::across_zones(
                self.log_replication_factor as u32,
            ));
        }
        if self.remote_log_policy.is_none() && self.remote_log_replication_factor > 0 {
            self.remote_log_policy = Some(ReplicationPolicy::across_zones(
                self.remote_log_replication_factor as u32,
            ));
        }
        for region in &mut self.regions {
            if region.satellite_log_policy.is_none() && region.satellite_log_replication_factor > 0 {
                region.satellite_log_policy = Some(ReplicationPolicy::across_zones(
                    region.satellite_log_replication_factor as u32,
                ));
            }
        }
    }
}

type DecodeFn = fn(&mut ConfigurationFields, &[u8]) -> ConfigurationResult<()>;

/// Registry entry for one key suffix.
pub struct FieldDecoder {
    pub suffix: &'static str,
    pub class: RecoveryClass,
    decode: DecodeFn,
}

use RecoveryClass::{HotReconfigurable as Hot, RecoveryRequired as Recovery};

static REGISTRY: &[FieldDecoder] = &[
    FieldDecoder { suffix: keys::INITIALIZED, class: Recovery, decode: decode_initialized },
    FieldDecoder { suffix: keys::PROXIES, class: Hot, decode: decode_proxies },
    FieldDecoder { suffix: keys::RESOLVERS, class: Hot, decode: decode_resolvers },
    FieldDecoder { suffix: keys::LOGS, class: Hot, decode: decode_logs },
    FieldDecoder { suffix: keys::AUTO_PROXIES, class: Hot, decode: decode_auto_proxies },
    FieldDecoder { suffix: keys::AUTO_RESOLVERS, class: Hot, decode: decode_auto_resolvers },
    FieldDecoder { suffix: keys::AUTO_LOGS, class: Hot, decode: decode_auto_logs },
    FieldDecoder { suffix: keys::REMOTE_LOGS, class: Hot, decode: decode_remote_logs },
    FieldDecoder { suffix: keys::LOG_REPLICAS, class: Recovery, decode: decode_log_replicas },
    FieldDecoder { suffix: keys::LOG_ANTI_QUORUM, class: Recovery, decode: decode_log_anti_quorum },
    FieldDecoder { suffix: keys::LOG_ENGINE, class: Recovery, decode: decode_log_engine },
    FieldDecoder { suffix: keys::LOG_REPLICATION_POLICY, class: Recovery, decode: decode_log_policy },
    FieldDecoder { suffix: keys::STORAGE_QUORUM, class: Recovery, decode: decode_storage_quorum },
    FieldDecoder { suffix: keys::STORAGE_REPLICAS, class: Recovery, decode: decode_storage_replicas },
    FieldDecoder { suffix: keys::STORAGE_ENGINE, class: Recovery, decode: decode_storage_engine },
    FieldDecoder { suffix: keys::STORAGE_REPLICATION_POLICY, class: Recovery, decode: decode_storage_policy },
    FieldDecoder { suffix: keys::REMOTE_LOG_REPLICAS, class: Recovery, decode: decode_remote_log_replicas },
    FieldDecoder { suffix: keys::REMOTE_LOG_POLICY, class: Recovery, decode: decode_remote_log_policy },
    FieldDecoder { suffix: keys::REGIONS, class: Recovery, decode: decode_region_list },
];

/// Find the decoder for a key suffix.
pub fn lookup(suffix: &str) -> Option<&'static FieldDecoder> {
    REGISTRY.iter().find(|decoder| decoder.suffix == suffix)
}

/// How the decoder treats a key of the table.
enum KeyKind<'a> {
    /// Outside the configuration prefix
    Foreign,
    /// Excluded-server entry, read through `excluded_servers`
    Excluded,
    /// Configuration key with no registered decoder
    Unknown(&'a str),
    Field(&'a str, &'static FieldDecoder),
}

impl<'a> KeyKind<'a> {
    fn of(key: &'a str) -> Self {
        if key.starts_with(keys::EXCLUDED_SERVERS_PREFIX) {
            return KeyKind::Excluded;
        }
        match keys::config_suffix(key) {
            None => KeyKind::Foreign,
            Some(suffix) => match lookup(suffix) {
                Some(decoder) => KeyKind::Field(suffix, decoder),
                None => KeyKind::Unknown(suffix),
            },
        }
    }
}

/// Recovery class of a full key, or `None` if the decoder ignores it.
pub fn classify(key: &str) -> Option<RecoveryClass> {
    keys::config_suffix(key)
        .and_then(lookup)
        .map(|decoder| decoder.class)
}

/// Every suffix the decoder understands.
pub fn known_suffixes() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|decoder| decoder.suffix)
}

// ==================
// Value parsers
// ==================

fn parse_int(value: &[u8]) -> ConfigurationResult<i32> {
    let text = std::str::from_utf8(value)
        .map_err(|_| ConfigurationError::malformed("value is not UTF-8"))?;
    text.trim()
        .parse::<i32>()
        .map_err(|e| ConfigurationError::malformed(format!("'{}': {}", text, e)))
}

/// A count: `AUTO_COUNT` or non-negative.
fn parse_count(value: &[u8]) -> ConfigurationResult<i32> {
    let count = parse_int(value)?;
    if count < AUTO_COUNT {
        return Err(ConfigurationError::malformed(format!("count out of range: {}", count)));
    }
    Ok(count)
}

fn parse_non_negative(value: &[u8]) -> ConfigurationResult<i32> {
    let n = parse_int(value)?;
    if n < 0 {
        return Err(ConfigurationError::malformed(format!("must not be negative: {}", n)));
    }
    Ok(n)
}

fn parse_store_type(value: &[u8]) -> ConfigurationResult<StoreType> {
    StoreType::from_tag(parse_int(value)?)
}

// ==================
// Field decoders
// ==================

fn decode_initialized(f: &mut ConfigurationFields, _: &[u8]) -> ConfigurationResult<()> {
    f.initialized = true;
    Ok(())
}

fn decode_proxies(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.proxy_count = parse_count(v)?;
    Ok(())
}

fn decode_resolvers(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.resolver_count = parse_count(v)?;
    Ok(())
}

fn decode_logs(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.desired_log_count = parse_count(v)?;
    Ok(())
}

fn decode_auto_proxies(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.auto_proxy_count = parse_non_negative(v)?;
    Ok(())
}

fn decode_auto_resolvers(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.auto_resolver_count = parse_non_negative(v)?;
    Ok(())
}

fn decode_auto_logs(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.auto_desired_log_count = parse_non_negative(v)?;
    Ok(())
}

fn decode_remote_logs(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.remote_desired_log_count = parse_count(v)?;
    Ok(())
}

fn decode_log_replicas(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.log_replication_factor = parse_non_negative(v)?;
    Ok(())
}

fn decode_log_anti_quorum(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.log_write_anti_quorum = parse_non_negative(v)?;
    Ok(())
}

fn decode_log_engine(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.log_store_type = Some(parse_store_type(v)?);
    Ok(())
}

fn decode_log_policy(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.log_policy = Some(ReplicationPolicy::decode(v)?);
    Ok(())
}

fn decode_storage_quorum(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.durable_storage_quorum = parse_non_negative(v)?;
    Ok(())
}

fn decode_storage_replicas(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.storage_team_size = parse_non_negative(v)?;
    Ok(())
}

fn decode_storage_engine(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.storage_store_type = Some(parse_store_type(v)?);
    Ok(())
}

fn decode_storage_policy(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.storage_policy = Some(ReplicationPolicy::decode(v)?);
    Ok(())
}

fn decode_remote_log_replicas(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.remote_log_replication_factor = parse_non_negative(v)?;
    Ok(())
}

fn decode_remote_log_policy(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.remote_log_policy = Some(ReplicationPolicy::decode(v)?);
    Ok(())
}

/// Replaces the whole list; a rejected blob leaves no regions.
fn decode_region_list(f: &mut ConfigurationFields, v: &[u8]) -> ConfigurationResult<()> {
    f.regions = decode_regions(v)?;
    Ok(())
}
