//! Configuration keyspace
//!
//! All configuration lives under a single system prefix. Field keys are the
//! prefix followed by a suffix from a fixed vocabulary; anything else under
//! the prefix is carried through untouched.

/// Prefix shared by every configuration key.
pub const CONFIG_KEY_PREFIX: &str = "\u{ff}/conf/";

/// Prefix of excluded-server keys (nested under the configuration prefix).
pub const EXCLUDED_SERVERS_PREFIX: &str = "\u{ff}/conf/excluded/";

// Field suffixes
pub const INITIALIZED: &str = "initialized";
pub const PROXIES: &str = "proxies";
pub const RESOLVERS: &str = "resolvers";
pub const LOGS: &str = "logs";
pub const AUTO_PROXIES: &str = "auto_proxies";
pub const AUTO_RESOLVERS: &str = "auto_resolvers";
pub const AUTO_LOGS: &str = "auto_logs";
pub const LOG_REPLICAS: &str = "log_replicas";
pub const LOG_ANTI_QUORUM: &str = "log_anti_quorum";
pub const LOG_ENGINE: &str = "log_engine";
pub const LOG_REPLICATION_POLICY: &str = "log_replication_policy";
pub const STORAGE_QUORUM: &str = "storage_quorum";
pub const STORAGE_REPLICAS: &str = "storage_replicas";
pub const STORAGE_ENGINE: &str = "storage_engine";
pub const STORAGE_REPLICATION_POLICY: &str = "storage_replication_policy";
pub const REMOTE_LOGS: &str = "remote_logs";
pub const REMOTE_LOG_REPLICAS: &str = "remote_log_replicas";
pub const REMOTE_LOG_POLICY: &str = "remote_log_policy";
pub const REGIONS: &str = "regions";

/// Build the full key for a configuration suffix.
pub fn config_key(suffix: &str) -> String {
    format!("{}{}", CONFIG_KEY_PREFIX, suffix)
}

/// Strip the configuration prefix, if present.
pub fn config_suffix(key: &str) -> Option<&str> {
    key.strip_prefix(CONFIG_KEY_PREFIX)
}

/// Half-open key range `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRange {
    pub begin: String,
    pub end: String,
}

impl KeyRange {
    /// Create a new range. An inverted range is empty.
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Range covering exactly one key.
    pub fn single(key: &str) -> Self {
        Self::new(key, format!("{}\0", key))
    }

    /// Range covering every key that starts with `prefix`.
    pub fn prefix(prefix: &str) -> Self {
        let mut end = prefix.to_string();
        match end.pop().and_then(|c| char::from_u32(c as u32 + 1)) {
            Some(next) => end.push(next),
            // Empty prefix or no successor char: cover everything above it.
            None => end = char::MAX.to_string(),
        }
        Self::new(prefix, end)
    }

    /// Range covering the whole configuration keyspace.
    pub fn config_keys() -> Self {
        Self::prefix(CONFIG_KEY_PREFIX)
    }

    /// Range covering all excluded-server keys.
    pub fn excluded_servers() -> Self {
        Self::prefix(EXCLUDED_SERVERS_PREFIX)
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    pub fn contains(&self, key: &str) -> bool {
        self.begin.as_str() <= key && key < self.end.as_str()
    }

    pub fn intersects(&self, other: &KeyRange) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlap of two ranges (possibly empty).
    pub fn intersection(&self, other: &KeyRange) -> KeyRange {
        KeyRange::new(
            std::cmp::max(&self.begin, &other.begin).clone(),
            std::cmp::min(&self.end, &other.end).clone(),
        )
    }
}
