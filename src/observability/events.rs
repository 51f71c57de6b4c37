//! Observability events
//!
//! Events are explicit and typed. Each event carries its own severity.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration table
    /// Full table decoded from a bulk load
    ConfigurationLoaded,
    /// Single set or clear applied
    MutationApplied,
    /// Mutation touched a key that needs cluster recovery
    RecoveryRequired,

    // Decoding
    /// Key under the configuration prefix with no decoder
    UnknownKeyIgnored,
    /// Known key whose value failed to decode
    MalformedValueIgnored,
    /// Region list blob rejected
    RegionListRejected,

    // Persisted snapshots
    /// Snapshot written
    SnapshotEncoded,
    /// Snapshot read and verified
    SnapshotDecoded,
    /// Snapshot failed verification
    SnapshotRejected,

    // Tool
    /// Tool configuration file loaded
    ToolConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigurationLoaded => "CONFIGURATION_LOADED",
            Event::MutationApplied => "CONFIGURATION_MUTATION_APPLIED",
            Event::RecoveryRequired => "CONFIGURATION_RECOVERY_REQUIRED",

            Event::UnknownKeyIgnored => "CONFIGURATION_UNKNOWN_KEY_IGNORED",
            Event::MalformedValueIgnored => "CONFIGURATION_MALFORMED_VALUE_IGNORED",
            Event::RegionListRejected => "CONFIGURATION_REGION_LIST_REJECTED",

            Event::SnapshotEncoded => "CONFIGURATION_SNAPSHOT_ENCODED",
            Event::SnapshotDecoded => "CONFIGURATION_SNAPSHOT_DECODED",
            Event::SnapshotRejected => "CONFIGURATION_SNAPSHOT_REJECTED",

            Event::ToolConfigLoaded => "TOOL_CONFIG_LOADED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::UnknownKeyIgnored | Event::MutationApplied => Severity::Trace,
            Event::MalformedValueIgnored | Event::RegionListRejected => Severity::Warn,
            Event::SnapshotRejected => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
