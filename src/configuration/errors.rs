//! # Configuration Errors
//!
//! Error types for the configuration subsystem.
//!
//! Decode failures on individual keys never reach `set`/`clear` callers:
//! the decoder logs them and ignores the key. These errors surface from the
//! blob codecs, the persisted snapshot codec and explicit validation calls.

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    // ==================
    // Value Decoding
    // ==================

    /// Value could not be parsed for the addressed field
    #[error("Malformed value: {0}")]
    MalformedValue(String),

    /// Store type tag outside the known enumeration
    #[error("Unknown store type tag: {0}")]
    UnknownStoreType(i32),

    /// Replication policy blob could not be decoded
    #[error("Invalid replication policy: {0}")]
    InvalidPolicy(String),

    // ==================
    // Topology
    // ==================

    /// Region list blob could not be decoded
    #[error("Invalid region list: {0}")]
    InvalidRegions(String),

    /// Two regions (or a region and one of its satellites) share a datacenter id
    #[error("Duplicate datacenter id in region list: '{0}'")]
    DuplicateDatacenter(String),

    // ==================
    // Snapshot Codec
    // ==================

    /// Persisted snapshot is structurally invalid
    #[error("Snapshot corrupted: {0}")]
    SnapshotCorrupted(String),

    /// Persisted snapshot checksum does not match its contents
    #[error("Snapshot checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// Persisted snapshot was written by an unknown format version
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),
}

impl ConfigurationError {
    /// Create a malformed value error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedValue(reason.into())
    }

    /// Get the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedValue(_) => "AERO_CONFIG_MALFORMED_VALUE",
            Self::UnknownStoreType(_) => "AERO_CONFIG_UNKNOWN_STORE_TYPE",
            Self::InvalidPolicy(_) => "AERO_CONFIG_INVALID_POLICY",
            Self::InvalidRegions(_) => "AERO_CONFIG_INVALID_REGIONS",
            Self::DuplicateDatacenter(_) => "AERO_CONFIG_DUPLICATE_DATACENTER",
            Self::SnapshotCorrupted(_) => "AERO_CONFIG_SNAPSHOT_CORRUPTED",
            Self::ChecksumMismatch { .. } => "AERO_CONFIG_CHECKSUM_MISMATCH",
            Self::UnsupportedVersion(_) => "AERO_CONFIG_UNSUPPORTED_VERSION",
        }
    }
}
