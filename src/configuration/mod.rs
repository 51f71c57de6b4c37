//! Configuration subsystem
//!
//! The replication topology of a database lives in the system keyspace as
//! raw key/value pairs under `\xff/conf/`. This subsystem decodes that table
//! into typed fields and answers questions about it.
//!
//! # Rules
//!
//! - The raw table is the single source of truth; typed fields are derived
//! - Unknown keys and malformed values are ignored but never dropped
//! - Every mutation reports whether it needs a cluster recovery
//! - Readers hold immutable snapshots; writers swap in a new one
//! - Equality, hashing and persistence use the raw table only

mod codec;
mod database;
mod decoder;
mod engine;
mod errors;
mod exclusion;
pub mod keys;
mod mutation;
mod policy;
mod raw;
mod region;
mod status;
mod tolerance;

/// Count sentinel meaning "use the automatic value".
pub const AUTO_COUNT: i32 = -1;

pub use codec::{decode_snapshot, encode_snapshot, fingerprint, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use database::DatabaseConfiguration;
pub use decoder::{classify, known_suffixes, AutoCountDefaults, ConfigurationFields, RecoveryClass};
pub use engine::StoreType;
pub use errors::{ConfigurationError, ConfigurationResult};
pub use exclusion::AddressExclusion;
pub use keys::{config_key, KeyRange, CONFIG_KEY_PREFIX, EXCLUDED_SERVERS_PREFIX};
pub use mutation::Mutation;
pub use policy::{Locality, ReplicationPolicy, DEFAULT_POLICY_ATTRIBUTE};
pub use raw::{ConfigurationEntry, RawConfiguration, RawStore};
pub use region::{check_datacenter_ids, decode_regions, encode_regions, RegionInfo, SatelliteInfo};
pub use status::RedundancyMode;
