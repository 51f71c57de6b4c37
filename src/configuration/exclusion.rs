//! Excluded servers
//!
//! An operator excludes a whole machine (`<ip>`) or a single process
//! (`<ip>:<port>`) by writing an empty value at
//! `\xff/conf/excluded/<address>`. These keys are not decoded into fields;
//! they are read straight from the raw table.

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use super::database::DatabaseConfiguration;
use super::errors::ConfigurationError;
use super::keys::{KeyRange, EXCLUDED_SERVERS_PREFIX};

/// A machine, or one process on a machine, excluded from the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressExclusion {
    pub ip: IpAddr,
    /// `None` excludes every process on the machine
    pub port: Option<u16>,
}

impl AddressExclusion {
    pub fn machine(ip: IpAddr) -> Self {
        Self { ip, port: None }
    }

    pub fn process(addr: SocketAddr) -> Self {
        Self {
            ip: addr.ip(),
            port: Some(addr.port()),
        }
    }

    pub fn is_whole_machine(&self) -> bool {
        self.port.is_none()
    }

    /// Whether a process at `addr` falls under this exclusion.
    pub fn excludes(&self, addr: SocketAddr) -> bool {
        self.ip == addr.ip() && self.port.map_or(true, |port| port == addr.port())
    }

    /// Configuration key recording this exclusion.
    pub fn key(&self) -> String {
        format!("{}{}", EXCLUDED_SERVERS_PREFIX, self)
    }

    /// Parse an excluded-server key. Returns `None` for malformed keys.
    pub fn from_key(key: &str) -> Option<Self> {
        key.strip_prefix(EXCLUDED_SERVERS_PREFIX)?.parse().ok()
    }
}

impl fmt::Display for AddressExclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}", SocketAddr::new(self.ip, port)),
            None => write!(f, "{}", self.ip),
        }
    }
}

impl FromStr for AddressExclusion {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::machine(ip));
        }
        s.parse::<SocketAddr>()
            .map(Self::process)
            .map_err(|_| ConfigurationError::malformed(format!("'{}' is not an address", s)))
    }
}

impl DatabaseConfiguration {
    /// Whether the process at `addr` is excluded, either by its exact
    /// address or because its whole machine is.
    pub fn is_excluded_server(&self, addr: SocketAddr) -> bool {
        self.get(&AddressExclusion::process(addr).key()).is_some()
            || self.get(&AddressExclusion::machine(addr.ip()).key()).is_some()
    }

    /// Every well-formed exclusion in the table.
    pub fn excluded_servers(&self) -> BTreeSet<AddressExclusion> {
        let range = KeyRange::excluded_servers();
        self.raw_store()
            .iter()
            .filter(|(key, _)| range.contains(key))
            .filter_map(|(key, _)| AddressExclusion::from_key(key))
            .collect()
    }
}
