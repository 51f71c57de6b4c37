//! Replication policies
//!
//! A policy describes which sets of servers are acceptable homes for the
//! replicas of one role. This crate only stores and forwards policies; the
//! placement layer is the one that calls [`ReplicationPolicy::satisfied_by`].
//!
//! Policies are persisted as JSON:
//!
//! ```text
//! {"type":"across","count":3,"attribute":"zoneid","of":{"type":"one"}}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigurationError, ConfigurationResult};

/// Locality attribute used by default policies.
pub const DEFAULT_POLICY_ATTRIBUTE: &str = "zoneid";

/// Locality of a candidate server: attribute name to value.
pub type Locality = BTreeMap<String, String>;

/// Closed set of replication policy shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplicationPolicy {
    /// Any single server
    One,
    /// `count` distinct values of `attribute`, each group satisfying `of`
    Across {
        count: u32,
        attribute: String,
        of: Box<ReplicationPolicy>,
    },
    /// Every listed policy at once
    And { policies: Vec<ReplicationPolicy> },
}

impl ReplicationPolicy {
    pub fn across(count: u32, attribute: impl Into<String>, of: ReplicationPolicy) -> Self {
        ReplicationPolicy::Across {
            count,
            attribute: attribute.into(),
            of: Box::new(of),
        }
    }

    /// `count` servers in distinct zones.
    pub fn across_zones(count: u32) -> Self {
        Self::across(count, DEFAULT_POLICY_ATTRIBUTE, ReplicationPolicy::One)
    }

    /// Decode a policy blob.
    pub fn decode(bytes: &[u8]) -> ConfigurationResult<Self> {
        let policy: ReplicationPolicy = serde_json::from_slice(bytes)
            .map_err(|e| ConfigurationError::InvalidPolicy(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn encode(&self) -> Vec<u8> {
        // Serializing a plain enum tree to JSON cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub(super) fn validate(&self) -> ConfigurationResult<()> {
        match self {
            ReplicationPolicy::One => Ok(()),
            ReplicationPolicy::Across { attribute, of, .. } => {
                if attribute.is_empty() {
                    return Err(ConfigurationError::InvalidPolicy(
                        "across policy requires an attribute".into(),
                    ));
                }
                of.validate()
            }
            ReplicationPolicy::And { policies } => {
                if policies.is_empty() {
                    return Err(ConfigurationError::InvalidPolicy(
                        "and policy requires at least one member".into(),
                    ));
                }
                policies.iter().try_for_each(ReplicationPolicy::validate)
            }
        }
    }

    /// Smallest number of servers that can satisfy this policy.
    pub fn required_servers(&self) -> u32 {
        match self {
            ReplicationPolicy::One => 1,
            ReplicationPolicy::Across { count, of, .. } => count.saturating_mul(of.required_servers()),
            ReplicationPolicy::And { policies } => policies
                .iter()
                .map(ReplicationPolicy::required_servers)
                .max()
                .unwrap_or(0),
        }
    }

    /// Locality attributes this policy inspects.
    pub fn attribute_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        self.collect_attributes(&mut keys);
        keys
    }

    fn collect_attributes(&self, keys: &mut BTreeSet<String>) {
        match self {
            ReplicationPolicy::One => {}
            ReplicationPolicy::Across { attribute, of, .. } => {
                keys.insert(attribute.clone());
                of.collect_attributes(keys);
            }
            ReplicationPolicy::And { policies } => {
                for policy in policies {
                    policy.collect_attributes(keys);
                }
            }
        }
    }

    /// Whether `candidates` contains a subset acceptable to this policy.
    ///
    /// Candidates missing an `Across` attribute never count toward it.
    pub fn satisfied_by(&self, candidates: &[Locality]) -> bool {
        match self {
            ReplicationPolicy::One => !candidates.is_empty(),
            ReplicationPolicy::Across {
                count,
                attribute,
                of,
            } => {
                let mut groups: BTreeMap<&str, Vec<Locality>> = BTreeMap::new();
                for candidate in candidates {
                    if let Some(value) = candidate.get(attribute) {
                        groups
                            .entry(value.as_str())
                            .or_default()
                            .push(candidate.clone());
                    }
                }
                let satisfied = groups.values().filter(|group| of.satisfied_by(group)).count();
                satisfied as u64 >= u64::from(*count)
            }
            ReplicationPolicy::And { policies } => {
                policies.iter().all(|policy| policy.satisfied_by(candidates))
            }
        }
    }
}

impl fmt::Display for ReplicationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationPolicy::One => write!(f, "1"),
            ReplicationPolicy::Across {
                count,
                attribute,
                of,
            } => write!(f, "{}^{} x {}", attribute, count, of),
            ReplicationPolicy::And { policies } => {
                write!(f, "(")?;
                for (idx, policy) in policies.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{}", policy)?;
                }
                write!(f, ")")
            }
        }
    }
}
