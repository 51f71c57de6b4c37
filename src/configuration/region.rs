//! Region and satellite topology
//!
//! The region list is a single blob in the configuration table. Decoding it
//! always yields a complete replacement list: regions sorted by descending
//! priority, satellites within each region sorted the same way. Both sorts
//! are stable, so equal priorities keep their encoded order.
//!
//! Blob format (JSON, omitted fields take the `RegionInfo` defaults):
//!
//! ```text
//! [{"datacenter":"dc1","priority":1,
//!   "satellite_log_replicas":2,"satellite_anti_quorum":0,
//!   "satellite_logs":-1,"satellite_usable_dcs":1,
//!   "satellites":[{"datacenter":"dc1s","priority":1}]}]
//! ```

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigurationError, ConfigurationResult};
use super::policy::ReplicationPolicy;
use super::AUTO_COUNT;

/// An auxiliary datacenter attached to a region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    #[serde(rename = "datacenter")]
    pub dc_id: String,
    #[serde(default)]
    pub priority: i32,
}

impl SatelliteInfo {
    pub fn new(dc_id: impl Into<String>, priority: i32) -> Self {
        Self {
            dc_id: dc_id.into(),
            priority,
        }
    }
}

/// A region: one primary-capable datacenter plus its satellites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionInfo {
    #[serde(rename = "datacenter")]
    pub dc_id: String,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satellite_log_policy: Option<ReplicationPolicy>,
    #[serde(rename = "satellite_logs")]
    pub satellite_desired_log_count: i32,
    #[serde(rename = "satellite_log_replicas")]
    pub satellite_log_replication_factor: i32,
    #[serde(rename = "satellite_anti_quorum")]
    pub satellite_log_write_anti_quorum: i32,
    #[serde(rename = "satellite_usable_dcs")]
    pub satellite_log_usable_dcs: i32,
    pub satellites: Vec<SatelliteInfo>,
}

impl Default for RegionInfo {
    fn default() -> Self {
        Self::NONE
    }
}

impl RegionInfo {
    /// No region-specific configuration: priority 0, no satellites, no overrides.
    pub const NONE: RegionInfo = RegionInfo {
        dc_id: String::new(),
        priority: 0,
        satellite_log_policy: None,
        satellite_desired_log_count: AUTO_COUNT,
        satellite_log_replication_factor: 0,
        satellite_log_write_anti_quorum: 0,
        satellite_log_usable_dcs: 1,
        satellites: Vec::new(),
    };

    pub fn new(dc_id: impl Into<String>, priority: i32) -> Self {
        Self {
            dc_id: dc_id.into(),
            priority,
            ..Self::default()
        }
    }

    /// Replicas a satellite log write needs before it is durable.
    pub fn satellite_write_quorum(&self) -> i32 {
        self.satellite_log_replication_factor - self.satellite_log_write_anti_quorum
    }

    fn sort_satellites(&mut self) {
        self.satellites.sort_by_key(|satellite| Reverse(satellite.priority));
    }

    fn check_values(&self) -> ConfigurationResult<()> {
        let invalid = |field: &str, value: i32| {
            Err(ConfigurationError::InvalidRegions(format!(
                "region '{}' has invalid {}: {}",
                self.dc_id, field, value
            )))
        };
        if self.satellite_log_replication_factor < 0 {
            return invalid("satellite_log_replicas", self.satellite_log_replication_factor);
        }
        if self.satellite_log_write_anti_quorum < 0 {
            return invalid("satellite_anti_quorum", self.satellite_log_write_anti_quorum);
        }
        if self.satellite_log_usable_dcs < 0 {
            return invalid("satellite_usable_dcs", self.satellite_log_usable_dcs);
        }
        if self.satellite_desired_log_count < AUTO_COUNT {
            return invalid("satellite_logs", self.satellite_desired_log_count);
        }
        if let Some(policy) = &self.satellite_log_policy {
            policy.validate().map_err(|e| {
                ConfigurationError::InvalidRegions(format!(
                    "region '{}' has invalid satellite_log_policy: {}",
                    self.dc_id, e
                ))
            })?;
        }
        Ok(())
    }
}

/// Check datacenter ids across a region list.
///
/// Region ids must be non-empty and unique. Within a region, satellite ids
/// must be non-empty, unique and differ from the region's own id.
pub fn check_datacenter_ids(regions: &[RegionInfo]) -> ConfigurationResult<()> {
    let mut region_ids = HashSet::new();
    for region in regions {
        if region.dc_id.is_empty() {
            return Err(ConfigurationError::InvalidRegions(
                "region datacenter id must not be empty".into(),
            ));
        }
        if !region_ids.insert(region.dc_id.as_str()) {
            return Err(ConfigurationError::DuplicateDatacenter(region.dc_id.clone()));
        }

        let mut satellite_ids = HashSet::new();
        satellite_ids.insert(region.dc_id.as_str());
        for satellite in &region.satellites {
            if satellite.dc_id.is_empty() {
                return Err(ConfigurationError::InvalidRegions(format!(
                    "satellite of region '{}' has an empty datacenter id",
                    region.dc_id
                )));
            }
            if !satellite_ids.insert(satellite.dc_id.as_str()) {
                return Err(ConfigurationError::DuplicateDatacenter(satellite.dc_id.clone()));
            }
        }
    }
    Ok(())
}

/// Decode a region-list blob into a sorted, validated list.
pub fn decode_regions(bytes: &[u8]) -> ConfigurationResult<Vec<RegionInfo>> {
    let mut regions: Vec<RegionInfo> = serde_json::from_slice(bytes)
        .map_err(|e| ConfigurationError::InvalidRegions(e.to_string()))?;

    for region in &regions {
        region.check_values()?;
    }
    check_datacenter_ids(&regions)?;

    regions.sort_by_key(|region| Reverse(region.priority));
    for region in &mut regions {
        region.sort_satellites();
    }
    Ok(regions)
}

pub fn encode_regions(regions: &[RegionInfo]) -> Vec<u8> {
    serde_json::to_vec(regions).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_region_has_no_overrides() {
        let region = RegionInfo::default();
        assert_eq!(region.priority, 0);
        assert_eq!(region.satellite_desired_log_count, AUTO_COUNT);
        assert_eq!(region.satellite_log_replication_factor, 0);
        assert_eq!(region.satellite_log_usable_dcs, 1);
        assert!(region.satellites.is_empty());
    }

    #[test]
    fn test_decode_sorts_regions_and_satellites() {
        let blob = br#"[
            {"datacenter":"east","priority":1,
             "satellites":[{"datacenter":"e1","priority":1},
                           {"datacenter":"e2","priority":5},
                           {"datacenter":"e3","priority":1}]},
            {"datacenter":"west","priority":9}
        ]"#;
        let regions = decode_regions(blob).unwrap();
        assert_eq!(regions[0].dc_id, "west");
        assert_eq!(regions[1].dc_id, "east");
        let order: Vec<_> = regions[1].satellites.iter().map(|s| s.dc_id.as_str()).collect();
        assert_eq!(order, vec!["e2", "e1", "e3"]);
    }

    #[test]
    fn test_decode_applies_defaults() {
        let regions = decode_regions(br#"[{"datacenter":"dc1"}]"#).unwrap();
        assert_eq!(regions[0].satellite_log_usable_dcs, 1);
        assert_eq!(regions[0].satellite_desired_log_count, AUTO_COUNT);
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let blob = br#"[{"datacenter":"dc1","priority":1},{"datacenter":"dc1","priority":0}]"#;
        assert!(matches!(
            decode_regions(blob),
            Err(ConfigurationError::DuplicateDatacenter(dc)) if dc == "dc1"
        ));
    }

    #[test]
    fn test_satellite_matching_region_rejected() {
        let blob = br#"[{"datacenter":"dc1","satellites":[{"datacenter":"dc1"}]}]"#;
        assert!(decode_regions(blob).is_err());
    }

    #[test]
    fn test_negative_values_rejected() {
        assert!(decode_regions(br#"[{"datacenter":"dc1","satellite_log_replicas":-2}]"#).is_err());
        assert!(decode_regions(br#"[{"datacenter":"dc1","satellite_logs":-3}]"#).is_err());
        assert!(decode_regions(br#"[{"datacenter":""}]"#).is_err());
    }

    #[test]
    fn test_satellite_policy_validated() {
        let empty_and = br#"{"type":"and","policies":[]}"#;
        assert!(ReplicationPolicy::decode(empty_and).is_err());

        let blob = br#"[{"datacenter":"dc1","satellite_log_replicas":2,
            "satellite_log_policy":{"type":"and","policies":[]}}]"#;
        assert!(matches!(
            decode_regions(blob),
            Err(ConfigurationError::InvalidRegions(_))
        ));

        let nested = br#"[{"datacenter":"dc1",
            "satellite_log_policy":{"type":"across","count":2,"attribute":"","of":{"type":"one"}}}]"#;
        assert!(decode_regions(nested).is_err());

        let valid = br#"[{"datacenter":"dc1",
            "satellite_log_policy":{"type":"across","count":2,"attribute":"zoneid","of":{"type":"one"}}}]"#;
        assert!(decode_regions(valid).unwrap()[0].satellite_log_policy.is_some());
    }

    #[test]
    fn test_encode_decode() {
        let mut region = RegionInfo::new("dc1", 2);
        region.satellite_log_replication_factor = 2;
        region.satellites.push(SatelliteInfo::new("dc2", 1));
        let decoded = decode_regions(&encode_regions(&[region.clone()])).unwrap();
        assert_eq!(decoded, vec![region]);
    }
}
