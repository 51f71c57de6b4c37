//! Fault-tolerance calculator
//!
//! Pure functions of the decoded fields. Nothing here is cached, and no
//! result is clamped: a misconfigured cluster (anti-quorum at or above the
//! replication factor) yields zero or a negative tolerance, which callers
//! must read as "cannot safely lose anything".

use super::database::DatabaseConfiguration;
use super::region::RegionInfo;

fn to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl DatabaseConfiguration {
    /// Datacenters needed to host the topology at all: each region plus
    /// each of its satellites.
    pub fn min_datacenters_required(&self) -> i32 {
        let total: i64 = self
            .regions()
            .iter()
            .map(|region| 1 + region.satellites.len() as i64)
            .sum();
        to_i32(total)
    }

    /// Machines the smallest datacenter must have to satisfy the strictest
    /// per-datacenter replication requirement.
    pub fn min_machines_required_per_datacenter(&self) -> i32 {
        let f = self.fields();
        let base = f
            .remote_log_replication_factor
            .max(f.log_replication_factor)
            .max(f.storage_team_size);
        self.regions()
            .iter()
            .map(|region| region.satellite_log_replication_factor / region.satellite_log_usable_dcs.max(1))
            .fold(base, i32::max)
    }

    /// Machine failures the cluster survives without losing availability or
    /// durability. Losing a whole datacenter counts as one machine in
    /// topologies that can fail over.
    ///
    /// The worst satellite is the smallest satellite write quorum across
    /// regions, or 0 with no regions. Then:
    ///
    /// - remote region and healthy satellites: one extra failure is
    ///   absorbed by failing over to the remote region
    /// - satellites only: satellite replicas add to the primary's slack
    /// - otherwise: primary log slack, bounded by storage quorum slack
    pub fn max_machine_failures_tolerated(&self) -> i32 {
        let f = self.fields();
        let log_replicas = i64::from(f.log_replication_factor);
        let anti_quorum = i64::from(f.log_write_anti_quorum);
        let storage_slack = i64::from(f.durable_storage_quorum) - 1;

        let worst_satellite = self
            .regions()
            .iter()
            .map(|region| i64::from(region.satellite_write_quorum()))
            .min()
            .unwrap_or(0);

        let tolerated = if f.remote_log_replication_factor > 0 && worst_satellite > 0 {
            1 + (log_replicas - 1 - anti_quorum)
                .max(worst_satellite - 1)
                .min(storage_slack)
        } else if worst_satellite > 0 {
            (log_replicas + worst_satellite - 2 - anti_quorum).min(storage_slack)
        } else {
            (log_replicas - 1 - anti_quorum).min(storage_slack)
        };
        to_i32(tolerated)
    }

    /// Log sets a recovery in `dc_id` should expect: the primary, plus
    /// satellites when the datacenter's region has them, plus the remote.
    pub fn expected_log_sets(&self, dc_id: Option<&str>) -> i32 {
        let mut sets = 1;
        if dc_id.is_some() && self.get_region(dc_id).satellite_log_replication_factor > 0 {
            sets += 1;
        }
        if self.fields().remote_log_replication_factor > 0 {
            sets += 1;
        }
        sets
    }

    /// Region whose satellites give the weakest write quorum, if any.
    pub fn worst_satellite_region(&self) -> Option<&RegionInfo> {
        self.regions()
            .iter()
            .min_by_key(|region| region.satellite_write_quorum())
    }
}
