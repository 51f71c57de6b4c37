//! Status export
//!
//! Renders a configuration the way operators read it: a named redundancy
//! mode and storage engine where the settings match a well-known shape,
//! explicit values otherwise. An uninitialized configuration exports an
//! empty object.

use std::fmt;

use serde_json::{json, Map, Value};

use super::database::DatabaseConfiguration;
use super::engine::StoreType;
use super::policy::ReplicationPolicy;
use super::region::RegionInfo;
use super::AUTO_COUNT;

/// Named replication shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedundancyMode {
    Single,
    Double,
    Triple,
    ThreeDataHall,
    Custom,
}

impl RedundancyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedundancyMode::Single => "single",
            RedundancyMode::Double => "double",
            RedundancyMode::Triple => "triple",
            RedundancyMode::ThreeDataHall => "three_data_hall",
            RedundancyMode::Custom => "custom",
        }
    }
}

impl fmt::Display for RedundancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const THREE_DATA_HALL_LOG_POLICY: &str = "data_hall^2 x zoneid^2 x 1";
const THREE_DATA_HALL_STORAGE_POLICY: &str = "data_hall^3 x 1";

fn remote_redundancy_name(factor: i32) -> &'static str {
    match factor {
        1 => "remote_single",
        2 => "remote_double",
        3 => "remote_triple",
        _ => "remote_custom",
    }
}

impl DatabaseConfiguration {
    /// Named redundancy mode, or `None` before initialization.
    pub fn redundancy_mode(&self) -> Option<RedundancyMode> {
        let f = self.fields();
        if !f.initialized {
            return None;
        }
        if f.durable_storage_quorum != f.storage_team_size || f.log_write_anti_quorum != 0 {
            return Some(RedundancyMode::Custom);
        }

        let policy_is = |policy: &Option<ReplicationPolicy>, expected: &str| {
            policy.as_ref().is_some_and(|p| p.to_string() == expected)
        };

        let mode = match (f.log_replication_factor, f.durable_storage_quorum) {
            (1, 1) => RedundancyMode::Single,
            (2, 2) => RedundancyMode::Double,
            (4, 3)
                if policy_is(&f.log_policy, THREE_DATA_HALL_LOG_POLICY)
                    && policy_is(&f.storage_policy, THREE_DATA_HALL_STORAGE_POLICY) =>
            {
                RedundancyMode::ThreeDataHall
            }
            (3, 3) => RedundancyMode::Triple,
            _ => RedundancyMode::Custom,
        };
        Some(mode)
    }

    /// Engine name when logs and storage agree on a known pairing.
    pub fn storage_engine_name(&self) -> &'static str {
        let f = self.fields();
        match (f.log_store_type, f.storage_store_type) {
            (Some(StoreType::SsdBtreeV1), Some(StoreType::SsdBtreeV1)) => "ssd-1",
            (Some(StoreType::SsdBtreeV2), Some(StoreType::SsdBtreeV2)) => "ssd-2",
            (Some(StoreType::Memory), Some(StoreType::Memory)) => "memory",
            _ => "custom",
        }
    }

    /// Structured export of the configuration.
    pub fn to_json(&self, no_policies: bool) -> Value {
        let mut out = Map::new();
        let Some(mode) = self.redundancy_mode() else {
            return Value::Object(out);
        };
        let f = self.fields();

        out.insert("redundancy_mode".into(), json!(mode.as_str()));
        if mode == RedundancyMode::Custom {
            out.insert("log_replicas".into(), json!(f.log_replication_factor));
            out.insert("log_anti_quorum".into(), json!(f.log_write_anti_quorum));
            out.insert("storage_replicas".into(), json!(f.storage_team_size));
            out.insert("storage_quorum".into(), json!(f.durable_storage_quorum));
        }
        if mode == RedundancyMode::Custom && !no_policies {
            if let Some(policy) = &f.log_policy {
                out.insert("log_replication_policy".into(), json!(policy.to_string()));
            }
            if let Some(policy) = &f.storage_policy {
                out.insert("storage_replication_policy".into(), json!(policy.to_string()));
            }
        }

        let engine = self.storage_engine_name();
        out.insert("storage_engine".into(), json!(engine));
        if engine == "custom" {
            let tag = |store: Option<StoreType>| store.map_or(Value::Null, |s| json!(s.tag()));
            out.insert("log_engine".into(), tag(f.log_store_type));
            out.insert("storage_engine_type".into(), tag(f.storage_store_type));
        }

        if f.remote_log_replication_factor > 0 {
            out.insert(
                "remote_redundancy_mode".into(),
                json!(remote_redundancy_name(f.remote_log_replication_factor)),
            );
            out.insert("remote_log_replicas".into(), json!(f.remote_log_replication_factor));
            if !no_policies {
                if let Some(policy) = &f.remote_log_policy {
                    out.insert("remote_log_policy".into(), json!(policy.to_string()));
                }
            }
        }

        if !f.regions.is_empty() {
            let regions: Vec<Value> = f
                .regions
                .iter()
                .map(|region| region_json(region, no_policies))
                .collect();
            out.insert("regions".into(), Value::Array(regions));
        }

        let explicit = [
            ("proxies", f.proxy_count),
            ("resolvers", f.resolver_count),
            ("logs", f.desired_log_count),
            ("remote_logs", f.remote_desired_log_count),
        ];
        for (name, count) in explicit {
            if count != AUTO_COUNT {
                out.insert(name.into(), json!(count));
            }
        }

        let defaults = self.auto_count_defaults();
        let automatic = [
            ("auto_proxies", f.auto_proxy_count, defaults.proxies),
            ("auto_resolvers", f.auto_resolver_count, defaults.resolvers),
            ("auto_logs", f.auto_desired_log_count, defaults.logs),
        ];
        for (name, count, default) in automatic {
            if count != default {
                out.insert(name.into(), json!(count));
            }
        }

        out.insert(
            "fault_tolerance".into(),
            json!({
                "max_machine_failures_tolerated": self.max_machine_failures_tolerated(),
                "min_datacenters_required": self.min_datacenters_required(),
                "min_machines_required_per_datacenter": self.min_machines_required_per_datacenter(),
            }),
        );

        Value::Object(out)
    }
}

fn region_json(region: &RegionInfo, no_policies: bool) -> Value {
    let satellites: Vec<Value> = region
        .satellites
        .iter()
        .map(|s| json!({ "datacenter": s.dc_id, "priority": s.priority }))
        .collect();

    let mut out = Map::new();
    out.insert("datacenter".into(), json!(region.dc_id));
    out.insert("priority".into(), json!(region.priority));
    if region.satellite_log_replication_factor > 0 {
        out.insert(
            "satellite_log_replicas".into(),
            json!(region.satellite_log_replication_factor),
        );
        out.insert(
            "satellite_anti_quorum".into(),
            json!(region.satellite_log_write_anti_quorum),
        );
        out.insert("satellite_usable_dcs".into(), json!(region.satellite_log_usable_dcs));
        if region.satellite_desired_log_count != AUTO_COUNT {
            out.insert("satellite_logs".into(), json!(region.satellite_desired_log_count));
        }
        if !no_policies {
            if let Some(policy) = &region.satellite_log_policy {
                out.insert("satellite_log_policy".into(), json!(policy.to_string()));
            }
        }
    }
    out.insert("satellites".into(), Value::Array(satellites));
    Value::Object(out)
}

impl fmt::Display for DatabaseConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        let Some(mode) = self.redundancy_mode() else {
            return writeln!(f, "  Database            - uninitialized");
        };
        let fields = self.fields();

        writeln!(f, "  Redundancy mode     - {}", mode)?;
        writeln!(f, "  Storage engine      - {}", self.storage_engine_name())?;
        writeln!(f, "  Desired proxies     - {}", self.get_desired_proxies())?;
        writeln!(f, "  Desired resolvers   - {}", self.get_desired_resolvers())?;
        writeln!(f, "  Desired logs        - {}", self.get_desired_logs())?;
        if fields.remote_log_replication_factor > 0 {
            writeln!(
                f,
                "  Remote redundancy   - {}",
                remote_redundancy_name(fields.remote_log_replication_factor)
            )?;
            writeln!(f, "  Desired remote logs - {}", self.get_desired_remote_logs())?;
        }
        for region in &fields.regions {
            let satellites: Vec<&str> = region.satellites.iter().map(|s| s.dc_id.as_str()).collect();
            if satellites.is_empty() {
                writeln!(f, "  Region              - {} (priority {})", region.dc_id, region.priority)?;
            } else {
                writeln!(
                    f,
                    "  Region              - {} (priority {}, satellites {})",
                    region.dc_id,
                    region.priority,
                    satellites.join(", ")
                )?;
            }
        }
        writeln!(
            f,
            "  Fault tolerance     - {} machine(s)",
            self.max_machine_failures_tolerated()
        )?;
        if !self.is_valid() {
            writeln!(f, "  Warning             - configuration is not valid")?;
        }
        Ok(())
    }
}
