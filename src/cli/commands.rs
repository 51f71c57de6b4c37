//! CLI command implementations
//!
//! Every command loads the tool configuration, then a snapshot, then works
//! on the decoded `DatabaseConfiguration`. Commands return their result and
//! `run_command` prints it, so the commands themselves are testable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::configuration::{
    config_key, decode_snapshot, AutoCountDefaults, DatabaseConfiguration, KeyRange, Mutation,
    RawConfiguration, CONFIG_KEY_PREFIX, SNAPSHOT_MAGIC,
};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_file, write_file, write_json, write_text};

/// Tool configuration file (`aeroconf.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Automatic proxy count for snapshots that do not set one (default 3)
    #[serde(default = "default_auto_proxies")]
    pub auto_proxies: i32,

    /// Automatic resolver count (default 1)
    #[serde(default = "default_auto_resolvers")]
    pub auto_resolvers: i32,

    /// Automatic log count (default 3)
    #[serde(default = "default_auto_logs")]
    pub auto_logs: i32,

    /// Minimum log severity (default "warn")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_auto_proxies() -> i32 {
    3
}
fn default_auto_resolvers() -> i32 {
    1
}
fn default_auto_logs() -> i32 {
    3
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            auto_proxies: default_auto_proxies(),
            auto_resolvers: default_auto_resolvers(),
            auto_logs: default_auto_logs(),
            log_level: default_log_level(),
        }
    }
}

impl ToolConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: ToolConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> CliResult<()> {
        let counts = [
            ("auto_proxies", self.auto_proxies),
            ("auto_resolvers", self.auto_resolvers),
            ("auto_logs", self.auto_logs),
        ];
        for (name, value) in counts {
            if value < 1 {
                return Err(CliError::config_error(format!(
                    "{} must be >= 1, got {}",
                    name, value
                )));
            }
        }

        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse::<Severity>()
            .map_err(|e| CliError::config_error(format!("Invalid log_level: {}", e)))
    }

    pub fn auto_count_defaults(&self) -> AutoCountDefaults {
        AutoCountDefaults {
            proxies: self.auto_proxies,
            resolvers: self.auto_resolvers,
            logs: self.auto_logs,
        }
    }
}

// ==================
// Snapshots
// ==================

/// On-disk snapshot encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// JSON object of key to value
    Json,
    /// Checksummed binary codec
    Binary,
}

impl SnapshotFormat {
    /// Format implied by a file name: `.json` is JSON, anything else binary
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => SnapshotFormat::Json,
            _ => SnapshotFormat::Binary,
        }
    }
}

/// Prepend the configuration prefix to bare suffixes.
fn full_key(key: &str) -> String {
    if key.starts_with(CONFIG_KEY_PREFIX) {
        key.to_string()
    } else {
        config_key(key)
    }
}

fn parse_json_snapshot(bytes: &[u8]) -> CliResult<RawConfiguration> {
    let object: Map<String, Value> = serde_json::from_slice(bytes)
        .map_err(|e| CliError::snapshot_error(format!("Invalid snapshot JSON: {}", e)))?;

    object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(CliError::snapshot_error(format!(
                        "Value of '{}' must be a string, got {}",
                        key, other
                    )))
                }
            };
            Ok((full_key(&key), value))
        })
        .collect()
}

/// Read a snapshot file, detecting its format by magic.
pub fn load_snapshot(
    path: &Path,
    defaults: AutoCountDefaults,
) -> CliResult<(DatabaseConfiguration, SnapshotFormat)> {
    let bytes = read_file(path)?;
    let (raw, format) = if bytes.starts_with(SNAPSHOT_MAGIC) {
        (decode_snapshot(&bytes)?, SnapshotFormat::Binary)
    } else {
        (parse_json_snapshot(&bytes)?, SnapshotFormat::Json)
    };

    let mut config = DatabaseConfiguration::with_defaults(defaults);
    config.load_key_values(raw);
    Ok((config, format))
}

fn render_json_snapshot(raw: &RawConfiguration) -> CliResult<Vec<u8>> {
    let mut object = Map::new();
    for entry in raw.iter() {
        let value = std::str::from_utf8(&entry.value).map_err(|_| {
            CliError::snapshot_error(format!(
                "Value of '{}' is not UTF-8; write a binary snapshot instead",
                entry.key.escape_debug()
            ))
        })?;
        let key = entry.key.strip_prefix(CONFIG_KEY_PREFIX).unwrap_or(&entry.key);
        object.insert(key.to_string(), Value::String(value.to_string()));
    }
    let mut bytes = serde_json::to_vec_pretty(&Value::Object(object))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write a snapshot in the given format.
pub fn save_snapshot(
    path: &Path,
    config: &mut DatabaseConfiguration,
    format: SnapshotFormat,
) -> CliResult<()> {
    let bytes = match format {
        SnapshotFormat::Json => render_json_snapshot(config.to_canonical())?,
        SnapshotFormat::Binary => config.encode_snapshot(),
    };
    write_file(path, &bytes)
}

/// Parse `key=value`
fn parse_set(arg: &str) -> CliResult<Mutation> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| CliError::invalid_argument(format!("Expected KEY=VALUE, got '{}'", arg)))?;
    if key.is_empty() {
        return Err(CliError::invalid_argument("Key must not be empty"));
    }
    Ok(Mutation::set(full_key(key), value))
}

/// Parse `key` or `begin..end`
fn parse_clear(arg: &str) -> CliResult<Mutation> {
    if arg.is_empty() {
        return Err(CliError::invalid_argument("Clear range must not be empty"));
    }
    let range = match arg.split_once("..") {
        Some((begin, end)) => KeyRange::new(full_key(begin), full_key(end)),
        None => KeyRange::single(&full_key(arg)),
    };
    Ok(Mutation::ClearRange(range))
}

// ==================
// Commands
// ==================

/// Entry point used by `main`
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args())
}

/// Dispatch a parsed command line
pub fn run_command(cli: Cli) -> CliResult<()> {
    let tool = ToolConfig::load_or_default(cli.config.as_deref())?;
    Logger::set_min_severity(tool.severity()?);
    log_event_with_fields(
        Event::ToolConfigLoaded,
        &[("log_level", tool.log_level.as_str())],
    );

    match cli.command {
        Command::Inspect {
            snapshot,
            no_policies,
        } => write_json(&inspect(&tool, &snapshot, no_policies)?),
        Command::Summary { snapshot } => write_text(&summary(&tool, &snapshot)?),
        Command::Tolerance { snapshot, dc } => {
            write_json(&tolerance(&tool, &snapshot, dc.as_deref())?)
        }
        Command::Apply {
            snapshot,
            sets,
            clears,
            output,
        } => write_json(&apply(&tool, &snapshot, &sets, &clears, output.as_deref())?),
    }
}

/// Structured export of a snapshot
pub fn inspect(tool: &ToolConfig, snapshot: &Path, no_policies: bool) -> CliResult<Value> {
    let (config, _) = load_snapshot(snapshot, tool.auto_count_defaults())?;
    Ok(config.to_json(no_policies))
}

/// Human-readable summary of a snapshot
pub fn summary(tool: &ToolConfig, snapshot: &Path) -> CliResult<String> {
    let (config, _) = load_snapshot(snapshot, tool.auto_count_defaults())?;
    Ok(config.to_string())
}

/// Derived numbers, optionally for one datacenter
pub fn tolerance(tool: &ToolConfig, snapshot: &Path, dc: Option<&str>) -> CliResult<Value> {
    let (config, _) = load_snapshot(snapshot, tool.auto_count_defaults())?;
    Ok(json!({
        "valid": config.is_valid(),
        "max_machine_failures_tolerated": config.max_machine_failures_tolerated(),
        "min_datacenters_required": config.min_datacenters_required(),
        "min_machines_required_per_datacenter": config.min_machines_required_per_datacenter(),
        "expected_log_sets": config.expected_log_sets(dc),
        "desired_proxies": config.get_desired_proxies(),
        "desired_resolvers": config.get_desired_resolvers(),
        "desired_logs": config.get_desired_logs(),
        "desired_remote_logs": config.get_desired_remote_logs(),
        "desired_satellite_logs": config.get_desired_satellite_logs(dc),
    }))
}

/// Apply edits in order (all sets, then all clears) and write the result.
///
/// The result keeps the input's format unless `output` names a path, in
/// which case the extension decides.
pub fn apply(
    tool: &ToolConfig,
    snapshot: &Path,
    sets: &[String],
    clears: &[String],
    output: Option<&Path>,
) -> CliResult<Value> {
    let mutations = sets
        .iter()
        .map(|arg| parse_set(arg))
        .chain(clears.iter().map(|arg| parse_clear(arg)))
        .collect::<CliResult<Vec<_>>>()?;

    let (mut config, input_format) = load_snapshot(snapshot, tool.auto_count_defaults())?;

    let mut recovery_required = false;
    for mutation in &mutations {
        recovery_required |= config.apply_mutation(mutation);
    }

    let (target, format) = match output {
        Some(path) => (path, SnapshotFormat::for_path(path)),
        None => (snapshot, input_format),
    };
    save_snapshot(target, &mut config, format)?;

    Ok(json!({
        "recovery_required": recovery_required,
        "valid": config.is_valid(),
        "fingerprint": config.fingerprint(),
    }))
}
