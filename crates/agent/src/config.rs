//! Agent configuration loaded from environment variables.
//!
//! | Variable                        | Default      | Description                              |
//! |---------------------------------|--------------|------------------------------------------|
//! | `FANCTL_INTERVAL_SECS`          | `30`         | Seconds between control cycles           |
//! | `FANCTL_COOLDOWN_SECS`          | `120`        | Extra dwell at full speed after a breach |
//! | `FANCTL_DOWN_TICK`              | `1`          | Index decrement per quiet cycle          |
//! | `FANCTL_TREND_TOLERANCE`        | `0`          | Trend dead-band in °C (0 = exact)        |
//! | `FANCTL_SENSOR_FAILURE_POLICY`  | `full-speed` | `full-speed`, `hold` or `abort`          |
//! | `FANCTL_COMMAND_TIMEOUT_SECS`   | `10`         | Timeout for each ipmitool/smartctl call  |
//! | `FANCTL_STATS_DIR`              | `.`          | Directory for the CSV stats log          |
//! | `FANCTL_IPMITOOL`               | `ipmitool`   | ipmitool binary                          |
//! | `FANCTL_IPMI_ARGS`              | --           | Extra ipmitool args (remote BMC login)   |
//! | `FANCTL_SMARTCTL`               | `smartctl`   | smartctl binary                          |
//! | `FANCTL_BOARD_SENSORS`          | `Inlet Temp` | Comma-separated SDR names or ids         |
//! | `FANCTL_CPU_SENSORS`            | `0Eh,0Fh`    | Comma-separated SDR names or ids         |
//! | `FANCTL_BOARD_NORMAL` / `_LIMIT`| `25` / `45`  | Board thresholds (°C)                    |
//! | `FANCTL_CPU_NORMAL` / `_LIMIT`  | `35` / `65`  | CPU thresholds (°C)                      |
//! | `FANCTL_DISK_NORMAL` / `_LIMIT` | `30` / `45`  | Disk thresholds (°C)                     |
//! | `FANCTL_DISK_PREFIXES`          | `sd,nvme`    | `/sys/block` name prefixes to monitor    |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fanctl_core::controller::{
    ControllerConfig, SensorFailurePolicy, DEFAULT_BASE_INTERVAL, DEFAULT_DOWN_TICK,
    DEFAULT_OVER_LIMIT_COOLDOWN,
};
use fanctl_core::duty::DutyTable;
use fanctl_core::types::Celsius;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// Errors raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Normal/limit pair for one kind of sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub normal: Celsius,
    pub limit: Celsius,
}

/// Everything the agent needs to start.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub controller: ControllerConfig,
    pub trend_tolerance: Celsius,
    pub command_timeout: Duration,
    pub stats_dir: PathBuf,
    pub ipmitool: String,
    pub ipmi_args: Vec<String>,
    pub smartctl: String,
    pub board_sensors: Vec<String>,
    pub cpu_sensors: Vec<String>,
    pub board: Thresholds,
    pub cpu: Thresholds,
    pub disk: Thresholds,
    pub disk_prefixes: Vec<String>,
    pub sys_block: PathBuf,
}

impl AgentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interval_secs: u64 = parse_or(&lookup, "FANCTL_INTERVAL_SECS", DEFAULT_BASE_INTERVAL.as_secs())?;
        if interval_secs == 0 {
            return Err(invalid("FANCTL_INTERVAL_SECS", "0", "must be at least 1"));
        }
        let cooldown_secs: u64 =
            parse_or(&lookup, "FANCTL_COOLDOWN_SECS", DEFAULT_OVER_LIMIT_COOLDOWN.as_secs())?;
        let duty_table = DutyTable::default();
        let down_tick: usize = parse_or(&lookup, "FANCTL_DOWN_TICK", DEFAULT_DOWN_TICK)?;
        if down_tick == 0 || down_tick > duty_table.max_index() {
            return Err(invalid(
                "FANCTL_DOWN_TICK",
                &down_tick.to_string(),
                &format!("must be between 1 and {}", duty_table.max_index()),
            ));
        }
        let failure_policy: SensorFailurePolicy = match lookup("FANCTL_SENSOR_FAILURE_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|e: fanctl_core::error::CoreError| {
                    invalid("FANCTL_SENSOR_FAILURE_POLICY", &raw, &e.to_string())
                })?,
            None => SensorFailurePolicy::default(),
        };

        let trend_tolerance: Celsius = parse_or(&lookup, "FANCTL_TREND_TOLERANCE", 0.0)?;
        if !trend_tolerance.is_finite() || trend_tolerance < 0.0 {
            return Err(invalid(
                "FANCTL_TREND_TOLERANCE",
                &trend_tolerance.to_string(),
                "must be a finite value, zero or positive",
            ));
        }

        let command_timeout_secs: u64 =
            parse_or(&lookup, "FANCTL_COMMAND_TIMEOUT_SECS", DEFAULT_COMMAND_TIMEOUT_SECS)?;
        if command_timeout_secs == 0 {
            return Err(invalid("FANCTL_COMMAND_TIMEOUT_SECS", "0", "must be at least 1"));
        }

        let board = thresholds(&lookup, "FANCTL_BOARD_NORMAL", "FANCTL_BOARD_LIMIT", 25.0, 45.0)?;
        let cpu = thresholds(&lookup, "FANCTL_CPU_NORMAL", "FANCTL_CPU_LIMIT", 35.0, 65.0)?;
        let disk = thresholds(&lookup, "FANCTL_DISK_NORMAL", "FANCTL_DISK_LIMIT", 30.0, 45.0)?;

        Ok(Self {
            controller: ControllerConfig {
                base_interval: Duration::from_secs(interval_secs),
                over_limit_cooldown: Duration::from_secs(cooldown_secs),
                down_tick,
                duty_table,
                failure_policy,
            },
            trend_tolerance,
            command_timeout: Duration::from_secs(command_timeout_secs),
            stats_dir: lookup("FANCTL_STATS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            ipmitool: lookup("FANCTL_IPMITOOL").unwrap_or_else(|| "ipmitool".into()),
            ipmi_args: lookup("FANCTL_IPMI_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            smartctl: lookup("FANCTL_SMARTCTL").unwrap_or_else(|| "smartctl".into()),
            board_sensors: list_or(&lookup, "FANCTL_BOARD_SENSORS", "Inlet Temp"),
            cpu_sensors: list_or(&lookup, "FANCTL_CPU_SENSORS", "0Eh,0Fh"),
            board,
            cpu,
            disk,
            disk_prefixes: list_or(&lookup, "FANCTL_DISK_PREFIXES", "sd,nvme"),
            sys_block: PathBuf::from("/sys/block"),
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &raw, &e.to_string())),
        None => Ok(default),
    }
}

/// Comma-separated list; empty items are dropped.
fn list_or<F>(lookup: &F, var: &str, default: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .unwrap_or_else(|| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn thresholds<F>(
    lookup: &F,
    normal_var: &'static str,
    limit_var: &'static str,
    normal_default: Celsius,
    limit_default: Celsius,
) -> Result<Thresholds, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let normal: Celsius = parse_or(lookup, normal_var, normal_default)?;
    let limit: Celsius = parse_or(lookup, limit_var, limit_default)?;
    if limit.is_nan() || normal.is_nan() || limit <= normal {
        return Err(invalid(
            limit_var,
            &limit.to_string(),
            &format!("must be greater than {normal_var} ({normal})"),
        ));
    }
    Ok(Thresholds { normal, limit })
}
