//! Disk discovery and smartctl-based disk temperature sensors.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use fanctl_core::error::{CoreError, CoreResult};
use fanctl_core::ports::TemperatureSource;
use fanctl_core::types::Celsius;

use crate::command;

/// smartctl exit bits 0 and 1: command line did not parse, or the device
/// could not be opened. Higher bits report SMART health and still come
/// with usable output.
const SMARTCTL_FATAL_BITS: i32 = 0b11;

/// Block device names under `sys_block` that start with one of
/// `prefixes`, sorted.
pub async fn discover_disks(sys_block: &Path, prefixes: &[String]) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(sys_block).await?;
    let mut disks = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            disks.push(name);
        }
    }

    disks.sort();
    tracing::info!(count = disks.len(), disks = ?disks, "Disk discovery complete");
    Ok(disks)
}

/// Temperature of one disk via `smartctl -A /dev/<name>`.
#[derive(Debug, Clone)]
pub struct SmartctlDisk {
    program: String,
    device: String,
    timeout: Duration,
}

impl SmartctlDisk {
    pub fn new(program: impl Into<String>, disk_name: &str, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            device: format!("/dev/{disk_name}"),
            timeout,
        }
    }
}

#[async_trait]
impl TemperatureSource for SmartctlDisk {
    async fn sample(&self) -> CoreResult<Celsius> {
        let output = command::run_tool(&self.program, &["-A", self.device.as_str()], self.timeout)
            .await
            .map_err(|e| CoreError::sensor(&self.device, e.to_string()))?;

        if output.exit_code < 0 || output.exit_code & SMARTCTL_FATAL_BITS != 0 {
            return Err(CoreError::sensor(
                &self.device,
                format!("smartctl exited with code {}", output.exit_code),
            ));
        }

        parse_smartctl_temperature(&output.stdout).ok_or_else(|| {
            CoreError::sensor(&self.device, "no temperature in smartctl output")
        })
    }
}

/// Pull the drive temperature out of `smartctl -A` output.
///
/// Understands ATA attribute 194 (`Temperature_Celsius`, falling back to
/// 190 `Airflow_Temperature_Cel`), the NVMe health log `Temperature:` line
/// and the SCSI `Current Drive Temperature:` line.
pub fn parse_smartctl_temperature(output: &str) -> Option<Celsius> {
    let mut airflow = None;

    for line in output.lines() {
        let line = line.trim();
        let fields: Vec<&str> = line.split_whitespace().collect();

        // ID# ATTRIBUTE_NAME FLAG VALUE WORST THRESH TYPE UPDATED WHEN_FAILED RAW_VALUE
        if fields.len() >= 10 {
            match fields[1] {
                "Temperature_Celsius" => return leading_number(fields[9]),
                "Airflow_Temperature_Cel" => airflow = leading_number(fields[9]),
                _ => {}
            }
        }

        if let Some(rest) = line.strip_prefix("Temperature:") {
            if let Some(value) = rest.trim().strip_suffix("Celsius") {
                return value.trim().parse().ok();
            }
        }

        if let Some(rest) = line.strip_prefix("Current Drive Temperature:") {
            if let Some(value) = rest.trim().strip_suffix('C') {
                return value.trim().parse().ok();
            }
        }
    }

    airflow
}

/// `36` from raw values like `36`, `36 (Min/Max 21/48)` or `36/48`.
fn leading_number(raw: &str) -> Option<Celsius> {
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
