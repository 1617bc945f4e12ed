//! IPMI adapters: board/CPU temperature sensors and the chassis fans.
//!
//! Temperatures come from `ipmitool sdr type temperature`, whose rows look
//! like:
//!
//! ```text
//! Inlet Temp       | 04h | ok  |  7.1 | 23 degrees C
//! Temp             | 0Eh | ok  |  3.1 | 42 degrees C
//! ```
//!
//! A sensor is selected by its name (first column) or its id (second
//! column); ids disambiguate BMCs that label every CPU just `Temp`.
//!
//! Fans are driven with the Dell-style raw commands: manual mode
//! `0x30 0x30 0x01 0x00`, automatic mode `0x30 0x30 0x01 0x01`, and
//! `0x30 0x30 0x02 0xff <duty>` to set every fan channel at once.

use std::time::Duration;

use async_trait::async_trait;

use fanctl_core::duty::FanLevel;
use fanctl_core::error::{CoreError, CoreResult};
use fanctl_core::ports::{FanActuator, TemperatureSource};
use fanctl_core::types::Celsius;

use crate::command::{self, CommandError, ToolOutput};

const RAW_FAN_CONTROL: [&str; 3] = ["0x30", "0x30", "0x01"];
const RAW_FAN_SET_ALL: [&str; 4] = ["0x30", "0x30", "0x02", "0xff"];

/// How to invoke `ipmitool`: binary, connection arguments and timeout.
#[derive(Debug, Clone)]
pub struct IpmiTool {
    pub program: String,
    /// Inserted before the subcommand, e.g. `-I lanplus -H bmc -U root -P pw`.
    pub extra_args: Vec<String>,
    pub timeout: Duration,
}

impl IpmiTool {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            extra_args,
            timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<ToolOutput, CommandError> {
        let mut full: Vec<&str> = self.extra_args.iter().map(String::as_str).collect();
        full.extend_from_slice(args);
        command::run_tool(&self.program, full.as_slice(), self.timeout)
            .await?
            .into_success()
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// One SDR temperature sensor.
#[derive(Debug, Clone)]
pub struct IpmiSensor {
    tool: IpmiTool,
    /// SDR name or id to match.
    selector: String,
}

impl IpmiSensor {
    pub fn new(tool: IpmiTool, selector: impl Into<String>) -> Self {
        Self {
            tool,
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl TemperatureSource for IpmiSensor {
    async fn sample(&self) -> CoreResult<Celsius> {
        let output = self
            .tool
            .run(&["sdr", "type", "temperature"])
            .await
            .map_err(|e| CoreError::sensor(&self.selector, e.to_string()))?;

        parse_sdr_temperature(&output.stdout, &self.selector)
            .map_err(|reason| CoreError::sensor(&self.selector, reason))
    }
}

/// Find the row for `selector` in `sdr type temperature` output and parse
/// its reading.
pub fn parse_sdr_temperature(output: &str, selector: &str) -> Result<Celsius, String> {
    let selector = selector.trim();

    for line in output.lines() {
        let columns: Vec<&str> = line.split('|').map(str::trim).collect();
        if columns.len() < 5 {
            continue;
        }
        if !columns[0].eq_ignore_ascii_case(selector) && !columns[1].eq_ignore_ascii_case(selector) {
            continue;
        }

        let reading = columns[4];
        let value = reading
            .strip_suffix("degrees C")
            .map(str::trim)
            .ok_or_else(|| format!("sensor reports '{reading}'"))?;
        return value
            .parse::<Celsius>()
            .map_err(|_| format!("unparseable reading '{reading}'"));
    }

    Err(format!("no SDR temperature row named '{selector}'"))
}

// ---------------------------------------------------------------------------
// Fans
// ---------------------------------------------------------------------------

/// Drives every chassis fan through the BMC.
#[derive(Debug, Clone)]
pub struct IpmiFans {
    tool: IpmiTool,
}

impl IpmiFans {
    pub fn new(tool: IpmiTool) -> Self {
        Self { tool }
    }

    /// Take fan control away from the BMC's own curve.
    pub async fn enable_manual(&self) -> CoreResult<()> {
        self.raw_fan_mode("0x00").await
    }

    /// Hand fan control back to the BMC.
    pub async fn restore_automatic(&self) -> CoreResult<()> {
        self.raw_fan_mode("0x01").await
    }

    async fn raw_fan_mode(&self, mode: &str) -> CoreResult<()> {
        let mut args = vec!["raw"];
        args.extend_from_slice(&RAW_FAN_CONTROL);
        args.push(mode);
        self.tool
            .run(&args)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::ActuationFailure(e.to_string()))
    }
}

/// `0x2a`-style hex byte as ipmitool expects it.
pub fn duty_arg(duty: u8) -> String {
    format!("0x{duty:02x}")
}

#[async_trait]
impl FanActuator for IpmiFans {
    async fn apply(&self, level: FanLevel) -> CoreResult<()> {
        let duty = duty_arg(level.duty);
        let mut args = vec!["raw"];
        args.extend_from_slice(&RAW_FAN_SET_ALL);
        args.push(&duty);

        self.tool
            .run(&args)
            .await
            .map_err(|e| CoreError::ActuationFailure(e.to_string()))?;

        tracing::debug!(index = level.index, duty = %duty, "Fan duty applied");
        Ok(())
    }
}
