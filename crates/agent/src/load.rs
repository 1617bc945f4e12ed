//! System load average from `/proc/loadavg`.

use std::path::PathBuf;

use fanctl_core::error::{CoreError, CoreResult};
use fanctl_core::ports::LoadSource;

const PROC_LOADAVG: &str = "/proc/loadavg";

/// Reads the 1-minute load average.
#[derive(Debug, Clone)]
pub struct ProcLoadAverage {
    path: PathBuf,
}

impl Default for ProcLoadAverage {
    fn default() -> Self {
        Self::new(PROC_LOADAVG)
    }
}

impl ProcLoadAverage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LoadSource for ProcLoadAverage {
    fn load_average(&self) -> CoreResult<f64> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            CoreError::sensor("loadavg", format!("{}: {e}", self.path.display()))
        })?;
        parse_loadavg(&contents)
            .ok_or_else(|| CoreError::sensor("loadavg", format!("unexpected contents '{}'", contents.trim())))
    }
}

/// First field of `/proc/loadavg`, e.g. `0.42 0.35 0.30 1/123 4567`.
pub fn parse_loadavg(contents: &str) -> Option<f64> {
    contents.split_whitespace().next()?.parse().ok()
}
