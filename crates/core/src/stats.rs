//! Per-cycle snapshot handed to the durable stats log.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreResult;
use crate::types::{Celsius, Timestamp};

/// One row of the stats log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSnapshot {
    /// Unix seconds.
    pub timestamp: i64,
    /// Encoded duty that was applied this cycle.
    pub fan_duty: u8,
    /// 1-minute load average; `None` if it could not be read.
    pub system_load: Option<f64>,
    /// Metric name → current value, ordered by name.
    pub metrics: BTreeMap<String, Celsius>,
}

impl CycleSnapshot {
    pub fn new(
        at: Timestamp,
        fan_duty: u8,
        system_load: Option<f64>,
        metrics: impl IntoIterator<Item = (String, Celsius)>,
    ) -> Self {
        Self {
            timestamp: at.timestamp(),
            fan_duty,
            system_load,
            metrics: metrics.into_iter().collect(),
        }
    }
}

/// Durable sink for [`CycleSnapshot`]s.
///
/// Implementations must have the row on disk (flushed) before `record`
/// returns; the process can be killed between any two cycles.
pub trait StatsRecorder: Send {
    fn record(&mut self, snapshot: &CycleSnapshot) -> CoreResult<()>;
}
