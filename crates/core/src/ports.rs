//! Capability traits the controller is driven through.
//!
//! ```text
//!   TemperatureSource ──▶ Metric ──▶ Controller ──▶ FanActuator
//!                                        │
//!                         LoadSource ────┴──▶ StatsRecorder
//! ```
//!
//! The agent crate provides one implementation per sensor kind (IPMI SDR
//! sensor, smartctl disk) and the IPMI fan actuator. Tests plug in
//! scripted fakes.

use async_trait::async_trait;

use crate::duty::FanLevel;
use crate::error::CoreResult;
use crate::types::Celsius;

/// Reads one temperature from a sensor.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Sample the sensor once.
    ///
    /// Failures are reported as [`CoreError::SensorUnavailable`](crate::error::CoreError::SensorUnavailable).
    async fn sample(&self) -> CoreResult<Celsius>;
}

/// Applies a duty level to every fan channel.
#[async_trait]
pub trait FanActuator: Send + Sync {
    async fn apply(&self, level: FanLevel) -> CoreResult<()>;
}

/// Current 1-minute system load average. Only recorded, never used in
/// the control decision.
pub trait LoadSource: Send + Sync {
    fn load_average(&self) -> CoreResult<f64>;
}
