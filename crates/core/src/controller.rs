//! The fixed-interval sampling → decision → actuation cycle.
//!
//! Each cycle refreshes every [`Metric`], reduces the readings to
//! `any_up`, `over_limit` and a clamped `max_ratio`, and picks the next
//! fan index:
//!
//! 1. any metric at or over its limit → full speed, and the next sleep is
//!    extended by the over-limit cooldown;
//! 2. otherwise any metric rising → jump straight to
//!    `floor(max_index * max_ratio)`;
//! 3. otherwise → step down by `down_tick`, floored at the minimum.
//!
//! The only state carried between cycles is the fan index itself.

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;

use crate::duty::{DutyTable, FanLevel};
use crate::error::{CoreError, CoreResult};
use crate::metric::{Metric, MetricReading, Trend};
use crate::ports::{FanActuator, LoadSource};
use crate::stats::{CycleSnapshot, StatsRecorder};

/// Default time between cycles.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(30);

/// Extra dwell at full speed after any metric reaches its limit.
pub const DEFAULT_OVER_LIMIT_COOLDOWN: Duration = Duration::from_secs(120);

/// Index decrement applied per cycle while nothing is rising.
pub const DEFAULT_DOWN_TICK: usize = 1;

/// What to do when a metric cannot be sampled after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorFailurePolicy {
    /// Keep the last value, and run the fans at full speed (with cooldown)
    /// for the cycle.
    #[default]
    FullSpeed,
    /// Keep the last value and carry on with the normal decision.
    Hold,
    /// Propagate the error and stop the controller.
    Abort,
}

impl FromStr for SensorFailurePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-speed" | "full_speed" | "fullspeed" => Ok(Self::FullSpeed),
            "hold" => Ok(Self::Hold),
            "abort" => Ok(Self::Abort),
            other => Err(CoreError::Validation(format!(
                "unknown sensor failure policy '{other}' (expected full-speed, hold or abort)"
            ))),
        }
    }
}

/// Tunables for the control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub base_interval: Duration,
    pub over_limit_cooldown: Duration,
    pub down_tick: usize,
    pub duty_table: DutyTable,
    pub failure_policy: SensorFailurePolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            over_limit_cooldown: DEFAULT_OVER_LIMIT_COOLDOWN,
            down_tick: DEFAULT_DOWN_TICK,
            duty_table: DutyTable::default(),
            failure_policy: SensorFailurePolicy::default(),
        }
    }
}

/// The reduced view of one cycle's readings that drives the decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInputs {
    pub any_up: bool,
    pub over_limit: bool,
    /// Highest metric ratio, clamped to `[0, 1]`.
    pub max_ratio: f64,
    /// A sample failed this cycle under [`SensorFailurePolicy::FullSpeed`].
    pub sensor_fault: bool,
}

impl CycleInputs {
    pub fn from_readings(readings: &[MetricReading]) -> Self {
        let any_up = readings.iter().any(|r| r.trend == Trend::Rising);
        let over_limit = readings.iter().any(|r| r.over_limit);
        let max_ratio = clamp_ratio(
            readings
                .iter()
                .map(|r| r.ratio)
                .fold(f64::NEG_INFINITY, f64::max),
        );

        Self {
            any_up,
            over_limit,
            max_ratio,
            sensor_fault: false,
        }
    }
}

/// Clamp a ratio into `[0, 1]`. Non-finite inputs below the band (and
/// NaN) map to zero.
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return 0.0;
    }
    ratio.clamp(0.0, 1.0)
}

/// Which rule picked the fan index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A metric is at or over its limit.
    FullSpeed,
    /// A metric could not be sampled and the failsafe kicked in.
    Failsafe,
    /// At least one metric is rising.
    Proportional,
    /// Everything is stable or falling.
    StepDown,
}

impl Decision {
    /// Whether this decision extends the following sleep by the cooldown.
    pub fn arms_cooldown(self) -> bool {
        matches!(self, Self::FullSpeed | Self::Failsafe)
    }
}

/// Pick the next fan index from the previous one and this cycle's inputs.
pub fn decide(
    current_index: usize,
    inputs: &CycleInputs,
    max_index: usize,
    down_tick: usize,
) -> (usize, Decision) {
    if inputs.over_limit {
        return (max_index, Decision::FullSpeed);
    }
    if inputs.sensor_fault {
        return (max_index, Decision::Failsafe);
    }
    if inputs.any_up {
        let ratio = clamp_ratio(inputs.max_ratio);
        let index = (max_index as f64 * ratio).floor() as usize;
        return (index.min(max_index), Decision::Proportional);
    }
    (
        current_index.saturating_sub(down_tick).min(max_index),
        Decision::StepDown,
    )
}

/// Result of one control cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub level: FanLevel,
    pub decision: Decision,
    pub inputs: CycleInputs,
    pub readings: Vec<MetricReading>,
    /// How long to wait before the next cycle.
    pub next_sleep: Duration,
    /// `false` if the actuator reported a failure.
    pub applied: bool,
    /// `false` if the stats recorder reported a failure.
    pub recorded: bool,
    pub snapshot: CycleSnapshot,
}

/// Owns the metric set and the fan index.
#[derive(Debug)]
pub struct Controller {
    metrics: Vec<Metric>,
    fan_index: usize,
    config: ControllerConfig,
}

impl Controller {
    /// Start at the midpoint of the duty range.
    pub fn new(metrics: Vec<Metric>, config: ControllerConfig) -> Self {
        let fan_index = config.duty_table.midpoint();
        Self {
            metrics,
            fan_index,
            config,
        }
    }

    pub fn fan_index(&self) -> usize {
        self.fan_index
    }

    pub fn level(&self) -> FanLevel {
        FanLevel::resolve(&self.config.duty_table, self.fan_index)
    }

    /// Names of all metrics, sorted. This is the column set of the stats
    /// log.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|m| m.name().to_string()).collect();
        names.sort();
        names
    }

    /// Run one sample → decide → actuate → record cycle.
    ///
    /// Actuation and recording failures are logged and reflected in the
    /// outcome; only a sampling failure under
    /// [`SensorFailurePolicy::Abort`] returns an error.
    pub async fn run_cycle(
        &mut self,
        actuator: &dyn FanActuator,
        recorder: &mut dyn StatsRecorder,
        load: &dyn LoadSource,
    ) -> CoreResult<CycleOutcome> {
        let mut sensor_fault = false;

        for metric in &mut self.metrics {
            if let Err(e) = metric.refresh().await {
                match self.config.failure_policy {
                    SensorFailurePolicy::Abort => {
                        tracing::error!(metric = %metric.name(), error = %e, "Sensor read failed, aborting");
                        return Err(e);
                    }
                    SensorFailurePolicy::Hold => {
                        tracing::warn!(
                            metric = %metric.name(),
                            error = %e,
                            held_value = metric.current_value(),
                            "Sensor read failed, holding last value",
                        );
                    }
                    SensorFailurePolicy::FullSpeed => {
                        tracing::warn!(
                            metric = %metric.name(),
                            error = %e,
                            "Sensor read failed, forcing full speed",
                        );
                        sensor_fault = true;
                    }
                }
            }
        }

        let readings: Vec<MetricReading> = self.metrics.iter().map(Metric::reading).collect();
        for r in &readings {
            tracing::debug!(
                metric = %r.name,
                value = r.value,
                previous = r.previous,
                trend = ?r.trend,
                over_limit = r.over_limit,
                ratio = r.ratio,
                stale = r.stale,
                "Metric sampled",
            );
        }

        let mut inputs = CycleInputs::from_readings(&readings);
        inputs.sensor_fault = sensor_fault;

        let previous_index = self.fan_index;
        let (index, decision) = decide(
            previous_index,
            &inputs,
            self.config.duty_table.max_index(),
            self.config.down_tick,
        );
        self.fan_index = index;
        let level = self.level();

        let applied = match actuator.apply(level).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(duty = level.duty, error = %e, "Failed to apply fan duty, will retry next cycle");
                false
            }
        };

        let system_load = match load.load_average() {
            Ok(l) => Some(l),
            Err(e) => {
                tracing::warn!(error = %e, "Load average unavailable");
                None
            }
        };

        let snapshot = CycleSnapshot::new(
            Utc::now(),
            level.duty,
            system_load,
            readings.iter().map(|r| (r.name.clone(), r.value)),
        );

        let recorded = match recorder.record(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to record stats snapshot");
                false
            }
        };

        let next_sleep = if decision.arms_cooldown() {
            self.config.base_interval + self.config.over_limit_cooldown
        } else {
            self.config.base_interval
        };

        tracing::info!(
            previous_index,
            fan_index = level.index,
            duty = level.duty,
            decision = ?decision,
            any_up = inputs.any_up,
            over_limit = inputs.over_limit,
            max_ratio = inputs.max_ratio,
            next_sleep_secs = next_sleep.as_secs(),
            "Control cycle complete",
        );

        Ok(CycleOutcome {
            level,
            decision,
            inputs,
            readings,
            next_sleep,
            applied,
            recorded,
            snapshot,
        })
    }
}
