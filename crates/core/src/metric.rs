//! One monitored temperature source with its trend and thresholds.
//!
//! A [`Metric`] keeps the two most recent samples of a
//! [`TemperatureSource`] and answers the three questions the controller
//! asks every cycle: which way is it moving, is it at or over its limit,
//! and where does it sit inside its normal→limit band.

use crate::error::{CoreError, CoreResult};
use crate::ports::TemperatureSource;
use crate::types::Celsius;

/// Direction of change since the previous sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

/// Sensor wrapper holding the current and previous reading.
pub struct Metric {
    name: String,
    source: Box<dyn TemperatureSource>,
    normal_temp: Celsius,
    limit_temp: Celsius,
    previous_value: Celsius,
    current_value: Celsius,
    /// Dead-band for trend detection; `0.0` means exact comparison.
    trend_tolerance: Celsius,
    /// Set when the latest refresh failed and `current_value` is a
    /// carried-over reading.
    stale: bool,
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("normal_temp", &self.normal_temp)
            .field("limit_temp", &self.limit_temp)
            .field("previous_value", &self.previous_value)
            .field("current_value", &self.current_value)
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}

impl Metric {
    /// Build a metric and seed it by sampling the source twice: the first
    /// sample becomes `previous_value`, the second `current_value`.
    ///
    /// Fails if `limit_temp <= normal_temp` or if either seeding sample
    /// fails. A metric without an initial reading cannot be controlled
    /// against, so callers treat this as fatal.
    pub async fn new(
        name: impl Into<String>,
        source: Box<dyn TemperatureSource>,
        normal_temp: Celsius,
        limit_temp: Celsius,
    ) -> CoreResult<Self> {
        let name = name.into();

        if !normal_temp.is_finite() || !limit_temp.is_finite() || limit_temp <= normal_temp {
            return Err(CoreError::Validation(format!(
                "metric '{name}': limit ({limit_temp}) must be greater than normal ({normal_temp})"
            )));
        }

        let previous_value = source.sample().await?;
        let current_value = source.sample().await?;

        tracing::debug!(
            metric = %name,
            normal_temp,
            limit_temp,
            current_value,
            "Metric initialised",
        );

        Ok(Self {
            name,
            source,
            normal_temp,
            limit_temp,
            previous_value,
            current_value,
            trend_tolerance: 0.0,
            stale: false,
        })
    }

    /// Use a dead-band of `tolerance` degrees for trend detection.
    /// Negative values are treated as zero.
    pub fn with_trend_tolerance(mut self, tolerance: Celsius) -> Self {
        self.trend_tolerance = tolerance.max(0.0);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_value(&self) -> Celsius {
        self.current_value
    }

    pub fn previous_value(&self) -> Celsius {
        self.previous_value
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Shift the current reading into `previous_value` and sample again.
    ///
    /// On failure `current_value` keeps the carried-over reading (so the
    /// trend reads [`Trend::Stable`]), the metric is flagged stale and the
    /// error is returned for the controller to act on.
    pub async fn refresh(&mut self) -> CoreResult<Celsius> {
        self.previous_value = self.current_value;

        match self.source.sample().await {
            Ok(value) => {
                self.current_value = value;
                self.stale = false;
                Ok(value)
            }
            Err(e) => {
                self.stale = true;
                Err(e)
            }
        }
    }

    /// Trend of the latest refresh.
    ///
    /// With the default zero tolerance this is an exact floating-point
    /// comparison: any representable change counts.
    pub fn direction(&self) -> Trend {
        if self.trend_tolerance == 0.0 {
            if self.current_value > self.previous_value {
                Trend::Rising
            } else if self.current_value < self.previous_value {
                Trend::Falling
            } else {
                Trend::Stable
            }
        } else {
            let delta = self.current_value - self.previous_value;
            if delta > self.trend_tolerance {
                Trend::Rising
            } else if delta < -self.trend_tolerance {
                Trend::Falling
            } else {
                Trend::Stable
            }
        }
    }

    /// `true` when the current reading is at or above the limit.
    pub fn is_over_or_at_limit(&self) -> bool {
        self.current_value >= self.limit_temp
    }

    /// Position of the current reading inside the normal→limit band.
    ///
    /// `0.0` at `normal_temp`, `1.0` at `limit_temp`; negative below
    /// normal and above one past the limit. Not clamped here.
    pub fn ratio(&self) -> f64 {
        (self.current_value - self.normal_temp) / (self.limit_temp - self.normal_temp)
    }

    /// Everything the controller needs from this metric for one cycle.
    pub fn reading(&self) -> MetricReading {
        MetricReading {
            name: self.name.clone(),
            value: self.current_value,
            previous: self.previous_value,
            trend: self.direction(),
            over_limit: self.is_over_or_at_limit(),
            ratio: self.ratio(),
            stale: self.stale,
        }
    }
}

/// Per-cycle view of a [`Metric`], evaluated right after its refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub name: String,
    pub value: Celsius,
    pub previous: Celsius,
    pub trend: Trend,
    pub over_limit: bool,
    pub ratio: f64,
    pub stale: bool,
}
