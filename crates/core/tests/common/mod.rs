//! Shared fakes for the controller integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use fanctl_core::controller::{Controller, ControllerConfig};
use fanctl_core::duty::FanLevel;
use fanctl_core::error::{CoreError, CoreResult};
use fanctl_core::metric::Metric;
use fanctl_core::ports::{FanActuator, LoadSource, TemperatureSource};
use fanctl_core::stats::{CycleSnapshot, StatsRecorder};

/// Plays back a sequence of readings, then keeps returning the last one.
/// `None` entries simulate an unreadable sensor.
pub struct SequenceSource {
    name: String,
    queue: Mutex<VecDeque<Option<f64>>>,
    last: Mutex<Option<f64>>,
}

impl SequenceSource {
    pub fn new(name: &str, readings: &[Option<f64>]) -> Self {
        Self {
            name: name.to_string(),
            queue: Mutex::new(readings.iter().copied().collect()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TemperatureSource for SequenceSource {
    async fn sample(&self) -> CoreResult<f64> {
        let next = self.queue.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(Some(v)) => {
                *last = Some(v);
                Ok(v)
            }
            Some(None) => Err(CoreError::sensor(&self.name, "simulated read failure")),
            None => last.ok_or_else(|| CoreError::sensor(&self.name, "no readings scripted")),
        }
    }
}

/// Metric fed from `readings`; the first two seed it.
pub async fn metric(name: &str, normal: f64, limit: f64, readings: &[f64]) -> Metric {
    let readings: Vec<Option<f64>> = readings.iter().copied().map(Some).collect();
    metric_with_gaps(name, normal, limit, &readings).await
}

pub async fn metric_with_gaps(
    name: &str,
    normal: f64,
    limit: f64,
    readings: &[Option<f64>],
) -> Metric {
    Metric::new(name, Box::new(SequenceSource::new(name, readings)), normal, limit)
        .await
        .expect("metric seeds")
}

#[derive(Default)]
pub struct RecordingActuator {
    pub levels: Mutex<Vec<FanLevel>>,
}

#[async_trait]
impl FanActuator for RecordingActuator {
    async fn apply(&self, level: FanLevel) -> CoreResult<()> {
        self.levels.lock().unwrap().push(level);
        Ok(())
    }
}

#[derive(Default)]
pub struct VecRecorder {
    pub rows: Vec<CycleSnapshot>,
}

impl StatsRecorder for VecRecorder {
    fn record(&mut self, snapshot: &CycleSnapshot) -> CoreResult<()> {
        self.rows.push(snapshot.clone());
        Ok(())
    }
}

pub struct ZeroLoad;

impl LoadSource for ZeroLoad {
    fn load_average(&self) -> CoreResult<f64> {
        Ok(0.0)
    }
}

/// Controller plus the fakes it runs against.
pub struct Rig {
    pub controller: Controller,
    pub actuator: RecordingActuator,
    pub recorder: VecRecorder,
}

impl Rig {
    pub fn new(metrics: Vec<Metric>, config: ControllerConfig) -> Self {
        Self {
            controller: Controller::new(metrics, config),
            actuator: RecordingActuator::default(),
            recorder: VecRecorder::default(),
        }
    }

    pub async fn cycle(&mut self) -> CoreResult<fanctl_core::controller::CycleOutcome> {
        self.controller
            .run_cycle(&self.actuator, &mut self.recorder, &ZeroLoad)
            .await
    }
}
