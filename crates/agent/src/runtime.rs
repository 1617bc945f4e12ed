//! Startup wiring and the long-running control loop.

use std::future::Future;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

use fanctl_core::controller::Controller;
use fanctl_core::error::CoreResult;
use fanctl_core::metric::Metric;
use fanctl_core::ports::{FanActuator, LoadSource, TemperatureSource};
use fanctl_core::stats::StatsRecorder;

use crate::config::{AgentConfig, Thresholds};
use crate::disk::{self, SmartctlDisk};
use crate::ipmi::{IpmiSensor, IpmiTool};

/// Name for the `i`th of `count` board sensors: `board` when there is only
/// one, `board0`, `board1`, ... otherwise. CPUs are always numbered.
fn sensor_name(kind: &str, i: usize, count: usize) -> String {
    if count == 1 {
        kind.to_string()
    } else {
        format!("{kind}{i}")
    }
}

async fn build_metric(
    name: String,
    source: Box<dyn TemperatureSource>,
    thresholds: Thresholds,
    config: &AgentConfig,
) -> CoreResult<Metric> {
    let metric = Metric::new(name, source, thresholds.normal, thresholds.limit)
        .await?
        .with_trend_tolerance(config.trend_tolerance);
    tracing::info!(
        metric = %metric.name(),
        value = metric.current_value(),
        normal = thresholds.normal,
        limit = thresholds.limit,
        "Monitoring sensor",
    );
    Ok(metric)
}

/// Build every metric: board and CPU sensors from the BMC, then one per
/// discovered disk.
///
/// Each metric samples its source twice while being built; any failure
/// here is returned so the agent refuses to start blind.
pub async fn build_metrics(config: &AgentConfig, ipmi: &IpmiTool) -> CoreResult<Vec<Metric>> {
    let mut metrics = Vec::new();

    for (i, selector) in config.board_sensors.iter().enumerate() {
        let name = sensor_name("board", i, config.board_sensors.len());
        let source = Box::new(IpmiSensor::new(ipmi.clone(), selector.as_str()));
        metrics.push(build_metric(name, source, config.board, config).await?);
    }

    for (i, selector) in config.cpu_sensors.iter().enumerate() {
        let name = format!("cpu{i}");
        let source = Box::new(IpmiSensor::new(ipmi.clone(), selector.as_str()));
        metrics.push(build_metric(name, source, config.cpu, config).await?);
    }

    let disks = match disk::discover_disks(&config.sys_block, &config.disk_prefixes).await {
        Ok(disks) => disks,
        Err(e) => {
            tracing::warn!(
                path = %config.sys_block.display(),
                error = %e,
                "Disk discovery failed -- disks will not be monitored",
            );
            Vec::new()
        }
    };

    for name in disks {
        let source = Box::new(SmartctlDisk::new(&config.smartctl, &name, config.command_timeout));
        metrics.push(build_metric(name, source, config.disk, config).await?);
    }

    Ok(metrics)
}

/// Run control cycles until `shutdown` resolves.
///
/// Shutdown is observed between cycles, while sleeping. Returns an error
/// only when a cycle does (sensor failure under the abort policy).
pub async fn run<F>(
    controller: &mut Controller,
    actuator: &dyn FanActuator,
    recorder: &mut dyn StatsRecorder,
    load: &dyn LoadSource,
    shutdown: F,
) -> CoreResult<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let outcome = controller.run_cycle(actuator, recorder, load).await?;

        tokio::select! {
            biased;
            () = &mut shutdown => {
                tracing::info!(fan_index = controller.fan_index(), "Shutdown requested, leaving control loop");
                return Ok(());
            }
            () = tokio::time::sleep(outcome.next_sleep) => {}
        }
    }
}

/// SIGINT/SIGTERM handlers, registered when constructed.
///
/// Install before switching the BMC to manual mode: once the handlers are
/// in place a signal no longer terminates the process, it is queued until
/// [`ShutdownSignals::recv`] observes it between cycles.
#[cfg(unix)]
pub struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for SIGINT or SIGTERM.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {
                tracing::info!("Received SIGINT (Ctrl-C), shutting down");
            }
            _ = self.terminate.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to wait for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl-C, shutting down");
    }
}
