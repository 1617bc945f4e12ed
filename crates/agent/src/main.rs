//! `fanctl-agent` -- closed-loop chassis fan controller.
//!
//! Samples the BMC's board and CPU temperature sensors and every disk's
//! SMART temperature, derives a fan duty from their trends and distance to
//! their limits, and drives all chassis fans through `ipmitool`. One CSV
//! row per cycle is appended to a stats log named after the start time.
//!
//! See [`fanctl_agent::config`] for the environment variables.

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fanctl_agent::config::AgentConfig;
use fanctl_agent::ipmi::{IpmiFans, IpmiTool};
use fanctl_agent::load::ProcLoadAverage;
use fanctl_agent::recorder::CsvRecorder;
use fanctl_agent::runtime;
use fanctl_core::controller::Controller;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fanctl_agent=info,fanctl_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("FANCTL_LOG_FORMAT").as_deref() == Ok("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AgentConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        interval_secs = config.controller.base_interval.as_secs(),
        cooldown_secs = config.controller.over_limit_cooldown.as_secs(),
        down_tick = config.controller.down_tick,
        failure_policy = ?config.controller.failure_policy,
        stats_dir = %config.stats_dir.display(),
        "Starting fanctl-agent",
    );

    let ipmi = IpmiTool::new(
        config.ipmitool.clone(),
        config.ipmi_args.clone(),
        config.command_timeout,
    );

    let metrics = runtime::build_metrics(&config, &ipmi)
        .await
        .context("initial sensor sampling failed")?;
    let mut controller = Controller::new(metrics, config.controller.clone());

    let mut recorder = CsvRecorder::create(&config.stats_dir, Utc::now(), &controller.metric_names())
        .context("cannot open stats log")?;

    let signals = runtime::ShutdownSignals::install().context("cannot install signal handlers")?;

    let fans = IpmiFans::new(ipmi);
    if let Err(e) = fans.enable_manual().await {
        tracing::error!(error = %e, "Failed to switch BMC to manual fan control");
    }

    let result = runtime::run(
        &mut controller,
        &fans,
        &mut recorder,
        &ProcLoadAverage::default(),
        signals.recv(),
    )
    .await;

    match fans.restore_automatic().await {
        Ok(()) => tracing::info!("BMC fan control restored to automatic"),
        Err(e) => tracing::warn!(error = %e, "Failed to restore automatic fan control"),
    }

    result.context("control loop stopped")?;
    Ok(())
}
