//! End-to-end control cycle against fake `ipmitool` and `smartctl`
//! scripts: sensors are built from tool output, the fan command reaches
//! the tool, and the row lands in the CSV log.

use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::Utc;

use fanctl_agent::config::AgentConfig;
use fanctl_agent::ipmi::{IpmiFans, IpmiTool};
use fanctl_agent::load::ProcLoadAverage;
use fanctl_agent::recorder::CsvRecorder;
use fanctl_agent::runtime;
use fanctl_core::controller::Controller;

/// Write an executable shell script and close it before anything runs it.
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    {
        let mut f = std::fs::File::create(&path).expect("create script");
        writeln!(f, "#!/bin/sh").expect("write shebang");
        write!(f, "{body}").expect("write body");
        f.sync_all().expect("sync script");
    }
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn config_with(vars: &[(&str, String)], sys_block: &Path) -> AgentConfig {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let mut config = AgentConfig::from_lookup(|key| map.get(key).cloned()).expect("config");
    config.sys_block = sys_block.to_path_buf();
    config
}

#[tokio::test]
async fn disk_at_limit_drives_fans_to_full_speed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("ipmitool.log");

    let ipmitool = write_script(
        dir.path(),
        "fake-ipmitool",
        &format!(
            r#"echo "$*" >> "{log}"
if [ "$1" = "sdr" ]; then
cat <<'SDR'
Inlet Temp       | 04h | ok  |  7.1 | 23 degrees C
Temp             | 0Eh | ok  |  3.1 | 52 degrees C
SDR
fi
"#,
            log = log.display()
        ),
    );
    let smartctl = write_script(
        dir.path(),
        "fake-smartctl",
        "echo '194 Temperature_Celsius     0x0022   036   052   000    Old_age   Always       -       45 (0 17 0 0 0)'\n",
    );

    let sys_block = dir.path().join("block");
    std::fs::create_dir_all(sys_block.join("sda")).expect("mkdir sda");
    std::fs::create_dir_all(sys_block.join("loop0")).expect("mkdir loop0");

    let stats_dir = dir.path().join("stats");
    std::fs::create_dir_all(&stats_dir).expect("mkdir stats");

    let config = config_with(
        &[
            ("FANCTL_IPMITOOL", ipmitool.display().to_string()),
            ("FANCTL_SMARTCTL", smartctl.display().to_string()),
            ("FANCTL_CPU_SENSORS", "0Eh".to_string()),
            ("FANCTL_STATS_DIR", stats_dir.display().to_string()),
        ],
        &sys_block,
    );

    let ipmi = IpmiTool::new(config.ipmitool.clone(), Vec::new(), config.command_timeout);
    let metrics = runtime::build_metrics(&config, &ipmi).await.expect("metrics");
    let mut controller = Controller::new(metrics, config.controller.clone());
    assert_eq!(controller.metric_names(), vec!["board", "cpu0", "sda"]);

    let mut recorder = CsvRecorder::create(&config.stats_dir, Utc::now(), &controller.metric_names())
        .expect("recorder");
    let fans = IpmiFans::new(ipmi);

    // Already-resolved shutdown: exactly one cycle runs.
    runtime::run(
        &mut controller,
        &fans,
        &mut recorder,
        &ProcLoadAverage::new(dir.path().join("no-loadavg")),
        std::future::ready(()),
    )
    .await
    .expect("run");

    assert_eq!(controller.fan_index(), 96);

    let calls = std::fs::read_to_string(&log).expect("ipmitool log");
    assert!(
        calls.lines().any(|l| l == "raw 0x30 0x30 0x02 0xff 0x64"),
        "fan command not issued: {calls}"
    );

    let csv = std::fs::read_to_string(recorder.path()).expect("stats log");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "timestamp,fan_duty,system_load,board,cpu0,sda");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with(",100,,23,52,45"), "unexpected row: {}", lines[1]);
}
