//! CSV stats log, one file per run.
//!
//! Columns are `timestamp,fan_duty,system_load` followed by one column per
//! metric in name order. Each row is flushed before [`CsvRecorder::record`]
//! returns so that a kill between cycles never loses a completed row.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use fanctl_core::error::{CoreError, CoreResult};
use fanctl_core::stats::{CycleSnapshot, StatsRecorder};

/// File name for a run started at `started_at`.
pub fn stats_file_name(started_at: DateTime<Utc>) -> String {
    format!("fanctl-{}.csv", started_at.format("%Y%m%d-%H%M%S"))
}

/// Appends [`CycleSnapshot`]s to a CSV file.
pub struct CsvRecorder {
    writer: csv::Writer<File>,
    path: PathBuf,
    columns: Vec<String>,
}

impl CsvRecorder {
    /// Create the run's stats file in `dir` and write the header.
    ///
    /// `metric_names` fixes the metric columns for the whole run.
    pub fn create(dir: &Path, started_at: DateTime<Utc>, metric_names: &[String]) -> CoreResult<Self> {
        let path = dir.join(stats_file_name(started_at));
        let mut columns = metric_names.to_vec();
        columns.sort();

        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| CoreError::RecorderIo(format!("{}: {e}", path.display())))?;

        let mut header = vec!["timestamp", "fan_duty", "system_load"];
        header.extend(columns.iter().map(String::as_str));
        writer.write_record(&header).map_err(recorder_err)?;
        writer.flush().map_err(|e| CoreError::RecorderIo(e.to_string()))?;

        tracing::info!(path = %path.display(), columns = columns.len(), "Stats log opened");

        Ok(Self {
            writer,
            path,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsRecorder for CsvRecorder {
    fn record(&mut self, snapshot: &CycleSnapshot) -> CoreResult<()> {
        let mut row = Vec::with_capacity(3 + self.columns.len());
        row.push(snapshot.timestamp.to_string());
        row.push(snapshot.fan_duty.to_string());
        row.push(snapshot.system_load.map(|l| l.to_string()).unwrap_or_default());
        for column in &self.columns {
            row.push(
                snapshot
                    .metrics
                    .get(column)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }

        self.writer.write_record(&row).map_err(recorder_err)?;
        self.writer
            .flush()
            .map_err(|e| CoreError::RecorderIo(e.to_string()))
    }
}

fn recorder_err(e: csv::Error) -> CoreError {
    CoreError::RecorderIo(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;

    fn started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn file_is_named_by_start_time() {
        assert_eq!(stats_file_name(started_at()), "fanctl-20260314-150926.csv");
    }

    #[test]
    fn writes_header_and_flushed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let names = vec!["sda".to_string(), "cpu0".to_string(), "board".to_string()];
        let mut recorder = CsvRecorder::create(dir.path(), started_at(), &names).expect("create");

        let metrics: BTreeMap<String, f64> = [
            ("board".to_string(), 24.0),
            ("cpu0".to_string(), 51.5),
            ("sda".to_string(), 33.0),
        ]
        .into_iter()
        .collect();
        recorder
            .record(&CycleSnapshot {
                timestamp: 1_773_500_966,
                fan_duty: 0x34,
                system_load: Some(0.75),
                metrics,
            })
            .expect("record");

        // Read back without dropping the recorder: the row must already be on disk.
        let contents = std::fs::read_to_string(recorder.path()).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "timestamp,fan_duty,system_load,board,cpu0,sda");
        assert_eq!(lines[1], "1773500966,52,0.75,24,51.5,33");
    }

    #[test]
    fn missing_values_leave_empty_cells() {
        let dir = tempfile::tempdir().expect("tempdir");
        let names = vec!["cpu0".to_string(), "sda".to_string()];
        let mut recorder = CsvRecorder::create(dir.path(), started_at(), &names).expect("create");

        let metrics: BTreeMap<String, f64> = [("cpu0".to_string(), 40.0)].into_iter().collect();
        recorder
            .record(&CycleSnapshot {
                timestamp: 1,
                fan_duty: 4,
                system_load: None,
                metrics,
            })
            .expect("record");

        let contents = std::fs::read_to_string(recorder.path()).expect("read");
        assert_eq!(contents.lines().nth(1), Some("1,4,,40,"));
    }

    #[test]
    fn unwritable_directory_fails_at_open() {
        let result = CsvRecorder::create(Path::new("/nonexistent/fanctl"), started_at(), &[]);
        assert!(matches!(result, Err(CoreError::RecorderIo(_))));
    }
}
