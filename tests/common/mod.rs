//! Shared helpers for the integration tests: fixture loading and in-memory
//! stand-ins for the remote host and the counter store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use probealign::align::{MeasurementWindow, Resolution};
use probealign::error::{StoreError, TransportError};
use probealign::remote::{Direction, ProbeRunner, RemoteControl, ServerPid};
use probealign::store::{CounterStore, StoreRow};

/// Load a test fixture from `tests/common/fixtures`.
pub fn load_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load test fixture: {}", name))
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/common/fixtures")
        .join(name)
}

/// A single server report anchored at `anchor` with one interval per rate,
/// one second apart.
pub fn server_report(anchor: u64, rates: &[f64]) -> String {
    let intervals: Vec<String> = rates
        .iter()
        .enumerate()
        .map(|(i, rate)| {
            format!(
                r#"{{"sum":{{"start":{i}.0,"end":{}.0,"bits_per_second":{rate}}}}}"#,
                i + 1
            )
        })
        .collect();
    format!(
        r#"{{"server_output_json":{{"start":{{"timestamp":{{"timesecs":{anchor}}}}},"intervals":[{}]}}}}"#,
        intervals.join(",")
    )
}

/// Counter store serving canned rows per series id.
#[derive(Default)]
pub struct FakeStore {
    rows: HashMap<String, Vec<StoreRow>>,
    failing: Vec<String>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, series_id: &str, rows: &[(u64, Option<f64>)]) -> Self {
        self.rows.insert(
            series_id.to_string(),
            rows.iter()
                .map(|&(timestamp, value)| StoreRow { timestamp, value })
                .collect(),
        );
        self
    }

    pub fn failing(mut self, series_id: &str) -> Self {
        self.failing.push(series_id.to_string());
        self
    }
}

impl CounterStore for FakeStore {
    fn fetch(
        &self,
        series_id: &str,
        window: &MeasurementWindow,
        _resolution: Resolution,
    ) -> Result<Vec<StoreRow>, StoreError> {
        self.fetched.lock().unwrap().push(series_id.to_string());
        if self.failing.iter().any(|s| s == series_id) {
            return Err(StoreError::Command {
                series: series_id.to_string(),
                reason: "ERROR: opening file: No such file or directory".to_string(),
            });
        }
        Ok(self
            .rows
            .get(series_id)
            .map(|rows| {
                rows.iter()
                    .copied()
                    .filter(|row| window.contains(row.timestamp))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn last_update(&self, series_id: &str) -> Result<Option<u64>, StoreError> {
        Ok(self
            .rows
            .get(series_id)
            .and_then(|rows| rows.iter().map(|r| r.timestamp).max()))
    }
}

/// Remote host that records each call and hands out canned server reports.
pub struct FakeRemote {
    reports: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    /// `reports` are handed out in order, one per `fetch_report`.
    pub fn new(reports: Vec<String>) -> Self {
        Self {
            reports: Mutex::new(reports),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteControl for FakeRemote {
    async fn start_server(&self) -> Result<ServerPid, TransportError> {
        self.calls.lock().unwrap().push("start".to_string());
        ServerPid::parse("4242")
    }

    async fn stop_server(&self, pid: &ServerPid) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(format!("stop {}", pid));
        Ok(())
    }

    async fn fetch_report(&self, dest: &Path) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push("fetch".to_string());
        let report = {
            let mut reports = self.reports.lock().unwrap();
            if reports.is_empty() {
                String::new()
            } else {
                reports.remove(0)
            }
        };
        fs::write(dest, report)?;
        Ok(())
    }
}

/// Probe client that succeeds or fails on a chosen direction.
pub struct FakeProbe {
    fail_on: Option<Direction>,
    pub runs: Mutex<Vec<Direction>>,
}

impl FakeProbe {
    pub fn ok() -> Self {
        Self {
            fail_on: None,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(direction: Direction) -> Self {
        Self {
            fail_on: Some(direction),
            runs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProbeRunner for FakeProbe {
    async fn run(&self, direction: Direction, report: &Path) -> Result<(), TransportError> {
        self.runs.lock().unwrap().push(direction);
        if self.fail_on == Some(direction) {
            return Err(TransportError::CommandFailed {
                program: "iperf3".to_string(),
                status: 1,
                stderr: "iperf3: error - unable to connect to server".to_string(),
            });
        }
        fs::write(report, "{}")?;
        Ok(())
    }
}
