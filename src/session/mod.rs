//! The two-pass measurement session and the reconciliation that follows it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tokio::runtime::RuntimeFlavor;
use tracing::{error, info, warn};

use crate::align::{MeasurementWindow, OverlapOutcome, Resolution, check_overlap};
use crate::config::Config;
use crate::merge::{MergeSchema, MergedTable, PROBE_IN, PROBE_OUT, merge};
use crate::metrics::{Sample, SeriesMap, combined_range, resample};
use crate::probe::{ProbeSide, extract_file};
use crate::remote::{Direction, ProbeRunner, RemoteControl};
use crate::store::{CounterStore, SeriesFetcher};

/// File name of the server report for the forward (inbound) pass.
pub const INBOUND_REPORT: &str = "iperf3_server_in.json";
/// File name of the server report for the reverse (outbound) pass.
pub const OUTBOUND_REPORT: &str = "iperf3_server_out.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    MeasuringForward,
    MeasuringReverse,
    Settling,
    Fetching,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Starting => "starting",
            Phase::MeasuringForward => "measuring forward",
            Phase::MeasuringReverse => "measuring reverse",
            Phase::Settling => "settling",
            Phase::Fetching => "fetching",
            Phase::Merging => "merging",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Every series that goes into the merged table, already on the grid.
#[derive(Debug, Clone)]
pub struct Sources {
    pub probe_in: SeriesMap,
    pub probe_out: SeriesMap,
    pub counters: Vec<(String, SeriesMap)>,
    pub overhead: Vec<(String, SeriesMap)>,
}

impl Sources {
    /// Resample the two server reports and fetch every store series over
    /// `window`. Store failures only leave their series empty.
    pub fn collect<S: CounterStore + ?Sized>(
        config: &Config,
        store: &S,
        inbound: &[Sample],
        outbound: &[Sample],
        window: &MeasurementWindow,
    ) -> Self {
        let resolution = window.step();
        let probe_in = resample(inbound, resolution);
        let probe_out = resample(outbound, resolution);
        info!(
            "Probe series: {} inbound and {} outbound buckets at {}",
            probe_in.len(),
            probe_out.len(),
            resolution
        );

        let fetcher = SeriesFetcher::new(store, resolution);
        let sources = Self {
            probe_in,
            probe_out,
            counters: fetcher.fetch_all(&config.counter_specs(), window),
            overhead: fetcher.fetch_all(&config.overhead, window),
        };
        debug_assert!(sources.all_series().all(|(_, s)| s.is_aligned(resolution)));
        sources
    }

    fn all_series(&self) -> impl Iterator<Item = (&str, &SeriesMap)> {
        self.counters
            .iter()
            .chain(&self.overhead)
            .map(|(name, series)| (name.as_str(), series))
            .chain([(PROBE_IN, &self.probe_in), (PROBE_OUT, &self.probe_out)])
    }

    /// Compare what the probe covered with what the counters covered.
    pub fn overlap(&self) -> OverlapOutcome {
        let probe = combined_range([&self.probe_in, &self.probe_out]);
        let store = combined_range(self.counters.iter().map(|(_, series)| series));
        check_overlap(probe, store)
    }

    pub fn merge(&self, schema: &MergeSchema) -> MergedTable {
        merge(schema, self.all_series())
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub window: MeasurementWindow,
    pub overlap: OverlapOutcome,
    pub table: MergedTable,
}

/// Smallest grid window covering every sample in the two reports.
pub fn probe_window(
    inbound: &[Sample],
    outbound: &[Sample],
    resolution: Resolution,
) -> Result<MeasurementWindow> {
    let mut timestamps = inbound
        .iter()
        .chain(outbound)
        .map(|s| s.timestamp)
        .filter(|t| t.is_finite() && *t >= 0.0);

    let Some(first) = timestamps.next() else {
        bail!("probe reports contain no samples to derive a window from");
    };
    let (min, max) = timestamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    Ok(MeasurementWindow::enclosing(
        min.floor() as u64,
        max.ceil() as u64,
        resolution,
    )?)
}

/// Run blocking store and file I/O from async code. On a multi-threaded
/// runtime the worker hands its other tasks off first; elsewhere `f` runs
/// inline, since `block_in_place` is unavailable there.
pub fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn unix_now() -> Result<u64> {
    u64::try_from(Utc::now().timestamp()).context("system clock is before the Unix epoch")
}

/// Drives both probe passes and reconciles them with the counter store.
pub struct Session<'a> {
    config: &'a Config,
    remote: &'a dyn RemoteControl,
    probe: &'a dyn ProbeRunner,
    store: &'a dyn CounterStore,
    phase: Phase,
    history: Vec<Phase>,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a Config,
        remote: &'a dyn RemoteControl,
        probe: &'a dyn ProbeRunner,
        store: &'a dyn CounterStore,
    ) -> Self {
        Self {
            config,
            remote,
            probe,
            store,
            phase: Phase::Idle,
            history: vec![Phase::Idle],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phases entered so far, starting with `Idle`.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    fn enter(&mut self, next: Phase) {
        info!("Phase: {} -> {}", self.phase, next);
        self.phase = next;
        self.history.push(next);
    }

    pub async fn run(&mut self) -> Result<SessionReport> {
        match self.execute().await {
            Ok(report) => {
                self.enter(Phase::Done);
                Ok(report)
            }
            Err(e) => {
                error!("Session failed while {}: {:#}", self.phase, e);
                self.enter(Phase::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<SessionReport> {
        let config = self.config;
        config.validate()?;
        let resolution = config.resolution()?;
        let report_dir = &config.output.report_dir;

        self.enter(Phase::Starting);
        tokio::fs::create_dir_all(report_dir)
            .await
            .with_context(|| format!("Failed to create report directory {}", report_dir.display()))?;
        let inbound_report = report_dir.join(INBOUND_REPORT);
        let outbound_report = report_dir.join(OUTBOUND_REPORT);
        let t_start = unix_now()?;
        info!("Measurement start: {}", t_start);

        self.enter(Phase::MeasuringForward);
        self.measure(Direction::Forward, &inbound_report).await?;

        self.enter(Phase::MeasuringReverse);
        self.measure(Direction::Reverse, &outbound_report).await?;

        self.enter(Phase::Settling);
        let settle = config.settle_delay();
        info!("Waiting {}s for the counter store to catch up", settle.as_secs());
        tokio::time::sleep(settle).await;
        let t_end = unix_now()?;
        let window = MeasurementWindow::enclosing(t_start, t_end, resolution)?;
        info!("Fetch window: {}", window);

        self.enter(Phase::Fetching);
        let store = self.store;
        let sources = run_blocking(|| -> Result<Sources> {
            SeriesFetcher::new(store, resolution).log_last_updates(&config.counter_specs());
            let inbound = extract_file(&inbound_report, ProbeSide::Server)?;
            let outbound = extract_file(&outbound_report, ProbeSide::Server)?;
            Ok(Sources::collect(config, store, &inbound, &outbound, &window))
        })?;
        let overlap = sources.overlap();

        self.enter(Phase::Merging);
        let table = sources.merge(&config.schema());
        info!("Merged table: {} rows", table.len());

        Ok(SessionReport {
            window,
            overlap,
            table,
        })
    }

    /// One pass: start the server, run the client, stop the server and copy
    /// its report to `server_report`. A started server is always stopped.
    async fn measure(&self, direction: Direction, server_report: &Path) -> Result<()> {
        let client_report = client_report_path(server_report, direction);

        let pid = self
            .remote
            .start_server()
            .await
            .context("Failed to start remote probe server")?;
        tokio::time::sleep(Duration::from_secs(self.config.probe.startup_delay_secs)).await;

        let run = self.probe.run(direction, &client_report).await;
        let stop = self.remote.stop_server(&pid).await;

        match (run, stop) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(e)) => {
                return Err(e).with_context(|| format!("Failed to stop remote server {}", pid));
            }
            (Err(e), stop) => {
                if let Err(stop_err) = stop {
                    warn!("Failed to stop remote server {}: {}", pid, stop_err);
                }
                return Err(e).with_context(|| format!("{} probe pass failed", direction));
            }
        }

        self.remote
            .fetch_report(server_report)
            .await
            .context("Failed to copy server report")?;
        Ok(())
    }
}

/// Client report saved next to the server report of the same pass.
fn client_report_path(server_report: &Path, direction: Direction) -> PathBuf {
    let name = match direction {
        Direction::Forward => "iperf3_client_in.json",
        Direction::Reverse => "iperf3_client_out.json",
    };
    server_report.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{COUNTER_IN, Cell};
    use crate::store::{MockCounterStore, StoreRow};

    fn res(s: u64) -> Resolution {
        Resolution::new(s).unwrap()
    }

    #[test]
    fn probe_window_covers_both_reports() {
        let inbound = [Sample::new(1005.5, 1.0)];
        let outbound = [Sample::new(1061.0, 1.0), Sample::new(-1.0, 1.0)];
        let window = probe_window(&inbound, &outbound, res(30)).unwrap();
        assert_eq!((window.start(), window.end()), (990, 1080));
    }

    #[test]
    fn probe_window_needs_samples() {
        assert!(probe_window(&[], &[], res(30)).is_err());
    }

    #[test]
    fn sources_merge_probe_and_counters() {
        let mut store = MockCounterStore::new();
        store.expect_fetch().returning(|id, _, _| {
            if id.ends_with("ifHCInOctets.rrd") {
                Ok(vec![StoreRow { timestamp: 1020, value: Some(100.0) }])
            } else {
                Ok(Vec::new())
            }
        });

        let config = Config::default();
        let window = MeasurementWindow::enclosing(990, 1080, res(30)).unwrap();
        let inbound = [Sample::new(1020.0, 2.0), Sample::new(1021.0, 4.0)];
        let sources = Sources::collect(&config, &store, &inbound, &[], &window);

        assert_eq!(sources.overlap(), OverlapOutcome::Overlap { start: 1020, end: 1020 });
        let table = sources.merge(&config.schema());
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(1020, COUNTER_IN), Some(Cell::Value(800.0)));
        assert_eq!(table.cell(1020, PROBE_IN), Some(Cell::Value(3.0)));
        assert_eq!(table.cell(1020, PROBE_OUT), Some(Cell::Absent));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn blocking_fetch_frees_the_only_worker() {
        // Runs on the single worker, so a queued task can only make progress
        // if the worker is handed off while the closure blocks.
        let outcome = tokio::spawn(async {
            let (tx, rx) = std::sync::mpsc::channel();
            tokio::spawn(async move {
                let _ = tx.send(());
            });
            run_blocking(|| rx.recv_timeout(Duration::from_secs(5)))
        })
        .await
        .unwrap();
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn blocking_runs_inline_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[test]
    fn blocking_runs_inline_outside_a_runtime() {
        assert_eq!(run_blocking(|| "done"), "done");
    }

    #[test]
    fn client_reports_sit_beside_server_reports() {
        let server = Path::new("json_data").join(INBOUND_REPORT);
        assert_eq!(
            client_report_path(&server, Direction::Forward),
            Path::new("json_data").join("iperf3_client_in.json")
        );
    }
}
