use std::path::PathBuf;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::{CounterStore, StoreRow};
use crate::align::{MeasurementWindow, Resolution};
use crate::error::StoreError;

/// `<epoch>: <first data source value> [...]`
static FETCH_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+):\s+(\S+)").expect("static regex"));

/// Counter store backed by RRD files, queried through the `rrdtool` binary.
/// Series ids are RRD file paths.
#[derive(Debug, Clone)]
pub struct RrdTool {
    binary: PathBuf,
}

impl RrdTool {
    pub fn new() -> Self {
        Self::with_binary("rrdtool")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, series: &str, args: &[String]) -> Result<String, StoreError> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| StoreError::Command {
                series: series.to_string(),
                reason: format!("failed to execute {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(StoreError::Command {
                series: series.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for RrdTool {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for RrdTool {
    fn fetch(
        &self,
        series_id: &str,
        window: &MeasurementWindow,
        resolution: Resolution,
    ) -> Result<Vec<StoreRow>, StoreError> {
        let args = vec![
            "fetch".to_string(),
            series_id.to_string(),
            "AVERAGE".to_string(),
            "--resolution".to_string(),
            resolution.seconds().to_string(),
            "--start".to_string(),
            window.start().to_string(),
            "--end".to_string(),
            window.end().to_string(),
        ];
        let stdout = self.run(series_id, &args)?;
        parse_fetch_output(series_id, &stdout, resolution)
    }

    fn last_update(&self, series_id: &str) -> Result<Option<u64>, StoreError> {
        let stdout = self.run(series_id, &["last".to_string(), series_id.to_string()])?;
        let text = stdout.trim();
        let last = text.parse::<u64>().map_err(|_| StoreError::Parse {
            series: series_id.to_string(),
            line: 1,
            text: text.to_string(),
        })?;
        Ok((last > 0).then_some(last))
    }
}

/// Parse `rrdtool fetch` text output, keeping the first data source column.
///
/// rrdtool prints each row at the END of the step it summarizes; rows are
/// returned keyed at the START of that step so they share buckets with
/// resampled probe data. The step is the spacing between printed rows, or
/// `resolution` when there is only one. The header line naming the data
/// sources and blank lines are skipped; `nan`/`-nan` become null rows.
pub fn parse_fetch_output(
    series: &str,
    text: &str,
    resolution: Resolution,
) -> Result<Vec<StoreRow>, StoreError> {
    let mut rows = Vec::new();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = FETCH_ROW.captures(line) else {
            trace!("Skipping rrdtool header line: {:?}", line);
            continue;
        };

        let parse_error = || StoreError::Parse {
            series: series.to_string(),
            line: index + 1,
            text: line.to_string(),
        };
        let timestamp = caps[1].parse::<u64>().map_err(|_| parse_error())?;
        let raw = &caps[2];
        let value = if raw.to_ascii_lowercase().contains("nan") {
            None
        } else {
            Some(raw.parse::<f64>().map_err(|_| parse_error())?)
        };
        rows.push(StoreRow { timestamp, value });
    }

    let step = match rows.as_slice() {
        [first, second, ..] if second.timestamp > first.timestamp => {
            second.timestamp - first.timestamp
        }
        _ => resolution.seconds(),
    };
    if step != resolution.seconds() {
        debug!(
            "{} is stored at {}s steps, requested {}",
            series, step, resolution
        );
    }
    for row in &mut rows {
        row.timestamp = row.timestamp.saturating_sub(step);
    }

    Ok(rows)
}
