use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::split::split_documents;
use crate::error::TransportError;
use crate::metrics::Sample;

/// Which end of the probe wrote the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeSide {
    /// Single report from the local client; an embedded server report is
    /// ignored.
    Client,
    /// One report per test run, each possibly wrapped in
    /// `server_output_json`.
    Server,
}

/// Only the document framing is typed. Sections are kept as raw JSON so a
/// bad field costs its own record, not the whole document.
#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    start: Value,
    #[serde(default)]
    intervals: Value,
    server_output_json: Option<Box<ProbeReport>>,
}

/// One interval as reported, relative to its document's anchor.
#[derive(Debug, Clone, Copy)]
struct RawIntervalRecord {
    offset: f64,
    rate: f64,
}

impl RawIntervalRecord {
    fn from_interval(interval: &Value) -> Option<Self> {
        let sum = interval.get("sum")?;
        Some(Self {
            offset: sum.get("start")?.as_f64()?,
            rate: sum.get("bits_per_second")?.as_f64()?,
        })
    }
}

impl ProbeReport {
    fn anchor(&self) -> Option<f64> {
        self.start
            .pointer("/timestamp/timesecs")?
            .as_f64()
            .map(f64::trunc)
    }

    fn records(&self) -> impl Iterator<Item = RawIntervalRecord> + '_ {
        if !self.intervals.is_null() && !self.intervals.is_array() {
            warn!("Probe document has a non-array `intervals` section, ignoring it");
        }
        self.intervals
            .as_array()
            .into_iter()
            .flatten()
            .enumerate()
            .filter_map(|(index, interval)| {
                let record = RawIntervalRecord::from_interval(interval);
                if record.is_none() {
                    debug!("Skipping interval #{} without a numeric start and rate", index);
                }
                record
            })
            .filter(|record| {
                let valid = record.offset >= 0.0;
                if !valid {
                    debug!("Skipping interval with negative offset {}", record.offset);
                }
                valid
            })
    }
}

/// Parse probe output into absolute-time rate samples, anchoring documents
/// without a start time at the current wall clock.
pub fn extract_samples(text: &str, side: ProbeSide) -> Vec<Sample> {
    extract_samples_with_fallback(text, side, Utc::now().timestamp() as f64)
}

/// As [`extract_samples`], with an explicit anchor for documents that lack
/// one.
pub fn extract_samples_with_fallback(text: &str, side: ProbeSide, fallback_anchor: f64) -> Vec<Sample> {
    let mut samples = Vec::new();

    for (index, chunk) in split_documents(text).into_iter().enumerate() {
        let mut report: ProbeReport = match serde_json::from_str(chunk) {
            Ok(report) => report,
            Err(e) => {
                warn!("Skipping malformed probe document #{}: {}", index, e);
                continue;
            }
        };

        if side == ProbeSide::Server {
            if let Some(inner) = report.server_output_json.take() {
                report = *inner;
            }
        }

        let anchor = report.anchor().unwrap_or_else(|| {
            warn!(
                "Probe document #{} has no start timestamp, anchoring at {}",
                index, fallback_anchor
            );
            fallback_anchor
        });

        samples.extend(
            report
                .records()
                .map(|record| Sample::new(anchor + record.offset, record.rate)),
        );
    }

    if samples.is_empty() {
        warn!("No valid intervals parsed from probe output");
    }
    samples
}

/// Read a saved probe report from disk and extract its samples.
pub fn extract_file(path: &Path, side: ProbeSide) -> Result<Vec<Sample>, TransportError> {
    let text = std::fs::read_to_string(path).map_err(|source| TransportError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    let samples = extract_samples(&text, side);
    debug!("Parsed {} samples from {}", samples.len(), path.display());
    Ok(samples)
}
