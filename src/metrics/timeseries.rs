use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::align::{Resolution, align_down};

/// A single raw observation at an absolute (possibly fractional) epoch time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A sparse series keyed on grid-aligned epoch seconds.
///
/// Every key is expected to be a multiple of the resolution the series was
/// built at. `resample` guarantees that; `insert` and `FromIterator` take keys
/// as given, so callers building a map by hand must align them first (see
/// `is_aligned`). A missing key means nothing was observed in that bucket; it
/// is never treated as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesMap {
    points: BTreeMap<u64, f64>,
}

impl SeriesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value at `timestamp`, replacing any previous one. The key is
    /// not checked against any grid.
    pub fn insert(&mut self, timestamp: u64, value: f64) {
        self.points.insert(timestamp, value);
    }

    pub fn get(&self, timestamp: u64) -> Option<f64> {
        self.points.get(&timestamp).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in ascending timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.points.iter().map(|(&t, &v)| (t, v))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = u64> + '_ {
        self.points.keys().copied()
    }

    /// True when every key lies on the `resolution` grid.
    pub fn is_aligned(&self, resolution: Resolution) -> bool {
        self.points
            .keys()
            .all(|&t| align_down(t, resolution) == t)
    }

    /// Earliest and latest key, or `None` for an empty series.
    pub fn time_range(&self) -> Option<(u64, u64)> {
        let first = self.points.first_key_value()?;
        let last = self.points.last_key_value()?;
        Some((*first.0, *last.0))
    }

    /// The points as raw samples, e.g. to feed them back through `resample`.
    pub fn samples(&self) -> Vec<Sample> {
        self.iter()
            .map(|(t, v)| Sample::new(t as f64, v))
            .collect()
    }
}

impl FromIterator<(u64, f64)> for SeriesMap {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Bucket samples into `[k*r, (k+1)*r)` windows and average each bucket.
///
/// Buckets without samples are left out. Within a bucket the values are summed
/// in sorted order, so the result does not depend on input order.
pub fn resample(samples: &[Sample], resolution: Resolution) -> SeriesMap {
    let mut buckets: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
    let mut dropped = 0usize;

    for sample in samples {
        if !sample.timestamp.is_finite() || sample.timestamp < 0.0 || !sample.value.is_finite() {
            dropped += 1;
            continue;
        }
        let key = align_down(sample.timestamp.floor() as u64, resolution);
        buckets.entry(key).or_default().push(sample.value);
    }

    if dropped > 0 {
        debug!("Dropped {} samples with invalid timestamp or value", dropped);
    }

    buckets
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            let sum: f64 = values.iter().sum();
            (key, sum / values.len() as f64)
        })
        .collect()
}

/// Overall coverage of several series: the earliest start and the latest end
/// among the non-empty ones. `None` when every series is empty.
pub fn combined_range<'a>(series: impl IntoIterator<Item = &'a SeriesMap>) -> Option<(u64, u64)> {
    let mut range: Option<(u64, u64)> = None;
    let mut empty = 0usize;

    for map in series {
        match map.time_range() {
            Some((lo, hi)) => {
                range = Some(match range {
                    Some((min, max)) => (min.min(lo), max.max(hi)),
                    None => (lo, hi),
                });
            }
            None => empty += 1,
        }
    }

    if empty > 0 {
        warn!("{} series are empty; combined range may be incomplete", empty);
    }
    range
}
