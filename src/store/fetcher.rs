use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CounterStore, StoreRow};
use crate::align::{MeasurementWindow, Resolution};
use crate::error::StoreError;
use crate::metrics::{Sample, SeriesMap, resample};

/// Native unit of a stored series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Stored as-is (load average, memory, counts per second).
    #[default]
    Raw,
    /// Bytes per second; reported as bits per second.
    Octets,
}

impl Unit {
    pub fn factor(self) -> f64 {
        match self {
            Unit::Raw => 1.0,
            Unit::Octets => 8.0,
        }
    }
}

/// A named series and where to find it in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    /// Column label in the merged table
    pub name: String,
    /// Store identifier (RRD file path)
    pub source: String,
    #[serde(default)]
    pub unit: Unit,
}

impl SeriesSpec {
    pub fn new(name: impl Into<String>, source: impl Into<String>, unit: Unit) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            unit,
        }
    }
}

/// Fetches series from a counter store and normalizes them onto the grid.
pub struct SeriesFetcher<'a, S: CounterStore + ?Sized> {
    store: &'a S,
    resolution: Resolution,
}

impl<'a, S: CounterStore + ?Sized> SeriesFetcher<'a, S> {
    pub fn new(store: &'a S, resolution: Resolution) -> Self {
        Self { store, resolution }
    }

    /// Fetch one series, propagating store errors.
    pub fn try_fetch(
        &self,
        spec: &SeriesSpec,
        window: &MeasurementWindow,
    ) -> Result<SeriesMap, StoreError> {
        let rows = self.store.fetch(&spec.source, window, self.resolution)?;
        let series = convert_rows(&rows, spec.unit, self.resolution);
        debug!(
            "Fetched {}: {} rows, {} non-null",
            spec.name,
            rows.len(),
            series.len()
        );
        Ok(series)
    }

    /// Fetch one series; a failure is logged and yields an empty series.
    pub fn fetch(&self, spec: &SeriesSpec, window: &MeasurementWindow) -> SeriesMap {
        info!("Fetching {} from {}", spec.name, spec.source);
        self.try_fetch(spec, window).unwrap_or_else(|e| {
            warn!("Failed to fetch {}: {}", spec.name, e);
            SeriesMap::new()
        })
    }

    /// Fetch every spec independently, keeping their order.
    pub fn fetch_all(
        &self,
        specs: &[SeriesSpec],
        window: &MeasurementWindow,
    ) -> Vec<(String, SeriesMap)> {
        specs
            .iter()
            .map(|spec| (spec.name.clone(), self.fetch(spec, window)))
            .collect()
    }

    /// Log when the store last saw each series; diagnostic only.
    pub fn log_last_updates(&self, specs: &[SeriesSpec]) {
        for spec in specs {
            match self.store.last_update(&spec.source) {
                Ok(Some(ts)) => info!("Counter store last update for {}: {}", spec.name, ts),
                Ok(None) => info!("Counter store last update for {}: N/A", spec.name),
                Err(e) => warn!("Could not read last update for {}: {}", spec.name, e),
            }
        }
    }
}

/// Drop null rows, scale to the normalized unit and re-bucket onto the grid.
pub fn convert_rows(rows: &[StoreRow], unit: Unit, resolution: Resolution) -> SeriesMap {
    let factor = unit.factor();
    let samples: Vec<Sample> = rows
        .iter()
        .filter_map(|row| {
            row.value
                .map(|value| Sample::new(row.timestamp as f64, value * factor))
        })
        .collect();
    resample(&samples, resolution)
}
