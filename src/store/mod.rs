//! Access to the passive counter store.

pub mod fetcher;
pub mod rrdtool;

use crate::align::{MeasurementWindow, Resolution};
use crate::error::StoreError;

pub use fetcher::{SeriesFetcher, SeriesSpec, Unit};
pub use rrdtool::RrdTool;

/// One row as returned by the store, keyed at the start of the step it
/// covers. `value: None` means the store itself recorded no data for that step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreRow {
    pub timestamp: u64,
    pub value: Option<f64>,
}

/// Read-only query interface over archived counters.
#[cfg_attr(test, mockall::automock)]
pub trait CounterStore {
    /// Rows for `series_id` across `window`, at the store's native step.
    fn fetch(
        &self,
        series_id: &str,
        window: &MeasurementWindow,
        resolution: Resolution,
    ) -> Result<Vec<StoreRow>, StoreError>;

    /// Timestamp of the most recent update the store knows about.
    fn last_update(&self, series_id: &str) -> Result<Option<u64>, StoreError>;
}
