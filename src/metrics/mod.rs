// Series model and resampling
pub mod timeseries;

// Re-export key types for convenience
pub use timeseries::{Sample, SeriesMap, combined_range, resample};
