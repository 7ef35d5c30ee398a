use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use tracing::info;

use crate::merge::{Cell, MergedTable};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock rendering of an epoch timestamp.
pub fn local_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| Local.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn cell_field(cell: &Cell) -> String {
    match cell {
        Cell::Value(v) => v.to_string(),
        Cell::Absent => String::new(),
    }
}

/// Write the table as CSV: `timestamp`, `time`, then one column per series.
/// Absent cells become empty fields.
pub fn write_csv<W: Write>(table: &MergedTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let header = ["timestamp", "time"]
        .into_iter()
        .chain(table.columns.iter().map(String::as_str));
    csv.write_record(header).context("Failed to write CSV header")?;

    for row in &table.rows {
        let record = [row.timestamp.to_string(), local_time(row.timestamp)]
            .into_iter()
            .chain(row.cells.iter().map(cell_field));
        csv.write_record(record)
            .with_context(|| format!("Failed to write CSV row {}", row.timestamp))?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write the table to `path`, creating parent directories.
pub fn save_csv(table: &MergedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_csv(table, file)?;
    info!("Saved merged CSV: {} ({} rows)", path.display(), table.len());
    Ok(())
}
