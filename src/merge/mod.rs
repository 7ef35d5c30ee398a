//! Union of named sparse series into one row table.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::metrics::SeriesMap;

/// Counter-derived inbound rate column.
pub const COUNTER_IN: &str = "rrd_in_bps";
/// Counter-derived outbound rate column.
pub const COUNTER_OUT: &str = "rrd_out_bps";
/// Probe-derived inbound rate column (server receiving).
pub const PROBE_IN: &str = "iperf_server_in_bps";
/// Probe-derived outbound rate column (server sending).
pub const PROBE_OUT: &str = "iperf_server_out_bps";

/// One cell of the merged table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Value(f64),
    /// The metric has no observation at this timestamp.
    Absent,
}

impl Cell {
    pub fn value(self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Absent => None,
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Cell::Absent)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Absent, Cell::Value)
    }
}

/// Declared column order of the merged table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSchema {
    columns: Vec<String>,
}

impl MergeSchema {
    /// Columns in the given order. Names are expected to be unique; a repeated
    /// name only ever receives data in its first position.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Counter in/out, probe in/out, then the overhead metrics in order.
    pub fn standard<I, S>(overhead: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base = [COUNTER_IN, COUNTER_OUT, PROBE_IN, PROBE_OUT].map(String::from);
        Self {
            columns: base
                .into_iter()
                .chain(overhead.into_iter().map(Into::into))
                .collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub timestamp: u64,
    /// One cell per schema column, in schema order
    pub cells: Vec<Cell>,
}

impl MergedRow {
    pub fn populated(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_absent()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Cell for `column` at `timestamp`, if both exist.
    pub fn cell(&self, timestamp: u64, column: &str) -> Option<Cell> {
        let index = self.columns.iter().position(|c| c == column)?;
        let row = self
            .rows
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()?;
        self.rows[row].cells.get(index).copied()
    }
}

/// Merge named series into rows keyed by the union of their timestamps.
///
/// Series are matched to columns by name, so the order they arrive in does
/// not matter. Every cell is an exact-timestamp lookup; nothing is filled in.
/// Series whose name is not in the schema are ignored.
pub fn merge<'a, I>(schema: &MergeSchema, series: I) -> MergedTable
where
    I: IntoIterator<Item = (&'a str, &'a SeriesMap)>,
{
    let mut slots: Vec<Option<&SeriesMap>> = vec![None; schema.columns.len()];

    for (name, map) in series {
        match schema.position(name) {
            Some(index) if slots[index].is_some() => {
                warn!("Series {} supplied more than once, keeping the first", name);
            }
            Some(index) => slots[index] = Some(map),
            None => warn!("Series {} is not a declared column, ignoring it", name),
        }
    }

    let timestamps: BTreeSet<u64> = slots
        .iter()
        .flatten()
        .flat_map(|map| map.timestamps())
        .collect();

    let rows: Vec<MergedRow> = timestamps
        .into_iter()
        .map(|timestamp| MergedRow {
            timestamp,
            cells: slots
                .iter()
                .map(|slot| Cell::from(slot.and_then(|map| map.get(timestamp))))
                .collect(),
        })
        .collect();

    debug!(
        "Merged {} series into {} rows",
        slots.iter().flatten().count(),
        rows.len()
    );

    MergedTable {
        columns: schema.columns.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn series(points: &[(u64, f64)]) -> SeriesMap {
        points.iter().copied().collect()
    }

    #[test]
    fn missing_key_is_absent_not_zero() {
        let schema = MergeSchema::new(["x", "y"]);
        let x = series(&[(100, 1.0)]);
        let y = series(&[(100, 2.0), (130, 3.0)]);
        let table = merge(&schema, [("x", &x), ("y", &y)]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(130, "x"), Some(Cell::Absent));
        assert_eq!(table.cell(130, "y"), Some(Cell::Value(3.0)));
        assert_eq!(table.rows[0].cells, vec![Cell::Value(1.0), Cell::Value(2.0)]);
    }

    #[test]
    fn column_order_follows_schema() {
        let schema = MergeSchema::new(["b", "a"]);
        let a = series(&[(0, 1.0)]);
        let b = series(&[(0, 2.0)]);
        let table = merge(&schema, [("a", &a), ("b", &b)]);
        assert_eq!(table.columns, vec!["b", "a"]);
        assert_eq!(table.rows[0].cells, vec![Cell::Value(2.0), Cell::Value(1.0)]);
    }

    #[test]
    fn undeclared_and_unsupplied_series() {
        let schema = MergeSchema::standard(["cpu_load"]);
        let probe = series(&[(60, 5.0)]);
        let stray = series(&[(90, 9.0)]);
        let table = merge(&schema, [(PROBE_IN, &probe), ("stray", &stray)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].populated(), 1);
        assert_eq!(table.cell(60, "cpu_load"), Some(Cell::Absent));
        assert_eq!(table.cell(90, PROBE_IN), None);
    }

    #[test]
    fn empty_inputs_produce_empty_table() {
        let schema = MergeSchema::standard(Vec::<String>::new());
        let empty = SeriesMap::new();
        let table = merge(&schema, [(COUNTER_IN, &empty)]);
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 4);
    }

    proptest! {
        #[test]
        fn merge_ignores_supply_order(
            maps in prop::collection::vec(
                prop::collection::btree_map(0u64..50, -1e6f64..1e6, 0..20),
                1..6,
            ),
            rotate in 0usize..6,
        ) {
            let names: Vec<String> = (0..maps.len()).map(|i| format!("m{i}")).collect();
            let series: Vec<SeriesMap> = maps
                .iter()
                .map(|m| m.iter().map(|(&k, &v)| (k * 30, v)).collect())
                .collect();
            let schema = MergeSchema::new(names.clone());

            let forward: Vec<(&str, &SeriesMap)> =
                names.iter().map(String::as_str).zip(series.iter()).collect();
            let mut shuffled = forward.clone();
            shuffled.reverse();
            let len = shuffled.len();
            shuffled.rotate_left(rotate % len);

            prop_assert_eq!(merge(&schema, forward), merge(&schema, shuffled));
        }
    }
}
