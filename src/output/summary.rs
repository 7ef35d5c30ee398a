use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};

use crate::align::OverlapOutcome;
use crate::merge::MergedTable;

/// Per-column coverage of a merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub name: String,
    pub populated: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub fn column_stats(table: &MergedTable) -> Vec<ColumnStats> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let values: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|row| row.cells.get(index).and_then(|c| c.value()))
                .collect();
            let populated = values.len();
            let mean = (populated > 0).then(|| values.iter().sum::<f64>() / populated as f64);
            ColumnStats {
                name: name.clone(),
                populated,
                mean,
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

/// Human-readable coverage report printed after a run.
pub fn render_summary(table: &MergedTable, overlap: OverlapOutcome) -> String {
    let mut out = Table::new();
    out.load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Series", "Rows", "Mean", "Min", "Max"]);

    for stats in column_stats(table) {
        out.add_row(vec![
            stats.name,
            format!("{}/{}", stats.populated, table.len()),
            fmt_opt(stats.mean),
            fmt_opt(stats.min),
            fmt_opt(stats.max),
        ]);
    }

    let overlap_line = match overlap {
        OverlapOutcome::Overlap { start, end } => format!("Overlap: {} .. {}", start, end),
        OverlapOutcome::NoOverlap { start, end } => {
            format!("No overlap: store and probe ranges are disjoint ({} > {})", start, end)
        }
        OverlapOutcome::Indeterminate => "Overlap: unknown (a source produced no samples)".to_string(),
    };
    format!("{}\n{}", out, overlap_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{Cell, MergedRow};

    #[test]
    fn stats_skip_absent_cells() {
        let table = MergedTable {
            columns: vec!["x".into(), "y".into()],
            rows: vec![
                MergedRow { timestamp: 0, cells: vec![Cell::Value(2.0), Cell::Absent] },
                MergedRow { timestamp: 30, cells: vec![Cell::Value(4.0), Cell::Absent] },
            ],
        };
        let stats = column_stats(&table);
        assert_eq!(stats[0].populated, 2);
        assert_eq!(stats[0].mean, Some(3.0));
        assert_eq!(stats[0].min, Some(2.0));
        assert_eq!(stats[1].populated, 0);
        assert_eq!(stats[1].mean, None);

        let rendered = render_summary(&table, OverlapOutcome::Indeterminate);
        assert!(rendered.contains("2/2"));
        assert!(rendered.contains("Overlap: unknown"));
    }
}
