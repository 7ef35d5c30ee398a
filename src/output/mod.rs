pub mod summary;
pub mod table;

pub use summary::{ColumnStats, column_stats, render_summary};
pub use table::{local_time, save_csv, write_csv};
