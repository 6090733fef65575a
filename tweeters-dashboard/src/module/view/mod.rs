//! Presentation-ready views derived from loaded snapshots

pub mod histogram;
pub mod selection;
pub mod table;

pub use histogram::{ChartLayout, ChartSeries, ChartSpec, histogram};
pub use selection::{HourRange, ViewSelection};
pub use table::{TablePage, TableQuery, TableRow, table_columns, table_rows};
