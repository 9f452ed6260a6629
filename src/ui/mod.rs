pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    diagnostic, dim, error, header, info, muted, section, status, success, summary_row, warn,
};
pub use progress::ProgressManager;
pub use table::{render, stats_table, TableBuilder};
pub use theme::{theme, Theme};
