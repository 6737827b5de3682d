//! Virtualized member table: column layout, row heights, the visible window,
//! and the events user input turns into.

mod columns;
mod display;
mod events;
mod height_cache;
mod state;
mod window;

pub use columns::{Alignment, ColumnSpec, MIN_COLUMN_WIDTH, column_widths, hash_columns, zset_columns};
pub use display::{
    LONG_NAME_LIMIT, NO_RESULTS_FOUND_TEXT, cell_content, delete_popover_id, edit_button_id,
    format_long_name, progress_id, remove_button_id, value_cell_id,
};
pub use events::{ColumnSearchState, TableEvent};
pub use height_cache::HeightCache;
pub use state::VirtualTableState;
pub use window::{LoadRange, VirtualWindow};
