use crate::paging::SortSpec;

use super::window::LoadRange;

/// Committed value of one column's search field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSearchState {
    pub id: String,
    pub value: String,
}

impl ColumnSearchState {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// What the table asks its owner to do in response to user input.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    LoadMore(LoadRange),
    SortChanged(SortSpec),
    SearchCommitted {
        column: String,
        value: String,
    },
    RowToggled {
        row: usize,
        expanded: bool,
        largest_cell_length: usize,
    },
}
