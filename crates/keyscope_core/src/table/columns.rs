/// Narrowest width a flexible column is squeezed to.
pub const MIN_COLUMN_WIDTH: f32 = 190.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Header and cell behaviour of one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub id: String,
    pub label: String,
    pub sortable: bool,
    pub searchable: bool,
    pub truncate: bool,
    pub alignment: Alignment,
    /// Search field is prefixed with the column label ("Member:").
    pub prepend_search_name: bool,
    pub initial_search_value: Option<String>,
    /// Fixed width in pixels; `None` shares the remaining width.
    pub absolute_width: Option<f32>,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            sortable: false,
            searchable: false,
            truncate: false,
            alignment: Alignment::Left,
            prepend_search_name: false,
            initial_search_value: None,
            absolute_width: None,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self.prepend_search_name = true;
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_search_value(mut self, value: impl Into<String>) -> Self {
        self.initial_search_value = Some(value.into());
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.absolute_width = Some(width);
        self
    }

    pub fn search_prefix(&self) -> Option<String> {
        self.prepend_search_name.then(|| format!("{}:", self.label))
    }
}

/// Column set of the sorted set view: member name, score, actions.
pub fn zset_columns(actions_width: f32) -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("name", "Member").searchable().truncated(),
        ColumnSpec::new("score", "Score")
            .sortable()
            .truncated()
            .aligned(Alignment::Right),
        ColumnSpec::new("actions", "").with_width(actions_width),
    ]
}

/// Column set of the hash view: field, value, actions.
pub fn hash_columns(actions_width: f32) -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("field", "Field").searchable().truncated(),
        ColumnSpec::new("value", "Value").truncated(),
        ColumnSpec::new("actions", "").with_width(actions_width),
    ]
}

/// Resolves each column's width: fixed columns keep theirs, the rest share what is left.
pub fn column_widths(total_width: f32, columns: &[ColumnSpec]) -> Vec<f32> {
    let fixed: f32 = columns.iter().filter_map(|c| c.absolute_width).sum();
    let flexible = columns
        .iter()
        .filter(|c| c.absolute_width.is_none())
        .count();

    let share = if flexible == 0 {
        0.0
    } else {
        ((total_width - fixed) / flexible as f32).max(MIN_COLUMN_WIDTH)
    };

    columns
        .iter()
        .map(|c| c.absolute_width.unwrap_or(share))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexible_columns_split_the_remainder() {
        let widths = column_widths(1000.0, &zset_columns(80.0));
        assert_eq!(widths, vec![460.0, 460.0, 80.0]);
    }

    #[test]
    fn narrow_tables_clamp_to_minimum() {
        let widths = column_widths(300.0, &hash_columns(80.0));
        assert_eq!(widths, vec![MIN_COLUMN_WIDTH, MIN_COLUMN_WIDTH, 80.0]);
    }

    #[test]
    fn search_prefix_uses_label_when_requested() {
        let columns = zset_columns(100.0);
        assert_eq!(columns[0].search_prefix().as_deref(), Some("Member:"));
        assert_eq!(columns[1].search_prefix(), None);
    }
}
