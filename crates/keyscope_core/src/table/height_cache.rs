use std::collections::BTreeMap;

/// Measured row heights. Rows that were never measured, or whose entry was
/// invalidated, count as `min_height`.
#[derive(Debug, Clone)]
pub struct HeightCache {
    min_height: f32,
    heights: BTreeMap<usize, f32>,
}

impl HeightCache {
    pub fn new(min_height: f32) -> Self {
        Self {
            min_height,
            heights: BTreeMap::new(),
        }
    }

    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    pub fn height(&self, row: usize) -> f32 {
        self.heights.get(&row).copied().unwrap_or(self.min_height)
    }

    pub fn is_measured(&self, row: usize) -> bool {
        self.heights.contains_key(&row)
    }

    /// Stores a measurement; returns true when the row's height changed.
    pub fn measure(&mut self, row: usize, height: f32) -> bool {
        let height = height.max(self.min_height);
        let previous = self.heights.insert(row, height);
        previous != Some(height)
    }

    pub fn invalidate(&mut self, row: usize) -> bool {
        self.heights.remove(&row).is_some()
    }

    pub fn clear_all(&mut self) {
        self.heights.clear();
    }

    pub fn measured_count(&self) -> usize {
        self.heights.len()
    }

    /// Top edge of `row`.
    pub fn row_offset(&self, row: usize) -> f32 {
        let extra: f32 = self
            .heights
            .range(..row)
            .map(|(_, h)| h - self.min_height)
            .sum();
        row as f32 * self.min_height + extra
    }

    pub fn total_height(&self, rows: usize) -> f32 {
        self.row_offset(rows)
    }

    /// Row containing the vertical position `offset`, clamped to the last row.
    pub fn row_at_offset(&self, offset: f32, rows: usize) -> usize {
        if rows == 0 || offset <= 0.0 {
            return 0;
        }

        let last = rows - 1;
        let mut position = 0.0;
        let mut next_row = 0usize;

        for (&row, &height) in self.heights.range(..rows) {
            let gap = (row - next_row) as f32 * self.min_height;
            if offset < position + gap {
                let index = next_row + ((offset - position) / self.min_height) as usize;
                return index.min(last);
            }
            position += gap;

            if offset < position + height {
                return row;
            }
            position += height;
            next_row = row + 1;
        }

        let index = next_row + ((offset - position) / self.min_height) as usize;
        index.min(last)
    }
}
