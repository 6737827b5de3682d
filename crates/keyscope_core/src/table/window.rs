use std::ops::Range;

use super::height_cache::HeightCache;

/// Inclusive row range the table wants loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRange {
    pub start_index: usize,
    pub stop_index: usize,
}

impl LoadRange {
    pub fn new(start_index: usize, stop_index: usize) -> Self {
        Self {
            start_index,
            stop_index,
        }
    }

    pub fn count(&self) -> usize {
        self.stop_index
            .saturating_sub(self.start_index)
            .saturating_add(1)
    }
}

/// Scroll position and viewport of the row area.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWindow {
    viewport_height: f32,
    scroll_offset: f32,
    overscan: usize,
}

impl VirtualWindow {
    pub fn new(viewport_height: f32, overscan: usize) -> Self {
        Self {
            viewport_height: viewport_height.max(0.0),
            scroll_offset: 0.0,
            overscan,
        }
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
    }

    /// Moves to `offset`, clamped so the last row can reach the bottom edge.
    pub fn scroll_to(&mut self, offset: f32, content_height: f32) {
        let max_offset = (content_height - self.viewport_height).max(0.0);
        self.scroll_offset = offset.clamp(0.0, max_offset);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0.0;
    }

    /// Rows intersecting the viewport, widened by the overscan on both sides.
    pub fn visible_range(&self, rows: usize, cache: &HeightCache) -> Range<usize> {
        if rows == 0 || self.viewport_height <= 0.0 {
            return 0..0;
        }

        let first = cache.row_at_offset(self.scroll_offset, rows);
        let bottom = self.scroll_offset + self.viewport_height;
        let mut last = cache.row_at_offset(bottom, rows);
        if last > first && cache.row_offset(last) >= bottom {
            last -= 1;
        }

        let start = first.saturating_sub(self.overscan);
        let end = (last + 1 + self.overscan).min(rows);
        start..end
    }

    /// Rows past the loaded boundary that should be fetched for `visible`.
    ///
    /// A request fires once the visible window comes within `threshold` rows
    /// of the end of what is loaded, and always asks for at least `batch` rows.
    pub fn unloaded_range(
        &self,
        visible: &Range<usize>,
        loaded: usize,
        total: u64,
        threshold: usize,
        batch: usize,
    ) -> Option<LoadRange> {
        let total = usize::try_from(total).unwrap_or(usize::MAX);
        if loaded >= total {
            return None;
        }

        if visible.end + threshold < loaded {
            return None;
        }

        let wanted_end = (visible.end + threshold).max(loaded + batch.max(1));
        let stop = wanted_end.min(total) - 1;
        Some(LoadRange::new(loaded, stop))
    }
}
