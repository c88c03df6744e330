//! Visible window over a sheet.
//!
//! Absolute coordinates address cells; visual coordinates address screen
//! slots. Both are 1-based, visual row/column 0 being the header line.

use serde::{Deserialize, Serialize};

use crate::cell_ref::{CellRef, MAX_COLS, MAX_ROWS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub top_row: u32,
    pub left_col: u32,
    pub view_rows: u32,
    pub view_cols: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(20, 8)
    }
}

impl Viewport {
    pub fn new(view_rows: u32, view_cols: u32) -> Self {
        Self {
            top_row: 1,
            left_col: 1,
            view_rows: view_rows.max(1),
            view_cols: view_cols.max(1),
        }
    }

    /// Visual slot to absolute cell.
    pub fn to_absolute(&self, visual_row: u32, visual_col: u32) -> CellRef {
        CellRef::new(
            (self.top_row + visual_row).saturating_sub(1),
            (self.left_col + visual_col).saturating_sub(1),
        )
    }

    /// Absolute cell to visual slot, if the cell is on screen.
    pub fn to_relative(&self, at: CellRef) -> Option<(u32, u32)> {
        self.is_visible(at)
            .then(|| (at.row - self.top_row + 1, at.col - self.left_col + 1))
    }

    /// Half-open containment: `top <= row < top + rows`, same for columns.
    pub fn is_visible(&self, at: CellRef) -> bool {
        at.row >= self.top_row
            && u64::from(at.row) < u64::from(self.top_row) + u64::from(self.view_rows)
            && at.col >= self.left_col
            && u64::from(at.col) < u64::from(self.left_col) + u64::from(self.view_cols)
    }

    pub fn bottom_row(&self) -> u32 {
        (self.top_row + self.view_rows - 1).min(MAX_ROWS)
    }

    pub fn right_col(&self) -> u32 {
        (self.left_col + self.view_cols - 1).min(MAX_COLS)
    }

    pub fn resize(&mut self, view_rows: u32, view_cols: u32) {
        self.view_rows = view_rows.max(1);
        self.view_cols = view_cols.max(1);
    }

    /// Move the top-left corner, clamped to the sheet.
    pub fn scroll_to(&mut self, top_row: u32, left_col: u32) {
        self.top_row = top_row.clamp(1, MAX_ROWS);
        self.left_col = left_col.clamp(1, MAX_COLS);
    }

    /// Scroll the minimum amount needed to bring `at` on screen.
    pub fn ensure_visible(&mut self, at: CellRef) {
        if at.row < self.top_row {
            self.top_row = at.row.max(1);
        } else if at.row > self.bottom_row() {
            self.top_row = at.row - self.view_rows + 1;
        }
        if at.col < self.left_col {
            self.left_col = at.col.max(1);
        } else if at.col > self.right_col() {
            self.left_col = at.col - self.view_cols + 1;
        }
    }

    /// True if `at` lies within `distance` rows/columns of the visible window.
    pub fn within_retention(&self, at: CellRef, distance: u32) -> bool {
        let min_row = self.top_row.saturating_sub(distance);
        let max_row = self.bottom_row().saturating_add(distance);
        let min_col = self.left_col.saturating_sub(distance);
        let max_col = self.right_col().saturating_add(distance);
        (min_row..=max_row).contains(&at.row) && (min_col..=max_col).contains(&at.col)
    }
}
