//! Undo/Redo history for sheet operations
//!
//! Entries carry deep clones of the cells they touched. Dependency edges in a
//! clone are not trusted on restore; the sheet re-wires restored cells into
//! the live graph.

use crate::cell::Cell;
use crate::cell_ref::CellRef;

/// Rectangle of cell clones, row-major. `None` marks a cell that did not exist.
pub type CellGrid = Vec<Vec<Option<Cell>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Edit,
    Format,
    DeleteRange,
    PasteRange,
    InsertRow,
    DeleteRow,
    InsertColumn,
    DeleteColumn,
}

#[derive(Clone, Debug)]
pub enum Snapshot {
    /// Single cell before/after
    Cell {
        before: Box<Cell>,
        after: Box<Cell>,
    },
    /// Rectangle anchored at `top_left`
    Grid {
        top_left: CellRef,
        before: CellGrid,
        after: CellGrid,
    },
    /// Row or column index plus the cells a delete removed
    Line { index: u32, removed: Vec<Cell> },
}

#[derive(Clone, Debug)]
pub struct Action {
    pub kind: ActionKind,
    pub snapshot: Snapshot,
}

impl Action {
    pub fn cell(kind: ActionKind, before: Cell, after: Cell) -> Self {
        Self {
            kind,
            snapshot: Snapshot::Cell {
                before: Box::new(before),
                after: Box::new(after),
            },
        }
    }

    pub fn grid(kind: ActionKind, top_left: CellRef, before: CellGrid, after: CellGrid) -> Self {
        Self {
            kind,
            snapshot: Snapshot::Grid { top_left, before, after },
        }
    }

    pub fn line(kind: ActionKind, index: u32, removed: Vec<Cell>) -> Self {
        Self {
            kind,
            snapshot: Snapshot::Line { index, removed },
        }
    }
}

#[derive(Clone, Debug)]
pub struct History {
    undo_stack: Vec<Action>,
    redo_stack: Vec<Action>,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a new action. Clears the redo stack.
    pub fn record(&mut self, action: Action) {
        self.undo_stack.push(action);
        self.redo_stack.clear();

        // Limit history size
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }

    /// Pop the last entry for undo; it moves to the redo stack
    pub fn undo(&mut self) -> Option<Action> {
        let action = self.undo_stack.pop()?;
        self.redo_stack.push(action.clone());
        Some(action)
    }

    /// Pop from the redo stack; it moves back to the undo stack
    pub fn redo(&mut self) -> Option<Action> {
        let action = self.redo_stack.pop()?;
        self.undo_stack.push(action.clone());
        Some(action)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
