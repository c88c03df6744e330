//! Sparse cell store for one sheet.
//!
//! Cells are created on first address and evicted once they are blank,
//! unreferenced and far from the viewport. Every raw-value write goes through
//! `commit_edit` (or the range and structural operations below), which
//! records the action and walks the written cell's dependents.

use std::collections::BTreeSet;
use std::rc::Rc;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellFlags, CellType, DateTimeFormat, NumberFormat, DEFAULT_MAX_WIDTH, DEFAULT_MIN_WIDTH};
use crate::cell_ref::CellRef;
use crate::error::EngineError;
use crate::formula::functions::FunctionRegistry;
use crate::formula::tokenizer::{formula_references, MAX_RANGE_CELLS};
use crate::history::{Action, ActionKind, CellGrid, History, Snapshot};
use crate::validation;
use crate::viewport::Viewport;

/// Per-sheet tuning and defaults for newly created cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetOptions {
    /// Undo entries kept before the oldest is dropped
    pub history_limit: usize,
    /// Rows/columns around the viewport in which blank cells are kept
    pub retention_distance: u32,
    pub view_rows: u32,
    pub view_cols: u32,
    pub number_format: NumberFormat,
    pub date_time_format: DateTimeFormat,
    pub min_width: u16,
    pub max_width: u16,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            history_limit: 100,
            retention_distance: 100,
            view_rows: 20,
            view_cols: 8,
            number_format: NumberFormat::default(),
            date_time_format: DateTimeFormat::default(),
            min_width: DEFAULT_MIN_WIDTH,
            max_width: DEFAULT_MAX_WIDTH,
        }
    }
}

impl SheetOptions {
    /// Blank cell carrying these defaults. Coordinates are filled in by callers.
    pub fn template(&self) -> Cell {
        Cell {
            kind: CellType::String,
            number_format: self.number_format,
            date_time_format: self.date_time_format,
            min_width: self.min_width,
            max_width: self.max_width,
            ..Cell::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    Row,
    Column,
}

impl Axis {
    fn coord(self, at: CellRef) -> u32 {
        match self {
            Axis::Row => at.row,
            Axis::Column => at.col,
        }
    }

    fn delta(self, by: i64) -> (i64, i64) {
        match self {
            Axis::Row => (by, 0),
            Axis::Column => (0, by),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub(crate) cells: FxHashMap<CellRef, Cell>,
    pub(crate) viewport: Viewport,
    history: History,
    pub(crate) options: SheetOptions,
    pub(crate) template: Cell,
    pub(crate) functions: Rc<FunctionRegistry>,
    /// Visible cells whose display changed since the renderer last drained them
    pub(crate) visible_updates: BTreeSet<CellRef>,
}

impl Sheet {
    pub fn new(name: &str, functions: Rc<FunctionRegistry>) -> Self {
        Self::with_options(name, functions, SheetOptions::default())
    }

    pub fn with_options(name: &str, functions: Rc<FunctionRegistry>, options: SheetOptions) -> Self {
        Self {
            name: name.to_string(),
            cells: FxHashMap::default(),
            viewport: Viewport::new(options.view_rows, options.view_cols),
            history: History::new(options.history_limit),
            template: options.template(),
            options,
            functions,
            visible_updates: BTreeSet::new(),
        }
    }

    // =========================================================================
    // Cell store
    // =========================================================================

    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.cells.get(&at)
    }

    pub(crate) fn cell_mut(&mut self, at: CellRef) -> Option<&mut Cell> {
        self.cells.get_mut(&at)
    }

    /// The cell at `at`, created from the sheet defaults if absent.
    pub fn get_or_create(&mut self, at: CellRef) -> &mut Cell {
        let template = &self.template;
        self.cells
            .entry(at)
            .or_insert_with(|| Cell::from_template(at, template))
    }

    /// Place a loaded cell without touching the graph. Edges are rebuilt by
    /// the next full recalculation.
    pub(crate) fn insert_cell(&mut self, mut cell: Cell) {
        cell.depends_on.clear();
        cell.dependents.clear();
        cell.mark_stale();
        self.cells.insert(cell.at(), cell);
    }

    /// Rendered text of a cell; missing cells render blank.
    pub fn display(&self, at: CellRef) -> &str {
        self.cells.get(&at).map_or("", |c| c.display.as_str())
    }

    /// Raw text of a cell as typed, formula marker included.
    pub fn raw_value(&self, at: CellRef) -> &str {
        self.cells.get(&at).map_or("", |c| c.raw_value.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Every stored key in row-major order.
    pub fn sorted_refs(&self) -> Vec<CellRef> {
        let mut refs: Vec<CellRef> = self.cells.keys().copied().collect();
        refs.sort_unstable();
        refs
    }

    /// Highest row and column holding a non-blank cell.
    pub fn extent(&self) -> (u32, u32) {
        self.cells
            .values()
            .filter(|c| !c.is_blank(&self.template))
            .fold((0, 0), |(rows, cols), c| (rows.max(c.row), cols.max(c.col)))
    }

    pub fn options(&self) -> &SheetOptions {
        &self.options
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    // =========================================================================
    // Viewport
    // =========================================================================

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Drain the visible cells whose display changed, in row-major order.
    pub fn take_visible_updates(&mut self) -> Vec<CellRef> {
        std::mem::take(&mut self.visible_updates).into_iter().collect()
    }

    /// Drop blank, unreferenced cells outside the retention window.
    /// Returns how many were removed.
    pub fn evict_distant(&mut self) -> usize {
        let distance = self.options.retention_distance;
        let viewport = self.viewport;
        let template = &self.template;
        let before = self.cells.len();
        self.cells.retain(|at, cell| {
            viewport.within_retention(*at, distance)
                || !cell.is_blank(template)
                || !cell.dependents.is_empty()
                || !cell.depends_on.is_empty()
        });
        let evicted = before - self.cells.len();
        if evicted > 0 {
            debug!("{}: evicted {} distant blank cells", self.name, evicted);
        }
        evicted
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Write `input` into a cell as the user typed it.
    ///
    /// Plain values are checked against the cell's validation rule and
    /// rendered for its type; formulas are checked for unresolvable
    /// references and cycles. Any rejection leaves the sheet untouched.
    /// On success the action is recorded and dependents are recalculated.
    pub fn commit_edit(&mut self, at: CellRef, input: &str) -> Result<(), EngineError> {
        if !at.is_valid() {
            return Err(EngineError::Reference(at.to_string()));
        }
        let before = self
            .cells
            .get(&at)
            .cloned()
            .unwrap_or_else(|| Cell::from_template(at, &self.template));
        let mut after = before.clone();
        after.raw_value = input.trim().to_string();

        if let Some(body) = after.formula_body() {
            let refs = formula_references(body)?;
            if let Some(path) = self.find_cycle(at, &refs) {
                let path: Vec<String> = path.iter().map(CellRef::to_string).collect();
                warn!("{}: rejected formula for {}: cycle {}", self.name, at, path.join(" -> "));
                return Err(EngineError::Cycle { cell: at });
            }
            after.display.clear();
        } else {
            validation::check_value(&before, input, &self.functions)
                .map_err(|message| EngineError::Validation { cell: at, message })?;
            // A formula result retyped the cell; a plain value starts over
            if before.is_formula() && before.kind == CellType::DateTime {
                after.kind = self.template.kind;
            }
            after.apply_plain_value(input)?;
        }

        self.replace_cell(after);
        let after = self
            .cells
            .get(&at)
            .cloned()
            .unwrap_or_else(|| Cell::from_template(at, &self.template));
        self.history.record(Action::cell(ActionKind::Edit, before, after));
        Ok(())
    }

    /// Change a cell's formatting through `apply`, re-render it and record
    /// the change. Raw values are not touched.
    pub fn commit_format<F>(&mut self, at: CellRef, apply: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Cell),
    {
        if !at.is_valid() {
            return Err(EngineError::Reference(at.to_string()));
        }
        let before = self.get_or_create(at).clone();
        let mut after = before.clone();
        apply(&mut after);
        after.row = at.row;
        after.col = at.col;
        after.raw_value = before.raw_value.clone();
        after.set_flag(CellFlags::EVALUATED, false);
        after.rerender();

        self.replace_cell(after);
        let after = self.get_or_create(at).clone();
        self.history.record(Action::cell(ActionKind::Format, before, after));
        Ok(())
    }

    /// Clear the values in the rectangle spanned by `a` and `b`, keeping
    /// formatting. Recorded as one action.
    pub fn delete_range(&mut self, a: CellRef, b: CellRef) -> Result<(), EngineError> {
        let (top_left, bottom_right) = normalize_rect(a, b)?;
        let before = self.capture_grid(top_left, bottom_right);

        let mut cleared = Vec::new();
        for row in top_left.row..=bottom_right.row {
            for col in top_left.col..=bottom_right.col {
                let at = CellRef::new(row, col);
                let Some(cell) = self.cells.get(&at) else {
                    continue;
                };
                let mut blank = cell.clone();
                blank.raw_value.clear();
                blank.display.clear();
                self.place_cell(blank);
                cleared.push(at);
            }
        }
        for at in cleared {
            self.recalculate_cell(at);
        }

        let after = self.capture_grid(top_left, bottom_right);
        self.history
            .record(Action::grid(ActionKind::DeleteRange, top_left, before, after));
        Ok(())
    }

    /// Write a rectangle of cell clones with its top-left corner at
    /// `top_left`. `None` entries leave the target alone. Recorded as one
    /// action.
    pub fn paste_range(&mut self, top_left: CellRef, grid: &CellGrid) -> Result<(), EngineError> {
        let height = grid.len();
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        if height == 0 || width == 0 {
            return Ok(());
        }
        let bottom_right = top_left
            .offset(height as i64 - 1, width as i64 - 1)
            .ok_or_else(|| EngineError::Reference(format!("paste at {} leaves the sheet", top_left)))?;
        let (top_left, bottom_right) = normalize_rect(top_left, bottom_right)?;

        let before = self.capture_grid(top_left, bottom_right);
        let mut placed = Vec::new();
        for (r, line) in grid.iter().enumerate() {
            for (c, slot) in line.iter().enumerate() {
                let (Some(source), Some(at)) = (slot, top_left.offset(r as i64, c as i64)) else {
                    continue;
                };
                let mut cell = source.clone();
                cell.row = at.row;
                cell.col = at.col;
                self.place_cell(cell);
                placed.push(at);
            }
        }
        // Every cell is in place before any of them is evaluated
        for at in placed {
            self.recalculate_cell(at);
        }

        let after = self.capture_grid(top_left, bottom_right);
        self.history
            .record(Action::grid(ActionKind::PasteRange, top_left, before, after));
        Ok(())
    }

    /// Clones of the rectangle, `None` for cells that do not exist.
    pub fn capture_grid(&self, top_left: CellRef, bottom_right: CellRef) -> CellGrid {
        (top_left.row..=bottom_right.row)
            .map(|row| {
                (top_left.col..=bottom_right.col)
                    .map(|col| self.cells.get(&CellRef::new(row, col)).cloned())
                    .collect()
            })
            .collect()
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    pub fn insert_row(&mut self, index: u32) -> Result<(), EngineError> {
        self.insert_line(Axis::Row, index)?;
        self.history.record(Action::line(ActionKind::InsertRow, index, Vec::new()));
        Ok(())
    }

    pub fn delete_row(&mut self, index: u32) -> Result<(), EngineError> {
        let removed = self.delete_line(Axis::Row, index)?;
        self.history.record(Action::line(ActionKind::DeleteRow, index, removed));
        Ok(())
    }

    pub fn insert_column(&mut self, index: u32) -> Result<(), EngineError> {
        self.insert_line(Axis::Column, index)?;
        self.history
            .record(Action::line(ActionKind::InsertColumn, index, Vec::new()));
        Ok(())
    }

    pub fn delete_column(&mut self, index: u32) -> Result<(), EngineError> {
        let removed = self.delete_line(Axis::Column, index)?;
        self.history
            .record(Action::line(ActionKind::DeleteColumn, index, removed));
        Ok(())
    }

    /// Shift everything at or past `index` one step further along `axis`.
    fn insert_line(&mut self, axis: Axis, index: u32) -> Result<(), EngineError> {
        check_line(axis, index)?;
        self.shift_from(axis, index, 1);
        self.rebuild_graph();
        Ok(())
    }

    /// Remove the line at `index` and close the gap. Returns the removed cells.
    fn delete_line(&mut self, axis: Axis, index: u32) -> Result<Vec<Cell>, EngineError> {
        check_line(axis, index)?;
        let mut keys: Vec<CellRef> = self
            .cells
            .keys()
            .filter(|at| axis.coord(**at) == index)
            .copied()
            .collect();
        keys.sort_unstable();
        let removed: Vec<Cell> = keys.iter().filter_map(|at| self.cells.remove(at)).collect();

        self.shift_from(axis, index + 1, -1);
        self.rebuild_graph();
        Ok(removed)
    }

    fn shift_from(&mut self, axis: Axis, from: u32, by: i64) {
        let keys: Vec<CellRef> = self
            .cells
            .keys()
            .filter(|at| axis.coord(**at) >= from)
            .copied()
            .collect();
        let moving: Vec<Cell> = keys.iter().filter_map(|at| self.cells.remove(at)).collect();

        let (d_row, d_col) = axis.delta(by);
        for mut cell in moving {
            let Some(target) = cell.at().offset(d_row, d_col) else {
                warn!("{}: {} shifted off the sheet", self.name, cell.at());
                continue;
            };
            cell.row = target.row;
            cell.col = target.col;
            self.cells.insert(target, cell);
        }
    }

    /// Drop every edge and rebuild them from formula text.
    fn rebuild_graph(&mut self) {
        self.clear_all_edges();
        self.recalculate_all();
    }

    // =========================================================================
    // Snapshot restore
    // =========================================================================

    /// Put `cell` in its slot, unhooked from whatever the old occupant read.
    /// The live slot's dependents carry over; the cell is left unevaluated.
    fn place_cell(&mut self, mut cell: Cell) {
        let at = cell.at();
        self.detach_edges(at);
        cell.depends_on.clear();
        cell.dependents = self
            .cells
            .get(&at)
            .map(|live| live.dependents.clone())
            .unwrap_or_default();
        cell.mark_stale();
        self.cells.insert(at, cell);
    }

    /// Place `cell` and bring it and its dependents up to date.
    pub(crate) fn replace_cell(&mut self, cell: Cell) {
        let at = cell.at();
        self.place_cell(cell);
        self.recalculate_cell(at);
    }

    fn restore_grid(&mut self, top_left: CellRef, grid: &CellGrid) {
        let mut placed = Vec::new();
        for (r, line) in grid.iter().enumerate() {
            for (c, slot) in line.iter().enumerate() {
                let Some(at) = top_left.offset(r as i64, c as i64) else {
                    continue;
                };
                let cell = match slot {
                    Some(cell) => {
                        let mut cell = cell.clone();
                        cell.row = at.row;
                        cell.col = at.col;
                        cell
                    }
                    None if self.cells.contains_key(&at) => Cell::from_template(at, &self.template),
                    None => continue,
                };
                self.place_cell(cell);
                placed.push(at);
            }
        }
        for at in placed {
            self.recalculate_cell(at);
        }
    }

    fn restore_line(&mut self, axis: Axis, index: u32, removed: &[Cell]) {
        self.shift_from(axis, index, 1);
        for cell in removed {
            let mut cell = cell.clone();
            cell.depends_on.clear();
            cell.dependents.clear();
            cell.mark_stale();
            self.cells.insert(cell.at(), cell);
        }
        self.rebuild_graph();
    }

    // =========================================================================
    // Undo / Redo
    // =========================================================================

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Revert the most recent action. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        let Some(action) = self.history.undo() else {
            return false;
        };
        debug!("{}: undo {:?}", self.name, action.kind);
        match (action.kind, action.snapshot) {
            (_, Snapshot::Cell { before, .. }) => self.replace_cell(*before),
            (_, Snapshot::Grid { top_left, before, .. }) => self.restore_grid(top_left, &before),
            (ActionKind::InsertRow, Snapshot::Line { index, .. }) => {
                self.delete_line_unrecorded(Axis::Row, index)
            }
            (ActionKind::InsertColumn, Snapshot::Line { index, .. }) => {
                self.delete_line_unrecorded(Axis::Column, index)
            }
            (ActionKind::DeleteColumn, Snapshot::Line { index, removed }) => {
                self.restore_line(Axis::Column, index, &removed)
            }
            (_, Snapshot::Line { index, removed }) => self.restore_line(Axis::Row, index, &removed),
        }
        true
    }

    /// Re-apply the most recently undone action. Returns false if there was none.
    pub fn redo(&mut self) -> bool {
        let Some(action) = self.history.redo() else {
            return false;
        };
        debug!("{}: redo {:?}", self.name, action.kind);
        match (action.kind, action.snapshot) {
            (_, Snapshot::Cell { after, .. }) => self.replace_cell(*after),
            (_, Snapshot::Grid { top_left, after, .. }) => self.restore_grid(top_left, &after),
            (ActionKind::InsertRow, Snapshot::Line { index, .. }) => {
                self.insert_line_unrecorded(Axis::Row, index)
            }
            (ActionKind::InsertColumn, Snapshot::Line { index, .. }) => {
                self.insert_line_unrecorded(Axis::Column, index)
            }
            (ActionKind::DeleteColumn, Snapshot::Line { index, .. }) => {
                self.delete_line_unrecorded(Axis::Column, index)
            }
            (_, Snapshot::Line { index, .. }) => self.delete_line_unrecorded(Axis::Row, index),
        }
        true
    }

    fn insert_line_unrecorded(&mut self, axis: Axis, index: u32) {
        if let Err(err) = self.insert_line(axis, index) {
            warn!("{}: {}", self.name, err);
        }
    }

    fn delete_line_unrecorded(&mut self, axis: Axis, index: u32) {
        if let Err(err) = self.delete_line(axis, index) {
            warn!("{}: {}", self.name, err);
        }
    }
}

fn check_line(axis: Axis, index: u32) -> Result<(), EngineError> {
    let probe = match axis {
        Axis::Row => CellRef::new(index, 1),
        Axis::Column => CellRef::new(1, index),
    };
    if probe.is_valid() {
        Ok(())
    } else {
        Err(EngineError::Reference(format!("{:?} {} is outside the sheet", axis, index)))
    }
}

/// Order the corners of a rectangle and bound its size.
fn normalize_rect(a: CellRef, b: CellRef) -> Result<(CellRef, CellRef), EngineError> {
    if !a.is_valid() || !b.is_valid() {
        return Err(EngineError::Reference(format!("{}:{}", a, b)));
    }
    let top_left = CellRef::new(a.row.min(b.row), a.col.min(b.col));
    let bottom_right = CellRef::new(a.row.max(b.row), a.col.max(b.col));
    let count = u64::from(bottom_right.row - top_left.row + 1) * u64::from(bottom_right.col - top_left.col + 1);
    if count > MAX_RANGE_CELLS {
        return Err(EngineError::RangeSyntax(format!(
            "{}:{} covers {} cells",
            top_left, bottom_right, count
        )));
    }
    Ok((top_left, bottom_right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(name: &str) -> CellRef {
        CellRef::parse(name).unwrap()
    }

    fn sheet() -> Sheet {
        Sheet::new("Sheet1", Rc::new(FunctionRegistry::standard()))
    }

    fn set(s: &mut Sheet, name: &str, input: &str) {
        s.commit_edit(cell(name), input).unwrap();
    }

    fn show<'a>(s: &'a Sheet, name: &str) -> &'a str {
        s.display(cell(name))
    }

    #[test]
    fn test_plain_and_formula_edit() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "A2", "2");
        set(&mut s, "A3", "3");
        set(&mut s, "B1", "$=SUM(A1:A3)");
        set(&mut s, "B2", "$=SUM(A3:A1)");
        assert_eq!(show(&s, "B1"), "6.00");
        assert_eq!(show(&s, "B2"), "6.00");
        assert!(s.cell(cell("B1")).unwrap().is_evaluated());
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_edit_propagates_to_dependents() {
        let mut s = sheet();
        set(&mut s, "A1", "2");
        set(&mut s, "B1", "$=A1 * 10");
        set(&mut s, "C1", "$=B1 + 1");
        assert_eq!(show(&s, "C1"), "21.00");

        set(&mut s, "A1", "3");
        assert_eq!(show(&s, "B1"), "30.00");
        assert_eq!(show(&s, "C1"), "31.00");
    }

    #[test]
    fn test_self_cycle_rejected_with_prior_state() {
        let mut s = sheet();
        set(&mut s, "A1", "5");
        let err = s.commit_edit(cell("A1"), "$=A1+1").unwrap_err();
        assert_eq!(err, EngineError::Cycle { cell: cell("A1") });
        assert_eq!(show(&s, "A1"), "5");
        assert_eq!(s.raw_value(cell("A1")), "5");
        assert!(s.cell(cell("A1")).unwrap().depends_on.is_empty());
        assert_eq!(s.history().undo_len(), 1);
    }

    #[test]
    fn test_two_cell_cycle_rejected() {
        let mut s = sheet();
        set(&mut s, "A1", "$=B1");
        let depends_before = s.cell(cell("A1")).unwrap().depends_on.clone();
        let display_before = show(&s, "A1").to_string();

        assert!(matches!(
            s.commit_edit(cell("B1"), "$=A1"),
            Err(EngineError::Cycle { .. })
        ));
        assert_eq!(s.cell(cell("A1")).unwrap().depends_on, depends_before);
        assert_eq!(show(&s, "A1"), display_before);
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_divide_by_zero_cascades() {
        let mut s = sheet();
        set(&mut s, "A1", "$=10/0");
        set(&mut s, "B1", "$=A1*2");
        assert_eq!(show(&s, "A1"), "#DIV/0!");
        assert!(s.cell(cell("A1")).unwrap().is_evaluated());
        assert_eq!(show(&s, "B1"), "#VALUE!");
    }

    #[test]
    fn test_bad_reference_aborts() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        assert!(matches!(
            s.commit_edit(cell("A1"), "$=A0 + 1"),
            Err(EngineError::Reference(_))
        ));
        assert_eq!(show(&s, "A1"), "1");
    }

    #[test]
    fn test_typed_number_cell() {
        let mut s = sheet();
        s.get_or_create(cell("A1")).kind = CellType::Financial;
        set(&mut s, "A1", "-1234.5");
        assert_eq!(show(&s, "A1"), "-$1,234.50");
        assert!(matches!(
            s.commit_edit(cell("A1"), "abc"),
            Err(EngineError::Value(_))
        ));
    }

    #[test]
    fn test_validation_rejects() {
        let mut s = sheet();
        {
            let c = s.get_or_create(cell("A1"));
            c.valrule = Some("THIS > 0".into());
            c.valrulemsg = Some("must be positive".into());
        }
        set(&mut s, "A1", "4");
        let err = s.commit_edit(cell("A1"), "-1").unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation { cell: cell("A1"), message: "must be positive".into() }
        );
        assert_eq!(show(&s, "A1"), "4");
    }

    #[test]
    fn test_undo_redo_edit() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "B1", "$=A1 + 1");
        set(&mut s, "A1", "10");
        assert_eq!(show(&s, "B1"), "11.00");

        assert!(s.undo());
        assert_eq!(show(&s, "A1"), "1");
        assert_eq!(s.raw_value(cell("A1")), "1");
        assert_eq!(show(&s, "B1"), "2.00");

        assert!(s.redo());
        assert_eq!(show(&s, "A1"), "10");
        assert_eq!(show(&s, "B1"), "11.00");
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_undo_formula_restores_edges() {
        let mut s = sheet();
        set(&mut s, "C1", "$=A1");
        set(&mut s, "C1", "$=B1");
        assert!(s.cell(cell("A1")).unwrap().dependents.is_empty());

        s.undo();
        assert_eq!(s.cell(cell("C1")).unwrap().depends_on, vec![cell("A1")]);
        assert_eq!(s.cell(cell("A1")).unwrap().dependents, vec![cell("C1")]);
        assert!(s.cell(cell("B1")).unwrap().dependents.is_empty());
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_nothing_to_undo() {
        let mut s = sheet();
        assert!(!s.undo());
        assert!(!s.redo());
    }

    #[test]
    fn test_commit_format() {
        let mut s = sheet();
        set(&mut s, "A1", "$=1/3");
        s.commit_format(cell("A1"), |c| {
            c.number_format.decimal_points = 4;
            c.flags.insert(CellFlags::BOLD);
        })
        .unwrap();
        assert_eq!(show(&s, "A1"), "0.3333");
        assert!(s.cell(cell("A1")).unwrap().is_bold());

        s.undo();
        assert_eq!(show(&s, "A1"), "0.33");
        assert!(!s.cell(cell("A1")).unwrap().is_bold());
    }

    #[test]
    fn test_delete_range_and_undo() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "A2", "2");
        set(&mut s, "B1", "$=SUM(A1:A2)");
        s.delete_range(cell("A1"), cell("A2")).unwrap();
        assert_eq!(show(&s, "A1"), "");
        assert_eq!(show(&s, "B1"), "0.00");

        s.undo();
        assert_eq!(show(&s, "A2"), "2");
        assert_eq!(show(&s, "B1"), "3.00");
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_paste_range() {
        let mut s = sheet();
        set(&mut s, "A1", "4");
        let mut source = Cell::new(cell("A1"));
        source.raw_value = "$=A1 * 2".into();
        let mut plain = Cell::new(cell("A1"));
        plain.raw_value = "x".into();
        plain.display = "x".into();

        s.paste_range(cell("C3"), &vec![vec![Some(source), Some(plain)]]).unwrap();
        assert_eq!(show(&s, "C3"), "8.00");
        assert_eq!(show(&s, "D3"), "x");
        assert_eq!(s.cell(cell("A1")).unwrap().dependents, vec![cell("C3")]);
        s.check_graph_consistency().unwrap();

        s.undo();
        assert_eq!(show(&s, "C3"), "");
        assert!(s.cell(cell("A1")).unwrap().dependents.is_empty());
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_delete_row_keeps_formula_text_and_undo_restores_edges() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "A2", "2");
        set(&mut s, "A3", "$=A1 + A2");
        let depends_before = s.cell(cell("A3")).unwrap().depends_on.clone();

        s.delete_row(2).unwrap();
        assert_eq!(s.raw_value(cell("A2")), "$=A1 + A2");
        s.check_graph_consistency().unwrap();

        s.undo();
        assert_eq!(show(&s, "A2"), "2");
        assert_eq!(show(&s, "A3"), "3.00");
        assert_eq!(s.cell(cell("A3")).unwrap().depends_on, depends_before);
        let mut a1_dependents = s.cell(cell("A1")).unwrap().dependents.clone();
        a1_dependents.sort();
        assert_eq!(a1_dependents, vec![cell("A3")]);
        assert_eq!(s.cell(cell("A2")).unwrap().dependents, vec![cell("A3")]);
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_insert_column_and_undo() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "B1", "2");
        s.insert_column(1).unwrap();
        assert_eq!(show(&s, "B1"), "1");
        assert_eq!(show(&s, "C1"), "2");
        s.undo();
        assert_eq!(show(&s, "A1"), "1");
        assert_eq!(show(&s, "B1"), "2");
        s.redo();
        assert_eq!(show(&s, "A1"), "");
        assert_eq!(show(&s, "B1"), "1");
    }

    #[test]
    fn test_undo_restores_cell_type() {
        let mut s = sheet();
        set(&mut s, "A1", "$=\"2024-03-05\"");
        assert_eq!(s.cell(cell("A1")).unwrap().kind, CellType::DateTime);

        set(&mut s, "A1", "plain");
        assert_eq!(s.cell(cell("A1")).unwrap().kind, CellType::String);

        assert!(s.undo());
        assert_eq!(s.raw_value(cell("A1")), "$=\"2024-03-05\"");
        assert_eq!(show(&s, "A1"), "2024-03-05");
        assert_eq!(s.cell(cell("A1")).unwrap().kind, CellType::DateTime);

        assert!(s.redo());
        assert_eq!(show(&s, "A1"), "plain");
        assert_eq!(s.cell(cell("A1")).unwrap().kind, CellType::String);
    }

    #[test]
    fn test_insert_row_undo_redo_restores_edges() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "A2", "2");
        set(&mut s, "A3", "$=A1 + A2");

        s.insert_row(2).unwrap();
        // Formula text is not rewritten, so A4 now reads the blank A2
        assert_eq!(s.raw_value(cell("A4")), "$=A1 + A2");
        assert_eq!(show(&s, "A3"), "2");
        assert_eq!(show(&s, "A4"), "1.00");
        s.check_graph_consistency().unwrap();

        assert!(s.undo());
        assert_eq!(show(&s, "A2"), "2");
        assert_eq!(show(&s, "A3"), "3.00");
        assert_eq!(s.cell(cell("A3")).unwrap().depends_on, vec![cell("A1"), cell("A2")]);
        assert_eq!(s.cell(cell("A2")).unwrap().dependents, vec![cell("A3")]);
        assert!(s.cell(cell("A4")).map_or(true, |c| c.depends_on.is_empty()));
        s.check_graph_consistency().unwrap();

        assert!(s.redo());
        assert_eq!(s.raw_value(cell("A4")), "$=A1 + A2");
        assert_eq!(show(&s, "A4"), "1.00");
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_delete_column_undo_redo_restores_edges() {
        let mut s = sheet();
        set(&mut s, "A1", "4");
        set(&mut s, "B1", "5");
        set(&mut s, "C1", "$=A1 * B1");

        s.delete_column(2).unwrap();
        assert_eq!(s.raw_value(cell("B1")), "$=A1 * B1");
        assert_eq!(show(&s, "B1"), "#CIRC!");
        assert!(s.cell(cell("C1")).is_none());
        s.check_graph_consistency().unwrap();

        assert!(s.undo());
        assert_eq!(show(&s, "B1"), "5");
        assert_eq!(show(&s, "C1"), "20.00");
        assert_eq!(s.cell(cell("C1")).unwrap().depends_on, vec![cell("A1"), cell("B1")]);
        assert_eq!(s.cell(cell("B1")).unwrap().dependents, vec![cell("C1")]);
        s.check_graph_consistency().unwrap();

        assert!(s.redo());
        assert_eq!(show(&s, "B1"), "#CIRC!");
        s.check_graph_consistency().unwrap();
    }

    #[test]
    fn test_structural_edit_rejects_header_axis() {
        let mut s = sheet();
        assert!(matches!(s.insert_row(0), Err(EngineError::Reference(_))));
    }

    #[test]
    fn test_evict_distant_keeps_referenced_cells() {
        let mut s = sheet();
        set(&mut s, "A1", "$=A500 + 1");
        s.get_or_create(cell("B900"));
        s.get_or_create(cell("C2"));
        assert!(s.cell(cell("A500")).is_some());

        let evicted = s.evict_distant();
        assert_eq!(evicted, 1);
        assert!(s.cell(cell("B900")).is_none());
        // Referenced by A1
        assert!(s.cell(cell("A500")).is_some());
        // Inside the retention window
        assert!(s.cell(cell("C2")).is_some());
    }

    #[test]
    fn test_visible_updates() {
        let mut s = sheet();
        set(&mut s, "A1", "1");
        set(&mut s, "B1", "$=A1");
        set(&mut s, "Z999", "far away");
        let updates = s.take_visible_updates();
        assert_eq!(updates, vec![cell("A1"), cell("B1")]);
        assert!(s.take_visible_updates().is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut s = sheet();
        set(&mut s, "A1", "original");
        let mut copy = s.cell(cell("A1")).unwrap().clone();
        copy.raw_value = "changed".into();
        assert_eq!(s.raw_value(cell("A1")), "original");
    }

    #[test]
    fn test_history_limit() {
        let options = SheetOptions { history_limit: 2, ..SheetOptions::default() };
        let mut s = Sheet::with_options("S", Rc::new(FunctionRegistry::standard()), options);
        for v in ["1", "2", "3"] {
            set(&mut s, "A1", v);
        }
        assert!(s.undo());
        assert!(s.undo());
        assert!(!s.undo());
        assert_eq!(show(&s, "A1"), "1");
    }
}
