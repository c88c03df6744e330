use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::cell_ref::CellRef;
use crate::error::EngineError;
use crate::formula::functions::FunctionRegistry;
use crate::recalc::RecalcReport;
use crate::sheet::{Sheet, SheetOptions};

/// Flat form of a sheet exchanged with file handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub name: String,
    /// Highest non-blank row
    pub rows: u32,
    /// Highest non-blank column
    pub cols: u32,
    pub cells: Vec<Cell>,
}

/// A workbook containing multiple sheets
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
    dirty: bool,
    current_file: Option<PathBuf>,
    options: SheetOptions,
    functions: Rc<FunctionRegistry>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new(SheetOptions::default())
    }
}

impl Workbook {
    /// Create a workbook with one empty sheet and the standard functions
    pub fn new(options: SheetOptions) -> Self {
        Self::with_functions(options, Rc::new(FunctionRegistry::standard()))
    }

    /// Create a workbook with one empty sheet and a caller-supplied registry
    pub fn with_functions(options: SheetOptions, functions: Rc<FunctionRegistry>) -> Self {
        let first = Sheet::with_options("Sheet1", Rc::clone(&functions), options.clone());
        Self {
            sheets: vec![first],
            active_sheet: 0,
            dirty: false,
            current_file: None,
            options,
            functions,
        }
    }

    /// Build sheets from flat records, then run the bulk recalculation
    /// across all of them. An empty record list yields one empty sheet.
    pub fn from_records(
        records: Vec<SheetRecord>,
        active: usize,
        options: SheetOptions,
        functions: Rc<FunctionRegistry>,
    ) -> Result<Self, EngineError> {
        let mut workbook = Self::with_functions(options, functions);
        if records.is_empty() {
            return Ok(workbook);
        }

        let mut sheets = Vec::with_capacity(records.len());
        for record in records {
            let mut sheet =
                Sheet::with_options(&record.name, Rc::clone(&workbook.functions), workbook.options.clone());
            for cell in record.cells {
                if !cell.at().is_valid() {
                    return Err(EngineError::Reference(format!(
                        "{}!R{}C{}",
                        record.name, cell.row, cell.col
                    )));
                }
                sheet.insert_cell(cell);
            }
            sheets.push(sheet);
        }
        if active >= sheets.len() {
            return Err(EngineError::NoSuchSheet(active));
        }

        workbook.sheets = sheets;
        workbook.active_sheet = active;
        let report = workbook.recalculate_all();
        info!("loaded {} sheets: {}", workbook.sheets.len(), report.summary());
        Ok(workbook)
    }

    /// Flatten every sheet for persistence. Blank cells are skipped.
    pub fn to_records(&self) -> Vec<SheetRecord> {
        self.sheets
            .iter()
            .map(|sheet| {
                let (rows, cols) = sheet.extent();
                let template = sheet.options().template();
                let cells = sheet
                    .sorted_refs()
                    .into_iter()
                    .filter_map(|at| sheet.cell(at))
                    .filter(|cell| !cell.is_blank(&template))
                    .cloned()
                    .collect();
                SheetRecord {
                    name: sheet.name.clone(),
                    rows,
                    cols,
                    cells,
                }
            })
            .collect()
    }

    /// Invalidate formulas on every sheet, then evaluate them all.
    pub fn recalculate_all(&mut self) -> RecalcReport {
        for sheet in &mut self.sheets {
            sheet.invalidate_formulas();
        }
        let mut report = RecalcReport::default();
        for sheet in &mut self.sheets {
            report.merge(sheet.evaluate_pending());
        }
        report
    }

    // =========================================================================
    // Sheet access
    // =========================================================================

    /// Get the number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Get the active sheet index
    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    /// Set the active sheet by index
    pub fn set_active_sheet(&mut self, index: usize) -> bool {
        if index < self.sheets.len() {
            self.active_sheet = index;
            true
        } else {
            false
        }
    }

    pub fn active_sheet(&self) -> &Sheet {
        &self.sheets[self.active_sheet]
    }

    pub fn active_sheet_mut(&mut self) -> &mut Sheet {
        &mut self.sheets[self.active_sheet]
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Index of the sheet called `name` (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        let key = name.trim().to_lowercase();
        self.sheets.iter().position(|s| s.name.to_lowercase() == key)
    }

    /// Add a new sheet with the next free "SheetN" name and return its index
    pub fn add_sheet(&mut self) -> usize {
        let mut n = self.sheets.len() + 1;
        let mut name = format!("Sheet{}", n);
        while self.sheet_index(&name).is_some() {
            n += 1;
            name = format!("Sheet{}", n);
        }
        self.push_sheet(&name)
    }

    /// Add a new sheet with a specific name
    /// Returns None if the name is empty or already taken
    pub fn add_sheet_named(&mut self, name: &str) -> Option<usize> {
        let name = name.trim();
        if name.is_empty() || self.sheet_index(name).is_some() {
            return None;
        }
        Some(self.push_sheet(name))
    }

    fn push_sheet(&mut self, name: &str) -> usize {
        let sheet = Sheet::with_options(name, Rc::clone(&self.functions), self.options.clone());
        self.sheets.push(sheet);
        self.dirty = true;
        self.sheets.len() - 1
    }

    /// Delete a sheet by index
    /// Returns false if it's the last sheet (can't delete)
    pub fn delete_sheet(&mut self, index: usize) -> bool {
        if self.sheets.len() <= 1 || index >= self.sheets.len() {
            return false;
        }

        self.sheets.remove(index);

        // Adjust active sheet if needed
        if self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.sheets.len() - 1;
        } else if self.active_sheet > index {
            self.active_sheet -= 1;
        }
        self.dirty = true;
        true
    }

    /// Rename a sheet by index
    /// Returns false if the index is invalid, the name is empty, or another
    /// sheet already uses it (case-insensitive)
    pub fn rename_sheet(&mut self, index: usize, new_name: &str) -> bool {
        let new_name = new_name.trim();
        if new_name.is_empty() || index >= self.sheets.len() {
            return false;
        }
        if self.sheet_index(new_name).is_some_and(|other| other != index) {
            return false;
        }
        self.sheets[index].name = new_name.to_string();
        self.dirty = true;
        true
    }

    // =========================================================================
    // Edits on the active sheet
    // =========================================================================

    pub fn commit_edit(&mut self, at: CellRef, input: &str) -> Result<(), EngineError> {
        self.active_sheet_mut().commit_edit(at, input)?;
        self.dirty = true;
        Ok(())
    }

    /// Commit an edit on any sheet by index
    pub fn commit_edit_on(&mut self, sheet: usize, at: CellRef, input: &str) -> Result<(), EngineError> {
        self.sheets
            .get_mut(sheet)
            .ok_or(EngineError::NoSuchSheet(sheet))?
            .commit_edit(at, input)?;
        self.dirty = true;
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.active_sheet_mut().undo();
        self.dirty |= undone;
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.active_sheet_mut().redo();
        self.dirty |= redone;
        redone
    }

    /// Run a recorded sheet operation (range or structural edit) on the
    /// active sheet, marking the workbook dirty when it succeeds.
    pub fn edit_active<T>(
        &mut self,
        edit: impl FnOnce(&mut Sheet) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let out = edit(self.active_sheet_mut())?;
        self.dirty = true;
        Ok(out)
    }

    // =========================================================================
    // File state
    // =========================================================================

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn set_current_file(&mut self, path: Option<PathBuf>) {
        self.current_file = path;
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn options(&self) -> &SheetOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(name: &str) -> CellRef {
        CellRef::parse(name).unwrap()
    }

    fn record(name: &str, cells: &[(&str, &str)]) -> SheetRecord {
        SheetRecord {
            name: name.to_string(),
            rows: 0,
            cols: 0,
            cells: cells
                .iter()
                .map(|(at, raw)| {
                    let mut c = Cell::new(cell(at));
                    c.raw_value = raw.to_string();
                    c.display = raw.to_string();
                    c
                })
                .collect(),
        }
    }

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::default();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.sheet_names(), vec!["Sheet1"]);
        assert!(!wb.is_dirty());
    }

    #[test]
    fn test_add_delete_rename() {
        let mut wb = Workbook::default();
        assert_eq!(wb.add_sheet(), 1);
        assert_eq!(wb.sheet_names(), vec!["Sheet1", "Sheet2"]);
        assert_eq!(wb.add_sheet_named("sheet2"), None);
        assert_eq!(wb.add_sheet_named("Data"), Some(2));

        assert!(wb.rename_sheet(1, "Inputs"));
        assert!(!wb.rename_sheet(1, "DATA"));
        assert!(!wb.rename_sheet(9, "Nope"));

        assert!(wb.set_active_sheet(2));
        assert!(wb.delete_sheet(0));
        assert_eq!(wb.active_sheet_index(), 1);
        assert!(wb.delete_sheet(1));
        assert!(!wb.delete_sheet(0));
        assert_eq!(wb.sheet_names(), vec!["Inputs"]);
    }

    #[test]
    fn test_edit_marks_dirty() {
        let mut wb = Workbook::default();
        wb.commit_edit(cell("A1"), "1").unwrap();
        assert!(wb.is_dirty());
        wb.mark_clean();
        assert!(wb.undo());
        assert!(wb.is_dirty());
        assert!(matches!(
            wb.commit_edit_on(5, cell("A1"), "1"),
            Err(EngineError::NoSuchSheet(5))
        ));
    }

    #[test]
    fn test_edit_active_marks_dirty_on_success() {
        let mut wb = Workbook::default();
        wb.commit_edit(cell("A2"), "7").unwrap();
        wb.mark_clean();

        assert!(wb.edit_active(|s| s.delete_row(0)).is_err());
        assert!(!wb.is_dirty());

        wb.edit_active(|s| s.insert_row(1)).unwrap();
        assert!(wb.is_dirty());
        assert_eq!(wb.active_sheet().display(cell("A3")), "7");
    }

    #[test]
    fn test_from_records_recalculates() {
        let records = vec![
            record("Inputs", &[("A1", "2"), ("A2", "$=A1 * 21"), ("A3", "$=A2 / 0")]),
            record("Other", &[("B2", "text")]),
        ];
        let wb = Workbook::from_records(
            records,
            1,
            SheetOptions::default(),
            Rc::new(FunctionRegistry::standard()),
        )
        .unwrap();
        assert_eq!(wb.active_sheet_index(), 1);
        let inputs = wb.sheet(0).unwrap();
        assert_eq!(inputs.display(cell("A2")), "42.00");
        assert_eq!(inputs.display(cell("A3")), "#DIV/0!");
        assert_eq!(inputs.cell(cell("A1")).unwrap().dependents, vec![cell("A2")]);
        assert!(!wb.is_dirty());
    }

    #[test]
    fn test_from_records_rejects_bad_input() {
        let functions = Rc::new(FunctionRegistry::standard());
        let mut bad = record("S", &[]);
        bad.cells.push(Cell::new(CellRef::new(0, 3)));
        assert!(matches!(
            Workbook::from_records(vec![bad], 0, SheetOptions::default(), Rc::clone(&functions)),
            Err(EngineError::Reference(_))
        ));
        assert!(matches!(
            Workbook::from_records(vec![record("S", &[])], 3, SheetOptions::default(), functions),
            Err(EngineError::NoSuchSheet(3))
        ));
    }

    #[test]
    fn test_to_records_round_trip() {
        let mut wb = Workbook::default();
        wb.commit_edit(cell("A1"), "5").unwrap();
        wb.commit_edit(cell("C4"), "$=A1 + B9").unwrap();
        let records = wb.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].rows, records[0].cols), (4, 3));
        // B9 only exists as a blank referenced cell
        assert_eq!(records[0].cells.len(), 2);

        let loaded = Workbook::from_records(
            records,
            0,
            SheetOptions::default(),
            Rc::new(FunctionRegistry::standard()),
        )
        .unwrap();
        assert_eq!(loaded.active_sheet().display(cell("C4")), "5.00");
        assert_eq!(loaded.active_sheet().raw_value(cell("C4")), "$=A1 + B9");
    }
}
