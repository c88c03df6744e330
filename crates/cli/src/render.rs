// Grid layout shared by the full-screen viewer and `termgrid show`

use std::io::{self, Write};

use termgrid_engine::cell::Alignment;
use termgrid_engine::cell_ref::column_name;
use termgrid_engine::{CellRef, Sheet};

use crate::util;

/// Column widths and gutter for the sheet's current viewport.
pub(crate) struct GridLayout {
    /// Width of the row-number gutter, not counting its trailing space
    pub gutter: usize,
    /// (absolute column, display width) left to right
    pub columns: Vec<(u32, usize)>,
    pub first_row: u32,
    pub last_row: u32,
}

impl GridLayout {
    pub fn for_viewport(sheet: &Sheet) -> Self {
        let viewport = sheet.viewport();
        let columns = (viewport.left_col..=viewport.right_col())
            .map(|col| (col, column_width(sheet, col, viewport.top_row, viewport.bottom_row())))
            .collect();
        Self {
            gutter: gutter_width(viewport.bottom_row()),
            columns,
            first_row: viewport.top_row,
            last_row: viewport.bottom_row(),
        }
    }

    /// Total line width: gutter plus one separating space per column.
    pub fn line_width(&self) -> usize {
        self.gutter + 1 + self.columns.iter().map(|(_, w)| w + 1).sum::<usize>()
    }
}

pub(crate) fn gutter_width(last_row: u32) -> usize {
    last_row.to_string().len().max(3)
}

/// Widest display in the column over the given rows, clamped to the
/// per-cell width bounds. Columns with no cells use the sheet defaults.
pub(crate) fn column_width(sheet: &Sheet, col: u32, top: u32, bottom: u32) -> usize {
    let floor = (sheet.options().min_width as usize).max(util::display_width(&column_name(col)));
    (top..=bottom)
        .filter_map(|row| sheet.cell(CellRef::new(row, col)))
        .map(|cell| {
            let min = cell.min_width as usize;
            let max = (cell.max_width as usize).max(min);
            util::display_width(&cell.display).clamp(min, max)
        })
        .fold(floor, usize::max)
}

/// How many columns starting at the viewport's left edge fit in `available`
/// terminal columns. Always at least one.
pub(crate) fn columns_that_fit(sheet: &Sheet, rows: u32, available: usize) -> u32 {
    let viewport = sheet.viewport();
    let bottom = viewport.top_row.saturating_add(rows.max(1) - 1);
    let mut used = gutter_width(bottom) + 1;
    let mut count = 0u32;
    let mut col = viewport.left_col;
    loop {
        let w = column_width(sheet, col, viewport.top_row, bottom) + 1;
        if used + w > available && count > 0 {
            break;
        }
        used += w;
        count += 1;
        col += 1;
        if used >= available {
            break;
        }
    }
    count.max(1)
}

/// Text and alignment of one cell slot.
pub(crate) fn cell_text(sheet: &Sheet, at: CellRef) -> (&str, Alignment) {
    match sheet.cell(at) {
        Some(cell) => (cell.display.as_str(), cell.align),
        None => ("", Alignment::Left),
    }
}

/// Print the sheet's viewport as a plain text table (no TUI, no raw mode).
pub(crate) fn write_plain(sheet: &Sheet, out: &mut impl Write) -> io::Result<()> {
    let layout = GridLayout::for_viewport(sheet);

    // Header
    write!(out, "{:>width$} ", "", width = layout.gutter)?;
    for &(col, width) in &layout.columns {
        write!(out, "{} ", util::align(&column_name(col), width, Alignment::Center))?;
    }
    writeln!(out)?;

    write!(out, "{:->width$}-", "", width = layout.gutter)?;
    for &(_, width) in &layout.columns {
        write!(out, "{}-", "-".repeat(width))?;
    }
    writeln!(out)?;

    for row in layout.first_row..=layout.last_row {
        let mut line = format!("{:>width$} ", row, width = layout.gutter);
        for &(col, width) in &layout.columns {
            let (text, alignment) = cell_text(sheet, CellRef::new(row, col));
            line.push_str(&util::align(text, width, alignment));
            line.push(' ');
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}
