//! Formula and dependency engine for the termgrid spreadsheet.

pub mod cell;
pub mod cell_ref;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod history;
pub mod recalc;
pub mod sheet;
pub mod validation;
pub mod viewport;
pub mod workbook;

pub use cell::Cell;
pub use cell_ref::CellRef;
pub use error::EngineError;
pub use sheet::{Sheet, SheetOptions};
pub use workbook::{SheetRecord, Workbook};
