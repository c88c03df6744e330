// Native .tgrid format: one JSON document per workbook

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use termgrid_engine::formula::functions::FunctionRegistry;
use termgrid_engine::workbook::{SheetRecord, Workbook};
use termgrid_engine::{EngineError, SheetOptions};

use crate::NATIVE_FORMAT_VERSION;

#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed workbook: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported format version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("could not replace file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("invalid workbook contents: {0}")]
    Engine(#[from] EngineError),
}

/// On-disk document. Cells carry their raw values and last displays
/// verbatim; edges are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookFile {
    pub version: u32,
    #[serde(default)]
    pub active_sheet: usize,
    #[serde(default)]
    pub sheets: Vec<SheetRecord>,
}

impl WorkbookFile {
    pub fn from_workbook(workbook: &Workbook) -> Self {
        Self {
            version: NATIVE_FORMAT_VERSION,
            active_sheet: workbook.active_sheet_index(),
            sheets: workbook.to_records(),
        }
    }
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for a bare file name
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Write the workbook to `path`. The document goes to a temp file in the
/// target directory first and is renamed over the destination, so a failed
/// save leaves any existing file untouched.
pub fn save_workbook(workbook: &Workbook, path: &Path) -> Result<(), NativeError> {
    let document = WorkbookFile::from_workbook(workbook);
    let dir = parent_dir_or_dot(path);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;

    log::info!(
        "saved {} sheets to {}",
        document.sheets.len(),
        path.display()
    );
    Ok(())
}

/// Read a workbook from `path` with the standard function registry.
pub fn load_workbook(path: &Path, options: SheetOptions) -> Result<Workbook, NativeError> {
    load_workbook_with(path, options, Rc::new(FunctionRegistry::standard()))
}

/// Read a workbook from `path`, evaluating formulas with `functions`.
pub fn load_workbook_with(
    path: &Path,
    options: SheetOptions,
    functions: Rc<FunctionRegistry>,
) -> Result<Workbook, NativeError> {
    let file = fs::File::open(path)?;
    let document: WorkbookFile = serde_json::from_reader(BufReader::new(file))?;
    if document.version == 0 || document.version > NATIVE_FORMAT_VERSION {
        return Err(NativeError::UnsupportedVersion {
            found: document.version,
            supported: NATIVE_FORMAT_VERSION,
        });
    }

    let mut workbook = Workbook::from_records(document.sheets, document.active_sheet, options, functions)?;
    workbook.set_current_file(Some(path.to_path_buf()));
    workbook.mark_clean();
    Ok(workbook)
}
