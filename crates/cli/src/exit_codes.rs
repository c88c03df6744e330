//! CLI exit codes
//!
//! Scripts driving `termgrid set` and `termgrid show` rely on these.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error                                        |
//! | 2    | Usage error (bad arguments, bad cell reference)      |
//! | 3    | File could not be read or written                    |
//! | 4    | File is not a readable workbook                      |
//! | 5    | Edit rejected (cycle, bad reference, validation)     |

use termgrid_engine::EngineError;
use termgrid_io::NativeError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown sheet, malformed cell reference.
pub const EXIT_USAGE: u8 = 2;

/// Filesystem failure reading or saving a workbook.
pub const EXIT_IO: u8 = 3;

/// The file parsed badly or has an unsupported version.
pub const EXIT_FORMAT: u8 = 4;

/// The engine refused an edit and left the sheet unchanged.
pub const EXIT_REJECTED: u8 = 5;

pub fn native_exit_code(err: &NativeError) -> u8 {
    match err {
        NativeError::Io(_) | NativeError::Persist(_) => EXIT_IO,
        NativeError::Json(_) | NativeError::UnsupportedVersion { .. } | NativeError::Engine(_) => EXIT_FORMAT,
    }
}

/// Exit code for a failed `commit_edit`. Any error other than a bad sheet
/// index means the edit was refused.
pub fn commit_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::NoSuchSheet(_) => EXIT_USAGE,
        _ => EXIT_REJECTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termgrid_engine::CellRef;

    #[test]
    fn rejected_edits_map_to_rejected() {
        let cycle = EngineError::Cycle { cell: CellRef::new(1, 1) };
        assert_eq!(commit_exit_code(&cycle), EXIT_REJECTED);
        let validation = EngineError::Validation {
            cell: CellRef::new(1, 1),
            message: "no".to_string(),
        };
        assert_eq!(commit_exit_code(&validation), EXIT_REJECTED);
        let typed = EngineError::Value("not a number".to_string());
        assert_eq!(commit_exit_code(&typed), EXIT_REJECTED);
    }

    #[test]
    fn unknown_sheet_is_usage() {
        assert_eq!(commit_exit_code(&EngineError::NoSuchSheet(4)), EXIT_USAGE);
    }

    #[test]
    fn version_mismatch_is_format() {
        let err = NativeError::UnsupportedVersion { found: 9, supported: 1 };
        assert_eq!(native_exit_code(&err), EXIT_FORMAT);
    }
}
