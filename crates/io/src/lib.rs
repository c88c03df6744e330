// File I/O operations

pub mod native;

pub use native::{load_workbook, save_workbook, NativeError};

/// Native .tgrid format version
/// Increment when schema changes in a way that old versions can't read
pub const NATIVE_FORMAT_VERSION: u32 = 1;
