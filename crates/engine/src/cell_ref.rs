//! Cell addressing.
//!
//! A `CellRef` is both the key of a sheet's cell map and the node identity
//! stored in dependency edges. Rows and columns are 1-based; index 0 is the
//! header axis and never addresses a cell.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Highest addressable row.
pub const MAX_ROWS: u32 = 1 << 30;
/// Highest addressable column.
pub const MAX_COLS: u32 = 1 << 20;

/// Address of a cell within a sheet.
///
/// Ordering is row-major, which gives deterministic iteration when a sheet's
/// keys are sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// True when both axes are within `1..=MAX`.
    pub fn is_valid(&self) -> bool {
        (1..=MAX_ROWS).contains(&self.row) && (1..=MAX_COLS).contains(&self.col)
    }

    /// Parse an A1-style reference (case-insensitive).
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let text = text.trim();
        let split = text
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| EngineError::Reference(text.to_string()))?;
        let (letters, digits) = text.split_at(split);

        if letters.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EngineError::Reference(text.to_string()));
        }

        let col = column_number(letters).ok_or_else(|| EngineError::Reference(text.to_string()))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| EngineError::Reference(text.to_string()))?;

        let cell = CellRef::new(row, col);
        if !cell.is_valid() {
            return Err(EngineError::Reference(text.to_string()));
        }
        Ok(cell)
    }

    /// Offset by signed deltas, returning `None` if the result leaves the sheet.
    pub fn offset(&self, d_row: i64, d_col: i64) -> Option<Self> {
        let row = u32::try_from(i64::from(self.row) + d_row).ok()?;
        let col = u32::try_from(i64::from(self.col) + d_col).ok()?;
        let cell = CellRef::new(row, col);
        cell.is_valid().then_some(cell)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CellRef::parse(s)
    }
}

/// Convert a 1-based column number to letters: 1=A, 26=Z, 27=AA.
pub fn column_name(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

/// Convert column letters to a 1-based column number.
///
/// Returns `None` for non-letters or anything past `MAX_COLS`.
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + u64::from(ch.to_ascii_uppercase() as u8 - b'A' + 1);
        if n > u64::from(MAX_COLS) {
            return None;
        }
    }
    u32::try_from(n).ok()
}
