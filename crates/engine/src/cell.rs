use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::cell_ref::CellRef;
use crate::error::EngineError;
use crate::formula::eval_helpers::{format_date_time, number_to_text, parse_date_time};

/// Prefix that marks a raw value as a formula.
pub const FORMULA_MARKER: &str = "$=";

pub const DEFAULT_MIN_WIDTH: u16 = 10;
pub const DEFAULT_MAX_WIDTH: u16 = 40;

/// How a cell's value is interpreted and rendered
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    String,
    Number,
    Financial,
    DateTime,
}

/// Rendering of date/time results
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateTimeFormat {
    #[default]
    Auto,
    Date,
    Time,
    DateTime,
}

impl DateTimeFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(DateTimeFormat::Auto),
            "date" => Some(DateTimeFormat::Date),
            "time" => Some(DateTimeFormat::Time),
            "datetime" => Some(DateTimeFormat::DateTime),
            _ => None,
        }
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
}

/// Per-cell numeric rendering options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NumberFormat {
    pub decimal_points: u8,
    pub thousands_separator: char,
    pub decimal_separator: char,
    pub financial_sign: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_points: 2,
            thousands_separator: ',',
            decimal_separator: '.',
            financial_sign: '$',
        }
    }
}

impl NumberFormat {
    /// Render a number with fixed decimals and grouped thousands.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }

        let fixed = format!("{:.*}", self.decimal_points as usize, value.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((int_part, frac)) => (int_part, Some(frac)),
            None => (fixed.as_str(), None),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(self.thousands_separator);
            }
            grouped.push(ch);
        }

        let mut out = String::new();
        // No "-0.00"
        if value < 0.0 && fixed.bytes().any(|b| (b'1'..=b'9').contains(&b)) {
            out.push('-');
        }
        out.push_str(&grouped);
        if let Some(frac) = frac_part {
            out.push(self.decimal_separator);
            out.push_str(frac);
        }
        out
    }

    /// Parse text rendered with this format (or typed by a user) back to a number.
    pub fn parse(&self, text: &str) -> Option<f64> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let mut normalized = String::with_capacity(trimmed.len());
        for ch in trimmed.chars() {
            if ch == self.thousands_separator || ch == self.financial_sign {
                continue;
            }
            if ch == self.decimal_separator {
                normalized.push('.');
            } else {
                normalized.push(ch);
            }
        }
        normalized.parse::<f64>().ok()
    }
}

bitflags! {
    /// Style and evaluation state of a cell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CellFlags: u8 {
        const ITALIC = 1 << 0;
        const BOLD = 1 << 1;
        const UNDERLINE = 1 << 2;
        const ALL_CAPS = 1 << 3;
        const STRIKETHROUGH = 1 << 4;
        const EDITABLE = 1 << 5;
        const FORMULA = 1 << 6;
        const EVALUATED = 1 << 7;
    }
}

impl Default for CellFlags {
    fn default() -> Self {
        CellFlags::EDITABLE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub raw_value: String,
    pub display: String,
    #[serde(rename = "type")]
    pub kind: CellType,
    pub number_format: NumberFormat,
    pub date_time_format: DateTimeFormat,
    pub color: Rgb,
    pub bg_color: Rgb,
    pub align: Alignment,
    pub min_width: u16,
    pub max_width: u16,
    pub flags: CellFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valrule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valrulemsg: Option<String>,
    /// Cells this formula reads, in first-reference order
    #[serde(skip)]
    pub depends_on: Vec<CellRef>,
    /// Cells whose formulas read this one
    #[serde(skip)]
    pub dependents: Vec<CellRef>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            row: 0,
            col: 0,
            raw_value: String::new(),
            display: String::new(),
            kind: CellType::default(),
            number_format: NumberFormat::default(),
            date_time_format: DateTimeFormat::default(),
            color: Rgb::WHITE,
            bg_color: Rgb::BLACK,
            align: Alignment::default(),
            min_width: DEFAULT_MIN_WIDTH,
            max_width: DEFAULT_MAX_WIDTH,
            flags: CellFlags::default(),
            notes: None,
            valrule: None,
            valrulemsg: None,
            depends_on: Vec::new(),
            dependents: Vec::new(),
        }
    }
}

impl Cell {
    pub fn new(at: CellRef) -> Self {
        Self {
            row: at.row,
            col: at.col,
            ..Self::default()
        }
    }

    /// Blank cell at `at` carrying another cell's formatting defaults.
    pub fn from_template(at: CellRef, template: &Cell) -> Self {
        Self {
            row: at.row,
            col: at.col,
            kind: template.kind,
            number_format: template.number_format,
            date_time_format: template.date_time_format,
            min_width: template.min_width,
            max_width: template.max_width,
            ..Self::default()
        }
    }

    #[inline]
    pub fn at(&self) -> CellRef {
        CellRef::new(self.row, self.col)
    }

    /// True if the raw value carries the formula marker.
    pub fn is_formula(&self) -> bool {
        self.raw_value.trim_start().starts_with(FORMULA_MARKER)
    }

    /// Formula text with the marker stripped and surrounding whitespace trimmed.
    pub fn formula_body(&self) -> Option<&str> {
        self.raw_value
            .trim_start()
            .strip_prefix(FORMULA_MARKER)
            .map(str::trim)
    }

    pub fn has_flag(&self, flag: CellFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: CellFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn is_evaluated(&self) -> bool {
        self.has_flag(CellFlags::EVALUATED)
    }

    pub fn is_bold(&self) -> bool {
        self.has_flag(CellFlags::BOLD)
    }

    pub fn is_italic(&self) -> bool {
        self.has_flag(CellFlags::ITALIC)
    }

    pub fn is_underline(&self) -> bool {
        self.has_flag(CellFlags::UNDERLINE)
    }

    pub fn is_strikethrough(&self) -> bool {
        self.has_flag(CellFlags::STRIKETHROUGH)
    }

    pub fn is_all_caps(&self) -> bool {
        self.has_flag(CellFlags::ALL_CAPS)
    }

    pub fn is_editable(&self) -> bool {
        self.has_flag(CellFlags::EDITABLE)
    }

    /// Synchronize the FORMULA flag with the raw value and drop EVALUATED.
    pub fn mark_stale(&mut self) {
        let formula = self.is_formula();
        self.flags.set(CellFlags::FORMULA, formula);
        self.flags.remove(CellFlags::EVALUATED);
    }

    /// Render a number the way this cell displays it.
    pub fn render_number(&self, value: f64) -> String {
        let formatted = self.number_format.format(value);
        if self.kind != CellType::Financial {
            return formatted;
        }
        match formatted.strip_prefix('-') {
            Some(abs) => format!("-{}{}", self.number_format.financial_sign, abs),
            None => format!("{}{}", self.number_format.financial_sign, formatted),
        }
    }

    /// Numeric reading of the display text, if it is a number.
    pub fn numeric_value(&self) -> Option<f64> {
        self.number_format.parse(&self.display)
    }

    /// Store a plain (non-formula) value, rendering it for the cell's type.
    pub fn apply_plain_value(&mut self, text: &str) -> Result<(), EngineError> {
        let text = text.trim();
        if text.is_empty() {
            self.raw_value.clear();
            self.display.clear();
            return Ok(());
        }

        match self.kind {
            CellType::String => {
                self.raw_value = text.to_string();
                self.display = text.to_string();
            }
            CellType::Number | CellType::Financial => {
                let value = self
                    .number_format
                    .parse(text)
                    .ok_or_else(|| EngineError::Value(format!("'{}' is not a number", text)))?;
                self.raw_value = number_to_text(value);
                self.display = self.render_number(value);
            }
            CellType::DateTime => {
                let parsed = parse_date_time(text)
                    .ok_or_else(|| EngineError::Value(format!("'{}' is not a date or time", text)))?;
                self.raw_value = text.to_string();
                self.display = format_date_time(&parsed, self.date_time_format);
            }
        }
        Ok(())
    }

    /// Re-render the display of a plain value after a format change.
    ///
    /// Values that no longer fit the type are shown verbatim.
    pub fn rerender(&mut self) {
        if self.is_formula() {
            return;
        }
        let raw = self.raw_value.clone();
        if self.apply_plain_value(&raw).is_err() {
            self.raw_value = raw.clone();
            self.display = raw;
        }
    }

    /// True if nothing distinguishes this cell from a fresh blank one built
    /// from `template`. Dependency edges are not considered.
    pub fn is_blank(&self, template: &Cell) -> bool {
        self.raw_value.is_empty()
            && self.display.is_empty()
            && self.notes.as_deref().map_or(true, str::is_empty)
            && self.valrule.as_deref().map_or(true, str::is_empty)
            && self.valrulemsg.as_deref().map_or(true, str::is_empty)
            && self.flags.difference(CellFlags::EDITABLE | CellFlags::EVALUATED).is_empty()
            && self.kind == template.kind
            && self.number_format == template.number_format
            && self.date_time_format == template.date_time_format
            && self.color == Rgb::WHITE
            && self.bg_color == Rgb::BLACK
            && self.align == Alignment::Left
            && self.min_width == template.min_width
            && self.max_width == template.max_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_format_grouping() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.format(0.0), "0.00");
        assert_eq!(fmt.format(999.0), "999.00");
        assert_eq!(fmt.format(1234.5), "1,234.50");
        assert_eq!(fmt.format(-1234567.891), "-1,234,567.89");
        assert_eq!(fmt.format(-0.001), "0.00");
    }

    #[test]
    fn test_number_format_custom_separators() {
        let fmt = NumberFormat {
            decimal_points: 0,
            thousands_separator: '.',
            decimal_separator: ',',
            financial_sign: '€',
        };
        assert_eq!(fmt.format(1234567.0), "1.234.567");

        let fmt = NumberFormat { decimal_points: 1, ..fmt };
        assert_eq!(fmt.format(1234.5), "1.234,5");
        assert_eq!(fmt.parse("1.234,5"), Some(1234.5));
    }

    #[test]
    fn test_number_format_parse_strips_sign_and_grouping() {
        let fmt = NumberFormat::default();
        assert_eq!(fmt.parse("$1,234.50"), Some(1234.5));
        assert_eq!(fmt.parse(" 42 "), Some(42.0));
        assert_eq!(fmt.parse("#DIV/0!"), None);
        assert_eq!(fmt.parse(""), None);
    }

    #[test]
    fn test_formula_marker() {
        let mut cell = Cell::new(CellRef::new(1, 1));
        cell.raw_value = "$= A1 + 2 ".into();
        assert!(cell.is_formula());
        assert_eq!(cell.formula_body(), Some("A1 + 2"));

        cell.raw_value = "=A1".into();
        assert!(!cell.is_formula());
        assert_eq!(cell.formula_body(), None);
    }

    #[test]
    fn test_financial_rendering() {
        let mut cell = Cell::new(CellRef::new(1, 1));
        cell.kind = CellType::Financial;
        assert_eq!(cell.render_number(1500.0), "$1,500.00");
        assert_eq!(cell.render_number(-3.5), "-$3.50");
    }

    #[test]
    fn test_apply_plain_value_by_type() {
        let mut cell = Cell::new(CellRef::new(1, 1));
        cell.apply_plain_value("hello").unwrap();
        assert_eq!(cell.display, "hello");

        cell.kind = CellType::Number;
        cell.apply_plain_value("1,500").unwrap();
        assert_eq!(cell.raw_value, "1500");
        assert_eq!(cell.display, "1,500.00");
        assert!(cell.apply_plain_value("abc").is_err());
        assert_eq!(cell.display, "1,500.00");

        cell.kind = CellType::DateTime;
        cell.apply_plain_value("2024-03-05").unwrap();
        assert_eq!(cell.display, "2024-03-05");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = Cell::new(CellRef::new(1, 1));
        original.raw_value = "5".into();
        original.dependents.push(CellRef::new(2, 1));

        let mut copy = original.clone();
        copy.raw_value = "6".into();
        copy.dependents.clear();

        assert_eq!(original.raw_value, "5");
        assert_eq!(original.dependents, vec![CellRef::new(2, 1)]);
    }

    #[test]
    fn test_flags() {
        let mut cell = Cell::new(CellRef::new(1, 1));
        assert!(cell.is_editable());
        assert!(!cell.is_bold());
        cell.set_flag(CellFlags::BOLD | CellFlags::UNDERLINE, true);
        assert!(cell.is_bold());
        assert!(cell.is_underline());
        cell.set_flag(CellFlags::BOLD, false);
        assert!(!cell.is_bold());
    }

    #[test]
    fn test_is_blank() {
        let template = Cell::default();
        let mut cell = Cell::new(CellRef::new(3, 3));
        assert!(cell.is_blank(&template));

        cell.set_flag(CellFlags::BOLD, true);
        assert!(!cell.is_blank(&template));

        let mut cell = Cell::new(CellRef::new(3, 3));
        cell.notes = Some("remember".into());
        assert!(!cell.is_blank(&template));
    }

    #[test]
    fn test_serde_skips_edges() {
        let mut cell = Cell::new(CellRef::new(1, 2));
        cell.raw_value = "$=A1".into();
        cell.depends_on.push(CellRef::new(1, 1));
        let json = serde_json::to_string(&cell).unwrap();
        assert!(!json.contains("depends_on"));
        let back: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(back.raw_value, "$=A1");
        assert!(back.depends_on.is_empty());
    }
}
