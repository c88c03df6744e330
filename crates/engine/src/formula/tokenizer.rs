// Formula text tokenizer and range expander
// Ranges (A1:B4) are rewritten into explicit reference lists before tokenizing,
// so the dependency graph only ever sees single-cell references.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::cell_ref::{column_name, column_number, CellRef};
use crate::error::EngineError;

/// Largest rectangle a single range may expand to.
pub const MAX_RANGE_CELLS: u64 = 1_000_000;

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]+)([0-9]+):([A-Za-z]+)([0-9]+)").expect("range pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Upper-cased single-cell reference, e.g. `B12`
    CellRef(String),
    /// Contents of a double-quoted literal with escapes resolved
    StringLiteral(String),
    /// Any other character, upper-cased
    Other(String),
}

/// Replace every `A1:B4` range with `A1, A2, ..., B4` (row-major).
///
/// Axes are normalized so reversed ranges expand identically. Applying this
/// to text without ranges returns it unchanged.
pub fn expand_ranges(formula: &str) -> Result<String, EngineError> {
    let matches: Vec<_> = RANGE_RE.captures_iter(formula).collect();
    if matches.is_empty() {
        return Ok(formula.to_string());
    }

    let mut out = formula.to_string();
    // Back to front so earlier offsets stay valid
    for caps in matches.iter().rev() {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let start = range_endpoint(&caps[1], &caps[2], whole.as_str())?;
        let end = range_endpoint(&caps[3], &caps[4], whole.as_str())?;
        let cells = expand_range(start, end)?;

        let list = cells
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        out.replace_range(whole.range(), &list);
    }
    Ok(out)
}

fn range_endpoint(letters: &str, digits: &str, range: &str) -> Result<CellRef, EngineError> {
    let col = column_number(letters).ok_or_else(|| EngineError::RangeSyntax(range.to_string()))?;
    let row: u32 = digits
        .parse()
        .map_err(|_| EngineError::RangeSyntax(range.to_string()))?;
    let cell = CellRef::new(row, col);
    if !cell.is_valid() {
        return Err(EngineError::RangeSyntax(range.to_string()));
    }
    Ok(cell)
}

/// All cells of the rectangle spanned by two corners, inclusive, row-major.
pub fn expand_range(a: CellRef, b: CellRef) -> Result<Vec<CellRef>, EngineError> {
    let (top, bottom) = (a.row.min(b.row), a.row.max(b.row));
    let (left, right) = (a.col.min(b.col), a.col.max(b.col));

    let count = u64::from(bottom - top + 1) * u64::from(right - left + 1);
    if count > MAX_RANGE_CELLS {
        return Err(EngineError::RangeSyntax(format!(
            "{}{}:{}{} covers {} cells",
            column_name(left),
            top,
            column_name(right),
            bottom,
            count
        )));
    }

    let mut cells = Vec::with_capacity(count as usize);
    for row in top..=bottom {
        for col in left..=right {
            cells.push(CellRef::new(row, col));
        }
    }
    Ok(cells)
}

/// Split range-free formula text into references, string literals and
/// single characters.
///
/// A letters-then-digits run directly followed by `(` is a function name
/// (`LOG10(`) and is emitted as plain characters.
pub fn tokenize(formula: &str) -> Vec<Token> {
    let chars: Vec<char> = formula.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' {
            if let Some((literal, next)) = scan_string(&chars, i + 1) {
                tokens.push(Token::StringLiteral(literal));
                i = next;
                continue;
            }
            // Unterminated: leave the quote for the expression parser to reject
            tokens.push(Token::Other("\"".to_string()));
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() && !continues_identifier(&chars, i) {
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_alphabetic() {
                j += 1;
            }
            let letters_end = j;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            let is_ref = letters_end > i
                && j > letters_end
                && !chars.get(j).is_some_and(|&n| n == '(' || n == '_' || n.is_ascii_alphanumeric());
            if is_ref {
                let text: String = chars[i..j].iter().collect();
                tokens.push(Token::CellRef(text.to_ascii_uppercase()));
                i = j;
                continue;
            }
            // Plain identifier: emit it character by character
            for &ch in &chars[i..j] {
                tokens.push(Token::Other(ch.to_uppercase().collect()));
            }
            i = j;
            continue;
        }

        tokens.push(Token::Other(c.to_uppercase().collect()));
        i += 1;
    }

    tokens
}

// A letter preceded by an identifier character belongs to that identifier
fn continues_identifier(chars: &[char], i: usize) -> bool {
    i > 0 && (chars[i - 1].is_ascii_alphanumeric() || chars[i - 1] == '_')
}

// Returns the literal and the index after the closing quote
fn scan_string(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '"' => return Some((out, i + 1)),
            '\\' if matches!(chars.get(i + 1), Some('"') | Some('\\')) => {
                out.push(chars[i + 1]);
                i += 2;
            }
            ch => {
                out.push(ch);
                i += 1;
            }
        }
    }
    None
}

/// Distinct references in first-appearance order.
pub fn references(tokens: &[Token]) -> Result<Vec<CellRef>, EngineError> {
    let mut refs: Vec<CellRef> = Vec::new();
    let mut seen: FxHashSet<CellRef> = FxHashSet::default();
    for token in tokens {
        if let Token::CellRef(text) = token {
            let cell = CellRef::parse(text)?;
            if seen.insert(cell) {
                refs.push(cell);
            }
        }
    }
    Ok(refs)
}

/// Expand, tokenize and collect references of a formula body in one step.
pub fn formula_references(body: &str) -> Result<Vec<CellRef>, EngineError> {
    let expanded = expand_ranges(body)?;
    references(&tokenize(&expanded))
}
