use termgrid_engine::cell::Alignment;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string, accounting for CJK double-width, emoji, etc.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Cut `s` down to `width` display columns, ending in ".." when anything
/// was dropped. Below three columns there is no room for the marker, so
/// only the first character is kept.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width < 3 {
        return s
            .chars()
            .find(|&ch| char_width(ch) <= width)
            .map(String::from)
            .unwrap_or_default();
    }

    let budget = width - 2;
    let mut used = 0;
    let kept: String = s
        .chars()
        .take_while(|&ch| {
            used += char_width(ch);
            used <= budget
        })
        .collect();
    kept + ".."
}

/// Fit `s` into exactly `width` display columns with the cell's alignment.
/// Longer text is truncated with "..".
pub(crate) fn align(s: &str, width: usize, alignment: Alignment) -> String {
    let fitted = truncate_display(s, width);
    let gap = width.saturating_sub(display_width(&fitted));
    match alignment {
        Alignment::Left => format!("{}{}", fitted, " ".repeat(gap)),
        Alignment::Right => format!("{}{}", " ".repeat(gap), fitted),
        Alignment::Center => {
            let left = gap / 2;
            format!("{}{}{}", " ".repeat(left), fitted, " ".repeat(gap - left))
        }
    }
}

/// Pad or truncate a string to exactly `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    align(s, width, Alignment::Left)
}
