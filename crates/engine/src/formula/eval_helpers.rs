// Shared helper functions for formula evaluation and value rendering

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::eval::Value;
use super::functions::FnError;
use crate::cell::DateTimeFormat;

/// Shortest text form of a number: integers without a fraction.
pub(crate) fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Numbers from aggregate arguments. Blank text is skipped, booleans count
/// as 1/0, non-numeric text is a value error.
pub(crate) fn collect_numbers(name: &str, args: &[Value]) -> Result<Vec<f64>, FnError> {
    let mut numbers = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Text(s) if s.trim().is_empty() => {}
            Value::Text(s) => {
                let n = s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| FnError::Value(format!("{}: '{}' is not a number", name, s)))?;
                numbers.push(n);
            }
            other => numbers.push(other.to_number()?),
        }
    }
    Ok(numbers)
}

/// Single numeric argument with the function name in the error.
pub(crate) fn number_arg(name: &str, arg: &Value) -> Result<f64, FnError> {
    arg.to_number()
        .map_err(|_| FnError::Value(format!("{}: '{}' is not a number", name, arg.to_text())))
}

/// Integer argument (truncated toward zero).
pub(crate) fn int_arg(name: &str, arg: &Value) -> Result<i64, FnError> {
    let n = number_arg(name, arg)?;
    if !n.is_finite() {
        return Err(FnError::Value(format!("{}: '{}' is not a finite number", name, n)));
    }
    Ok(n.trunc() as i64)
}

// Date/time layouts accepted for string results, tried in order.
// Two-digit-year layouts come before their four-digit twins: chrono's %Y
// also accepts short years.
const DATE_TIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%b %d, %Y %I:%M %p",
    "%d %b %Y %H:%M",
];

const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%d %b %Y",
];

const TIME_LAYOUTS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p"];

/// Parse a date, time or date-time string.
///
/// Time-only values land on day 0000-01-01, date-only values at midnight.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let full_year = has_digit_run(text, 4);

    for layout in DATE_TIME_LAYOUTS {
        if layout.contains("%Y") && !full_year {
            continue;
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(dt);
        }
    }
    for layout in DATE_LAYOUTS {
        if layout.contains("%Y") && !full_year {
            continue;
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for layout in TIME_LAYOUTS {
        if let Ok(time) = NaiveTime::parse_from_str(text, layout) {
            return NaiveDate::from_ymd_opt(0, 1, 1).map(|day| day.and_time(time));
        }
    }
    None
}

fn has_digit_run(text: &str, len: usize) -> bool {
    let mut run = 0;
    for b in text.bytes() {
        if b.is_ascii_digit() {
            run += 1;
            if run >= len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Render a parsed value according to a cell's date-time format.
pub fn format_date_time(dt: &NaiveDateTime, format: DateTimeFormat) -> String {
    let has_date = dt.year() != 0;
    let has_time = dt.hour() != 0 || dt.minute() != 0 || dt.second() != 0;

    let pattern = match format {
        DateTimeFormat::DateTime if has_time => "%Y-%m-%d %H:%M:%S",
        DateTimeFormat::DateTime | DateTimeFormat::Date => "%Y-%m-%d",
        DateTimeFormat::Time => "%H:%M:%S",
        DateTimeFormat::Auto if has_date && has_time => "%Y-%m-%d %H:%M:%S",
        DateTimeFormat::Auto if has_date => "%Y-%m-%d",
        DateTimeFormat::Auto => "%H:%M:%S",
    };
    dt.format(pattern).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_number_to_text() {
        assert_eq!(number_to_text(6.0), "6");
        assert_eq!(number_to_text(-2.0), "-2");
        assert_eq!(number_to_text(2.5), "2.5");
    }

    #[test]
    fn test_collect_numbers() {
        let args = vec![
            Value::Number(1.0),
            Value::Text("".into()),
            Value::Text(" 2 ".into()),
            Value::Boolean(true),
        ];
        assert_eq!(collect_numbers("SUM", &args).unwrap(), vec![1.0, 2.0, 1.0]);
        assert!(matches!(
            collect_numbers("SUM", &[Value::Text("#DIV/0!".into())]),
            Err(FnError::Value(_))
        ));
    }

    #[test]
    fn test_parse_iso_and_us_dates() {
        assert_eq!(parse_date_time("2024-03-05"), Some(ymd_hms(2024, 3, 5, 0, 0, 0)));
        assert_eq!(parse_date_time("03/05/2024"), Some(ymd_hms(2024, 3, 5, 0, 0, 0)));
        assert_eq!(parse_date_time("03/05/24"), Some(ymd_hms(2024, 3, 5, 0, 0, 0)));
        assert_eq!(parse_date_time("Mar 5, 2024"), Some(ymd_hms(2024, 3, 5, 0, 0, 0)));
        assert_eq!(
            parse_date_time("2024-03-05 14:30"),
            Some(ymd_hms(2024, 3, 5, 14, 30, 0))
        );
    }

    #[test]
    fn test_parse_eu_dash_date_before_us() {
        assert_eq!(parse_date_time("05-03-2024"), Some(ymd_hms(2024, 3, 5, 0, 0, 0)));
        // Only valid as month-day-year
        assert_eq!(parse_date_time("12-25-2024"), Some(ymd_hms(2024, 12, 25, 0, 0, 0)));
    }

    #[test]
    fn test_parse_time_only() {
        let parsed = parse_date_time("14:05").unwrap();
        assert_eq!(parsed.year(), 0);
        assert_eq!(format_date_time(&parsed, DateTimeFormat::Auto), "14:05:00");
        assert!(parse_date_time("3:04 PM").is_some());
    }

    #[test]
    fn test_rejects_plain_text_and_numbers() {
        assert_eq!(parse_date_time("hello"), None);
        assert_eq!(parse_date_time("42"), None);
        assert_eq!(parse_date_time("1-2-3"), None);
        assert_eq!(parse_date_time(""), None);
    }

    #[test]
    fn test_format_date_time_modes() {
        let dt = ymd_hms(2024, 3, 5, 9, 15, 0);
        assert_eq!(format_date_time(&dt, DateTimeFormat::Auto), "2024-03-05 09:15:00");
        assert_eq!(format_date_time(&dt, DateTimeFormat::Date), "2024-03-05");
        assert_eq!(format_date_time(&dt, DateTimeFormat::Time), "09:15:00");

        let midnight = ymd_hms(2024, 3, 5, 0, 0, 0);
        assert_eq!(format_date_time(&midnight, DateTimeFormat::DateTime), "2024-03-05");
        assert_eq!(format_date_time(&midnight, DateTimeFormat::Auto), "2024-03-05");
    }
}
