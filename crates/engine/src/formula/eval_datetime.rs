// Date/time functions: NOW, TODAY, DATE, TIME, YEAR, MONTH, DAY, HOUR,
// MINUTE, SECOND, WEEKDAY, DATEDIFF, DATEADD
// Dates travel between functions as text ("2024-03-05") and are re-parsed
// with the same layouts used to classify formula results.

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, Timelike};

use super::eval::Value;
use super::eval_helpers::{int_arg, number_arg, parse_date_time};
use super::functions::{check_arity, FnError, FunctionRegistry};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register("NOW", |args| {
        check_arity("NOW", args, 0, Some(0))?;
        Ok(Value::Text(Local::now().format(DATE_TIME_FORMAT).to_string()))
    });
    registry.register("TODAY", |args| {
        check_arity("TODAY", args, 0, Some(0))?;
        Ok(Value::Text(Local::now().format(DATE_FORMAT).to_string()))
    });
    registry.register("DATE", |args| {
        check_arity("DATE", args, 3, Some(3))?;
        let year = int_arg("DATE", &args[0])?;
        let month = int_arg("DATE", &args[1])?;
        let day = int_arg("DATE", &args[2])?;
        let date = normalized_date(year, month, day)
            .ok_or_else(|| FnError::Value("DATE: date out of range".to_string()))?;
        Ok(Value::Text(date.format(DATE_FORMAT).to_string()))
    });
    registry.register("TIME", |args| {
        check_arity("TIME", args, 2, Some(3))?;
        let hour = int_arg("TIME", &args[0])?;
        let minute = int_arg("TIME", &args[1])?;
        let second = match args.get(2) {
            Some(arg) => int_arg("TIME", arg)?,
            None => 0,
        };
        // Wraps past midnight
        let total = (hour * 3600 + minute * 60 + second).rem_euclid(86_400);
        Ok(Value::Text(format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            total % 3600 / 60,
            total % 60
        )))
    });
    registry.register("YEAR", |args| part("YEAR", args, |dt| f64::from(dt.year())));
    registry.register("MONTH", |args| part("MONTH", args, |dt| f64::from(dt.month())));
    registry.register("DAY", |args| part("DAY", args, |dt| f64::from(dt.day())));
    registry.register("HOUR", |args| part("HOUR", args, |dt| f64::from(dt.hour())));
    registry.register("MINUTE", |args| part("MINUTE", args, |dt| f64::from(dt.minute())));
    registry.register("SECOND", |args| part("SECOND", args, |dt| f64::from(dt.second())));
    // Sunday = 1
    registry.register("WEEKDAY", |args| {
        part("WEEKDAY", args, |dt| f64::from(dt.weekday().num_days_from_sunday() + 1))
    });
    registry.register("DATEDIFF", |args| {
        check_arity("DATEDIFF", args, 2, Some(2))?;
        let from = date_arg("DATEDIFF", &args[0])?;
        let to = date_arg("DATEDIFF", &args[1])?;
        let seconds = (to - from).num_seconds() as f64;
        Ok(Value::Number(seconds / 86_400.0))
    });
    registry.register("DATEADD", |args| {
        check_arity("DATEADD", args, 2, Some(2))?;
        let start = date_arg("DATEADD", &args[0])?;
        let days = number_arg("DATEADD", &args[1])?.trunc() as i64;
        let shifted = Duration::try_days(days)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| FnError::Value("DATEADD: date out of range".to_string()))?;
        Ok(Value::Text(shifted.format(DATE_FORMAT).to_string()))
    });
}

fn date_arg(name: &str, arg: &Value) -> Result<NaiveDateTime, FnError> {
    let text = arg.to_text();
    parse_date_time(&text)
        .ok_or_else(|| FnError::Value(format!("{}: '{}' is not a date or time", name, text)))
}

fn part(name: &str, args: &[Value], extract: fn(&NaiveDateTime) -> f64) -> Result<Value, FnError> {
    check_arity(name, args, 1, Some(1))?;
    Ok(Value::Number(extract(&date_arg(name, &args[0])?)))
}

// Month and day overflow roll into the next unit: DATE(2024, 13, 1) is 2025-01-01
fn normalized_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let months_from_jan = month - 1;
    let year = year + months_from_jan.div_euclid(12);
    let month0 = months_from_jan.rem_euclid(12) as u32;
    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)?;
    let first = first.checked_add_months(Months::new(month0))?;
    first.checked_add_signed(Duration::try_days(day - 1)?)
}
