// Text functions: LEFT, RIGHT, MID, UPPER, LOWER, PROPER, TRIM, FIND,
// SUBSTITUTE, LEN, CONCAT
// Positions and lengths count characters, not bytes.

use super::eval::Value;
use super::eval_helpers::int_arg;
use super::functions::{check_arity, FnError, FunctionRegistry};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register("LEFT", |args| {
        check_arity("LEFT", args, 2, Some(2))?;
        let text = args[0].to_text();
        let n = non_negative("LEFT", int_arg("LEFT", &args[1])?)?;
        Ok(Value::Text(text.chars().take(n).collect()))
    });
    registry.register("RIGHT", |args| {
        check_arity("RIGHT", args, 2, Some(2))?;
        let text = args[0].to_text();
        let n = non_negative("RIGHT", int_arg("RIGHT", &args[1])?)?;
        let len = text.chars().count();
        Ok(Value::Text(text.chars().skip(len.saturating_sub(n)).collect()))
    });
    registry.register("MID", |args| {
        check_arity("MID", args, 3, Some(3))?;
        let text = args[0].to_text();
        let start = int_arg("MID", &args[1])?.max(1) as usize - 1;
        let n = non_negative("MID", int_arg("MID", &args[2])?)?;
        Ok(Value::Text(text.chars().skip(start).take(n).collect()))
    });
    registry.register("UPPER", |args| {
        check_arity("UPPER", args, 1, Some(1))?;
        Ok(Value::Text(args[0].to_text().to_uppercase()))
    });
    registry.register("LOWER", |args| {
        check_arity("LOWER", args, 1, Some(1))?;
        Ok(Value::Text(args[0].to_text().to_lowercase()))
    });
    registry.register("PROPER", |args| {
        check_arity("PROPER", args, 1, Some(1))?;
        Ok(Value::Text(title_case(&args[0].to_text())))
    });
    registry.register("TRIM", |args| {
        check_arity("TRIM", args, 1, Some(1))?;
        Ok(Value::Text(args[0].to_text().trim().to_string()))
    });
    registry.register("FIND", |args| {
        check_arity("FIND", args, 2, Some(3))?;
        let needle = args[0].to_text();
        let haystack = args[1].to_text();
        let start = match args.get(2) {
            Some(arg) => int_arg("FIND", arg)?,
            None => 1,
        };
        if start < 1 {
            return Err(FnError::Value("FIND: start position must be >= 1".to_string()));
        }
        Ok(Value::Number(find_position(&needle, &haystack, start as usize)))
    });
    registry.register("SUBSTITUTE", |args| {
        check_arity("SUBSTITUTE", args, 3, Some(4))?;
        let text = args[0].to_text();
        let old = args[1].to_text();
        let new = args[2].to_text();
        if old.is_empty() {
            return Ok(Value::Text(text));
        }
        match args.get(3) {
            None => Ok(Value::Text(text.replace(&old, &new))),
            Some(arg) => {
                let instance = int_arg("SUBSTITUTE", arg)?;
                if instance < 1 {
                    return Err(FnError::Value("SUBSTITUTE: instance must be >= 1".to_string()));
                }
                Ok(Value::Text(replace_nth(&text, &old, &new, instance as usize)))
            }
        }
    });
    registry.register("LEN", |args| {
        check_arity("LEN", args, 1, Some(1))?;
        Ok(Value::Number(args[0].to_text().chars().count() as f64))
    });
    registry.register("CONCAT", |args| {
        check_arity("CONCAT", args, 1, None)?;
        Ok(Value::Text(args.iter().map(Value::to_text).collect()))
    });
}

fn non_negative(name: &str, n: i64) -> Result<usize, FnError> {
    usize::try_from(n).map_err(|_| FnError::Value(format!("{}: length must be >= 0", name)))
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = ch != '\'';
        }
    }
    out
}

// 1-based character position, or -1 when absent
fn find_position(needle: &str, haystack: &str, start: usize) -> f64 {
    let chars: Vec<char> = haystack.chars().collect();
    if start > chars.len() {
        return -1.0;
    }
    let tail: String = chars[start - 1..].iter().collect();
    match tail.find(needle) {
        Some(byte_pos) => (tail[..byte_pos].chars().count() + start) as f64,
        None => -1.0,
    }
}

fn replace_nth(text: &str, old: &str, new: &str, instance: usize) -> String {
    match text.match_indices(old).nth(instance - 1) {
        Some((pos, _)) => format!("{}{}{}", &text[..pos], new, &text[pos + old.len()..]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, FnError> {
        FunctionRegistry::standard().call(name, &args)
    }

    fn t(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn n(v: f64) -> Value {
        Value::Number(v)
    }

    #[test]
    fn test_left_right_mid() {
        assert_eq!(call("LEFT", vec![t("héllo"), n(2.0)]), Ok(t("hé")));
        assert_eq!(call("RIGHT", vec![t("hello"), n(3.0)]), Ok(t("llo")));
        assert_eq!(call("RIGHT", vec![t("hi"), n(5.0)]), Ok(t("hi")));
        assert_eq!(call("MID", vec![t("spreadsheet"), n(7.0), n(5.0)]), Ok(t("sheet")));
        assert_eq!(call("MID", vec![t("abc"), n(2.0), n(10.0)]), Ok(t("bc")));
        assert!(matches!(call("LEFT", vec![t("abc"), n(-1.0)]), Err(FnError::Value(_))));
    }

    #[test]
    fn test_case() {
        assert_eq!(call("UPPER", vec![t("abc")]), Ok(t("ABC")));
        assert_eq!(call("LOWER", vec![t("ABC")]), Ok(t("abc")));
        assert_eq!(call("PROPER", vec![t("hELLO wORLD")]), Ok(t("Hello World")));
    }

    #[test]
    fn test_find() {
        assert_eq!(call("FIND", vec![t("lo"), t("hello")]), Ok(n(4.0)));
        assert_eq!(call("FIND", vec![t("l"), t("hello"), n(4.0)]), Ok(n(4.0)));
        assert_eq!(call("FIND", vec![t("z"), t("hello")]), Ok(n(-1.0)));
        assert!(matches!(call("FIND", vec![t("h"), t("hello"), n(0.0)]), Err(FnError::Value(_))));
    }

    #[test]
    fn test_substitute() {
        assert_eq!(call("SUBSTITUTE", vec![t("a-b-c"), t("-"), t("+")]), Ok(t("a+b+c")));
        assert_eq!(
            call("SUBSTITUTE", vec![t("a-b-c"), t("-"), t("+"), n(2.0)]),
            Ok(t("a-b+c"))
        );
        assert_eq!(
            call("SUBSTITUTE", vec![t("a-b"), t("-"), t("+"), n(5.0)]),
            Ok(t("a-b"))
        );
    }

    #[test]
    fn test_len_trim_concat() {
        assert_eq!(call("LEN", vec![t("héllo")]), Ok(n(5.0)));
        assert_eq!(call("TRIM", vec![t("  x  ")]), Ok(t("x")));
        assert_eq!(call("CONCAT", vec![t("a"), n(1.0), Value::Boolean(true)]), Ok(t("a1TRUE")));
    }
}
