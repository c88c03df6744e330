//! Cell value validation.
//!
//! A cell's `valrule` is an expression over `THIS`, the value being entered,
//! evaluated with the sheet's function registry. Rules cannot read other
//! cells. A rule that fails to evaluate rejects the value like a false one.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::cell::Cell;
use crate::formula::eval::Value;
use crate::formula::eval_helpers::number_to_text;
use crate::formula::functions::FunctionRegistry;
use crate::formula::tokenizer::{tokenize, Token};
use crate::formula::{run, substitute};

static THIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTHIS\b").expect("THIS pattern is valid"));

/// Check `value` against the cell's rule. Cells without a rule accept
/// anything. The error is the cell's `valrulemsg` or a default message.
pub fn check_value(cell: &Cell, value: &str, functions: &FunctionRegistry) -> Result<(), String> {
    let Some(rule) = cell.valrule.as_deref().map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(());
    };
    match evaluate_rule(rule, value, functions) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(cell
            .valrulemsg
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("'{}' does not satisfy {}", value.trim(), rule))),
    }
}

/// True if `rule` evaluates for a numeric or a text sample value.
pub fn validate_rule_syntax(rule: &str, functions: &FunctionRegistry) -> bool {
    let rule = rule.trim();
    !rule.is_empty()
        && (evaluate_rule(rule, "1", functions).is_ok() || evaluate_rule(rule, "x", functions).is_ok())
}

fn evaluate_rule(rule: &str, value: &str, functions: &FunctionRegistry) -> Result<bool, String> {
    let subject = subject_literal(value);
    let expression = THIS_RE.replace_all(rule, NoExpand(&subject));
    let tokens = tokenize(&expression);
    if let Some(Token::CellRef(text)) = tokens.iter().find(|t| matches!(t, Token::CellRef(_))) {
        return Err(format!("rules cannot reference cells ({})", text));
    }
    let (expression, env) = substitute(&tokens, |_| Value::Text(String::new()));
    run(&expression, &env, functions)
        .map_err(|err| err.to_string())?
        .to_bool()
        .map_err(|err| err.to_string())
}

/// `THIS` as source text: a number literal, or a quoted and escaped string.
fn subject_literal(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => {
            let text = number_to_text(n);
            if n < 0.0 {
                format!("({})", text)
            } else {
                text
            }
        }
        _ => format!("\"{}\"", trimmed.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}
