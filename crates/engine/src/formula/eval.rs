// Expression evaluation against a parameter environment and function registry

use rustc_hash::FxHashMap;

use super::eval_helpers::number_to_text;
use super::functions::{FnError, FunctionRegistry};
use super::parser::{Expr, Op, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
}

/// Named parameters (CELL_A1, STR_LITERAL_0) visible to an expression.
pub type Env = FxHashMap<String, Value>;

impl Value {
    pub fn to_number(&self) -> Result<f64, FnError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) if s.trim().is_empty() => Ok(0.0),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| FnError::Value(format!("cannot convert '{}' to number", s))),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => number_to_text(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        }
    }

    pub fn to_bool(&self) -> Result<bool, FnError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" => Ok(true),
                "FALSE" | "" => Ok(false),
                other => other
                    .parse::<f64>()
                    .map(|n| n != 0.0)
                    .map_err(|_| FnError::Value(format!("cannot convert '{}' to boolean", s))),
            },
        }
    }

    /// True for numbers and for text that reads as a number.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Number(_) => true,
            Value::Text(s) => !s.trim().is_empty() && s.trim().parse::<f64>().is_ok(),
            Value::Boolean(_) => false,
        }
    }
}

pub fn evaluate(expr: &Expr, env: &Env, functions: &FunctionRegistry) -> Result<Value, FnError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Param(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| FnError::Other(format!("undefined parameter {}", name))),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, env, functions)?;
            match op {
                UnaryOp::Neg => Ok(Value::Number(-value.to_number()?)),
                UnaryOp::Not => Ok(Value::Boolean(!value.to_bool()?)),
            }
        }
        Expr::Ternary { condition, then, otherwise } => {
            if evaluate(condition, env, functions)?.to_bool()? {
                evaluate(then, env, functions)
            } else {
                evaluate(otherwise, env, functions)
            }
        }
        Expr::Function { name, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, env, functions))
                .collect::<Result<Vec<_>, _>>()?;
            functions.call(name, &values)
        }
        Expr::BinaryOp { op: Op::And, left, right } => {
            if !evaluate(left, env, functions)?.to_bool()? {
                return Ok(Value::Boolean(false));
            }
            Ok(Value::Boolean(evaluate(right, env, functions)?.to_bool()?))
        }
        Expr::BinaryOp { op: Op::Or, left, right } => {
            if evaluate(left, env, functions)?.to_bool()? {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(evaluate(right, env, functions)?.to_bool()?))
        }
        Expr::BinaryOp { op, left, right } => {
            let left = evaluate(left, env, functions)?;
            let right = evaluate(right, env, functions)?;
            apply_binary(*op, &left, &right)
        }
    }
}

fn apply_binary(op: Op, left: &Value, right: &Value) -> Result<Value, FnError> {
    match op {
        Op::Add => {
            // Two non-numeric strings concatenate
            if let (Value::Text(a), Value::Text(b)) = (left, right) {
                if !left.is_numeric() && !right.is_numeric() {
                    return Ok(Value::Text(format!("{}{}", a, b)));
                }
            }
            Ok(Value::Number(left.to_number()? + right.to_number()?))
        }
        Op::Sub => Ok(Value::Number(left.to_number()? - right.to_number()?)),
        Op::Mul => Ok(Value::Number(left.to_number()? * right.to_number()?)),
        Op::Div => {
            let divisor = right.to_number()?;
            if divisor == 0.0 {
                return Err(FnError::DivideByZero);
            }
            Ok(Value::Number(left.to_number()? / divisor))
        }
        Op::Mod => {
            let divisor = right.to_number()?;
            if divisor == 0.0 {
                return Err(FnError::DivideByZero);
            }
            Ok(Value::Number(left.to_number()? % divisor))
        }
        Op::Pow => Ok(Value::Number(left.to_number()?.powf(right.to_number()?))),
        Op::Concat => Ok(Value::Text(format!("{}{}", left.to_text(), right.to_text()))),
        Op::Eq => Ok(Value::Boolean(values_equal(left, right))),
        Op::NotEq => Ok(Value::Boolean(!values_equal(left, right))),
        Op::Lt | Op::Gt | Op::LtEq | Op::GtEq => {
            let ordering = compare(left, right)?;
            let result = match op {
                Op::Lt => ordering.is_lt(),
                Op::Gt => ordering.is_gt(),
                Op::LtEq => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Boolean(result))
        }
        // Short-circuited in evaluate()
        Op::And => Ok(Value::Boolean(left.to_bool()? && right.to_bool()?)),
        Op::Or => Ok(Value::Boolean(left.to_bool()? || right.to_bool()?)),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) if !left.is_numeric() || !right.is_numeric() => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        _ => match (left.to_number(), right.to_number()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(left: &Value, right: &Value) -> Result<std::cmp::Ordering, FnError> {
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        if !left.is_numeric() || !right.is_numeric() {
            return Ok(a.cmp(b));
        }
    }
    let a = left.to_number()?;
    let b = right.to_number()?;
    a.partial_cmp(&b)
        .ok_or_else(|| FnError::Value("cannot compare NaN".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::parse;

    fn eval_with(expression: &str, env: &Env) -> Result<Value, FnError> {
        let functions = FunctionRegistry::standard();
        evaluate(&parse(expression).unwrap(), env, &functions)
    }

    fn eval(expression: &str) -> Result<Value, FnError> {
        eval_with(expression, &Env::default())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Number(9.0));
        assert_eq!(eval("7 % 4").unwrap(), Value::Number(3.0));
        assert_eq!(eval("2 ** 10").unwrap(), Value::Number(1024.0));
        assert_eq!(eval("-2 ^ 2").unwrap(), Value::Number(-4.0));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(eval("10 / 0"), Err(FnError::DivideByZero));
        assert_eq!(eval("10 % 0"), Err(FnError::DivideByZero));
    }

    #[test]
    fn test_text_params() {
        let mut env = Env::default();
        env.insert("STR_LITERAL_0".into(), Value::Text("foo".into()));
        env.insert("STR_LITERAL_1".into(), Value::Text("bar".into()));
        env.insert("CELL_A1".into(), Value::Text("12".into()));
        env.insert("CELL_A2".into(), Value::Text("#DIV/0!".into()));

        assert_eq!(
            eval_with("STR_LITERAL_0 + STR_LITERAL_1", &env).unwrap(),
            Value::Text("foobar".into())
        );
        assert_eq!(eval_with("CELL_A1 + 1", &env).unwrap(), Value::Number(13.0));
        assert!(matches!(eval_with("CELL_A2 * 2", &env), Err(FnError::Value(_))));
        assert_eq!(
            eval_with("STR_LITERAL_0 & 1", &env).unwrap(),
            Value::Text("foo1".into())
        );
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("1 < 2 && 3 >= 3").unwrap(), Value::Boolean(true));
        assert_eq!(eval("1 = 2 || !FALSE").unwrap(), Value::Boolean(true));
        assert_eq!(eval("2 > 1 ? 10 : 20").unwrap(), Value::Number(10.0));
        // Right side is never evaluated
        assert_eq!(eval("FALSE && 1 / 0").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_undefined_parameter() {
        assert!(matches!(eval("NOPE + 1"), Err(FnError::Other(_))));
    }

    #[test]
    fn test_function_call() {
        assert_eq!(eval("SUM(1, 2, 3)").unwrap(), Value::Number(6.0));
        assert!(matches!(eval("NOSUCH(1)"), Err(FnError::Other(_))));
    }
}
