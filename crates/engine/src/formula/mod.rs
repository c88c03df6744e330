// Formula tokenizing, parsing and evaluation

pub mod tokenizer;
pub mod parser;
pub mod eval;
pub mod functions;

pub(crate) mod eval_helpers;
pub(crate) mod eval_math;
pub(crate) mod eval_statistical;
pub(crate) mod eval_text;
pub(crate) mod eval_datetime;
pub(crate) mod eval_logical;

pub use eval_helpers::{format_date_time, parse_date_time};

use crate::error::EngineError;
use eval::{Env, Value};
use functions::FunctionRegistry;
use tokenizer::Token;

/// Replace references and string literals with named parameters.
///
/// `A1` becomes `CELL_A1` bound to `cell_value("A1")`; the n-th string
/// literal becomes `STR_LITERAL_n`.
pub(crate) fn substitute<F>(tokens: &[Token], mut cell_value: F) -> (String, Env)
where
    F: FnMut(&str) -> Value,
{
    let mut expression = String::new();
    let mut env = Env::default();
    let mut literals = 0;

    for token in tokens {
        match token {
            Token::CellRef(text) => {
                let name = format!("CELL_{}", text);
                if !env.contains_key(&name) {
                    env.insert(name.clone(), cell_value(text));
                }
                expression.push_str(&name);
            }
            Token::StringLiteral(s) => {
                let name = format!("STR_LITERAL_{}", literals);
                literals += 1;
                env.insert(name.clone(), Value::Text(s.clone()));
                expression.push_str(&name);
            }
            Token::Other(s) => expression.push_str(s),
        }
    }

    (expression, env)
}

/// Parse and evaluate a substituted expression.
pub(crate) fn run(expression: &str, env: &Env, functions: &FunctionRegistry) -> Result<Value, EngineError> {
    let expr = parser::parse(expression).map_err(EngineError::Evaluation)?;
    eval::evaluate(&expr, env, functions).map_err(EngineError::from)
}
