// Function registry
// Formulas call functions by upper-case name. The standard set covers math,
// statistical, text, date/time and logical functions; callers may register
// more before sheets are built.

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::eval::Value;
use super::{eval_datetime, eval_logical, eval_math, eval_statistical, eval_text};
use crate::error::EngineError;

/// Failure raised by a registered function or an operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FnError {
    /// Wrong number of arguments
    #[error("{0}")]
    Argument(String),
    #[error("division by zero")]
    DivideByZero,
    /// Argument of the wrong type or outside the domain
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Other(String),
}

impl From<FnError> for EngineError {
    fn from(err: FnError) -> Self {
        match err {
            FnError::Argument(msg) => EngineError::Argument(msg),
            FnError::DivideByZero => EngineError::DivideByZero,
            FnError::Value(msg) => EngineError::Value(msg),
            FnError::Other(msg) => EngineError::Evaluation(msg),
        }
    }
}

pub type FunctionImpl = fn(args: &[Value]) -> Result<Value, FnError>;

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, FunctionImpl>,
}

impl FunctionRegistry {
    /// Registry with no functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in function.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        eval_math::register(&mut registry);
        eval_statistical::register(&mut registry);
        eval_text::register(&mut registry);
        eval_datetime::register(&mut registry);
        eval_logical::register(&mut registry);
        registry
    }

    /// Add or replace a function. Names are case-insensitive.
    pub fn register(&mut self, name: &str, function: FunctionImpl) {
        self.functions.insert(name.to_ascii_uppercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<FunctionImpl> {
        self.functions.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, FnError> {
        match self.get(name) {
            Some(function) => function(args),
            None => Err(FnError::Other(format!("unknown function {}", name))),
        }
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Check argument count. `max` of `None` means variadic.
pub(crate) fn check_arity(
    name: &str,
    args: &[Value],
    min: usize,
    max: Option<usize>,
) -> Result<(), FnError> {
    let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };

    if max == Some(min) && args.len() != min {
        return Err(FnError::Argument(format!(
            "{} requires exactly {} {}",
            name,
            min,
            plural(min)
        )));
    }
    if args.len() < min {
        return Err(FnError::Argument(format!(
            "{} requires at least {} {}",
            name,
            min,
            plural(min)
        )));
    }
    if let Some(max) = max {
        if args.len() > max {
            return Err(FnError::Argument(format!(
                "{} accepts at most {} {}",
                name,
                max,
                plural(max)
            )));
        }
    }
    Ok(())
}
