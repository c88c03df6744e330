// Statistical and information functions: SUM, AVG, COUNT, PRODUCT, CHOOSE,
// ISNUMBER, ISTEXT, ISBLANK

use super::eval::Value;
use super::eval_helpers::{collect_numbers, int_arg};
use super::functions::{check_arity, FnError, FunctionRegistry};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register("SUM", |args| {
        check_arity("SUM", args, 1, None)?;
        Ok(Value::Number(collect_numbers("SUM", args)?.iter().sum()))
    });
    registry.register("AVG", |args| {
        check_arity("AVG", args, 1, None)?;
        let values = collect_numbers("AVG", args)?;
        if values.is_empty() {
            return Err(FnError::DivideByZero);
        }
        Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
    });
    registry.register("COUNT", |args| {
        check_arity("COUNT", args, 1, None)?;
        let count = args.iter().filter(|arg| matches!(arg, Value::Number(_))).count();
        Ok(Value::Number(count as f64))
    });
    registry.register("PRODUCT", |args| {
        check_arity("PRODUCT", args, 1, None)?;
        Ok(Value::Number(collect_numbers("PRODUCT", args)?.iter().product()))
    });
    registry.register("CHOOSE", |args| {
        check_arity("CHOOSE", args, 2, None)?;
        let index = int_arg("CHOOSE", &args[0])?;
        if index < 1 || index as usize >= args.len() {
            return Err(FnError::Value(format!("CHOOSE: index {} out of range", index)));
        }
        Ok(args[index as usize].clone())
    });
    registry.register("ISNUMBER", |args| {
        check_arity("ISNUMBER", args, 1, Some(1))?;
        Ok(Value::Boolean(matches!(args[0], Value::Number(_))))
    });
    registry.register("ISTEXT", |args| {
        check_arity("ISTEXT", args, 1, Some(1))?;
        Ok(Value::Boolean(matches!(args[0], Value::Text(_))))
    });
    registry.register("ISBLANK", |args| {
        check_arity("ISBLANK", args, 1, Some(1))?;
        Ok(Value::Boolean(args[0].to_text().is_empty()))
    });
}
