// Math functions: trigonometry, hyperbolic, exponent/log, rounding, MIN/MAX,
// integer helpers (MOD, FACTORIAL, GCD, LCM) and constants (PI, E)

use std::f64::consts;

use super::eval::Value;
use super::eval_helpers::{collect_numbers, int_arg, number_arg};
use super::functions::{check_arity, FnError, FunctionRegistry};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    // Trigonometric
    registry.register("SIN", |args| unary("SIN", args, f64::sin));
    registry.register("COS", |args| unary("COS", args, f64::cos));
    registry.register("TAN", |args| unary("TAN", args, f64::tan));
    registry.register("CTAN", |args| {
        let t = single("CTAN", args)?.tan();
        if t.abs() < 1e-10 {
            return Err(FnError::DivideByZero);
        }
        Ok(Value::Number(1.0 / t))
    });
    registry.register("SEC", |args| {
        let c = single("SEC", args)?.cos();
        if c == 0.0 {
            return Err(FnError::DivideByZero);
        }
        Ok(Value::Number(1.0 / c))
    });
    registry.register("CSEC", |args| {
        let s = single("CSEC", args)?.sin();
        if s == 0.0 {
            return Err(FnError::DivideByZero);
        }
        Ok(Value::Number(1.0 / s))
    });
    registry.register("ASIN", |args| {
        let x = single("ASIN", args)?;
        in_domain("ASIN", x, (-1.0..=1.0).contains(&x))?;
        Ok(Value::Number(x.asin()))
    });
    registry.register("ACOS", |args| {
        let x = single("ACOS", args)?;
        in_domain("ACOS", x, (-1.0..=1.0).contains(&x))?;
        Ok(Value::Number(x.acos()))
    });
    registry.register("ATAN", |args| unary("ATAN", args, f64::atan));
    registry.register("ATAN2", |args| binary("ATAN2", args, f64::atan2));
    registry.register("RAD", |args| unary("RAD", args, f64::to_radians));
    registry.register("DEG", |args| unary("DEG", args, f64::to_degrees));

    // Hyperbolic
    registry.register("SINH", |args| unary("SINH", args, f64::sinh));
    registry.register("COSH", |args| unary("COSH", args, f64::cosh));
    registry.register("TANH", |args| unary("TANH", args, f64::tanh));

    // Exponent and logarithm
    registry.register("EXP", |args| unary("EXP", args, f64::exp));
    registry.register("LOG", |args| {
        let x = single("LOG", args)?;
        in_domain("LOG", x, x > 0.0)?;
        Ok(Value::Number(x.ln()))
    });
    registry.register("LOG10", |args| {
        let x = single("LOG10", args)?;
        in_domain("LOG10", x, x > 0.0)?;
        Ok(Value::Number(x.log10()))
    });
    registry.register("LOG2", |args| {
        let x = single("LOG2", args)?;
        in_domain("LOG2", x, x > 0.0)?;
        Ok(Value::Number(x.log2()))
    });
    registry.register("SQRT", |args| {
        let x = single("SQRT", args)?;
        in_domain("SQRT", x, x >= 0.0)?;
        Ok(Value::Number(x.sqrt()))
    });
    registry.register("CBRT", |args| unary("CBRT", args, f64::cbrt));
    registry.register("POW", |args| binary("POW", args, f64::powf));

    // Rounding and sign
    registry.register("ABS", |args| unary("ABS", args, f64::abs));
    registry.register("CEIL", |args| unary("CEIL", args, f64::ceil));
    registry.register("FLOOR", |args| unary("FLOOR", args, f64::floor));
    registry.register("ROUND", |args| unary("ROUND", args, f64::round));
    registry.register("TRUNC", |args| unary("TRUNC", args, f64::trunc));
    registry.register("ROUNDTO", |args| {
        check_arity("ROUNDTO", args, 2, Some(2))?;
        let value = number_arg("ROUNDTO", &args[0])?;
        let places = number_arg("ROUNDTO", &args[1])?;
        let scale = 10f64.powf(places);
        Ok(Value::Number((value * scale).round() / scale))
    });
    registry.register("SIGN", |args| {
        let x = single("SIGN", args)?;
        let sign = if x > 0.0 {
            1.0
        } else if x < 0.0 {
            -1.0
        } else {
            0.0
        };
        Ok(Value::Number(sign))
    });
    registry.register("MIN", |args| {
        check_arity("MIN", args, 1, None)?;
        let values = collect_numbers("MIN", args)?;
        Ok(Value::Number(values.into_iter().fold(f64::INFINITY, f64::min)))
    });
    registry.register("MAX", |args| {
        check_arity("MAX", args, 1, None)?;
        let values = collect_numbers("MAX", args)?;
        Ok(Value::Number(values.into_iter().fold(f64::NEG_INFINITY, f64::max)))
    });
    registry.register("CLAMP", |args| {
        check_arity("CLAMP", args, 3, Some(3))?;
        let x = number_arg("CLAMP", &args[0])?;
        let lo = number_arg("CLAMP", &args[1])?;
        let hi = number_arg("CLAMP", &args[2])?;
        if lo > hi {
            return Err(FnError::Value("CLAMP: minimum exceeds maximum".to_string()));
        }
        Ok(Value::Number(x.clamp(lo, hi)))
    });
    registry.register("HYPOT", |args| binary("HYPOT", args, f64::hypot));

    // Integer helpers
    registry.register("MOD", |args| {
        check_arity("MOD", args, 2, Some(2))?;
        let a = number_arg("MOD", &args[0])?;
        let b = number_arg("MOD", &args[1])?;
        if b == 0.0 {
            return Err(FnError::DivideByZero);
        }
        Ok(Value::Number(a % b))
    });
    registry.register("FACTORIAL", |args| {
        check_arity("FACTORIAL", args, 1, Some(1))?;
        let n = int_arg("FACTORIAL", &args[0])?;
        if n < 0 {
            return Err(FnError::Value("FACTORIAL: negative argument".to_string()));
        }
        // Past 170! the result is infinite anyway
        let result = (2..=n.min(171)).fold(1.0, |acc, i| acc * i as f64);
        Ok(Value::Number(result))
    });
    registry.register("GCD", |args| {
        check_arity("GCD", args, 2, None)?;
        let mut acc = 0u64;
        for arg in args {
            acc = gcd(acc, int_arg("GCD", arg)?.unsigned_abs());
        }
        Ok(Value::Number(acc as f64))
    });
    registry.register("LCM", |args| {
        check_arity("LCM", args, 2, None)?;
        let mut acc = 1u64;
        for arg in args {
            let n = int_arg("LCM", arg)?.unsigned_abs();
            if n == 0 {
                return Ok(Value::Number(0.0));
            }
            acc = acc / gcd(acc, n) * n;
        }
        Ok(Value::Number(acc as f64))
    });

    // Constants
    registry.register("PI", |args| constant("PI", args, consts::PI));
    registry.register("E", |args| constant("E", args, consts::E));
}

fn single(name: &str, args: &[Value]) -> Result<f64, FnError> {
    check_arity(name, args, 1, Some(1))?;
    number_arg(name, &args[0])
}

fn unary(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, FnError> {
    Ok(Value::Number(f(single(name, args)?)))
}

fn binary(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, FnError> {
    check_arity(name, args, 2, Some(2))?;
    let a = number_arg(name, &args[0])?;
    let b = number_arg(name, &args[1])?;
    Ok(Value::Number(f(a, b)))
}

fn constant(name: &str, args: &[Value], value: f64) -> Result<Value, FnError> {
    check_arity(name, args, 0, Some(0))?;
    Ok(Value::Number(value))
}

fn in_domain(name: &str, x: f64, ok: bool) -> Result<(), FnError> {
    if ok {
        Ok(())
    } else {
        Err(FnError::Value(format!("{}: {} is outside the domain", name, x)))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[f64]) -> Result<Value, FnError> {
        let registry = FunctionRegistry::standard();
        let args: Vec<Value> = args.iter().map(|n| Value::Number(*n)).collect();
        registry.call(name, &args)
    }

    fn number(name: &str, args: &[f64]) -> f64 {
        match call(name, args).unwrap() {
            Value::Number(n) => n,
            other => panic!("{} returned {:?}", name, other),
        }
    }

    #[test]
    fn test_trig() {
        assert!((number("SIN", &[consts::FRAC_PI_2]) - 1.0).abs() < 1e-12);
        assert!((number("DEG", &[consts::PI]) - 180.0).abs() < 1e-9);
        assert_eq!(call("CTAN", &[0.0]), Err(FnError::DivideByZero));
        assert!(matches!(call("ASIN", &[2.0]), Err(FnError::Value(_))));
    }

    #[test]
    fn test_logs_and_roots() {
        assert_eq!(number("LOG10", &[1000.0]), 3.0);
        assert_eq!(number("LOG2", &[8.0]), 3.0);
        assert_eq!(number("SQRT", &[16.0]), 4.0);
        assert!(matches!(call("SQRT", &[-1.0]), Err(FnError::Value(_))));
        assert!(matches!(call("LOG", &[0.0]), Err(FnError::Value(_))));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(number("ROUND", &[2.5]), 3.0);
        assert_eq!(number("ROUNDTO", &[3.14159, 2.0]), 3.14);
        assert_eq!(number("TRUNC", &[-2.7]), -2.0);
        assert_eq!(number("SIGN", &[-4.0]), -1.0);
        assert_eq!(number("CLAMP", &[15.0, 0.0, 10.0]), 10.0);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(number("MIN", &[3.0, 1.0, 2.0]), 1.0);
        assert_eq!(number("MAX", &[3.0, 1.0, 2.0]), 3.0);
        assert!(matches!(call("MAX", &[]), Err(FnError::Argument(_))));
    }

    #[test]
    fn test_integer_helpers() {
        assert_eq!(number("MOD", &[10.0, 3.0]), 1.0);
        assert_eq!(call("MOD", &[1.0, 0.0]), Err(FnError::DivideByZero));
        assert_eq!(number("FACTORIAL", &[5.0]), 120.0);
        assert_eq!(number("FACTORIAL", &[0.0]), 1.0);
        assert_eq!(number("GCD", &[12.0, 18.0]), 6.0);
        assert_eq!(number("LCM", &[4.0, 6.0]), 12.0);
        assert_eq!(number("GCD", &[12.0, 18.0, 8.0]), 2.0);
    }

    #[test]
    fn test_constants_take_no_arguments() {
        assert_eq!(number("PI", &[]), consts::PI);
        assert_eq!(number("E", &[]), consts::E);
        assert!(matches!(call("PI", &[1.0]), Err(FnError::Argument(_))));
    }

    #[test]
    fn test_arity() {
        assert_eq!(
            call("SIN", &[]),
            Err(FnError::Argument("SIN requires exactly 1 argument".into()))
        );
    }
}
