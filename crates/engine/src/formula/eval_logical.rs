// Logical functions: IF, IFS, AND, OR, NOT, XOR

use super::eval::Value;
use super::functions::{check_arity, FnError, FunctionRegistry};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register("IF", |args| {
        check_arity("IF", args, 3, Some(3))?;
        if args[0].to_bool()? {
            Ok(args[1].clone())
        } else {
            Ok(args[2].clone())
        }
    });
    // Condition/value pairs with an optional trailing default
    registry.register("IFS", |args| {
        check_arity("IFS", args, 2, None)?;
        for pair in args.chunks_exact(2) {
            if pair[0].to_bool()? {
                return Ok(pair[1].clone());
            }
        }
        if args.len() % 2 == 1 {
            return Ok(args[args.len() - 1].clone());
        }
        Err(FnError::Value("IFS: no condition matched".to_string()))
    });
    registry.register("AND", |args| {
        check_arity("AND", args, 2, None)?;
        for arg in args {
            if !arg.to_bool()? {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    });
    registry.register("OR", |args| {
        check_arity("OR", args, 2, None)?;
        for arg in args {
            if arg.to_bool()? {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    });
    registry.register("NOT", |args| {
        check_arity("NOT", args, 1, Some(1))?;
        Ok(Value::Boolean(!args[0].to_bool()?))
    });
    registry.register("XOR", |args| {
        check_arity("XOR", args, 2, None)?;
        let mut count = 0;
        for arg in args {
            if arg.to_bool()? {
                count += 1;
            }
        }
        Ok(Value::Boolean(count % 2 == 1))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, FnError> {
        FunctionRegistry::standard().call(name, &args)
    }

    const T: Value = Value::Boolean(true);
    const F: Value = Value::Boolean(false);

    #[test]
    fn test_if() {
        let a = Value::Text("a".into());
        let b = Value::Text("b".into());
        assert_eq!(call("IF", vec![T, a.clone(), b.clone()]), Ok(a.clone()));
        assert_eq!(call("IF", vec![Value::Number(0.0), a, b.clone()]), Ok(b));
        assert!(matches!(call("IF", vec![T, F]), Err(FnError::Argument(_))));
        assert!(matches!(
            call("IF", vec![Value::Text("maybe".into()), T, F]),
            Err(FnError::Value(_))
        ));
    }

    #[test]
    fn test_ifs() {
        let one = Value::Number(1.0);
        let two = Value::Number(2.0);
        assert_eq!(call("IFS", vec![F, one.clone(), T, two.clone()]), Ok(two.clone()));
        assert_eq!(call("IFS", vec![F, one.clone(), two.clone()]), Ok(two));
        assert!(matches!(call("IFS", vec![F, one]), Err(FnError::Value(_))));
    }

    #[test]
    fn test_boolean_ops() {
        assert_eq!(call("AND", vec![T, T]), Ok(T));
        assert_eq!(call("AND", vec![T, F]), Ok(F));
        assert_eq!(call("OR", vec![F, T]), Ok(T));
        assert_eq!(call("NOT", vec![F]), Ok(T));
        assert_eq!(call("XOR", vec![T, T, T]), Ok(T));
        assert_eq!(call("XOR", vec![T, T]), Ok(F));
    }
}
