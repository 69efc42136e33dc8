//! The function registry.
//!
//! Functions are plain `fn` pointers over evaluated arguments. Arity is
//! checked when a program is compiled, so a function body may index its
//! arguments up to the declared minimum.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::value::Value;

pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

#[derive(Debug, Clone, Copy)]
pub struct Function {
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
    pub call: NativeFn,
}

impl Function {
    pub fn exact(args: usize, call: NativeFn) -> Self {
        Function {
            min_args: args,
            max_args: Some(args),
            call,
        }
    }

    pub fn range(min_args: usize, max_args: usize, call: NativeFn) -> Self {
        Function {
            min_args,
            max_args: Some(max_args),
            call,
        }
    }

    pub fn variadic(min_args: usize, call: NativeFn) -> Self {
        Function {
            min_args,
            max_args: None,
            call,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }

    /// Describes the accepted argument count, e.g. `1`, `1 to 2`, `at least 1`.
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

/// Functions callable from programs, by lowercase name.
#[derive(Debug, Clone, Default)]
pub struct Functions {
    functions: HashMap<String, Function>,
}

impl Functions {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in functions.
    pub fn builtin() -> Self {
        let mut functions = Self::new();
        functions.register("upper", Function::exact(1, upper));
        functions.register("lower", Function::exact(1, lower));
        functions.register("trim", Function::exact(1, trim));
        functions.register("length", Function::exact(1, length));
        functions.register("concat", Function::variadic(1, concat));
        functions.register("contains", Function::exact(2, contains));
        functions.register("startswith", Function::exact(2, startswith));
        functions.register("endswith", Function::exact(2, endswith));
        functions.register("matches", Function::exact(2, matches));
        functions.register("coalesce", Function::variadic(1, coalesce));
        functions.register("abs", Function::exact(1, abs));
        functions.register("round", Function::range(1, 2, round));
        functions.register("type", Function::exact(1, type_of));
        functions
    }

    /// Adds or replaces a function.
    pub fn register(&mut self, name: &str, function: Function) {
        self.functions.insert(name.to_lowercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ========================================
// String Functions
// ========================================

fn string_arg<'v>(value: &'v Value, position: &str) -> Result<Option<&'v str>, String> {
    match value {
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => Err(format!(
            "{} argument must be string, got {}",
            position,
            other.type_name()
        )),
    }
}

fn map_string(value: &Value, f: impl Fn(&str) -> String) -> Result<Value, String> {
    Ok(match string_arg(value, "first")? {
        Some(s) => Value::String(f(s)),
        None => Value::Null,
    })
}

fn upper(args: &[Value]) -> Result<Value, String> {
    map_string(&args[0], str::to_uppercase)
}

fn lower(args: &[Value]) -> Result<Value, String> {
    map_string(&args[0], str::to_lowercase)
}

fn trim(args: &[Value]) -> Result<Value, String> {
    map_string(&args[0], |s| s.trim().to_string())
}

fn length(args: &[Value]) -> Result<Value, String> {
    let count = string_arg(&args[0], "first")?.map_or(0, |s| s.chars().count());
    Ok(Value::Integer(count as i64))
}

fn concat(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(args.iter().map(Value::as_string).collect()))
}

fn test_strings(args: &[Value], test: impl Fn(&str, &str) -> bool) -> Result<Value, String> {
    let haystack = string_arg(&args[0], "first")?;
    let needle = string_arg(&args[1], "second")?;
    Ok(match (haystack, needle) {
        (Some(h), Some(n)) => Value::Boolean(test(h, n)),
        _ => Value::Boolean(false),
    })
}

fn contains(args: &[Value]) -> Result<Value, String> {
    test_strings(args, |h, n| h.contains(n))
}

fn startswith(args: &[Value]) -> Result<Value, String> {
    test_strings(args, |h, n| h.starts_with(n))
}

fn endswith(args: &[Value]) -> Result<Value, String> {
    test_strings(args, |h, n| h.ends_with(n))
}

fn matches(args: &[Value]) -> Result<Value, String> {
    let Some(pattern) = string_arg(&args[1], "pattern")? else {
        return Err("pattern must not be null".to_string());
    };
    let re = regex::Regex::new(pattern).map_err(|e| format!("invalid regex: {e}"))?;
    match &args[0] {
        Value::String(s) => Ok(Value::Boolean(re.is_match(s))),
        _ => Ok(Value::Boolean(false)),
    }
}

// ========================================
// Other Functions
// ========================================

fn coalesce(args: &[Value]) -> Result<Value, String> {
    Ok(args
        .iter()
        .find(|v| **v != Value::Null)
        .cloned()
        .unwrap_or(Value::Null))
}

fn abs(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Integer(n) => n
            .checked_abs()
            .map(Value::Integer)
            .ok_or_else(|| "integer overflow".to_string()),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        Value::Null => Ok(Value::Null),
        other => Err(format!("requires a number, got {}", other.type_name())),
    }
}

/// round(x) returns an integer; round(x, digits) keeps `digits` decimals.
fn round(args: &[Value]) -> Result<Value, String> {
    let digits = match args.get(1) {
        None => 0,
        Some(Value::Integer(d)) if (0..=28).contains(d) => *d as u32,
        Some(other) => return Err(format!("invalid digit count {}", other)),
    };
    match &args[0] {
        Value::Integer(n) => Ok(Value::Integer(*n)),
        Value::Float(n) => {
            let rounded = Decimal::from_f64(*n)
                .ok_or_else(|| format!("cannot round {}", n))?
                .round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
            if digits == 0
                && let Some(i) = rounded.to_i64()
            {
                return Ok(Value::Integer(i));
            }
            rounded
                .to_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("cannot round {}", n))
        }
        Value::Null => Ok(Value::Null),
        other => Err(format!("requires a number, got {}", other.type_name())),
    }
}

fn type_of(args: &[Value]) -> Result<Value, String> {
    let name = match &args[0] {
        Value::Integer(_) | Value::Float(_) => "number",
        other => other.type_name(),
    };
    Ok(Value::String(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        let functions = Functions::builtin();
        let function = functions.get(name).unwrap();
        assert!(function.accepts(args.len()));
        (function.call)(args)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("upper", &["ab".into()]).unwrap(), Value::from("AB"));
        assert_eq!(call("trim", &[" x ".into()]).unwrap(), Value::from("x"));
        assert_eq!(call("length", &["héllo".into()]).unwrap(), Value::Integer(5));
        assert_eq!(call("upper", &[Value::Null]).unwrap(), Value::Null);
        assert!(call("upper", &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_concat_and_coalesce() {
        assert_eq!(
            call("concat", &["a".into(), Value::Integer(1), Value::Null]).unwrap(),
            Value::from("a1")
        );
        assert_eq!(
            call("coalesce", &[Value::Null, "b".into(), "c".into()]).unwrap(),
            Value::from("b")
        );
    }

    #[test]
    fn test_round() {
        assert_eq!(call("round", &[Value::Float(2.5)]).unwrap(), Value::Integer(3));
        assert_eq!(
            call("round", &[Value::Float(3.14159), Value::Integer(2)]).unwrap(),
            Value::Float(3.14)
        );
    }

    #[test]
    fn test_matches() {
        assert_eq!(
            call("matches", &["abc123".into(), "^[a-z]+\\d+$".into()]).unwrap(),
            Value::Boolean(true)
        );
        assert!(call("matches", &["x".into(), "(".into()]).is_err());
    }

    #[test]
    fn test_arity() {
        let functions = Functions::builtin();
        assert_eq!(functions.get("round").unwrap().arity(), "1 to 2");
        assert_eq!(functions.get("concat").unwrap().arity(), "at least 1");
        assert!(!functions.get("upper").unwrap().accepts(2));
        assert!(functions.contains("UPPER"));
    }
}
