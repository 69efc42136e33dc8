use std::fmt;

use serde::Serialize;

/// A value read from a record or produced by the VM.
///
/// # Type Preservation
///
/// Integers and floats stay distinct:
/// - Arithmetic on two integers yields an integer when the result is whole
/// - Mixed integer/float arithmetic goes through `rust_decimal` and yields an
///   integer when the exact result is whole
///
/// # Examples
///
/// ```
/// use rowql::Value;
///
/// assert_eq!(Value::from_field("42"), Value::Integer(42));
/// assert_eq!(Value::from_field("4.5"), Value::Float(4.5));
/// assert_eq!(Value::from_field("true"), Value::Boolean(true));
/// assert_eq!(Value::from_field(""), Value::Null);
/// assert_eq!(Value::from_field("NL"), Value::String("NL".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,

    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),
}

impl Value {
    /// Interprets the text of a record field.
    pub fn from_field(text: &str) -> Value {
        if text.is_empty() {
            return Value::Null;
        }
        if let Ok(n) = text.parse::<i64>() {
            return Value::Integer(n);
        }
        // f64 parsing also accepts "inf" and "NaN"; those stay strings.
        if looks_numeric(text)
            && let Ok(n) = text.parse::<f64>()
        {
            return Value::Float(n);
        }
        match text {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::String(text.to_string()),
        }
    }

    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n > 0.0,
            Integer(n) => *n > 0,
            String(s) => !s.is_empty(),
        }
    }

    /// Convert to boolean for conditions
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            _ => self.is_truthy(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string (concatenation). Null becomes the empty string.
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Float(n) => write!(f, "{}", n),
            Value::Integer(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

fn looks_numeric(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_field_keeps_words() {
        assert_eq!(Value::from_field("inf"), Value::String("inf".into()));
        assert_eq!(Value::from_field("NaN"), Value::String("NaN".into()));
        assert_eq!(Value::from_field("1e3"), Value::Float(1000.0));
        assert_eq!(Value::from_field("-7"), Value::Integer(-7));
    }

    #[test]
    fn test_serialize_untagged() {
        let values = vec![
            Value::Null,
            Value::Boolean(true),
            Value::Integer(3),
            Value::Float(1.5),
            Value::from("x"),
        ];
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"[null,true,3,1.5,"x"]"#
        );
    }
}
