use serde::{Serialize, Serializer};
use std::fmt;

/// A typed value bound in the environment or emitted in the output.
///
/// Literal parsing only ever produces `Integer`, `Text` and `List`.
/// `Float` and `Boolean` come out of expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type as shown in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::Boolean(_) => "bool",
            Value::Text(_) => "str",
            Value::List(_) => "list",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Falsy values: `0`, `0.0`, `False`, `""` and `[]`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Boolean(b) => *b,
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items),
        }
    }
}

/// Renders values the way they are written inside an expression, so error
/// messages quote strings and bracket lists.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_expression_syntax() {
        let v = Value::List(vec![
            Value::Integer(1),
            Value::Text("a".into()),
            Value::Float(2.0),
            Value::Boolean(false),
        ]);
        assert_eq!(v.to_string(), r#"[1, "a", 2.0, False]"#);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::List(vec![Value::Integer(0)]).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
    }

    #[test]
    fn serializes_untagged() {
        let v = Value::List(vec![Value::Integer(3), Value::Text("x".into())]);
        assert_eq!(serde_json::to_value(&v).unwrap(), serde_json::json!([3, "x"]));
    }
}
