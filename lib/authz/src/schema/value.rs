use std::fmt;

use graphql_parser::query::Text;
use indexmap::IndexMap;
use serde_json::Value;

/// A literal value as written in the schema (directive arguments, default values).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    List(Vec<ConstValue>),
    Object(IndexMap<String, ConstValue>),
}

impl ConstValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::String(s) | ConstValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConstValue]> {
        match self {
            ConstValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// JSON form of the literal; enum values become strings.
    pub fn to_json(&self) -> Value {
        match self {
            ConstValue::Null => Value::Null,
            ConstValue::Int(i) => Value::from(*i),
            ConstValue::Float(f) => Value::from(*f),
            ConstValue::String(s) | ConstValue::Enum(s) => Value::String(s.clone()),
            ConstValue::Boolean(b) => Value::Bool(*b),
            ConstValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConstValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl<'a, T: Text<'a>> From<&graphql_parser::query::Value<'a, T>> for ConstValue {
    fn from(value: &graphql_parser::query::Value<'a, T>) -> Self {
        use graphql_parser::query::Value as Ast;

        match value {
            // Variables cannot appear in schema literals.
            Ast::Variable(_) | Ast::Null => ConstValue::Null,
            Ast::Int(number) => number
                .as_i64()
                .map(ConstValue::Int)
                .unwrap_or(ConstValue::Null),
            Ast::Float(f) => ConstValue::Float(*f),
            Ast::String(s) => ConstValue::String(s.clone()),
            Ast::Boolean(b) => ConstValue::Boolean(*b),
            Ast::Enum(e) => ConstValue::Enum(e.as_ref().to_string()),
            Ast::List(items) => ConstValue::List(items.iter().map(ConstValue::from).collect()),
            Ast::Object(fields) => ConstValue::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.as_ref().to_string(), ConstValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => f.write_str("null"),
            ConstValue::Int(i) => write!(f, "{}", i),
            ConstValue::Float(v) => write!(f, "{:?}", v),
            ConstValue::String(s) => write!(f, "{:?}", s),
            ConstValue::Boolean(b) => write!(f, "{}", b),
            ConstValue::Enum(e) => f.write_str(e),
            ConstValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ConstValue::Object(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}
