//! Runtime values for the While interpreter.

use std::collections::BTreeMap;
use std::fmt;

/// A runtime value. Compound values own their contents outright; the
/// interpreter clones at every assignment, declaration and call boundary,
/// so two variables never share mutable state.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// 32-bit two's complement; arithmetic wraps.
    Int(i32),
    Char(char),
    Str(String),
    Array(Vec<Value>),
    /// Field map, ordered by field name so printing and equality are
    /// independent of construction order.
    Record(BTreeMap<String, Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "{}", c),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Char('c').to_string(), "c");
        assert_eq!(Value::Str("hi".into()), Value::Str("hi".into()));
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn records_print_in_field_name_order() {
        let mut fields = BTreeMap::new();
        fields.insert("y".to_string(), Value::Int(2));
        fields.insert("x".to_string(), Value::Int(1));
        assert_eq!(Value::Record(fields).to_string(), "{x:1,y:2}");
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::Array(vec![Value::Int(1), Value::Str("s".into())]);
        let b = Value::Array(vec![Value::Int(1), Value::Str("s".into())]);
        assert_eq!(a, b);

        let mut r1 = BTreeMap::new();
        r1.insert("x".to_string(), Value::Int(1));
        r1.insert("y".to_string(), Value::Int(2));
        let mut r2 = BTreeMap::new();
        r2.insert("y".to_string(), Value::Int(2));
        r2.insert("x".to_string(), Value::Int(1));
        assert_eq!(Value::Record(r1), Value::Record(r2));
    }
}
