// Typed values handed out by field reads and accepted by field writes.

use serde_json::Value;

use crate::object::LazyObject;

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// `null` inside an array (a `null` field reads as "not present")
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// untyped data, passed through unchanged
    Mixed(Value),
    Object(LazyObject),
    Array(Vec<TypedValue>),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null | TypedValue::Mixed(Value::Null))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            TypedValue::Mixed(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            TypedValue::Mixed(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float(f) => Some(*f),
            TypedValue::Mixed(v) if v.is_f64() => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            TypedValue::Mixed(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&LazyObject> {
        match self {
            TypedValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut LazyObject> {
        match self {
            TypedValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<LazyObject> {
        match self {
            TypedValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TypedValue]> {
        match self {
            TypedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<TypedValue>> {
        match self {
            TypedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mixed(&self) -> Option<&Value> {
        match self {
            TypedValue::Mixed(v) => Some(v),
            _ => None,
        }
    }

    /// Loose truthiness: null, `false`, `0`, `0.0`, `""`, `"0"`, empty arrays and
    /// empty untyped maps are false. A nested instance is always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            TypedValue::Null => false,
            TypedValue::Bool(b) => *b,
            TypedValue::Int(i) => *i != 0,
            TypedValue::Float(f) => *f != 0.0,
            TypedValue::String(s) => !s.is_empty() && s != "0",
            TypedValue::Mixed(v) => raw_is_truthy(v),
            TypedValue::Object(_) => true,
            TypedValue::Array(items) => !items.is_empty(),
        }
    }
}

pub fn raw_is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// -------------------------------- From ------------------------------------ //

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Bool(b)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::Int(i)
    }
}

impl From<i32> for TypedValue {
    fn from(i: i32) -> Self {
        TypedValue::Int(i.into())
    }
}

impl From<f64> for TypedValue {
    fn from(f: f64) -> Self {
        TypedValue::Float(f)
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<LazyObject> for TypedValue {
    fn from(obj: LazyObject) -> Self {
        TypedValue::Object(obj)
    }
}

impl From<Value> for TypedValue {
    fn from(v: Value) -> Self {
        TypedValue::Mixed(v)
    }
}

impl<T: Into<TypedValue>> From<Vec<T>> for TypedValue {
    fn from(items: Vec<T>) -> Self {
        TypedValue::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_loose_rules() {
        let falsy: Vec<TypedValue> = vec![
            TypedValue::Null,
            false.into(),
            0i64.into(),
            0.0f64.into(),
            "".into(),
            "0".into(),
            TypedValue::Array(Vec::new()),
            json!({}).into(),
            json!([]).into(),
        ];
        for v in &falsy {
            assert!(!v.is_truthy(), "{v:?} should be falsy");
        }
        let truthy: Vec<TypedValue> = vec![true.into(), 7i64.into(), 0.5f64.into(), "no".into(), vec![0i64].into()];
        for v in &truthy {
            assert!(v.is_truthy(), "{v:?} should be truthy");
        }
    }

    #[test]
    fn nested_vecs_become_nested_arrays() {
        let v: TypedValue = vec![vec![1i64, 2], vec![3]].into();
        let outer = v.as_array().unwrap();
        assert_eq!(outer.len(), 2);
        assert_eq!(outer[0].as_array().unwrap()[1].as_i64(), Some(2));
    }
}
