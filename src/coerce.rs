//! Raw ⇄ typed conversion for a single field.
//!
//! Rules, per array level then at the leaf:
//! - `null` stands in for any element or sub-array; a `null` field is "not present".
//! - every declared level must be an array.
//! - the leaf must match the scalar kind exactly (no int ⇄ float conversion),
//!   or be a map for object kinds; a leaf that is still an array is too deep.
//! - `mixed` leaves are passed through untouched, whatever their shape.
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::compiler::PropertyMapRegistry;
use crate::decl::ClassId;
use crate::error::{CoercionError, Result};
use crate::object::LazyObject;
use crate::options::MapperOptions;
use crate::schema::FieldDefinition;
use crate::types::{ScalarKind, TypeDescriptor, TypeKind};
use crate::value::TypedValue;

pub struct ValueCoercer<'r> {
    registry: &'r Arc<PropertyMapRegistry>,
    /// concrete class of the instance being read or written (named in errors)
    owner: &'r ClassId,
    options: MapperOptions,
}

impl<'r> ValueCoercer<'r> {
    pub fn new(registry: &'r Arc<PropertyMapRegistry>, owner: &'r ClassId, options: MapperOptions) -> Self {
        Self { registry, owner, options }
    }

    // ------------------------------- Read --------------------------------- //

    /// Typed view of `raw`; `None` when the field is absent or `null`.
    pub fn read(&self, raw: Option<&Value>, def: &FieldDefinition) -> Result<Option<TypedValue>> {
        let Some(raw) = raw.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        trace!(class = %self.owner, field = %def.name, ty = %def.ty, "lazy conversion");
        let mut path = String::new();
        self.read_level(raw, def, def.ty.array_depth, &mut path).map(Some)
    }

    fn read_level(&self, raw: &Value, def: &FieldDefinition, depth_left: u32, path: &mut String) -> Result<TypedValue> {
        if raw.is_null() {
            return Ok(TypedValue::Null);
        }
        if depth_left > 0 {
            let Value::Array(items) = raw else {
                return Err(self.mismatch(def, shape_of(raw), path).into());
            };
            let mut out = Vec::with_capacity(items.len());
            for (ix, item) in items.iter().enumerate() {
                let mark = push_index(path, ix);
                out.push(self.read_level(item, def, depth_left - 1, path)?);
                path.truncate(mark);
            }
            return Ok(TypedValue::Array(out));
        }
        match &def.ty.kind {
            TypeKind::Scalar(ScalarKind::Mixed) => Ok(TypedValue::Mixed(raw.clone())),
            TypeKind::Scalar(kind) => scalar_leaf(*kind, raw).map_err(|actual| self.mismatch(def, actual, path).into()),
            TypeKind::Object(class) => match raw {
                Value::Object(map) => {
                    let schema = self.registry.compile(class)?;
                    let obj = LazyObject::from_parts(Arc::clone(self.registry), schema, map.clone(), self.options);
                    Ok(TypedValue::Object(obj))
                }
                other => Err(self.mismatch(def, shape_of(other), path).into()),
            },
        }
    }

    // ------------------------------- Check -------------------------------- //

    /// Shape check without building anything. Object leaves only need to be maps;
    /// their contents are the analyzer's business.
    pub fn check(&self, raw: &Value, def: &FieldDefinition) -> Result<(), CoercionError> {
        let mut path = String::new();
        self.check_level(raw, def, def.ty.array_depth, &mut path)
    }

    fn check_level(
        &self,
        raw: &Value,
        def: &FieldDefinition,
        depth_left: u32,
        path: &mut String,
    ) -> Result<(), CoercionError> {
        if raw.is_null() {
            return Ok(());
        }
        if depth_left > 0 {
            let Value::Array(items) = raw else {
                return Err(self.mismatch(def, shape_of(raw), path));
            };
            for (ix, item) in items.iter().enumerate() {
                let mark = push_index(path, ix);
                self.check_level(item, def, depth_left - 1, path)?;
                path.truncate(mark);
            }
            return Ok(());
        }
        match &def.ty.kind {
            TypeKind::Scalar(ScalarKind::Mixed) => Ok(()),
            TypeKind::Scalar(kind) => scalar_leaf(*kind, raw)
                .map(drop)
                .map_err(|actual| self.mismatch(def, actual, path)),
            TypeKind::Object(_) if raw.is_object() => Ok(()),
            TypeKind::Object(_) => Err(self.mismatch(def, shape_of(raw), path)),
        }
    }

    // ------------------------------- Write -------------------------------- //

    /// Raw representation of `value` for `def`, validated against the declared type.
    pub fn write(&self, value: &TypedValue, def: &FieldDefinition) -> Result<Value> {
        let mut path = String::new();
        self.write_level(value, def, def.ty.array_depth, &mut path)
    }

    fn write_level(&self, value: &TypedValue, def: &FieldDefinition, depth_left: u32, path: &mut String) -> Result<Value> {
        match value {
            TypedValue::Null => return Ok(Value::Null),
            TypedValue::Mixed(raw) => {
                self.check_level(raw, def, depth_left, path)?;
                return Ok(raw.clone());
            }
            _ => {}
        }
        if depth_left > 0 {
            let TypedValue::Array(items) = value else {
                return Err(self.mismatch(def, typed_shape(value), path).into());
            };
            let mut out = Vec::with_capacity(items.len());
            for (ix, item) in items.iter().enumerate() {
                let mark = push_index(path, ix);
                out.push(self.write_level(item, def, depth_left - 1, path)?);
                path.truncate(mark);
            }
            return Ok(Value::Array(out));
        }
        match (&def.ty.kind, value) {
            (TypeKind::Scalar(ScalarKind::Mixed), any) => self.write_untyped(any, def, path),
            (TypeKind::Scalar(ScalarKind::Int), TypedValue::Int(i)) => Ok(Value::from(*i)),
            (TypeKind::Scalar(ScalarKind::Float), TypedValue::Float(f)) => self.write_float(*f, def, path),
            (TypeKind::Scalar(ScalarKind::String), TypedValue::String(s)) => Ok(Value::String(s.clone())),
            (TypeKind::Scalar(ScalarKind::Bool), TypedValue::Bool(b)) => Ok(Value::Bool(*b)),
            (TypeKind::Object(_), TypedValue::Object(obj)) if self.accepts_instance(obj, def) => {
                Ok(Value::Object(obj.raw().clone()))
            }
            (_, other) => Err(self.mismatch(def, typed_shape(other), path).into()),
        }
    }

    /// Same as [`write`](Self::write), but nested instances hand over their raw
    /// maps instead of being copied.
    pub fn write_owned(&self, value: TypedValue, def: &FieldDefinition) -> Result<Value> {
        let mut path = String::new();
        self.write_owned_level(value, def, def.ty.array_depth, &mut path)
    }

    fn write_owned_level(&self, value: TypedValue, def: &FieldDefinition, depth_left: u32, path: &mut String) -> Result<Value> {
        match value {
            TypedValue::Array(items) if depth_left > 0 => {
                let mut out = Vec::with_capacity(items.len());
                for (ix, item) in items.into_iter().enumerate() {
                    let mark = push_index(path, ix);
                    out.push(self.write_owned_level(item, def, depth_left - 1, path)?);
                    path.truncate(mark);
                }
                Ok(Value::Array(out))
            }
            TypedValue::Object(obj) if depth_left == 0 && self.accepts_instance(&obj, def) => {
                Ok(Value::Object(obj.into_raw()))
            }
            other => self.write_level(&other, def, depth_left, path),
        }
    }

    /// Leaf check for instances: the declared class or a subclass, or anything for `mixed`.
    fn accepts_instance(&self, obj: &LazyObject, def: &FieldDefinition) -> bool {
        match &def.ty.kind {
            TypeKind::Object(class) => self.registry.is_subclass_of(obj.class_id(), class),
            TypeKind::Scalar(kind) => *kind == ScalarKind::Mixed,
        }
    }

    /// Anything goes below a `mixed` leaf; only non-finite floats cannot be represented.
    fn write_untyped(&self, value: &TypedValue, def: &FieldDefinition, path: &mut String) -> Result<Value> {
        Ok(match value {
            TypedValue::Null => Value::Null,
            TypedValue::Bool(b) => Value::Bool(*b),
            TypedValue::Int(i) => Value::from(*i),
            TypedValue::Float(f) => self.write_float(*f, def, path)?,
            TypedValue::String(s) => Value::String(s.clone()),
            TypedValue::Mixed(raw) => raw.clone(),
            TypedValue::Object(obj) => Value::Object(obj.raw().clone()),
            TypedValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (ix, item) in items.iter().enumerate() {
                    let mark = push_index(path, ix);
                    out.push(self.write_untyped(item, def, path)?);
                    path.truncate(mark);
                }
                Value::Array(out)
            }
        })
    }

    fn write_float(&self, f: f64, def: &FieldDefinition, path: &str) -> Result<Value> {
        match serde_json::Number::from_f64(f) {
            Some(n) => Ok(Value::Number(n)),
            None => Err(self.mismatch(def, format!("non-finite float {f}"), path).into()),
        }
    }

    fn mismatch(&self, def: &FieldDefinition, actual: String, path: &str) -> CoercionError {
        CoercionError {
            class: self.owner.clone(),
            field: def.name.clone(),
            declared: def.ty.to_string(),
            actual,
            path: path.to_string(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHAPES
// ————————————————————————————————————————————————————————————————————————————

fn scalar_leaf(kind: ScalarKind, raw: &Value) -> Result<TypedValue, String> {
    match (kind, raw) {
        (ScalarKind::Int, Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(TypedValue::Int(i)),
            None if n.is_u64() => Err(format!("integer {n} (out of range for int)")),
            None => Err("float".to_string()),
        },
        (ScalarKind::Float, Value::Number(n)) if n.is_f64() => Ok(TypedValue::Float(n.as_f64().unwrap_or_default())),
        (ScalarKind::String, Value::String(s)) => Ok(TypedValue::String(s.clone())),
        (ScalarKind::Bool, Value::Bool(b)) => Ok(TypedValue::Bool(*b)),
        (ScalarKind::Mixed, other) => Ok(TypedValue::Mixed(other.clone())),
        (_, other) => Err(shape_of(other)),
    }
}

/// Nesting depth of a raw value: 0 for non-arrays, 1 + deepest element otherwise.
pub fn array_depth(raw: &Value) -> u32 {
    match raw {
        Value::Array(items) => 1 + items.iter().map(array_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Human-readable shape of a raw value, e.g. `integer`, `array of depth 2`.
pub fn shape_of(raw: &Value) -> String {
    match raw {
        Value::Null => "null".into(),
        Value::Bool(_) => "bool".into(),
        Value::Number(n) if n.is_f64() => "float".into(),
        Value::Number(_) => "integer".into(),
        Value::String(_) => "string".into(),
        Value::Object(_) => "object".into(),
        Value::Array(_) => format!("array of depth {}", array_depth(raw)),
    }
}

fn typed_shape(value: &TypedValue) -> String {
    match value {
        TypedValue::Null => "null".into(),
        TypedValue::Bool(_) => "bool".into(),
        TypedValue::Int(_) => "integer".into(),
        TypedValue::Float(_) => "float".into(),
        TypedValue::String(_) => "string".into(),
        TypedValue::Mixed(raw) => shape_of(raw),
        TypedValue::Object(obj) => format!("object `{}`", obj.class_id()),
        TypedValue::Array(_) => {
            fn depth(v: &TypedValue) -> u32 {
                match v {
                    TypedValue::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
                    TypedValue::Mixed(raw) => array_depth(raw),
                    _ => 0,
                }
            }
            format!("array of depth {}", depth(value))
        }
    }
}

fn push_index(path: &mut String, ix: usize) -> usize {
    let mark = path.len();
    let _ = write!(path, "[{ix}]");
    mark
}

/// Every map sitting at the declared leaf depth of an object-typed field, with its
/// element path. Only walks as deep as the data actually goes.
pub fn object_leaves<'v>(raw: &'v Value, ty: &TypeDescriptor) -> Vec<(String, &'v Map<String, Value>)> {
    fn walk<'v>(raw: &'v Value, depth_left: u32, path: &mut String, out: &mut Vec<(String, &'v Map<String, Value>)>) {
        match raw {
            Value::Array(items) if depth_left > 0 => {
                for (ix, item) in items.iter().enumerate() {
                    let mark = push_index(path, ix);
                    walk(item, depth_left - 1, path, out);
                    path.truncate(mark);
                }
            }
            Value::Object(map) if depth_left == 0 => out.push((path.clone(), map)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    if ty.is_object_type() {
        walk(raw, ty.array_depth, &mut String::new(), &mut out);
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
