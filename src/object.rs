//! Typed instances over raw JSON objects.
//!
//! A [`LazyObject`] owns its raw map and a [`LazyFieldCache`], and shares its
//! class's compiled [`SchemaMap`] with every other instance of the class. Fields
//! are converted on first read and written back through the same coercion rules.
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::accessor::{parse_accessor, Accessor, AccessorKind};
use crate::analysis::{ClassAnalysis, DataAnalyzer};
use crate::cache::LazyFieldCache;
use crate::coerce::{shape_of, ValueCoercer};
use crate::compiler::PropertyMapRegistry;
use crate::decl::ClassId;
use crate::error::{CoercionError, MapperError, Result};
use crate::options::{GatedOperation, MapperOptions};
use crate::schema::{FieldDefinition, FieldDescription, SchemaMap};
use crate::value::TypedValue;

#[derive(Clone)]
pub struct LazyObject {
    registry: Arc<PropertyMapRegistry>,
    schema: Arc<SchemaMap>,
    raw: Map<String, Value>,
    cache: LazyFieldCache,
    options: MapperOptions,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl LazyObject {
    pub fn new(registry: &Arc<PropertyMapRegistry>, class: &str, data: Value) -> Result<Self> {
        Self::with_options(registry, class, data, MapperOptions::default())
    }

    pub fn with_options(
        registry: &Arc<PropertyMapRegistry>,
        class: &str,
        data: Value,
        options: MapperOptions,
    ) -> Result<Self> {
        Self::for_class(registry, &ClassId::new(class)?, data, options)
    }

    /// Instance of `class` over `data`, which must be a JSON object.
    pub fn for_class(
        registry: &Arc<PropertyMapRegistry>,
        class: &ClassId,
        data: Value,
        options: MapperOptions,
    ) -> Result<Self> {
        let schema = registry.compile(class)?;
        let raw = match data {
            Value::Object(map) => map,
            other => {
                return Err(CoercionError {
                    class: class.clone(),
                    field: "<root>".to_string(),
                    declared: class.to_string(),
                    actual: shape_of(&other),
                    path: String::new(),
                }
                .into());
            }
        };
        let instance = Self::from_parts(Arc::clone(registry), schema, raw, options);
        if options.require_analysis {
            let report = instance.analyze();
            if report.has_problems() {
                return Err(MapperError::AnalysisFailed { class: class.clone(), report: Box::new(report) });
            }
        }
        Ok(instance)
    }

    /// Instance with no data at all.
    pub fn empty(registry: &Arc<PropertyMapRegistry>, class: &str) -> Result<Self> {
        Self::new(registry, class, Value::Object(Map::new()))
    }

    /// Nested instances skip the construction-time analysis; the enclosing
    /// instance already covered their data.
    pub(crate) fn from_parts(
        registry: Arc<PropertyMapRegistry>,
        schema: Arc<SchemaMap>,
        raw: Map<String, Value>,
        options: MapperOptions,
    ) -> Self {
        Self { registry, schema, raw, cache: LazyFieldCache::new(), options }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FIELD ACCESS
// ————————————————————————————————————————————————————————————————————————————

impl LazyObject {
    pub fn class_id(&self) -> &ClassId {
        self.schema.class_id()
    }

    pub fn schema(&self) -> &Arc<SchemaMap> {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<PropertyMapRegistry> {
        &self.registry
    }

    pub fn options(&self) -> MapperOptions {
        self.options
    }

    /// Typed value of `name`, converted on first access.
    ///
    /// `Ok(None)` means absent or `null`. Required fields fail instead with
    /// `RequiredFieldMissing`. Keys the map doesn't declare are returned as
    /// `Mixed` when present in the data, otherwise `UndefinedField`.
    pub fn get_field(&mut self, name: &str) -> Result<Option<&TypedValue>> {
        let coercer = ValueCoercer::new(&self.registry, self.schema.class_id(), self.options);
        match self.schema.get(name) {
            Some(def) => {
                if def.required && self.raw.get(name).is_none_or(Value::is_null) {
                    return Err(MapperError::RequiredFieldMissing {
                        class: self.schema.class_id().clone(),
                        field: name.to_string(),
                    });
                }
                self.cache.get(&coercer, &self.raw, def)
            }
            None if self.raw.contains_key(name) => {
                let def = FieldDefinition::untyped(name, self.schema.class_id());
                self.cache.get(&coercer, &self.raw, &def)
            }
            None => Err(self.undefined(name)),
        }
    }

    /// Owned copy of [`get_field`](Self::get_field).
    pub fn get_cloned(&mut self, name: &str) -> Result<Option<TypedValue>> {
        Ok(self.get_field(name)?.cloned())
    }

    /// Validate, write through to the raw map and cache `value`. On error the
    /// instance is left unchanged.
    pub fn set_field(&mut self, name: &str, value: impl Into<TypedValue>) -> Result<()> {
        let coercer = ValueCoercer::new(&self.registry, self.schema.class_id(), self.options);
        let untyped;
        let def = match self.schema.get(name) {
            Some(def) => def,
            None if self.options.allows(&GatedOperation::UndefinedWrite(name.to_string())) => {
                untyped = FieldDefinition::untyped(name, self.schema.class_id());
                &untyped
            }
            None => return Err(self.undefined(name)),
        };
        self.cache.set(&coercer, &mut self.raw, def, value.into())
    }

    /// Present and not `null`.
    pub fn has_field(&self, name: &str) -> bool {
        self.raw.get(name).is_some_and(|value| !value.is_null())
    }

    /// Present and truthy; see [`TypedValue::is_truthy`].
    pub fn is_field(&mut self, name: &str) -> Result<bool> {
        if !self.knows(name) {
            return Err(self.undefined(name));
        }
        if !self.has_field(name) {
            return Ok(false);
        }
        Ok(self.get_field(name)?.is_some_and(TypedValue::is_truthy))
    }

    pub fn unset_field(&mut self, name: &str) -> Result<()> {
        if !self.knows(name) {
            return Err(self.undefined(name));
        }
        self.raw.shift_remove(name);
        self.cache.invalidate(name);
        Ok(())
    }

    /// Read `name`, let `f` transform it, write the result back. This is how
    /// edits to nested objects reach the enclosing raw map.
    pub fn update_field<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(Option<TypedValue>) -> Result<TypedValue>,
    {
        let current = self.get_cloned(name)?;
        let next = f(current)?;
        self.set_field(name, next)
    }

    /// Whether `name` has been converted and cached.
    pub fn is_converted(&self, name: &str) -> bool {
        self.cache.is_cached(name)
    }

    fn knows(&self, name: &str) -> bool {
        self.schema.contains(name) || self.raw.contains_key(name)
    }

    fn undefined(&self, name: &str) -> MapperError {
        MapperError::UndefinedField { class: self.schema.class_id().clone(), field: name.to_string() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DYNAMIC ACCESS
// ————————————————————————————————————————————————————————————————————————————

impl LazyObject {
    /// `getFooBar()`-style dispatch. `FooBar` resolves to `foo_bar` or `fooBar`,
    /// whichever the map (then the data) knows; snake_case otherwise.
    ///
    /// `get` returns the value, `has`/`is` return a `Bool`, `set`/`unset` return `None`.
    pub fn call(&mut self, method: &str, arg: Option<TypedValue>) -> Result<Option<TypedValue>> {
        self.options.ensure(self.class_id(), GatedOperation::DynamicCall(method.to_string()))?;
        let accessor = parse_accessor(method);
        let Accessor::Recognized { kind, .. } = &accessor else {
            return Err(self.bad_call(method, "not an accessor name"));
        };
        let kind = *kind;
        let field = self.resolve_field(&accessor);

        match (kind, arg) {
            (AccessorKind::Set, Some(value)) => self.set_field(&field, value).map(|()| None),
            (AccessorKind::Set, None) => Err(self.bad_call(method, "setter needs a value")),
            (_, Some(_)) => Err(self.bad_call(method, "accessor takes no argument")),
            (AccessorKind::Get, None) => self.get_cloned(&field),
            (AccessorKind::Has, None) => Ok(Some(TypedValue::Bool(self.has_field(&field)))),
            (AccessorKind::Is, None) => self.is_field(&field).map(|b| Some(TypedValue::Bool(b))),
            (AccessorKind::Unset, None) => self.unset_field(&field).map(|()| None),
        }
    }

    fn resolve_field(&self, accessor: &Accessor) -> String {
        let candidates = accessor.field_candidates();
        candidates
            .iter()
            .find(|c| self.schema.contains(c))
            .or_else(|| candidates.iter().find(|c| self.raw.contains_key(c.as_str())))
            .or(candidates.first())
            .cloned()
            .unwrap_or_default()
    }

    fn bad_call(&self, method: &str, reason: &'static str) -> MapperError {
        MapperError::BadMethodCall { class: self.class_id().clone(), method: method.to_string(), reason }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DIAGNOSTICS & EXPORT
// ————————————————————————————————————————————————————————————————————————————

impl LazyObject {
    pub fn analyze(&self) -> ClassAnalysis {
        DataAnalyzer::new(&self.registry).analyze(self)
    }

    pub fn describe_schema(&self) -> Vec<FieldDescription> {
        self.schema.describe()
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    pub fn into_raw(self) -> Map<String, Value> {
        self.raw
    }

    pub fn to_json_string(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(&self.raw)
        } else {
            serde_json::to_string(&self.raw)
        }
    }
}

impl fmt::Debug for LazyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyObject")
            .field("class", self.class_id())
            .field("raw", &self.raw)
            .field("converted", &self.cache.len())
            .finish()
    }
}

/// Same class, same data. Caches and options don't take part.
impl PartialEq for LazyObject {
    fn eq(&self, other: &Self) -> bool {
        self.class_id() == other.class_id() && self.raw == other.raw
    }
}
