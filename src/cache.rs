// Per-instance memo of converted fields. Never evicts; an entry is always the
// typed reading of the raw value currently stored under the same key.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::coerce::ValueCoercer;
use crate::error::Result;
use crate::schema::FieldDefinition;
use crate::value::TypedValue;

#[derive(Debug, Clone, Default)]
pub struct LazyFieldCache {
    converted: HashMap<String, TypedValue>,
}

impl LazyFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `def`, converting `raw[def.name]` on a miss.
    /// Absent or `null` raw values are not cached.
    pub fn get<'c>(
        &'c mut self,
        coercer: &ValueCoercer<'_>,
        raw: &Map<String, Value>,
        def: &FieldDefinition,
    ) -> Result<Option<&'c TypedValue>> {
        if !self.converted.contains_key(&def.name) {
            let Some(value) = coercer.read(raw.get(&def.name), def)? else {
                return Ok(None);
            };
            self.converted.insert(def.name.clone(), value);
        }
        Ok(self.converted.get(&def.name))
    }

    /// Encode `value`, store it in `raw` and cache it. Nothing is touched when
    /// the value does not fit `def`.
    ///
    /// Values holding nested instances move their maps into `raw` and are not
    /// cached; the next read wraps the stored maps again.
    pub fn set(
        &mut self,
        coercer: &ValueCoercer<'_>,
        raw: &mut Map<String, Value>,
        def: &FieldDefinition,
        value: TypedValue,
    ) -> Result<()> {
        let (encoded, cached) = if holds_instance(&value) {
            (coercer.write_owned(value, def)?, None)
        } else if def.ty.is_mixed() || matches!(value, TypedValue::Mixed(_)) {
            // cache exactly what a fresh read of the stored value gives
            let encoded = coercer.write(&value, def)?;
            let cached = coercer.read(Some(&encoded), def)?;
            (encoded, cached)
        } else {
            let encoded = coercer.write(&value, def)?;
            let cached = (!matches!(value, TypedValue::Null)).then_some(value);
            (encoded, cached)
        };
        raw.insert(def.name.clone(), encoded);
        match cached {
            Some(value) => self.converted.insert(def.name.clone(), value),
            None => self.converted.remove(&def.name),
        };
        Ok(())
    }

    pub fn invalidate(&mut self, name: &str) {
        self.converted.remove(name);
    }

    pub fn clear(&mut self) {
        self.converted.clear();
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.converted.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.converted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converted.is_empty()
    }
}

fn holds_instance(value: &TypedValue) -> bool {
    match value {
        TypedValue::Object(_) => true,
        TypedValue::Array(items) => items.iter().any(holds_instance),
        _ => false,
    }
}
