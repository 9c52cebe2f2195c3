// Compiled property maps. Built once per class by the compiler, never mutated after.

use indexmap::IndexMap;
use serde::Serialize;

use crate::decl::ClassId;
use crate::types::TypeDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeDescriptor,
    pub required: bool,
    /// class whose own declaration introduced this field
    pub declared_in: ClassId,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor, declared_in: ClassId) -> Self {
        Self { name: name.into(), ty, required: false, declared_in }
    }

    /// Stand-in definition for keys present in data but absent from the map.
    pub fn untyped(name: &str, declared_in: &ClassId) -> Self {
        Self::new(name, TypeDescriptor::mixed(), declared_in.clone())
    }
}

/// One row of `describe_schema`, for documentation tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_string: String,
    pub required: bool,
    pub declared_in: ClassId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMap {
    class: ClassId,
    fields: IndexMap<String, FieldDefinition>, // resolution order
}

impl SchemaMap {
    pub(crate) fn new(class: ClassId, fields: IndexMap<String, FieldDefinition>) -> Self {
        Self { class, fields }
    }

    pub fn class_id(&self) -> &ClassId {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values().filter(|f| f.required)
    }

    pub(crate) fn field_map(&self) -> &IndexMap<String, FieldDefinition> {
        &self.fields
    }

    pub fn describe(&self) -> Vec<FieldDescription> {
        self.fields
            .values()
            .map(|f| FieldDescription {
                name: f.name.clone(),
                type_string: f.ty.to_string(),
                required: f.required,
                declared_in: f.declared_in.clone(),
            })
            .collect()
    }
}
