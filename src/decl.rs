//! Class identities and raw class declarations.
//!
//! A declaration is what a class *says* about itself: its own properties, the
//! parent it extends and the classes it imports. Nothing here is resolved or
//! validated beyond the class name; that is the compiler's job.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::MapperError;
use crate::options::MapperOptions;

/// `a::b::Name`, each segment an identifier. A leading `::` marks an absolute reference.
static CLASS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(::)?[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("class path regex")
});

pub const PATH_SEP: &str = "::";

// ————————————————————————————————————————————————————————————————————————————
// CLASS IDENTITY
// ————————————————————————————————————————————————————————————————————————————

/// Fully-qualified class path, stored without a leading `::`.
///
/// Cheap to clone; compiled maps, reports and errors all key on it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(Arc<str>);

impl ClassId {
    /// Validate and normalize a fully-qualified class path.
    pub fn new(path: &str) -> Result<Self, MapperError> {
        if !is_class_path(path) {
            return Err(MapperError::InvalidClassName(path.to_string()));
        }
        Ok(Self(Arc::from(path.trim_start_matches(PATH_SEP))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything but the last segment; empty for classes in the global scope.
    pub fn namespace(&self) -> &str {
        match self.0.rfind(PATH_SEP) {
            Some(ix) => &self.0[..ix],
            None => "",
        }
    }

    pub fn short_name(&self) -> &str {
        match self.0.rfind(PATH_SEP) {
            Some(ix) => &self.0[ix + PATH_SEP.len()..],
            None => &self.0,
        }
    }

    /// Candidate identities for a reference written inside this class's declaration,
    /// in lookup order: namespace-relative first, then global.
    pub fn candidates_for(&self, reference: &str) -> Vec<String> {
        if let Some(absolute) = reference.strip_prefix(PATH_SEP) {
            return vec![absolute.to_string()];
        }
        let ns = self.namespace();
        if ns.is_empty() {
            vec![reference.to_string()]
        } else {
            vec![format!("{ns}{PATH_SEP}{reference}"), reference.to_string()]
        }
    }
}

pub fn is_class_path(s: &str) -> bool {
    CLASS_PATH.is_match(s)
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

/// One class as written by its author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// field name → type string, in declaration order
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
    pub fn import(mut self, class: impl Into<String>) -> Self {
        self.imports.push(class.into());
        self
    }
    pub fn property(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.properties.insert(name.into(), ty.into());
        self
    }
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Parent first, then imports in declared order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.extends.iter().map(String::as_str).chain(self.imports.iter().map(String::as_str))
    }
}

/// On-disk declaration file: `{ "options": {...}, "classes": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationFile {
    /// instance options for tools that build objects from this file
    #[serde(default)]
    pub options: MapperOptions,
    pub classes: Vec<ClassDecl>,
}

impl DeclarationFile {
    /// Parse a declaration file. Errors name the JSON path of the offending node.
    pub fn from_json_str(src: &str) -> Result<Self, String> {
        let de = &mut serde_json::Deserializer::from_str(src);
        serde_path_to_error::deserialize(de).map_err(|err| {
            let path = err.path().to_string();
            format!("at JSON path {path} → {}", err.into_inner())
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
