//! Field type descriptors: `int`, `string[]`, `app::Address[][]`, ...
//!
//! A type string is a base token followed by zero or more `[]` suffixes, one per
//! array level. Class tokens are resolved while parsing (by the caller-supplied
//! resolver), so a descriptor never holds an unresolved reference.
use std::fmt;

use thiserror::Error;

use crate::decl::{self, ClassId};

const ARRAY_SUFFIX: &str = "[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Float,
    String,
    Bool,
    /// untyped passthrough: scalar, array or map, never coerced
    Mixed,
}

impl ScalarKind {
    pub fn token(self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::Mixed => "mixed",
        }
    }

    /// Canonical tokens plus the long-form aliases. `""` is untyped.
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "int" | "integer" => ScalarKind::Int,
            "float" | "double" => ScalarKind::Float,
            "string" => ScalarKind::String,
            "bool" | "boolean" => ScalarKind::Bool,
            "mixed" | "" => ScalarKind::Mixed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar(ScalarKind),
    Object(ClassId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    /// 0 = a single leaf value; n = leaf nested n arrays deep
    pub array_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseFailure {
    #[error("unknown base type `{0}`")]
    UnknownToken(String),
    #[error("`{0}` does not resolve to a registered class")]
    UnresolvedClass(String),
    #[error("inconsistent array brackets in `{0}`")]
    BadBrackets(String),
}

impl TypeDescriptor {
    pub fn scalar(kind: ScalarKind, array_depth: u32) -> Self {
        Self { kind: TypeKind::Scalar(kind), array_depth }
    }

    pub fn object(class: ClassId, array_depth: u32) -> Self {
        Self { kind: TypeKind::Object(class), array_depth }
    }

    pub fn mixed() -> Self {
        Self::scalar(ScalarKind::Mixed, 0)
    }

    /// Parse a type string. `resolve` maps a class token (absolute or relative)
    /// to a registered class, or `None` when nothing matches.
    pub fn parse(
        type_string: &str,
        resolve: impl Fn(&str) -> Option<ClassId>,
    ) -> Result<Self, TypeParseFailure> {
        let (base, suffix) = match type_string.find('[') {
            Some(ix) => type_string.split_at(ix),
            None => (type_string, ""),
        };
        if base.contains(']') || suffix.len() % ARRAY_SUFFIX.len() != 0 {
            return Err(TypeParseFailure::BadBrackets(type_string.to_string()));
        }
        let mut array_depth = 0u32;
        let mut rest = suffix;
        while !rest.is_empty() {
            rest = rest
                .strip_prefix(ARRAY_SUFFIX)
                .ok_or_else(|| TypeParseFailure::BadBrackets(type_string.to_string()))?;
            array_depth += 1;
        }
        if base.is_empty() && array_depth > 0 {
            return Err(TypeParseFailure::UnknownToken(base.to_string()));
        }

        if let Some(kind) = ScalarKind::from_token(base) {
            return Ok(Self::scalar(kind, array_depth));
        }
        if !decl::is_class_path(base) {
            return Err(TypeParseFailure::UnknownToken(base.to_string()));
        }
        match resolve(base) {
            Some(class) => Ok(Self::object(class, array_depth)),
            None => Err(TypeParseFailure::UnresolvedClass(base.to_string())),
        }
    }

    pub fn is_object_type(&self) -> bool {
        matches!(self.kind, TypeKind::Object(_))
    }

    pub fn is_mixed(&self) -> bool {
        self.kind == TypeKind::Scalar(ScalarKind::Mixed)
    }

    pub fn object_class(&self) -> Option<&ClassId> {
        match &self.kind {
            TypeKind::Object(class) => Some(class),
            TypeKind::Scalar(_) => None,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Scalar(kind) => f.write_str(kind.token()),
            TypeKind::Object(class) => write!(f, "{class}"),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for _ in 0..self.array_depth {
            f.write_str(ARRAY_SUFFIX)?;
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn no_classes(_: &str) -> Option<ClassId> {
        None
    }

    fn only_address(token: &str) -> Option<ClassId> {
        (token == "Address").then(|| ClassId::new("app::Address").unwrap())
    }

    #[test]
    fn scalars_and_depth() {
        let t = TypeDescriptor::parse("int[][]", no_classes).unwrap();
        assert_eq!(t, TypeDescriptor::scalar(ScalarKind::Int, 2));
        assert_eq!(t.to_string(), "int[][]");

        let t = TypeDescriptor::parse("string", no_classes).unwrap();
        assert_eq!(t.array_depth, 0);
        assert!(!t.is_object_type());
    }

    #[test]
    fn aliases_normalize_on_display() {
        let t = TypeDescriptor::parse("integer[]", no_classes).unwrap();
        assert_eq!(t.to_string(), "int[]");
        assert_eq!(TypeDescriptor::parse("double", no_classes).unwrap().to_string(), "float");
        assert_eq!(TypeDescriptor::parse("boolean", no_classes).unwrap().to_string(), "bool");
    }

    #[test]
    fn empty_string_is_untyped() {
        let t = TypeDescriptor::parse("", no_classes).unwrap();
        assert!(t.is_mixed());
        assert_eq!(t.to_string(), "mixed");
    }

    #[test]
    fn class_tokens_go_through_resolver() {
        let t = TypeDescriptor::parse("Address[]", only_address).unwrap();
        assert!(t.is_object_type());
        assert_eq!(t.object_class().unwrap().as_str(), "app::Address");
        assert_eq!(t.to_string(), "app::Address[]");

        assert_eq!(
            TypeDescriptor::parse("Phone", only_address),
            Err(TypeParseFailure::UnresolvedClass("Phone".into()))
        );
    }

    #[test]
    fn bracket_syntax_errors() {
        for bad in ["int[", "int]", "int[]]", "int[][", "int[x]", "int[] []", "in]t[]"] {
            assert!(
                matches!(TypeDescriptor::parse(bad, no_classes), Err(TypeParseFailure::BadBrackets(_))),
                "{bad:?} should be a bracket error"
            );
        }
    }

    #[test]
    fn unknown_tokens() {
        for bad in ["in t", "int?", "[]", "a::", "9lives"] {
            assert!(
                matches!(TypeDescriptor::parse(bad, no_classes), Err(TypeParseFailure::UnknownToken(_))),
                "{bad:?} should be an unknown token"
            );
        }
    }
}
