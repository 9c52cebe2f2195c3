//! Error taxonomy.
//!
//! Compilation errors (`MalformedType`, `CircularPropertyMap`, `BadPropertyMap`,
//! `UnknownClass`, `DependencyFailed`) are cached per class by the registry. Value errors
//! (`Coercion`, `RequiredFieldMissing`, `UndefinedField`) are raised per call.
use thiserror::Error;

use crate::analysis::ClassAnalysis;
use crate::decl::ClassId;
use crate::types::TypeParseFailure;

pub type Result<T, E = MapperError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapperError {
    #[error(transparent)]
    MalformedType(#[from] MalformedTypeError),

    #[error("circular property map import between `{class_a}` and `{class_b}` (chain: {})", join_ids(.chain))]
    CircularPropertyMap {
        class_a: ClassId,
        class_b: ClassId,
        /// walk from the class being compiled down to the repeated class
        chain: Vec<ClassId>,
    },

    #[error("bad property map for `{class}`: {}", join_problems(.problems))]
    BadPropertyMap { class: ClassId, problems: Vec<FieldProblem> },

    #[error("`{class}` depends on `{dependency}`, which failed: {cause}")]
    DependencyFailed { class: ClassId, dependency: ClassId, cause: Box<MapperError> },

    #[error("`{referenced_by}` refers to unknown class `{reference}`")]
    UnknownClass { reference: String, referenced_by: ClassId },

    #[error("class `{0}` is already registered")]
    DuplicateClass(ClassId),

    #[error("invalid class name `{0}`")]
    InvalidClassName(String),

    #[error("class `{0}` is not registered")]
    NotRegistered(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("required field `{field}` of `{class}` is missing")]
    RequiredFieldMissing { class: ClassId, field: String },

    #[error("`{class}` has no field `{field}`")]
    UndefinedField { class: ClassId, field: String },

    #[error("`{class}` cannot dispatch `{method}`: {reason}")]
    BadMethodCall { class: ClassId, method: String, reason: &'static str },

    #[error("{operation} on `{class}` is not allowed: option `{option}` is disabled")]
    UserOption { class: ClassId, option: &'static str, operation: String },

    #[error("strict analysis of `{class}` failed: {}", .report.summaries().join("; "))]
    AnalysisFailed { class: ClassId, report: Box<ClassAnalysis> },
}

impl MapperError {
    /// Errors that make a class unusable until its declaration is fixed.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            MapperError::MalformedType(_)
                | MapperError::CircularPropertyMap { .. }
                | MapperError::BadPropertyMap { .. }
                | MapperError::UnknownClass { .. }
                | MapperError::DependencyFailed { .. }
        )
    }

    /// Classes named by this error, for tooling. A failed dependency lists the
    /// whole chain, from the class being compiled down to the one at fault.
    pub fn classes(&self) -> Vec<&ClassId> {
        match self {
            MapperError::DependencyFailed { class, dependency, cause } => {
                let mut chain = vec![class];
                let below = cause.classes();
                if !below.contains(&dependency) {
                    chain.push(dependency);
                }
                chain.extend(below);
                chain
            }
            MapperError::MalformedType(e) => vec![&e.class],
            MapperError::CircularPropertyMap { class_a, class_b, .. } => vec![class_a, class_b],
            MapperError::BadPropertyMap { class, .. }
            | MapperError::UnknownClass { referenced_by: class, .. }
            | MapperError::DuplicateClass(class)
            | MapperError::RequiredFieldMissing { class, .. }
            | MapperError::UndefinedField { class, .. }
            | MapperError::BadMethodCall { class, .. }
            | MapperError::UserOption { class, .. }
            | MapperError::AnalysisFailed { class, .. } => vec![class],
            MapperError::Coercion(e) => vec![&e.class],
            MapperError::InvalidClassName(_) | MapperError::NotRegistered(_) => Vec::new(),
        }
    }
}

/// A type string that failed to parse inside a class declaration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("`{class}` field `{field}` has malformed type `{type_string}`: {reason}")]
pub struct MalformedTypeError {
    pub class: ClassId,
    pub field: String,
    pub type_string: String,
    pub reason: TypeParseFailure,
}

/// One field-level problem inside a class's own declarations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldProblem {
    #[error(transparent)]
    MalformedType(#[from] MalformedTypeError),
    #[error("`{field}` is listed as required but never declared")]
    UndeclaredRequired { field: String },
    #[error("empty field name")]
    EmptyName,
}

/// A value whose shape does not match its field definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{class}` field `{field}`: expected `{declared}`, found {actual}{}", at_path(.field, .path))]
pub struct CoercionError {
    pub class: ClassId,
    pub field: String,
    /// declared type string, e.g. `int[][]`
    pub declared: String,
    /// shape found at the failing location
    pub actual: String,
    /// element path below the field, e.g. `[1][0]`; empty at the top level
    pub path: String,
}

fn at_path(field: &str, path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at `{field}{path}`")
    }
}

fn join_ids(ids: &[ClassId]) -> String {
    ids.iter().map(ClassId::as_str).collect::<Vec<_>>().join(" -> ")
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_message_names_field_types_and_path() {
        let err = CoercionError {
            class: ClassId::new("app::Grid").unwrap(),
            field: "cells".into(),
            declared: "int[][]".into(),
            actual: "integer".into(),
            path: "[0]".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("app::Grid"));
        assert!(msg.contains("int[][]"));
        assert!(msg.contains("`cells[0]`"), "{msg}");
    }

    #[test]
    fn circular_message_shows_chain() {
        let a = ClassId::new("A").unwrap();
        let b = ClassId::new("B").unwrap();
        let err = MapperError::CircularPropertyMap {
            class_a: b.clone(),
            class_b: a.clone(),
            chain: vec![a.clone(), b.clone(), a.clone()],
        };
        assert!(err.to_string().contains("A -> B -> A"));
        assert!(err.is_compile_error());
        assert_eq!(err.classes(), vec![&b, &a]);
    }

    #[test]
    fn dependency_failure_names_every_class_on_the_chain() {
        let id = |s: &str| ClassId::new(s).unwrap();
        let err = MapperError::DependencyFailed {
            class: id("D"),
            dependency: id("C"),
            cause: Box::new(MapperError::UnknownClass { reference: "Nobody".into(), referenced_by: id("C") }),
        };
        assert_eq!(err.classes(), vec![&id("D"), &id("C")]);
        let msg = err.to_string();
        assert!(msg.starts_with("`D` depends on `C`"), "{msg}");
        assert!(msg.contains("unknown class `Nobody`"), "{msg}");
        assert!(err.is_compile_error());
    }
}
