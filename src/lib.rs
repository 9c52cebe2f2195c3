//! Typed, inheritance-aware property maps over untyped JSON.
//!
//! Classes are declared with [`ClassDecl`] and registered in a
//! [`PropertyMapRegistry`], which compiles each class (parent + imports + own
//! fields) into a shared [`SchemaMap`] on first use. A [`LazyObject`] wraps a
//! raw JSON object and converts fields to [`TypedValue`]s only when touched.
pub mod accessor;
pub mod analysis;
pub mod cache;
pub mod coerce;
pub mod compiler;
pub mod decl;
pub mod error;
pub mod object;
pub mod options;
pub mod schema;
pub mod types;
pub mod value;

pub use accessor::{parse_accessor, Accessor, AccessorKind};
pub use analysis::{ClassAnalysis, DataAnalyzer};
pub use compiler::PropertyMapRegistry;
pub use decl::{ClassDecl, ClassId, DeclarationFile};
pub use error::{CoercionError, FieldProblem, MalformedTypeError, MapperError, Result};
pub use object::LazyObject;
pub use options::{GatedOperation, MapperOptions};
pub use schema::{FieldDefinition, FieldDescription, SchemaMap};
pub use types::{ScalarKind, TypeDescriptor, TypeKind};
pub use value::TypedValue;
