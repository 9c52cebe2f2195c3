//! Read-only diagnostic pass over an instance's raw data.
//!
//! Never fails: every problem found in the tree is collected into a
//! [`ClassAnalysis`], keyed by the class whose map it concerns.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::coerce::{object_leaves, shape_of, ValueCoercer};
use crate::compiler::PropertyMapRegistry;
use crate::decl::ClassId;
use crate::object::LazyObject;
use crate::options::MapperOptions;
use crate::schema::SchemaMap;
use crate::types::TypeKind;

type ProblemSets = BTreeMap<ClassId, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ClassAnalysis {
    /// values that do not fit their definition, missing required fields,
    /// classes that failed to compile
    bad_definitions: ProblemSets,
    /// keys present in data without any definition
    missing_definitions: ProblemSets,
}

impl ClassAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bad(&mut self, class: &ClassId, message: impl Into<String>) {
        self.bad_definitions.entry(class.clone()).or_default().insert(message.into());
    }

    pub fn add_missing(&mut self, class: &ClassId, message: impl Into<String>) {
        self.missing_definitions.entry(class.clone()).or_default().insert(message.into());
    }

    /// Union of both reports, per class.
    pub fn merge(&mut self, other: ClassAnalysis) {
        for (class, messages) in other.bad_definitions {
            self.bad_definitions.entry(class).or_default().extend(messages);
        }
        for (class, messages) in other.missing_definitions {
            self.missing_definitions.entry(class).or_default().extend(messages);
        }
    }

    pub fn has_problems(&self) -> bool {
        !self.bad_definitions.is_empty() || !self.missing_definitions.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.bad_definitions.values().chain(self.missing_definitions.values()).map(BTreeSet::len).sum()
    }

    pub fn bad_definitions(&self) -> &ProblemSets {
        &self.bad_definitions
    }

    pub fn missing_definitions(&self) -> &ProblemSets {
        &self.missing_definitions
    }

    /// One line per class and category, e.g. ``app::User: unmapped keys: `nick` (string)``.
    pub fn summaries(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (class, messages) in &self.bad_definitions {
            out.push(format!("{class}: bad definitions: {}", join(messages)));
        }
        for (class, messages) in &self.missing_definitions {
            out.push(format!("{class}: unmapped keys: {}", join(messages)));
        }
        out
    }
}

fn join(messages: &BTreeSet<String>) -> String {
    messages.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

// ————————————————————————————————————————————————————————————————————————————
// ANALYZER
// ————————————————————————————————————————————————————————————————————————————

pub struct DataAnalyzer<'r> {
    registry: &'r Arc<PropertyMapRegistry>,
}

impl<'r> DataAnalyzer<'r> {
    pub fn new(registry: &'r Arc<PropertyMapRegistry>) -> Self {
        Self { registry }
    }

    pub fn analyze(&self, instance: &LazyObject) -> ClassAnalysis {
        let mut report = ClassAnalysis::new();
        self.walk(instance.schema(), instance.raw(), &mut report);
        report
    }

    /// Analyze raw data as an instance of `class` without building one.
    pub fn analyze_raw(&self, class: &ClassId, raw: &Map<String, Value>) -> ClassAnalysis {
        let mut report = ClassAnalysis::new();
        match self.registry.compile(class) {
            Ok(schema) => self.walk(&schema, raw, &mut report),
            Err(error) => report.add_bad(class, error.to_string()),
        }
        report
    }

    fn walk(&self, schema: &SchemaMap, raw: &Map<String, Value>, report: &mut ClassAnalysis) {
        let class = schema.class_id();
        let coercer = ValueCoercer::new(self.registry, class, MapperOptions::default());

        for (key, value) in raw {
            let Some(def) = schema.get(key) else {
                report.add_missing(class, format!("`{key}` ({})", shape_of(value)));
                continue;
            };
            if let Err(mismatch) = coercer.check(value, def) {
                report.add_bad(class, mismatch.to_string());
                continue;
            }
            let TypeKind::Object(target) = &def.ty.kind else {
                continue;
            };
            // bounded by the data: only maps that actually sit at the leaf depth
            for (_, leaf) in object_leaves(value, &def.ty) {
                match self.registry.compile(target) {
                    Ok(nested) => self.walk(&nested, leaf, report),
                    Err(error) => {
                        report.add_bad(target, error.to_string());
                        break;
                    }
                }
            }
        }

        for def in schema.required_fields() {
            if raw.get(&def.name).is_none_or(Value::is_null) {
                report.add_bad(class, format!("required field `{}` is missing", def.name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::ClassDecl;
    use serde_json::json;

    fn registry() -> Arc<PropertyMapRegistry> {
        let registry = PropertyMapRegistry::new_shared();
        registry
            .register_all([
                ClassDecl::new("shop::Item").property("sku", "string").property("qty", "int").required("sku"),
                ClassDecl::new("shop::Order")
                    .property("id", "int")
                    .property("items", "Item[]")
                    .property("notes", "string[]")
                    .property("broken", "Cursed"),
                ClassDecl::new("shop::Cursed").property("x", "nope"),
            ])
            .unwrap();
        registry
    }

    fn order() -> ClassId {
        ClassId::new("shop::Order").unwrap()
    }

    #[test]
    fn clean_data_has_no_problems() {
        let registry = registry();
        let raw = json!({"id": 1, "items": [{"sku": "a", "qty": 2}], "notes": []});
        let report = DataAnalyzer::new(&registry).analyze_raw(&order(), raw.as_object().unwrap());
        assert!(!report.has_problems(), "{:?}", report.summaries());
    }

    #[test]
    fn collects_every_problem_across_the_tree() {
        let registry = registry();
        let raw = json!({
            "id": "one",
            "coupon": "SAVE",
            "notes": [["nested"]],
            "items": [
                {"sku": "a", "qty": 1.5},
                null,
                {"qty": 3, "colour": "red"},
                {"sku": "b", "qty": 1, "colour": "blue"}
            ]
        });
        let report = DataAnalyzer::new(&registry).analyze_raw(&order(), raw.as_object().unwrap());

        let order_bad = &report.bad_definitions()[&order()];
        assert_eq!(order_bad.len(), 2, "{order_bad:?}");
        assert!(order_bad.iter().any(|m| m.contains("`id`") && m.contains("found string")));
        assert!(order_bad.iter().any(|m| m.contains("`notes[0]`")));
        assert_eq!(
            report.missing_definitions()[&order()].iter().collect::<Vec<_>>(),
            ["`coupon` (string)"]
        );

        let item = ClassId::new("shop::Item").unwrap();
        let item_bad = &report.bad_definitions()[&item];
        assert!(item_bad.iter().any(|m| m.contains("`qty`") && m.contains("found float")));
        assert!(item_bad.contains("required field `sku` is missing"));
        // same unmapped key in two elements is reported once per distinct shape
        assert_eq!(report.missing_definitions()[&item].len(), 1);
        assert_eq!(report.problem_count(), 6);
    }

    #[test]
    fn nested_compile_failures_are_reported_not_raised() {
        let registry = registry();
        let raw = json!({"broken": {"x": 1}});
        let report = DataAnalyzer::new(&registry).analyze_raw(&order(), raw.as_object().unwrap());
        let cursed = ClassId::new("shop::Cursed").unwrap();
        assert!(report.bad_definitions()[&cursed].iter().any(|m| m.contains("nope")));
        assert!(!report.bad_definitions().contains_key(&order()));
    }

    #[test]
    fn merge_is_a_per_class_union() {
        let a = ClassId::new("A").unwrap();
        let b = ClassId::new("B").unwrap();
        let mut left = ClassAnalysis::new();
        left.add_bad(&a, "one");
        left.add_missing(&a, "`k` (string)");
        let mut right = ClassAnalysis::new();
        right.add_bad(&a, "one");
        right.add_bad(&a, "two");
        right.add_bad(&b, "three");
        left.merge(right);
        assert_eq!(left.bad_definitions()[&a].len(), 2);
        assert_eq!(left.problem_count(), 4);
        assert_eq!(left.summaries()[0], "A: bad definitions: one, two");

        let json = serde_json::to_value(&left).unwrap();
        assert_eq!(json["missing_definitions"]["A"], json!(["`k` (string)"]));
    }
}
