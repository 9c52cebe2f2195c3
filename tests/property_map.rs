use std::sync::Arc;
use std::thread;

use json_propmap::coerce::ValueCoercer;
use json_propmap::{
    ClassDecl, ClassId, DeclarationFile, LazyObject, MapperError, MapperOptions, PropertyMapRegistry, TypedValue,
};
use serde_json::{json, Value};

fn registry_with(decls: Vec<ClassDecl>) -> Arc<PropertyMapRegistry> {
    let registry = PropertyMapRegistry::new_shared();
    registry.register_all(decls).unwrap();
    registry
}

fn id(path: &str) -> ClassId {
    ClassId::new(path).unwrap()
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn compiling_twice_returns_the_cached_map() {
    let registry = registry_with(vec![
        ClassDecl::new("Base").property("id", "int"),
        ClassDecl::new("User").extends("Base").property("name", "string").property("tags", "string[]"),
    ]);
    let first = registry.compile(&id("User")).unwrap();
    let passes = registry.compile_count();
    let second = registry.compile(&id("User")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.field_names().collect::<Vec<_>>(), ["id", "name", "tags"]);
    assert_eq!(registry.compile_count(), passes);

    // instances share the compiled map
    let a = LazyObject::new(&registry, "User", json!({})).unwrap();
    let b = LazyObject::new(&registry, "User", json!({"id": 1})).unwrap();
    assert!(Arc::ptr_eq(a.schema(), b.schema()));
}

#[test]
fn concurrent_first_use_compiles_once() {
    let registry = registry_with(vec![
        ClassDecl::new("geo::Point").property("x", "float").property("y", "float"),
        ClassDecl::new("geo::Path").import("Point").property("points", "Point[]"),
    ]);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.compile(&id("geo::Path")).unwrap())
        })
        .collect();
    let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for map in &maps[1..] {
        assert!(Arc::ptr_eq(&maps[0], map));
    }
    // Path plus the imported Point
    assert_eq!(registry.compile_count(), 2);
}

#[test]
fn merge_precedence_ignores_declaration_order() {
    let orders = [
        ClassDecl::new("Child").extends("Parent").import("Import").property("a", "string"),
        ClassDecl::new("Child").import("Import").property("a", "string").extends("Parent"),
        ClassDecl::new("Child").property("a", "string").extends("Parent").import("Import"),
    ];
    for child in orders {
        let registry = registry_with(vec![
            ClassDecl::new("Parent").property("a", "int"),
            ClassDecl::new("Import").property("b", "string"),
            child,
        ]);
        let map = registry.compile(&id("Child")).unwrap();
        assert_eq!(map.get("a").unwrap().ty.to_string(), "string");
        assert_eq!(map.get("b").unwrap().ty.to_string(), "string");
        assert_eq!(map.len(), 2);
    }
}

#[test]
fn import_cycles_are_rejected_without_partial_maps() {
    let registry = registry_with(vec![
        ClassDecl::new("A").import("B").property("a", "int"),
        ClassDecl::new("B").import("A").property("b", "int"),
    ]);
    for name in ["A", "B"] {
        match registry.compile(&id(name)) {
            Err(MapperError::CircularPropertyMap { class_a, class_b, .. }) => {
                let mut named = [class_a.to_string(), class_b.to_string()];
                named.sort();
                assert_eq!(named, ["A", "B"]);
            }
            other => panic!("expected a cycle error for {name}, got {other:?}"),
        }
        assert!(!registry.is_compiled(&id(name)));
    }
    // instances of either class cannot be built
    assert!(LazyObject::new(&registry, "A", json!({})).is_err());
}

#[test]
fn declaration_files_load_into_a_registry() {
    let src = r#"{
        "classes": [
            {"name": "app::Address", "properties": {"city": "string"}},
            {"name": "app::User", "properties": {"name": "string", "home": "Address", "scores": "integer[]"},
             "required": ["name"]}
        ]
    }"#;
    let file = DeclarationFile::from_json_str(src).unwrap();
    let registry = registry_with(file.classes);
    let rows = registry.compile(&id("app::User")).unwrap().describe();
    let types: Vec<_> = rows.iter().map(|r| (r.name.as_str(), r.type_string.as_str(), r.required)).collect();
    assert_eq!(types, [("name", "string", true), ("home", "app::Address", false), ("scores", "int[]", false)]);
}

// ————————————————————————————————————————————————————————————————————————————
// VALUES
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn int_matrix_depth_is_enforced() {
    let registry = registry_with(vec![ClassDecl::new("Grid").property("cells", "int[][]")]);
    let mut grid = LazyObject::new(&registry, "Grid", json!({"cells": [[1, 2], [3]]})).unwrap();
    let cells = grid.get_field("cells").unwrap().unwrap();
    assert_eq!(cells, &TypedValue::from(vec![vec![1i64, 2], vec![3]]));

    for bad in [json!([1, 2]), json!("x")] {
        let mut grid = LazyObject::new(&registry, "Grid", json!({ "cells": bad })).unwrap();
        assert!(matches!(grid.get_field("cells"), Err(MapperError::Coercion(_))));
    }
}

#[test]
fn already_valid_data_round_trips_unchanged() {
    let registry = registry_with(vec![
        ClassDecl::new("Tag").property("label", "string"),
        ClassDecl::new("Doc")
            .property("id", "int")
            .property("score", "float")
            .property("flags", "bool[]")
            .property("tags", "Tag[]")
            .property("matrix", "float[][]")
            .property("meta", "mixed")
            .property("anything", ""),
    ]);
    let class = id("Doc");
    let schema = registry.compile(&class).unwrap();
    let coercer = ValueCoercer::new(&registry, &class, MapperOptions::default());
    let raw = json!({
        "id": 7,
        "score": 0.25,
        "flags": [true, null, false],
        "tags": [{"label": "a", "extra": 1}, null],
        "matrix": [[1.5], [], null],
        "meta": {"nested": [1, "two"]},
        "anything": [[["deep"]]]
    });
    for (name, value) in raw.as_object().unwrap() {
        let def = schema.get(name).unwrap();
        let typed = coercer.read(Some(value), def).unwrap().unwrap();
        assert_eq!(&coercer.write(&typed, def).unwrap(), value, "field {name}");
    }
}

#[test]
fn set_then_get_is_never_stale() {
    let registry = registry_with(vec![
        ClassDecl::new("Point").property("x", "int"),
        ClassDecl::new("Shape")
            .property("name", "string")
            .property("sides", "int")
            .property("origin", "Point")
            .property("labels", "string[]"),
    ]);
    let mut shape = LazyObject::new(&registry, "Shape", json!({"name": "tri", "sides": 3})).unwrap();
    shape.get_field("sides").unwrap();

    let point = LazyObject::new(&registry, "Point", json!({"x": 4})).unwrap();
    let writes: Vec<(&str, TypedValue)> = vec![
        ("sides", 4i64.into()),
        ("name", "quad".into()),
        ("labels", vec!["a", "b"].into()),
        ("origin", point.clone().into()),
        ("sides", json!(5).into()),
    ];
    for (name, value) in writes {
        shape.set_field(name, value.clone()).unwrap();
        let read = shape.get_field(name).unwrap().unwrap().clone();
        match &value {
            TypedValue::Mixed(raw) => assert_eq!(read.as_i64(), raw.as_i64()),
            other => assert_eq!(&read, other),
        }
    }
    assert_eq!(shape.raw()["sides"], json!(5));
    assert_eq!(shape.raw()["labels"], json!(["a", "b"]));
    assert_eq!(shape.raw()["origin"], json!({"x": 4}));
}

#[test]
fn required_fields_fail_only_when_read() {
    let registry = registry_with(vec![ClassDecl::new("Person")
        .property("name", "string")
        .property("age", "int")
        .required("age")]);
    let mut person = LazyObject::new(&registry, "Person", json!({"name": "Valery"})).unwrap();
    assert_eq!(person.get_field("name").unwrap(), Some(&TypedValue::from("Valery")));
    match person.get_field("age") {
        Err(MapperError::RequiredFieldMissing { class, field }) => {
            assert_eq!(class.as_str(), "Person");
            assert_eq!(field, "age");
        }
        other => panic!("expected RequiredFieldMissing, got {other:?}"),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ANALYSIS
// ————————————————————————————————————————————————————————————————————————————

#[test]
fn unmapped_keys_are_reported_as_missing_definitions() {
    let registry = registry_with(vec![ClassDecl::new("P").property("x", "int")]);
    let p = LazyObject::new(&registry, "P", json!({"x": 1, "y": 2})).unwrap();
    let report = p.analyze();
    assert!(report.bad_definitions().is_empty());
    let missing = &report.missing_definitions()[&id("P")];
    assert_eq!(missing.len(), 1);
    assert!(missing.iter().next().unwrap().contains("`y`"));
}

#[test]
fn analysis_recurses_through_nested_arrays_of_objects() {
    let registry = registry_with(vec![
        ClassDecl::new("Cell").property("v", "int"),
        ClassDecl::new("Board").property("rows", "Cell[][]"),
    ]);
    let board = LazyObject::new(
        &registry,
        "Board",
        json!({"rows": [[{"v": 1}, {"v": "x"}], null, [{"w": 2}]]}),
    )
    .unwrap();
    let report = board.analyze();
    let cell = id("Cell");
    assert_eq!(report.bad_definitions()[&cell].len(), 1);
    assert_eq!(report.missing_definitions()[&cell].len(), 1);
    assert!(!report.bad_definitions().contains_key(&id("Board")));

    let strict = LazyObject::with_options(&registry, "Board", board.to_value(), MapperOptions::strict());
    assert!(matches!(strict, Err(MapperError::AnalysisFailed { .. })));
}

#[test]
fn raw_null_and_absent_both_read_as_not_present() {
    let registry = registry_with(vec![ClassDecl::new("N").property("list", "int[]")]);
    let mut n = LazyObject::new(&registry, "N", json!({"list": null})).unwrap();
    assert_eq!(n.get_field("list").unwrap(), None);
    assert!(!n.has_field("list"));
    n.set_field("list", Vec::<i64>::new()).unwrap();
    assert!(n.has_field("list"));
    assert_eq!(n.get_field("list").unwrap(), Some(&TypedValue::Array(Vec::new())));
    assert_eq!(n.raw()["list"], Value::Array(Vec::new()));
}
