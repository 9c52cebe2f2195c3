//! Runs every case in `demos/cases.json` and reports pass/fail.
//!
//! Usage: `dev-test-runner [DEMOS_DIR]` (defaults to the workspace `demos/`).
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use json_propmap::{ClassId, DeclarationFile, LazyObject, MapperError, PropertyMapRegistry};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    schema: String,
    class: String,
    input: String,
    #[serde(default)]
    ndjson: bool,
    #[serde(default)]
    json_pointer: Option<String>,
    /// expected compiled field order
    #[serde(default)]
    describe: Vec<String>,
    /// no problems in any document
    #[serde(default)]
    clean: bool,
    /// each pattern must match at least one report line
    #[serde(default)]
    expect: Vec<String>,
}

fn main() -> ExitCode {
    let demos = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos"));

    let cases = match load_cases(&demos.join("cases.json")) {
        Ok(cases) => cases,
        Err(error) => {
            eprintln!("{} {error}", "cannot load cases:".red());
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0;
    for case in &cases {
        match run_case(&demos, case) {
            Ok(()) => println!("{} {}", "PASS".green().bold(), case.name),
            Err(reason) => {
                failed += 1;
                println!("{} {}\n     {reason}", "FAIL".red().bold(), case.name);
            }
        }
    }
    println!("—— {} passed, {failed} failed", cases.len() - failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn load_cases(path: &Path) -> Result<Vec<Case>, String> {
    let source = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&source);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let at = err.path().to_string();
        format!("at JSON path {at} → {}", err.into_inner())
    })
}

fn run_case(demos: &Path, case: &Case) -> Result<(), String> {
    let schema_src = std::fs::read_to_string(demos.join(&case.schema)).map_err(|e| e.to_string())?;
    let file = DeclarationFile::from_json_str(&schema_src)?;
    let registry = PropertyMapRegistry::new_shared();
    registry.register_all(file.classes).map_err(|e| e.to_string())?;
    let class = ClassId::new(&case.class).map_err(|e| e.to_string())?;

    // ----- describe ----- //
    let schema = registry.compile(&class).map_err(|e| e.to_string())?;
    if !case.describe.is_empty() {
        let names: Vec<&str> = schema.field_names().collect();
        if names != case.describe {
            return Err(format!("field order {names:?}, expected {:?}", case.describe));
        }
    }

    // ----- analyze ----- //
    let mut lines = Vec::new();
    for doc in load_documents(&demos.join(&case.input), case)? {
        match LazyObject::for_class(&registry, &class, doc, file.options) {
            Ok(instance) => lines.extend(instance.analyze().summaries()),
            Err(MapperError::AnalysisFailed { report, .. }) => lines.extend(report.summaries()),
            Err(error) => lines.push(error.to_string()),
        }
    }

    if case.clean && !lines.is_empty() {
        return Err(format!("expected no problems, got:\n       {}", lines.join("\n       ")));
    }
    for pattern in &case.expect {
        let re = Regex::new(pattern).map_err(|e| e.to_string())?;
        if !lines.iter().any(|line| re.is_match(line)) {
            return Err(format!("no report line matches /{pattern}/ in:\n       {}", lines.join("\n       ")));
        }
    }
    Ok(())
}

fn load_documents(path: &Path, case: &Case) -> Result<Vec<Value>, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let docs: Vec<Value> = if case.ndjson {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?
    } else {
        vec![serde_json::from_str(&text).map_err(|e| e.to_string())?]
    };
    let Some(pointer) = case.json_pointer.as_deref() else {
        return Ok(docs);
    };
    docs.iter()
        .map(|doc| doc.pointer(pointer).cloned().ok_or_else(|| format!("pointer {pointer} selects nothing")))
        .collect()
}
