//! CLI: describe compiled property maps, analyze JSON documents against them.
use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use json_propmap::{
    ClassAnalysis, ClassId, DeclarationFile, FieldDescription, LazyObject, MapperError, MapperOptions,
    PropertyMapRegistry,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check JSON documents against declared, typed property maps
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile property maps and print their resolved fields
    Describe(DescribeCmd),
    /// report unmapped keys and type mismatches in JSON documents
    Analyze(AnalyzeCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// declaration file: {"options": {...}, "classes": [...]}
    #[arg(long, short = 's')]
    schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; each output is analyzed separately
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DescribeCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// class to describe, e.g. app::User (every registered class if omitted)
    #[arg(long, short = 'c')]
    class: Option<String>,

    /// print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct AnalyzeCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// class every document is an instance of, e.g. app::User
    #[arg(long, short = 'c')]
    class: String,

    /// print JSON instead of colored text
    #[arg(long)]
    json: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input document after NDJSON splitting, pointer selection and jq.
#[derive(Debug)]
struct Document {
    label: String,
    value: Value,
}

#[derive(Debug, Serialize)]
struct DocumentReport {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    report: ClassAnalysis,
}

impl DocumentReport {
    fn is_clean(&self) -> bool {
        self.error.is_none() && !self.report.has_problems()
    }
}

#[derive(Debug, Serialize)]
struct ClassDescription {
    class: ClassId,
    fields: Vec<FieldDescription>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> Result<(Arc<PropertyMapRegistry>, MapperOptions)> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read declaration file {}", self.schema.display()))?;
        let file = DeclarationFile::from_json_str(&source)
            .map_err(|msg| anyhow!("invalid declaration file {}: {msg}", self.schema.display()))?;
        let registry = PropertyMapRegistry::new_shared();
        let ids = registry.register_all(file.classes)?;
        info!(classes = ids.len(), path = %self.schema.display(), "loaded declarations");
        Ok((registry, file.options))
    }
}

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for source in resolve_file_path_patterns(&self.input)? {
            let (label, text) = source.read()?;
            for (label, value) in self.split(&label, &text)? {
                let value = self.select(&label, value)?;
                self.pre_filter(label, value, &mut docs)?;
            }
        }
        debug!(documents = docs.len(), "inputs loaded");
        Ok(docs)
    }

    fn split(&self, label: &str, text: &str) -> Result<Vec<(String, Value)>> {
        if !self.ndjson {
            let value = serde_json::from_str(text).with_context(|| format!("failed to parse JSON ({label})"))?;
            return Ok(vec![(label.to_string(), value)]);
        }
        let mut out = Vec::new();
        for (ix, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let label = format!("{label}:{}", ix + 1);
            let value = serde_json::from_str(line).with_context(|| format!("failed to parse NDJSON line ({label})"))?;
            out.push((label, value));
        }
        Ok(out)
    }

    fn select(&self, label: &str, value: Value) -> Result<Value> {
        let Some(pointer) = self.json_pointer.as_deref() else {
            return Ok(value);
        };
        match value.pointer(pointer) {
            Some(node) => Ok(node.clone()),
            None => bail!("JSON pointer {pointer} selects nothing in {label}"),
        }
    }

    fn pre_filter(&self, label: String, value: Value, docs: &mut Vec<Document>) -> Result<()> {
        let Some(jq_expr) = self.jq_expr.as_deref() else {
            docs.push(Document { label, value });
            return Ok(());
        };
        let outputs = crate::jq_exec::run_jaq(jq_expr, &value)
            .with_context(|| format!("failed to apply jq expression ({label})"))?;
        let single = outputs.len() == 1;
        for (ix, value) in outputs.into_iter().enumerate() {
            let label = if single { label.clone() } else { format!("{label}#{ix}") };
            docs.push(Document { label, value });
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    /// `Ok(false)` when the analyzed documents had problems.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Describe(target) => target.run().map(|()| true),
            Command::Analyze(target) => target.run(),
        }
    }
}

impl DescribeCmd {
    fn run(&self) -> Result<()> {
        let (registry, _) = self.schema_settings.load()?;
        let ids = match &self.class {
            Some(class) => vec![ClassId::new(class)?],
            None => registry.class_ids(),
        };
        let mut descriptions = Vec::with_capacity(ids.len());
        for id in ids {
            let schema = registry.compile(&id)?;
            descriptions.push(ClassDescription { class: id, fields: schema.describe() });
        }

        let rendered = if self.json {
            serde_json::to_string_pretty(&descriptions)?
        } else {
            descriptions.iter().map(render_description).collect::<Vec<_>>().join("\n")
        };
        emit(self.out.as_ref(), &rendered)
    }
}

impl AnalyzeCmd {
    fn run(&self) -> Result<bool> {
        let (registry, options) = self.schema_settings.load()?;
        let class = ClassId::new(&self.class)?;
        // a broken map is a usage error, not a per-document finding
        registry.compile(&class).with_context(|| format!("cannot analyze against `{class}`"))?;

        let docs = self.input_settings.load_documents()?;
        let reports: Vec<DocumentReport> = docs
            .par_iter()
            .map(|doc| analyze_document(&registry, &class, options, doc))
            .collect();
        let clean = reports.iter().all(DocumentReport::is_clean);
        info!(documents = reports.len(), clean, "analysis finished");

        let rendered = if self.json {
            serde_json::to_string_pretty(&reports)?
        } else {
            reports.iter().map(render_report).collect::<Vec<_>>().join("\n")
        };
        emit(self.out.as_ref(), &rendered)?;
        Ok(clean)
    }
}

fn analyze_document(
    registry: &Arc<PropertyMapRegistry>,
    class: &ClassId,
    options: MapperOptions,
    doc: &Document,
) -> DocumentReport {
    let source = doc.label.clone();
    match LazyObject::for_class(registry, class, doc.value.clone(), options) {
        Ok(instance) => DocumentReport { source, error: None, report: instance.analyze() },
        Err(MapperError::AnalysisFailed { report, .. }) => DocumentReport { source, error: None, report: *report },
        Err(error) => DocumentReport { source, error: Some(error.to_string()), report: ClassAnalysis::default() },
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RENDERING
// ————————————————————————————————————————————————————————————————————————————

fn render_description(desc: &ClassDescription) -> String {
    let width = desc.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
    let mut out = format!("{} ({} fields)\n", desc.class.to_string().bold(), desc.fields.len());
    for field in &desc.fields {
        let required = if field.required { "required".yellow().to_string() } else { String::new() };
        let inherited = if field.declared_in != desc.class {
            format!("from {}", field.declared_in).dimmed().to_string()
        } else {
            String::new()
        };
        out.push_str(&format!(
            "  {:width$}  {}  {required} {inherited}\n",
            field.name,
            field.type_string.cyan(),
        ));
    }
    out
}

fn render_report(doc: &DocumentReport) -> String {
    if doc.is_clean() {
        return format!("{} {}", "✓".green(), doc.source);
    }
    let mut out = format!("{} {}", "✗".red().bold(), doc.source);
    if let Some(error) = &doc.error {
        out.push_str(&format!("\n    {} {error}", "error:".red()));
    }
    for (class, messages) in doc.report.bad_definitions() {
        for message in messages {
            out.push_str(&format!("\n    {} [{class}] {message}", "bad".red()));
        }
    }
    for (class, messages) in doc.report.missing_definitions() {
        for message in messages {
            out.push_str(&format!("\n    {} [{class}] {message}", "unmapped".yellow()));
        }
    }
    out
}

fn emit(out: Option<&PathBuf>, rendered: &str) -> Result<()> {
    let Some(out) = out else {
        println!("{rendered}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, rendered).with_context(|| format!("failed to write {}", out.display()))
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    fn read(&self) -> Result<(String, String)> {
        match self {
            InputSource::Stdin => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
                Ok(("<stdin>".to_string(), text))
            }
            InputSource::File(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read source file {}", path.display()))?;
                Ok((path.to_string_lossy().to_string(), text))
            }
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<InputSource>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if pattern == "-" {
            out.push(InputSource::Stdin);
        } else if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern)? {
                out.push(InputSource::File(entry?));
            }
            if out.len() == before {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(InputSource::File(PathBuf::from(pattern)));
        }
    }
    Ok(out)
}
