//! Source templates for generated base files and implementation stubs
//!
//! Rendering is a pure function of [`Unit`]: no clocks, no filesystem.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use strata_core::{ComponentSymbol, Multiplicity, SymbolId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Rust,
    Python,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::TypeScript, Language::JavaScript, Language::Rust, Language::Python];

    /// Resolve a symbol's `language` field. `None` means there is no template.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Some(Language::TypeScript),
            "javascript" | "js" => Some(Language::JavaScript),
            "rust" | "rs" => Some(Language::Rust),
            "python" | "py" => Some(Language::Python),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Python => "python",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Language::TypeScript => "ts",
            Language::JavaScript => "js",
            Language::Rust => "rs",
            Language::Python => "py",
        }
    }

    /// File stem (and module name) for a symbol name.
    pub fn stem(self, name: &str) -> String {
        match self {
            Language::TypeScript | Language::JavaScript => kebab_case(name),
            Language::Rust | Language::Python => snake_case(name),
        }
    }

    pub fn generated_file(self, stem: &str) -> String {
        match self {
            Language::TypeScript | Language::JavaScript => format!("{stem}.generated.{}", self.extension()),
            Language::Rust | Language::Python => format!("{stem}_generated.{}", self.extension()),
        }
    }

    pub fn implementation_file(self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }
}

/// Split an arbitrary name into identifier words: non-alphanumerics separate
/// words, and so do lower-to-upper transitions (`HTTPServer` is `HTTP`, `Server`).
pub fn words(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn leading_digit_guard(ident: String) -> String {
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{ident}")
    } else {
        ident
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn pascal_case(raw: &str) -> String {
    leading_digit_guard(words(raw).iter().map(|w| capitalize(w)).collect())
}

pub fn camel_case(raw: &str) -> String {
    let words = words(raw);
    let mut out = String::new();
    for (i, w) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(&w.to_ascii_lowercase());
        } else {
            out.push_str(&capitalize(w));
        }
    }
    leading_digit_guard(out)
}

pub fn snake_case(raw: &str) -> String {
    leading_digit_guard(
        words(raw)
            .iter()
            .map(|w| w.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("_"),
    )
}

pub fn kebab_case(raw: &str) -> String {
    words(raw)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

const GENERATED_MARKER: &str = "Code generated by strata from symbol";

fn ownership_marker(id: &SymbolId) -> String {
    format!("{GENERATED_MARKER} {:?} (", id.as_str())
}

/// Whether `content` starts with a generated-file header.
pub fn is_generated(content: &str) -> bool {
    content.lines().next().is_some_and(|line| line.contains(GENERATED_MARKER))
}

/// Whether `content` starts with the generated-file header of `id`.
pub fn generated_by(content: &str, id: &SymbolId) -> bool {
    let marker = ownership_marker(id);
    content.lines().next().is_some_and(|line| line.contains(&marker))
}

/// How a referenced symbol is named from the rendering symbol's file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub type_name: String,
    /// Namespace segments and file stem, when the target is registered.
    pub location: Option<(Vec<String>, String)>,
}

/// Everything a template needs.
#[derive(Debug, Clone)]
pub struct Unit<'a> {
    pub symbol: &'a ComponentSymbol,
    pub language: Language,
    pub type_name: String,
    pub segments: Vec<String>,
    pub stem: String,
    pub refs: BTreeMap<SymbolId, Reference>,
    pub include_docs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub generated: String,
    pub implementation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Composes,
    Aggregates,
    DependsOn,
}

impl Relation {
    fn label(self) -> &'static str {
        match self {
            Relation::Composes => "composes",
            Relation::Aggregates => "aggregates",
            Relation::DependsOn => "depends on",
        }
    }
}

/// A field rendered from a composition, aggregation or dependency.
#[derive(Debug, Clone)]
struct Member {
    name: String,
    target: SymbolId,
    multiplicity: Multiplicity,
    relation: Relation,
}

impl Unit<'_> {
    fn type_of<'a>(&'a self, id: &'a SymbolId) -> &'a str {
        self.refs
            .get(id)
            .map(|r| r.type_name.as_str())
            .unwrap_or(id.as_str())
    }

    fn header(&self) -> [String; 2] {
        let s = self.symbol;
        [
            format!(
                "{}{} v{}). DO NOT EDIT.",
                ownership_marker(&s.id),
                s.qualified_name(),
                s.version
            ),
            format!(
                "Changes belong in {}; this file is rewritten on every generation.",
                self.language.implementation_file(&self.stem)
            ),
        ]
    }

    fn stub_header(&self) -> String {
        format!(
            "Implementation of {}. Created once by strata; edits here are preserved.",
            self.type_name
        )
    }

    fn classification(&self) -> String {
        format!(
            "Level {} ({}), kind {}, status {}.",
            self.symbol.level.as_str(),
            level_name(self.symbol.level.rank()),
            self.symbol.kind,
            self.symbol.status
        )
    }

    fn description_lines(&self) -> Vec<&str> {
        self.symbol
            .description
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect()
    }

    fn field_name(&self, raw: &str) -> String {
        match self.language {
            Language::TypeScript | Language::JavaScript => camel_case(raw),
            Language::Rust | Language::Python => snake_case(raw),
        }
    }

    /// Fields in declaration order. Later duplicates of a field name are dropped
    /// with a warning.
    fn members(&self, warnings: &mut Vec<String>) -> Vec<Member> {
        let rel = &self.symbol.relationships;
        let mut raw: Vec<(String, SymbolId, Multiplicity, Relation)> = Vec::new();
        for c in &rel.composes {
            raw.push((c.field_name.clone(), c.symbol_id.clone(), c.multiplicity, Relation::Composes));
        }
        for a in &rel.aggregates {
            raw.push((a.field_name.clone(), a.symbol_id.clone(), a.multiplicity, Relation::Aggregates));
        }
        for d in &rel.dependencies {
            let multiplicity = if d.optional {
                Multiplicity::ZeroOrOne
            } else {
                Multiplicity::One
            };
            raw.push((d.name.clone(), d.symbol_id.clone(), multiplicity, Relation::DependsOn));
        }

        let mut seen = BTreeSet::new();
        let mut members = Vec::new();
        for (field, target, multiplicity, relation) in raw {
            let name = self.field_name(&field);
            if name.is_empty() {
                warnings.push(format!("field {field:?} has no identifier characters; skipped"));
                continue;
            }
            if !seen.insert(name.clone()) {
                warnings.push(format!("duplicate field {name} ({} {target}); skipped", relation.label()));
                continue;
            }
            members.push(Member {
                name,
                target,
                multiplicity,
                relation,
            });
        }
        members
    }

    fn location_of(&self, id: &SymbolId) -> Option<&(Vec<String>, String)> {
        if id == &self.symbol.id {
            return None;
        }
        self.refs.get(id).and_then(|r| r.location.as_ref())
    }
}

fn level_name(rank: u8) -> &'static str {
    match rank {
        0 => "primitive",
        1 => "component",
        2 => "composite",
        3 => "service",
        _ => "full-stack",
    }
}

fn multiplicity_note(m: Multiplicity) -> &'static str {
    match m {
        Multiplicity::One => "1",
        Multiplicity::ZeroOrOne => "0..1",
        Multiplicity::ZeroOrMore => "0..*",
        Multiplicity::OneOrMore => "1..*",
    }
}

fn quoted_list(ids: &[SymbolId]) -> String {
    ids.iter()
        .map(|id| format!("{:?}", id.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `./x` or `../../a/x` from directory `from` to file `stem` in directory `to`.
fn relative_module(from: &[String], to: &[String], stem: &str) -> String {
    let common = from.iter().zip(to).take_while(|(a, b)| a == b).count();
    let ups = from.len() - common;
    let mut path = if ups == 0 {
        "./".to_string()
    } else {
        "../".repeat(ups)
    };
    for seg in &to[common..] {
        path.push_str(seg);
        path.push('/');
    }
    path.push_str(stem);
    path
}

/// Python relative import module, `.x` or `..pkg.x`.
fn python_module(from: &[String], to: &[String], stem: &str) -> String {
    let common = from.iter().zip(to).take_while(|(a, b)| a == b).count();
    let mut module = ".".repeat(1 + from.len() - common);
    let rest: Vec<&str> = to[common..].iter().map(String::as_str).chain([stem]).collect();
    module.push_str(&rest.join("."));
    module
}

pub fn render(unit: &Unit<'_>, warnings: &mut Vec<String>) -> Rendered {
    let members = unit.members(warnings);
    match unit.language {
        Language::TypeScript => typescript(unit, &members),
        Language::JavaScript => javascript(unit, &members),
        Language::Rust => rust(unit, &members),
        Language::Python => python(unit, &members),
    }
}

fn typescript(unit: &Unit<'_>, members: &[Member]) -> Rendered {
    let rel = &unit.symbol.relationships;
    let mut out = String::new();
    for line in unit.header() {
        let _ = writeln!(out, "// {line}");
    }
    out.push('\n');

    let mut value_imports: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    let mut type_imports: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    if let Some(parent) = &rel.extends {
        if let Some((segs, stem)) = unit.location_of(parent) {
            value_imports
                .entry(relative_module(&unit.segments, segs, stem))
                .or_default()
                .insert(unit.type_of(parent));
        }
    }
    let typed = rel.implements.iter().chain(members.iter().map(|m| &m.target));
    for id in typed {
        if let Some((segs, stem)) = unit.location_of(id) {
            let module = relative_module(&unit.segments, segs, stem);
            let name = unit.type_of(id);
            if !value_imports.get(&module).is_some_and(|names| names.contains(name)) {
                type_imports.entry(module).or_default().insert(name);
            }
        }
    }
    for (module, names) in &value_imports {
        let names: Vec<&str> = names.iter().copied().collect();
        let _ = writeln!(out, "import {{ {} }} from {:?};", names.join(", "), module);
    }
    for (module, names) in &type_imports {
        let names: Vec<&str> = names.iter().copied().collect();
        let _ = writeln!(out, "import type {{ {} }} from {:?};", names.join(", "), module);
    }
    if !value_imports.is_empty() || !type_imports.is_empty() {
        out.push('\n');
    }

    if unit.include_docs {
        out.push_str("/**\n");
        let description = unit.description_lines();
        for line in &description {
            let _ = writeln!(out, " * {line}");
        }
        if !description.is_empty() {
            out.push_str(" *\n");
        }
        let _ = writeln!(out, " * {}", unit.classification());
        out.push_str(" */\n");
    }

    let mut decl = format!("export abstract class {}Base", unit.type_name);
    if let Some(parent) = &rel.extends {
        let _ = write!(decl, " extends {}", unit.type_of(parent));
    }
    if !rel.implements.is_empty() {
        let names: Vec<&str> = rel.implements.iter().map(|i| unit.type_of(i)).collect();
        let _ = write!(decl, " implements {}", names.join(", "));
    }
    let _ = writeln!(out, "{decl} {{");
    let _ = writeln!(out, "  static readonly symbolId = {:?};", unit.symbol.id.as_str());
    let _ = writeln!(out, "  static readonly version = {:?};", unit.symbol.version);
    if !rel.contains.is_empty() {
        let _ = writeln!(out, "  static readonly contains = [{}] as const;", quoted_list(&rel.contains));
    }
    for m in members {
        let ty = unit.type_of(&m.target);
        out.push('\n');
        if unit.include_docs {
            let _ = writeln!(out, "  /** {} {} ({}) */", m.relation.label(), ty, multiplicity_note(m.multiplicity));
        }
        let line = if m.multiplicity.is_collection() {
            format!("protected {}!: {}[];", m.name, ty)
        } else if m.multiplicity.is_optional() {
            format!("protected {}?: {};", m.name, ty)
        } else {
            format!("protected {}!: {};", m.name, ty)
        };
        let _ = writeln!(out, "  {line}");
    }
    out.push_str("}\n");

    let implementation = format!(
        "// {header}\n\nimport {{ {ty}Base }} from \"./{stem}.generated\";\n\nexport class {ty} extends {ty}Base {{\n}}\n",
        header = unit.stub_header(),
        ty = unit.type_name,
        stem = unit.stem,
    );
    Rendered {
        generated: out,
        implementation,
    }
}

fn javascript(unit: &Unit<'_>, members: &[Member]) -> Rendered {
    let rel = &unit.symbol.relationships;
    let mut out = String::new();
    for line in unit.header() {
        let _ = writeln!(out, "// {line}");
    }
    out.push('\n');

    if let Some(parent) = &rel.extends {
        if let Some((segs, stem)) = unit.location_of(parent) {
            let module = format!("{}.js", relative_module(&unit.segments, segs, stem));
            let _ = writeln!(out, "import {{ {} }} from {:?};\n", unit.type_of(parent), module);
        }
    }

    if unit.include_docs {
        out.push_str("/**\n");
        for line in unit.description_lines() {
            let _ = writeln!(out, " * {line}");
        }
        let _ = writeln!(out, " * {}", unit.classification());
        for interface in &rel.implements {
            let _ = writeln!(out, " * @implements {{{}}}", unit.type_of(interface));
        }
        out.push_str(" */\n");
    }

    let mut decl = format!("export class {}Base", unit.type_name);
    if let Some(parent) = &rel.extends {
        let _ = write!(decl, " extends {}", unit.type_of(parent));
    }
    let _ = writeln!(out, "{decl} {{");
    let _ = writeln!(out, "  static symbolId = {:?};", unit.symbol.id.as_str());
    let _ = writeln!(out, "  static version = {:?};", unit.symbol.version);
    if !rel.contains.is_empty() {
        let _ = writeln!(out, "  static contains = Object.freeze([{}]);", quoted_list(&rel.contains));
    }
    for m in members {
        let ty = unit.type_of(&m.target);
        out.push('\n');
        if unit.include_docs {
            let js_type = if m.multiplicity.is_collection() {
                format!("{ty}[]")
            } else if m.multiplicity.is_optional() {
                format!("{ty} | undefined")
            } else {
                ty.to_string()
            };
            let _ = writeln!(
                out,
                "  /** @type {{{}}} {} ({}) */",
                js_type,
                m.relation.label(),
                multiplicity_note(m.multiplicity)
            );
        }
        let _ = writeln!(out, "  {};", m.name);
    }
    out.push_str("}\n");

    let implementation = format!(
        "// {header}\n\nimport {{ {ty}Base }} from \"./{stem}.generated.js\";\n\nexport class {ty} extends {ty}Base {{\n}}\n",
        header = unit.stub_header(),
        ty = unit.type_name,
        stem = unit.stem,
    );
    Rendered {
        generated: out,
        implementation,
    }
}

fn rust(unit: &Unit<'_>, members: &[Member]) -> Rendered {
    let rel = &unit.symbol.relationships;
    let mut out = String::new();
    for line in unit.header() {
        let _ = writeln!(out, "// {line}");
    }
    out.push('\n');

    let mut uses: BTreeSet<String> = BTreeSet::new();
    if members.iter().any(|m| m.relation != Relation::Composes) {
        uses.insert("std::sync::Arc".to_string());
    }
    let referenced = rel.extends.iter().chain(&rel.implements).chain(members.iter().map(|m| &m.target));
    for id in referenced {
        if let Some((segs, stem)) = unit.location_of(id) {
            let path: Vec<&str> = std::iter::once("crate")
                .chain(segs.iter().map(String::as_str))
                .chain([stem.as_str(), unit.type_of(id)])
                .collect();
            uses.insert(path.join("::"));
        }
    }
    for path in &uses {
        let _ = writeln!(out, "use {path};");
    }
    if !uses.is_empty() {
        out.push('\n');
    }

    let _ = writeln!(out, "pub const SYMBOL_ID: &str = {:?};", unit.symbol.id.as_str());
    let _ = writeln!(out, "pub const VERSION: &str = {:?};", unit.symbol.version);
    if !rel.contains.is_empty() {
        let _ = writeln!(out, "pub const CONTAINS: &[&str] = &[{}];", quoted_list(&rel.contains));
    }
    out.push('\n');

    if unit.include_docs {
        for line in unit.description_lines() {
            let _ = writeln!(out, "/// {line}");
        }
        let _ = writeln!(out, "/// {}", unit.classification());
    }
    let _ = writeln!(out, "pub struct {}Parts {{", unit.type_name);
    if let Some(parent) = &rel.extends {
        if unit.include_docs {
            out.push_str("    /// extends\n");
        }
        let _ = writeln!(out, "    pub base: {},", unit.type_of(parent));
    }
    for m in members {
        let ty = unit.type_of(&m.target);
        let inner = match m.relation {
            Relation::Composes => ty.to_string(),
            Relation::Aggregates | Relation::DependsOn => format!("Arc<{ty}>"),
        };
        let full = if m.multiplicity.is_collection() {
            format!("Vec<{inner}>")
        } else if m.multiplicity.is_optional() {
            format!("Option<{inner}>")
        } else {
            inner
        };
        if unit.include_docs {
            let _ = writeln!(out, "    /// {} {} ({})", m.relation.label(), ty, multiplicity_note(m.multiplicity));
        }
        let _ = writeln!(out, "    pub {}: {},", m.name, full);
    }
    out.push_str("}\n\n");

    let supertraits: Vec<&str> = rel.implements.iter().map(|i| unit.type_of(i)).collect();
    if supertraits.is_empty() {
        let _ = writeln!(out, "pub trait {}Base {{", unit.type_name);
    } else {
        let _ = writeln!(out, "pub trait {}Base: {} {{", unit.type_name, supertraits.join(" + "));
    }
    let _ = writeln!(out, "    fn parts(&self) -> &{}Parts;", unit.type_name);
    out.push_str("}\n");

    let ty = &unit.type_name;
    let mut implementation = format!(
        "// {header}\n\nuse super::{stem}_generated::{{{ty}Base, {ty}Parts}};\n\npub struct {ty} {{\n    parts: {ty}Parts,\n}}\n\nimpl {ty} {{\n    pub fn new(parts: {ty}Parts) -> Self {{\n        Self {{ parts }}\n    }}\n}}\n\nimpl {ty}Base for {ty} {{\n    fn parts(&self) -> &{ty}Parts {{\n        &self.parts\n    }}\n}}\n",
        header = unit.stub_header(),
        stem = unit.stem,
    );
    for interface in &supertraits {
        let _ = write!(implementation, "\nimpl {interface} for {ty} {{}}\n");
    }
    Rendered {
        generated: out,
        implementation,
    }
}

fn python(unit: &Unit<'_>, members: &[Member]) -> Rendered {
    let rel = &unit.symbol.relationships;
    let mut out = String::new();
    for line in unit.header() {
        let _ = writeln!(out, "# {line}");
    }
    out.push_str("from __future__ import annotations\n\nfrom abc import ABC\nfrom typing import ClassVar\n");

    let mut imports: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    let referenced = rel.extends.iter().chain(&rel.implements).chain(members.iter().map(|m| &m.target));
    for id in referenced {
        if let Some((segs, stem)) = unit.location_of(id) {
            imports
                .entry(python_module(&unit.segments, segs, stem))
                .or_default()
                .insert(unit.type_of(id));
        }
    }
    if !imports.is_empty() {
        out.push('\n');
    }
    for (module, names) in &imports {
        let names: Vec<&str> = names.iter().copied().collect();
        let _ = writeln!(out, "from {module} import {}", names.join(", "));
    }
    out.push_str("\n\n");

    let mut bases: Vec<&str> = Vec::new();
    if let Some(parent) = &rel.extends {
        bases.push(unit.type_of(parent));
    }
    bases.extend(rel.implements.iter().map(|i| unit.type_of(i)));
    bases.push("ABC");
    let _ = writeln!(out, "class {}Base({}):", unit.type_name, bases.join(", "));

    if unit.include_docs {
        let description = unit.description_lines();
        out.push_str("    \"\"\"");
        match description.split_first() {
            Some((first, rest)) => {
                let _ = writeln!(out, "{first}");
                for line in rest {
                    let _ = writeln!(out, "    {line}");
                }
                out.push('\n');
                let _ = writeln!(out, "    {}", unit.classification());
                out.push_str("    \"\"\"\n\n");
            }
            None => {
                let _ = writeln!(out, "{}\"\"\"\n", unit.classification());
            }
        }
    }

    let _ = writeln!(out, "    SYMBOL_ID: ClassVar[str] = {:?}", unit.symbol.id.as_str());
    let _ = writeln!(out, "    VERSION: ClassVar[str] = {:?}", unit.symbol.version);
    if !rel.contains.is_empty() {
        let trailing = if rel.contains.len() == 1 { "," } else { "" };
        let _ = writeln!(
            out,
            "    CONTAINS: ClassVar[tuple[str, ...]] = ({}{})",
            quoted_list(&rel.contains),
            trailing
        );
    }
    if !members.is_empty() {
        out.push('\n');
    }
    for m in members {
        let ty = unit.type_of(&m.target);
        let annotation = if m.multiplicity.is_collection() {
            format!("list[{ty}]")
        } else if m.multiplicity.is_optional() {
            format!("{ty} | None")
        } else {
            ty.to_string()
        };
        if unit.include_docs {
            let _ = writeln!(out, "    # {} {} ({})", m.relation.label(), ty, multiplicity_note(m.multiplicity));
        }
        let _ = writeln!(out, "    {}: {}", m.name, annotation);
    }

    let implementation = format!(
        "# {header}\nfrom .{stem}_generated import {ty}Base\n\n\nclass {ty}({ty}Base):\n    pass\n",
        header = unit.stub_header(),
        ty = unit.type_name,
        stem = unit.stem,
    );
    Rendered {
        generated: out,
        implementation,
    }
}
