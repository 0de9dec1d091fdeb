//! Core data structures for the symbol registry

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};

/// Globally unique, immutable symbol identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(id: impl Into<String>) -> Self {
        SymbolId(id.into())
    }

    /// Fresh random identifier for registrations that omit one.
    pub fn generate() -> Self {
        SymbolId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(s: &str) -> Self {
        SymbolId(s.to_string())
    }
}

impl From<String> for SymbolId {
    fn from(s: String) -> Self {
        SymbolId(s)
    }
}

impl AsRef<str> for SymbolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Architectural tier, ordered from primitive to full-stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum AbstractionLevel {
    #[default]
    #[serde(rename = "L0")]
    Primitive,
    #[serde(rename = "L1")]
    Component,
    #[serde(rename = "L2")]
    Composite,
    #[serde(rename = "L3")]
    Service,
    #[serde(rename = "L4")]
    FullStack,
}

impl AbstractionLevel {
    pub const ALL: [AbstractionLevel; 5] = [
        AbstractionLevel::Primitive,
        AbstractionLevel::Component,
        AbstractionLevel::Composite,
        AbstractionLevel::Service,
        AbstractionLevel::FullStack,
    ];

    /// Numeric tier, 0 through 4.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.get(rank as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbstractionLevel::Primitive => "L0",
            AbstractionLevel::Component => "L1",
            AbstractionLevel::Composite => "L2",
            AbstractionLevel::Service => "L3",
            AbstractionLevel::FullStack => "L4",
        }
    }
}

impl FromStr for AbstractionLevel {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L0" | "0" | "PRIMITIVE" => Ok(AbstractionLevel::Primitive),
            "L1" | "1" | "COMPONENT" => Ok(AbstractionLevel::Component),
            "L2" | "2" | "COMPOSITE" => Ok(AbstractionLevel::Composite),
            "L3" | "3" | "SERVICE" => Ok(AbstractionLevel::Service),
            "L4" | "4" | "FULLSTACK" | "FULL-STACK" => Ok(AbstractionLevel::FullStack),
            other => Err(StrataError::Validation(format!("unknown abstraction level: {other}"))),
        }
    }
}

/// Generates `as_str`/`ALL`/`FromStr` for lowercase wire enums.
macro_rules! wire_enum {
    ($name:ident, $label:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = StrataError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(StrataError::Validation(format!(concat!("unknown ", $label, ": {}"), other))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Structural role of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Primitive,
    Interface,
    #[default]
    Class,
    Function,
    Module,
    Component,
    Service,
    Library,
    Application,
}

wire_enum!(SymbolKind, "symbol kind", {
    Primitive => "primitive",
    Interface => "interface",
    Class => "class",
    Function => "function",
    Module => "module",
    Component => "component",
    Service => "service",
    Library => "library",
    Application => "application",
});

/// Lifecycle status of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolStatus {
    #[default]
    Draft,
    Defined,
    Generated,
    Implemented,
    Tested,
    Deprecated,
}

wire_enum!(SymbolStatus, "symbol status", {
    Draft => "draft",
    Defined => "defined",
    Generated => "generated",
    Implemented => "implemented",
    Tested => "tested",
    Deprecated => "deprecated",
});

/// How a symbol entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SymbolOrigin {
    #[default]
    Manual,
    Imported,
    Template,
    Generated,
}

wire_enum!(SymbolOrigin, "symbol origin", {
    Manual => "manual",
    Imported => "imported",
    Template => "template",
    Generated => "generated",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Multiplicity {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0..1")]
    ZeroOrOne,
    #[serde(rename = "0..*")]
    ZeroOrMore,
    #[serde(rename = "1..*")]
    OneOrMore,
}

impl Multiplicity {
    pub fn is_collection(self) -> bool {
        matches!(self, Multiplicity::ZeroOrMore | Multiplicity::OneOrMore)
    }

    pub fn is_optional(self) -> bool {
        matches!(self, Multiplicity::ZeroOrOne | Multiplicity::ZeroOrMore)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Import,
    Inject,
    Runtime,
    Dev,
}

/// A part-of edge; shared by `composes` and `aggregates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub symbol_id: SymbolId,
    pub field_name: String,
    #[serde(default)]
    pub multiplicity: Multiplicity,
}

/// A directed uses-a edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub symbol_id: SymbolId,
    pub name: String,
    #[serde(default)]
    pub kind: DependencyKind,
    #[serde(default)]
    pub optional: bool,
}

/// All relationship data of one symbol, grouped by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Relationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<SymbolId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub implements: BTreeSet<SymbolId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composes: Vec<Composition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregates: Vec<Composition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains: Vec<SymbolId>,
}

/// One relationship instance as a tagged variant. This is the persisted shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "camelCase")]
pub enum Relationship {
    Extends { target: SymbolId },
    Implements { target: SymbolId },
    Composes(Composition),
    Aggregates(Composition),
    Dependency(Dependency),
    Contains { target: SymbolId },
}

impl Relationship {
    pub fn target(&self) -> &SymbolId {
        match self {
            Relationship::Extends { target }
            | Relationship::Implements { target }
            | Relationship::Contains { target } => target,
            Relationship::Composes(c) | Relationship::Aggregates(c) => &c.symbol_id,
            Relationship::Dependency(d) => &d.symbol_id,
        }
    }

    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            Relationship::Extends { .. } => EdgeKind::Extends,
            Relationship::Implements { .. } => EdgeKind::Implements,
            Relationship::Composes(_) => EdgeKind::Composes,
            Relationship::Aggregates(_) => EdgeKind::Aggregates,
            Relationship::Dependency(_) => EdgeKind::Dependency,
            Relationship::Contains { .. } => EdgeKind::Contains,
        }
    }

    /// Field or dependency name, when the relationship carries one.
    pub fn label(&self) -> Option<&str> {
        match self {
            Relationship::Composes(c) | Relationship::Aggregates(c) => Some(&c.field_name),
            Relationship::Dependency(d) => Some(&d.name),
            _ => None,
        }
    }
}

impl Relationships {
    /// Flatten into tagged entries, in a fixed kind order and list order within a kind.
    pub fn entries(&self) -> Vec<Relationship> {
        let mut out = Vec::new();
        if let Some(parent) = &self.extends {
            out.push(Relationship::Extends { target: parent.clone() });
        }
        out.extend(self.implements.iter().map(|t| Relationship::Implements { target: t.clone() }));
        out.extend(self.composes.iter().cloned().map(Relationship::Composes));
        out.extend(self.aggregates.iter().cloned().map(Relationship::Aggregates));
        out.extend(self.dependencies.iter().cloned().map(Relationship::Dependency));
        out.extend(self.contains.iter().map(|t| Relationship::Contains { target: t.clone() }));
        out
    }

    /// Rebuild from tagged entries. Rejects a second `extends` entry.
    pub fn from_entries(entries: impl IntoIterator<Item = Relationship>) -> StrataResult<Self> {
        let mut rel = Relationships::default();
        for entry in entries {
            match entry {
                Relationship::Extends { target } => {
                    if rel.extends.replace(target).is_some() {
                        return Err(StrataError::Validation(
                            "a symbol may extend at most one parent".to_string(),
                        ));
                    }
                }
                Relationship::Implements { target } => {
                    rel.implements.insert(target);
                }
                Relationship::Composes(c) => rel.composes.push(c),
                Relationship::Aggregates(c) => rel.aggregates.push(c),
                Relationship::Dependency(d) => rel.dependencies.push(d),
                Relationship::Contains { target } => rel.contains.push(target),
            }
        }
        Ok(rel)
    }

    pub fn is_empty(&self) -> bool {
        self.extends.is_none()
            && self.implements.is_empty()
            && self.composes.is_empty()
            && self.aggregates.is_empty()
            && self.dependencies.is_empty()
            && self.contains.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_at: Option<DateTime<Utc>>,
}

/// Bookkeeping about the last code generation for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_at: Option<DateTime<Utc>>,
}

/// The central registry entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSymbol {
    pub id: SymbolId,
    pub namespace: String,
    pub name: String,
    pub level: AbstractionLevel,
    pub kind: SymbolKind,
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: SymbolStatus,
    #[serde(default)]
    pub origin: SymbolOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub relationships: Relationships,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_info: Option<StatusInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_meta: Option<GenerationMeta>,
}

static SEMVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("semver pattern is a valid regex")
});

/// Whether `version` is a semantic version (`MAJOR.MINOR.PATCH[-pre][+build]`).
pub fn is_semver(version: &str) -> bool {
    SEMVER.is_match(version)
}

impl ComponentSymbol {
    /// Structural checks applied on every write. References to other symbols are
    /// deliberately not resolved here.
    pub fn validate(&self) -> StrataResult<()> {
        let id = self.id.as_str();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(StrataError::Validation(format!("invalid symbol id: {id:?}")));
        }
        if self.name.trim().is_empty() {
            return Err(StrataError::Validation(format!("symbol {id} has an empty name")));
        }
        if !is_semver(&self.version) {
            return Err(StrataError::Validation(format!(
                "symbol {id} has a non-semantic version: {:?}",
                self.version
            )));
        }
        let rel = &self.relationships;
        if rel.extends.as_ref() == Some(&self.id) {
            return Err(StrataError::Validation(format!("symbol {id} cannot extend itself")));
        }
        if rel.contains.contains(&self.id) {
            return Err(StrataError::Validation(format!("symbol {id} cannot contain itself")));
        }
        for part in rel.composes.iter().chain(&rel.aggregates) {
            if part.field_name.trim().is_empty() {
                return Err(StrataError::Validation(format!(
                    "symbol {id} has a part-of edge to {} without a field name",
                    part.symbol_id
                )));
            }
        }
        if let Some(dep) = rel.dependencies.iter().find(|d| d.name.trim().is_empty()) {
            return Err(StrataError::Validation(format!(
                "symbol {id} has an unnamed dependency on {}",
                dep.symbol_id
            )));
        }
        Ok(())
    }

    /// Fully qualified `namespace/name` label.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }
}

/// Registration/update input: every field of a symbol except the timestamps,
/// with an optional id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDraft {
    #[serde(default)]
    pub id: Option<SymbolId>,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub level: AbstractionLevel,
    #[serde(default)]
    pub kind: SymbolKind,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: SymbolStatus,
    #[serde(default)]
    pub origin: SymbolOrigin,
    #[serde(flatten)]
    pub relationships: Relationships,
    #[serde(default)]
    pub source_location: Option<SourceLocation>,
    #[serde(default)]
    pub status_info: Option<StatusInfo>,
    #[serde(default)]
    pub generation_meta: Option<GenerationMeta>,
}

fn default_language() -> String {
    "typescript".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl SymbolDraft {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        SymbolDraft {
            id: None,
            namespace: namespace.into(),
            name: name.into(),
            level: AbstractionLevel::default(),
            kind: SymbolKind::default(),
            language: default_language(),
            version: default_version(),
            tags: BTreeSet::new(),
            description: String::new(),
            status: SymbolStatus::default(),
            origin: SymbolOrigin::default(),
            relationships: Relationships::default(),
            source_location: None,
            status_info: None,
            generation_meta: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<SymbolId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_kind(mut self, kind: SymbolKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_level(mut self, level: AbstractionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: SymbolStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_origin(mut self, origin: SymbolOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn extending(mut self, parent: impl Into<SymbolId>) -> Self {
        self.relationships.extends = Some(parent.into());
        self
    }

    pub fn implementing(mut self, interface: impl Into<SymbolId>) -> Self {
        self.relationships.implements.insert(interface.into());
        self
    }

    /// Adds a dependency named after the target id.
    pub fn depends_on(mut self, target: impl Into<SymbolId>) -> Self {
        let symbol_id = target.into();
        self.relationships.dependencies.push(Dependency {
            name: symbol_id.0.clone(),
            symbol_id,
            kind: DependencyKind::default(),
            optional: false,
        });
        self
    }

    pub fn containing(mut self, child: impl Into<SymbolId>) -> Self {
        self.relationships.contains.push(child.into());
        self
    }

    pub fn composing(
        mut self,
        part: impl Into<SymbolId>,
        field_name: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        self.relationships.composes.push(Composition {
            symbol_id: part.into(),
            field_name: field_name.into(),
            multiplicity,
        });
        self
    }

    pub fn aggregating(
        mut self,
        part: impl Into<SymbolId>,
        field_name: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        self.relationships.aggregates.push(Composition {
            symbol_id: part.into(),
            field_name: field_name.into(),
            multiplicity,
        });
        self
    }

    /// Materialise into a symbol with the given identity and timestamps.
    pub fn into_symbol(self, id: SymbolId, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> ComponentSymbol {
        ComponentSymbol {
            id,
            namespace: self.namespace,
            name: self.name,
            level: self.level,
            kind: self.kind,
            language: self.language,
            version: self.version,
            tags: self.tags,
            description: self.description,
            status: self.status,
            origin: self.origin,
            created_at,
            updated_at,
            relationships: self.relationships,
            source_location: self.source_location,
            status_info: self.status_info,
            generation_meta: self.generation_meta,
        }
    }
}

impl From<ComponentSymbol> for SymbolDraft {
    fn from(symbol: ComponentSymbol) -> Self {
        SymbolDraft {
            id: Some(symbol.id),
            namespace: symbol.namespace,
            name: symbol.name,
            level: symbol.level,
            kind: symbol.kind,
            language: symbol.language,
            version: symbol.version,
            tags: symbol.tags,
            description: symbol.description,
            status: symbol.status,
            origin: symbol.origin,
            relationships: symbol.relationships,
            source_location: symbol.source_location,
            status_info: symbol.status_info,
            generation_meta: symbol.generation_meta,
        }
    }
}

/// What kind of relationship a graph edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Dependency,
    Extends,
    Implements,
    Composes,
    Aggregates,
    Contains,
}

wire_enum!(EdgeKind, "edge kind", {
    Dependency => "dependency",
    Extends => "extends",
    Implements => "implements",
    Composes => "composes",
    Aggregates => "aggregates",
    Contains => "contains",
});

/// A graph node: classification only, no relationship payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: SymbolId,
    pub name: String,
    pub namespace: String,
    pub level: AbstractionLevel,
    pub kind: SymbolKind,
}

impl From<&ComponentSymbol> for GraphNode {
    fn from(symbol: &ComponentSymbol) -> Self {
        GraphNode {
            id: symbol.id.clone(),
            name: symbol.name.clone(),
            namespace: symbol.namespace.clone(),
            level: symbol.level,
            kind: symbol.kind,
        }
    }
}

/// A directed edge from the owning symbol to the referenced symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: SymbolId,
    pub target: SymbolId,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
