//! Strata Core: symbol model, dependency graph engine, and validation

pub mod analysis;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod graph;
pub mod model;
pub mod source;
pub mod validation;


#[cfg(test)]
mod test_utils;

pub use analysis::{GraphStats, compute_stats, cycles_over, detect_cycles, topological_order};
pub use engine::{GraphEngine, GraphReport};
pub use envelope::{Envelope, ErrorBody};
pub use error::{ErrorKind, StrataError, StrataResult};
pub use graph::SymbolGraph;
pub use model::{
    AbstractionLevel, ComponentSymbol, Composition, Dependency, DependencyKind, EdgeKind, GenerationMeta, GraphEdge,
    GraphNode, Multiplicity, Relationship, Relationships, SourceLocation, StatusInfo, SymbolDraft, SymbolId,
    SymbolKind, SymbolOrigin, SymbolStatus, is_semver,
};
pub use source::SymbolSource;
pub use validation::{IssueCode, Severity, ValidationIssue, ValidationReport, validate};
