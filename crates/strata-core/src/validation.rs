//! Registry-wide validation pass
//!
//! Writes only reject structurally malformed symbols. Anything that needs the
//! rest of the registry to judge (dangling references, containment forests,
//! inheritance loops) is detected here instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis;
use crate::graph::SymbolGraph;
use crate::model::{ComponentSymbol, EdgeKind, SymbolId, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueCode {
    DanglingReference,
    ContainmentCycle,
    MultipleContainers,
    InheritanceCycle,
    ImplementsNonInterface,
    DependencyCycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub severity: Severity,
    pub symbol_id: SymbolId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<EdgeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SymbolId>,
    /// Involved ids in order, for cycle issues.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<SymbolId>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// No error-severity issues.
    pub valid: bool,
    pub checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

pub fn validate(symbols: &[ComponentSymbol]) -> ValidationReport {
    let by_id: BTreeMap<&SymbolId, &ComponentSymbol> = symbols.iter().map(|s| (&s.id, s)).collect();
    let mut issues = Vec::new();
    let mut containers: BTreeMap<&SymbolId, Vec<&SymbolId>> = BTreeMap::new();

    for symbol in by_id.values() {
        for rel in symbol.relationships.entries() {
            let target = rel.target();
            let kind = rel.edge_kind();
            match by_id.get(target) {
                None => issues.push(ValidationIssue {
                    code: IssueCode::DanglingReference,
                    severity: Severity::Error,
                    symbol_id: symbol.id.clone(),
                    relation: Some(kind),
                    target: Some(target.clone()),
                    path: Vec::new(),
                    message: format!("{} {} unregistered symbol {}", symbol.id, kind, target),
                }),
                Some(found) if kind == EdgeKind::Implements && found.kind != SymbolKind::Interface => {
                    issues.push(ValidationIssue {
                        code: IssueCode::ImplementsNonInterface,
                        severity: Severity::Error,
                        symbol_id: symbol.id.clone(),
                        relation: Some(kind),
                        target: Some(target.clone()),
                        path: Vec::new(),
                        message: format!("{} implements {}, which is a {}", symbol.id, target, found.kind),
                    });
                }
                Some(_) => {}
            }
        }
        for child in &symbol.relationships.contains {
            let parents = containers.entry(child).or_default();
            if !parents.contains(&&symbol.id) {
                parents.push(&symbol.id);
            }
        }
    }

    for (child, parents) in &containers {
        if parents.len() > 1 {
            let names: Vec<&str> = parents.iter().map(|p| p.as_str()).collect();
            issues.push(ValidationIssue {
                code: IssueCode::MultipleContainers,
                severity: Severity::Error,
                symbol_id: (*child).clone(),
                relation: Some(EdgeKind::Contains),
                target: None,
                path: parents.iter().map(|p| (*p).clone()).collect(),
                message: format!("{} is contained by {} symbols: {}", child, parents.len(), names.join(", ")),
            });
        }
    }

    let graph = SymbolGraph::from_symbols(symbols);
    let cycle_checks = [
        (EdgeKind::Contains, IssueCode::ContainmentCycle, Severity::Error),
        (EdgeKind::Extends, IssueCode::InheritanceCycle, Severity::Error),
        (EdgeKind::Dependency, IssueCode::DependencyCycle, Severity::Warning),
    ];
    for (kind, code, severity) in cycle_checks {
        for cycle in analysis::cycles_over(&graph, &[kind]) {
            let rendered: Vec<&str> = cycle.iter().map(SymbolId::as_str).collect();
            issues.push(ValidationIssue {
                code,
                severity,
                symbol_id: cycle[0].clone(),
                relation: Some(kind),
                target: None,
                message: format!("{} cycle: {} -> {}", kind, rendered.join(" -> "), rendered[0]),
                path: cycle,
            });
        }
    }

    let valid = !issues.iter().any(|i| i.severity == Severity::Error);
    if !valid {
        tracing::warn!("Registry validation found {} issue(s)", issues.len());
    }
    ValidationReport {
        valid,
        checked: by_id.len(),
        issues,
    }
}
