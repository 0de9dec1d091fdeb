//! Stateless dependency graph engine over a borrowed [`SymbolSource`]

use serde::{Deserialize, Serialize};

use crate::analysis::{self, GraphStats};
use crate::error::StrataResult;
use crate::graph::SymbolGraph;
use crate::model::{ComponentSymbol, GraphEdge, GraphNode, SymbolId};
use crate::source::SymbolSource;
use crate::validation::{self, ValidationReport};

/// Plain-data result of a graph build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// `None` when any cycle exists.
    pub topological_order: Option<Vec<SymbolId>>,
    pub cycles: Vec<Vec<SymbolId>>,
}

impl GraphReport {
    pub fn from_graph(graph: &SymbolGraph) -> Self {
        GraphReport {
            nodes: graph.all_nodes().cloned().collect(),
            edges: graph.all_edges().cloned().collect(),
            topological_order: analysis::topological_order(graph),
            cycles: analysis::detect_cycles(graph),
        }
    }
}

/// Every operation takes a fresh snapshot through one `symbols()` call. The
/// snapshot is only as consistent as that call: a source that is written to
/// concurrently may be observed mid-update by a later operation.
pub struct GraphEngine<S> {
    source: S,
}

impl<S: SymbolSource> GraphEngine<S> {
    pub fn new(source: S) -> Self {
        GraphEngine { source }
    }

    fn snapshot(&self) -> StrataResult<Vec<ComponentSymbol>> {
        self.source.symbols()
    }

    /// The full graph of the registry.
    pub fn graph(&self) -> StrataResult<SymbolGraph> {
        Ok(SymbolGraph::from_symbols(&self.snapshot()?))
    }

    pub fn build_graph(&self) -> StrataResult<GraphReport> {
        let graph = self.graph()?;
        if graph.unresolved_count() > 0 {
            tracing::warn!("Graph built with {} unresolved relationship(s)", graph.unresolved_count());
        }
        let report = GraphReport::from_graph(&graph);
        tracing::info!(
            "Built graph: {} nodes, {} edges, {} cycle(s)",
            report.nodes.len(),
            report.edges.len(),
            report.cycles.len()
        );
        Ok(report)
    }

    /// The induced subgraph over `id`, its transitive dependencies and its
    /// transitive dependents. `None` when `id` is not registered.
    pub fn build_subgraph(&self, id: &SymbolId) -> StrataResult<Option<GraphReport>> {
        let symbols = self.snapshot()?;
        let full = SymbolGraph::from_symbols(&symbols);
        if !full.contains(id) {
            return Ok(None);
        }
        let keep = full.neighborhood(id);
        let subset: Vec<ComponentSymbol> = symbols.into_iter().filter(|s| keep.contains(&s.id)).collect();
        let sub = SymbolGraph::from_symbols(&subset);
        tracing::debug!("Subgraph of {}: {} of {} nodes", id, sub.node_count(), full.node_count());
        Ok(Some(GraphReport::from_graph(&sub)))
    }

    pub fn detect_cycles(&self) -> StrataResult<Vec<Vec<SymbolId>>> {
        Ok(analysis::detect_cycles(&self.graph()?))
    }

    pub fn topological_order(&self) -> StrataResult<Option<Vec<SymbolId>>> {
        Ok(analysis::topological_order(&self.graph()?))
    }

    pub fn stats(&self) -> StrataResult<GraphStats> {
        Ok(analysis::compute_stats(&self.graph()?))
    }

    /// Registry-wide referential and structural checks.
    pub fn validate(&self) -> StrataResult<ValidationReport> {
        Ok(validation::validate(&self.snapshot()?))
    }
}
