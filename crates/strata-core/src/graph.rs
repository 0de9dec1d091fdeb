//! Symbol graph wrapper using petgraph::StableDiGraph keyed by SymbolId

use crate::model::*;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Directed multigraph of symbols; one edge per relationship instance.
///
/// Nodes are inserted in ascending id order, so node index order equals id
/// order and every algorithm over the graph is deterministic.
pub struct SymbolGraph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    index: HashMap<SymbolId, NodeIndex>,
    unresolved: usize,
}

impl std::fmt::Debug for SymbolGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("unresolved", &self.unresolved)
            .finish()
    }
}

impl SymbolGraph {
    pub fn new() -> Self {
        SymbolGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
            unresolved: 0,
        }
    }

    /// Build from a registry snapshot. Relationships whose target is not in the
    /// snapshot are dropped and counted in [`SymbolGraph::unresolved_count`].
    pub fn from_symbols(symbols: &[ComponentSymbol]) -> Self {
        let mut sorted: Vec<&ComponentSymbol> = symbols.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);

        let mut graph = SymbolGraph::new();
        for symbol in &sorted {
            graph.add_node(GraphNode::from(*symbol));
        }
        for symbol in &sorted {
            for rel in symbol.relationships.entries() {
                let edge = GraphEdge {
                    source: symbol.id.clone(),
                    target: rel.target().clone(),
                    kind: rel.edge_kind(),
                    label: rel.label().map(str::to_string),
                };
                if !graph.add_edge(edge) {
                    tracing::debug!(
                        "Dropping unresolved {} edge {} -> {}",
                        rel.edge_kind(),
                        symbol.id,
                        rel.target()
                    );
                    graph.unresolved += 1;
                }
            }
        }
        graph
    }

    /// Add a node. An existing node with the same id is replaced.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            if let Some(weight) = self.inner.node_weight_mut(idx) {
                *weight = node;
            }
            return idx;
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Add an edge. Returns `false` when either endpoint is missing.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        let (Some(&source), Some(&target)) = (self.index.get(&edge.source), self.index.get(&edge.target))
        else {
            return false;
        };
        self.inner.add_edge(source, target, edge);
        true
    }

    /// Get a node by ID.
    pub fn node(&self, id: &SymbolId) -> Option<&GraphNode> {
        self.index.get(id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.index.contains_key(id)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Relationships dropped during construction because their target was absent.
    pub fn unresolved_count(&self) -> usize {
        self.unresolved
    }

    /// Iterate over all nodes in id order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges in insertion order.
    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Get all outgoing edges from a node.
    pub fn edges_from(&self, source: &SymbolId) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.index.get(source).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Outgoing)
                .map(|edge_ref| edge_ref.weight())
        })
    }

    /// Check if an edge exists between two nodes of a specific kind.
    pub fn has_edge_between(&self, source: &SymbolId, target: &SymbolId, kind: EdgeKind) -> bool {
        self.edges_from(source)
            .any(|e| &e.target == target && e.kind == kind)
    }

    /// Dense position (0..node_count) of a node, matching id order.
    pub fn position(&self, id: &SymbolId) -> Option<usize> {
        self.index.get(id).map(|idx| idx.index())
    }

    /// Node ids indexed by dense position.
    pub fn ids(&self) -> Vec<SymbolId> {
        self.all_nodes().map(|n| n.id.clone()).collect()
    }

    /// Every edge as `(source position, target position, kind)`, multi-edges kept.
    pub fn positioned_edges(&self) -> Vec<(usize, usize, EdgeKind)> {
        self.inner
            .edge_indices()
            .filter_map(|idx| {
                let (source, target) = self.inner.edge_endpoints(idx)?;
                let edge = self.inner.edge_weight(idx)?;
                Some((source.index(), target.index(), edge.kind))
            })
            .collect()
    }

    /// Deduplicated, ascending successor lists over edges of the given kinds.
    pub fn adjacency(&self, kinds: &[EdgeKind]) -> Vec<Vec<usize>> {
        let mut adj = vec![BTreeSet::new(); self.node_count()];
        for (source, target, kind) in self.positioned_edges() {
            if kinds.contains(&kind) {
                adj[source].insert(target);
            }
        }
        adj.into_iter().map(|s| s.into_iter().collect()).collect()
    }

    /// Seed plus everything reachable forwards (dependencies) and backwards
    /// (dependents) along edges of every kind.
    pub fn neighborhood(&self, seed: &SymbolId) -> BTreeSet<SymbolId> {
        let mut keep = BTreeSet::new();
        let Some(&start) = self.index.get(seed) else {
            return keep;
        };
        for direction in [Direction::Outgoing, Direction::Incoming] {
            let mut seen = BTreeSet::from([start]);
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for next in self.inner.neighbors_directed(current, direction) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            keep.extend(seen.into_iter().filter_map(|idx| self.inner.node_weight(idx)).map(|n| n.id.clone()));
        }
        keep
    }
}

impl Default for SymbolGraph {
    fn default() -> Self {
        Self::new()
    }
}
