//! Pure algorithms over a [`SymbolGraph`]: elementary cycles, topological
//! order and summary statistics.
//!
//! Determinism policy:
//! - cycles are found with Johnson's algorithm over `dependency` edges; each
//!   cycle starts at its smallest id and follows edge direction, and the list
//!   of cycles is sorted lexicographically;
//! - the topological order drains ready nodes smallest id first;
//! - `max_depth` is measured over the SCC condensation, so every dependency
//!   cycle collapses into one node.
//!
//! Every traversal keeps its own stack on the heap, so chain length is not
//! bounded by the thread's stack size.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use petgraph::algo::{condensation, kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::graph::SymbolGraph;
use crate::model::{EdgeKind, SymbolId};

/// Summary numbers for a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Nodes with no incoming dependency edge.
    pub root_count: usize,
    /// Nodes with no outgoing dependency edge.
    pub leaf_count: usize,
    pub connected_component_count: usize,
    pub has_cycles: bool,
    /// Longest dependency chain, in edges, over the condensation.
    pub max_depth: usize,
    pub edge_kind_counts: BTreeMap<EdgeKind, usize>,
    /// Relationships dropped because their target is not registered.
    pub unresolved_edge_count: usize,
}

/// All elementary dependency cycles, as ordered id sequences.
pub fn detect_cycles(graph: &SymbolGraph) -> Vec<Vec<SymbolId>> {
    cycles_over(graph, &[EdgeKind::Dependency])
}

/// All elementary cycles formed by edges of the given kinds.
pub fn cycles_over(graph: &SymbolGraph, kinds: &[EdgeKind]) -> Vec<Vec<SymbolId>> {
    let ids = graph.ids();
    let adj = graph.adjacency(kinds);
    let mut cycles: Vec<Vec<SymbolId>> = elementary_cycles(&adj)
        .into_iter()
        .map(|cycle| cycle.into_iter().map(|pos| ids[pos].clone()).collect())
        .collect();
    cycles.sort();
    cycles
}

/// Kahn's algorithm over every edge kind. For an edge `A -> B` ("A depends on
/// B") B precedes A. Returns `None` if any cycle exists.
pub fn topological_order(graph: &SymbolGraph) -> Option<Vec<SymbolId>> {
    let ids = graph.ids();
    let n = ids.len();
    let mut pending = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (source, target, _) in graph.positioned_edges() {
        pending[source] += 1;
        dependents[target].push(source);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n).filter(|&v| pending[v] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(v)) = ready.pop() {
        order.push(ids[v].clone());
        for &dependent in &dependents[v] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == n {
        Some(order)
    } else {
        tracing::debug!("Topological order unavailable: {} of {} nodes are on or behind a cycle", n - order.len(), n);
        None
    }
}

pub fn compute_stats(graph: &SymbolGraph) -> GraphStats {
    let n = graph.node_count();
    let deps = graph.adjacency(&[EdgeKind::Dependency]);

    let mut has_dependent = vec![false; n];
    for targets in &deps {
        for &t in targets {
            has_dependent[t] = true;
        }
    }

    let mut components = UnionFind::<usize>::new(n);
    let mut edge_kind_counts = BTreeMap::new();
    for (source, target, kind) in graph.positioned_edges() {
        components.union(source, target);
        *edge_kind_counts.entry(kind).or_insert(0) += 1;
    }
    let component_roots: BTreeSet<usize> = (0..n).map(|v| components.find(v)).collect();

    let dep_graph = to_digraph(&deps);
    let has_cycles = kosaraju_scc(&dep_graph)
        .iter()
        .any(|scc| scc.len() > 1 || deps[scc[0].index()].contains(&scc[0].index()));

    GraphStats {
        node_count: n,
        edge_count: graph.edge_count(),
        root_count: has_dependent.iter().filter(|&&d| !d).count(),
        leaf_count: deps.iter().filter(|targets| targets.is_empty()).count(),
        connected_component_count: component_roots.len(),
        has_cycles,
        max_depth: max_depth(dep_graph),
        edge_kind_counts,
        unresolved_edge_count: graph.unresolved_count(),
    }
}

fn to_digraph(adj: &[Vec<usize>]) -> DiGraph<usize, ()> {
    let mut g = DiGraph::with_capacity(adj.len(), 0);
    let nodes: Vec<NodeIndex> = (0..adj.len()).map(|v| g.add_node(v)).collect();
    for (source, targets) in adj.iter().enumerate() {
        for &target in targets {
            g.add_edge(nodes[source], nodes[target], ());
        }
    }
    g
}

/// Longest path (in edges) of the acyclic condensation, relaxed in reverse
/// topological order.
fn max_depth(dep_graph: DiGraph<usize, ()>) -> usize {
    let condensed = condensation(dep_graph, true);
    let order = match toposort(&condensed, None) {
        Ok(order) => order,
        Err(cycle) => {
            tracing::warn!("Condensation still has a cycle at {:?}", cycle.node_id());
            return 0;
        }
    };
    let mut depth = vec![0usize; condensed.node_count()];
    for &v in order.iter().rev() {
        depth[v.index()] = condensed
            .neighbors(v)
            .map(|w| depth[w.index()] + 1)
            .max()
            .unwrap_or(0);
    }
    depth.into_iter().max().unwrap_or(0)
}

/// Johnson's algorithm. Each returned cycle begins at its smallest position.
///
/// Only components that contain a cycle are searched. After the cycles
/// through a component's smallest vertex are found, that vertex is dropped
/// and the rest of the component is split again.
pub(crate) fn elementary_cycles(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut slots: Vec<Option<usize>> = vec![None; n];
    let mut search = CircuitSearch {
        adj,
        allowed: vec![false; n],
        blocked: vec![false; n],
        blocked_by: vec![Vec::new(); n],
        members: Vec::new(),
        stack: Vec::new(),
        cycles: Vec::new(),
    };

    let everything: Vec<usize> = (0..n).collect();
    let mut pending = cyclic_components(adj, &everything, &mut slots);
    while let Some(component) = pending.pop() {
        search.reset(&component);
        search.circuit(component[0]);
        pending.extend(cyclic_components(adj, &component[1..], &mut slots));
    }
    search.cycles
}

/// Strongly connected components of the subgraph induced by `members` that
/// contain at least one cycle, each sorted ascending. `slots` is scratch
/// space of length `adj.len()`, all `None` on entry and on return.
fn cyclic_components(adj: &[Vec<usize>], members: &[usize], slots: &mut [Option<usize>]) -> Vec<Vec<usize>> {
    let mut sub: DiGraph<usize, ()> = DiGraph::with_capacity(members.len(), 0);
    for (local, &v) in members.iter().enumerate() {
        slots[v] = Some(local);
        sub.add_node(v);
    }
    for (local, &v) in members.iter().enumerate() {
        for &w in &adj[v] {
            if let Some(target) = slots[w] {
                sub.add_edge(NodeIndex::new(local), NodeIndex::new(target), ());
            }
        }
    }
    for &v in members {
        slots[v] = None;
    }

    kosaraju_scc(&sub)
        .into_iter()
        .filter_map(|scc| {
            let mut component: Vec<usize> = scc.into_iter().map(|idx| sub[idx]).collect();
            component.sort_unstable();
            let cyclic = component.len() > 1 || adj[component[0]].contains(&component[0]);
            cyclic.then_some(component)
        })
        .collect()
}

struct CircuitSearch<'a> {
    adj: &'a [Vec<usize>],
    allowed: Vec<bool>,
    blocked: Vec<bool>,
    blocked_by: Vec<Vec<usize>>,
    /// Vertices allowed by the last `reset`.
    members: Vec<usize>,
    stack: Vec<usize>,
    cycles: Vec<Vec<usize>>,
}

/// One vertex on the search path and the next successor to try.
struct Frame {
    v: usize,
    next: usize,
    found: bool,
}

impl CircuitSearch<'_> {
    fn reset(&mut self, component: &[usize]) {
        for &v in &self.members {
            self.allowed[v] = false;
            self.blocked[v] = false;
            self.blocked_by[v].clear();
        }
        self.members.clear();
        self.members.extend_from_slice(component);
        for &v in component {
            self.allowed[v] = true;
        }
    }

    /// Record every elementary cycle through `start` among allowed vertices.
    fn circuit(&mut self, start: usize) {
        let adj = self.adj;
        self.stack.push(start);
        self.blocked[start] = true;
        let mut frames = vec![Frame {
            v: start,
            next: 0,
            found: false,
        }];

        while let Some(frame) = frames.last_mut() {
            let v = frame.v;
            if let Some(&w) = adj[v].get(frame.next) {
                frame.next += 1;
                if !self.allowed[w] {
                    continue;
                }
                if w == start {
                    self.cycles.push(self.stack.clone());
                    frame.found = true;
                } else if !self.blocked[w] {
                    self.stack.push(w);
                    self.blocked[w] = true;
                    frames.push(Frame {
                        v: w,
                        next: 0,
                        found: false,
                    });
                }
                continue;
            }

            let found = frame.found;
            frames.pop();
            if found {
                self.unblock(v);
            } else {
                for &w in &adj[v] {
                    if self.allowed[w] && !self.blocked_by[w].contains(&v) {
                        self.blocked_by[w].push(v);
                    }
                }
            }
            self.stack.pop();
            if found {
                if let Some(parent) = frames.last_mut() {
                    parent.found = true;
                }
            }
        }
    }

    fn unblock(&mut self, u: usize) {
        let mut pending = vec![u];
        while let Some(x) = pending.pop() {
            self.blocked[x] = false;
            for w in std::mem::take(&mut self.blocked_by[x]) {
                if self.blocked[w] {
                    pending.push(w);
                }
            }
        }
    }
}
