//! Binding Graph - arena of bindings keyed by `TypeKey`
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]; the index of a node
//! is the order in which the builder first reached it, which doubles as the
//! declaration order used for deterministic tie breaks. Edges are plain index
//! arrays so SCC and topological passes get O(1) neighbour lookup.

use crate::binding::{Binding, BindingTag};
use crate::key::{ContextualTypeKey, Origin, TypeKey};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Index of a binding in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resolved dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub target: NodeId,
    /// How the consumer receives the target
    pub dependency: ContextualTypeKey,
}

impl GraphEdge {
    pub fn is_deferrable(&self) -> bool {
        self.dependency.is_deferrable()
    }
}

/// A dependency edge whose target has no binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEdge {
    pub from: Option<NodeId>,
    pub dependency: ContextualTypeKey,
    /// Breadth-first path from the nearest requested root to the missing key
    pub path: Vec<TypeKey>,
}

/// A declared binding the walk never reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedDeclaration {
    pub key: TypeKey,
    pub origin: Origin,
    /// Bound instances are reported as unused graph inputs
    pub is_input: bool,
}

/// `TypeKey -> Binding` map plus the dependency edges implied by each binding.
#[derive(Debug, Clone, Default)]
pub struct BindingGraph {
    name: String,
    nodes: Vec<Binding>,
    index: HashMap<TypeKey, NodeId>,
    edges: Vec<Vec<GraphEdge>>,
    roots: Vec<ContextualTypeKey>,
    missing: Vec<MissingEdge>,
    unused: Vec<UnusedDeclaration>,
}

impl BindingGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a binding; fails with the occupying node when the key is taken
    pub fn insert(&mut self, binding: Binding) -> std::result::Result<NodeId, NodeId> {
        if let Some(existing) = self.index.get(&binding.key) {
            return Err(*existing);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.index.insert(binding.key.clone(), id);
        self.nodes.push(binding);
        self.edges.push(Vec::new());
        Ok(id)
    }

    /// Rebuild every node's outgoing edges from its dependency list.
    ///
    /// Dependencies without a node are skipped here; the builder records
    /// them as missing edges.
    pub fn link(&mut self) {
        let edges = self
            .nodes
            .iter()
            .map(|binding| {
                binding
                    .dependencies()
                    .into_iter()
                    .filter_map(|dependency| {
                        self.index.get(&dependency.key).map(|target| GraphEdge {
                            target: *target,
                            dependency,
                        })
                    })
                    .collect()
            })
            .collect();
        self.edges = edges;
    }

    pub fn add_root(&mut self, key: ContextualTypeKey) {
        self.roots.push(key);
    }

    pub fn add_missing(&mut self, missing: MissingEdge) {
        self.missing.push(missing);
    }

    pub fn add_unused(&mut self, unused: UnusedDeclaration) {
        self.unused.push(unused);
    }

    pub fn id_of(&self, key: &TypeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Binding> {
        self.id_of(key).map(|id| &self.nodes[id.index()])
    }

    pub fn node(&self, id: NodeId) -> &Binding {
        &self.nodes[id.index()]
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn edges_from(&self, id: NodeId) -> &[GraphEdge] {
        self.edges.get(id.index()).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[ContextualTypeKey] {
        &self.roots
    }

    pub fn missing(&self) -> &[MissingEdge] {
        &self.missing
    }

    pub fn unused(&self) -> &[UnusedDeclaration] {
        &self.unused
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Successor index arrays restricted to edges accepted by `keep`
    pub fn adjacency(&self, keep: impl Fn(&GraphEdge) -> bool) -> Vec<Vec<usize>> {
        self.edges
            .iter()
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| keep(e))
                    .map(|e| e.target.index())
                    .collect()
            })
            .collect()
    }

    /// Key-sorted view, for output
    pub fn by_key(&self) -> BTreeMap<&TypeKey, &Binding> {
        self.nodes.iter().map(|b| (&b.key, b)).collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut by_kind = BTreeMap::new();
        for binding in &self.nodes {
            *by_kind.entry(binding.tag()).or_insert(0) += 1;
        }
        let total_edges: usize = self.edges.iter().map(Vec::len).sum();
        let deferred_edges = self
            .edges
            .iter()
            .flat_map(|v| v.iter())
            .filter(|e| e.is_deferrable())
            .count();

        GraphStats {
            total_bindings: self.nodes.len(),
            scoped_bindings: self.nodes.iter().filter(|b| b.is_scoped()).count(),
            inherited_bindings: self.nodes.iter().filter(|b| b.provenance.is_inherited()).count(),
            total_edges,
            deferred_edges,
            by_kind,
        }
    }
}

impl Serialize for BindingGraph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sorted = self.by_key();
        let mut map = serializer.serialize_map(Some(sorted.len()))?;
        for (key, binding) in sorted {
            map.serialize_entry(&key.to_string(), binding)?;
        }
        map.end()
    }
}

/// Statistics about a binding graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub total_bindings: usize,
    pub scoped_bindings: usize,
    pub inherited_bindings: usize,
    pub total_edges: usize,
    pub deferred_edges: usize,
    pub by_kind: BTreeMap<BindingTag, usize>,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Binding Graph Statistics:")?;
        writeln!(
            f,
            "  Bindings: {} (scoped: {}, inherited: {})",
            self.total_bindings, self.scoped_bindings, self.inherited_bindings
        )?;
        writeln!(f, "  Edges: {} (deferred: {})", self.total_edges, self.deferred_edges)?;
        for (kind, count) in &self.by_kind {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingKind;
    use crate::key::Wrapping;

    fn constructor(name: &str, deps: Vec<ContextualTypeKey>) -> Binding {
        Binding::new(
            TypeKey::new(name),
            BindingKind::Constructor { parameters: deps },
            Origin::new(name),
        )
    }

    #[test]
    fn test_insert_is_unique_per_key() {
        let mut graph = BindingGraph::new("AppGraph");
        let first = graph.insert(constructor("A", vec![])).unwrap();
        let second = graph.insert(constructor("A", vec![]));
        assert_eq!(second, Err(first));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_link_builds_index_edges() {
        let mut graph = BindingGraph::new("AppGraph");
        let a = graph
            .insert(constructor(
                "A",
                vec![
                    ContextualTypeKey::direct(TypeKey::new("B")),
                    ContextualTypeKey::wrapped(TypeKey::new("C"), Wrapping::Provider),
                    ContextualTypeKey::direct(TypeKey::new("Missing")),
                ],
            ))
            .unwrap();
        let b = graph.insert(constructor("B", vec![])).unwrap();
        graph.insert(constructor("C", vec![])).unwrap();
        graph.link();

        let edges = graph.edges_from(a);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].target, b);
        assert!(edges[1].is_deferrable());

        let direct_only = graph.adjacency(|e| !e.is_deferrable());
        assert_eq!(direct_only[a.index()], vec![b.index()]);
    }

    #[test]
    fn test_stats_count_kinds() {
        let mut graph = BindingGraph::new("AppGraph");
        graph.insert(constructor("A", vec![ContextualTypeKey::direct(TypeKey::new("B"))])).unwrap();
        graph.insert(constructor("B", vec![])).unwrap();
        graph.insert(Binding::absent(TypeKey::new("C"))).unwrap();
        graph.link();

        let stats = graph.stats();
        assert_eq!(stats.total_bindings, 3);
        assert_eq!(stats.total_edges, 1);
        assert_eq!(stats.by_kind.get(&BindingTag::Constructor), Some(&2));
        assert!(stats.to_string().contains("Bindings: 3"));
    }
}
