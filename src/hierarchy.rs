//! Graph hierarchy - parent/child links between graph specs
//!
//! Specs form a forest: roots have no parent, extensions name theirs.
//! Resolution walks it level by level so every parent is fully resolved
//! before its children.

use crate::declaration::GraphSpec;
use crate::{Error, Result};
use std::collections::HashMap;

/// Index of a graph spec in the declaration set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u32);

impl GraphId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphHierarchy {
    names: Vec<String>,
    ids: HashMap<String, GraphId>,
    /// child → parent
    parents: HashMap<GraphId, GraphId>,
    depths: Vec<usize>,
}

impl GraphHierarchy {
    pub fn build(specs: &[GraphSpec]) -> Result<Self> {
        let mut hierarchy = Self::default();

        for (i, spec) in specs.iter().enumerate() {
            let id = GraphId(i as u32);
            if hierarchy.ids.insert(spec.name.clone(), id).is_some() {
                return Err(Error::InvalidHierarchy(format!("graph {} is declared twice", spec.name)));
            }
            hierarchy.names.push(spec.name.clone());
        }

        for (i, spec) in specs.iter().enumerate() {
            let Some(parent) = &spec.parent else {
                continue;
            };
            let id = GraphId(i as u32);
            let parent_id = hierarchy.id(parent).ok_or_else(|| {
                Error::InvalidHierarchy(format!("graph {} extends unknown graph {}", spec.name, parent))
            })?;
            hierarchy.parents.insert(id, parent_id);
        }

        hierarchy.depths = (0..specs.len())
            .map(|i| hierarchy.compute_depth(GraphId(i as u32)))
            .collect::<Result<_>>()?;
        Ok(hierarchy)
    }

    fn compute_depth(&self, id: GraphId) -> Result<usize> {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            if depth > self.names.len() {
                return Err(Error::InvalidHierarchy(format!(
                    "graph {} is its own ancestor",
                    self.name(id)
                )));
            }
            current = parent;
        }
        Ok(depth)
    }

    pub fn id(&self, name: &str) -> Option<GraphId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: GraphId) -> &str {
        &self.names[id.index()]
    }

    pub fn parent(&self, id: GraphId) -> Option<GraphId> {
        self.parents.get(&id).copied()
    }

    pub fn depth(&self, id: GraphId) -> usize {
        self.depths[id.index()]
    }

    /// Ancestors from the direct parent up to the root
    pub fn ancestors(&self, id: GraphId) -> Vec<GraphId> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Graphs grouped by depth; each level keeps declaration order
    pub fn levels(&self) -> Vec<Vec<GraphId>> {
        let max_depth = self.depths.iter().copied().max();
        let Some(max_depth) = max_depth else {
            return Vec::new();
        };
        let mut levels = vec![Vec::new(); max_depth + 1];
        for (i, depth) in self.depths.iter().enumerate() {
            levels[*depth].push(GraphId(i as u32));
        }
        levels
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
