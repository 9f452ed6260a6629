//! Declaration records - the already-extracted input of a resolution run
//!
//! Source discovery happens elsewhere; this module only describes what it
//! hands over: binding declarations, scope contributions and graph specs.

use crate::binding::{Binding, BindingKind, CollectionKind, MultibindingEntry, Provenance};
use crate::key::{ContextualTypeKey, Origin, ScopeMarker, TypeKey};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// What a declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// Injectable class; `dependencies` are its constructor/member parameters
    Constructor,
    /// Factory function; `dependencies` are its parameters
    Provider,
    /// `binds`: the single dependency is the implementation key
    Alias,
    /// Externally supplied graph input
    BoundInstance,
    /// Declares a multibinding that may legally be empty
    Multibinds,
}

/// Marks a declaration as an element of a set or map multibinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultibindingTarget {
    pub collection: CollectionKind,
    /// Key of the aggregate, e.g. `Set<Plugin>`
    pub key: TypeKey,
    /// Aggregation key, required for map elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_key: Option<String>,
}

/// One binding declaration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDeclaration {
    pub origin: Origin,
    pub kind: DeclarationKind,
    /// Key this declaration satisfies (for elements: the element value type)
    pub key: TypeKey,
    #[serde(default)]
    pub dependencies: Vec<ContextualTypeKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multibinding: Option<MultibindingTarget>,
    /// Collection shape, for `Multibinds` declarations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionKind>,
}

impl BindingDeclaration {
    fn new(kind: DeclarationKind, origin: impl Into<String>, key: TypeKey) -> Self {
        Self {
            origin: Origin::new(origin),
            kind,
            key,
            dependencies: Vec::new(),
            scope: None,
            multibinding: None,
            collection: None,
        }
    }

    pub fn constructor(origin: impl Into<String>, key: TypeKey) -> Self {
        Self::new(DeclarationKind::Constructor, origin, key)
    }

    pub fn provider(origin: impl Into<String>, key: TypeKey) -> Self {
        Self::new(DeclarationKind::Provider, origin, key)
    }

    pub fn alias(origin: impl Into<String>, key: TypeKey, target: TypeKey) -> Self {
        Self::new(DeclarationKind::Alias, origin, key).with_dependency(ContextualTypeKey::direct(target))
    }

    pub fn bound_instance(origin: impl Into<String>, key: TypeKey) -> Self {
        Self::new(DeclarationKind::BoundInstance, origin, key)
    }

    pub fn multibinds(origin: impl Into<String>, key: TypeKey, collection: CollectionKind) -> Self {
        let mut decl = Self::new(DeclarationKind::Multibinds, origin, key);
        decl.collection = Some(collection);
        decl
    }

    pub fn with_dependency(mut self, dependency: impl Into<ContextualTypeKey>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(ScopeMarker::new(scope));
        self
    }

    /// Contribute this declaration into a set multibinding
    pub fn into_set(mut self, collection: TypeKey) -> Self {
        self.multibinding = Some(MultibindingTarget {
            collection: CollectionKind::Set,
            key: collection,
            map_key: None,
        });
        self
    }

    /// Contribute this declaration into a map multibinding under `map_key`
    pub fn into_map(mut self, collection: TypeKey, map_key: impl Into<String>) -> Self {
        self.multibinding = Some(MultibindingTarget {
            collection: CollectionKind::Map,
            key: collection,
            map_key: Some(map_key.into()),
        });
        self
    }

    pub fn is_multibinding_element(&self) -> bool {
        self.multibinding.is_some()
    }

    /// The key this declaration occupies in a graph
    pub fn graph_key(&self) -> TypeKey {
        match &self.multibinding {
            Some(target) => TypeKey::multibinding_element(self.key.type_name.clone(), &target.key, &self.origin),
            None => self.key.clone(),
        }
    }

    /// Convert into a graph binding.
    ///
    /// `Multibinds` declarations become an empty multibinding aggregate that
    /// elements are later merged into.
    pub fn to_binding(&self, provenance: Provenance) -> Result<Binding> {
        let kind = match self.kind {
            DeclarationKind::Constructor => BindingKind::Constructor {
                parameters: self.dependencies.clone(),
            },
            DeclarationKind::Provider => BindingKind::Provider {
                parameters: self.dependencies.clone(),
            },
            DeclarationKind::Alias => {
                let [target] = self.dependencies.as_slice() else {
                    return Err(Error::InvalidDeclaration(format!(
                        "alias {} must have exactly one dependency, found {}",
                        self.origin,
                        self.dependencies.len()
                    )));
                };
                BindingKind::Alias {
                    target: target.key.clone(),
                }
            }
            DeclarationKind::BoundInstance => BindingKind::BoundInstance,
            DeclarationKind::Multibinds => BindingKind::Multibinding {
                collection: self.collection.unwrap_or(CollectionKind::Set),
                entries: Vec::new(),
            },
        };

        Ok(Binding::new(self.graph_key(), kind, self.origin.clone())
            .with_scope(self.scope.clone())
            .with_provenance(provenance))
    }

    /// Entry this declaration adds to its multibinding, if it is an element
    pub fn to_entry(&self) -> Option<MultibindingEntry> {
        self.multibinding.as_ref().map(|target| MultibindingEntry {
            element: self.graph_key(),
            map_key: target.map_key.clone(),
            origin: self.origin.clone(),
        })
    }
}

fn default_rank() -> i64 {
    0
}

/// A candidate binding attached to a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Declaring container; the identity `replaces` and `excludes` refer to
    pub origin: Origin,
    pub scope: ScopeMarker,
    #[serde(default = "default_rank")]
    pub rank: i64,
    #[serde(default)]
    pub replaces: BTreeSet<Origin>,
    pub binding: BindingDeclaration,
}

impl Contribution {
    pub fn new(origin: impl Into<String>, scope: impl Into<String>, binding: BindingDeclaration) -> Self {
        Self {
            origin: Origin::new(origin),
            scope: ScopeMarker::new(scope),
            rank: default_rank(),
            replaces: BTreeSet::new(),
            binding,
        }
    }

    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = rank;
        self
    }

    pub fn replacing(mut self, origin: impl Into<String>) -> Self {
        self.replaces.insert(Origin::new(origin));
        self
    }

    pub fn is_multibinding_element(&self) -> bool {
        self.binding.is_multibinding_element()
    }

    /// Key the aggregator groups this contribution under
    pub fn target_key(&self) -> &TypeKey {
        match &self.binding.multibinding {
            Some(target) => &target.key,
            None => &self.binding.key,
        }
    }
}

/// Specification of one requested graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Graph interface name; unique across the run
    pub name: String,
    /// Scopes this graph is attached to; the first is its own scope
    #[serde(default)]
    pub scopes: Vec<ScopeMarker>,
    /// Extra scopes whose contributions are aggregated
    #[serde(default)]
    pub aggregation_scopes: Vec<ScopeMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub excludes: BTreeSet<Origin>,
    /// Accessors and injection targets
    #[serde(default)]
    pub requested: Vec<ContextualTypeKey>,
    #[serde(default)]
    pub declarations: Vec<BindingDeclaration>,
    /// Bound instances supplied when the graph is created
    #[serde(default)]
    pub inputs: Vec<BindingDeclaration>,
}

impl GraphSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scopes: Vec::new(),
            aggregation_scopes: Vec::new(),
            parent: None,
            excludes: BTreeSet::new(),
            requested: Vec::new(),
            declarations: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(ScopeMarker::new(scope));
        self
    }

    pub fn aggregating(mut self, scope: impl Into<String>) -> Self {
        self.aggregation_scopes.push(ScopeMarker::new(scope));
        self
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn excluding(mut self, origin: impl Into<String>) -> Self {
        self.excludes.insert(Origin::new(origin));
        self
    }

    pub fn requesting(mut self, key: impl Into<ContextualTypeKey>) -> Self {
        self.requested.push(key.into());
        self
    }

    pub fn declaring(mut self, declaration: BindingDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn with_input(mut self, input: BindingDeclaration) -> Self {
        self.inputs.push(input);
        self
    }

    /// Every scope whose contributions this graph merges, own scopes first
    pub fn contributed_scopes(&self) -> Vec<&ScopeMarker> {
        let mut seen = BTreeSet::new();
        self.scopes
            .iter()
            .chain(self.aggregation_scopes.iter())
            .filter(|scope| seen.insert(*scope))
            .collect()
    }
}

/// The complete, closed declaration set of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSet {
    /// Injectable classes available to every graph
    #[serde(default)]
    pub injectables: Vec<BindingDeclaration>,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    #[serde(default)]
    pub graphs: Vec<GraphSpec>,
}

impl DeclarationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_injectable(mut self, declaration: BindingDeclaration) -> Self {
        self.injectables.push(declaration);
        self
    }

    pub fn with_contribution(mut self, contribution: Contribution) -> Self {
        self.contributions.push(contribution);
        self
    }

    pub fn with_graph(mut self, graph: GraphSpec) -> Self {
        self.graphs.push(graph);
        self
    }
}
