//! Binding Model - the closed set of ways a `TypeKey` can be satisfied
//!
//! Every binding is one of six kinds:
//! - `Constructor`: direct instantiation of an injectable class
//! - `Provider`: a declared factory function
//! - `Alias`: delegates to another key's binding ("binds")
//! - `Multibinding`: aggregates contributed elements into a set or map
//! - `BoundInstance`: supplied externally when the graph is created
//! - `Absent`: an optional dependency nobody satisfies

use crate::key::{ContextualTypeKey, Origin, ScopeMarker, TypeKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collection shape of a multibinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Set,
    Map,
}

/// One element of a multibinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultibindingEntry {
    /// Synthetic key of the element's own binding
    pub element: TypeKey,
    /// Aggregation key for map multibindings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_key: Option<String>,
    pub origin: Origin,
}

/// Kind-specific payload of a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingKind {
    Constructor {
        parameters: Vec<ContextualTypeKey>,
    },
    Provider {
        parameters: Vec<ContextualTypeKey>,
    },
    Alias {
        target: TypeKey,
    },
    Multibinding {
        collection: CollectionKind,
        entries: Vec<MultibindingEntry>,
    },
    BoundInstance,
    Absent,
}

impl BindingKind {
    pub fn tag(&self) -> BindingTag {
        match self {
            BindingKind::Constructor { .. } => BindingTag::Constructor,
            BindingKind::Provider { .. } => BindingTag::Provider,
            BindingKind::Alias { .. } => BindingTag::Alias,
            BindingKind::Multibinding { .. } => BindingTag::Multibinding,
            BindingKind::BoundInstance => BindingTag::BoundInstance,
            BindingKind::Absent => BindingTag::Absent,
        }
    }
}

/// Payload-free discriminant of [`BindingKind`], used for counting and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingTag {
    Constructor,
    Provider,
    Alias,
    Multibinding,
    BoundInstance,
    Absent,
}

impl BindingTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingTag::Constructor => "constructor",
            BindingTag::Provider => "provider",
            BindingTag::Alias => "alias",
            BindingTag::Multibinding => "multibinding",
            BindingTag::BoundInstance => "bound_instance",
            BindingTag::Absent => "absent",
        }
    }

    pub fn all() -> &'static [BindingTag] {
        &[
            BindingTag::Constructor,
            BindingTag::Provider,
            BindingTag::Alias,
            BindingTag::Multibinding,
            BindingTag::BoundInstance,
            BindingTag::Absent,
        ]
    }
}

impl fmt::Display for BindingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a binding in a graph came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    /// Declared on the graph itself (providers, aliases, inputs)
    Local,
    /// Merged in from a scope's aggregated contributions
    Contributed { scope: ScopeMarker },
    /// Discovered on demand from the injectable class pool
    Implicit,
    /// Owned by an ancestor graph; the child only reads it
    Inherited { graph: String },
    /// Created by the resolver (absent optionals, multibinding aggregates)
    Synthetic,
}

impl Provenance {
    pub fn is_inherited(&self) -> bool {
        matches!(self, Provenance::Inherited { .. })
    }
}

/// A node of the binding graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub key: TypeKey,
    #[serde(flatten)]
    pub kind: BindingKind,
    /// Unscoped bindings are created per request, scoped ones once per graph instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeMarker>,
    pub origin: Origin,
    pub provenance: Provenance,
}

impl Binding {
    pub fn new(key: TypeKey, kind: BindingKind, origin: Origin) -> Self {
        Self {
            key,
            kind,
            scope: None,
            origin,
            provenance: Provenance::Local,
        }
    }

    pub fn absent(key: TypeKey) -> Self {
        let origin = Origin::new(format!("absent:{}", key));
        Self::new(key, BindingKind::Absent, origin).with_provenance(Provenance::Synthetic)
    }

    pub fn with_scope(mut self, scope: Option<ScopeMarker>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn tag(&self) -> BindingTag {
        self.kind.tag()
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.kind, BindingKind::Absent)
    }

    /// Read-only projection of this binding into a descendant graph
    pub fn inherited_by_child(&self, owner: &str) -> Self {
        let provenance = match &self.provenance {
            Provenance::Inherited { graph } => Provenance::Inherited { graph: graph.clone() },
            _ => Provenance::Inherited {
                graph: owner.to_string(),
            },
        };
        self.clone().with_provenance(provenance)
    }

    /// Outgoing dependency edges of this binding.
    ///
    /// Inherited bindings have none: the owning ancestor already resolved them.
    pub fn dependencies(&self) -> Vec<ContextualTypeKey> {
        if self.provenance.is_inherited() {
            return Vec::new();
        }
        match &self.kind {
            BindingKind::Constructor { parameters } | BindingKind::Provider { parameters } => {
                parameters.clone()
            }
            BindingKind::Alias { target } => vec![ContextualTypeKey::direct(target.clone())],
            BindingKind::Multibinding { entries, .. } => entries
                .iter()
                .map(|entry| ContextualTypeKey::direct(entry.element.clone()))
                .collect(),
            BindingKind::BoundInstance | BindingKind::Absent => Vec::new(),
        }
    }

    /// Short description for diagnostics and reports
    pub fn describe(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{} {} [@{}] ({})", self.tag(), self.key, scope, self.origin),
            None => format!("{} {} ({})", self.tag(), self.key, self.origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Wrapping;

    fn key(name: &str) -> TypeKey {
        TypeKey::new(name)
    }

    #[test]
    fn test_provider_dependencies_keep_wrapping() {
        let binding = Binding::new(
            key("Repo"),
            BindingKind::Provider {
                parameters: vec![
                    ContextualTypeKey::direct(key("Db")),
                    ContextualTypeKey::wrapped(key("Clock"), Wrapping::Lazy),
                ],
            },
            Origin::new("RepoModule.provideRepo"),
        );

        let deps = binding.dependencies();
        assert_eq!(deps.len(), 2);
        assert!(!deps[0].is_deferrable());
        assert!(deps[1].is_deferrable());
    }

    #[test]
    fn test_alias_depends_on_target() {
        let binding = Binding::new(
            key("Cache"),
            BindingKind::Alias { target: key("LruCache") },
            Origin::new("CacheModule.bind"),
        );
        assert_eq!(binding.dependencies(), vec![ContextualTypeKey::direct(key("LruCache"))]);
    }

    #[test]
    fn test_inherited_binding_has_no_edges() {
        let binding = Binding::new(
            key("Repo"),
            BindingKind::Constructor {
                parameters: vec![ContextualTypeKey::direct(key("Db"))],
            },
            Origin::new("Repo"),
        )
        .with_scope(Some(ScopeMarker::new("AppScope")));

        let inherited = binding.inherited_by_child("AppGraph");
        assert!(inherited.dependencies().is_empty());
        assert_eq!(inherited.provenance, Provenance::Inherited { graph: "AppGraph".to_string() });

        // Re-projecting keeps the original owner
        let grandchild = inherited.inherited_by_child("UserGraph");
        assert_eq!(grandchild.provenance, Provenance::Inherited { graph: "AppGraph".to_string() });
    }

    #[test]
    fn test_tags_cover_all_kinds() {
        assert_eq!(BindingTag::all().len(), 6);
        assert_eq!(Binding::absent(key("Long")).tag(), BindingTag::Absent);
    }
}
