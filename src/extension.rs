//! Extension Propagator - what a child graph inherits from its ancestors
//!
//! Every resolved graph exports its whole candidate pool, already merged
//! with what it inherited itself. A child therefore only reads its parent's
//! export: nearer ancestors have shadowed farther ones, and multibinding
//! elements were unioned level by level unless a nearer level rebound the
//! collection key as a plain binding.

use crate::binding::{Binding, BindingKind, CollectionKind, MultibindingEntry};
use crate::context::ResolutionContext;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::hierarchy::GraphId;
use crate::key::TypeKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InheritedElement {
    pub binding: Binding,
    pub entry: MultibindingEntry,
}

/// Inherited multibinding: collection shape plus every ancestor element.
#[derive(Debug, Clone)]
pub struct InheritedCollection {
    pub collection: CollectionKind,
    /// Outermost ancestor first
    pub elements: Vec<InheritedElement>,
}

/// Read-only bindings a child graph sees from its parent chain.
#[derive(Debug, Clone, Default)]
pub struct VisibleBindings {
    pub plain: BTreeMap<TypeKey, Binding>,
    pub collections: BTreeMap<TypeKey, InheritedCollection>,
}

impl VisibleBindings {
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.collections.is_empty()
    }

    /// What `owner` hands down, given every binding it could provide.
    ///
    /// A later binding for the same key replaces an earlier one. Bindings
    /// `owner` inherited itself keep their original owner.
    pub fn exported_by<'b>(owner: &str, bindings: impl IntoIterator<Item = &'b Binding>) -> Self {
        let pool: BTreeMap<&TypeKey, &Binding> = bindings
            .into_iter()
            .filter(|b| !b.is_absent())
            .map(|b| (&b.key, b))
            .collect();

        let mut visible = Self::default();
        for (key, binding) in &pool {
            // Elements travel with their collection
            if key.is_multibinding_element() {
                continue;
            }
            match &binding.kind {
                BindingKind::Multibinding { collection, entries } => {
                    let elements = entries
                        .iter()
                        .filter_map(|entry| {
                            pool.get(&entry.element).map(|element| InheritedElement {
                                binding: element.inherited_by_child(owner),
                                entry: entry.clone(),
                            })
                        })
                        .collect();
                    visible.collections.insert(
                        (*key).clone(),
                        InheritedCollection {
                            collection: *collection,
                            elements,
                        },
                    );
                }
                _ => {
                    visible.plain.insert((*key).clone(), binding.inherited_by_child(owner));
                }
            }
        }
        visible
    }
}

pub struct ExtensionPropagator<'a> {
    context: &'a ResolutionContext,
    exports: &'a HashMap<GraphId, Arc<VisibleBindings>>,
}

impl<'a> ExtensionPropagator<'a> {
    pub fn new(context: &'a ResolutionContext, exports: &'a HashMap<GraphId, Arc<VisibleBindings>>) -> Self {
        Self { context, exports }
    }

    /// Bindings visible to `child` from its resolved parent chain
    pub fn visible_for(&self, child: GraphId) -> VisibleBindings {
        let hierarchy = self.context.hierarchy();
        let Some(parent) = hierarchy.parent(child) else {
            return VisibleBindings::default();
        };

        let visible = match self.exports.get(&parent) {
            Some(exported) => exported.as_ref().clone(),
            None => {
                tracing::warn!(
                    "Parent {} of {} has no resolved graph",
                    hierarchy.name(parent),
                    hierarchy.name(child)
                );
                VisibleBindings::default()
            }
        };

        tracing::debug!(
            "{} inherits {} binding(s) and {} collection(s)",
            hierarchy.name(child),
            visible.plain.len(),
            visible.collections.len()
        );
        visible
    }

    /// Warnings about scope markers that are likely mistakes.
    pub fn check_scopes(&self, id: GraphId) -> Diagnostics {
        let hierarchy = self.context.hierarchy();
        let spec = self.context.spec(id);
        let mut diagnostics = Diagnostics::new();

        for scope in spec.contributed_scopes() {
            if scope.as_str() == spec.name {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::SuspiciousScope,
                        format!("{} uses its own type as scope marker", spec.name),
                    )
                    .in_graph(spec.name.clone()),
                );
            }

            for ancestor in hierarchy.ancestors(id) {
                let ancestor_spec = self.context.spec(ancestor);
                if ancestor_spec.contributed_scopes().contains(&scope) {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::SuspiciousScope,
                            format!(
                                "{} aggregates {}, which its ancestor {} already aggregates",
                                spec.name, scope, ancestor_spec.name
                            ),
                        )
                        .in_graph(spec.name.clone()),
                    );
                }
            }
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Provenance;
    use crate::config::ResolverConfig;
    use crate::declaration::{DeclarationSet, GraphSpec};
    use crate::key::Origin;

    fn constructor(name: &str) -> Binding {
        Binding::new(
            TypeKey::new(name),
            BindingKind::Constructor { parameters: vec![] },
            Origin::new(name),
        )
    }

    /// Elements plus their aggregate, the way a finished candidate pool holds them
    fn set_bindings(collection: &TypeKey, elements: Vec<Binding>) -> Vec<Binding> {
        let entries = elements
            .iter()
            .map(|element| MultibindingEntry {
                element: element.key.clone(),
                map_key: None,
                origin: element.origin.clone(),
            })
            .collect();
        let aggregate = Binding::new(
            collection.clone(),
            BindingKind::Multibinding {
                collection: CollectionKind::Set,
                entries,
            },
            Origin::new("multibinding"),
        )
        .with_provenance(Provenance::Synthetic);

        let mut bindings = elements;
        bindings.push(aggregate);
        bindings
    }

    fn plugin(collection: &TypeKey, origin: &str) -> Binding {
        let origin = Origin::new(origin);
        let element = TypeKey::multibinding_element("Plugin", collection, &origin);
        Binding::new(element, BindingKind::BoundInstance, origin)
    }

    fn context() -> ResolutionContext {
        let declarations = DeclarationSet::new()
            .with_graph(GraphSpec::new("AppGraph").scoped("AppScope"))
            .with_graph(GraphSpec::new("UserGraph").extending("AppGraph").scoped("UserScope"))
            .with_graph(GraphSpec::new("ScreenGraph").extending("UserGraph").scoped("AppScope"));
        ResolutionContext::new(declarations, ResolverConfig::default()).unwrap()
    }

    #[test]
    fn test_export_keeps_original_owner() {
        let context = context();
        let hierarchy = context.hierarchy();
        let (app, user, screen) = (
            hierarchy.id("AppGraph").unwrap(),
            hierarchy.id("UserGraph").unwrap(),
            hierarchy.id("ScreenGraph").unwrap(),
        );

        let app_export = VisibleBindings::exported_by("AppGraph", &[constructor("Http"), constructor("Session")]);
        // UserGraph rebinds Session and passes Http through
        let user_pool = vec![app_export.plain[&TypeKey::new("Http")].clone(), constructor("Session")];
        let user_export = VisibleBindings::exported_by("UserGraph", &user_pool);

        let exports = HashMap::from([(app, Arc::new(app_export)), (user, Arc::new(user_export))]);
        let visible = ExtensionPropagator::new(&context, &exports).visible_for(screen);

        assert_eq!(
            visible.plain[&TypeKey::new("Session")].provenance,
            Provenance::Inherited { graph: "UserGraph".to_string() }
        );
        assert_eq!(
            visible.plain[&TypeKey::new("Http")].provenance,
            Provenance::Inherited { graph: "AppGraph".to_string() }
        );
        assert!(ExtensionPropagator::new(&context, &exports).visible_for(app).is_empty());
    }

    #[test]
    fn test_collections_carry_elements_of_every_owner() {
        let set = TypeKey::new("Set<Plugin>");
        let inherited = plugin(&set, "A").inherited_by_child("AppGraph");
        let pool = set_bindings(&set, vec![inherited, plugin(&set, "B")]);

        let visible = VisibleBindings::exported_by("UserGraph", &pool);
        assert!(!visible.plain.contains_key(&set));
        let owners: Vec<(&str, Provenance)> = visible.collections[&set]
            .elements
            .iter()
            .map(|e| (e.binding.origin.as_str(), e.binding.provenance.clone()))
            .collect();
        assert_eq!(
            owners,
            vec![
                ("A", Provenance::Inherited { graph: "AppGraph".to_string() }),
                ("B", Provenance::Inherited { graph: "UserGraph".to_string() }),
            ]
        );
    }

    #[test]
    fn test_export_skips_absent_optionals() {
        let bindings = vec![Binding::absent(TypeKey::new("Cache")), constructor("Http")];
        let visible = VisibleBindings::exported_by("AppGraph", &bindings);
        assert_eq!(visible.plain.len(), 1);
        assert!(visible.collections.is_empty());
    }

    #[test]
    fn test_reused_scope_is_suspicious() {
        let context = context();
        let exports = HashMap::new();
        let propagator = ExtensionPropagator::new(&context, &exports);

        let screen = context.hierarchy().id("ScreenGraph").unwrap();
        let diagnostics = propagator.check_scopes(screen);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::SuspiciousScope).len(), 1);
        assert!(!diagnostics.has_fatal());

        let user = context.hierarchy().id("UserGraph").unwrap();
        assert!(propagator.check_scopes(user).is_empty());
    }

    #[test]
    fn test_graph_named_scope_is_suspicious() {
        let declarations = DeclarationSet::new().with_graph(GraphSpec::new("AppGraph").scoped("AppGraph"));
        let context = ResolutionContext::new(declarations, ResolverConfig::default()).unwrap();
        let exports = HashMap::new();

        let app = context.hierarchy().id("AppGraph").unwrap();
        let diagnostics = ExtensionPropagator::new(&context, &exports).check_scopes(app);
        let suspicious = diagnostics.of_kind(DiagnosticKind::SuspiciousScope);
        assert_eq!(suspicious.len(), 1);
        assert!(suspicious[0].message.contains("its own type"));
        assert_eq!(suspicious[0].graph.as_deref(), Some("AppGraph"));
        assert!(!diagnostics.has_fatal());
    }
}
