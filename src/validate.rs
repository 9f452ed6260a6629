//! Graph Validator
//!
//! Every check appends to one `Diagnostics` list; nothing returns early on a
//! user-facing problem. `Err` is reserved for invariant violations inside the
//! resolver itself.

use crate::context::ResolutionContext;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::graph::{BindingGraph, NodeId};
use crate::hierarchy::GraphId;
use crate::key::{ScopeMarker, TypeKey};
use crate::topology;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap, VecDeque};

pub struct GraphValidator<'a> {
    context: &'a ResolutionContext,
    id: GraphId,
}

impl<'a> GraphValidator<'a> {
    pub fn new(context: &'a ResolutionContext, id: GraphId) -> Self {
        Self { context, id }
    }

    pub fn validate(&self, graph: &BindingGraph) -> Result<Diagnostics> {
        let mut diagnostics = Diagnostics::new();

        self.check_uniqueness(graph)?;
        let paths = RootPaths::compute(graph);
        self.check_completeness(graph, &paths, &mut diagnostics);
        self.check_scopes(graph, &paths, &mut diagnostics);
        self.check_cycles(graph, &mut diagnostics);
        if self.context.config().diagnostics.report_unused {
            self.check_unused(graph, &mut diagnostics);
        }

        diagnostics.attribute_to(graph.name());
        tracing::debug!(
            "Validated {}: {} error(s), {} warning(s)",
            graph.name(),
            diagnostics.fatal_count(),
            diagnostics.warning_count()
        );
        Ok(diagnostics)
    }

    /// The arena enforces one node per key; a mismatch here is a resolver bug.
    fn check_uniqueness(&self, graph: &BindingGraph) -> Result<()> {
        for id in graph.node_ids() {
            let key = &graph.node(id).key;
            if graph.id_of(key) != Some(id) {
                return Err(Error::Internal {
                    graph: graph.name().to_string(),
                    message: format!("{} is stored at {:?} but indexed elsewhere", key, id),
                });
            }
            for edge in graph.edges_from(id) {
                if edge.target.index() >= graph.len() {
                    return Err(Error::Internal {
                        graph: graph.name().to_string(),
                        message: format!("edge from {} points past the arena", key),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_completeness(&self, graph: &BindingGraph, paths: &RootPaths, diagnostics: &mut Diagnostics) {
        for missing in graph.missing() {
            let message = match missing.from {
                Some(from) => format!(
                    "no binding for {}, required by {}",
                    missing.dependency,
                    graph.node(from).describe()
                ),
                None => format!("no binding for requested {}", missing.dependency),
            };
            let mut diagnostic =
                Diagnostic::new(DiagnosticKind::MissingBinding, message).with_path(missing.path.clone());
            if let Some(from) = missing.from {
                diagnostic = diagnostic.with_origin(graph.node(from).origin.clone());
            }
            diagnostics.push(diagnostic);
        }

        // Absent bindings are only legal behind an edge that has a default
        for id in graph.node_ids() {
            for edge in graph.edges_from(id) {
                if edge.dependency.has_default || !graph.node(edge.target).is_absent() {
                    continue;
                }
                let reported = graph
                    .missing()
                    .iter()
                    .any(|m| m.from == Some(id) && m.dependency.key == edge.dependency.key);
                if reported {
                    continue;
                }
                let consumer = graph.node(id);
                let mut path = paths.path_to(graph, id);
                path.push(edge.dependency.key.clone());
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::MissingBinding,
                        format!("no binding for {}, required by {}", edge.dependency, consumer.describe()),
                    )
                    .with_origin(consumer.origin.clone())
                    .with_path(path),
                );
            }
        }

        for root in graph.roots() {
            let Some(id) = graph.id_of(&root.key) else {
                continue;
            };
            // A root with no binding at all was reported as a missing edge above
            let reported = graph
                .missing()
                .iter()
                .any(|m| m.from.is_none() && m.dependency.key == root.key);
            if !reported && !root.has_default && graph.node(id).is_absent() {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::MissingBinding,
                        format!("no binding for requested {}", root),
                    )
                    .with_path(vec![root.key.clone()]),
                );
            }
        }
    }

    /// Scopes a scoped binding in this graph may legally carry
    fn reachable_scopes(&self) -> BTreeSet<&ScopeMarker> {
        let hierarchy = self.context.hierarchy();
        let mut scopes: BTreeSet<&ScopeMarker> = self.context.spec(self.id).scopes.iter().collect();
        for ancestor in hierarchy.ancestors(self.id) {
            scopes.extend(self.context.spec(ancestor).scopes.iter());
        }
        scopes
    }

    fn check_scopes(&self, graph: &BindingGraph, paths: &RootPaths, diagnostics: &mut Diagnostics) {
        let allowed = self.reachable_scopes();

        for id in graph.node_ids() {
            let binding = graph.node(id);
            // Inherited bindings were checked in the graph that owns them
            if binding.provenance.is_inherited() {
                continue;
            }
            let Some(scope) = &binding.scope else {
                continue;
            };
            if allowed.contains(scope) {
                continue;
            }
            let attached: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
            let attached = if attached.is_empty() {
                "no scope".to_string()
            } else {
                attached.join(", ")
            };
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::ScopeMismatch,
                    format!(
                        "{} is scoped to {} but {} is attached to {}",
                        binding.key,
                        scope,
                        graph.name(),
                        attached
                    ),
                )
                .with_origin(binding.origin.clone())
                .with_path(paths.path_to(graph, id)),
            );
        }
    }

    /// A cycle is legal only if every loop through it crosses a deferred
    /// edge, so look for cycles in the direct-edge subgraph.
    fn check_cycles(&self, graph: &BindingGraph, diagnostics: &mut Diagnostics) {
        let direct = graph.adjacency(|edge| !edge.is_deferrable());

        for component in topology::strongly_connected_components(&direct) {
            if !topology::is_cyclic(&direct, &component) {
                continue;
            }
            let Some(start) = component.iter().copied().min() else {
                continue;
            };
            let cycle = topology::cycle_through(&direct, &component, start).unwrap_or_else(|| {
                let mut members = component.clone();
                members.sort_unstable();
                members
            });

            let path: Vec<TypeKey> = cycle.iter().map(|n| graph.node(NodeId(*n as u32)).key.clone()).collect();
            let origins: Vec<_> = cycle
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(|n| graph.node(NodeId(*n as u32)).origin.clone())
                .collect();
            let diagnostic = Diagnostic::new(
                DiagnosticKind::UnbreakableCycle,
                format!(
                    "dependency cycle among {} binding(s) has no Provider or Lazy edge to break it",
                    component.len()
                ),
            )
            .with_origins(origins)
            .with_path(path);
            diagnostics.push(diagnostic);
        }
    }

    fn check_unused(&self, graph: &BindingGraph, diagnostics: &mut Diagnostics) {
        for unused in graph.unused() {
            let (kind, what) = if unused.is_input {
                (DiagnosticKind::UnusedGraphInput, "graph input")
            } else {
                (DiagnosticKind::UnusedBinding, "binding")
            };
            diagnostics.push(
                Diagnostic::new(kind, format!("{} {} is never used", what, unused.key))
                    .with_origin(unused.origin.clone()),
            );
        }
    }
}

/// Breadth-first parents from the requested roots, for diagnostic paths.
struct RootPaths {
    parent: HashMap<NodeId, NodeId>,
}

impl RootPaths {
    fn compute(graph: &BindingGraph) -> Self {
        let mut parent = HashMap::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();

        for root in graph.roots() {
            if let Some(id) = graph.id_of(&root.key) {
                if seen.insert(id) {
                    queue.push_back(id);
                }
            }
        }
        while let Some(id) = queue.pop_front() {
            for edge in graph.edges_from(id) {
                if seen.insert(edge.target) {
                    parent.insert(edge.target, id);
                    queue.push_back(edge.target);
                }
            }
        }
        Self { parent }
    }

    fn path_to(&self, graph: &BindingGraph, id: NodeId) -> Vec<TypeKey> {
        let mut path = vec![graph.node(id).key.clone()];
        let mut current = id;
        while let Some(previous) = self.parent.get(&current) {
            path.push(graph.node(*previous).key.clone());
            current = *previous;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::config::ResolverConfig;
    use crate::declaration::{BindingDeclaration, DeclarationSet, GraphSpec};
    use crate::extension::VisibleBindings;
    use crate::key::{ContextualTypeKey, Wrapping};

    fn key(name: &str) -> TypeKey {
        TypeKey::new(name)
    }

    fn dep(name: &str) -> ContextualTypeKey {
        ContextualTypeKey::direct(key(name))
    }

    fn validate_with(declarations: DeclarationSet, config: ResolverConfig) -> Diagnostics {
        let context = ResolutionContext::new(declarations, config).unwrap();
        let id = context.hierarchy().id("AppGraph").unwrap();
        let built = GraphBuilder::new(&context, id, VisibleBindings::default()).build().unwrap();
        GraphValidator::new(&context, id).validate(&built.graph).unwrap()
    }

    fn validate(declarations: DeclarationSet) -> Diagnostics {
        validate_with(declarations, ResolverConfig::default())
    }

    #[test]
    fn test_deferred_self_cycle_is_legal() {
        let declarations = DeclarationSet::new()
            .with_injectable(
                BindingDeclaration::constructor("Long", key("Long"))
                    .with_dependency(ContextualTypeKey::wrapped(key("Long"), Wrapping::Provider))
                    .with_dependency(dep("Int")),
            )
            .with_injectable(BindingDeclaration::constructor("Int", key("Int")))
            .with_graph(GraphSpec::new("AppGraph").requesting(dep("Long")));

        let diagnostics = validate(declarations);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_direct_cycle_is_unbreakable() {
        let declarations = DeclarationSet::new()
            .with_injectable(BindingDeclaration::constructor("A", key("A")).with_dependency(dep("B")))
            .with_injectable(BindingDeclaration::constructor("B", key("B")).with_dependency(dep("A")))
            .with_graph(GraphSpec::new("AppGraph").requesting(dep("A")));

        let diagnostics = validate(declarations);
        let cycles = diagnostics.of_kind(DiagnosticKind::UnbreakableCycle);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec![key("A"), key("B"), key("A")]);
        assert_eq!(cycles[0].render_path(), "A -> B -> A");
    }

    #[test]
    fn test_cycle_with_one_lazy_edge_is_legal() {
        let declarations = DeclarationSet::new()
            .with_injectable(BindingDeclaration::constructor("A", key("A")).with_dependency(dep("B")))
            .with_injectable(BindingDeclaration::constructor("B", key("B")).with_dependency(dep("C")))
            .with_injectable(
                BindingDeclaration::constructor("C", key("C"))
                    .with_dependency(ContextualTypeKey::wrapped(key("A"), Wrapping::Lazy)),
            )
            .with_graph(GraphSpec::new("AppGraph").requesting(dep("A")));

        assert!(validate(declarations).of_kind(DiagnosticKind::UnbreakableCycle).is_empty());
    }

    #[test]
    fn test_missing_binding_is_fatal_with_path() {
        let declarations = DeclarationSet::new()
            .with_injectable(BindingDeclaration::constructor("Repo", key("Repo")).with_dependency(dep("Db")))
            .with_graph(GraphSpec::new("AppGraph").requesting(dep("Repo")));

        let diagnostics = validate(declarations);
        assert!(diagnostics.has_fatal());
        let missing = diagnostics.of_kind(DiagnosticKind::MissingBinding);
        assert_eq!(missing[0].path, vec![key("Repo"), key("Db")]);
        assert_eq!(missing[0].graph.as_deref(), Some("AppGraph"));
    }

    #[test]
    fn test_absent_behind_required_edge_is_missing() {
        // Cache is optional for Repo but required by Service
        let declarations = DeclarationSet::new()
            .with_injectable(
                BindingDeclaration::constructor("Repo", key("Repo")).with_dependency(dep("Cache").with_default()),
            )
            .with_injectable(
                BindingDeclaration::constructor("Service", key("Service"))
                    .with_dependency(dep("Repo"))
                    .with_dependency(dep("Cache")),
            )
            .with_graph(GraphSpec::new("AppGraph").requesting(dep("Service")));

        let diagnostics = validate(declarations);
        let missing = diagnostics.of_kind(DiagnosticKind::MissingBinding);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].path, vec![key("Service"), key("Cache")]);
    }

    #[test]
    fn test_missing_root_reported_once_when_later_absent() {
        // The root finds nothing; Repo's optional edge then binds Cache as absent
        let declarations = DeclarationSet::new()
            .with_injectable(
                BindingDeclaration::constructor("Repo", key("Repo")).with_dependency(dep("Cache").with_default()),
            )
            .with_graph(GraphSpec::new("AppGraph").requesting(dep("Cache")).requesting(dep("Repo")));

        let diagnostics = validate(declarations);
        let missing = diagnostics.of_kind(DiagnosticKind::MissingBinding);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].message, "no binding for requested Cache");
    }

    #[test]
    fn test_scope_mismatch() {
        let declarations = DeclarationSet::new()
            .with_injectable(BindingDeclaration::constructor("Session", key("Session")).scoped("UserScope"))
            .with_injectable(BindingDeclaration::constructor("Http", key("Http")).scoped("AppScope"))
            .with_graph(
                GraphSpec::new("AppGraph")
                    .scoped("AppScope")
                    .requesting(dep("Session"))
                    .requesting(dep("Http")),
            );

        let diagnostics = validate(declarations);
        let mismatches = diagnostics.of_kind(DiagnosticKind::ScopeMismatch);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].origins[0].as_str(), "Session");
    }

    #[test]
    fn test_unused_reporting_follows_config() {
        let declarations = || {
            DeclarationSet::new().with_graph(
                GraphSpec::new("AppGraph")
                    .declaring(BindingDeclaration::provider("AppGraph.stale", key("Stale")))
                    .with_input(BindingDeclaration::bound_instance("AppGraph.Factory.clock", key("Clock"))),
            )
        };

        let diagnostics = validate(declarations());
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnusedBinding).len(), 1);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnusedGraphInput).len(), 1);
        assert!(!diagnostics.has_fatal());

        let mut config = ResolverConfig::default();
        config.diagnostics.report_unused = false;
        assert!(validate_with(declarations(), config).is_empty());
    }
}
