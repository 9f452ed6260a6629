//! Resolver - drives every graph through build, validate and order
//!
//! Graphs are processed level by level over the extension hierarchy, so a
//! parent is always resolved before its children. Siblings within a level
//! only read shared state and may run on scoped worker threads.

use crate::builder::GraphBuilder;
use crate::config::ResolverConfig;
use crate::context::ResolutionContext;
use crate::contribution::ContributionExtension;
use crate::declaration::DeclarationSet;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::extension::{ExtensionPropagator, VisibleBindings};
use crate::graph::BindingGraph;
use crate::hierarchy::GraphId;
use crate::shard::{InitializationOrder, Sharder};
use crate::validate::GraphValidator;
use crate::{Error, Result};
use crossbeam::channel::Sender;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Progress notifications, sent in graph declaration order within a level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    Started { total: usize },
    LevelStarted { depth: usize, graphs: usize },
    GraphFinished { graph: String, status: GraphStatus },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphStatus {
    Resolved,
    Invalid,
    Aborted,
    Skipped,
}

impl fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GraphStatus::Resolved => "resolved",
            GraphStatus::Invalid => "invalid",
            GraphStatus::Aborted => "aborted",
            GraphStatus::Skipped => "skipped",
        };
        write!(f, "{}", label)
    }
}

fn serialize_graph<S: Serializer>(graph: &Arc<BindingGraph>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    graph.as_ref().serialize(serializer)
}

/// One graph after the full pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedGraph {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(rename = "bindings", serialize_with = "serialize_graph")]
    pub graph: Arc<BindingGraph>,
    /// `None` when a fatal diagnostic halted the graph before ordering
    pub order: Option<InitializationOrder>,
    pub diagnostics: Diagnostics,
}

impl ResolvedGraph {
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.has_fatal()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GraphOutcome {
    Resolved(ResolvedGraph),
    /// Internal invariant violation while resolving this graph
    Aborted { graph: String, error: String },
    /// An ancestor was aborted
    Skipped { graph: String, blocked_by: String },
}

impl GraphOutcome {
    pub fn name(&self) -> &str {
        match self {
            GraphOutcome::Resolved(resolved) => &resolved.name,
            GraphOutcome::Aborted { graph, .. } | GraphOutcome::Skipped { graph, .. } => graph,
        }
    }

    pub fn status(&self) -> GraphStatus {
        match self {
            GraphOutcome::Resolved(resolved) if resolved.is_valid() => GraphStatus::Resolved,
            GraphOutcome::Resolved(_) => GraphStatus::Invalid,
            GraphOutcome::Aborted { .. } => GraphStatus::Aborted,
            GraphOutcome::Skipped { .. } => GraphStatus::Skipped,
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedGraph> {
        match self {
            GraphOutcome::Resolved(resolved) => Some(resolved),
            _ => None,
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutput {
    /// In graph declaration order
    pub graphs: Vec<GraphOutcome>,
    /// Findings that belong to the run rather than one graph
    pub diagnostics: Diagnostics,
}

impl ResolutionOutput {
    pub fn graph(&self, name: &str) -> Option<&GraphOutcome> {
        self.graphs.iter().find(|g| g.name() == name)
    }

    pub fn resolved(&self, name: &str) -> Option<&ResolvedGraph> {
        self.graph(name).and_then(GraphOutcome::resolved)
    }

    pub fn require(&self, name: &str) -> Result<&GraphOutcome> {
        self.graph(name).ok_or_else(|| Error::UnknownGraph(name.to_string()))
    }

    /// Run-level diagnostics first, then each graph's in declaration order
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().chain(
            self.graphs
                .iter()
                .filter_map(GraphOutcome::resolved)
                .flat_map(|g| g.diagnostics.iter()),
        )
    }

    pub fn fatal_count(&self) -> usize {
        self.all_diagnostics().filter(|d| d.is_fatal()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.all_diagnostics().filter(|d| !d.is_fatal()).count()
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal_count() > 0
            || self
                .graphs
                .iter()
                .any(|g| matches!(g.status(), GraphStatus::Aborted | GraphStatus::Skipped))
    }
}

pub struct Resolver {
    context: ResolutionContext,
}

impl Resolver {
    pub fn new(declarations: DeclarationSet, config: ResolverConfig) -> Result<Self> {
        Ok(Self {
            context: ResolutionContext::new(declarations, config)?,
        })
    }

    pub fn with_extensions(
        declarations: DeclarationSet,
        config: ResolverConfig,
        extensions: Vec<Box<dyn ContributionExtension>>,
    ) -> Result<Self> {
        Ok(Self {
            context: ResolutionContext::with_extensions(declarations, config, extensions)?,
        })
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    pub fn resolve(&self) -> ResolutionOutput {
        self.resolve_with_events(None)
    }

    pub fn resolve_with_events(&self, events: Option<&Sender<ResolutionEvent>>) -> ResolutionOutput {
        let hierarchy = self.context.hierarchy();
        let notify = |event: ResolutionEvent| {
            if let Some(tx) = events {
                // A dropped receiver only means nobody is watching
                let _ = tx.send(event);
            }
        };
        notify(ResolutionEvent::Started { total: hierarchy.len() });

        let mut outcomes: Vec<Option<GraphOutcome>> = (0..hierarchy.len()).map(|_| None).collect();
        let mut exports: HashMap<GraphId, Arc<VisibleBindings>> = HashMap::new();

        for (depth, level) in hierarchy.levels().into_iter().enumerate() {
            notify(ResolutionEvent::LevelStarted {
                depth,
                graphs: level.len(),
            });

            let mut runnable = Vec::with_capacity(level.len());
            for &id in &level {
                match self.blocked_by(id, &outcomes) {
                    Some(blocker) => {
                        tracing::warn!("Skipping {}: ancestor {} was aborted", hierarchy.name(id), blocker);
                        outcomes[id.index()] = Some(GraphOutcome::Skipped {
                            graph: hierarchy.name(id).to_string(),
                            blocked_by: blocker,
                        });
                    }
                    None => runnable.push(id),
                }
            }

            for (id, result) in self.resolve_level(&runnable, &exports) {
                let outcome = match result {
                    Ok((graph, exported)) => {
                        exports.insert(id, Arc::new(exported));
                        GraphOutcome::Resolved(graph)
                    }
                    Err(e) => {
                        tracing::warn!("Resolution of {} aborted: {}", hierarchy.name(id), e);
                        GraphOutcome::Aborted {
                            graph: hierarchy.name(id).to_string(),
                            error: e.to_string(),
                        }
                    }
                };
                outcomes[id.index()] = Some(outcome);
            }

            for id in &level {
                if let Some(outcome) = &outcomes[id.index()] {
                    notify(ResolutionEvent::GraphFinished {
                        graph: outcome.name().to_string(),
                        status: outcome.status(),
                    });
                }
            }
        }

        let mut diagnostics = self.context.diagnostics().clone();
        if self.context.config().diagnostics.warnings_as_errors {
            diagnostics.promote_warnings();
        }
        notify(ResolutionEvent::Finished);

        ResolutionOutput {
            graphs: outcomes.into_iter().flatten().collect(),
            diagnostics,
        }
    }

    /// Name of the aborted ancestor that keeps `id` from resolving
    fn blocked_by(&self, id: GraphId, outcomes: &[Option<GraphOutcome>]) -> Option<String> {
        let parent = self.context.hierarchy().parent(id)?;
        match outcomes[parent.index()].as_ref()? {
            GraphOutcome::Aborted { graph, .. } => Some(graph.clone()),
            GraphOutcome::Skipped { blocked_by, .. } => Some(blocked_by.clone()),
            GraphOutcome::Resolved(_) => None,
        }
    }

    fn resolve_level(
        &self,
        level: &[GraphId],
        exports: &HashMap<GraphId, Arc<VisibleBindings>>,
    ) -> Vec<(GraphId, Result<(ResolvedGraph, VisibleBindings)>)> {
        if !self.context.config().resolution.parallel || level.len() < 2 {
            return level.iter().map(|id| (*id, self.resolve_graph(*id, exports))).collect();
        }

        let (tx, rx) = crossbeam::channel::unbounded();
        let scoped = crossbeam::thread::scope(|s| {
            for id in level {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let result = self.resolve_graph(*id, exports);
                    let _ = tx.send((*id, result));
                });
            }
        });
        drop(tx);

        let mut results: Vec<(GraphId, Result<(ResolvedGraph, VisibleBindings)>)> = rx.iter().collect();
        if scoped.is_err() {
            for id in level {
                if !results.iter().any(|(done, _)| done == id) {
                    results.push((
                        *id,
                        Err(Error::Internal {
                            graph: self.context.hierarchy().name(*id).to_string(),
                            message: "worker thread panicked".to_string(),
                        }),
                    ));
                }
            }
        }
        results.sort_by_key(|(id, _)| *id);
        results
    }

    /// Resolve one graph; also returns what it exports to its children.
    fn resolve_graph(
        &self,
        id: GraphId,
        exports: &HashMap<GraphId, Arc<VisibleBindings>>,
    ) -> Result<(ResolvedGraph, VisibleBindings)> {
        let spec = self.context.spec(id);
        let config = self.context.config();

        let propagator = ExtensionPropagator::new(&self.context, exports);
        let visible = propagator.visible_for(id);
        let mut diagnostics = propagator.check_scopes(id);

        let built = GraphBuilder::new(&self.context, id, visible).build()?;
        diagnostics.extend(built.diagnostics);
        diagnostics.extend(GraphValidator::new(&self.context, id).validate(&built.graph)?);
        diagnostics.attribute_to(&spec.name);
        if config.diagnostics.warnings_as_errors {
            diagnostics.promote_warnings();
        }

        let order = if diagnostics.has_fatal() {
            tracing::info!(
                "{}: {} error(s), skipping initialization order",
                spec.name,
                diagnostics.fatal_count()
            );
            None
        } else {
            let order = Sharder::new(config.sharding.clone()).order(&built.graph);
            check_order(&built.graph, &order)?;
            tracing::info!(
                "Resolved {}: {} binding(s), {} ordered, {} shard(s)",
                spec.name,
                built.graph.len(),
                order.len(),
                order.shards.len()
            );
            Some(order)
        };

        let resolved = ResolvedGraph {
            name: spec.name.clone(),
            parent: spec.parent.clone(),
            graph: Arc::new(built.graph),
            order,
            diagnostics,
        };
        Ok((resolved, built.exported))
    }
}

/// Every orderable binding appears exactly once in the order.
fn check_order(graph: &BindingGraph, order: &InitializationOrder) -> Result<()> {
    let expected = graph
        .bindings()
        .filter(|b| !b.is_absent() && !b.provenance.is_inherited())
        .count();
    let mut seen = std::collections::HashSet::new();
    let duplicated = order.order().into_iter().any(|key| !seen.insert(key));
    if duplicated || seen.len() != expected {
        return Err(Error::Internal {
            graph: graph.name().to_string(),
            message: format!("ordered {} of {} binding(s)", seen.len(), expected),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Provenance;
    use crate::declaration::{BindingDeclaration, Contribution, GraphSpec};
    use crate::diagnostic::DiagnosticKind;
    use crate::key::{ContextualTypeKey, ScopeMarker, TypeKey, Wrapping};

    fn key(name: &str) -> TypeKey {
        TypeKey::new(name)
    }

    fn dep(name: &str) -> ContextualTypeKey {
        ContextualTypeKey::direct(key(name))
    }

    fn resolve(declarations: DeclarationSet) -> ResolutionOutput {
        Resolver::new(declarations, ResolverConfig::default()).unwrap().resolve()
    }

    fn int_providers() -> DeclarationSet {
        DeclarationSet::new()
            .with_contribution(Contribution::new(
                "RealIntModule",
                "AppScope",
                BindingDeclaration::provider("RealIntModule", key("Int")),
            ))
            .with_contribution(
                Contribution::new(
                    "FakeIntModule",
                    "AppScope",
                    BindingDeclaration::provider("FakeIntModule", key("Int")),
                )
                .replacing("RealIntModule"),
            )
    }

    #[test]
    fn test_replacing_provider_wins() {
        let output = resolve(int_providers().with_graph(GraphSpec::new("AppGraph").scoped("AppScope").requesting(dep("Int"))));

        let app = output.resolved("AppGraph").unwrap();
        assert!(app.is_valid());
        assert_eq!(app.graph.get(&key("Int")).unwrap().origin.as_str(), "FakeIntModule");
    }

    #[test]
    fn test_excluded_replacement_restores_original() {
        let output = resolve(
            int_providers().with_graph(
                GraphSpec::new("AppGraph")
                    .scoped("AppScope")
                    .excluding("FakeIntModule")
                    .requesting(dep("Int")),
            ),
        );

        let app = output.resolved("AppGraph").unwrap();
        assert_eq!(app.graph.get(&key("Int")).unwrap().origin.as_str(), "RealIntModule");
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_deferred_self_cycle_resolves() {
        let output = resolve(
            DeclarationSet::new()
                .with_injectable(
                    BindingDeclaration::constructor("Long", key("Long"))
                        .with_dependency(ContextualTypeKey::wrapped(key("Long"), Wrapping::Provider))
                        .with_dependency(dep("Int")),
                )
                .with_injectable(BindingDeclaration::constructor("Int", key("Int")))
                .with_graph(GraphSpec::new("AppGraph").requesting(dep("Long"))),
        );

        let app = output.resolved("AppGraph").unwrap();
        assert!(app.is_valid(), "{:?}", app.diagnostics);
        let order: Vec<String> = app.order.as_ref().unwrap().order().iter().map(|k| k.to_string()).collect();
        assert_eq!(order, vec!["Int", "Long"]);
    }

    #[test]
    fn test_direct_cycle_halts_ordering() {
        let output = resolve(
            DeclarationSet::new()
                .with_injectable(BindingDeclaration::constructor("A", key("A")).with_dependency(dep("B")))
                .with_injectable(BindingDeclaration::constructor("B", key("B")).with_dependency(dep("A")))
                .with_graph(GraphSpec::new("AppGraph").requesting(dep("A"))),
        );

        let app = output.resolved("AppGraph").unwrap();
        assert!(app.order.is_none());
        assert_eq!(output.graph("AppGraph").unwrap().status(), GraphStatus::Invalid);
        let cycle = app.diagnostics.of_kind(DiagnosticKind::UnbreakableCycle);
        assert_eq!(cycle[0].render_path(), "A -> B -> A");
        assert!(output.has_fatal());
        assert!(matches!(output.require("NoSuchGraph"), Err(Error::UnknownGraph(_))));
    }

    fn app_with_session() -> DeclarationSet {
        DeclarationSet::new()
            .with_injectable(BindingDeclaration::constructor("Session", key("Session")).scoped("AppScope"))
            .with_injectable(BindingDeclaration::constructor("Screen", key("Screen")).with_dependency(dep("Session")))
            .with_graph(GraphSpec::new("AppGraph").scoped("AppScope").requesting(dep("Session")))
            .with_graph(
                GraphSpec::new("UserGraph")
                    .extending("AppGraph")
                    .scoped("UserScope")
                    .requesting(dep("Screen")),
            )
    }

    #[test]
    fn test_child_reuses_parent_scoped_binding() {
        let output = resolve(app_with_session());

        let user = output.resolved("UserGraph").unwrap();
        assert!(user.is_valid(), "{:?}", user.diagnostics);
        let session = user.graph.get(&key("Session")).unwrap();
        assert_eq!(session.provenance, Provenance::Inherited { graph: "AppGraph".to_string() });

        // Owned and initialized once by the parent; children only reference it
        let order = user.order.as_ref().unwrap().order();
        assert_eq!(order, vec![&key("Screen")]);
        let app_order = output.resolved("AppGraph").unwrap().order.as_ref().unwrap().order();
        assert_eq!(app_order, vec![&key("Session")]);
    }

    #[test]
    fn test_ancestor_scoped_injectable_belongs_to_ancestor() {
        // Only the descendants ever ask for the AppScope singleton
        let declarations = DeclarationSet::new()
            .with_injectable(BindingDeclaration::constructor("Session", key("Session")).scoped("AppScope"))
            .with_graph(GraphSpec::new("AppGraph").scoped("AppScope"))
            .with_graph(
                GraphSpec::new("UserGraph")
                    .extending("AppGraph")
                    .scoped("UserScope")
                    .requesting(dep("Session")),
            )
            .with_graph(
                GraphSpec::new("ScreenGraph")
                    .extending("UserGraph")
                    .scoped("ScreenScope")
                    .requesting(dep("Session")),
            );

        let output = resolve(declarations);
        for name in ["UserGraph", "ScreenGraph"] {
            let graph = output.resolved(name).unwrap();
            assert!(graph.is_valid(), "{}: {:?}", name, graph.diagnostics);
            let session = graph.graph.get(&key("Session")).unwrap();
            assert_eq!(session.provenance, Provenance::Inherited { graph: "AppGraph".to_string() });
            assert!(graph.order.as_ref().unwrap().order().is_empty());
        }
    }

    #[test]
    fn test_child_sees_parent_bindings_the_parent_never_requests() {
        let plugins = key("Set<Plugin>");
        let declarations = DeclarationSet::new()
            .with_contribution(Contribution::new(
                "LoggingPlugin",
                "AppScope",
                BindingDeclaration::provider("LoggingPlugin", key("Plugin")).into_set(plugins.clone()),
            ))
            .with_graph(
                GraphSpec::new("AppGraph")
                    .scoped("AppScope")
                    .declaring(BindingDeclaration::provider("AppGraph.db", key("Db")).scoped("AppScope")),
            )
            .with_graph(
                GraphSpec::new("UserGraph")
                    .extending("AppGraph")
                    .scoped("UserScope")
                    .requesting(dep("Db"))
                    .requesting(ContextualTypeKey::direct(plugins.clone())),
            );

        let output = resolve(declarations);
        let user = output.resolved("UserGraph").unwrap();
        assert!(user.is_valid(), "{:?}", user.diagnostics);
        let db = user.graph.get(&key("Db")).unwrap();
        assert_eq!(db.provenance, Provenance::Inherited { graph: "AppGraph".to_string() });
        let set = user.graph.get(&plugins).unwrap();
        assert_eq!(set.dependencies().len(), 1);

        // Unused is judged per graph: the parent itself never reaches Db
        let app = output.resolved("AppGraph").unwrap();
        assert_eq!(app.diagnostics.of_kind(DiagnosticKind::UnusedBinding).len(), 1);
        assert!(app.is_valid());
    }

    struct SystemClock;

    impl ContributionExtension for SystemClock {
        fn name(&self) -> &str {
            "system-clock"
        }

        fn contribute(&self, scope: &ScopeMarker, declared: &[Contribution]) -> Vec<Contribution> {
            if declared.iter().any(|c| c.target_key() == &key("Clock")) {
                return Vec::new();
            }
            vec![Contribution::new(
                "SystemClock",
                scope.as_str(),
                BindingDeclaration::constructor("SystemClock", key("Clock")),
            )]
        }
    }

    #[test]
    fn test_extension_contributes_to_empty_scope() {
        let declarations =
            DeclarationSet::new().with_graph(GraphSpec::new("AppGraph").scoped("AppScope").requesting(dep("Clock")));
        let output = Resolver::with_extensions(declarations, ResolverConfig::default(), vec![Box::new(SystemClock)])
            .unwrap()
            .resolve();

        let app = output.resolved("AppGraph").unwrap();
        assert!(app.is_valid(), "{:?}", app.diagnostics);
        let clock = app.graph.get(&key("Clock")).unwrap();
        assert_eq!(clock.origin.as_str(), "SystemClock");
        assert_eq!(
            clock.provenance,
            Provenance::Contributed {
                scope: ScopeMarker::new("AppScope")
            }
        );
    }

    #[test]
    fn test_child_binding_shadows_parent() {
        let declarations = DeclarationSet::new()
            .with_contribution(
                Contribution::new(
                    "AppIntModule",
                    "AppScope",
                    BindingDeclaration::provider("AppIntModule", key("Int")),
                )
                .with_rank(100),
            )
            .with_graph(GraphSpec::new("AppGraph").scoped("AppScope").requesting(dep("Int")))
            .with_graph(
                GraphSpec::new("UserGraph")
                    .extending("AppGraph")
                    .requesting(dep("Int"))
                    .declaring(BindingDeclaration::provider("UserGraph.int", key("Int"))),
            );

        let output = resolve(declarations);
        let user = output.resolved("UserGraph").unwrap();
        let int = user.graph.get(&key("Int")).unwrap();
        assert_eq!(int.origin.as_str(), "UserGraph.int");
        assert_eq!(int.provenance, Provenance::Local);
    }

    #[test]
    fn test_parent_excludes_apply_to_children() {
        // The child aggregates AppScope again; the parent's exclude still holds
        let declarations = int_providers()
            .with_graph(GraphSpec::new("AppGraph").scoped("AppScope").excluding("FakeIntModule"))
            .with_graph(
                GraphSpec::new("FeatureGraph")
                    .extending("AppGraph")
                    .aggregating("AppScope")
                    .requesting(dep("Int")),
            );

        let output = resolve(declarations);
        let feature = output.resolved("FeatureGraph").unwrap();
        assert_eq!(feature.graph.get(&key("Int")).unwrap().origin.as_str(), "RealIntModule");
        assert_eq!(feature.diagnostics.of_kind(DiagnosticKind::SuspiciousScope).len(), 1);
    }

    #[test]
    fn test_child_excludes_do_not_leak_to_parent() {
        let declarations = int_providers()
            .with_graph(GraphSpec::new("AppGraph").scoped("AppScope").requesting(dep("Int")))
            .with_graph(
                GraphSpec::new("TestGraph")
                    .extending("AppGraph")
                    .scoped("TestScope")
                    .excluding("FakeIntModule"),
            );

        let output = resolve(declarations);
        let app = output.resolved("AppGraph").unwrap();
        assert_eq!(app.graph.get(&key("Int")).unwrap().origin.as_str(), "FakeIntModule");
    }

    #[test]
    fn test_warnings_as_errors_halts_graph() {
        let declarations = DeclarationSet::new().with_graph(
            GraphSpec::new("AppGraph").declaring(BindingDeclaration::provider("AppGraph.stale", key("Stale"))),
        );
        let mut config = ResolverConfig::default();
        config.diagnostics.warnings_as_errors = true;

        let output = Resolver::new(declarations, config).unwrap().resolve();
        let app = output.resolved("AppGraph").unwrap();
        assert!(!app.is_valid());
        assert!(app.order.is_none());
    }

    #[test]
    fn test_fatal_parent_still_feeds_children() {
        let declarations = app_with_session().with_injectable(
            BindingDeclaration::constructor("Broken", key("Broken")).with_dependency(dep("Nowhere")),
        );
        let declarations = DeclarationSet {
            graphs: declarations
                .graphs
                .into_iter()
                .map(|g| if g.name == "AppGraph" { g.requesting(dep("Broken")) } else { g })
                .collect(),
            ..declarations
        };

        let output = resolve(declarations);
        assert_eq!(output.graph("AppGraph").unwrap().status(), GraphStatus::Invalid);
        assert_eq!(output.graph("UserGraph").unwrap().status(), GraphStatus::Resolved);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let declarations = || {
            app_with_session()
                .with_graph(GraphSpec::new("WorkerGraph").scoped("WorkerScope").requesting(dep("Screen")))
                .with_graph(GraphSpec::new("AdminGraph").extending("AppGraph").requesting(dep("Screen")))
        };
        let sequential = resolve(declarations());

        let mut config = ResolverConfig::default();
        config.resolution.parallel = true;
        let parallel = Resolver::new(declarations(), config).unwrap().resolve();

        assert_eq!(
            serde_json::to_string(&sequential).unwrap(),
            serde_json::to_string(&parallel).unwrap()
        );
    }

    #[test]
    fn test_events_follow_levels() {
        let resolver = Resolver::new(app_with_session(), ResolverConfig::default()).unwrap();
        let (tx, rx) = crossbeam::channel::unbounded();
        resolver.resolve_with_events(Some(&tx));
        drop(tx);

        let events: Vec<ResolutionEvent> = rx.iter().collect();
        assert_eq!(events.first(), Some(&ResolutionEvent::Started { total: 2 }));
        assert_eq!(events.last(), Some(&ResolutionEvent::Finished));
        let finished: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ResolutionEvent::GraphFinished { graph, .. } => Some(graph.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec!["AppGraph", "UserGraph"]);
    }
}
