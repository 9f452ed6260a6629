//! Structured reports over a resolution run
//!
//! Reports are plain serde data; rendering them as tables or writing them
//! to disk is left to the caller.

use crate::binding::BindingTag;
use crate::resolver::{GraphOutcome, GraphStatus, ResolutionOutput};
use crate::shard::InitializationOrder;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnusedEntry {
    pub graph: String,
    pub key: String,
    pub origin: String,
    pub is_input: bool,
}

/// Declarations and graph inputs no requested root ever reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnusedBindingsReport {
    pub entries: Vec<UnusedEntry>,
}

impl UnusedBindingsReport {
    pub fn from_output(output: &ResolutionOutput) -> Self {
        let entries = output
            .graphs
            .iter()
            .filter_map(GraphOutcome::resolved)
            .flat_map(|resolved| {
                resolved.graph.unused().iter().map(|unused| UnusedEntry {
                    graph: resolved.name.clone(),
                    key: unused.key.to_string(),
                    origin: unused.origin.to_string(),
                    is_input: unused.is_input,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    pub index: usize,
    pub bindings: usize,
    pub units: usize,
    pub first: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardingPlan {
    pub graph: String,
    pub orderable: usize,
    pub shards: Vec<ShardSummary>,
}

impl ShardingPlan {
    fn from_order(graph: &str, order: &InitializationOrder) -> Self {
        let shards = order
            .shards
            .iter()
            .map(|shard| ShardSummary {
                index: shard.index,
                bindings: shard.len(),
                units: shard.unit_count,
                first: shard.bindings.first().map(ToString::to_string),
                last: shard.bindings.last().map(ToString::to_string),
            })
            .collect();
        Self {
            graph: graph.to_string(),
            orderable: order.len(),
            shards,
        }
    }

    pub fn is_sharded(&self) -> bool {
        !self.shards.is_empty()
    }
}

/// Shard layout of every graph that reached the ordering step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardingPlanReport {
    pub graphs: Vec<ShardingPlan>,
}

impl ShardingPlanReport {
    pub fn from_output(output: &ResolutionOutput) -> Self {
        let graphs = output
            .graphs
            .iter()
            .filter_map(GraphOutcome::resolved)
            .filter_map(|resolved| {
                resolved
                    .order
                    .as_ref()
                    .map(|order| ShardingPlan::from_order(&resolved.name, order))
            })
            .collect();
        Self { graphs }
    }
}

/// One line per graph: counts, shape, and how the run went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub graph: String,
    pub status: GraphStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub bindings: usize,
    pub by_kind: BTreeMap<BindingTag, usize>,
    pub scoped: usize,
    pub inherited: usize,
    pub edges: usize,
    pub deferred_edges: usize,
    /// Ordering units with more than one member
    pub cyclic_units: usize,
    pub shards: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl GraphSummary {
    pub fn from_outcome(outcome: &GraphOutcome) -> Self {
        let mut summary = Self {
            graph: outcome.name().to_string(),
            status: outcome.status(),
            parent: None,
            bindings: 0,
            by_kind: BTreeMap::new(),
            scoped: 0,
            inherited: 0,
            edges: 0,
            deferred_edges: 0,
            cyclic_units: 0,
            shards: 0,
            errors: 0,
            warnings: 0,
        };
        let Some(resolved) = outcome.resolved() else {
            summary.errors = 1;
            return summary;
        };

        let stats = resolved.graph.stats();
        summary.parent = resolved.parent.clone();
        summary.bindings = stats.total_bindings;
        summary.by_kind = stats.by_kind;
        summary.scoped = stats.scoped_bindings;
        summary.inherited = stats.inherited_bindings;
        summary.edges = stats.total_edges;
        summary.deferred_edges = stats.deferred_edges;
        if let Some(order) = &resolved.order {
            summary.cyclic_units = order.cyclic_units();
            summary.shards = order.shards.len();
        }
        summary.errors = resolved.diagnostics.fatal_count();
        summary.warnings = resolved.diagnostics.warning_count();
        summary
    }

    pub fn all(output: &ResolutionOutput) -> Vec<Self> {
        output.graphs.iter().map(Self::from_outcome).collect()
    }
}

#[derive(Serialize)]
struct FingerprintGraph<'a> {
    graph: &'a str,
    status: GraphStatus,
    order: Option<&'a InitializationOrder>,
    diagnostics: Vec<String>,
}

/// blake3 digest over every graph's order and diagnostics.
///
/// Two runs over the same declaration set produce the same fingerprint.
pub fn fingerprint(output: &ResolutionOutput) -> String {
    let graphs: Vec<FingerprintGraph> = output
        .graphs
        .iter()
        .map(|outcome| {
            let resolved = outcome.resolved();
            FingerprintGraph {
                graph: outcome.name(),
                status: outcome.status(),
                order: resolved.and_then(|r| r.order.as_ref()),
                diagnostics: resolved
                    .map(|r| r.diagnostics.iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
            }
        })
        .collect();
    let run: Vec<String> = output.diagnostics.iter().map(ToString::to_string).collect();

    let mut hasher = blake3::Hasher::new();
    for diagnostic in &run {
        hasher.update(diagnostic.as_bytes());
        hasher.update(b"\n");
    }
    match serde_json::to_vec(&graphs) {
        Ok(bytes) => {
            hasher.update(&bytes);
        }
        Err(e) => tracing::warn!("Could not serialize graphs for fingerprint: {}", e),
    }
    hasher.finalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::declaration::{BindingDeclaration, DeclarationSet, GraphSpec};
    use crate::key::{ContextualTypeKey, TypeKey, Wrapping};
    use crate::resolver::Resolver;

    fn key(name: &str) -> TypeKey {
        TypeKey::new(name)
    }

    fn dep(name: &str) -> ContextualTypeKey {
        ContextualTypeKey::direct(key(name))
    }

    fn declarations() -> DeclarationSet {
        let mut set = DeclarationSet::new()
            .with_injectable(
                BindingDeclaration::constructor("A", key("A"))
                    .with_dependency(dep("B"))
                    .scoped("AppScope"),
            )
            .with_injectable(
                BindingDeclaration::constructor("B", key("B"))
                    .with_dependency(ContextualTypeKey::wrapped(key("A"), Wrapping::Provider)),
            );
        let mut app = GraphSpec::new("AppGraph")
            .scoped("AppScope")
            .requesting(dep("A"))
            .declaring(BindingDeclaration::provider("AppGraph.stale", key("Stale")));
        for i in 0..6 {
            let name = format!("Leaf{}", i);
            set = set.with_injectable(BindingDeclaration::constructor(name.clone(), key(&name)));
            app = app.requesting(dep(&name));
        }
        set.with_graph(app)
    }

    fn run(config: ResolverConfig) -> ResolutionOutput {
        Resolver::new(declarations(), config).unwrap().resolve()
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let first = fingerprint(&run(ResolverConfig::default()));
        let second = fingerprint(&run(ResolverConfig::default()));
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let sharded = fingerprint(&run(ResolverConfig::default().with_shard_size(3, 1)));
        assert_ne!(first, sharded);
    }

    #[test]
    fn test_unused_report() {
        let report = UnusedBindingsReport::from_output(&run(ResolverConfig::default()));
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].origin, "AppGraph.stale");
        assert_eq!(report.entries[0].graph, "AppGraph");
    }

    #[test]
    fn test_sharding_plan_report() {
        let report = ShardingPlanReport::from_output(&run(ResolverConfig::default().with_shard_size(3, 1)));
        let plan = &report.graphs[0];
        assert_eq!(plan.orderable, 8);
        assert!(plan.is_sharded());
        // The A/B cycle is one unit and never split
        let total: usize = plan.shards.iter().map(|s| s.bindings).sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn test_graph_summary() {
        let output = run(ResolverConfig::default());
        let summaries = GraphSummary::all(&output);
        let app = &summaries[0];
        assert_eq!(app.status, GraphStatus::Resolved);
        assert_eq!(app.bindings, 8);
        assert_eq!(app.scoped, 1);
        assert_eq!(app.cyclic_units, 1);
        assert_eq!(app.deferred_edges, 1);
        assert_eq!(app.warnings, 1);
        assert_eq!(app.by_kind.get(&BindingTag::Constructor), Some(&8));
    }
}
