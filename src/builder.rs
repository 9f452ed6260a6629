//! Graph Builder - assembles one graph's `BindingGraph`
//!
//! Candidates are pooled first (local declarations, contributed scopes,
//! then whatever the parent chain makes visible), then a breadth-first walk
//! from the requested roots pulls in exactly the dependency closure.

use crate::binding::{Binding, BindingKind, CollectionKind, MultibindingEntry, Provenance};
use crate::context::ResolutionContext;
use crate::declaration::{BindingDeclaration, DeclarationKind};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::extension::VisibleBindings;
use crate::graph::{BindingGraph, MissingEdge, NodeId, UnusedDeclaration};
use crate::hierarchy::GraphId;
use crate::key::{ContextualTypeKey, Origin, TypeKey};
use crate::Result;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Output of one build: the unvalidated graph plus what the builder found.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: BindingGraph,
    /// Everything this graph offers its children, reached or not
    pub exported: VisibleBindings,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Declared,
    Input,
    Contributed,
    Inherited,
    Synthetic,
}

impl Source {
    /// Owned candidates collide with each other; inherited ones are shadowed
    fn is_owned(self) -> bool {
        matches!(self, Source::Declared | Source::Input | Source::Contributed)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    binding: Binding,
    source: Source,
}

#[derive(Debug, Clone)]
struct PendingElement {
    binding: Binding,
    entry: MultibindingEntry,
}

#[derive(Debug, Clone)]
struct PendingCollection {
    collection: CollectionKind,
    /// `multibinds` declaration, if any
    declared: Option<Origin>,
    elements: Vec<PendingElement>,
    owned: bool,
}

pub struct GraphBuilder<'a> {
    context: &'a ResolutionContext,
    id: GraphId,
    visible: VisibleBindings,
    candidates: HashMap<TypeKey, Candidate>,
    collections: BTreeMap<TypeKey, PendingCollection>,
    diagnostics: Diagnostics,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(context: &'a ResolutionContext, id: GraphId, visible: VisibleBindings) -> Self {
        Self {
            context,
            id,
            visible,
            candidates: HashMap::new(),
            collections: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn build(mut self) -> Result<BuiltGraph> {
        let spec = self.context.spec(self.id);
        tracing::debug!("Building graph {}", spec.name);

        self.seed_declarations()?;
        self.merge_contributions()?;
        self.merge_inherited();
        self.check_exclusions();
        self.finish_collections();

        // The walk consumes candidates, so keep the full pool for children
        let pool: Vec<Binding> = self.candidates.values().map(|c| c.binding.clone()).collect();

        let mut graph = BindingGraph::new(spec.name.clone());
        self.walk(&mut graph);
        self.record_unused(&mut graph);
        graph.link();

        let exported = VisibleBindings::exported_by(&spec.name, pool.iter().chain(graph.bindings()));

        let mut diagnostics = self.diagnostics;
        diagnostics.attribute_to(&spec.name);
        tracing::debug!("Built graph {} with {} binding(s)", spec.name, graph.len());
        Ok(BuiltGraph {
            graph,
            exported,
            diagnostics,
        })
    }

    fn seed_declarations(&mut self) -> Result<()> {
        let spec = self.context.spec(self.id);
        let declared = spec.declarations.iter().map(|d| (d, Source::Declared));
        let inputs = spec.inputs.iter().map(|d| (d, Source::Input));

        for (declaration, source) in declared.chain(inputs) {
            let binding = declaration.to_binding(Provenance::Local)?;
            self.offer(declaration, binding, source);
        }
        Ok(())
    }

    fn merge_contributions(&mut self) -> Result<()> {
        let spec = self.context.spec(self.id);
        let excludes = self.context.effective_excludes(self.id);

        for scope in spec.contributed_scopes() {
            let aggregated = self.context.aggregator().aggregate(scope, &excludes);
            self.diagnostics.extend(aggregated.diagnostics.clone());

            let provenance = Provenance::Contributed { scope: scope.clone() };
            let winners = aggregated.plain.values();
            let elements = aggregated.elements.values().flatten();
            for contribution in winners.chain(elements) {
                let binding = contribution.binding.to_binding(provenance.clone())?;
                self.offer(&contribution.binding, binding, Source::Contributed);
            }
        }
        Ok(())
    }

    /// Route a declared or contributed binding into the candidate pool.
    fn offer(&mut self, declaration: &BindingDeclaration, binding: Binding, source: Source) {
        if let (Some(target), Some(entry)) = (&declaration.multibinding, declaration.to_entry()) {
            let pending = self.collections.entry(target.key.clone()).or_insert_with(|| PendingCollection {
                collection: target.collection,
                declared: None,
                elements: Vec::new(),
                owned: true,
            });
            if pending.collection != target.collection {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateBinding,
                        format!("{} is both a set and a map multibinding", target.key),
                    )
                    .with_origin(declaration.origin.clone()),
                );
                return;
            }
            pending.owned = true;
            pending.elements.push(PendingElement { binding, entry });
            return;
        }

        if declaration.kind == DeclarationKind::Multibinds {
            let collection = declaration.collection.unwrap_or(CollectionKind::Set);
            let pending = self.collections.entry(declaration.key.clone()).or_insert_with(|| PendingCollection {
                collection,
                declared: None,
                elements: Vec::new(),
                owned: true,
            });
            pending.declared.get_or_insert_with(|| declaration.origin.clone());
            return;
        }

        self.insert_candidate(binding, source);
    }

    fn insert_candidate(&mut self, binding: Binding, source: Source) {
        match self.candidates.get(&binding.key) {
            Some(existing) if existing.source.is_owned() && source.is_owned() => {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateBinding,
                        format!(
                            "{} is bound more than once: {} and {}",
                            binding.key,
                            existing.binding.describe(),
                            binding.describe()
                        ),
                    )
                    .with_origins([existing.binding.origin.clone(), binding.origin.clone()]),
                );
            }
            Some(_) => {}
            None => {
                self.candidates.insert(binding.key.clone(), Candidate { binding, source });
            }
        }
    }

    /// Parent-chain bindings fill only keys the graph does not bind itself.
    fn merge_inherited(&mut self) {
        let visible = std::mem::take(&mut self.visible);

        for (key, binding) in visible.plain {
            if self.candidates.contains_key(&key) || self.collections.contains_key(&key) {
                tracing::debug!("{} shadows inherited {}", self.context.spec(self.id).name, binding.describe());
                continue;
            }
            self.candidates.insert(key, Candidate {
                binding,
                source: Source::Inherited,
            });
        }

        for (key, inherited) in visible.collections {
            if self.candidates.contains_key(&key) {
                tracing::debug!("{} rebinds inherited multibinding {}", self.context.spec(self.id).name, key);
                continue;
            }
            let pending = self.collections.entry(key).or_insert_with(|| PendingCollection {
                collection: inherited.collection,
                declared: None,
                elements: Vec::new(),
                owned: false,
            });
            // Ancestor elements first; a local element with the same key wins
            let mut elements: Vec<PendingElement> = inherited
                .elements
                .into_iter()
                .filter(|e| !pending.elements.iter().any(|own| own.binding.key == e.binding.key))
                .map(|e| PendingElement {
                    binding: e.binding,
                    entry: e.entry,
                })
                .collect();
            elements.append(&mut pending.elements);
            pending.elements = elements;
        }
    }

    /// Warn about excludes naming an origin that contributes to none of the
    /// graph's scopes.
    fn check_exclusions(&mut self) {
        let spec = self.context.spec(self.id);
        let index = self.context.aggregator().index();
        for origin in &spec.excludes {
            if index.has_origin(spec.contributed_scopes(), origin) {
                continue;
            }
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnmatchedExclusion,
                    format!("{} excludes {}, which contributes to none of its scopes", spec.name, origin),
                )
                .with_origin(origin.clone()),
            );
        }
    }

    /// Turn pending collections into aggregate bindings plus element candidates.
    fn finish_collections(&mut self) {
        let collections = std::mem::take(&mut self.collections);

        for (key, pending) in collections {
            match self.candidates.get(&key) {
                Some(existing) if existing.source.is_owned() && pending.owned => {
                    let mut origins = vec![existing.binding.origin.clone()];
                    origins.extend(pending.elements.iter().map(|e| e.entry.origin.clone()));
                    origins.extend(pending.declared.clone());
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::DuplicateBinding,
                            format!("{} is bound both as a multibinding and by {}", key, existing.binding.describe()),
                        )
                        .with_origins(origins),
                    );
                    continue;
                }
                Some(existing) if existing.source.is_owned() => continue,
                _ => {}
            }

            self.check_map_keys(&key, &pending);

            let mut entries = Vec::with_capacity(pending.elements.len());
            for element in pending.elements {
                entries.push(element.entry);
                let source = if element.binding.provenance.is_inherited() {
                    Source::Inherited
                } else {
                    Source::Contributed
                };
                self.insert_candidate(element.binding, source);
            }

            let origin = pending
                .declared
                .unwrap_or_else(|| Origin::new(format!("multibinding:{}", key)));
            let aggregate = Binding::new(
                key.clone(),
                BindingKind::Multibinding {
                    collection: pending.collection,
                    entries,
                },
                origin,
            )
            .with_provenance(Provenance::Synthetic);
            self.candidates.insert(key, Candidate {
                binding: aggregate,
                source: Source::Synthetic,
            });
        }
    }

    /// Map keys must stay unique across every source merged into the graph.
    ///
    /// Clashes inside a single scope were already reported by the aggregator.
    fn check_map_keys(&mut self, key: &TypeKey, pending: &PendingCollection) {
        if pending.collection != CollectionKind::Map {
            return;
        }
        let mut seen: BTreeMap<&str, &PendingElement> = BTreeMap::new();
        for element in &pending.elements {
            let Some(map_key) = element.entry.map_key.as_deref() else {
                continue;
            };
            let Some(first) = seen.insert(map_key, element) else {
                continue;
            };
            let same_scope = matches!(
                (&first.binding.provenance, &element.binding.provenance),
                (Provenance::Contributed { scope: a }, Provenance::Contributed { scope: b }) if a == b
            );
            if same_scope {
                continue;
            }
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateMapKey,
                    format!("{} has two entries for map key {:?}", key, map_key),
                )
                .with_origins([first.entry.origin.clone(), element.entry.origin.clone()]),
            );
        }
    }

    /// Breadth-first walk from the requested roots.
    fn walk(&mut self, graph: &mut BindingGraph) {
        let spec = self.context.spec(self.id);
        let mut parents: HashMap<TypeKey, TypeKey> = HashMap::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        for root in &spec.requested {
            graph.add_root(root.clone());
            if let Some(id) = self.attach(graph, None, root, &parents) {
                queue.push_back(id);
            }
        }

        while let Some(id) = queue.pop_front() {
            let from = graph.node(id).key.clone();
            let dependencies = graph.node(id).dependencies();
            for dependency in dependencies {
                if graph.contains(&dependency.key) {
                    continue;
                }
                parents.insert(dependency.key.clone(), from.clone());
                if let Some(next) = self.attach(graph, Some(id), &dependency, &parents) {
                    queue.push_back(next);
                }
            }
        }
    }

    /// Bind `dependency` in `graph`; returns the node when it was newly added.
    fn attach(
        &mut self,
        graph: &mut BindingGraph,
        from: Option<NodeId>,
        dependency: &ContextualTypeKey,
        parents: &HashMap<TypeKey, TypeKey>,
    ) -> Option<NodeId> {
        let key = &dependency.key;
        if graph.contains(key) {
            return None;
        }

        let binding = if let Some(candidate) = self.candidates.remove(key) {
            candidate.binding
        } else if let Some(injectable) = self.context.injectable(key) {
            match injectable.to_binding(Provenance::Implicit) {
                Ok(binding) => match self.scope_owner(&binding) {
                    Some(owner) => {
                        tracing::debug!("{} belongs to the scope of {}", key, owner);
                        binding.with_provenance(Provenance::Inherited { graph: owner })
                    }
                    None => binding,
                },
                Err(e) => {
                    tracing::warn!("Skipping malformed injectable {}: {}", injectable.origin, e);
                    return None;
                }
            }
        } else if dependency.has_default {
            tracing::debug!("{} is absent; consumer falls back to its default", key);
            Binding::absent(key.clone())
        } else {
            graph.add_missing(MissingEdge {
                from,
                dependency: dependency.clone(),
                path: path_to(key, parents),
            });
            return None;
        };

        graph.insert(binding).ok()
    }

    /// Nearest ancestor attached to the scope of an implicit binding this
    /// graph is not attached to itself. That ancestor owns the single instance.
    fn scope_owner(&self, binding: &Binding) -> Option<String> {
        let scope = binding.scope.as_ref()?;
        if self.context.spec(self.id).scopes.contains(scope) {
            return None;
        }
        self.context
            .hierarchy()
            .ancestors(self.id)
            .into_iter()
            .map(|ancestor| self.context.spec(ancestor))
            .find(|spec| spec.scopes.contains(scope))
            .map(|spec| spec.name.clone())
    }

    fn record_unused(&self, graph: &mut BindingGraph) {
        let spec = self.context.spec(self.id);
        let declared = spec.declarations.iter().map(|d| (d, false));
        let inputs = spec.inputs.iter().map(|d| (d, true));

        for (declaration, is_input) in declared.chain(inputs) {
            let key = declaration.graph_key();
            if graph.contains(&key) {
                continue;
            }
            graph.add_unused(UnusedDeclaration {
                key,
                origin: declaration.origin.clone(),
                is_input,
            });
        }
    }
}

/// Root-first key path ending at `key`
fn path_to(key: &TypeKey, parents: &HashMap<TypeKey, TypeKey>) -> Vec<TypeKey> {
    let mut path = vec![key.clone()];
    let mut current = key;
    while let Some(parent) = parents.get(current) {
        if path.contains(parent) {
            break;
        }
        path.push(parent.clone());
        current = parent;
    }
    path.reverse();
    path
}
