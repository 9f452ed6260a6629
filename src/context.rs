//! Resolution context - the immutable value threaded through every component
//!
//! Built once per run from the declaration set; afterwards only read, so
//! sibling graphs may share it across threads.

use crate::binding::{CollectionKind, Provenance};
use crate::config::ResolverConfig;
use crate::contribution::{ContributionAggregator, ContributionExtension, ContributionIndex};
use crate::declaration::{BindingDeclaration, DeclarationKind, DeclarationSet, GraphSpec};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::hierarchy::{GraphHierarchy, GraphId};
use crate::key::{Origin, ScopeMarker, TypeKey};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};

pub struct ResolutionContext {
    declarations: DeclarationSet,
    config: ResolverConfig,
    hierarchy: GraphHierarchy,
    aggregator: ContributionAggregator,
    /// Injectable classes by key; first declaration wins
    injectables: HashMap<TypeKey, BindingDeclaration>,
    /// Findings that belong to the run rather than one graph
    diagnostics: Diagnostics,
}

impl ResolutionContext {
    pub fn new(declarations: DeclarationSet, config: ResolverConfig) -> Result<Self> {
        Self::with_extensions(declarations, config, Vec::new())
    }

    pub fn with_extensions(
        declarations: DeclarationSet,
        config: ResolverConfig,
        extensions: Vec<Box<dyn ContributionExtension>>,
    ) -> Result<Self> {
        check_declarations(&declarations)?;
        let hierarchy = GraphHierarchy::build(&declarations.graphs)?;
        let scopes: Vec<ScopeMarker> = declarations
            .graphs
            .iter()
            .flat_map(|graph| graph.contributed_scopes())
            .cloned()
            .collect();
        let index = ContributionIndex::build_for_scopes(&declarations.contributions, &scopes, &extensions);

        let mut diagnostics = index.unmatched_replacements();
        let mut injectables: HashMap<TypeKey, BindingDeclaration> = HashMap::new();
        for declaration in &declarations.injectables {
            if let Some(existing) = injectables.get(&declaration.key) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateBinding,
                        format!("{} is injectable through both {} and {}", declaration.key, existing.origin, declaration.origin),
                    )
                    .with_origins([existing.origin.clone(), declaration.origin.clone()]),
                );
                continue;
            }
            injectables.insert(declaration.key.clone(), declaration.clone());
        }

        tracing::debug!(
            "Resolution context: {} graph(s), {} injectable(s), {} contribution(s)",
            hierarchy.len(),
            injectables.len(),
            declarations.contributions.len()
        );

        Ok(Self {
            declarations,
            config,
            hierarchy,
            aggregator: ContributionAggregator::new(index),
            injectables,
            diagnostics,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &GraphHierarchy {
        &self.hierarchy
    }

    pub fn aggregator(&self) -> &ContributionAggregator {
        &self.aggregator
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn spec(&self, id: GraphId) -> &GraphSpec {
        &self.declarations.graphs[id.index()]
    }

    pub fn specs(&self) -> &[GraphSpec] {
        &self.declarations.graphs
    }

    pub fn injectable(&self, key: &TypeKey) -> Option<&BindingDeclaration> {
        self.injectables.get(key)
    }

    /// A graph's own excludes plus every ancestor's
    pub fn effective_excludes(&self, id: GraphId) -> BTreeSet<Origin> {
        let mut excludes = self.spec(id).excludes.clone();
        for ancestor in self.hierarchy.ancestors(id) {
            excludes.extend(self.spec(ancestor).excludes.iter().cloned());
        }
        excludes
    }
}

/// Reject structurally malformed declarations before any graph is built.
fn check_declarations(declarations: &DeclarationSet) -> Result<()> {
    let graph_declarations = declarations
        .graphs
        .iter()
        .flat_map(|g| g.declarations.iter().chain(g.inputs.iter()));
    let contributed = declarations.contributions.iter().map(|c| &c.binding);

    for declaration in declarations.injectables.iter().chain(graph_declarations).chain(contributed) {
        declaration.to_binding(Provenance::Local)?;
        if declaration.kind == DeclarationKind::Multibinds && declaration.is_multibinding_element() {
            return Err(Error::InvalidDeclaration(format!(
                "{} declares a multibinding and an element at once",
                declaration.origin
            )));
        }
        if let Some(target) = &declaration.multibinding {
            if target.collection == CollectionKind::Map && target.map_key.is_none() {
                return Err(Error::InvalidDeclaration(format!(
                    "map element {} has no map key",
                    declaration.origin
                )));
            }
        }
    }
    Ok(())
}
