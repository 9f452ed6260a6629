use crate::binding::CollectionKind;
use crate::contribution::index::{ContributionIndex, ScopeContributions};
use crate::declaration::Contribution;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::key::{Origin, ScopeMarker, TypeKey};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Resolved contributions of one scope, as seen by graphs with one
/// particular excludes set.
#[derive(Debug, Clone)]
pub struct AggregatedScope {
    pub scope: ScopeMarker,
    /// Winning contribution per plain key
    pub plain: BTreeMap<TypeKey, Contribution>,
    /// Surviving element contributions per collection key, in declaration order
    pub elements: BTreeMap<TypeKey, Vec<Contribution>>,
    pub diagnostics: Diagnostics,
}

type CacheKey = (ScopeMarker, BTreeSet<Origin>);

/// Applies exclude/replace/rank rules and memoizes the result.
///
/// The cache sits behind a `RwLock`: after the first computation for a
/// `(scope, excludes)` pair every graph only takes the read lock.
#[derive(Debug, Default)]
pub struct ContributionAggregator {
    index: ContributionIndex,
    cache: RwLock<HashMap<CacheKey, Arc<AggregatedScope>>>,
}

impl ContributionAggregator {
    pub fn new(index: ContributionIndex) -> Self {
        Self {
            index,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &ContributionIndex {
        &self.index
    }

    pub fn aggregate(&self, scope: &ScopeMarker, excludes: &BTreeSet<Origin>) -> Arc<AggregatedScope> {
        let cache_key = (scope.clone(), excludes.clone());
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&cache_key) {
                return Arc::clone(hit);
            }
        }

        let aggregated = Arc::new(match self.index.scope(scope) {
            Some(contributions) => aggregate_scope(scope, contributions, excludes),
            None => AggregatedScope {
                scope: scope.clone(),
                plain: BTreeMap::new(),
                elements: BTreeMap::new(),
                diagnostics: Diagnostics::new(),
            },
        });

        match self.cache.write() {
            // Another reader may have filled the slot meanwhile; results are identical
            Ok(mut cache) => Arc::clone(cache.entry(cache_key).or_insert(aggregated)),
            Err(_) => aggregated,
        }
    }
}

fn aggregate_scope(
    scope: &ScopeMarker,
    contributions: &ScopeContributions,
    excludes: &BTreeSet<Origin>,
) -> AggregatedScope {
    let mut diagnostics = Diagnostics::new();
    let mut plain = BTreeMap::new();
    let mut elements = BTreeMap::new();

    for (key, group) in &contributions.plain {
        let survivors = surviving(group, excludes);
        if let Some(winner) = pick_by_rank(scope, key, &survivors, &mut diagnostics) {
            plain.insert(key.clone(), winner.clone());
        }
    }

    for (key, group) in &contributions.elements {
        let survivors = surviving(group, excludes);
        check_map_keys(scope, key, &survivors, &mut diagnostics);
        elements.insert(key.clone(), survivors.into_iter().cloned().collect());
    }

    AggregatedScope {
        scope: scope.clone(),
        plain,
        elements,
        diagnostics,
    }
}

/// Steps 1 and 2: drop excluded contributions, then whatever the remaining
/// ones replace.
fn surviving<'a>(group: &'a [Contribution], excludes: &BTreeSet<Origin>) -> Vec<&'a Contribution> {
    let candidates: Vec<&Contribution> = group.iter().filter(|c| !excludes.contains(&c.origin)).collect();
    for excluded in group.iter().filter(|c| excludes.contains(&c.origin)) {
        tracing::debug!("Excluded contribution {} for {}", excluded.origin, excluded.target_key());
    }

    candidates
        .iter()
        .copied()
        .filter(|candidate| {
            let replacer = candidates
                .iter()
                .find(|other| other.origin != candidate.origin && other.replaces.contains(&candidate.origin));
            if let Some(replacer) = replacer {
                tracing::debug!("{} replaces {} for {}", replacer.origin, candidate.origin, candidate.target_key());
                return false;
            }
            true
        })
        .collect()
}

/// Step 3: highest rank wins; a tie at the top is ambiguous.
///
/// On a tie the first tied candidate is still returned so the graph walk can
/// continue and surface independent problems.
fn pick_by_rank<'a>(
    scope: &ScopeMarker,
    key: &TypeKey,
    survivors: &[&'a Contribution],
    diagnostics: &mut Diagnostics,
) -> Option<&'a Contribution> {
    let top_rank = survivors.iter().map(|c| c.rank).max()?;
    let top: Vec<&Contribution> = survivors.iter().copied().filter(|c| c.rank == top_rank).collect();

    if top.len() > 1 {
        let origins: Vec<String> = top.iter().map(|c| c.origin.to_string()).collect();
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::AmbiguousReplacement,
                format!(
                    "{} has {} contributions in {} with rank {}: {}",
                    key,
                    top.len(),
                    scope,
                    top_rank,
                    origins.join(", ")
                ),
            )
            .with_origins(top.iter().map(|c| c.origin.clone())),
        );
    } else if survivors.len() > 1 {
        tracing::debug!("{} wins {} in {} with rank {}", top[0].origin, key, scope, top_rank);
    }
    top.first().copied()
}

/// Step 4: map multibindings need unique aggregation keys among survivors.
fn check_map_keys(scope: &ScopeMarker, key: &TypeKey, survivors: &[&Contribution], diagnostics: &mut Diagnostics) {
    let mut seen: BTreeMap<&str, &Origin> = BTreeMap::new();
    for contribution in survivors {
        let Some(target) = &contribution.binding.multibinding else {
            continue;
        };
        if target.collection != CollectionKind::Map {
            continue;
        }
        let Some(map_key) = target.map_key.as_deref() else {
            continue;
        };
        if let Some(first) = seen.insert(map_key, &contribution.origin) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DuplicateMapKey,
                    format!("{} has two entries for map key {:?} in {}", key, map_key, scope),
                )
                .with_origins([first.clone(), contribution.origin.clone()]),
            );
        }
    }
}
