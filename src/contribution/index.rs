//! Contribution index - every contribution of a run grouped by scope and key

use crate::contribution::extension::ContributionExtension;
use crate::declaration::Contribution;
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::key::{Origin, ScopeMarker, TypeKey};
use std::collections::{BTreeMap, BTreeSet};

/// Contributions of one scope, in declaration order within each group.
#[derive(Debug, Clone, Default)]
pub struct ScopeContributions {
    /// Plain (non-multibinding) contributions per target key
    pub plain: BTreeMap<TypeKey, Vec<Contribution>>,
    /// Multibinding element contributions per collection key
    pub elements: BTreeMap<TypeKey, Vec<Contribution>>,
    /// Every contributing origin in this scope
    pub origins: BTreeSet<Origin>,
}

impl ScopeContributions {
    fn add(&mut self, contribution: Contribution) {
        self.origins.insert(contribution.origin.clone());
        let group = if contribution.is_multibinding_element() {
            &mut self.elements
        } else {
            &mut self.plain
        };
        group
            .entry(contribution.target_key().clone())
            .or_default()
            .push(contribution);
    }

    pub fn all(&self) -> impl Iterator<Item = &Contribution> {
        self.plain.values().chain(self.elements.values()).flatten()
    }

    pub fn len(&self) -> usize {
        self.all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Built once per run, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ContributionIndex {
    scopes: BTreeMap<ScopeMarker, ScopeContributions>,
}

impl ContributionIndex {
    pub fn build(contributions: &[Contribution], extensions: &[Box<dyn ContributionExtension>]) -> Self {
        Self::build_for_scopes(contributions, &[], extensions)
    }

    /// Like [`ContributionIndex::build`], but extensions also run for every
    /// scope in `scopes`, so a scope nobody contributes to can still be filled.
    pub fn build_for_scopes(
        contributions: &[Contribution],
        scopes: &[ScopeMarker],
        extensions: &[Box<dyn ContributionExtension>],
    ) -> Self {
        let mut declared: BTreeMap<ScopeMarker, Vec<Contribution>> =
            scopes.iter().map(|scope| (scope.clone(), Vec::new())).collect();
        for contribution in contributions {
            declared
                .entry(contribution.scope.clone())
                .or_default()
                .push(contribution.clone());
        }

        let mut index = BTreeMap::new();
        for (scope, contributions) in declared {
            let mut entry = ScopeContributions::default();
            for extension in extensions {
                let extra = extension.contribute(&scope, &contributions);
                if !extra.is_empty() {
                    tracing::debug!(
                        "Extension {} added {} contribution(s) to {}",
                        extension.name(),
                        extra.len(),
                        scope
                    );
                }
                for contribution in extra {
                    // Extensions may only contribute into the scope they were asked about
                    if contribution.scope == scope {
                        entry.add(contribution);
                    }
                }
            }
            for contribution in contributions {
                entry.add(contribution);
            }
            if !entry.is_empty() {
                index.insert(scope, entry);
            }
        }

        Self { scopes: index }
    }

    pub fn scope(&self, scope: &ScopeMarker) -> Option<&ScopeContributions> {
        self.scopes.get(scope)
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&ScopeMarker, &ScopeContributions)> {
        self.scopes.iter()
    }

    /// Whether any contribution in `scopes` comes from `origin`
    pub fn has_origin<'a>(&self, scopes: impl IntoIterator<Item = &'a ScopeMarker>, origin: &Origin) -> bool {
        scopes
            .into_iter()
            .filter_map(|scope| self.scopes.get(scope))
            .any(|contributions| contributions.origins.contains(origin))
    }

    /// Warnings for `replaces` entries naming an origin that never
    /// contributed to the same scope.
    pub fn unmatched_replacements(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for (scope, contributions) in &self.scopes {
            for contribution in contributions.all() {
                for replaced in &contribution.replaces {
                    if contributions.origins.contains(replaced) {
                        continue;
                    }
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::UnmatchedReplacement,
                            format!(
                                "{} replaces {}, which contributes nothing to {}",
                                contribution.origin, replaced, scope
                            ),
                        )
                        .with_origins([contribution.origin.clone(), replaced.clone()]),
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
    use crate::declaration::BindingDeclaration;

    fn provider(origin: &str, key: &str) -> BindingDeclaration {
        BindingDeclaration::provider(origin, TypeKey::new(key))
    }

    #[test]
    fn test_index_groups_by_scope_and_key() {
        let set = TypeKey::new("Set<Plugin>");
        let contributions = vec![
            Contribution::new("A", "AppScope", provider("A", "Int")),
            Contribution::new("B", "AppScope", provider("B", "Int")),
            Contribution::new("P", "AppScope", provider("P", "Plugin").into_set(set.clone())),
            Contribution::new("C", "UserScope", provider("C", "Int")),
        ];

        let index = ContributionIndex::build(&contributions, &[]);
        let app = index.scope(&ScopeMarker::new("AppScope")).unwrap();
        assert_eq!(app.plain[&TypeKey::new("Int")].len(), 2);
        assert_eq!(app.elements[&set].len(), 1);
        assert_eq!(app.len(), 3);
        assert!(index.has_origin([&ScopeMarker::new("UserScope")], &Origin::new("C")));
        assert!(!index.has_origin([&ScopeMarker::new("UserScope")], &Origin::new("A")));
    }

    #[test]
    fn test_unmatched_replacement_is_reported() {
        let contributions = vec![
            Contribution::new("A", "AppScope", provider("A", "Int")),
            Contribution::new("B", "AppScope", provider("B", "Int")).replacing("A").replacing("Gone"),
        ];
        let index = ContributionIndex::build(&contributions, &[]);
        let diagnostics = index.unmatched_replacements();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics.has_fatal());
        assert!(diagnostics.iter().next().unwrap().message.contains("Gone"));
    }

    struct DefaultClock;

    impl ContributionExtension for DefaultClock {
        fn name(&self) -> &str {
            "default-clock"
        }

        fn contribute(&self, scope: &ScopeMarker, declared: &[Contribution]) -> Vec<Contribution> {
            let clock = TypeKey::new("Clock");
            if declared.iter().any(|c| c.target_key() == &clock) {
                return Vec::new();
            }
            vec![Contribution::new("SystemClock", scope.as_str(), provider("SystemClock", "Clock"))]
        }
    }

    #[test]
    fn test_extension_fills_scope_without_declared_contributions() {
        let extensions: Vec<Box<dyn ContributionExtension>> = vec![Box::new(DefaultClock)];
        let app = ScopeMarker::new("AppScope");

        let index = ContributionIndex::build_for_scopes(&[], &[app.clone()], &extensions);
        let contributions = index.scope(&app).unwrap();
        assert_eq!(contributions.plain[&TypeKey::new("Clock")].len(), 1);
        assert!(contributions.origins.contains(&Origin::new("SystemClock")));

        // Scopes nobody names are still only seen through declared contributions
        assert!(ContributionIndex::build(&[], &extensions).scope(&app).is_none());
    }

    #[test]
    fn test_extension_sees_declared_contributions() {
        let extensions: Vec<Box<dyn ContributionExtension>> = vec![Box::new(DefaultClock)];
        let contributions = vec![Contribution::new("FakeClock", "AppScope", provider("FakeClock", "Clock"))];
        let index = ContributionIndex::build(&contributions, &extensions);
        let app = index.scope(&ScopeMarker::new("AppScope")).unwrap();
        assert_eq!(app.len(), 1);
        assert!(!app.origins.contains(&Origin::new("SystemClock")));
    }
}
