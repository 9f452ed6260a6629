use crate::declaration::Contribution;
use crate::key::ScopeMarker;

/// Caller-supplied source of extra contributions.
///
/// Hosts pass implementations explicitly when building the resolution
/// context; nothing is discovered globally. Each extension sees the scope's
/// declared contributions and may add synthetic ones, which then go through
/// the same exclude/replace/rank rules.
pub trait ContributionExtension: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn contribute(&self, scope: &ScopeMarker, declared: &[Contribution]) -> Vec<Contribution>;
}
