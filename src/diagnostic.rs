//! Diagnostics - user-facing findings collected during resolution
//!
//! Fatal findings never short-circuit a pass: they are collected so a single
//! run reports every independent problem. A graph with any fatal finding is
//! not ordered or sharded.

use crate::key::{Origin, TypeKey};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Fatal => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    DuplicateBinding,
    DuplicateMapKey,
    MissingBinding,
    UnbreakableCycle,
    ScopeMismatch,
    AmbiguousReplacement,
    UnmatchedReplacement,
    UnmatchedExclusion,
    UnusedBinding,
    UnusedGraphInput,
    SuspiciousScope,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::DuplicateBinding => "duplicate-binding",
            DiagnosticKind::DuplicateMapKey => "duplicate-map-key",
            DiagnosticKind::MissingBinding => "missing-binding",
            DiagnosticKind::UnbreakableCycle => "unbreakable-cycle",
            DiagnosticKind::ScopeMismatch => "scope-mismatch",
            DiagnosticKind::AmbiguousReplacement => "ambiguous-replacement",
            DiagnosticKind::UnmatchedReplacement => "unmatched-replacement",
            DiagnosticKind::UnmatchedExclusion => "unmatched-exclusion",
            DiagnosticKind::UnusedBinding => "unused-binding",
            DiagnosticKind::UnusedGraphInput => "unused-graph-input",
            DiagnosticKind::SuspiciousScope => "suspicious-scope",
        }
    }

    /// Severity before any configuration override
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnmatchedReplacement
            | DiagnosticKind::UnmatchedExclusion
            | DiagnosticKind::UnusedBinding
            | DiagnosticKind::UnusedGraphInput
            | DiagnosticKind::SuspiciousScope => Severity::Warning,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One finding, with enough context for the caller to map it to source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Graph the finding belongs to; `None` for scope-level findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
    pub message: String,
    /// Declarations involved, for source-location mapping
    #[serde(default)]
    pub origins: Vec<Origin>,
    /// Dependency path from the nearest root, or the cycle path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<TypeKey>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            graph: None,
            message: message.into(),
            origins: Vec::new(),
            path: Vec::new(),
        }
    }

    pub fn in_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn with_origins(mut self, origins: impl IntoIterator<Item = Origin>) -> Self {
        self.origins.extend(origins);
        self
    }

    pub fn with_path(mut self, path: Vec<TypeKey>) -> Self {
        self.path = path;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// `A -> B -> C` rendering of the path
    pub fn render_path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.severity, self.kind)?;
        if let Some(graph) = &self.graph {
            write!(f, " {}:", graph)?;
        }
        write!(f, " {}", self.message)?;
        if !self.path.is_empty() {
            write!(f, "\n    path: {}", self.render_path())?;
        }
        Ok(())
    }
}

/// Ordered collector of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_fatal)
    }

    pub fn fatal_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_fatal()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.fatal_count()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.entries.iter().filter(|d| d.kind == kind).collect()
    }

    /// Attach a graph name to every entry that has none
    pub fn attribute_to(&mut self, graph: &str) {
        for diagnostic in &mut self.entries {
            if diagnostic.graph.is_none() {
                diagnostic.graph = Some(graph.to_string());
            }
        }
    }

    /// Promote every warning to fatal
    pub fn promote_warnings(&mut self) {
        for diagnostic in &mut self.entries {
            diagnostic.severity = Severity::Fatal;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severities() {
        assert_eq!(DiagnosticKind::MissingBinding.default_severity(), Severity::Fatal);
        assert_eq!(DiagnosticKind::AmbiguousReplacement.default_severity(), Severity::Fatal);
        assert_eq!(DiagnosticKind::UnusedBinding.default_severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::UnmatchedExclusion.default_severity(), Severity::Warning);
    }

    #[test]
    fn test_collector_counts_and_promotion() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::new(DiagnosticKind::UnusedBinding, "unused Foo"));
        assert!(!diagnostics.has_fatal());
        assert_eq!(diagnostics.warning_count(), 1);

        diagnostics.promote_warnings();
        assert!(diagnostics.has_fatal());
        assert_eq!(diagnostics.fatal_count(), 1);
    }

    #[test]
    fn test_display_includes_path() {
        let diagnostic = Diagnostic::new(DiagnosticKind::UnbreakableCycle, "cycle between A and B")
            .in_graph("AppGraph")
            .with_path(vec![TypeKey::new("A"), TypeKey::new("B"), TypeKey::new("A")]);

        let text = diagnostic.to_string();
        assert!(text.starts_with("error[unbreakable-cycle] AppGraph:"));
        assert!(text.contains("A -> B -> A"));
    }
}
