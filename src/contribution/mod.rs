//! Contribution Aggregator - scope-attached candidate bindings
//!
//! Contributions are indexed once per run, then aggregated per
//! `(scope, excludes)` pair:
//! 1. Excluded contributions are dropped outright (their `replaces` too)
//! 2. Survivors' `replaces` remove the contributions they name
//! 3. Plain keys with several survivors keep the highest rank
//! 4. Multibinding elements are never ranked; map keys must stay unique

pub mod aggregator;
pub mod extension;
pub mod index;

pub use aggregator::{AggregatedScope, ContributionAggregator};
pub use extension::ContributionExtension;
pub use index::{ContributionIndex, ScopeContributions};
