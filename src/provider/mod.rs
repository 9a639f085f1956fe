//! Rule providers and the load-time sorting pipeline.
//!
//! Providers are discovered externally and handed to this module as an
//! unordered set; nothing here loads plugins. Sorting happens once, in
//! three passes over the whole set:
//!
//! 1. [`registry`] — registration and identity (by id and by concrete
//!    type, so ordering constraints can reference either).
//! 2. [`graph`] — dependency-graph construction: phase-stable baseline
//!    order, exhaustive validation (every problem across every provider is
//!    collected before anything fails), explicit and phase-boundary edges,
//!    cycle detection naming all participants.
//! 3. [`sort`] — a deterministic topological schedule flattened into the
//!    final rule sequence.

pub mod graph;
pub mod registry;
pub mod sort;

use core::fmt;
use std::any::TypeId;

pub use graph::{SortError, SortResult, ValidationIssue};
pub use registry::ProviderRegistry;
pub use sort::{sort, ExecutionPlan};

use crate::rule::Rule;

/// Stable provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase a provider belongs to.
///
/// Phases are totally ordered by priority and establish the default
/// ordering between providers that declare nothing else. `Implicit` is the
/// odd one out: it has no inherent position, so an implicit-phase provider
/// must justify its place in the sequence with at least one explicit
/// ordering constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Phase {
    Initialization,
    Discovery,
    Analysis,
    Migration,
    Reporting,
    Implicit,
}

impl Phase {
    pub fn priority(self) -> Option<u32> {
        match self {
            Phase::Initialization => Some(10),
            Phase::Discovery => Some(20),
            Phase::Analysis => Some(30),
            Phase::Migration => Some(40),
            Phase::Reporting => Some(50),
            Phase::Implicit => None,
        }
    }

    pub fn is_implicit(self) -> bool {
        self == Phase::Implicit
    }
}

/// Reference to another provider inside an ordering constraint, either by
/// id string or by concrete provider type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyRef {
    ById(ProviderId),
    ByType(TypeId),
}

impl DependencyRef {
    pub fn id(id: impl Into<ProviderId>) -> Self {
        Self::ById(id.into())
    }

    pub fn of<P: RuleProvider + 'static>() -> Self {
        Self::ByType(TypeId::of::<P>())
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRef::ById(id) => write!(f, "id \"{}\"", id),
            DependencyRef::ByType(type_id) => write!(f, "type {:?}", type_id),
        }
    }
}

/// Explicit ordering constraints a provider declares relative to others.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOrder {
    after: Vec<DependencyRef>,
    before: Vec<DependencyRef>,
}

impl ExecutionOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// This provider must execute strictly after the referenced one.
    pub fn after(mut self, reference: DependencyRef) -> Self {
        self.after.push(reference);
        self
    }

    /// This provider must execute strictly before the referenced one.
    pub fn before(mut self, reference: DependencyRef) -> Self {
        self.before.push(reference);
        self
    }

    pub fn afters(&self) -> &[DependencyRef] {
        &self.after
    }

    pub fn befores(&self) -> &[DependencyRef] {
        &self.before
    }

    pub fn is_empty(&self) -> bool {
        self.after.is_empty() && self.before.is_empty()
    }
}

/// A unit contributing rules plus the metadata the sorter orders it by.
///
/// Providers are constructed once at load time and never mutated by the
/// scheduler; the scheduler only reorders.
pub trait RuleProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn phase(&self) -> Phase {
        Phase::Migration
    }

    fn execution_order(&self) -> ExecutionOrder {
        ExecutionOrder::default()
    }

    /// Descriptive tags for external filtering; the sorter never consults
    /// these.
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn rules(&self) -> Vec<Rule>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_priorities_are_totally_ordered() {
        let phases = [
            Phase::Initialization,
            Phase::Discovery,
            Phase::Analysis,
            Phase::Migration,
            Phase::Reporting,
        ];
        for pair in phases.windows(2) {
            assert!(pair[0].priority().unwrap() < pair[1].priority().unwrap());
        }
        assert_eq!(Phase::Implicit.priority(), None);
        assert!(Phase::Implicit.is_implicit());
    }

    #[test]
    fn test_execution_order_builder() {
        let order = ExecutionOrder::new()
            .after(DependencyRef::id("first"))
            .before(DependencyRef::id("last"));
        assert_eq!(order.afters().len(), 1);
        assert_eq!(order.befores().len(), 1);
        assert!(!order.is_empty());
        assert!(ExecutionOrder::new().is_empty());
    }
}
