//! # TESSERA: Rule-Driven Graph Analysis Engine
//!
//! Tessera executes condition/action rules, contributed by independently
//! authored providers, against a mutable typed property-graph working set.
//! Providers declare a lifecycle phase and optional explicit ordering
//! constraints; Tessera computes one deterministic, dependency-respecting
//! execution order across all of them and then drives the resulting rule
//! sequence through a scoped, listener-observed evaluation loop.
//!
//! ## Core Components
//!
//! ### Provider Sorting
//! The [`provider`] module turns an unordered provider set into a linear
//! execution plan:
//! - Registration and identity ([`provider::registry`])
//! - Dependency graph construction and validation ([`provider::graph`])
//! - Deterministic topological scheduling ([`provider::sort`])
//!
//! ### Rule Evaluation
//! The [`rule`] module is the interpreter half of the engine:
//! - Rule, condition and operation seams ([`rule`])
//! - Nested variable scopes with iteration payloads ([`rule::scope`])
//! - The iteration operator ([`rule::iteration`])
//! - Per-execution context and parameter store ([`rule::context`])
//! - A stock condition/operation vocabulary ([`rule::builtins`])
//!
//! ### Execution
//! The [`engine`] module consumes a sorted rule sequence strictly in order,
//! notifying lifecycle listeners at fixed points and isolating failures
//! according to the configured halt policy.
//!
//! ### Working Set
//! The [`graph`] module models the property-graph boundary: typed elements,
//! the [`graph::store::GraphStore`] seam, and a small in-memory backend.
//! Graph storage itself is an external collaborator; rules are the only
//! place the working set is mutated.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Providers → Registry → Dependency Graph → Topological Schedule → Engine
//! ```
//!
//! Sorting happens once, at load time. Validation is exhaustive before any
//! ordering decision is finalized: unresolved references, phase
//! contradictions and unanchored providers are gathered across the whole
//! provider set and reported together, and dependency cycles name every
//! participating provider. Execution then visits rules in exactly the
//! planned order; no reordering happens even under partial failure.

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod provider;
pub mod rule;
pub mod timestamp;

// Re-exports
pub use engine::{
    CancellationFlag, EngineError, ExecutionListener, ExecutionReport, ExecutionStatus,
    RuleExecutionEngine, RuleFailure,
};
pub use error::*;
pub use graph::{
    Element, ElementFilter, ElementId, ElementKind, GraphError, GraphResult, GraphStore,
    InMemoryGraph, Value,
};
pub use provider::{
    sort, DependencyRef, ExecutionOrder, ExecutionPlan, Phase, ProviderId, ProviderRegistry,
    RuleProvider, SortError, ValidationIssue,
};
pub use rule::{
    Condition, EvalError, EvalResult, EvaluationContext, Iteration, Operation, Rule, RuleId,
    ScopeError, VariableScope,
};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
