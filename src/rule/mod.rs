//! Rules and the evaluation seams they are built from.
//!
//! A [`Rule`] pairs a [`Condition`] with a matched [`Operation`] and an
//! optional unmatched one. Conditions decide and may bind query results
//! into the variable scope; operations act and are the only place the
//! working set is mutated. Both seams are async traits so that graph
//! queries at the collaborator boundary stay ordinary awaited calls, and
//! both may nest arbitrarily — an operation can be an
//! [`Iteration`](iteration::Iteration) whose guard and branches are
//! themselves conditions and operations.

pub mod builtins;
pub mod context;
pub mod iteration;
pub mod scope;

use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphError;
use crate::provider::ProviderId;

pub use context::{EvaluationContext, ParameterStore};
pub use iteration::Iteration;
pub use scope::{Binding, ScopeError, VariableScope};

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Condition failed: {0}")]
    ConditionFailed(String),
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Stable rule identity used for diagnostics and failure reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decides whether a rule's matched branch runs.
///
/// Conditions may bind intermediate results into the scope and record
/// capture parameters for the operations that follow; they must not mutate
/// the working set.
#[async_trait]
pub trait Condition: Send + Sync {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool>;
}

/// Performs a rule's effect. Graph mutation happens here and only here,
/// delegated through the context's store handle.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()>;
}

// Closure adapters for ad-hoc conditions and operations.
type ConditionFn =
    Box<dyn for<'a> Fn(&'a mut EvaluationContext) -> BoxFuture<'a, EvalResult<bool>> + Send + Sync>;
type OperationFn =
    Box<dyn for<'a> Fn(&'a mut EvaluationContext) -> BoxFuture<'a, EvalResult<()>> + Send + Sync>;

pub struct FnCondition {
    f: ConditionFn,
}

impl FnCondition {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut EvaluationContext) -> BoxFuture<'a, EvalResult<bool>>
            + Send
            + Sync
            + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl Condition for FnCondition {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool> {
        (self.f)(context).await
    }
}

pub struct FnOperation {
    f: OperationFn,
}

impl FnOperation {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut EvaluationContext) -> BoxFuture<'a, EvalResult<()>>
            + Send
            + Sync
            + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl Operation for FnOperation {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        (self.f)(context).await
    }
}

/// The atomic schedulable unit: condition, matched operation, optional
/// unmatched operation, attributed back to the provider that contributed
/// it once the execution plan is assembled.
#[derive(Clone)]
pub struct Rule {
    id: RuleId,
    provider: Option<ProviderId>,
    condition: Arc<dyn Condition>,
    when_matched: Arc<dyn Operation>,
    otherwise: Option<Arc<dyn Operation>>,
    halt_on_failure: bool,
}

impl Rule {
    pub fn new(
        id: impl Into<RuleId>,
        condition: impl Condition + 'static,
        when_matched: impl Operation + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            provider: None,
            condition: Arc::new(condition),
            when_matched: Arc::new(when_matched),
            otherwise: None,
            halt_on_failure: false,
        }
    }

    /// A rule without an author-supplied id; the execution plan assigns
    /// one from the owning provider at load time.
    pub fn unnamed(
        condition: impl Condition + 'static,
        when_matched: impl Operation + 'static,
    ) -> Self {
        Self::new(RuleId::new(""), condition, when_matched)
    }

    pub fn with_otherwise(mut self, operation: impl Operation + 'static) -> Self {
        self.otherwise = Some(Arc::new(operation));
        self
    }

    /// Marks this rule as fatal: a failure in it halts the whole run even
    /// when the engine is configured to continue.
    pub fn with_halt_on_failure(mut self) -> Self {
        self.halt_on_failure = true;
        self
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn provider(&self) -> Option<&ProviderId> {
        self.provider.as_ref()
    }

    pub fn condition(&self) -> &dyn Condition {
        self.condition.as_ref()
    }

    pub fn when_matched(&self) -> &dyn Operation {
        self.when_matched.as_ref()
    }

    pub fn otherwise(&self) -> Option<&dyn Operation> {
        self.otherwise.as_deref()
    }

    pub fn halts_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    pub(crate) fn set_id(&mut self, id: RuleId) {
        self.id = id;
    }

    pub(crate) fn set_provider(&mut self, provider: ProviderId) {
        self.provider = Some(provider);
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("has_otherwise", &self.otherwise.is_some())
            .field("halt_on_failure", &self.halt_on_failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::BoxFuture;

    use crate::graph::InMemoryGraph;

    use super::*;

    #[tokio::test]
    async fn test_fn_adapters() {
        let mut context = EvaluationContext::new(Arc::new(InMemoryGraph::new()));

        let condition = FnCondition::new(|context: &mut EvaluationContext| {
            let at_root = context.scope().depth() == 1;
            Box::pin(async move { Ok(at_root) }) as BoxFuture<'_, EvalResult<bool>>
        });
        assert!(condition.evaluate(&mut context).await.unwrap());

        let operation = FnOperation::new(|context: &mut EvaluationContext| {
            context.scope_mut().push();
            Box::pin(async move { Ok(()) }) as BoxFuture<'_, EvalResult<()>>
        });
        operation.perform(&mut context).await.unwrap();
        assert_eq!(context.scope().depth(), 2);
    }

    #[test]
    fn test_rule_defaults() {
        let rule = Rule::unnamed(
            crate::rule::builtins::Always,
            crate::rule::builtins::Log::new("noop"),
        );
        assert!(rule.id().is_empty());
        assert!(rule.provider().is_none());
        assert!(rule.otherwise().is_none());
        assert!(!rule.halts_on_failure());
    }
}
