use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::context::EvaluationContext;
use super::{Condition, EvalResult, Operation};

/// The primary control-flow construct of the rule language.
///
/// An iteration resolves a source variable to a collection of graph
/// elements, opens a fresh scope frame, and visits each element in order:
/// the element is bound as the payload variable, the optional guard is
/// evaluated (absent guard means unconditionally matched), and the matched
/// or unmatched operation runs. After the last element the payload binding
/// is removed and the frame is popped, so nothing the iteration bound
/// survives it.
///
/// Guards and both operations may themselves contain nested iterations;
/// each nesting level owns its own frame, and lookup falls through to the
/// enclosing frames, so an inner iteration sees the outer iteration's
/// current payload.
pub struct Iteration {
    source: String,
    payload: String,
    guard: Option<Arc<dyn Condition>>,
    when_matched: Arc<dyn Operation>,
    otherwise: Option<Arc<dyn Operation>>,
}

impl Iteration {
    /// Iterates the collection bound to `source`, binding each element as
    /// `payload` while `when_matched` runs.
    pub fn new(
        source: impl Into<String>,
        payload: impl Into<String>,
        when_matched: impl Operation + 'static,
    ) -> Self {
        Self {
            source: source.into(),
            payload: payload.into(),
            guard: None,
            when_matched: Arc::new(when_matched),
            otherwise: None,
        }
    }

    /// Adds a per-element guard; elements failing it take the unmatched
    /// branch instead.
    pub fn with_guard(mut self, guard: impl Condition + 'static) -> Self {
        self.guard = Some(Arc::new(guard));
        self
    }

    pub fn with_otherwise(mut self, operation: impl Operation + 'static) -> Self {
        self.otherwise = Some(Arc::new(operation));
        self
    }

    async fn visit_elements(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        let elements = context.scope().resolve(&self.source)?.to_vec();
        debug!(
            source = %self.source,
            payload = %self.payload,
            elements = elements.len(),
            "iterating"
        );

        for element in elements {
            context.scope_mut().bind_payload(&self.payload, element);

            let matched = match &self.guard {
                Some(guard) => guard.evaluate(context).await?,
                None => true,
            };

            if matched {
                self.when_matched.perform(context).await?;
            } else if let Some(otherwise) = &self.otherwise {
                otherwise.perform(context).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Operation for Iteration {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        context.scope_mut().push();
        let outcome = self.visit_elements(context).await;

        // The payload binding is removed before its frame is torn down;
        // teardown runs even when a guard or branch failed mid-iteration.
        let unbound = context.scope_mut().unbind_payload(&self.payload);
        context.scope_mut().pop()?;

        outcome?;
        unbound?;
        Ok(())
    }
}
