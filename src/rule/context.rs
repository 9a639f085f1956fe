use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::graph::{GraphStore, Value};

use super::scope::VariableScope;
use super::RuleId;

/// Transient key/value store carrying condition side data (for example
/// pattern capture groups) from a rule's condition to its operations.
///
/// The engine resets it when moving to the next rule, so parameters never
/// outlive the rule that captured them.
#[derive(Debug, Default)]
pub struct ParameterStore {
    values: DashMap<String, Value>,
}

impl ParameterStore {
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn clear(&self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-execution state threaded through every condition and operation.
///
/// Created once per top-level rule-set evaluation and discarded when the
/// run completes; never shared across concurrent evaluations (none are
/// supported).
pub struct EvaluationContext {
    execution_id: Uuid,
    store: Arc<dyn GraphStore>,
    scope: VariableScope,
    parameters: ParameterStore,
    current_rule: Option<RuleId>,
}

impl EvaluationContext {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            store,
            scope: VariableScope::new(),
            parameters: ParameterStore::default(),
            current_rule: None,
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Handle to the working-set backend.
    pub fn store(&self) -> Arc<dyn GraphStore> {
        self.store.clone()
    }

    pub fn scope(&self) -> &VariableScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut VariableScope {
        &mut self.scope
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    /// The rule currently under evaluation, for diagnostic attribution.
    pub fn current_rule(&self) -> Option<&RuleId> {
        self.current_rule.as_ref()
    }

    pub(crate) fn begin_rule(&mut self, rule: RuleId, clear_parameters: bool) {
        if clear_parameters {
            self.parameters.clear();
        }
        self.current_rule = Some(rule);
    }

    pub(crate) fn end_rule(&mut self) {
        self.current_rule = None;
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::InMemoryGraph;

    use super::*;

    #[test]
    fn test_parameter_store() {
        let params = ParameterStore::default();
        params.set("package", Value::String("com.example".to_string()));

        assert!(params.contains("package"));
        assert_eq!(
            params.get("package"),
            Some(Value::String("com.example".to_string()))
        );

        params.clear();
        assert!(params.is_empty());
    }

    #[test]
    fn test_begin_rule_clears_parameters() {
        let mut context = EvaluationContext::new(Arc::new(InMemoryGraph::new()));
        context.parameters().set("stale", Value::Boolean(true));

        context.begin_rule(RuleId::new("r1"), true);
        assert!(context.parameters().is_empty());
        assert_eq!(context.current_rule(), Some(&RuleId::new("r1")));

        context.end_rule();
        assert_eq!(context.current_rule(), None);
    }

    #[test]
    fn test_begin_rule_can_keep_parameters() {
        let mut context = EvaluationContext::new(Arc::new(InMemoryGraph::new()));
        context.parameters().set("kept", Value::Boolean(true));

        context.begin_rule(RuleId::new("r1"), false);
        assert!(context.parameters().contains("kept"));
    }
}
