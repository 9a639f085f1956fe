//! # Rule Execution Engine
//!
//! The engine consumes a sorted rule sequence and drives it against the
//! working set, strictly in order and one rule at a time. Nothing here is
//! concurrent: conditions and operations are awaited sequentially, and the
//! only suspension points are calls into the graph backend.
//!
//! ## Lifecycle Listeners
//!
//! Externally registered [`ExecutionListener`]s observe execution at seven
//! fixed points:
//! - `before_execution` / `after_execution` around the whole run
//! - `before_rule_evaluation` before each rule's condition
//! - `after_rule_condition_evaluation` with the boolean outcome
//! - `before_rule_operations` / `after_rule_operations` around the matched
//!   branch
//! - `after_rule_execution_failed` when a condition or operation raises
//!
//! Notification order is fixed; listeners are invoked in registration
//! order and never batched or reordered.
//!
//! ## Failure Policy
//!
//! A failed rule is isolated by default: the failure listener fires, the
//! failure is recorded in the report, and execution continues with the
//! next rule. Halting instead is a policy decision, either engine-wide
//! ([`EngineConfig::halt_on_failure`]) or per rule
//! ([`Rule::with_halt_on_failure`]); a halt surfaces as a top-level
//! [`EngineError::Halted`] after the final listener notifications.
//!
//! ## Cancellation
//!
//! The engine checks a [`CancellationFlag`] between rules, never
//! pre-empting a rule mid-flight. A cancelled run still notifies
//! `after_execution` and reports what it completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::rule::context::EvaluationContext;
use crate::rule::{EvalError, Rule, RuleId};
use crate::timestamp::Timestamp;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execution halted by rule \"{rule}\": {cause}")]
    Halted { rule: RuleId, cause: EvalError },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// How an execution run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ExecutionStatus {
    /// Every rule was visited.
    Completed,
    /// A failure halted the run under the halt-on-failure policy.
    Halted,
    /// The cancellation flag was raised between rules.
    Cancelled,
}

/// One recorded rule failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: RuleId,
    pub message: String,
}

/// Summary of one execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    pub rules_evaluated: usize,
    pub rules_matched: usize,
    pub failures: Vec<RuleFailure>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl ExecutionReport {
    pub fn duration(&self) -> std::time::Duration {
        self.finished_at.since(self.started_at)
    }
}

/// Observer of the execution lifecycle. All hooks default to no-ops so
/// listeners implement only what they care about.
#[async_trait]
pub trait ExecutionListener: Send + Sync {
    async fn before_execution(&self, _context: &EvaluationContext) {}

    async fn after_execution(&self, _context: &EvaluationContext, _report: &ExecutionReport) {}

    async fn before_rule_evaluation(&self, _context: &EvaluationContext, _rule: &Rule) {}

    /// Fires after the condition evaluated cleanly; skipped when the
    /// condition itself raised.
    async fn after_rule_condition_evaluation(
        &self,
        _context: &EvaluationContext,
        _rule: &Rule,
        _matched: bool,
    ) {
    }

    async fn before_rule_operations(&self, _context: &EvaluationContext, _rule: &Rule) {}

    async fn after_rule_operations(&self, _context: &EvaluationContext, _rule: &Rule) {}

    async fn after_rule_execution_failed(
        &self,
        _context: &EvaluationContext,
        _rule: &Rule,
        _error: &EvalError,
    ) {
    }
}

/// Cooperative cancellation signal, checked by the engine between rules.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a sorted rule sequence against the working set.
pub struct RuleExecutionEngine {
    config: EngineConfig,
    listeners: Vec<Arc<dyn ExecutionListener>>,
    cancellation: CancellationFlag,
}

impl RuleExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
            cancellation: CancellationFlag::new(),
        }
    }

    pub fn register_listener(&mut self, listener: impl ExecutionListener + 'static) {
        self.listeners.push(Arc::new(listener));
    }

    /// Handle for the surrounding driver to request cancellation.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Executes the rules strictly in sequence.
    ///
    /// Returns the report, or [`EngineError::Halted`] when a failure
    /// tripped the halt policy; listeners have seen the full lifecycle
    /// either way.
    #[instrument(skip(self, rules, context), fields(execution_id = %context.execution_id(), rules = rules.len()))]
    pub async fn execute(
        &self,
        rules: &[Rule],
        context: &mut EvaluationContext,
    ) -> EngineResult<ExecutionReport> {
        let started_at = Timestamp::now();
        let mut status = ExecutionStatus::Completed;
        let mut rules_evaluated = 0;
        let mut rules_matched = 0;
        let mut failures = Vec::new();
        let mut halted: Option<(RuleId, EvalError)> = None;

        for listener in &self.listeners {
            listener.before_execution(context).await;
        }

        for rule in rules {
            if self.cancellation.is_cancelled() {
                debug!(rule = %rule.id(), "cancellation requested, stopping before rule");
                status = ExecutionStatus::Cancelled;
                break;
            }

            context.begin_rule(rule.id().clone(), self.config.clear_parameters_between_rules);
            for listener in &self.listeners {
                listener.before_rule_evaluation(context, rule).await;
            }
            rules_evaluated += 1;

            let mut failure: Option<EvalError> = None;
            match rule.condition().evaluate(context).await {
                Ok(matched) => {
                    for listener in &self.listeners {
                        listener
                            .after_rule_condition_evaluation(context, rule, matched)
                            .await;
                    }
                    if matched {
                        rules_matched += 1;
                        for listener in &self.listeners {
                            listener.before_rule_operations(context, rule).await;
                        }
                        match rule.when_matched().perform(context).await {
                            Ok(()) => {
                                for listener in &self.listeners {
                                    listener.after_rule_operations(context, rule).await;
                                }
                            }
                            Err(error) => failure = Some(error),
                        }
                    } else if let Some(otherwise) = rule.otherwise() {
                        if let Err(error) = otherwise.perform(context).await {
                            failure = Some(error);
                        }
                    }
                }
                Err(error) => failure = Some(error),
            }

            if let Some(error) = failure {
                warn!(rule = %rule.id(), error = %error, "rule execution failed");
                for listener in &self.listeners {
                    listener
                        .after_rule_execution_failed(context, rule, &error)
                        .await;
                }
                failures.push(RuleFailure {
                    rule: rule.id().clone(),
                    message: error.to_string(),
                });
                if self.config.halt_on_failure || rule.halts_on_failure() {
                    status = ExecutionStatus::Halted;
                    halted = Some((rule.id().clone(), error));
                    context.end_rule();
                    break;
                }
            }
            context.end_rule();
        }

        let report = ExecutionReport {
            status,
            rules_evaluated,
            rules_matched,
            failures,
            started_at,
            finished_at: Timestamp::now(),
        };
        for listener in &self.listeners {
            listener.after_execution(context, &report).await;
        }
        debug!(
            status = %report.status,
            evaluated = report.rules_evaluated,
            matched = report.rules_matched,
            failed = report.failures.len(),
            "execution finished"
        );

        if let Some((rule, cause)) = halted {
            return Err(EngineError::Halted { rule, cause });
        }
        Ok(report)
    }
}
