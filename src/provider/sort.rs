use tracing::{debug, instrument};

use crate::rule::{Rule, RuleId};

use super::graph::ProviderGraph;
use super::registry::ProviderRegistry;
use super::{ProviderId, SortResult};

/// The load-time output of sorting: providers in execution order and the
/// rule sequence flattened from them.
#[derive(Debug)]
pub struct ExecutionPlan {
    providers: Vec<ProviderId>,
    rules: Vec<Rule>,
}

impl ExecutionPlan {
    /// Provider ids in the order their rules will run.
    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Sorts the registered providers into a deterministic, dependency-
/// respecting execution plan.
///
/// Ordering is computed at provider granularity; a provider's rules keep
/// the order the provider listed them in. Rules registered without an id
/// receive one derived from the owning provider here, and every rule is
/// attributed back to its provider for diagnostics.
#[instrument(skip(registry), fields(providers = registry.len()))]
pub fn sort(registry: &ProviderRegistry) -> SortResult<ExecutionPlan> {
    let graph = ProviderGraph::build(registry)?;
    let schedule = graph.schedule();

    let mut providers = Vec::with_capacity(schedule.len());
    let mut rules = Vec::new();
    for index in schedule {
        let provider_id = graph.provider_id(index).clone();
        let provider = &registry.entries()[index].provider;
        for (position, mut rule) in provider.rules().into_iter().enumerate() {
            if rule.id().is_empty() {
                rule.set_id(RuleId::new(format!("{}.{}", provider_id, position + 1)));
            }
            rule.set_provider(provider_id.clone());
            rules.push(rule);
        }
        providers.push(provider_id);
    }

    debug!(
        providers = providers.len(),
        rules = rules.len(),
        "execution plan ready"
    );
    Ok(ExecutionPlan { providers, rules })
}
