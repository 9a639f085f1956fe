//! Dependency-graph construction and validation for the provider set.
//!
//! Validation is exhaustive by design: the whole provider set is examined
//! and every problem collected before any ordering decision is finalized.
//! A misconfigured rule set therefore surfaces as one combined error
//! naming every offending provider, not as a drip of single failures.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use thiserror::Error;
use tracing::debug;

use super::registry::ProviderRegistry;
use super::{DependencyRef, Phase, ProviderId};

/// One structural problem found while validating the provider set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("duplicate provider id \"{id}\"")]
    DuplicateId { id: ProviderId },
    #[error("provider \"{provider}\" references unknown provider by {reference}")]
    UnresolvedReference {
        provider: ProviderId,
        reference: String,
    },
    #[error(
        "provider \"{before}\" ({before_phase}) is constrained to execute before \
         \"{after}\" ({after_phase}), which contradicts their phases"
    )]
    PhaseContradiction {
        before: ProviderId,
        before_phase: Phase,
        after: ProviderId,
        after_phase: Phase,
    },
    #[error(
        "implicit-phase provider \"{provider}\" declares no execution-order constraints \
         and therefore has no position in the sequence"
    )]
    UnanchoredProvider { provider: ProviderId },
}

#[derive(Debug, Error)]
pub enum SortError {
    /// Aggregate configuration failure listing every issue found across
    /// the whole provider set.
    #[error("provider validation failed: {}", format_issues(.issues))]
    Validation { issues: Vec<ValidationIssue> },
    /// Dependency cycle; names every provider participating in any cycle.
    #[error("dependency cycle among providers: {}", format_participants(.participants))]
    Cycle { participants: Vec<ProviderId> },
}

pub type SortResult<T> = Result<T, SortError>;

fn format_issues(issues: &[ValidationIssue]) -> String {
    let listing: String = issues
        .iter()
        .map(|issue| format!("\n  - {}", issue))
        .collect();
    format!("{} issue(s){}", issues.len(), listing)
}

fn format_participants(participants: &[ProviderId]) -> String {
    participants
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why an edge exists in the provider graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeKind {
    /// Declared by a provider's execution order.
    Explicit,
    /// Connects one phase group to the next.
    PhaseBoundary,
}

/// Validated, cycle-free dependency graph over the registered providers.
///
/// Node weights are registry indices; an edge `a → b` means `a` must
/// execute strictly earlier than `b`.
#[derive(Debug)]
pub struct ProviderGraph {
    graph: DiGraph<usize, EdgeKind>,
    baseline_rank: Vec<usize>,
    ids: Vec<ProviderId>,
}

impl ProviderGraph {
    /// Builds and validates the graph for the whole registry.
    pub fn build(registry: &ProviderRegistry) -> SortResult<Self> {
        let entries = registry.entries();
        let count = entries.len();

        let ids: Vec<ProviderId> = entries.iter().map(|e| e.provider.id()).collect();
        let phases: Vec<Phase> = entries.iter().map(|e| e.provider.phase()).collect();

        let baseline_rank = baseline_ranks(&phases);

        // Lookup tables; on duplicates the first registration wins and the
        // duplicate is reported below.
        let mut by_id: HashMap<&ProviderId, usize> = HashMap::new();
        let mut by_type: HashMap<TypeId, usize> = HashMap::new();
        let mut issues = Vec::new();
        let mut reported_duplicates = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            if by_id.contains_key(&ids[index]) {
                if reported_duplicates.insert(ids[index].clone()) {
                    issues.push(ValidationIssue::DuplicateId {
                        id: ids[index].clone(),
                    });
                }
            } else {
                by_id.insert(&ids[index], index);
            }
            by_type.entry(entry.type_key).or_insert(index);
        }

        // Resolve explicit constraints into edges, collecting every
        // dangling reference instead of stopping at the first.
        let mut explicit_edges: Vec<(usize, usize)> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let order = entry.provider.execution_order();
            for reference in order.afters() {
                match resolve(reference, &by_id, &by_type) {
                    Some(target) => explicit_edges.push((target, index)),
                    None => issues.push(ValidationIssue::UnresolvedReference {
                        provider: ids[index].clone(),
                        reference: reference.to_string(),
                    }),
                }
            }
            for reference in order.befores() {
                match resolve(reference, &by_id, &by_type) {
                    Some(target) => explicit_edges.push((index, target)),
                    None => issues.push(ValidationIssue::UnresolvedReference {
                        provider: ids[index].clone(),
                        reference: reference.to_string(),
                    }),
                }
            }
            if entry.provider.phase().is_implicit() && order.is_empty() {
                issues.push(ValidationIssue::UnanchoredProvider {
                    provider: ids[index].clone(),
                });
            }
        }

        // Every explicit constraint must agree with the declared phases.
        for &(before, after) in &explicit_edges {
            if let (Some(before_priority), Some(after_priority)) =
                (phases[before].priority(), phases[after].priority())
            {
                if before_priority > after_priority {
                    issues.push(ValidationIssue::PhaseContradiction {
                        before: ids[before].clone(),
                        before_phase: phases[before],
                        after: ids[after].clone(),
                        after_phase: phases[after],
                    });
                }
            }
        }

        if !issues.is_empty() {
            return Err(SortError::Validation { issues });
        }

        let mut graph = DiGraph::with_capacity(count, explicit_edges.len());
        for index in 0..count {
            graph.add_node(index);
        }
        for &(before, after) in &explicit_edges {
            graph.add_edge(NodeIndex::new(before), NodeIndex::new(after), EdgeKind::Explicit);
        }

        // Phase-boundary edges: every provider of one phase group precedes
        // every provider of the next non-empty group. Implicit-phase
        // providers take part in neither side; their position comes
        // entirely from explicit edges.
        let mut phase_groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (index, phase) in phases.iter().enumerate() {
            if let Some(priority) = phase.priority() {
                phase_groups.entry(priority).or_default().push(index);
            }
        }
        let groups: Vec<&Vec<usize>> = phase_groups.values().collect();
        for pair in groups.windows(2) {
            for &earlier in pair[0] {
                for &later in pair[1] {
                    graph.add_edge(
                        NodeIndex::new(earlier),
                        NodeIndex::new(later),
                        EdgeKind::PhaseBoundary,
                    );
                }
            }
        }

        // Cycle detection over the full edge set; every vertex inside any
        // strongly connected component (or carrying a self-loop) is named.
        let mut participants: Vec<usize> = Vec::new();
        for component in tarjan_scc(&graph) {
            if component.len() > 1 {
                participants.extend(component.iter().map(|node| node.index()));
            }
        }
        for node in graph.node_indices() {
            if graph.contains_edge(node, node) {
                participants.push(node.index());
            }
        }
        if !participants.is_empty() {
            participants.sort_by_key(|&index| baseline_rank[index]);
            participants.dedup();
            return Err(SortError::Cycle {
                participants: participants.into_iter().map(|i| ids[i].clone()).collect(),
            });
        }

        debug!(
            providers = count,
            edges = graph.edge_count(),
            "provider graph validated"
        );

        Ok(Self {
            graph,
            baseline_rank,
            ids,
        })
    }

    /// Registry indices in a topological order compatible with the graph.
    ///
    /// Ties (no edge constraint either way) are broken by the phase-stable
    /// baseline rank, so the result is deterministic for a fixed input
    /// list.
    pub(crate) fn schedule(&self) -> Vec<usize> {
        use std::cmp::Reverse;
        use std::collections::BinaryHeap;

        let count = self.graph.node_count();
        let mut indegree = vec![0usize; count];
        for edge in self.graph.edge_references() {
            indegree[edge.target().index()] += 1;
        }

        let mut ready = BinaryHeap::new();
        for index in 0..count {
            if indegree[index] == 0 {
                ready.push(Reverse((self.baseline_rank[index], index)));
            }
        }

        let mut order = Vec::with_capacity(count);
        while let Some(Reverse((_, index))) = ready.pop() {
            order.push(index);
            for neighbor in self.graph.neighbors(NodeIndex::new(index)) {
                let target = neighbor.index();
                indegree[target] -= 1;
                if indegree[target] == 0 {
                    ready.push(Reverse((self.baseline_rank[target], target)));
                }
            }
        }

        debug_assert_eq!(order.len(), count, "graph was validated cycle-free");
        order
    }

    pub(crate) fn provider_id(&self, index: usize) -> &ProviderId {
        &self.ids[index]
    }
}

fn resolve(
    reference: &DependencyRef,
    by_id: &HashMap<&ProviderId, usize>,
    by_type: &HashMap<TypeId, usize>,
) -> Option<usize> {
    match reference {
        DependencyRef::ById(id) => by_id.get(id).copied(),
        DependencyRef::ByType(type_id) => by_type.get(type_id).copied(),
    }
}

/// Phase-stable baseline: providers sorted by phase priority, ties kept in
/// input order. Implicit-phase providers inherit the sort key of the
/// nearest preceding non-implicit provider, which keeps them at their
/// authored position relative to that neighborhood.
fn baseline_ranks(phases: &[Phase]) -> Vec<usize> {
    let mut inherited = 0u32;
    let keys: Vec<u32> = phases
        .iter()
        .map(|phase| match phase.priority() {
            Some(priority) => {
                inherited = priority;
                priority
            }
            None => inherited,
        })
        .collect();

    let mut order: Vec<usize> = (0..phases.len()).collect();
    order.sort_by_key(|&index| keys[index]);

    let mut ranks = vec![0usize; phases.len()];
    for (rank, &index) in order.iter().enumerate() {
        ranks[index] = rank;
    }
    ranks
}
