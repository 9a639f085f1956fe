use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::element::{Element, ElementId};
use super::store::{ElementFilter, GraphError, GraphResult, GraphStore};

#[derive(Debug, Clone)]
struct StoredElement {
    // insertion sequence, so queries come back in a stable order
    seq: u64,
    element: Element,
}

/// DashMap-backed working set for tests and demos. Real deployments plug a
/// persistent graph backend into [`GraphStore`] instead.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    elements: DashMap<ElementId, StoredElement>,
    sequence: AtomicU64,
    commits: AtomicU64,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of commits issued so far.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn query(&self, filter: &ElementFilter) -> GraphResult<Vec<Element>> {
        let mut matched: Vec<(u64, Element)> = self
            .elements
            .iter()
            .filter(|entry| filter.matches(&entry.element))
            .map(|entry| (entry.seq, entry.element.clone()))
            .collect();
        matched.sort_by_key(|(seq, _)| *seq);
        Ok(matched.into_iter().map(|(_, element)| element).collect())
    }

    async fn get(&self, id: ElementId) -> GraphResult<Element> {
        self.elements
            .get(&id)
            .map(|entry| entry.element.clone())
            .ok_or(GraphError::ElementNotFound(id))
    }

    async fn create(&self, element: Element) -> GraphResult<Element> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.elements.insert(
            element.id(),
            StoredElement {
                seq,
                element: element.clone(),
            },
        );
        Ok(element)
    }

    async fn put(&self, element: Element) -> GraphResult<()> {
        match self.elements.get_mut(&element.id()) {
            Some(mut stored) => {
                stored.element = element;
                Ok(())
            }
            None => Err(GraphError::ElementNotFound(element.id())),
        }
    }

    async fn commit(&self) -> GraphResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
