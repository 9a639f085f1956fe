use async_trait::async_trait;
use thiserror::Error;

use super::element::{Element, ElementId, Value};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("Store rejected operation: {0}")]
    Rejected(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Selection criteria for [`GraphStore::query`]: an optional type tag plus
/// property equality constraints, all of which must hold.
#[derive(Debug, Clone, Default)]
pub struct ElementFilter {
    tag: Option<String>,
    properties: Vec<(String, Value)>,
}

impl ElementFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !element.has_tag(tag) {
                return false;
            }
        }
        self.properties
            .iter()
            .all(|(key, expected)| element.property(key) == Some(expected))
    }
}

/// The narrow seam to the property-graph backend.
///
/// The sorter never touches this; it is reached only from inside rule
/// conditions and operations. Implementations are expected to keep query
/// results in a stable order so that rule execution stays deterministic
/// for a fixed working set.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Returns every element matching the filter.
    async fn query(&self, filter: &ElementFilter) -> GraphResult<Vec<Element>>;

    /// Fetches a single element by identity.
    async fn get(&self, id: ElementId) -> GraphResult<Element>;

    /// Adds a new element to the working set and returns it.
    async fn create(&self, element: Element) -> GraphResult<Element>;

    /// Publishes a modified copy of an existing element.
    async fn put(&self, element: Element) -> GraphResult<()>;

    /// Flushes pending changes to the backend.
    async fn commit(&self) -> GraphResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let element = Element::new(["source-file"]).with_property("extension", "java");

        assert!(ElementFilter::any().matches(&element));
        assert!(ElementFilter::with_tag("source-file").matches(&element));
        assert!(!ElementFilter::with_tag("archive").matches(&element));
        assert!(ElementFilter::with_tag("source-file")
            .property("extension", "java")
            .matches(&element));
        assert!(!ElementFilter::with_tag("source-file")
            .property("extension", "xml")
            .matches(&element));
    }
}
