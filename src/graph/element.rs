use core::fmt;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a working-set element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 値の型システム
#[derive(Clone, Debug, PartialEq, Default, Deserialize, Serialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    List(Vec<Value>),
    #[default]
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

/// Effective type of an element, resolved from its stored tag set.
///
/// Elements carry an explicit set of type-tag strings; a typed view is
/// obtained by conversion, never by inspecting the element's runtime
/// representation. An element tagged with several known kinds resolves to
/// the most specific one (last in declaration order below).
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum ElementKind {
    Project,
    Archive,
    SourceFile,
    TypeDeclaration,
    Classification,
    Unrecognized,
}

const KIND_TAGS: &[(&str, ElementKind)] = &[
    ("project", ElementKind::Project),
    ("archive", ElementKind::Archive),
    ("source-file", ElementKind::SourceFile),
    ("type-declaration", ElementKind::TypeDeclaration),
    ("classification", ElementKind::Classification),
];

/// One node of the working set: an identity, a set of type tags and a
/// property map. Elements are passed around by value; the store is the
/// single source of truth and [`GraphStore::put`](super::store::GraphStore)
/// publishes modified copies back.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    id: ElementId,
    tags: BTreeSet<String>,
    properties: HashMap<String, Value>,
}

impl Element {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: ElementId::new(),
            tags: tags.into_iter().map(Into::into).collect(),
            properties: HashMap::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Resolves the element's effective kind from its tag set.
    pub fn effective_kind(&self) -> ElementKind {
        let mut resolved = ElementKind::Unrecognized;
        for (tag, kind) in KIND_TAGS {
            if self.tags.contains(*tag) {
                resolved = kind.clone();
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_kind_most_specific_wins() {
        let element = Element::new(["source-file", "type-declaration"]);
        assert_eq!(element.effective_kind(), ElementKind::TypeDeclaration);
    }

    #[test]
    fn test_effective_kind_unknown_tags() {
        let element = Element::new(["something-else"]);
        assert_eq!(element.effective_kind(), ElementKind::Unrecognized);
    }

    #[test]
    fn test_property_round_trip() {
        let element = Element::new(["source-file"]).with_property("path", "src/main.rs");
        assert_eq!(
            element.property("path"),
            Some(&Value::String("src/main.rs".to_string()))
        );
        assert_eq!(element.property("missing"), None);
    }
}
