//! Working-set model for the property graph the rules operate on.
//!
//! Graph storage itself is an external collaborator; this module only
//! defines the element representation rules see, the narrow [`GraphStore`]
//! seam they reach it through, and a small in-memory backend used by tests
//! and demos.

pub mod element;
pub mod memory;
pub mod store;

pub use element::{Element, ElementId, ElementKind, Value};
pub use memory::InMemoryGraph;
pub use store::{ElementFilter, GraphError, GraphResult, GraphStore};
