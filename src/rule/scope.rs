use std::collections::HashMap;
use std::slice;

use thiserror::Error;

use crate::graph::Element;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScopeError {
    #[error("Variable not found: {0}")]
    VariableNotFound(String),
    #[error("Variable \"{0}\" holds an iteration payload and cannot be rebound as a list")]
    PayloadRebound(String),
    #[error("Variable \"{0}\" holds an iteration payload; payload bindings cannot be modified")]
    PayloadImmutable(String),
    #[error("Variable \"{0}\" is not bound as an iteration payload")]
    NotAPayload(String),
    #[error("Cannot pop the root scope frame")]
    RootFrame,
}

pub type ScopeResult<T> = Result<T, ScopeError>;

/// One named binding inside a frame.
///
/// The two kinds are distinct on purpose: a payload is the single element
/// currently visited by an iteration and stays immutable for the lifetime
/// of that binding, while a list is an ordinary mutable collection.
#[derive(Debug, Clone)]
pub enum Binding {
    List(Vec<Element>),
    Payload(Element),
}

impl Binding {
    pub fn elements(&self) -> &[Element] {
        match self {
            Binding::List(elements) => elements,
            Binding::Payload(element) => slice::from_ref(element),
        }
    }

    pub fn is_payload(&self) -> bool {
        matches!(self, Binding::Payload(_))
    }
}

#[derive(Debug, Default)]
struct Frame {
    bindings: HashMap<String, Binding>,
}

/// Stack of named-variable frames over graph-element collections.
///
/// Lookup walks from the top frame downward, so an inner iteration sees
/// everything its enclosing iterations have bound; binding always happens
/// in the top frame, so inner names shadow outer ones without destroying
/// them.
#[derive(Debug)]
pub struct VariableScope {
    frames: Vec<Frame>,
}

impl Default for VariableScope {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableScope {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    /// Opens a new empty frame on top of the stack.
    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Discards the top frame. The root frame cannot be popped.
    pub fn pop(&mut self) -> ScopeResult<()> {
        if self.frames.len() > 1 {
            self.frames.pop();
            Ok(())
        } else {
            Err(ScopeError::RootFrame)
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Binds `name` to an ordinary list in the top frame. Rejected if the
    /// name currently holds an iteration payload there.
    pub fn bind(&mut self, name: &str, elements: Vec<Element>) -> ScopeResult<()> {
        let frame = self.top_mut();
        if matches!(frame.bindings.get(name), Some(Binding::Payload(_))) {
            return Err(ScopeError::PayloadRebound(name.to_string()));
        }
        frame.bindings.insert(name.to_string(), Binding::List(elements));
        Ok(())
    }

    /// Binds `name` to the current iteration element in the top frame,
    /// replacing any binding the frame already holds under that name.
    pub fn bind_payload(&mut self, name: &str, element: Element) {
        self.top_mut()
            .bindings
            .insert(name.to_string(), Binding::Payload(element));
    }

    /// Removes a payload binding from the top frame. Removing an absent
    /// name is a no-op; removing a list binding means the caller confused
    /// the two kinds and is rejected.
    pub fn unbind_payload(&mut self, name: &str) -> ScopeResult<()> {
        let frame = self.top_mut();
        match frame.bindings.get(name) {
            Some(Binding::Payload(_)) => {
                frame.bindings.remove(name);
                Ok(())
            }
            Some(Binding::List(_)) => Err(ScopeError::NotAPayload(name.to_string())),
            None => Ok(()),
        }
    }

    /// Extends the nearest list binding of `name`. Payload bindings are
    /// immutable and reject this.
    pub fn append(&mut self, name: &str, mut elements: Vec<Element>) -> ScopeResult<()> {
        for frame in self.frames.iter_mut().rev() {
            match frame.bindings.get_mut(name) {
                Some(Binding::List(existing)) => {
                    existing.append(&mut elements);
                    return Ok(());
                }
                Some(Binding::Payload(_)) => {
                    return Err(ScopeError::PayloadImmutable(name.to_string()));
                }
                None => {}
            }
        }
        Err(ScopeError::VariableNotFound(name.to_string()))
    }

    /// Looks up `name` starting at the top frame and walking down through
    /// enclosing frames until found.
    pub fn resolve(&self, name: &str) -> ScopeResult<&[Element]> {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.bindings.get(name) {
                return Ok(binding.elements());
            }
        }
        Err(ScopeError::VariableNotFound(name.to_string()))
    }

    /// Whether the nearest binding of `name` is an iteration payload.
    pub fn is_payload(&self, name: &str) -> bool {
        for frame in self.frames.iter().rev() {
            if let Some(binding) = frame.bindings.get(name) {
                return binding.is_payload();
            }
        }
        false
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("At least one scope frame should exist")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn named(name: &str) -> Element {
        Element::new(["source-file"]).with_property("name", name)
    }

    fn names(elements: &[Element]) -> Vec<String> {
        elements
            .iter()
            .map(|e| e.property("name").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_bind_and_resolve() {
        let mut scope = VariableScope::new();
        scope.bind("files", vec![named("a"), named("b")]).unwrap();

        let resolved = scope.resolve("files").unwrap();
        assert_eq!(names(resolved), vec!["a", "b"]);
        assert!(matches!(
            scope.resolve("missing"),
            Err(ScopeError::VariableNotFound(_))
        ));
    }

    #[test]
    fn test_inner_frame_sees_outer_binding() {
        let mut scope = VariableScope::new();
        scope.bind("outer", vec![named("o")]).unwrap();

        scope.push();
        scope.bind("inner", vec![named("i")]).unwrap();
        assert_eq!(names(scope.resolve("outer").unwrap()), vec!["o"]);
        assert_eq!(names(scope.resolve("inner").unwrap()), vec!["i"]);

        scope.pop().unwrap();
        assert!(scope.resolve("inner").is_err());
        assert!(scope.resolve("outer").is_ok());
    }

    #[test]
    fn test_shadowing_preserves_outer_binding() {
        let mut scope = VariableScope::new();
        scope.bind("x", vec![named("outer")]).unwrap();

        scope.push();
        scope.bind("x", vec![named("inner")]).unwrap();
        assert_eq!(names(scope.resolve("x").unwrap()), vec!["inner"]);

        scope.pop().unwrap();
        assert_eq!(names(scope.resolve("x").unwrap()), vec!["outer"]);
    }

    #[test]
    fn test_outer_payload_visible_from_inner_frame() {
        let mut scope = VariableScope::new();
        scope.push();
        scope.bind_payload("current", named("outer-element"));

        scope.push();
        scope.bind_payload("nested", named("inner-element"));

        // the inner iteration still sees the outer iteration's payload
        assert_eq!(
            names(scope.resolve("current").unwrap()),
            vec!["outer-element"]
        );
        assert!(scope.is_payload("current"));
    }

    #[test]
    fn test_payload_cannot_be_rebound_as_list() {
        let mut scope = VariableScope::new();
        scope.bind_payload("current", named("a"));

        assert_eq!(
            scope.bind("current", vec![named("b")]),
            Err(ScopeError::PayloadRebound("current".to_string()))
        );
        // the payload is untouched by the failed rebind
        assert_eq!(names(scope.resolve("current").unwrap()), vec!["a"]);
    }

    #[test]
    fn test_payload_is_immutable() {
        let mut scope = VariableScope::new();
        scope.bind_payload("current", named("a"));

        assert_eq!(
            scope.append("current", vec![named("b")]),
            Err(ScopeError::PayloadImmutable("current".to_string()))
        );
    }

    #[test]
    fn test_payload_overwrite_per_element() {
        let mut scope = VariableScope::new();
        scope.bind_payload("current", named("first"));
        scope.bind_payload("current", named("second"));
        assert_eq!(names(scope.resolve("current").unwrap()), vec!["second"]);
    }

    #[test]
    fn test_unbind_payload() {
        let mut scope = VariableScope::new();
        scope.bind_payload("current", named("a"));
        scope.unbind_payload("current").unwrap();
        assert!(scope.resolve("current").is_err());

        // absent name is a no-op
        scope.unbind_payload("current").unwrap();

        scope.bind("list", vec![named("a")]).unwrap();
        assert_eq!(
            scope.unbind_payload("list"),
            Err(ScopeError::NotAPayload("list".to_string()))
        );
    }

    #[test]
    fn test_append_extends_list() {
        let mut scope = VariableScope::new();
        scope.bind("files", vec![named("a")]).unwrap();
        scope.push();
        scope.append("files", vec![named("b")]).unwrap();
        assert_eq!(names(scope.resolve("files").unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn test_root_frame_cannot_be_popped() {
        let mut scope = VariableScope::new();
        assert_eq!(scope.pop(), Err(ScopeError::RootFrame));
        scope.push();
        scope.pop().unwrap();
        assert_eq!(scope.pop(), Err(ScopeError::RootFrame));
    }
}
