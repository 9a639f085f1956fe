//! Stock conditions and operations the analysis rules are assembled from.
//!
//! Conditions query and inspect the working set; operations mutate it
//! through the store handle. Anything not covered here can be supplied as
//! a custom [`Condition`]/[`Operation`] implementation or with the closure
//! adapters in [`crate::rule`].

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use crate::graph::{Element, ElementFilter, Value};

use super::context::EvaluationContext;
use super::{Condition, EvalError, EvalResult, Operation};

/// Unconditionally matched; useful for rules whose effect is not guarded.
pub struct Always;

#[async_trait]
impl Condition for Always {
    async fn evaluate(&self, _context: &mut EvaluationContext) -> EvalResult<bool> {
        Ok(true)
    }
}

/// Queries the working set and binds the result list into the scope.
/// Matched iff the query returned at least one element.
pub struct TypeQuery {
    filter: ElementFilter,
    into_var: String,
}

impl TypeQuery {
    pub fn from_tag(tag: impl Into<String>, into_var: impl Into<String>) -> Self {
        Self {
            filter: ElementFilter::with_tag(tag),
            into_var: into_var.into(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = self.filter.property(key, value);
        self
    }
}

#[async_trait]
impl Condition for TypeQuery {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool> {
        let store = context.store();
        let elements = store.query(&self.filter).await?;
        let matched = !elements.is_empty();
        context.scope_mut().bind(&self.into_var, elements)?;
        Ok(matched)
    }
}

/// Matches when any element bound to `variable` has a string property
/// matching the pattern. Named capture groups of the first match are
/// recorded in the parameter store for the operations that follow.
pub struct PropertyMatches {
    variable: String,
    property: String,
    pattern: Regex,
}

impl PropertyMatches {
    pub fn new(
        variable: impl Into<String>,
        property: impl Into<String>,
        pattern: &str,
    ) -> EvalResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| EvalError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            variable: variable.into(),
            property: property.into(),
            pattern,
        })
    }
}

#[async_trait]
impl Condition for PropertyMatches {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool> {
        let elements = context.scope().resolve(&self.variable)?.to_vec();
        for element in &elements {
            let Some(Value::String(text)) = element.property(&self.property) else {
                continue;
            };
            if let Some(captures) = self.pattern.captures(text) {
                for name in self.pattern.capture_names().flatten() {
                    if let Some(capture) = captures.name(name) {
                        context
                            .parameters()
                            .set(name, Value::String(capture.as_str().to_string()));
                    }
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Matched when every sub-condition matches; short-circuits.
pub struct And {
    conditions: Vec<Arc<dyn Condition>>,
}

impl And {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }
}

impl Default for And {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Condition for And {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool> {
        for condition in &self.conditions {
            if !condition.evaluate(context).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Matched when any sub-condition matches; short-circuits.
pub struct Or {
    conditions: Vec<Arc<dyn Condition>>,
}

impl Or {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }
}

impl Default for Or {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Condition for Or {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool> {
        for condition in &self.conditions {
            if condition.evaluate(context).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Inverts a condition. Side effects of the inner condition (scope
/// bindings, captures) still happen.
pub struct Not {
    inner: Arc<dyn Condition>,
}

impl Not {
    pub fn new(inner: impl Condition + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl Condition for Not {
    async fn evaluate(&self, context: &mut EvaluationContext) -> EvalResult<bool> {
        Ok(!self.inner.evaluate(context).await?)
    }
}

/// Sets a property on every element bound to `variable`, publishing the
/// modified copies back to the store.
pub struct SetProperty {
    variable: String,
    key: String,
    value: Value,
}

impl SetProperty {
    pub fn new(
        variable: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            variable: variable.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Operation for SetProperty {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        let store = context.store();
        let elements = context.scope().resolve(&self.variable)?.to_vec();
        for mut element in elements {
            element.set_property(&self.key, self.value.clone());
            store.put(element).await?;
        }
        Ok(())
    }
}

/// Adds a type tag to every element bound to `variable`.
pub struct AddTag {
    variable: String,
    tag: String,
}

impl AddTag {
    pub fn new(variable: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            tag: tag.into(),
        }
    }
}

#[async_trait]
impl Operation for AddTag {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        let store = context.store();
        let elements = context.scope().resolve(&self.variable)?.to_vec();
        for mut element in elements {
            element.add_tag(&self.tag);
            store.put(element).await?;
        }
        Ok(())
    }
}

/// Creates a fresh element in the working set, optionally binding it into
/// the scope for downstream operations.
pub struct CreateElement {
    tags: Vec<String>,
    properties: Vec<(String, Value)>,
    into_var: Option<String>,
}

impl CreateElement {
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            properties: Vec::new(),
            into_var: None,
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Takes the value of a previously captured parameter as the property
    /// value, resolved at perform time.
    pub fn property_from_parameter(
        mut self,
        key: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        self.properties
            .push((key.into(), Value::String(format!("{{{}}}", parameter.into()))));
        self
    }

    pub fn bind_as(mut self, variable: impl Into<String>) -> Self {
        self.into_var = Some(variable.into());
        self
    }
}

#[async_trait]
impl Operation for CreateElement {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        let mut element = Element::new(self.tags.clone());
        for (key, value) in &self.properties {
            element.set_property(key, substitute(value, context));
        }
        let created = context.store().create(element).await?;
        if let Some(variable) = &self.into_var {
            context.scope_mut().bind(variable, vec![created])?;
        }
        Ok(())
    }
}

/// Emits a log line with `{name}` placeholders substituted from the
/// parameter store.
pub struct Log {
    message: String,
    placeholder: Regex,
}

impl Log {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            placeholder: placeholder_pattern(),
        }
    }
}

#[async_trait]
impl Operation for Log {
    async fn perform(&self, context: &mut EvaluationContext) -> EvalResult<()> {
        let rendered = self
            .placeholder
            .replace_all(&self.message, |captures: &regex::Captures| {
                let name = &captures[1];
                context
                    .parameters()
                    .get(name)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned();
        info!(rule = ?context.current_rule(), "{}", rendered);
        Ok(())
    }
}

fn placeholder_pattern() -> Regex {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
}

fn substitute(value: &Value, context: &EvaluationContext) -> Value {
    if let Value::String(text) = value {
        let rendered = placeholder_pattern()
            .replace_all(text, |captures: &regex::Captures| {
                context
                    .parameters()
                    .get(&captures[1])
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned();
        return Value::String(rendered);
    }
    value.clone()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::graph::{GraphStore, InMemoryGraph};

    use super::*;

    async fn seeded_context() -> (Arc<InMemoryGraph>, EvaluationContext) {
        let store = Arc::new(InMemoryGraph::new());
        store
            .create(
                Element::new(["source-file"])
                    .with_property("name", "CustomerDao.java")
                    .with_property("package", "com.example.dao"),
            )
            .await
            .unwrap();
        store
            .create(
                Element::new(["source-file"])
                    .with_property("name", "readme.txt")
                    .with_property("package", "docs"),
            )
            .await
            .unwrap();
        let context = EvaluationContext::new(store.clone());
        (store, context)
    }

    #[tokio::test]
    async fn test_type_query_binds_results() {
        let (_store, mut context) = seeded_context().await;

        let query = TypeQuery::from_tag("source-file", "files");
        assert!(query.evaluate(&mut context).await.unwrap());
        assert_eq!(context.scope().resolve("files").unwrap().len(), 2);

        let none = TypeQuery::from_tag("archive", "archives");
        assert!(!none.evaluate(&mut context).await.unwrap());
        assert!(context.scope().resolve("archives").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_type_query_property_filter() {
        let (_store, mut context) = seeded_context().await;

        let query =
            TypeQuery::from_tag("source-file", "daos").with_property("package", "com.example.dao");
        assert!(query.evaluate(&mut context).await.unwrap());
        assert_eq!(context.scope().resolve("daos").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_property_matches_records_captures() {
        let (_store, mut context) = seeded_context().await;
        TypeQuery::from_tag("source-file", "files")
            .evaluate(&mut context)
            .await
            .unwrap();

        let matches =
            PropertyMatches::new("files", "name", r"(?P<stem>\w+)Dao\.java$").unwrap();
        assert!(matches.evaluate(&mut context).await.unwrap());
        assert_eq!(
            context.parameters().get("stem"),
            Some(Value::String("Customer".to_string()))
        );
    }

    #[tokio::test]
    async fn test_property_matches_invalid_pattern() {
        let result = PropertyMatches::new("files", "name", "(unclosed");
        assert!(matches!(result, Err(EvalError::InvalidPattern(_))));
    }

    #[tokio::test]
    async fn test_combinators() {
        let (_store, mut context) = seeded_context().await;

        let both = And::new()
            .with(TypeQuery::from_tag("source-file", "files"))
            .with(Always);
        assert!(both.evaluate(&mut context).await.unwrap());

        let either = Or::new()
            .with(TypeQuery::from_tag("archive", "archives"))
            .with(Always);
        assert!(either.evaluate(&mut context).await.unwrap());

        let negated = Not::new(TypeQuery::from_tag("archive", "archives"));
        assert!(negated.evaluate(&mut context).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_property_publishes_to_store() {
        let (store, mut context) = seeded_context().await;
        TypeQuery::from_tag("source-file", "files")
            .evaluate(&mut context)
            .await
            .unwrap();

        SetProperty::new("files", "reviewed", true)
            .perform(&mut context)
            .await
            .unwrap();

        let reviewed = store
            .query(&ElementFilter::with_tag("source-file").property("reviewed", true))
            .await
            .unwrap();
        assert_eq!(reviewed.len(), 2);
    }

    #[tokio::test]
    async fn test_add_tag() {
        let (store, mut context) = seeded_context().await;
        TypeQuery::from_tag("source-file", "files")
            .with_property("package", "com.example.dao")
            .evaluate(&mut context)
            .await
            .unwrap();

        AddTag::new("files", "classification")
            .perform(&mut context)
            .await
            .unwrap();

        let classified = store
            .query(&ElementFilter::with_tag("classification"))
            .await
            .unwrap();
        assert_eq!(classified.len(), 1);
    }

    #[tokio::test]
    async fn test_create_element_with_captured_parameter() {
        let (store, mut context) = seeded_context().await;
        context
            .parameters()
            .set("stem", Value::String("Customer".to_string()));

        CreateElement::with_tags(["classification"])
            .property("category", "data-access")
            .property_from_parameter("subject", "stem")
            .bind_as("hints")
            .perform(&mut context)
            .await
            .unwrap();

        let hints = store
            .query(&ElementFilter::with_tag("classification"))
            .await
            .unwrap();
        assert_eq!(hints.len(), 1);
        assert_eq!(
            hints[0].property("subject"),
            Some(&Value::String("Customer".to_string()))
        );
        assert_eq!(context.scope().resolve("hints").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_log_substitutes_parameters() {
        let (_store, mut context) = seeded_context().await;
        context
            .parameters()
            .set("stem", Value::String("Customer".to_string()));

        // unresolved placeholders are left intact rather than erased
        Log::new("classified {stem} ({missing})")
            .perform(&mut context)
            .await
            .unwrap();
    }
}
