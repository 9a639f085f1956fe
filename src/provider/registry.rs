use std::any::TypeId;
use std::sync::Arc;

use tracing::debug;

use super::RuleProvider;

/// A registered provider together with its concrete type key, kept so
/// by-type ordering references can be resolved later.
pub(crate) struct RegisteredProvider {
    pub(crate) provider: Arc<dyn RuleProvider>,
    pub(crate) type_key: TypeId,
}

/// Collects providers in registration order.
///
/// Registration itself never fails: duplicate ids and other structural
/// problems are deliberately deferred to the validation pass in
/// [`super::graph`], which reports every problem across the whole set at
/// once instead of stopping at the first.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: RuleProvider + 'static>(&mut self, provider: P) {
        debug!(provider = %provider.id(), "registering rule provider");
        self.entries.push(RegisteredProvider {
            provider: Arc::new(provider),
            type_key: TypeId::of::<P>(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn RuleProvider>> {
        self.entries.iter().map(|entry| &entry.provider)
    }

    pub(crate) fn entries(&self) -> &[RegisteredProvider] {
        &self.entries
    }
}
