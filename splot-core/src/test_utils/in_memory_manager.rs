//! InMemoryResourceLinkManager — a `ResourceLinkManager` over a fixed set
//! of pre-registered things, for tests that don't need a real technology.

use crate::error::CoreError;
use crate::id::ThingId;
use crate::links::PropertyResourceLink;
use crate::resource_link::{ResourceLink, ResourceLinkManager};
use crate::thing::Thing;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolves URIs of the form `/<thing-id>/<section>/<trait>/<prop>` against
/// a registry of in-process `Thing`s. Good enough to exercise Pairing,
/// Rule, and Timer in tests without a wire codec or transport.
pub struct InMemoryResourceLinkManager {
    things: RwLock<HashMap<ThingId, Arc<Thing>>>,
}

impl InMemoryResourceLinkManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        InMemoryResourceLinkManager {
            things: RwLock::new(HashMap::new()),
        }
    }

    /// Register a thing under its id.
    pub async fn register(&self, thing: Arc<Thing>) {
        self.things.write().await.insert(thing.id().clone(), thing);
    }
}

impl Default for InMemoryResourceLinkManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceLinkManager for InMemoryResourceLinkManager {
    async fn resolve(&self, uri: &str) -> Result<Arc<dyn ResourceLink>, CoreError> {
        let trimmed = uri.trim_start_matches('/');
        let mut parts = trimmed.splitn(2, '/');
        let thing_id = parts
            .next()
            .ok_or_else(|| CoreError::UnknownResource(uri.to_owned()))?;
        let rest = parts
            .next()
            .ok_or_else(|| CoreError::UnknownResource(uri.to_owned()))?;

        let thing = self
            .things
            .read()
            .await
            .get(&ThingId::new(thing_id))
            .cloned()
            .ok_or_else(|| CoreError::UnknownResource(uri.to_owned()))?;

        let keys = thing.property_keys().await;
        let key = keys
            .into_iter()
            .find(|k| k.canonical() == rest)
            .ok_or_else(|| CoreError::UnknownResource(uri.to_owned()))?;

        Ok(Arc::new(PropertyResourceLink::new(thing, key)) as Arc<dyn ResourceLink>)
    }
}
