//! Concrete `ResourceLink` implementations: a property link, a section
//! link, and a native-URI link.

use crate::error::CoreError;
use crate::modifier::Modifier;
use crate::property_key::{PropertyKey, Section};
use crate::resource_link::{ListenerId, ResourceLink, RestClient};
use crate::thing::Thing;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

/// A `ResourceLink` wrapping one property on a local `Thing`.
pub struct PropertyResourceLink {
    thing: Arc<Thing>,
    key: PropertyKey,
}

impl PropertyResourceLink {
    /// Wrap a single property on `thing`.
    pub fn new(thing: Arc<Thing>, key: PropertyKey) -> Self {
        PropertyResourceLink { thing, key }
    }
}

#[async_trait]
impl ResourceLink for PropertyResourceLink {
    async fn fetch(&self, modifier: &Modifier) -> Result<Value, CoreError> {
        self.thing.get(&self.key, modifier).await
    }

    async fn invoke(&self, value: Option<Value>, modifier: &Modifier) -> Result<(), CoreError> {
        self.thing.set(&self.key, value, modifier).await
    }

    async fn register_listener(&self) -> Result<(ListenerId, WatchStream<Value>), CoreError> {
        self.thing.register_listener(&self.key).await
    }

    async fn unregister_listener(&self, id: ListenerId) {
        self.thing.unregister_listener(id).await;
    }
}

/// A `ResourceLink` wrapping a whole section of a local `Thing`, collapsing
/// `<section>/<trait>/<prop>` keys to a nested map and back.
pub struct SectionResourceLink {
    thing: Arc<Thing>,
    section: Section,
}

impl SectionResourceLink {
    /// Wrap a section of `thing`.
    pub fn new(thing: Arc<Thing>, section: Section) -> Self {
        SectionResourceLink { thing, section }
    }
}

#[async_trait]
impl ResourceLink for SectionResourceLink {
    async fn fetch(&self, _modifier: &Modifier) -> Result<Value, CoreError> {
        self.thing.section_snapshot(self.section).await
    }

    async fn invoke(&self, value: Option<Value>, _modifier: &Modifier) -> Result<(), CoreError> {
        let map = value.ok_or_else(|| {
            CoreError::InvalidValue("section write requires a map value".into())
        })?;
        self.thing.apply_section(self.section, &map).await
    }

    async fn register_listener(&self) -> Result<(ListenerId, WatchStream<Value>), CoreError> {
        Err(CoreError::Technology(
            "section links do not support per-value listeners; register on individual properties".into(),
        ))
    }

    async fn unregister_listener(&self, _id: ListenerId) {}
}

/// A `ResourceLink` that round-trips through a [`RestClient`] against a
/// native URI — the handle primitives use when the other end of a Pairing
/// or a Rule condition lives outside this process.
pub struct NativeUriResourceLink {
    client: Arc<dyn RestClient>,
    uri: String,
    broadcast: crate::resource_link::ChangeBroadcastHandle,
}

#[async_trait]
impl ResourceLink for NativeUriResourceLink {
    async fn fetch(&self, modifier: &Modifier) -> Result<Value, CoreError> {
        self.client.get(&self.uri, modifier).await
    }

    async fn invoke(&self, value: Option<Value>, modifier: &Modifier) -> Result<(), CoreError> {
        self.client.post(&self.uri, value, modifier).await
    }

    async fn register_listener(&self) -> Result<(ListenerId, WatchStream<Value>), CoreError> {
        let id = ListenerId(self.broadcast.next_id());
        let stream = self.broadcast.subscribe();
        Ok((id, stream))
    }

    async fn unregister_listener(&self, _id: ListenerId) {
        // Native-URI links have no per-id bookkeeping: the broadcast
        // channel drops a subscriber automatically when its stream is
        // dropped. The id exists for protocol symmetry with the other
        // two implementations.
    }
}

impl NativeUriResourceLink {
    /// Build a link over `uri`, pushing externally-observed notifications
    /// (e.g. from an observe/subscribe channel the technology maintains)
    /// through `publish`.
    pub fn new(client: Arc<dyn RestClient>, uri: impl Into<String>) -> Self {
        NativeUriResourceLink {
            client,
            uri: uri.into(),
            broadcast: crate::resource_link::ChangeBroadcastHandle::new(Value::Null),
        }
    }

    /// Publish an externally-observed value change to this link's
    /// listeners.
    pub fn publish(&self, value: Value) {
        self.broadcast.publish(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{PropId, ThingId, TraitId};
    use crate::property_key::PropertyFlags;
    use crate::thing::PropertySchema;
    use crate::value::ValueType;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tokio::sync::RwLock;

    struct EchoTrait {
        schema: Vec<PropertySchema>,
        value: RwLock<Value>,
    }

    #[async_trait]
    impl crate::thing::TraitImpl for EchoTrait {
        fn trait_id(&self) -> TraitId {
            TraitId::new("onof")
        }
        fn property_schema(&self) -> &[PropertySchema] {
            &self.schema
        }
        fn method_schema(&self) -> &[crate::property_key::MethodKey] {
            &[]
        }
        async fn get(&self, _prop_id: &PropId) -> Result<Value, CoreError> {
            Ok(self.value.read().await.clone())
        }
        async fn set(&self, _prop_id: &PropId, value: Value, _modifier: &Modifier) -> Result<(), CoreError> {
            *self.value.write().await = value;
            Ok(())
        }
        async fn invoke(
            &self,
            method_id: &crate::id::MethodId,
            _args: BTreeMap<String, Value>,
        ) -> Result<Value, CoreError> {
            Err(CoreError::MethodNotFound(method_id.to_string()))
        }
    }

    #[tokio::test]
    async fn property_link_fetch_and_invoke_round_trip() {
        let key = PropertyKey::new(Section::State, TraitId::new("onof"), PropId::new("v"), ValueType::Bool);
        let thing = Arc::new(Thing::new(ThingId::new("light-1")));
        thing
            .register_trait(Arc::new(EchoTrait {
                schema: vec![PropertySchema {
                    key: key.clone(),
                    flags: PropertyFlags::read_write(),
                }],
                value: RwLock::new(Value::Bool(false)),
            }))
            .await;
        let link = PropertyResourceLink::new(thing, key);
        link.invoke(Some(Value::Bool(true)), &Modifier::default()).await.unwrap();
        let v = link.fetch(&Modifier::default()).await.unwrap();
        assert!(v.as_bool().unwrap());
    }
}
