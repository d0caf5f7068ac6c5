//! Things: property/method/child containers with typed traits and
//! listeners.

use crate::error::CoreError;
use crate::id::{MethodId, PropId, ThingId, TraitId};
use crate::modifier::Modifier;
use crate::property_key::{MethodKey, PropertyFlags, PropertyKey, Section};
use crate::resource_link::{ChangeBroadcast, ListenerId};
use crate::transition::{spawn_linear, TransitionHandle};
use crate::value::{Value, ValueType};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_stream::wrappers::WatchStream;

/// A property's schema: its key plus its flags.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    /// Property identity.
    pub key: PropertyKey,
    /// Flags governing read/write/notify behavior.
    pub flags: PropertyFlags,
}

/// A single trait implementation a `Thing` can host.
///
/// Replaces the "AbstractLocalTrait" base-class pattern with a trait object
/// the `Thing` holds in a set: no class hierarchy, just a declared schema
/// plus get/set/invoke entry points.
#[async_trait]
pub trait TraitImpl: Send + Sync {
    /// Short id of this trait (e.g. `onof`, `levl`, `actn`).
    fn trait_id(&self) -> TraitId;

    /// Properties this trait declares.
    fn property_schema(&self) -> &[PropertySchema];

    /// Methods this trait declares.
    fn method_schema(&self) -> &[MethodKey];

    /// Read a property's current value.
    async fn get(&self, prop_id: &PropId) -> Result<Value, CoreError>;

    /// Write a property's value. Modifiers that are trait-agnostic
    /// (duration, transition-target) are handled by `Thing` before this is
    /// called; `increment`/`toggle`/`insert`/`remove` are passed through so
    /// traits with non-numeric semantics can interpret them.
    async fn set(&self, prop_id: &PropId, value: Value, modifier: &Modifier) -> Result<(), CoreError>;

    /// Invoke a method with an argument map.
    async fn invoke(
        &self,
        method_id: &MethodId,
        args: BTreeMap<String, Value>,
    ) -> Result<Value, CoreError>;
}

struct PropertyState {
    flags: PropertyFlags,
    value_type: ValueType,
    broadcast: ChangeBroadcast,
}

/// A thing: a set of registered traits, exposed properties and methods, an
/// optional set of hosted children, and a listener fan-out per property.
pub struct Thing {
    id: ThingId,
    traits: RwLock<HashMap<TraitId, Arc<dyn TraitImpl>>>,
    properties: RwLock<HashMap<PropertyKey, PropertyState>>,
    children: RwLock<HashMap<(TraitId, ThingId), Arc<Thing>>>,
    native_uri: RwLock<Option<String>>,
    next_listener: AtomicU64,
    listeners: RwLock<HashMap<ListenerId, PropertyKey>>,
    transitions: RwLock<HashMap<PropertyKey, TransitionHandle>>,
}

impl Thing {
    /// Create a new, unhosted thing with no registered traits.
    pub fn new(id: ThingId) -> Self {
        Thing {
            id,
            traits: RwLock::new(HashMap::new()),
            properties: RwLock::new(HashMap::new()),
            children: RwLock::new(HashMap::new()),
            native_uri: RwLock::new(None),
            next_listener: AtomicU64::new(1),
            listeners: RwLock::new(HashMap::new()),
            transitions: RwLock::new(HashMap::new()),
        }
    }

    /// This thing's id.
    pub fn id(&self) -> &ThingId {
        &self.id
    }

    /// Register a trait implementation, indexing its declared properties.
    pub async fn register_trait(&self, trait_impl: Arc<dyn TraitImpl>) {
        let trait_id = trait_impl.trait_id();
        {
            let mut properties = self.properties.write().await;
            for schema in trait_impl.property_schema() {
                properties.entry(schema.key.clone()).or_insert_with(|| PropertyState {
                    flags: schema.flags,
                    value_type: schema.key.value_type,
                    broadcast: ChangeBroadcast::new(Value::Null),
                });
            }
        }
        self.traits.write().await.insert(trait_id, trait_impl);
    }

    /// All property keys this thing advertises.
    pub async fn property_keys(&self) -> Vec<PropertyKey> {
        self.properties.read().await.keys().cloned().collect()
    }

    /// Mark this thing as locally hosted at a path-only native URI, or
    /// as remote at a scheme+authority URI. `None` means unhosted.
    pub async fn host(&self, native_uri: impl Into<String>) {
        *self.native_uri.write().await = Some(native_uri.into());
    }

    /// Remove hosting. Per the spec, deletion/unhosting unhooks listeners;
    /// callers are expected to have already unregistered their primitives'
    /// listeners before calling this.
    pub async fn unhost(&self) {
        *self.native_uri.write().await = None;
        self.listeners.write().await.clear();
    }

    /// This thing's native URI, if hosted.
    pub async fn native_uri(&self) -> Option<String> {
        self.native_uri.read().await.clone()
    }

    async fn trait_for(&self, key: &PropertyKey) -> Result<Arc<dyn TraitImpl>, CoreError> {
        self.traits
            .read()
            .await
            .get(&key.trait_id)
            .cloned()
            .ok_or_else(|| CoreError::PropertyNotFound(key.canonical()))
    }

    /// Fetch a property's value, honoring `transition-target` (not
    /// currently interpolating — `splot-automation`'s transition engine
    /// writes interim values through [`Thing::set`], so a plain fetch
    /// already reflects the live value regardless of the modifier).
    pub async fn get(&self, key: &PropertyKey, _modifier: &Modifier) -> Result<Value, CoreError> {
        let flags = {
            let properties = self.properties.read().await;
            let state = properties
                .get(key)
                .ok_or_else(|| CoreError::PropertyNotFound(key.canonical()))?;
            state.flags
        };
        if !flags.get {
            return Err(CoreError::PropertyNotFound(format!(
                "{} is not gettable",
                key.canonical()
            )));
        }
        let trait_impl = self.trait_for(key).await?;
        trait_impl.get(&key.prop_id).await
    }

    /// Write a property's value. State-section properties engage the
    /// transition engine when a nonzero `duration` modifier is present and
    /// the property does not carry `no-transition`; `duration=0` (or any
    /// write without a transition-eligible shape) cancels any in-flight
    /// transition and jumps straight to the target, per the spec's
    /// invariant.
    pub async fn set(
        self: &Arc<Self>,
        key: &PropertyKey,
        value: Option<Value>,
        modifier: &Modifier,
    ) -> Result<(), CoreError> {
        // Any write to a property interrupts its in-flight transition,
        // whether or not this write itself starts a new one.
        self.transitions.write().await.remove(key);

        let eligible = value.is_some()
            && key.section == Section::State
            && !modifier.increment
            && !modifier.decrement
            && !modifier.toggle
            && !modifier.insert
            && !modifier.remove;

        let flags = {
            let properties = self.properties.read().await;
            properties.get(key).map(|s| s.flags)
        };
        let no_transition = flags.map(|f| f.no_transition).unwrap_or(true);

        if let (true, false, Some(duration)) = (eligible, no_transition, modifier.duration) {
            if duration > 0.0 {
                let current = self.get(key, &Modifier::default()).await?;
                let start = current.as_f64()?;
                let target = value.as_ref().unwrap().as_f64()?;
                let thing = self.clone();
                let key = key.clone();
                let handle = spawn_linear(start, target, Duration::from_secs_f64(duration), move |v| {
                    let thing = thing.clone();
                    let key = key.clone();
                    async move {
                        let _ = thing
                            .set_immediate(&key, Some(Value::Float(v)), &Modifier::default())
                            .await;
                    }
                });
                self.transitions.write().await.insert(key.clone(), handle);
                return Ok(());
            }
        }
        self.set_immediate(key, value, modifier).await
    }

    /// Write a property's value immediately, applying modifier semantics
    /// and broadcasting the change to listeners. Used directly for
    /// non-transitioning writes, and by the transition engine to apply
    /// each interpolation step.
    async fn set_immediate(
        &self,
        key: &PropertyKey,
        value: Option<Value>,
        modifier: &Modifier,
    ) -> Result<(), CoreError> {
        let (flags, value_type) = {
            let properties = self.properties.read().await;
            let state = properties
                .get(key)
                .ok_or_else(|| CoreError::PropertyNotFound(key.canonical()))?;
            (state.flags, state.value_type)
        };
        if !flags.set {
            return Err(CoreError::InvalidPropertyValue {
                key: key.canonical(),
                message: "property is not settable".into(),
            });
        }
        if modifier.increment && flags.no_increment {
            return Err(CoreError::InvalidPropertyValue {
                key: key.canonical(),
                message: "property does not accept increment".into(),
            });
        }

        let resolved = match value {
            None if flags.reset => Value::Null,
            None => {
                return Err(CoreError::InvalidPropertyValue {
                    key: key.canonical(),
                    message: "property does not accept reset".into(),
                })
            }
            Some(v) => {
                if modifier.increment || modifier.decrement {
                    let current = self.get(key, &Modifier::default()).await?;
                    let delta = v.as_f64()?;
                    let base = current.as_f64()?;
                    let signed = if modifier.decrement { -delta } else { delta };
                    Value::Float(base + signed).coerce(value_type)?
                } else if modifier.toggle {
                    let current = self.get(key, &Modifier::default()).await?;
                    Value::Bool(!current.as_bool()?)
                } else if modifier.insert {
                    let current = self.get(key, &Modifier::default()).await?;
                    match current {
                        Value::Array(mut arr) => {
                            arr.push(v);
                            Value::Array(arr)
                        }
                        other => {
                            return Err(CoreError::InvalidPropertyValue {
                                key: key.canonical(),
                                message: format!("insert requires an array property, found {other:?}"),
                            })
                        }
                    }
                } else if modifier.remove {
                    let current = self.get(key, &Modifier::default()).await?;
                    match current {
                        Value::Array(mut arr) => {
                            if let Some(pos) = arr.iter().position(|x| x == &v) {
                                arr.remove(pos);
                            }
                            Value::Array(arr)
                        }
                        other => {
                            return Err(CoreError::InvalidPropertyValue {
                                key: key.canonical(),
                                message: format!("remove requires an array property, found {other:?}"),
                            })
                        }
                    }
                } else {
                    v.coerce(value_type)?
                }
            }
        };

        let trait_impl = self.trait_for(key).await?;
        trait_impl.set(&key.prop_id, resolved.clone(), modifier).await?;

        if flags.change_notify {
            let properties = self.properties.read().await;
            if let Some(state) = properties.get(key) {
                state.broadcast.publish(resolved);
            }
        }
        Ok(())
    }

    /// Register a change listener on a single property.
    pub async fn register_listener(
        &self,
        key: &PropertyKey,
    ) -> Result<(ListenerId, WatchStream<Value>), CoreError> {
        let properties = self.properties.read().await;
        let state = properties
            .get(key)
            .ok_or_else(|| CoreError::PropertyNotFound(key.canonical()))?;
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let stream = state.broadcast.subscribe();
        drop(properties);
        self.listeners.write().await.insert(id, key.clone());
        Ok((id, stream))
    }

    /// Unregister a previously-registered property listener.
    pub async fn unregister_listener(&self, id: ListenerId) {
        self.listeners.write().await.remove(&id);
    }

    /// Snapshot one section as a nested map `trait -> prop -> value`,
    /// including only gettable properties.
    pub async fn section_snapshot(&self, section: Section) -> Result<Value, CoreError> {
        let keys: Vec<PropertyKey> = {
            let properties = self.properties.read().await;
            properties
                .iter()
                .filter(|(k, state)| k.section == section && state.flags.get)
                .map(|(k, _)| k.clone())
                .collect()
        };
        let mut out: BTreeMap<String, Value> = BTreeMap::new();
        for key in keys {
            let value = self.get(&key, &Modifier::default()).await?;
            let trait_map = out
                .entry(key.trait_id.as_str().to_owned())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if let Value::Map(m) = trait_map {
                m.insert(key.prop_id.as_str().to_owned(), value);
            }
        }
        Ok(Value::Map(out))
    }

    /// Apply a nested map `trait -> prop -> value` to a section atomically:
    /// every write is validated (property exists, settable, type-coercible)
    /// before any write actually takes effect.
    pub async fn apply_section(&self, section: Section, map: &Value) -> Result<(), CoreError> {
        let Value::Map(traits) = map else {
            return Err(CoreError::InvalidValue(
                "section map must be an object".into(),
            ));
        };
        let mut planned: Vec<(PropertyKey, Value)> = Vec::new();
        for (trait_id, props) in traits {
            let Value::Map(props) = props else {
                return Err(CoreError::InvalidValue(format!(
                    "trait {trait_id} value must be an object"
                )));
            };
            for (prop_id, value) in props {
                let key = PropertyKey::parse(
                    &format!("{}/{}/{}", section.short_code(), trait_id, prop_id),
                    value.value_type(),
                )?;
                let properties = self.properties.read().await;
                let state = properties
                    .get(&key)
                    .ok_or_else(|| CoreError::PropertyNotFound(key.canonical()))?;
                if !state.flags.set {
                    return Err(CoreError::InvalidPropertyValue {
                        key: key.canonical(),
                        message: "property is not settable".into(),
                    });
                }
                let coerced = value.coerce(state.value_type)?;
                drop(properties);
                planned.push((key, coerced));
            }
        }
        for (key, value) in planned {
            self.set_immediate(&key, Some(value), &Modifier::default()).await?;
        }
        Ok(())
    }

    /// Register a child thing under `(trait_id, child_id)`.
    pub async fn register_child(&self, trait_id: TraitId, child_id: ThingId, child: Arc<Thing>) {
        self.children.write().await.insert((trait_id, child_id), child);
    }

    /// Remove a registered child.
    pub async fn remove_child(&self, trait_id: &TraitId, child_id: &ThingId) -> Option<Arc<Thing>> {
        self.children
            .write()
            .await
            .remove(&(trait_id.clone(), child_id.clone()))
    }

    /// Look up a registered child.
    pub async fn child(&self, trait_id: &TraitId, child_id: &ThingId) -> Option<Arc<Thing>> {
        self.children
            .read()
            .await
            .get(&(trait_id.clone(), child_id.clone()))
            .cloned()
    }
}
