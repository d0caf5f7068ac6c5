//! The ResourceLink protocol — observable, writable handles on local or
//! remote values, and the clients/managers that produce them.

use crate::error::CoreError;
use crate::modifier::Modifier;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A listener handle returned by [`ResourceLink::register_listener`].
/// Dropping it does not unregister; callers must call
/// [`ResourceLink::unregister_listener`] explicitly, mirroring the
/// register/unregister pairing the spec calls for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ListenerId(pub u64);

/// An observable, writable handle on a value addressed by URI.
///
/// Implementations: a property link (wraps one [`crate::PropertyKey`] on a
/// `Thing`), a section link (wraps a whole section, collapsing/
/// uncollapsing `<section>/<trait>/<prop>` keys), and a native-URI link
/// (round-trips through a [`RestClient`]).
///
/// Mechanism-agnostic by design: a caller holding a `dyn ResourceLink`
/// cannot tell whether the value lives in this process or across the
/// network.
#[async_trait]
pub trait ResourceLink: Send + Sync {
    /// Fetch the current value, honoring the supplied modifiers (e.g.
    /// `transition-target`, `all`).
    async fn fetch(&self, modifier: &Modifier) -> Result<Value, CoreError>;

    /// Write a new value, honoring the supplied modifiers (e.g. `duration`,
    /// `increment`). `value` is `None` for a reset write.
    async fn invoke(&self, value: Option<Value>, modifier: &Modifier) -> Result<(), CoreError>;

    /// Subscribe to change notifications. Returns a listener id to pass to
    /// [`ResourceLink::unregister_listener`] and a stream of values.
    async fn register_listener(&self) -> Result<(ListenerId, WatchStream<Value>), CoreError>;

    /// Unregister a previously-registered listener.
    async fn unregister_listener(&self, id: ListenerId);
}

/// Performs REST-style methods against URIs. The collaborator that actually
/// speaks CoAP or HTTP; this crate only calls through the trait.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Perform a GET-equivalent fetch.
    async fn get(&self, uri: &str, modifier: &Modifier) -> Result<Value, CoreError>;

    /// Perform a POST/PUT-equivalent write.
    async fn post(
        &self,
        uri: &str,
        body: Option<Value>,
        modifier: &Modifier,
    ) -> Result<(), CoreError>;
}

/// Resolves a URI to a [`ResourceLink`]. The entry point a technology
/// provides to the automation engine; primitives never parse URIs or dial
/// transports themselves.
#[async_trait]
pub trait ResourceLinkManager: Send + Sync {
    /// Resolve `uri` (thing-relative or absolute) to a resource link.
    async fn resolve(&self, uri: &str) -> Result<Arc<dyn ResourceLink>, CoreError>;
}

/// Shared plumbing for broadcasting value changes to listeners over
/// `tokio::sync::watch`, reused by every concrete `ResourceLink`
/// implementation in this crate.
pub(crate) struct ChangeBroadcast {
    tx: watch::Sender<Value>,
}

impl ChangeBroadcast {
    pub(crate) fn new(initial: Value) -> Self {
        let (tx, _rx) = watch::channel(initial);
        ChangeBroadcast { tx }
    }

    pub(crate) fn publish(&self, value: Value) {
        // A closed channel just means nobody is listening right now.
        let _ = self.tx.send(value);
    }

    pub(crate) fn subscribe(&self) -> WatchStream<Value> {
        WatchStream::new(self.tx.subscribe())
    }

    pub(crate) fn current(&self) -> Value {
        self.tx.borrow().clone()
    }
}

/// A [`ChangeBroadcast`] paired with a listener-id counter, for
/// `ResourceLink` implementations (like [`crate::links::NativeUriResourceLink`])
/// that have no underlying per-property listener registry to delegate to.
pub(crate) struct ChangeBroadcastHandle {
    broadcast: ChangeBroadcast,
    next_id: AtomicU64,
}

impl ChangeBroadcastHandle {
    pub(crate) fn new(initial: Value) -> Self {
        ChangeBroadcastHandle {
            broadcast: ChangeBroadcast::new(initial),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, value: Value) {
        self.broadcast.publish(value);
    }

    pub(crate) fn subscribe(&self) -> WatchStream<Value> {
        self.broadcast.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn change_broadcast_delivers_published_values() {
        let bc = ChangeBroadcast::new(Value::Int(0));
        let mut stream = bc.subscribe();
        use tokio_stream::StreamExt;
        // watch streams replay the current value first.
        assert!(matches!(stream.next().await, Some(Value::Int(0))));
        bc.publish(Value::Int(1));
        assert!(matches!(stream.next().await, Some(Value::Int(1))));
    }
}
