//! Action dispatcher: walks an ordered action list honoring each entry's
//! `sync` mode, and the invocation-coalescing gate shared by the
//! primitives that trigger dispatch.

use crate::error::AutomationError;
use splot_core::{CoreError, Env, Modifier, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// How the dispatcher waits on one action before starting the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Fire-and-forget; the dispatcher continues immediately.
    Async,
    /// Await completion, then continue regardless of outcome.
    Wait,
    /// Await completion; abort the remaining list on error.
    StopOnError,
}

impl SyncMode {
    /// Decode the wire encoding (`0`/`1`/`2`).
    pub fn from_code(code: i64) -> Result<Self, AutomationError> {
        match code {
            0 => Ok(SyncMode::Async),
            1 => Ok(SyncMode::Wait),
            2 => Ok(SyncMode::StopOnError),
            other => Err(CoreError::InvalidValue(format!("unknown sync mode {other}")).into()),
        }
    }

    /// Encode back to the wire representation.
    pub fn to_code(self) -> i64 {
        match self {
            SyncMode::Async => 0,
            SyncMode::Wait => 1,
            SyncMode::StopOnError => 2,
        }
    }
}

/// The REST-ish method an action performs against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMethod {
    /// Read the target's current value.
    Get,
    /// Write to the target (the default).
    Post,
}

/// One step of an action list: `{p, m, b, s, sync, desc}` from the wire
/// format.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    /// Target URI or thing-relative path.
    pub path: String,
    /// Method, defaulting to `Post`.
    pub method: ActionMethod,
    /// Request body, if any.
    pub body: Option<Value>,
    /// If true, this entry is skipped entirely.
    pub skip: bool,
    /// Synchronization mode relative to the next entry.
    pub sync: SyncMode,
    /// Human-readable description, for diagnostics only.
    pub desc: Option<String>,
}

impl ActionSpec {
    /// An action posting `body` to `path`, synchronous and not skipped.
    pub fn new(path: impl Into<String>) -> Self {
        ActionSpec {
            path: path.into(),
            method: ActionMethod::Post,
            body: None,
            skip: false,
            sync: SyncMode::Async,
            desc: None,
        }
    }
}

/// Walks an action list in declared order, awaiting or firing-and-forgetting
/// per entry's `sync` mode.
pub struct ActionDispatcher {
    env: Env,
}

impl ActionDispatcher {
    /// Build a dispatcher against the given environment's resource-link
    /// resolver.
    pub fn new(env: Env) -> Self {
        ActionDispatcher { env }
    }

    /// Dispatch `actions` in order. Returns the first `stop-on-error`
    /// failure, if any; `wait` failures are logged and do not halt the
    /// list.
    pub async fn dispatch(&self, actions: &[ActionSpec]) -> Result<(), AutomationError> {
        for action in actions {
            if action.skip {
                continue;
            }
            match action.sync {
                SyncMode::Async => {
                    let env = self.env.clone();
                    let action = action.clone();
                    tokio::spawn(async move {
                        if let Err(e) = run_one(&env, &action).await {
                            warn!(path = %action.path, error = %e, "async action failed");
                        }
                    });
                }
                SyncMode::Wait => {
                    if let Err(e) = run_one(&self.env, action).await {
                        warn!(path = %action.path, error = %e, "waited action failed, continuing");
                    }
                }
                SyncMode::StopOnError => {
                    run_one(&self.env, action).await?;
                }
            }
        }
        Ok(())
    }
}

async fn run_one(env: &Env, action: &ActionSpec) -> Result<(), AutomationError> {
    let link = env.resource_links.resolve(&action.path).await?;
    let modifier = Modifier::default();
    match action.method {
        ActionMethod::Get => {
            link.fetch(&modifier).await?;
        }
        ActionMethod::Post => {
            link.invoke(action.body.clone(), &modifier).await?;
        }
    }
    Ok(())
}

/// Tracks a primitive's invocation count and last-fired time, updated at
/// the moment dispatch begins (not completion).
pub struct InvocationStats {
    count: AtomicU64,
    last_fired_ms: AtomicI64,
}

impl InvocationStats {
    /// A fresh counter: zero invocations, never fired.
    pub fn new() -> Self {
        InvocationStats {
            count: AtomicU64::new(0),
            last_fired_ms: AtomicI64::new(-1),
        }
    }

    /// Record one invocation starting now; returns the new count.
    pub fn record_fire(&self) -> u64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        self.last_fired_ms.store(now_ms, Ordering::Release);
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current invocation count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Reset the counter to zero, leaving `last_fired` untouched.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Milliseconds since the epoch of the last fire, if any.
    pub fn last_fired_millis(&self) -> Option<i64> {
        match self.last_fired_ms.load(Ordering::Acquire) {
            -1 => None,
            ms => Some(ms),
        }
    }
}

impl Default for InvocationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Coalesces overlapping triggers of the same primitive: while one run is
/// in flight, a second trigger merges into at most one pending re-run.
pub struct DispatchGate {
    running: AtomicBool,
    pending: AtomicBool,
}

impl DispatchGate {
    /// A gate with nothing running and nothing pending.
    pub fn new() -> Self {
        DispatchGate {
            running: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    /// Trigger a run of `body`. If a run is already in flight, this marks
    /// one pending re-run and returns without spawning a second task.
    pub fn trigger<F, Fut>(self: &Arc<Self>, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.pending.store(true, Ordering::Release);
            return;
        }

        let gate = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                body().await;
                if gate.pending.swap(false, Ordering::AcqRel) {
                    continue;
                }
                gate.running.store(false, Ordering::Release);
                break;
            }
        });
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_stats_track_count_and_fire_time() {
        let stats = InvocationStats::new();
        assert_eq!(stats.count(), 0);
        assert!(stats.last_fired_millis().is_none());
        assert_eq!(stats.record_fire(), 1);
        assert_eq!(stats.record_fire(), 2);
        assert_eq!(stats.count(), 2);
        assert!(stats.last_fired_millis().is_some());
        stats.reset();
        assert_eq!(stats.count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_triggers_coalesce_to_one_pending_rerun() {
        let gate = Arc::new(DispatchGate::new());
        let runs = Arc::new(AtomicU64::new(0));

        let r = Arc::clone(&runs);
        gate.trigger(move || {
            let r = Arc::clone(&r);
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                r.fetch_add(1, Ordering::AcqRel);
            }
        });
        // Trigger again immediately, while the first run is still sleeping.
        let r2 = Arc::clone(&runs);
        gate.trigger(move || {
            let r2 = Arc::clone(&r2);
            async move {
                r2.fetch_add(1, Ordering::AcqRel);
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert_eq!(runs.load(Ordering::Acquire), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatch_waits_async_continues_and_stops_on_error() {
        use async_trait::async_trait;
        use splot_core::test_utils::{InMemoryRestClient, InMemoryResourceLinkManager};
        use splot_core::{
            CoreError, MethodId, PropId, PropertyFlags, PropertyKey, PropertySchema, Section,
            Thing, ThingId, TraitId, TraitImpl, ValueType,
        };
        use std::collections::BTreeMap;
        use tokio::sync::Mutex as AsyncMutex;

        struct RecordingTrait {
            schema: Vec<PropertySchema>,
            log: Arc<AsyncMutex<Vec<String>>>,
        }

        impl RecordingTrait {
            fn new(log: Arc<AsyncMutex<Vec<String>>>) -> Self {
                let schema = ["a", "b", "c", "d"]
                    .iter()
                    .map(|p| PropertySchema {
                        key: PropertyKey::new(Section::State, TraitId::new("act"), PropId::new(*p), ValueType::Bool),
                        flags: PropertyFlags::read_write(),
                    })
                    .collect();
                RecordingTrait { schema, log }
            }
        }

        #[async_trait]
        impl TraitImpl for RecordingTrait {
            fn trait_id(&self) -> TraitId {
                TraitId::new("act")
            }
            fn property_schema(&self) -> &[PropertySchema] {
                &self.schema
            }
            fn method_schema(&self) -> &[splot_core::MethodKey] {
                &[]
            }
            async fn get(&self, _prop_id: &PropId) -> Result<Value, CoreError> {
                Ok(Value::Bool(true))
            }
            async fn set(&self, prop_id: &PropId, _value: Value, _modifier: &Modifier) -> Result<(), CoreError> {
                if prop_id.as_str() == "c" {
                    return Err(CoreError::InvalidValue("c always fails".to_owned()));
                }
                if prop_id.as_str() == "a" {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                }
                self.log.lock().await.push(prop_id.as_str().to_owned());
                Ok(())
            }
            async fn invoke(
                &self,
                method_id: &MethodId,
                _args: BTreeMap<String, Value>,
            ) -> Result<Value, CoreError> {
                Err(CoreError::MethodNotFound(method_id.to_string()))
            }
        }

        let log = Arc::new(AsyncMutex::new(Vec::new()));
        let thing = Arc::new(Thing::new(ThingId::new("t")));
        thing
            .register_trait(Arc::new(RecordingTrait::new(Arc::clone(&log))))
            .await;
        let manager = InMemoryResourceLinkManager::new();
        manager.register(Arc::clone(&thing)).await;
        let env = Env::new(
            Arc::new(manager),
            Arc::new(InMemoryRestClient::new()),
            Arc::new(splot_core::SystemClock),
        );

        let mk = |p: &str, sync: SyncMode| ActionSpec {
            path: format!("/t/s/act/{p}"),
            method: ActionMethod::Post,
            body: Some(Value::Bool(true)),
            skip: false,
            sync,
            desc: None,
        };
        let actions = vec![
            mk("a", SyncMode::Wait),
            mk("b", SyncMode::Async),
            mk("c", SyncMode::StopOnError),
            mk("d", SyncMode::Wait),
        ];

        let dispatcher = ActionDispatcher::new(env);
        let result = dispatcher.dispatch(&actions).await;
        assert!(result.is_err());

        // "a" was awaited before dispatch moved past it; "d" sits after the
        // stop-on-error failure and must never run.
        let calls = log.lock().await.clone();
        assert!(calls.contains(&"a".to_owned()));
        assert!(!calls.contains(&"d".to_owned()));
    }
}
