//! Bidirectional value mirror between two resource links.

use crate::error::AutomationError;
use splot_core::{Env, Modifier, ResourceLink, Value};
use splot_sae::{compile, run as run_sae, Context, Opcode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// A pairing's configuration: two resource links mirrored through
/// optional forward/reverse transforms.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Source resource-link URI.
    pub source_uri: String,
    /// Destination resource-link URI.
    pub destination_uri: String,
    /// Propagate source changes to the destination.
    pub push: bool,
    /// Propagate destination changes to the source.
    pub pull: bool,
    /// SAE source applied to source→destination propagation, identity if
    /// empty.
    pub forward_xform: String,
    /// SAE source applied to destination→source propagation, identity if
    /// empty.
    pub reverse_xform: String,
    /// Whether the pairing is active.
    pub enabled: bool,
}

/// A running pairing: installed listeners mirroring one resource link's
/// value onto another.
pub struct Pairing {
    config: Mutex<PairingConfig>,
    env: Env,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    suppress_push_echo: Arc<AtomicBool>,
    suppress_pull_echo: Arc<AtomicBool>,
}

impl Pairing {
    /// Build a disabled pairing from its configuration.
    pub fn new(config: PairingConfig, env: Env) -> Self {
        Pairing {
            config: Mutex::new(config),
            env,
            tasks: Mutex::new(Vec::new()),
            suppress_push_echo: Arc::new(AtomicBool::new(false)),
            suppress_pull_echo: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> PairingConfig {
        self.config.lock().expect("pairing config lock poisoned").clone()
    }

    /// Resolve both links and install listeners per `push`/`pull`.
    pub async fn enable(self: &Arc<Self>) -> Result<(), AutomationError> {
        let (source_uri, destination_uri, push, pull, forward_src, reverse_src) = {
            let cfg = self.config.lock().expect("pairing config lock poisoned");
            (
                cfg.source_uri.clone(),
                cfg.destination_uri.clone(),
                cfg.push,
                cfg.pull,
                cfg.forward_xform.clone(),
                cfg.reverse_xform.clone(),
            )
        };

        let source_link = self.env.resource_links.resolve(&source_uri).await?;
        let dest_link = self.env.resource_links.resolve(&destination_uri).await?;
        let forward_program = compile_or_empty(&forward_src)?;
        let reverse_program = compile_or_empty(&reverse_src)?;

        let mut tasks = self.tasks.lock().expect("pairing tasks lock poisoned");

        if push {
            tasks.push(spawn_direction(
                Arc::clone(&source_link),
                Arc::clone(&dest_link),
                forward_program,
                Arc::clone(&self.suppress_push_echo),
                Arc::clone(&self.suppress_pull_echo),
                self.env.clone(),
            )?);
        }
        if pull {
            tasks.push(spawn_direction(
                Arc::clone(&dest_link),
                Arc::clone(&source_link),
                reverse_program,
                Arc::clone(&self.suppress_pull_echo),
                Arc::clone(&self.suppress_push_echo),
                self.env.clone(),
            )?);
        }

        self.config.lock().expect("pairing config lock poisoned").enabled = true;
        Ok(())
    }

    /// Cancel all installed listeners.
    pub fn disable(&self) {
        let mut tasks = self.tasks.lock().expect("pairing tasks lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
        self.config.lock().expect("pairing config lock poisoned").enabled = false;
    }
}

fn compile_or_empty(source: &str) -> Result<Vec<Opcode>, AutomationError> {
    if source.trim().is_empty() {
        Ok(Vec::new())
    } else {
        Ok(compile(source)?)
    }
}

/// Spawn a task that mirrors `from`'s changes onto `to` through
/// `program` (identity if empty), suppressing the echo that the opposite
/// direction would otherwise see.
fn spawn_direction(
    from: Arc<dyn ResourceLink>,
    to: Arc<dyn ResourceLink>,
    program: Vec<Opcode>,
    suppress_this_echo: Arc<AtomicBool>,
    suppress_other_echo: Arc<AtomicBool>,
    env: Env,
) -> Result<JoinHandle<()>, AutomationError> {
    Ok(tokio::spawn(async move {
        let (_listener_id, mut stream) = match from.register_listener().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "pairing failed to register listener");
                return;
            }
        };

        let mut prev: Option<Value> = None;
        let mut first = true;

        while let Some(new_value) = stream.next().await {
            if first {
                prev = Some(new_value);
                first = false;
                continue;
            }

            if suppress_this_echo.swap(false, Ordering::AcqRel) {
                debug!("pairing suppressed echo");
                prev = Some(new_value);
                continue;
            }

            let v_l = prev.clone().unwrap_or(Value::Null);
            prev = Some(new_value.clone());

            let result = if program.is_empty() {
                Ok(new_value.clone())
            } else {
                let ctx = Context::new(new_value.clone(), v_l.clone(), 0.0, env.clock.now_rtc());
                run_sae(&program, new_value.clone(), &ctx).map_err(AutomationError::from)
            };

            match result {
                Ok(v) if v.is_stop() => {}
                Ok(v) => {
                    suppress_other_echo.store(true, Ordering::Release);
                    if let Err(e) = to.invoke(Some(v), &Modifier::default()).await {
                        warn!(error = %e, "pairing write failed");
                        suppress_other_echo.store(false, Ordering::Release);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "pairing transform failed, dropping propagation");
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use splot_core::test_utils::InMemoryResourceLinkManager;
    use splot_core::{PropertyFlags, PropertySchema, PropertyKey, Section, Thing, TraitImpl, ValueType};
    use splot_core::{CoreError, MethodId, PropId, TraitId};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct EchoTrait {
        schema: Vec<PropertySchema>,
        value: tokio::sync::RwLock<Value>,
        writes: std::sync::atomic::AtomicU64,
    }

    impl EchoTrait {
        fn new(prop: &str) -> Self {
            EchoTrait {
                schema: vec![PropertySchema {
                    key: PropertyKey::new(
                        Section::State,
                        TraitId::new("echo"),
                        PropId::new(prop),
                        ValueType::Float64,
                    ),
                    flags: PropertyFlags::read_write(),
                }],
                value: tokio::sync::RwLock::new(Value::Float(0.0)),
                writes: std::sync::atomic::AtomicU64::new(0),
            }
        }

        fn write_count(&self) -> u64 {
            self.writes.load(std::sync::atomic::Ordering::Acquire)
        }
    }

    #[async_trait]
    impl TraitImpl for EchoTrait {
        fn trait_id(&self) -> TraitId {
            TraitId::new("echo")
        }
        fn property_schema(&self) -> &[PropertySchema] {
            &self.schema
        }
        fn method_schema(&self) -> &[splot_core::MethodKey] {
            &[]
        }
        async fn get(&self, _prop_id: &PropId) -> Result<Value, CoreError> {
            Ok(self.value.read().await.clone())
        }
        async fn set(&self, _prop_id: &PropId, value: Value, _modifier: &Modifier) -> Result<(), CoreError> {
            self.writes.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
            *self.value.write().await = value;
            Ok(())
        }
        async fn invoke(
            &self,
            _method_id: &MethodId,
            _args: BTreeMap<String, Value>,
        ) -> Result<Value, CoreError> {
            Err(CoreError::MethodNotFound("none".into()))
        }
    }

    async fn env_with_things() -> (Env, Arc<Thing>, Arc<Thing>) {
        let src = Arc::new(Thing::new(splot_core::ThingId::new("src")));
        src.register_trait(Arc::new(EchoTrait::new("v"))).await;
        let dst = Arc::new(Thing::new(splot_core::ThingId::new("dst")));
        dst.register_trait(Arc::new(EchoTrait::new("v"))).await;

        let manager = InMemoryResourceLinkManager::new();
        manager.register(Arc::clone(&src)).await;
        manager.register(Arc::clone(&dst)).await;

        let env = Env::new(
            Arc::new(manager),
            Arc::new(splot_core::test_utils::InMemoryRestClient::new()),
            Arc::new(splot_core::SystemClock),
        );
        (env, src, dst)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_mirrors_source_onto_destination() {
        let (env, src, dst) = env_with_things().await;
        let config = PairingConfig {
            source_uri: "/src/s/echo/v".to_owned(),
            destination_uri: "/dst/s/echo/v".to_owned(),
            push: true,
            pull: false,
            forward_xform: String::new(),
            reverse_xform: String::new(),
            enabled: false,
        };
        let pairing = Arc::new(Pairing::new(config, env));
        pairing.enable().await.unwrap();

        let key = PropertyKey::new(Section::State, TraitId::new("echo"), PropId::new("v"), ValueType::Float64);
        src.set(&key, Some(Value::Float(42.0)), &Modifier::default())
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let got = dst.get(&key, &Modifier::default()).await.unwrap();
        assert_eq!(got.as_f64().unwrap(), 42.0);
        pairing.disable();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bidirectional_pairing_suppresses_echo_back_to_source() {
        let src = Arc::new(Thing::new(splot_core::ThingId::new("src2")));
        let src_echo = Arc::new(EchoTrait::new("v"));
        src.register_trait(Arc::clone(&src_echo) as Arc<dyn TraitImpl>).await;

        let dst = Arc::new(Thing::new(splot_core::ThingId::new("dst2")));
        let dst_echo = Arc::new(EchoTrait::new("v"));
        dst.register_trait(Arc::clone(&dst_echo) as Arc<dyn TraitImpl>).await;

        let manager = InMemoryResourceLinkManager::new();
        manager.register(Arc::clone(&src)).await;
        manager.register(Arc::clone(&dst)).await;

        let env = Env::new(
            Arc::new(manager),
            Arc::new(splot_core::test_utils::InMemoryRestClient::new()),
            Arc::new(splot_core::SystemClock),
        );

        let config = PairingConfig {
            source_uri: "/src2/s/echo/v".to_owned(),
            destination_uri: "/dst2/s/echo/v".to_owned(),
            push: true,
            pull: true,
            forward_xform: String::new(),
            reverse_xform: String::new(),
            enabled: false,
        };
        let pairing = Arc::new(Pairing::new(config, env));
        pairing.enable().await.unwrap();

        let key = PropertyKey::new(Section::State, TraitId::new("echo"), PropId::new("v"), ValueType::Float64);
        src.set(&key, Some(Value::Float(7.0)), &Modifier::default())
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        // One write lands on the destination (the propagated change); the
        // pull direction must not bounce it back onto the source.
        assert_eq!(dst_echo.write_count(), 1);
        assert_eq!(src_echo.write_count(), 1);
        pairing.disable();
    }
}
