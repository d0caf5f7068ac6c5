//! Condition-triggered rules: `ALL`/`ANY` matching over monitored
//! resources, dispatching an action list on match.

use crate::action::{ActionDispatcher, ActionSpec, DispatchGate, InvocationStats};
use crate::error::AutomationError;
use splot_core::{Env, Modifier, ResourceLink, Value};
use splot_sae::{compile, run as run_sae, Context, Opcode};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::warn;

/// How a rule's conditions combine into one pass/fail verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every condition must hold.
    All,
    /// At least one condition must hold.
    Any,
}

/// A single monitored resource plus the SAE predicate applied to it.
#[derive(Debug, Clone)]
pub struct ConditionSpec {
    /// Resource-link URI this condition observes.
    pub path: String,
    /// SAE predicate; `v`/`v_l` bind this condition's resource, result
    /// coerced to bool (false on any evaluation error).
    pub expr: String,
}

/// A rule's configuration.
pub struct RuleConfig {
    /// Monitored conditions.
    pub conditions: Vec<ConditionSpec>,
    /// How conditions combine.
    pub match_mode: MatchMode,
    /// Actions dispatched when the aggregate verdict is true.
    pub actions: Vec<ActionSpec>,
    /// Whether the rule is active.
    pub enabled: bool,
}

struct ConditionState {
    link: Arc<dyn ResourceLink>,
    program: Vec<Opcode>,
    curr: Mutex<Value>,
    last: Mutex<Value>,
}

/// A running rule: installed listeners feeding a coalesced evaluation
/// loop that dispatches actions on match.
pub struct Rule {
    match_mode: MatchMode,
    condition_specs: Vec<ConditionSpec>,
    actions: Mutex<Vec<ActionSpec>>,
    conditions: Vec<Arc<ConditionState>>,
    env: Env,
    gate: Arc<DispatchGate>,
    stats: InvocationStats,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    enabled: std::sync::atomic::AtomicBool,
}

impl Rule {
    /// Resolve every condition's resource link and compile its predicate.
    pub async fn build(config: RuleConfig, env: Env) -> Result<Arc<Self>, AutomationError> {
        let mut conditions = Vec::with_capacity(config.conditions.len());
        for c in &config.conditions {
            let link = env.resource_links.resolve(&c.path).await?;
            let program = compile(&c.expr)?;
            conditions.push(Arc::new(ConditionState {
                link,
                program,
                curr: Mutex::new(Value::Null),
                last: Mutex::new(Value::Null),
            }));
        }

        Ok(Arc::new(Rule {
            match_mode: config.match_mode,
            condition_specs: config.conditions,
            actions: Mutex::new(config.actions),
            conditions,
            env,
            gate: Arc::new(DispatchGate::new()),
            stats: InvocationStats::new(),
            tasks: Mutex::new(Vec::new()),
            enabled: std::sync::atomic::AtomicBool::new(false),
        }))
    }

    /// Rebuild this rule's persistent-state snapshot.
    pub fn snapshot(&self) -> crate::snapshot::RuleSnapshot {
        let actions = self.actions.lock().expect("rule actions lock poisoned").clone();
        crate::snapshot::RuleSnapshot::new(
            &self.condition_specs,
            self.match_mode,
            &actions,
            self.enabled.load(std::sync::atomic::Ordering::Acquire),
        )
    }

    /// Install one listener per condition. Any observed change schedules
    /// an evaluation, coalesced via the dispatch gate so at most one
    /// evaluation runs at a time per rule.
    pub fn enable(self: &Arc<Self>) {
        self.enabled.store(true, std::sync::atomic::Ordering::Release);
        let mut tasks = self.tasks.lock().expect("rule tasks lock poisoned");
        for condition in &self.conditions {
            let rule = Arc::clone(self);
            let condition = Arc::clone(condition);
            tasks.push(tokio::spawn(async move {
                let (_id, mut stream) = match condition.link.register_listener().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "rule failed to register condition listener");
                        return;
                    }
                };
                while let Some(new_value) = stream.next().await {
                    {
                        let mut last = condition.last.lock().expect("condition lock poisoned");
                        let mut curr = condition.curr.lock().expect("condition lock poisoned");
                        *last = curr.clone();
                        *curr = new_value;
                    }
                    let rule = Arc::clone(&rule);
                    rule.gate.trigger(move || {
                        let rule = Arc::clone(&rule);
                        async move { rule.evaluate().await }
                    });
                }
            }));
        }
    }

    /// Cancel all listeners.
    pub fn disable(&self) {
        self.enabled.store(false, std::sync::atomic::Ordering::Release);
        let mut tasks = self.tasks.lock().expect("rule tasks lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    /// Current invocation count.
    pub fn fire_count(&self) -> u64 {
        self.stats.count()
    }

    async fn evaluate(&self) {
        let rtc = self.env.clock.now_rtc();
        let mut aggregate = match self.match_mode {
            MatchMode::All => true,
            MatchMode::Any => false,
        };

        for condition in &self.conditions {
            let (curr, last) = {
                let curr = condition.curr.lock().expect("condition lock poisoned").clone();
                let last = condition.last.lock().expect("condition lock poisoned").clone();
                (curr, last)
            };
            let ctx = Context::new(curr.clone(), last.clone(), self.stats.count() as f64, rtc);
            let verdict = run_sae(&condition.program, curr, &ctx)
                .ok()
                .and_then(|v| v.as_bool().ok())
                .unwrap_or(false);

            match self.match_mode {
                MatchMode::All => {
                    aggregate &= verdict;
                    if !aggregate {
                        break;
                    }
                }
                MatchMode::Any => {
                    aggregate |= verdict;
                    if aggregate {
                        break;
                    }
                }
            }
        }

        if aggregate {
            self.stats.record_fire();
            let actions = self.actions.lock().expect("rule actions lock poisoned").clone();
            let dispatcher = ActionDispatcher::new(self.env.clone());
            if let Err(e) = dispatcher.dispatch(&actions).await {
                warn!(error = %e, "rule action dispatch stopped on error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splot_core::test_utils::{InMemoryRestClient, InMemoryResourceLinkManager};
    use splot_core::{
        CoreError, MethodId, PropId, PropertyFlags, PropertyKey, PropertySchema, Section, Thing,
        ThingId, TraitId, TraitImpl, ValueType,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct BoolTrait {
        schema: Vec<PropertySchema>,
        value: tokio::sync::RwLock<Value>,
    }

    impl BoolTrait {
        fn new() -> Self {
            BoolTrait {
                schema: vec![PropertySchema {
                    key: PropertyKey::new(
                        Section::State,
                        TraitId::new("onof"),
                        PropId::new("v"),
                        ValueType::Bool,
                    ),
                    flags: PropertyFlags::read_write(),
                }],
                value: tokio::sync::RwLock::new(Value::Bool(false)),
            }
        }
    }

    #[async_trait]
    impl TraitImpl for BoolTrait {
        fn trait_id(&self) -> TraitId {
            TraitId::new("onof")
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
            *self.value.write().await = value;
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

    #[tokio::test(flavor = "multi_thread")]
    async fn rising_edge_fires_exactly_once() {
        let thing = Arc::new(Thing::new(ThingId::new("3")));
        thing.register_trait(Arc::new(BoolTrait::new())).await;
        let manager = InMemoryResourceLinkManager::new();
        manager.register(Arc::clone(&thing)).await;
        let env = Env::new(
            Arc::new(manager),
            Arc::new(InMemoryRestClient::new()),
            Arc::new(splot_core::SystemClock),
        );

        let config = RuleConfig {
            conditions: vec![ConditionSpec {
                path: "/3/s/onof/v".to_owned(),
                expr: "v_l ! &&".to_owned(),
            }],
            match_mode: MatchMode::All,
            actions: vec![],
            enabled: false,
        };
        let rule = Rule::build(config, env).await.unwrap();
        rule.enable();

        let key = PropertyKey::new(Section::State, TraitId::new("onof"), PropId::new("v"), ValueType::Bool);
        thing.set(&key, Some(Value::Bool(true)), &Modifier::default()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(rule.fire_count(), 1);

        thing.set(&key, Some(Value::Bool(false)), &Modifier::default()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(rule.fire_count(), 1);

        rule.disable();
    }
}
