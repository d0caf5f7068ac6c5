//! Registry for Pairing/Rule/Timer primitives, reachable at
//! `/N/f/pmgr`, `/N/f/rmgr`, `/N/f/tmgr` per the URI space. Not a
//! persistent store itself — it only knows how to create, look up,
//! remove, and snapshot the primitives it holds.

use crate::error::AutomationError;
use crate::pairing::Pairing;
use crate::rule::Rule;
use crate::snapshot::{PairingSnapshot, RuleSnapshot, TimerSnapshot};
use crate::timer::Timer;
use splot_core::{Env, PrimitiveId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Generate a fresh primitive id, used by the `?create` URI convention
/// to mint a child pairing/rule/timer without the caller naming it.
pub fn generate_id() -> PrimitiveId {
    PrimitiveId::new(Uuid::new_v4().to_string())
}

/// Owns the live Pairing/Rule/Timer primitives for one thing, keyed by
/// primitive id.
pub struct AutomationManager {
    env: Env,
    pairings: RwLock<HashMap<PrimitiveId, Arc<Pairing>>>,
    rules: RwLock<HashMap<PrimitiveId, Arc<Rule>>>,
    timers: RwLock<HashMap<PrimitiveId, Arc<Timer>>>,
}

impl AutomationManager {
    /// Build an empty manager bound to `env`.
    pub fn new(env: Env) -> Self {
        AutomationManager {
            env,
            pairings: RwLock::new(HashMap::new()),
            rules: RwLock::new(HashMap::new()),
            timers: RwLock::new(HashMap::new()),
        }
    }

    /// Create and register a pairing from its snapshot, enabling it if
    /// the snapshot says to.
    pub async fn create_pairing(
        &self,
        id: PrimitiveId,
        snapshot: PairingSnapshot,
    ) -> Result<Arc<Pairing>, AutomationError> {
        let enabled = snapshot.enabled;
        let pairing = Arc::new(Pairing::new(snapshot.to_config(), self.env.clone()));
        if enabled {
            pairing.enable().await?;
        }
        self.pairings.write().await.insert(id, Arc::clone(&pairing));
        Ok(pairing)
    }

    /// Create and register a rule from its snapshot.
    pub async fn create_rule(
        &self,
        id: PrimitiveId,
        snapshot: RuleSnapshot,
    ) -> Result<Arc<Rule>, AutomationError> {
        let enabled = snapshot.enabled;
        let config = snapshot.to_config()?;
        let rule = Rule::build(config, self.env.clone()).await?;
        if enabled {
            rule.enable();
        }
        self.rules.write().await.insert(id, Arc::clone(&rule));
        Ok(rule)
    }

    /// Create and register a timer from its snapshot.
    pub async fn create_timer(
        &self,
        id: PrimitiveId,
        snapshot: TimerSnapshot,
    ) -> Result<Arc<Timer>, AutomationError> {
        let enabled = snapshot.enabled;
        let config = snapshot.to_config()?;
        let timer = Timer::build(config, self.env.clone())?;
        if enabled {
            timer.enable();
        }
        self.timers.write().await.insert(id, Arc::clone(&timer));
        Ok(timer)
    }

    /// Disable and remove a pairing.
    pub async fn remove_pairing(&self, id: &PrimitiveId) {
        if let Some(p) = self.pairings.write().await.remove(id) {
            p.disable();
        }
    }

    /// Disable and remove a rule.
    pub async fn remove_rule(&self, id: &PrimitiveId) {
        if let Some(r) = self.rules.write().await.remove(id) {
            r.disable();
        }
    }

    /// Disable and remove a timer.
    pub async fn remove_timer(&self, id: &PrimitiveId) {
        if let Some(t) = self.timers.write().await.remove(id) {
            t.disable();
        }
    }

    /// Look up a pairing by id.
    pub async fn pairing(&self, id: &PrimitiveId) -> Option<Arc<Pairing>> {
        self.pairings.read().await.get(id).cloned()
    }

    /// Look up a rule by id.
    pub async fn rule(&self, id: &PrimitiveId) -> Option<Arc<Rule>> {
        self.rules.read().await.get(id).cloned()
    }

    /// Look up a timer by id.
    pub async fn timer(&self, id: &PrimitiveId) -> Option<Arc<Timer>> {
        self.timers.read().await.get(id).cloned()
    }

    /// Snapshot every pairing's config, keyed by id.
    pub async fn snapshot_pairings(&self) -> HashMap<PrimitiveId, PairingSnapshot> {
        self.pairings
            .read()
            .await
            .iter()
            .map(|(id, p)| (id.clone(), PairingSnapshot::from_config(&p.config())))
            .collect()
    }

    /// Snapshot every rule's persistent state, keyed by id.
    pub async fn snapshot_rules(&self) -> HashMap<PrimitiveId, RuleSnapshot> {
        self.rules
            .read()
            .await
            .iter()
            .map(|(id, r)| (id.clone(), r.snapshot()))
            .collect()
    }

    /// Snapshot every timer's persistent state, keyed by id. The volatile
    /// fire count is never included; a later `create_timer` restore always
    /// starts at zero.
    pub async fn snapshot_timers(&self) -> HashMap<PrimitiveId, TimerSnapshot> {
        self.timers
            .read()
            .await
            .iter()
            .map(|(id, t)| (id.clone(), t.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splot_core::test_utils::{InMemoryRestClient, InMemoryResourceLinkManager};

    fn test_env() -> Env {
        Env::new(
            Arc::new(InMemoryResourceLinkManager::new()),
            Arc::new(InMemoryRestClient::new()),
            Arc::new(splot_core::SystemClock),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timer_lifecycle_through_manager() {
        let manager = AutomationManager::new(test_env());
        let id = PrimitiveId::new("t1");
        let snap = TimerSnapshot::new("0.01", "", true, &[], true);
        let timer = manager.create_timer(id.clone(), snap).await.unwrap();
        assert!(manager.timer(&id).await.is_some());
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(timer.fire_count() >= 1);
        manager.remove_timer(&id).await;
        assert!(manager.timer(&id).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timer_snapshot_restores_with_fire_count_reset() {
        let manager = AutomationManager::new(test_env());
        let id = PrimitiveId::new("t2");
        let snap = TimerSnapshot::new("0.01", "", true, &[], true);
        let timer = manager.create_timer(id.clone(), snap.clone()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(timer.fire_count() >= 1);

        let snapshots = manager.snapshot_timers().await;
        let restored_snap = snapshots.get(&id).unwrap().clone();
        assert_eq!(restored_snap.schedule, snap.schedule);
        assert_eq!(restored_snap.predicate, snap.predicate);
        assert_eq!(restored_snap.auto_reset, snap.auto_reset);

        manager.remove_timer(&id).await;
        let rebuilt = manager.create_timer(id.clone(), restored_snap).await.unwrap();
        assert_eq!(rebuilt.fire_count(), 0);
    }
}
