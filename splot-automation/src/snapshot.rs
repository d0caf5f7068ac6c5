//! Persistent-state snapshots: each primitive's config section (SAE
//! source, conditions, action list, enabled flag), excluding anything
//! `no-save`. Volatile state (a timer's `c`) is never part of a
//! snapshot — restore always resets it.

use crate::action::{ActionMethod, ActionSpec, SyncMode};
use crate::pairing::PairingConfig;
use crate::rule::{ConditionSpec, MatchMode, RuleConfig};
use crate::timer::TimerConfig;
use serde::{Deserialize, Serialize};
use splot_core::{CoreError, Value};

/// Wire form of one action-list entry: `{p, m, b, s, sync, desc}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSnapshot {
    /// Target path/URI.
    pub p: String,
    /// Method, `"GET"` or `"POST"`.
    #[serde(default = "default_method")]
    pub m: String,
    /// Body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<Value>,
    /// Skip flag.
    #[serde(default)]
    pub s: bool,
    /// Sync mode code (`0`/`1`/`2`).
    pub sync: i64,
    /// Description, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

fn default_method() -> String {
    "POST".to_owned()
}

impl ActionSnapshot {
    /// Convert a live [`ActionSpec`] into its wire form.
    pub fn from_spec(spec: &ActionSpec) -> Self {
        ActionSnapshot {
            p: spec.path.clone(),
            m: match spec.method {
                ActionMethod::Get => "GET".to_owned(),
                ActionMethod::Post => "POST".to_owned(),
            },
            b: spec.body.clone(),
            s: spec.skip,
            sync: spec.sync.to_code(),
            desc: spec.desc.clone(),
        }
    }

    /// Rebuild a live [`ActionSpec`] from its wire form.
    pub fn to_spec(&self) -> Result<ActionSpec, CoreError> {
        let method = match self.m.as_str() {
            "GET" => ActionMethod::Get,
            "POST" => ActionMethod::Post,
            other => return Err(CoreError::InvalidValue(format!("unknown action method {other}"))),
        };
        let sync = SyncMode::from_code(self.sync).map_err(|_| {
            CoreError::InvalidValue(format!("unknown sync mode {}", self.sync))
        })?;
        Ok(ActionSpec {
            path: self.p.clone(),
            method,
            body: self.b.clone(),
            skip: self.s,
            sync,
            desc: self.desc.clone(),
        })
    }
}

/// Persistent state for a [`crate::pairing::Pairing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingSnapshot {
    /// Source resource-link URI.
    #[serde(rename = "source-uri")]
    pub source_uri: String,
    /// Destination resource-link URI.
    #[serde(rename = "destination-uri")]
    pub destination_uri: String,
    /// Propagate source→destination.
    pub push: bool,
    /// Propagate destination→source.
    pub pull: bool,
    /// Forward SAE source.
    #[serde(rename = "forward-xform")]
    pub forward_xform: String,
    /// Reverse SAE source.
    #[serde(rename = "reverse-xform")]
    pub reverse_xform: String,
    /// Whether the pairing is active.
    pub enabled: bool,
}

impl PairingSnapshot {
    /// Build a snapshot from a live configuration.
    pub fn from_config(config: &PairingConfig) -> Self {
        PairingSnapshot {
            source_uri: config.source_uri.clone(),
            destination_uri: config.destination_uri.clone(),
            push: config.push,
            pull: config.pull,
            forward_xform: config.forward_xform.clone(),
            reverse_xform: config.reverse_xform.clone(),
            enabled: config.enabled,
        }
    }

    /// Rebuild a live configuration from this snapshot.
    pub fn to_config(&self) -> PairingConfig {
        PairingConfig {
            source_uri: self.source_uri.clone(),
            destination_uri: self.destination_uri.clone(),
            push: self.push,
            pull: self.pull,
            forward_xform: self.forward_xform.clone(),
            reverse_xform: self.reverse_xform.clone(),
            enabled: self.enabled,
        }
    }
}

/// Persistent state for a [`crate::rule::Rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSnapshot {
    /// Monitored conditions.
    pub conditions: Vec<ConditionSnapshot>,
    /// `"ALL"` or `"ANY"`.
    #[serde(rename = "match")]
    pub match_mode: String,
    /// Action list.
    pub actions: Vec<ActionSnapshot>,
    /// Whether the rule is active.
    pub enabled: bool,
}

/// Wire form of [`ConditionSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    /// Monitored resource path.
    pub path: String,
    /// SAE predicate source.
    pub expr: String,
}

impl RuleSnapshot {
    /// Build a snapshot from a live configuration. `conditions`/`actions`
    /// are supplied separately since [`RuleConfig`] is consumed on build.
    pub fn new(conditions: &[ConditionSpec], match_mode: MatchMode, actions: &[ActionSpec], enabled: bool) -> Self {
        RuleSnapshot {
            conditions: conditions
                .iter()
                .map(|c| ConditionSnapshot {
                    path: c.path.clone(),
                    expr: c.expr.clone(),
                })
                .collect(),
            match_mode: match match_mode {
                MatchMode::All => "ALL".to_owned(),
                MatchMode::Any => "ANY".to_owned(),
            },
            actions: actions.iter().map(ActionSnapshot::from_spec).collect(),
            enabled,
        }
    }

    /// Rebuild a [`RuleConfig`] from this snapshot.
    pub fn to_config(&self) -> Result<RuleConfig, CoreError> {
        let match_mode = match self.match_mode.as_str() {
            "ALL" => MatchMode::All,
            "ANY" => MatchMode::Any,
            other => return Err(CoreError::InvalidValue(format!("unknown match mode {other}"))),
        };
        let actions = self
            .actions
            .iter()
            .map(ActionSnapshot::to_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleConfig {
            conditions: self
                .conditions
                .iter()
                .map(|c| ConditionSpec {
                    path: c.path.clone(),
                    expr: c.expr.clone(),
                })
                .collect(),
            match_mode,
            actions,
            enabled: self.enabled,
        })
    }
}

/// Persistent state for a [`crate::timer::Timer`]. The fire count `c` is
/// volatile and deliberately absent: restore always starts at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// SAE schedule source.
    pub schedule: String,
    /// SAE predicate source.
    pub predicate: String,
    #[serde(rename = "auto-reset")]
    /// Auto-rearm flag.
    pub auto_reset: bool,
    /// Action list.
    pub actions: Vec<ActionSnapshot>,
    /// Whether the timer is active.
    pub enabled: bool,
}

impl TimerSnapshot {
    /// Build a snapshot. `actions`/`enabled` are supplied separately
    /// since [`TimerConfig`] is consumed on build and `Timer` tracks
    /// `enabled` via its own state machine.
    pub fn new(schedule: &str, predicate: &str, auto_reset: bool, actions: &[ActionSpec], enabled: bool) -> Self {
        TimerSnapshot {
            schedule: schedule.to_owned(),
            predicate: predicate.to_owned(),
            auto_reset,
            actions: actions.iter().map(ActionSnapshot::from_spec).collect(),
            enabled,
        }
    }

    /// Rebuild a [`TimerConfig`] from this snapshot (enabled-ness is
    /// applied by the caller after construction).
    pub fn to_config(&self) -> Result<TimerConfig, CoreError> {
        let actions = self
            .actions
            .iter()
            .map(ActionSnapshot::to_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TimerConfig {
            schedule: self.schedule.clone(),
            predicate: self.predicate.clone(),
            auto_reset: self.auto_reset,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_snapshot_round_trips_through_json() {
        let snap = TimerSnapshot::new(
            "13.5 rtc.tod - 24 % H>S",
            "2 rtc.dow == 1 rtc.awm == &&",
            true,
            &[],
            true,
        );
        let json = serde_json::to_string(&snap).unwrap();
        let back: TimerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.schedule, snap.schedule);
        assert_eq!(back.predicate, snap.predicate);
        assert_eq!(back.auto_reset, snap.auto_reset);
        assert_eq!(back.enabled, snap.enabled);
    }

    #[test]
    fn action_snapshot_round_trips_sync_code() {
        let spec = ActionSpec {
            path: "/1/s/onof/v".to_owned(),
            method: ActionMethod::Post,
            body: Some(Value::Bool(true)),
            skip: false,
            sync: SyncMode::StopOnError,
            desc: None,
        };
        let snap = ActionSnapshot::from_spec(&spec);
        let back = snap.to_spec().unwrap();
        assert_eq!(back.sync, SyncMode::StopOnError);
        assert_eq!(back.path, spec.path);
    }
}
