//! Schedule-driven timer: `Disabled -> Armed -> Firing -> (Armed |
//! Disabled)`.

use crate::action::{ActionDispatcher, ActionSpec, InvocationStats};
use crate::error::AutomationError;
use splot_core::Env;
use splot_sae::{compile, run as run_sae, Context, Opcode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// A timer's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not scheduled.
    Disabled,
    /// Waiting for its next scheduled delay to elapse.
    Armed,
    /// Currently evaluating its predicate and, if true, dispatching
    /// actions.
    Firing,
}

/// A timer's configuration.
pub struct TimerConfig {
    /// SAE program evaluating to the delay, in seconds, until next fire.
    pub schedule: String,
    /// SAE predicate; defaults to `true` when empty.
    pub predicate: String,
    /// Re-arm automatically after firing instead of disabling.
    pub auto_reset: bool,
    /// Actions dispatched when the predicate holds.
    pub actions: Vec<ActionSpec>,
}

/// The minimum delay used when a schedule evaluates to zero or negative,
/// to avoid a busy loop.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// A running timer.
pub struct Timer {
    schedule: Vec<Opcode>,
    schedule_src: String,
    predicate: Vec<Opcode>,
    predicate_src: String,
    auto_reset: AtomicBool,
    actions: Mutex<Vec<ActionSpec>>,
    env: Env,
    state: Mutex<TimerState>,
    stats: InvocationStats,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Compile the schedule/predicate programs for a new, disabled timer.
    pub fn build(config: TimerConfig, env: Env) -> Result<std::sync::Arc<Self>, AutomationError> {
        let schedule = compile(&config.schedule)?;
        let predicate = if config.predicate.trim().is_empty() {
            Vec::new()
        } else {
            compile(&config.predicate)?
        };
        Ok(std::sync::Arc::new(Timer {
            schedule,
            schedule_src: config.schedule,
            predicate,
            predicate_src: config.predicate,
            auto_reset: AtomicBool::new(config.auto_reset),
            actions: Mutex::new(config.actions),
            env,
            state: Mutex::new(TimerState::Disabled),
            stats: InvocationStats::new(),
            task: Mutex::new(None),
        }))
    }

    /// Rebuild this timer's persistent-state snapshot. The fire count is
    /// volatile and never included; a restore always starts at zero.
    pub fn snapshot(&self) -> crate::snapshot::TimerSnapshot {
        let actions = self.actions.lock().expect("timer actions lock poisoned").clone();
        crate::snapshot::TimerSnapshot::new(
            &self.schedule_src,
            &self.predicate_src,
            self.auto_reset.load(Ordering::Acquire),
            &actions,
            self.state() != TimerState::Disabled,
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TimerState {
        *self.state.lock().expect("timer state lock poisoned")
    }

    /// Number of successful firings since the last reset.
    pub fn fire_count(&self) -> u64 {
        self.stats.count()
    }

    /// Reset the fire counter to zero, per `s/actn/c = 0`.
    pub fn reset_count(&self) {
        self.stats.reset();
    }

    /// Reset `c=0` and transition to `Armed`, scheduling the next delay.
    pub fn enable(self: &std::sync::Arc<Self>) {
        self.stats.reset();
        *self.state.lock().expect("timer state lock poisoned") = TimerState::Armed;
        self.arm();
    }

    /// Cancel any pending delay and transition to `Disabled`.
    pub fn disable(&self) {
        *self.state.lock().expect("timer state lock poisoned") = TimerState::Disabled;
        if let Some(task) = self.task.lock().expect("timer task lock poisoned").take() {
            task.abort();
        }
    }

    fn arm(self: &std::sync::Arc<Self>) {
        let timer = std::sync::Arc::clone(self);
        let handle = tokio::spawn(async move {
            let rtc = timer.env.clock.now_rtc();
            let ctx = Context::new(
                splot_core::Value::Null,
                splot_core::Value::Null,
                timer.stats.count() as f64,
                rtc,
            );
            let delay_secs = run_sae(&timer.schedule, splot_core::Value::Null, &ctx)
                .ok()
                .and_then(|v| v.as_f64().ok())
                .unwrap_or(0.0);
            let delay = if delay_secs > 0.0 {
                Duration::from_secs_f64(delay_secs)
            } else {
                MIN_DELAY
            };

            tokio::time::sleep(delay).await;

            if timer.state() != TimerState::Armed {
                return;
            }
            timer.fire().await;
        });
        *self.task.lock().expect("timer task lock poisoned") = Some(handle);
    }

    async fn fire(self: &std::sync::Arc<Self>) {
        *self.state.lock().expect("timer state lock poisoned") = TimerState::Firing;

        let rtc = self.env.clock.now_rtc();
        let ctx = Context::new(
            splot_core::Value::Null,
            splot_core::Value::Null,
            self.stats.count() as f64,
            rtc,
        );
        let predicate_holds = if self.predicate.is_empty() {
            true
        } else {
            run_sae(&self.predicate, splot_core::Value::Null, &ctx)
                .ok()
                .and_then(|v| v.as_bool().ok())
                .unwrap_or(false)
        };

        if predicate_holds {
            self.stats.record_fire();
            let actions = self.actions.lock().expect("timer actions lock poisoned").clone();
            let dispatcher = ActionDispatcher::new(self.env.clone());
            if let Err(e) = dispatcher.dispatch(&actions).await {
                warn!(error = %e, "timer action dispatch stopped on error");
            }
        }

        let still_armed = {
            let mut state = self.state.lock().expect("timer state lock poisoned");
            if *state == TimerState::Firing {
                *state = if self.auto_reset.load(Ordering::Acquire) {
                    TimerState::Armed
                } else {
                    TimerState::Disabled
                };
            }
            *state == TimerState::Armed
        };

        if still_armed {
            self.arm();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splot_core::test_utils::{InMemoryRestClient, InMemoryResourceLinkManager};

    fn test_env() -> Env {
        Env::new(
            std::sync::Arc::new(InMemoryResourceLinkManager::new()),
            std::sync::Arc::new(InMemoryRestClient::new()),
            std::sync::Arc::new(splot_core::SystemClock),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fires_repeatedly_with_auto_reset() {
        let config = TimerConfig {
            schedule: "0.01".to_owned(),
            predicate: String::new(),
            auto_reset: true,
            actions: vec![],
        };
        let timer = Timer::build(config, test_env()).unwrap();
        timer.enable();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(timer.fire_count() >= 2);
        timer.disable();
        assert_eq!(timer.state(), TimerState::Disabled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_without_auto_reset_after_one_fire() {
        let config = TimerConfig {
            schedule: "0.01".to_owned(),
            predicate: String::new(),
            auto_reset: false,
            actions: vec![],
        };
        let timer = Timer::build(config, test_env()).unwrap();
        timer.enable();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(timer.fire_count(), 1);
        assert_eq!(timer.state(), TimerState::Disabled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_count_zeroes_c() {
        let config = TimerConfig {
            schedule: "0.01".to_owned(),
            predicate: String::new(),
            auto_reset: true,
            actions: vec![],
        };
        let timer = Timer::build(config, test_env()).unwrap();
        timer.enable();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(timer.fire_count() >= 1);
        timer.reset_count();
        assert_eq!(timer.fire_count(), 0);
        timer.disable();
    }
}
