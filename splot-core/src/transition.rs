//! Smooth interpolation of state properties over a duration.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Number of interpolation steps a transition takes between start and
/// target, regardless of duration. Coarse enough to be cheap, fine enough
/// that a light dimming over a few seconds reads as smooth.
const TRANSITION_STEPS: u32 = 20;

/// Owns a spawned transition task. Dropping it (or replacing it with a new
/// transition on the same property, or an unrelated direct write) aborts
/// the in-flight interpolation, which is how `duration=0` and ordinary
/// writes cancel a running transition.
pub(crate) struct TransitionHandle {
    task: JoinHandle<()>,
}

impl Drop for TransitionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a linear interpolation from `start` to `target` over `duration`,
/// calling `write` with each intermediate value (the final call receives
/// exactly `target`). `write` is also responsible for broadcasting the
/// change to listeners, since it is the same code path an ordinary write
/// uses.
pub(crate) fn spawn_linear<F, Fut>(start: f64, target: f64, duration: Duration, mut write: F) -> TransitionHandle
where
    F: FnMut(f64) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let step_delay = duration / TRANSITION_STEPS;
        for step in 1..=TRANSITION_STEPS {
            if step_delay > Duration::ZERO {
                tokio::time::sleep(step_delay).await;
            }
            let fraction = step as f64 / TRANSITION_STEPS as f64;
            let value = if step == TRANSITION_STEPS {
                target
            } else {
                start + (target - start) * fraction
            };
            write(value).await;
        }
    });
    TransitionHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn interpolation_reaches_exact_target() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed2 = observed.clone();
        let handle = spawn_linear(0.0, 10.0, Duration::from_millis(1), move |v| {
            let observed2 = observed2.clone();
            async move {
                observed2.lock().unwrap().push(v);
            }
        });
        handle.task.await.unwrap();
        let values = observed.lock().unwrap();
        assert_eq!(*values.last().unwrap(), 10.0);
        assert_eq!(values.len() as u32, TRANSITION_STEPS);
    }
}
