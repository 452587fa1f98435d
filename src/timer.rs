//! Waiting between polls and retry rounds.
//!
//! Every wait in a run goes through [`Timer`] so tests can swap real time
//! for an instant, recording implementation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[allow(async_fn_in_trait)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

/// Real-time waits on the tokio timer wheel.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleep for `duration` unless `cancel` fires first. Returns `false` when
/// cancelled.
pub async fn wait_or_cancel(
    timer: &impl Timer,
    duration: Duration,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = timer.sleep(duration) => true,
    }
}

/// Returns immediately and remembers every requested wait.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingTimer {
    sleeps: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingTimer {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, duration: Duration) -> usize {
        self.sleeps().iter().filter(|d| **d == duration).count()
    }
}

#[cfg(test)]
impl Timer for RecordingTimer {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}
