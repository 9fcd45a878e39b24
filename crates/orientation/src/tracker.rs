//! Periodic orientation sampling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use altimeter_common::error::{AltimeterError, AltimeterResult};
use altimeter_media_model::DeviceOrientation;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::source::GravitySource;
use crate::strategy::Strategy;

/// Samples a [`GravitySource`] on a fixed interval and publishes the
/// classified orientation.
///
/// Sampling runs as a task on the current tokio runtime, independent of
/// capture configuration and frame delivery. Subscribers only see a new
/// value when the orientation actually changes.
pub struct OrientationTracker {
    state: Arc<watch::Sender<DeviceOrientation>>,
    task: Mutex<Option<JoinHandle<()>>>,
    updates: Arc<AtomicU64>,
}

impl OrientationTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeviceOrientation::Unknown);
        Self {
            state: Arc::new(tx),
            task: Mutex::new(None),
            updates: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start sampling. Does nothing and returns `Ok(false)` if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        mut source: Box<dyn GravitySource>,
        strategy: Strategy,
        interval: Duration,
    ) -> AltimeterResult<bool> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(false);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            AltimeterError::invalid_state("orientation tracking needs a tokio runtime")
        })?;
        if interval.is_zero() {
            return Err(AltimeterError::configuration(
                "orientation sample interval must be non-zero",
            ));
        }

        tracing::info!(
            source = %source.name(),
            %strategy,
            interval_ms = interval.as_millis() as u64,
            "Orientation tracking started"
        );

        let state = Arc::clone(&self.state);
        let updates = Arc::clone(&self.updates);
        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let gravity = match source.sample() {
                    Ok(Some(gravity)) => gravity,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "Gravity sample failed");
                        continue;
                    }
                };
                let Some(next) = strategy.classify(gravity) else {
                    continue;
                };
                let changed = state.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next;
                    true
                });
                if changed {
                    updates.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(orientation = %next, "Device orientation changed");
                }
            }
        }));
        Ok(true)
    }

    /// Stop sampling and reset the orientation to unknown.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            tracing::info!(
                updates = self.updates.load(Ordering::Relaxed),
                "Orientation tracking stopped"
            );
        }
        self.state.send_replace(DeviceOrientation::Unknown);
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Most recently reported orientation.
    pub fn orientation(&self) -> DeviceOrientation {
        *self.state.borrow()
    }

    /// Receiver notified on every orientation change.
    pub fn subscribe(&self) -> watch::Receiver<DeviceOrientation> {
        self.state.subscribe()
    }

    /// Number of orientation changes published since creation.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl Default for OrientationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OrientationTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}
