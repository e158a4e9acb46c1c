//! Playback scheduler
//!
//! Arms one one-shot timer per matched rule. The timer itself comes from a
//! [`TimerBackend`] so the same scheduler runs on `window.setTimeout` in the
//! browser and on tokio natively.

use crate::{types::Rule, Error};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of one-shot timers on a single-threaded event loop
pub trait TimerBackend: Clone + 'static {
    /// Token identifying a pending timer
    type Handle;

    /// Run `callback` once after `delay`
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Self::Handle;

    /// Drop a pending timer. Clearing a timer that already ran is harmless.
    fn clear_timeout(&self, handle: Self::Handle);
}

/// Lifecycle of a scheduled activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    Pending,
    Fired,
    Cancelled,
}

/// Cancellation handle returned by [`PlaybackScheduler::schedule`]
pub struct ScheduleHandle<T: TimerBackend> {
    timer: T,
    status: Rc<Cell<ScheduleStatus>>,
    pending: Option<T::Handle>,
    delay: Duration,
}

impl<T: TimerBackend> ScheduleHandle<T> {
    pub fn status(&self) -> ScheduleStatus {
        self.status.get()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == ScheduleStatus::Pending
    }

    /// Effective delay after clamping
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel before expiry. Returns `true` if this call prevented the
    /// activation; cancelling after expiry (or twice) is a no-op.
    pub fn cancel(&mut self) -> bool {
        if self.status.get() != ScheduleStatus::Pending {
            return false;
        }
        self.status.set(ScheduleStatus::Cancelled);
        if let Some(handle) = self.pending.take() {
            self.timer.clear_timeout(handle);
        }
        debug!("Scheduled activation cancelled");
        true
    }
}

impl<T: TimerBackend> std::fmt::Debug for ScheduleHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("status", &self.status.get())
            .field("delay", &self.delay)
            .finish()
    }
}

/// Clamp an authored delay into something a timer can honor.
///
/// Negative and non-finite values become zero; values beyond `max` are
/// capped at `max`.
pub fn clamp_delay(seconds: f64, max: Duration) -> Duration {
    if !seconds.is_finite() || seconds < 0.0 {
        let error = Error::InvalidDelay { value: seconds };
        warn!(code = error.error_code(), %error, "Delay clamped to zero");
        return Duration::ZERO;
    }
    match Duration::try_from_secs_f64(seconds) {
        Ok(delay) if delay <= max => delay,
        _ => {
            warn!(seconds, max_ms = max.as_millis() as u64, "Delay capped at timer maximum");
            max
        }
    }
}

/// Arms the activation timer for a matched rule
#[derive(Debug, Clone)]
pub struct PlaybackScheduler<T: TimerBackend> {
    timer: T,
    max_delay: Duration,
}

impl<T: TimerBackend> PlaybackScheduler<T> {
    pub fn new(timer: T, max_delay: Duration) -> Self {
        Self { timer, max_delay }
    }

    /// Schedule `on_activate` after the rule's delay
    pub fn schedule<F>(&self, rule: &Rule, on_activate: F) -> ScheduleHandle<T>
    where
        F: FnOnce() + 'static,
    {
        self.schedule_after(rule.delay_seconds, on_activate)
    }

    /// Schedule `on_activate` after `seconds`. A zero delay runs the
    /// callback before this returns.
    pub fn schedule_after<F>(&self, seconds: f64, on_activate: F) -> ScheduleHandle<T>
    where
        F: FnOnce() + 'static,
    {
        let delay = clamp_delay(seconds, self.max_delay);
        let status = Rc::new(Cell::new(ScheduleStatus::Pending));

        let fire_status = Rc::clone(&status);
        let fire = move || {
            if fire_status.get() == ScheduleStatus::Pending {
                fire_status.set(ScheduleStatus::Fired);
                on_activate();
            }
        };

        let pending = if delay.is_zero() {
            debug!("Zero delay, activating immediately");
            fire();
            None
        } else {
            debug!(delay_ms = delay.as_millis() as u64, "Activation timer armed");
            Some(self.timer.set_timeout(delay, Box::new(fire)))
        };

        ScheduleHandle {
            timer: self.timer.clone(),
            status,
            pending,
            delay,
        }
    }
}

/// Timer backend on the tokio runtime.
///
/// Callbacks run on the current thread, so scheduling must happen inside a
/// [`tokio::task::LocalSet`].
#[cfg(feature = "tokio-timer")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[cfg(feature = "tokio-timer")]
impl TimerBackend for TokioTimer {
    type Handle = tokio::task::JoinHandle<()>;

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Self::Handle {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        })
    }

    fn clear_timeout(&self, handle: Self::Handle) {
        handle.abort();
    }
}
