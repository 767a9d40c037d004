//! Debounce utility
//!
//! Coalesces rapid calls: only the last value handed to [`Debouncer::call`]
//! within the delay reaches the callback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Timer-based call coalescer with cancel
pub struct Debouncer<T> {
    delay: Duration,
    callback: Callback<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, callback: impl Fn(T) + Send + Sync + 'static) -> Self {
        debug!(?delay, "Debouncer::new: called");
        Self {
            delay,
            callback: Arc::new(callback),
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restart the timer with `value` as the pending argument
    pub fn call(&self, value: T) {
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback(value);
        });

        if let Some(previous) = self.pending().replace(task) {
            previous.abort();
        }
    }

    /// Drop the pending call, if any
    pub fn cancel(&self) {
        if let Some(task) = self.pending().take() {
            debug!("Debouncer::cancel: dropping pending call");
            task.abort();
        }
    }

    /// True while a call is waiting for its delay to pass
    pub fn is_pending(&self) -> bool {
        self.pending().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(task) = pending.take() {
            task.abort();
        }
    }
}
