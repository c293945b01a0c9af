//! Restartable background task slot.
//!
//! Holds the running flag and the cancellation token of one cooperative
//! loop. Start and stop are compare-and-set transitions serialized by a
//! mutex, so a stop can never miss the token of a concurrent start.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

pub(crate) struct BackgroundTask {
    name: &'static str,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Spawn the loop built by `make` on the current tokio runtime.
    ///
    /// Returns `Ok(false)` when already running. When `make` fails or no
    /// runtime is available the flag is rolled back and the error returned.
    pub(crate) fn start<F, Fut>(&self, make: F) -> Result<bool>
    where
        F: FnOnce(CancellationToken) -> Result<Fut>,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut cancel = self.cancel.lock();
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        let spawned = Handle::try_current()
            .map_err(|e| Error::NoRuntime(format!("{}: {}", self.name, e)))
            .and_then(|handle| {
                let token = CancellationToken::new();
                let task = make(token.clone())?;
                handle.spawn(task);
                Ok(token)
            });

        match spawned {
            Ok(token) => {
                *cancel = Some(token);
                debug!(task = self.name, "Background task started");
                Ok(true)
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Cancel the loop. Returns false when it was not running.
    pub(crate) fn stop(&self) -> bool {
        let mut cancel = self.cancel.lock();
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Some(token) = cancel.take() {
            token.cancel();
        }
        debug!(task = self.name, "Background task stopped");
        true
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.get_mut().take() {
            token.cancel();
        }
    }
}
