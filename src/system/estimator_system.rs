//! Background estimator: runs the poller on its own thread.
//!
//! The producer keeps writing samples at its own pace; the estimator thread
//! never blocks it. Dropping the system requests shutdown and joins the thread.

use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};

use crate::estimation::{EstimationPoller, PollerStats};

use super::shutdown::{shutdown_channel, ShutdownHandle};

/// Name of the estimator thread.
const THREAD_NAME: &str = "gravity-estimator";

/// Owns the estimator thread and its shutdown handle.
pub struct EstimatorSystem {
    shutdown: ShutdownHandle,
    handle: Option<JoinHandle<PollerStats>>,
}

impl EstimatorSystem {
    /// Spawn the estimation loop for `poller`.
    pub fn spawn(mut poller: EstimationPoller) -> Result<Self> {
        let (shutdown, signal) = shutdown_channel();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || poller.run(&signal))
            .context("Failed to spawn estimator thread")?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Handle that can stop the loop from elsewhere (e.g. a signal handler).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Block until the loop exits on its own shutdown request.
    ///
    /// Fails if the estimator thread panicked.
    pub fn join(mut self) -> Result<PollerStats> {
        self.join_inner()
    }

    /// Request shutdown and wait for the loop to finish its current tick.
    pub fn shutdown(mut self) -> Result<PollerStats> {
        self.shutdown.request();
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<PollerStats> {
        let Some(handle) = self.handle.take() else {
            bail!("estimator thread already joined");
        };
        handle.join().map_err(|_| {
            tracing::error!("estimator thread panicked");
            anyhow!("estimator thread panicked")
        })
    }
}

impl Drop for EstimatorSystem {
    fn drop(&mut self) {
        self.shutdown.request();
        if self.handle.is_some() {
            let _ = self.join_inner();
        }
    }
}
