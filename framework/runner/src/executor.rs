use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sweep_core::prelude::{ShutdownHandle, ShutdownSignalError};

/// Owns the async runtime that external tools and drain pauses run on.
///
/// The runtime is single threaded and only one step is ever in flight: each call blocks the
/// sweep until it completes or a shutdown is requested.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub fn new(shutdown_handle: ShutdownHandle) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;

        Ok(Self {
            runtime,
            shutdown_handle,
        })
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_handle.is_shutdown()
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// The future is dropped if the sweep is shut down while it is running, so anything it owns,
    /// such as a child process spawned with `kill_on_drop`, is cleaned up.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = T>,
    ) -> Result<T, ShutdownSignalError> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => Ok(result),
                _ = shutdown_listener.wait_for_shutdown() => Err(ShutdownSignalError::default()),
            }
        })
    }

    /// Block for `duration` unless a shutdown is requested first.
    pub fn pause(&self, duration: Duration) -> Result<(), ShutdownSignalError> {
        if duration.is_zero() {
            return Ok(());
        }
        // The timer must be created inside the runtime.
        self.execute_in_place(async move { tokio::time::sleep(duration).await })
    }

    /// Submit background work, such as the Ctrl-C listener. It only makes progress while a
    /// blocking step is running.
    pub(crate) fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}
