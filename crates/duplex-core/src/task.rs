//! Spawned tool-task plumbing shared by the dispatcher and drivers.

use tokio::task::{JoinError, JoinHandle};

use duplex_types::ToolError;

/// Aborts the wrapped task when dropped.
///
/// Drivers spawn tool bodies; if a driver future is dropped mid-flight
/// (deadline expiry), the tool task must not keep running detached.
pub(crate) struct AbortOnDrop<T>(pub JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Downgrade a join failure to a structured `INTERNAL` error.
///
/// A panicking tool body must surface as an error envelope, never as a raw
/// backtrace on the primary channel.
pub(crate) fn join_error(err: JoinError) -> ToolError {
    if err.is_panic() {
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "tool panicked".to_string());
        ToolError::internal(message)
    } else {
        ToolError::internal("tool task cancelled")
    }
}
