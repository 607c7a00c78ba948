//! Shared utilities for use cases.
//!
//! Cancellation checking and cancellable awaiting, used by every component
//! that crosses a stage boundary.

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Marker produced when the run's cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Check if cancellation has been requested.
pub(crate) fn check_cancelled(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    Ok(())
}

/// Await `future`, abandoning it as soon as `token` is cancelled.
pub(crate) async fn cancellable<F, T, E>(token: &CancellationToken, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<Cancelled>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled.into()),
        result = future => result,
    }
}
