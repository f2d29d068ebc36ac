//! Bounded polling with cancellation
//!
//! [`poll_until_ready`] repeatedly evaluates a check until it reports ready,
//! the deadline passes, the check fails, or the caller cancels. Unlike a
//! retry loop, a failing check ends polling immediately: only an explicit
//! "not yet" answer keeps it going.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Why polling stopped without the condition being met
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The condition was not met before the deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled while polling
    #[error("cancelled")]
    Cancelled,

    /// The check itself failed
    #[error("check failed: {0}")]
    Check(E),
}

/// Poll `check` every `interval` until it returns `Ok(true)`.
///
/// The first check runs immediately. A check still in flight when the
/// deadline passes is abandoned and reported as a timeout.
///
/// # Returns
/// `Ok(())` once ready, or the reason polling stopped.
pub async fn poll_until_ready<F, Fut, E>(
    cancel: &CancellationToken,
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<(), PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(PollError::Timeout(timeout)),
            result = check() => result.map_err(PollError::Check)?,
        };

        if ready {
            return Ok(());
        }
        trace!("condition not met yet, polling again");

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::Timeout(timeout));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep_until((now + interval).min(deadline)) => {}
        }
    }
}
