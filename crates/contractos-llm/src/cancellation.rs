//! Cancellation and timeout support for the document agent (spec §5
//! "Cancellation semantics", "Timeouts").
//!
//! Grounded on the teacher's `legalis-llm/src/cancellation.rs`
//! `CancellationContext`/`CancellationToken` pairing, trimmed to the plain
//! request/response shape the agent needs — no stream wrapping, since this
//! crate has no streaming surface.

use std::time::Duration;

use contractos_core::error::CoreError;
use tokio_util::sync::CancellationToken;

/// Per-call cancellation handle. Cloning shares the same underlying signal,
/// so a caller can hold one end while the agent holds another.
#[derive(Debug, Clone, Default)]
pub struct CancellationContext {
    token: CancellationToken,
}

impl CancellationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Races `future` against `deadline` and the cancellation token, returning
/// `CoreError::Cancelled` or `CoreError::TimedOut` as appropriate (spec §5:
/// "Deadline breach = cancellation + typed error").
pub async fn run_with_deadline<F, T>(
    future: F,
    deadline: Duration,
    cancellation: &CancellationContext,
) -> Result<T, CoreError>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        result = future => Ok(result),
        _ = cancellation.token().cancelled() => Err(CoreError::Cancelled),
        _ = tokio::time::sleep(deadline) => Err(CoreError::TimedOut(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_future_finishes_first() {
        let ctx = CancellationContext::new();
        let result = run_with_deadline(async { 42 }, Duration::from_secs(5), &ctx).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn times_out_when_deadline_elapses_first() {
        let ctx = CancellationContext::new();
        let result = run_with_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                42
            },
            Duration::from_millis(10),
            &ctx,
        )
        .await;
        assert!(matches!(result, Err(CoreError::TimedOut(_))));
    }

    #[tokio::test]
    async fn cancels_when_token_is_cancelled_first() {
        let ctx = CancellationContext::new();
        let cancel_handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cancel_handle.cancel();
        });
        let result = run_with_deadline(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                42
            },
            Duration::from_secs(5),
            &ctx,
        )
        .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
