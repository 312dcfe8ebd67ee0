//! Futures which give up when a cancellation token fires.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::Error;

/// Races an HTTP exchange against an optional [`CancellationToken`].
///
/// Cancellation is checked before the inner future on every poll, so a
/// token which is already cancelled never lets the exchange start.
#[pin_project]
pub struct Cancellable<F> {
    #[pin]
    inner: F,
    #[pin]
    cancelled: Option<WaitForCancellationFutureOwned>,
}

impl<F> fmt::Debug for Cancellable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellable")
            .field("cancellable", &self.cancelled.is_some())
            .finish()
    }
}

impl<F> Cancellable<F> {
    /// Wrap `inner` so that it resolves to [`Error::Cancelled`] once `token` fires.
    pub fn new(inner: F, token: Option<CancellationToken>) -> Self {
        Self {
            inner,
            cancelled: token.map(CancellationToken::cancelled_owned),
        }
    }
}

impl<F, T> Future for Cancellable<F>
where
    F: Future<Output = Result<T, Error>>,
{
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Some(cancelled) = this.cancelled.as_pin_mut() {
            if cancelled.poll(cx).is_ready() {
                tracing::trace!("request cancelled");
                return Poll::Ready(Err(Error::Cancelled));
            }
        }
        this.inner.poll(cx)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn precancelled_token_never_polls_inner() {
        let token = CancellationToken::new();
        token.cancel();

        let ran = AtomicBool::new(false);
        let result = Cancellable::new(
            async {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, Error>(())
            },
            Some(token),
        )
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_pending() {
        let token = CancellationToken::new();
        let trigger = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = Cancellable::new(
            std::future::pending::<Result<(), Error>>(),
            Some(token),
        )
        .await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn without_token_runs_to_completion() {
        let result = Cancellable::new(async { Ok::<_, Error>(7) }, None).await;
        assert_eq!(result.unwrap(), 7);
    }
}
