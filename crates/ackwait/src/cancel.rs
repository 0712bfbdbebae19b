//! Ready-made cancellation signals for [`AckWaiter::wait`].
//!
//! A wait accepts any [`Future`] as its cancellation signal, and the value the
//! future resolves to is what the wait fails with. [`Cancellation`] covers the
//! usual cases - explicit cancellation, deadlines, and combinations of the two
//! - without tying this crate to a specific async runtime.
//!
//! [`AckWaiter::wait`]: crate::AckWaiter::wait

use {
    core::{
        fmt,
        pin::Pin,
        task::{Context, Poll},
    },
    futures::{
        channel::oneshot,
        future::{self, BoxFuture, FutureExt},
        never::Never,
    },
    thiserror::Error,
};

/// Why a [`Cancellation`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CancelReason {
    /// The operation was explicitly cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// The deadline for the operation passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Runtime-agnostic cancellation signal, resolving to a [`CancelReason`]
/// once it fires.
///
/// # Examples
///
/// Cancel from elsewhere:
///
/// ```
/// use ackwait::{CancelReason, cancel};
///
/// # futures::executor::block_on(async {
/// let (canceller, cancellation) = cancel::pair();
/// canceller.cancel();
/// assert_eq!(cancellation.await, CancelReason::Cancelled);
/// # });
/// ```
///
/// Give up after a timeout, using the timer of your runtime:
///
/// ```no_run
/// use {ackwait::Cancellation, std::time::Duration};
///
/// # async fn run() {
/// let cancellation = Cancellation::deadline(tokio::time::sleep(Duration::from_secs(5)));
/// # }
/// ```
#[must_use = "a cancellation does nothing unless awaited"]
pub struct Cancellation(BoxFuture<'static, CancelReason>);

/// Sending half of a [`Cancellation`] created by [`pair`].
///
/// The paired [`Cancellation`] fires with [`CancelReason::Cancelled`] once
/// this is either [cancelled] or dropped.
///
/// [cancelled]: Canceller::cancel
#[derive(Debug)]
pub struct Canceller {
    _send: oneshot::Sender<Never>,
}

/// Creates a [`Cancellation`] which fires when the paired [`Canceller`] is
/// cancelled or dropped.
pub fn pair() -> (Canceller, Cancellation) {
    let (send, recv) = oneshot::channel::<Never>();
    let cancellation = Cancellation(
        async move {
            // the only way to resolve a `Receiver<Never>` is the sender going away
            let _ = recv.await;
            CancelReason::Cancelled
        }
        .boxed(),
    );
    (Canceller { _send: send }, cancellation)
}

impl Canceller {
    /// Fires the paired [`Cancellation`].
    pub fn cancel(self) {
        drop(self);
    }
}

impl Cancellation {
    /// Creates a signal which never fires.
    pub fn never() -> Self {
        Self(future::pending().boxed())
    }

    /// Creates a signal which has already fired with
    /// [`CancelReason::Cancelled`].
    pub fn cancelled() -> Self {
        Self(future::ready(CancelReason::Cancelled).boxed())
    }

    /// Creates a signal which fires with [`CancelReason::DeadlineExceeded`]
    /// once `timer` completes.
    ///
    /// `timer` is typically a sleep future from your async runtime, such as
    /// `tokio::time::sleep`.
    pub fn deadline<T>(timer: T) -> Self
    where
        T: Future + Send + 'static,
    {
        Self(timer.map(|_| CancelReason::DeadlineExceeded).boxed())
    }

    /// Combines this signal with `other`, firing with the reason of whichever
    /// fires first.
    ///
    /// If both are ready at the same time, `self` wins.
    pub fn or(self, other: Self) -> Self {
        Self(
            future::select(self, other)
                .map(|either| either.factor_first().0)
                .boxed(),
        )
    }
}

impl Future for Cancellation {
    type Output = CancelReason;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Cancellation").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        core::time::Duration,
        futures::{executor::block_on, poll},
    };

    #[test]
    fn cancelled_is_ready() {
        assert_eq!(block_on(Cancellation::cancelled()), CancelReason::Cancelled);
    }

    #[test]
    fn pair_fires_on_drop() {
        let (canceller, mut cancellation) = pair();
        block_on(async {
            assert!(poll!(&mut cancellation).is_pending());
            drop(canceller);
            assert_eq!(cancellation.await, CancelReason::Cancelled);
        });
    }

    #[test]
    fn never_stays_pending() {
        let mut cancellation = Cancellation::never();
        block_on(async {
            assert!(poll!(&mut cancellation).is_pending());
            assert!(poll!(&mut cancellation).is_pending());
        });
    }

    #[test]
    fn or_takes_first_to_fire() {
        let (_canceller, cancellation) = pair();
        let combined = cancellation.or(Cancellation::cancelled());
        assert_eq!(block_on(combined), CancelReason::Cancelled);

        let combined = Cancellation::never().or(Cancellation::deadline(future::ready(())));
        assert_eq!(block_on(combined), CancelReason::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_after_timer() {
        let mut cancellation = Cancellation::deadline(tokio::time::sleep(Duration::from_secs(1)));
        assert!(poll!(&mut cancellation).is_pending());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cancellation.await, CancelReason::DeadlineExceeded);
    }
}
