//! See [`AckWaiter`].

use {
    crate::{
        config::WaiterConfig,
        seq::{SeedError, Seq},
    },
    core::{fmt, iter, mem, pin::pin},
    futures::{
        channel::oneshot,
        future::{self, Either},
    },
    std::sync::{Mutex, MutexGuard, PoisonError},
    thiserror::Error,
    tracing::{debug, trace, warn},
};

/// One slot per possible [`Seq`] value.
const NUM_SLOTS: usize = 1 << u16::BITS;

/// Correlates dispatched actions with their acknowledgments by sequence
/// number.
///
/// Each call to [`AckWaiter::wait`] allocates the next [`Seq`], runs an
/// action tagged with it (e.g. sending a request over a transport), then
/// suspends until [`AckWaiter::done`] is called with that same sequence
/// number, or until the cancellation signal fires. Any number of waits may be
/// in flight at once, and acknowledgments may arrive in any order.
///
/// Internally, this keeps a fixed table with one slot per possible sequence
/// number, so allocation and delivery are both constant-time. The table is
/// only locked for the instants where a slot is installed, acknowledged, or
/// cleared - never while an action runs, and never while a wait is
/// suspended.
///
/// # Capacity
///
/// At most 65536 waits may be outstanding on one waiter at a time. Past
/// that, the sequence space wraps onto a slot which is still in use; the
/// newer wait takes over the slot, and the older wait fails with
/// [`WaitError::Evicted`]. Bound concurrency externally if the transport
/// can't guarantee this.
///
/// # Examples
///
/// ```
/// use ackwait::{AckWaiter, Cancellation, Seq};
///
/// # futures::executor::block_on(async {
/// let waiter = AckWaiter::with_first_seq(Seq(100));
///
/// let mut sent = None;
/// waiter
///     .wait(Cancellation::never(), |seq| {
///         sent = Some(seq);
///         // normally the transport's receive path calls this later
///         waiter.done(seq);
///         Ok::<_, std::convert::Infallible>(())
///     })
///     .await
///     .unwrap();
///
/// assert_eq!(sent, Some(Seq(100)));
/// assert_eq!(waiter.next_seq(), Seq(101));
/// # });
/// ```
pub struct AckWaiter {
    state: Mutex<State>,
}

struct State {
    next_seq: Seq,
    next_ticket: Ticket,
    in_flight: usize,
    slots: Box<[Slot]>,
}

/// Identifies the wait which installed a slot, so that a wait which was
/// evicted by a wraparound never clears the slot of the wait which evicted
/// it.
type Ticket = u64;

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Vacant,
    Waiting {
        ticket: Ticket,
        send_ack: oneshot::Sender<()>,
    },
    Acked {
        ticket: Ticket,
    },
}

impl Slot {
    const fn ticket(&self) -> Option<Ticket> {
        match self {
            Self::Vacant => None,
            Self::Waiting { ticket, .. } | Self::Acked { ticket } => Some(*ticket),
        }
    }
}

/// Error from [`AckWaiter::wait`].
///
/// `E` is the error type of the action, and `R` is the output of the
/// cancellation signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError<E, R> {
    /// The action failed, so nothing was waited for.
    #[error("action failed: {0}")]
    Action(E),
    /// The cancellation signal fired before the acknowledgment arrived.
    #[error("cancelled before acknowledgment: {0}")]
    Cancelled(R),
    /// The sequence space wrapped around onto this wait's sequence number
    /// while it was still pending, and a newer wait took over its slot.
    ///
    /// This means more than 65536 waits were outstanding at once.
    #[error("evicted by a newer wait after the sequence space wrapped around")]
    Evicted,
}

impl AckWaiter {
    /// Creates a waiter whose first sequence number is `Seq(0)`.
    ///
    /// This makes sequence numbers predictable; prefer [`AckWaiter::seeded`]
    /// for anything exposed to a network.
    #[must_use]
    pub fn new() -> Self {
        Self::with_first_seq(Seq(0))
    }

    /// Creates a waiter whose first sequence number is `first`.
    #[must_use]
    pub fn with_first_seq(first: Seq) -> Self {
        let slots = iter::repeat_with(Slot::default).take(NUM_SLOTS).collect();
        Self {
            state: Mutex::new(State {
                next_seq: first,
                next_ticket: 0,
                in_flight: 0,
                slots,
            }),
        }
    }

    /// Creates a waiter whose first sequence number is drawn from the OS
    /// random source.
    ///
    /// # Errors
    ///
    /// Errors if the random source is unavailable.
    pub fn seeded() -> Result<Self, SeedError> {
        Seq::random().map(Self::with_first_seq)
    }

    /// Creates a waiter from a [`WaiterConfig`].
    ///
    /// # Errors
    ///
    /// Errors if the config asks for a random first sequence number, and the
    /// random source is unavailable.
    pub fn from_config(config: &WaiterConfig) -> Result<Self, SeedError> {
        config.first_seq.resolve().map(Self::with_first_seq)
    }

    /// Moves the sequence cursor to a value drawn from the OS random source.
    ///
    /// Call this once on startup, before the waiter is shared. Taking
    /// `&mut self` guarantees that no wait is in progress.
    ///
    /// # Errors
    ///
    /// Errors if the random source is unavailable, in which case the cursor
    /// is left as it was. Don't use the waiter on a network after this fails.
    pub fn reseed(&mut self) -> Result<(), SeedError> {
        let seq = Seq::random()?;
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .next_seq = seq;
        Ok(())
    }

    /// Gets the sequence number the next wait will be allocated.
    #[must_use]
    pub fn next_seq(&self) -> Seq {
        self.state().next_seq
    }

    /// Gets how many slots are currently occupied by waits.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state().in_flight
    }

    /// Performs `action` with a freshly allocated sequence number, then waits
    /// until that sequence number is [acknowledged], or `cancel` fires.
    ///
    /// `action` runs outside of any lock, so a slow action does not hold up
    /// other waits or acknowledgments. If it fails, its error is returned
    /// as-is and nothing is waited for.
    ///
    /// If the acknowledgment and the cancellation are both ready, the
    /// acknowledgment wins.
    ///
    /// On every way out of this function - acknowledged, cancelled, action
    /// failure, or the returned future being dropped - the sequence number's
    /// slot is released, so it can be allocated again.
    ///
    /// # Errors
    ///
    /// - [`WaitError::Action`] if `action` failed
    /// - [`WaitError::Cancelled`] with the output of `cancel` if it fired
    ///   first
    /// - [`WaitError::Evicted`] if more than 65536 waits were outstanding, and
    ///   a newer one took over this one's slot
    ///
    /// [acknowledged]: AckWaiter::done
    pub async fn wait<C, F, E>(&self, cancel: C, action: F) -> Result<(), WaitError<E, C::Output>>
    where
        C: Future,
        F: FnOnce(Seq) -> Result<(), E>,
    {
        let cancel = pin!(cancel);
        let slot = self.install();
        action(slot.seq).map_err(WaitError::Action)?;
        slot.until_acked(cancel).await
    }

    /// Like [`AckWaiter::wait`], but `action` is asynchronous.
    ///
    /// `cancel` also interrupts the action itself: if it fires while the
    /// action is still running, the action's future is dropped and this
    /// returns [`WaitError::Cancelled`].
    ///
    /// # Errors
    ///
    /// See [`AckWaiter::wait`].
    pub async fn wait_async<C, F, A, E>(
        &self,
        cancel: C,
        action: F,
    ) -> Result<(), WaitError<E, C::Output>>
    where
        C: Future,
        F: FnOnce(Seq) -> A,
        A: Future<Output = Result<(), E>>,
    {
        let mut cancel = pin!(cancel);
        let slot = self.install();
        let dispatch = pin!(action(slot.seq));
        match future::select(dispatch, cancel.as_mut()).await {
            Either::Left((result, _)) => result.map_err(WaitError::Action)?,
            Either::Right((reason, _)) => {
                debug!(seq = %slot.seq, "Cancelled while dispatching");
                return Err(WaitError::Cancelled(reason));
            }
        }
        slot.until_acked(cancel).await
    }

    /// Acknowledges `seq`, waking the wait which was allocated it.
    ///
    /// This is the entry point for the transport's receive path, called once
    /// it has decoded the sequence number of an acknowledgment.
    ///
    /// Returns `true` if a wait was pending on `seq` and has now been woken.
    /// If no wait is pending on `seq` - it was never allocated, has already
    /// been acknowledged, or gave up - this does nothing and returns `false`.
    /// This never blocks on the woken wait.
    ///
    /// An acknowledgment which lands after the action ran, but before the
    /// wait started listening, is kept until the wait picks it up.
    pub fn done(&self, seq: Seq) -> bool {
        let mut state = self.state();
        let slot = &mut state.slots[seq.index()];
        match mem::take(slot) {
            Slot::Waiting { ticket, send_ack } => {
                *slot = Slot::Acked { ticket };
                drop(state);
                // the receiver is closed if the wait is already tearing down
                let delivered = send_ack.send(()).is_ok();
                if delivered {
                    trace!(%seq, "Delivered ack");
                } else {
                    trace!(%seq, "Wait gave up before ack, ignoring");
                }
                delivered
            }
            other => {
                *slot = other;
                drop(state);
                trace!(%seq, "No wait pending for ack, ignoring");
                false
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // slots are only ever replaced wholesale, so a panic elsewhere while
        // holding the lock can't leave the table half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self) -> InstalledSlot<'_> {
        let (send_ack, recv_ack) = oneshot::channel();

        let mut guard = self.state();
        let state = &mut *guard;
        let seq = state.next_seq;
        state.next_seq = seq.next();
        let ticket = state.next_ticket;
        state.next_ticket = ticket.wrapping_add(1);

        let prev = mem::replace(
            &mut state.slots[seq.index()],
            Slot::Waiting { ticket, send_ack },
        );
        let evicted = prev.ticket().is_some();
        if !evicted {
            state.in_flight += 1;
        }
        drop(guard);
        // dropping an evicted `send_ack` wakes its wait outside of the lock
        drop(prev);

        if evicted {
            warn!(%seq, "Sequence space wrapped onto a pending wait, evicting it");
        }
        trace!(%seq, "Allocated");

        InstalledSlot {
            waiter: self,
            seq,
            ticket,
            recv_ack,
        }
    }
}

impl Default for AckWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AckWaiter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state();
        f.debug_struct("AckWaiter")
            .field("next_seq", &state.next_seq)
            .field("in_flight", &state.in_flight)
            .finish_non_exhaustive()
    }
}

/// Slot owned by one in-progress wait, released when this is dropped.
struct InstalledSlot<'w> {
    waiter: &'w AckWaiter,
    seq: Seq,
    ticket: Ticket,
    recv_ack: oneshot::Receiver<()>,
}

impl InstalledSlot<'_> {
    async fn until_acked<E, R>(
        mut self,
        cancel: impl Future<Output = R> + Unpin,
    ) -> Result<(), WaitError<E, R>> {
        let seq = self.seq;
        match future::select(&mut self.recv_ack, cancel).await {
            Either::Left((Ok(()), _)) => {
                trace!(%seq, "Acknowledged");
                Ok(())
            }
            Either::Left((Err(oneshot::Canceled), _)) => {
                warn!(%seq, "Evicted before acknowledgment");
                Err(WaitError::Evicted)
            }
            Either::Right((reason, _)) => {
                debug!(%seq, "Cancelled before acknowledgment");
                Err(WaitError::Cancelled(reason))
            }
        }
    }
}

impl Drop for InstalledSlot<'_> {
    fn drop(&mut self) {
        self.recv_ack.close();

        let mut guard = self.waiter.state();
        let state = &mut *guard;
        let slot = &mut state.slots[self.seq.index()];
        if slot.ticket() != Some(self.ticket) {
            // evicted; the slot belongs to a newer wait now
            return;
        }
        let prev = mem::take(slot);
        state.in_flight -= 1;
        drop(guard);
        drop(prev);
        trace!(seq = %self.seq, "Released");
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::cancel::{self, CancelReason, Cancellation},
        core::convert::Infallible,
        futures::{executor::block_on, poll},
    };

    type Result<E = Infallible> = core::result::Result<(), WaitError<E, CancelReason>>;

    fn ok(_: Seq) -> core::result::Result<(), Infallible> {
        Ok(())
    }

    #[test]
    fn ack_completes_wait_and_advances_cursor() {
        let waiter = AckWaiter::with_first_seq(Seq(100));
        let mut sent = None;
        let result: Result = block_on(waiter.wait(Cancellation::never(), |seq| {
            sent = Some(seq);
            waiter.done(seq);
            Ok(())
        }));
        assert_eq!(result, Ok(()));
        assert_eq!(sent, Some(Seq(100)));
        assert_eq!(waiter.next_seq(), Seq(101));
        assert_eq!(waiter.in_flight(), 0);
    }

    #[test]
    fn already_cancelled_releases_slot() {
        let waiter = AckWaiter::with_first_seq(Seq(7));
        let result: Result = block_on(waiter.wait(Cancellation::cancelled(), ok));
        assert_eq!(result, Err(WaitError::Cancelled(CancelReason::Cancelled)));
        assert_eq!(waiter.in_flight(), 0);
        assert!(!waiter.done(Seq(7)));
    }

    #[test]
    fn ack_wins_over_ready_cancellation() {
        let waiter = AckWaiter::new();
        let result: Result = block_on(waiter.wait(Cancellation::cancelled(), |seq| {
            waiter.done(seq);
            Ok(())
        }));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn action_error_is_returned_and_slot_released() {
        let waiter = AckWaiter::with_first_seq(Seq(5));
        let result: Result<&str> =
            block_on(waiter.wait(Cancellation::never(), |_| Err("transport down")));
        assert_eq!(result, Err(WaitError::Action("transport down")));
        assert_eq!(waiter.in_flight(), 0);
        assert!(!waiter.done(Seq(5)));
    }

    #[test]
    fn async_action_error_releases_slot() {
        let waiter = AckWaiter::new();
        let result: Result<&str> = block_on(
            waiter.wait_async(Cancellation::never(), |_| async { Err("transport down") }),
        );
        assert_eq!(result, Err(WaitError::Action("transport down")));
        assert_eq!(waiter.in_flight(), 0);
    }

    #[test]
    fn cancellation_interrupts_async_action() {
        let waiter = AckWaiter::new();
        let result: Result = block_on(waiter.wait_async(Cancellation::cancelled(), |_| {
            future::pending::<core::result::Result<(), Infallible>>()
        }));
        assert_eq!(result, Err(WaitError::Cancelled(CancelReason::Cancelled)));
        assert_eq!(waiter.in_flight(), 0);
    }

    #[test]
    fn done_without_wait_is_noop() {
        let waiter = AckWaiter::new();
        assert!(!waiter.done(Seq(0)));
        assert!(!waiter.done(Seq::MAX));
        assert_eq!(waiter.in_flight(), 0);
        assert_eq!(waiter.next_seq(), Seq(0));
    }

    #[test]
    fn done_only_wakes_matching_wait() {
        let waiter = AckWaiter::with_first_seq(Seq(10));
        block_on(async {
            let mut first = pin!(waiter.wait(Cancellation::never(), ok));
            let mut second = pin!(waiter.wait(Cancellation::never(), ok));
            assert!(poll!(first.as_mut()).is_pending());
            assert!(poll!(second.as_mut()).is_pending());
            assert_eq!(waiter.in_flight(), 2);

            assert!(waiter.done(Seq(11)));
            // second ack for the same seq is ignored
            assert!(!waiter.done(Seq(11)));
            assert!(poll!(first.as_mut()).is_pending());
            assert_eq!(second.await, Ok(()));

            assert!(waiter.done(Seq(10)));
            assert_eq!(first.await, Ok(()));
        });
        assert_eq!(waiter.in_flight(), 0);
    }

    #[test]
    fn done_after_wait_stops_listening_is_not_delivered() {
        let waiter = AckWaiter::with_first_seq(Seq(9));
        let mut slot = waiter.install();
        // same state as a wait which is part way through releasing its slot
        slot.recv_ack.close();
        assert!(!waiter.done(Seq(9)));
        drop(slot);
        assert_eq!(waiter.in_flight(), 0);
        assert!(!waiter.done(Seq(9)));
    }

    #[test]
    fn dropped_wait_releases_slot() {
        let waiter = AckWaiter::with_first_seq(Seq(3));
        block_on(async {
            let mut wait = Box::pin(waiter.wait(Cancellation::never(), ok));
            assert!(poll!(wait.as_mut()).is_pending());
            assert_eq!(waiter.in_flight(), 1);
            drop(wait);
        });
        assert_eq!(waiter.in_flight(), 0);
        assert!(!waiter.done(Seq(3)));
    }

    #[test]
    fn cancel_from_elsewhere() {
        let waiter = AckWaiter::new();
        let (canceller, cancellation) = cancel::pair();
        block_on(async {
            let mut wait = pin!(waiter.wait(cancellation, ok));
            assert!(poll!(wait.as_mut()).is_pending());
            canceller.cancel();
            assert_eq!(
                wait.await,
                Err(WaitError::Cancelled(CancelReason::Cancelled))
            );
        });
    }

    #[test]
    fn wraparound_evicts_pending_wait() {
        let waiter = AckWaiter::with_first_seq(Seq::MAX);
        block_on(async {
            let mut old = pin!(waiter.wait(Cancellation::never(), ok));
            assert!(poll!(old.as_mut()).is_pending());

            // move the cursor all the way around without leaving anything pending
            for _ in 0..u16::MAX {
                let result: Result = waiter
                    .wait(Cancellation::never(), |seq| {
                        waiter.done(seq);
                        Ok(())
                    })
                    .await;
                assert_eq!(result, Ok(()));
            }
            assert_eq!(waiter.next_seq(), Seq::MAX);

            let mut new = pin!(waiter.wait(Cancellation::never(), ok));
            assert!(poll!(new.as_mut()).is_pending());
            assert_eq!(old.await, Err(WaitError::Evicted));

            // the evicted wait must not have cleared the newer one's slot
            assert_eq!(waiter.in_flight(), 1);
            assert!(waiter.done(Seq::MAX));
            assert_eq!(new.await, Ok(()));
        });
        assert_eq!(waiter.in_flight(), 0);
    }

    #[test]
    fn reseed_moves_cursor() {
        let mut seqs = (0..8)
            .map(|_| {
                let mut waiter = AckWaiter::new();
                waiter.reseed().unwrap();
                waiter.next_seq()
            })
            .collect::<Vec<_>>();
        seqs.dedup();
        assert!(seqs.len() > 1);
    }

    #[test]
    fn debug_does_not_dump_table() {
        let waiter = AckWaiter::with_first_seq(Seq(42));
        let debug = format!("{waiter:?}");
        assert!(debug.contains("Seq(42)"));
        assert!(debug.len() < 128);
    }
}
