use {
    crate::{Delta, Metrics},
    core::fmt,
};

/// Which figures a cycle passed to [`track`] is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Counted with [`Metrics::record_session`].
    Session,
    /// Counted with [`Metrics::record_stream`].
    Stream,
}

impl Kind {
    fn record<M: Metrics + ?Sized>(self, metrics: &M, delta: Delta) {
        match self {
            Self::Session => metrics.record_session(delta),
            Self::Stream => metrics.record_stream(delta),
        }
    }
}

/// Keeps a cycle counted as active, until this is dropped.
///
/// Created by [`track`].
#[must_use = "dropping this immediately counts the cycle as closed"]
pub struct Active<'m, M: Metrics + ?Sized> {
    metrics: &'m M,
    kind: Kind,
}

/// Records the outcome of a request cycle, such as the result of
/// `AckWaiter::wait`.
///
/// If `result` is [`Err`], the failure is recorded and the error is passed
/// through. If it is [`Ok`], the success is recorded, and the cycle is
/// counted as active until the returned [`Active`] is dropped.
///
/// # Errors
///
/// Passes through the error in `result`.
pub fn track<M, T, E>(metrics: &M, kind: Kind, result: Result<T, E>) -> Result<(T, Active<'_, M>), E>
where
    M: Metrics + ?Sized,
{
    match result {
        Ok(value) => {
            kind.record(metrics, Delta::Opened);
            Ok((value, Active { metrics, kind }))
        }
        Err(err) => {
            kind.record(metrics, Delta::Failed);
            Err(err)
        }
    }
}

impl<M: Metrics + ?Sized> Active<'_, M> {
    /// Gets which figures this cycle is counted under.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }
}

impl<M: Metrics + ?Sized> Drop for Active<'_, M> {
    fn drop(&mut self) {
        self.kind.record(self.metrics, Delta::Closed);
    }
}

impl<M: Metrics + ?Sized> fmt::Debug for Active<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Active")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
