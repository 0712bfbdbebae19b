#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

extern crate alloc;

pub mod names;

mod atomic;
mod delta;
mod export;
mod track;

pub use self::{atomic::*, delta::*, export::*, track::*};
use alloc::sync::Arc;

/// Sink for session and stream metrics.
///
/// A session or stream here is one request/acknowledge cycle, or something
/// built out of them. Each [`Delta`] is interpreted the same way for both:
/// - [`Delta::Failed`] counts a failed attempt
/// - [`Delta::Opened`] counts a successful attempt, which is now active
/// - [`Delta::Closed`] marks an active one as no longer active
pub trait Metrics: Send + Sync {
    /// Records a change to the sessions.
    fn record_session(&self, delta: Delta);

    /// Records a change to the streams.
    fn record_stream(&self, delta: Delta);

    /// Sets how many clients are currently connected.
    ///
    /// By default, this is ignored.
    fn set_clients_count(&self, count: i64) {
        let _ = count;
    }

    /// Sets the current packet throughput.
    ///
    /// By default, this is ignored.
    fn set_packets_per_second(&self, rate: i64) {
        let _ = rate;
    }
}

impl<M: Metrics + ?Sized> Metrics for &M {
    fn record_session(&self, delta: Delta) {
        (**self).record_session(delta);
    }

    fn record_stream(&self, delta: Delta) {
        (**self).record_stream(delta);
    }

    fn set_clients_count(&self, count: i64) {
        (**self).set_clients_count(count);
    }

    fn set_packets_per_second(&self, rate: i64) {
        (**self).set_packets_per_second(rate);
    }
}

impl<M: Metrics + ?Sized> Metrics for Arc<M> {
    fn record_session(&self, delta: Delta) {
        (**self).record_session(delta);
    }

    fn record_stream(&self, delta: Delta) {
        (**self).record_stream(delta);
    }

    fn set_clients_count(&self, count: i64) {
        (**self).set_clients_count(count);
    }

    fn set_packets_per_second(&self, rate: i64) {
        (**self).set_packets_per_second(rate);
    }
}

/// [`Metrics`] implementation which discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn record_session(&self, _: Delta) {}

    fn record_stream(&self, _: Delta) {}
}
