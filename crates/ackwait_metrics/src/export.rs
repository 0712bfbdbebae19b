use {
    crate::{Delta, Metrics, names::*},
    metrics::{Unit, counter, describe_counter, describe_gauge, gauge},
};

/// [`Metrics`] implementation which reports every figure to the installed
/// [`metrics`] recorder, under the names in [`names`](crate::names).
///
/// Install a recorder/exporter (e.g. a Prometheus exporter) before recording,
/// otherwise figures are dropped. Call [`ExportedMetrics::describe`] once
/// after installing it to attach descriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportedMetrics;

struct CycleNames {
    active: &'static str,
    success: &'static str,
    fail: &'static str,
}

const SESSIONS: CycleNames = CycleNames {
    active: ACTIVE_SESSIONS_COUNT,
    success: SESSION_SUCCESS_TOTAL,
    fail: SESSION_FAIL_TOTAL,
};

const STREAMS: CycleNames = CycleNames {
    active: ACTIVE_STREAMS_COUNT,
    success: STREAM_SUCCESS_TOTAL,
    fail: STREAM_FAIL_TOTAL,
};

impl ExportedMetrics {
    /// Creates a new exporting sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Describes every figure to the installed recorder.
    pub fn describe() {
        describe_gauge!(ACTIVE_SESSIONS_COUNT, Unit::Count, "Currently active sessions");
        describe_counter!(SESSION_SUCCESS_TOTAL, Unit::Count, "Successful sessions");
        describe_counter!(SESSION_FAIL_TOTAL, Unit::Count, "Failed sessions");
        describe_gauge!(ACTIVE_STREAMS_COUNT, Unit::Count, "Currently active streams");
        describe_counter!(STREAM_SUCCESS_TOTAL, Unit::Count, "Successful streams");
        describe_counter!(STREAM_FAIL_TOTAL, Unit::Count, "Failed streams");
        describe_gauge!(CLIENTS_COUNT, Unit::Count, "Connected clients");
        describe_gauge!(PACKETS_PER_SECOND, Unit::CountPerSecond, "Packet throughput");
    }
}

fn record(names: &CycleNames, delta: Delta) {
    match delta {
        Delta::Failed => counter!(names.fail).increment(1),
        Delta::Opened => {
            counter!(names.success).increment(1);
            gauge!(names.active).increment(1.0);
        }
        Delta::Closed => gauge!(names.active).decrement(1.0),
    }
}

impl Metrics for ExportedMetrics {
    fn record_session(&self, delta: Delta) {
        record(&SESSIONS, delta);
    }

    fn record_stream(&self, delta: Delta) {
        record(&STREAMS, delta);
    }

    #[expect(clippy::cast_precision_loss, reason = "gauges are f64")]
    fn set_clients_count(&self, count: i64) {
        gauge!(CLIENTS_COUNT).set(count as f64);
    }

    #[expect(clippy::cast_precision_loss, reason = "gauges are f64")]
    fn set_packets_per_second(&self, rate: i64) {
        gauge!(PACKETS_PER_SECOND).set(rate as f64);
    }
}
