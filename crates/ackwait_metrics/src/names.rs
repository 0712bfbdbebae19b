//! Names the figures are exported under.

/// Gauge of currently active sessions.
pub const ACTIVE_SESSIONS_COUNT: &str = "active_sessions_count";
/// Counter of successful sessions.
pub const SESSION_SUCCESS_TOTAL: &str = "session_success_total";
/// Counter of failed sessions.
pub const SESSION_FAIL_TOTAL: &str = "session_fail_total";
/// Gauge of currently active streams.
pub const ACTIVE_STREAMS_COUNT: &str = "active_streams_count";
/// Counter of successful streams.
pub const STREAM_SUCCESS_TOTAL: &str = "stream_success_total";
/// Counter of failed streams.
pub const STREAM_FAIL_TOTAL: &str = "stream_fail_total";
/// Gauge of currently connected clients.
pub const CLIENTS_COUNT: &str = "clients_count";
/// Gauge of packet throughput.
pub const PACKETS_PER_SECOND: &str = "packets_per_second";
