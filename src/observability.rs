use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking attempts. Labels: outcome (`created` or error kind).
pub const BOOKINGS_TOTAL: &str = "parkpass_bookings_total";

/// Histogram: end-to-end booking latency in seconds.
pub const BOOKING_DURATION_SECONDS: &str = "parkpass_booking_duration_seconds";

/// Counter: bounded increments refused because the slot was full.
pub const CAPACITY_REJECTIONS_TOTAL: &str = "parkpass_capacity_rejections_total";

/// Counter: reservations released after a failed pass write.
pub const COMPENSATIONS_TOTAL: &str = "parkpass_compensations_total";

/// Counter: receipts that could not be delivered.
pub const NOTIFY_FAILURES_TOTAL: &str = "parkpass_notify_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: open client connections.
pub const CONNECTIONS_ACTIVE: &str = "parkpass_connections_active";

/// Counter: connections accepted.
pub const CONNECTIONS_TOTAL: &str = "parkpass_connections_total";

/// Counter: connections refused at the connection limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "parkpass_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "parkpass_wal_flush_duration_seconds";

/// Histogram: events per WAL group-commit flush.
pub const WAL_FLUSH_BATCH_SIZE: &str = "parkpass_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
