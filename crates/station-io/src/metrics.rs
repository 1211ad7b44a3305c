//! Prometheus metrics for the station simulator.
//!
//! Covers the tick loop, the command path and the physical state of the
//! motor group.

use prometheus::{Gauge, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Tick Loop Metrics
// ============================================================================

/// Simulation ticks executed
pub static TICKS_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter =
        IntCounter::new("station_ticks_executed_total", "Simulation ticks executed").unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Ticks skipped because the loop fell behind schedule
pub static TICKS_MISSED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "station_ticks_missed_total",
        "Simulation ticks skipped because the loop fell behind",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Random faults injected into running motors
pub static FAULTS_INJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "station_faults_injected_total",
        "Random faults injected into running motors",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Command Path Metrics
// ============================================================================

/// Commands applied to the plant
pub static COMMANDS_APPLIED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("station_commands_applied_total", "Commands applied").unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Commands dropped (unknown topic, bad payload, failed auth)
pub static COMMANDS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "station_commands_rejected_total",
        "Commands dropped before reaching the plant",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Commands with an invalid operator token
pub static AUTH_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "station_auth_failures_total",
        "Commands rejected for an invalid operator token",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Commands missing a required operator token
pub static AUTH_MISSING: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "station_auth_missing_total",
        "Commands rejected for a missing operator token",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Plant State Metrics
// ============================================================================

/// Per-motor current draw in amperes
pub static MOTOR_CURRENT_A: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauge = GaugeVec::new(
        Opts::new("station_motor_current_amperes", "Motor current draw"),
        &["motor"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Per-motor run state (1 = running)
pub static MOTOR_RUNNING: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauge = GaugeVec::new(
        Opts::new("station_motor_running", "Motor run state (1=running)"),
        &["motor"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Per-motor latched fault flag (1 = faulted)
pub static MOTOR_FAULT: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauge = GaugeVec::new(
        Opts::new("station_motor_fault", "Motor fault flag (1=faulted)"),
        &["motor"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Recloser position (1 = closed)
pub static RECLOSER_CLOSED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new("station_recloser_closed", "Recloser position (1=closed)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Buffer tank level in litres
pub static TANK_LEVEL_L: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new("station_tank_level_litres", "Buffer tank level").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Aggregate electrical power in kW
pub static POWER_KW: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new("station_power_kw", "Aggregate electrical power").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Bridge client connection status (1 = connected)
pub static BRIDGE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "station_bridge_connected",
        "Bridge client connection status (1=connected, 0=disconnected)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let metric_families = REGISTRY.gather();
                    match encoder.encode_to_string(&metric_families) {
                        Ok(body) => {
                            let response = Response::from_string(body).with_header(
                                tiny_http::Header::from_bytes(
                                    &b"Content-Type"[..],
                                    &b"text/plain; version=0.0.4"[..],
                                )
                                .unwrap(),
                            );
                            let _ = request.respond(response);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to encode metrics: {}", e);
                            let _ = request.respond(
                                Response::from_string("Internal Server Error")
                                    .with_status_code(500),
                            );
                        }
                    }
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the first tick has run.
                    if TICKS_EXECUTED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = TICKS_EXECUTED.get();
    let _ = TICKS_MISSED.get();
    let _ = FAULTS_INJECTED.get();
    let _ = COMMANDS_APPLIED.get();
    let _ = COMMANDS_REJECTED.get();
    let _ = AUTH_FAILURES.get();
    let _ = AUTH_MISSING.get();
    let _ = RECLOSER_CLOSED.get();
    let _ = TANK_LEVEL_L.get();
    let _ = POWER_KW.get();
    let _ = BRIDGE_CONNECTED.get();
}
