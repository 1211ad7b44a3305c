use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use station_core::{
    Perturbation, Plant, PlantConfig, SeededNoise, SimClock, TickConfig, TickLoop, TopicTable,
};
use station_io::audit::{AuditEventType, AuditLogger};
use station_io::auth::AuthConfig;
use station_io::bridge::{run_bridge, BridgeConfig};
use station_io::tls::TlsSettings;
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub fn run_from_args() {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return;
    }
    run(config);
}

pub fn run(config: RuntimeConfig) {
    // Initialize tracing
    init_tracing(config.json_logs);

    // Initialize metrics
    telemetry::init();
    let metrics_enabled = config.metrics_addr.is_some();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let plant_config = PlantConfig {
        fault_probability: config.fault_probability,
        ..PlantConfig::default()
    };
    let plant = Arc::new(Mutex::new(Plant::new(plant_config)));
    let motor_ids = plant.lock().unwrap().motor_ids();
    let topics = TopicTable::new(&config.namespace, &motor_ids);
    let clock = SimClock::new();

    let audit_logger = init_audit_logger(config.audit_path.as_ref());

    // Log startup
    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            clock.now_us(),
            clock.unix_us(),
            AuditEventType::SystemStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "namespace": config.namespace,
                "tick_ms": config.tick_ms,
                "bridge_enabled": config.bridge_enabled,
                "metrics_enabled": metrics_enabled,
            }),
        );
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_ctrl = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        stop_ctrl.store(true, std::sync::atomic::Ordering::Relaxed);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let (feed_tx, feed_rx) = mpsc::channel();

    info!(
        tick_ms = config.tick_ms,
        namespace = %config.namespace,
        motors = motor_ids.len(),
        fault_probability = config.fault_probability,
        seeded = config.seed.is_some(),
        "Starting tick loop"
    );

    let noise: Box<dyn Perturbation> = match config.seed {
        Some(seed) => Box::new(SeededNoise::new(seed)),
        None => Box::new(SeededNoise::from_entropy()),
    };
    let plant_tick = Arc::clone(&plant);
    let topics_tick = topics.clone();
    let stop_tick = Arc::clone(&stop);
    let tick_config = TickConfig {
        period: Duration::from_millis(config.tick_ms),
    };
    let tick_handle = thread::spawn(move || {
        let mut tick = TickLoop::new(plant_tick, topics_tick, noise, tick_config, clock, feed_tx);
        tick.run(&stop_tick);
        tick.stats().clone()
    });

    let bridge_handle = if config.bridge_enabled {
        let plant_bridge = Arc::clone(&plant);
        let stop_bridge = Arc::clone(&stop);
        let topics_bridge = topics.clone();
        let audit_bridge = audit_logger.clone();
        let bridge_config = build_bridge_config(&config);
        info!(addr = %bridge_config.bind_addr, "Starting bridge");
        Some(thread::spawn(move || {
            run_bridge(
                plant_bridge,
                topics_bridge,
                feed_rx,
                clock,
                bridge_config,
                stop_bridge,
                audit_bridge,
            );
        }))
    } else {
        info!("Bridge disabled");
        drop(feed_rx);
        None
    };

    let updater_handle = telemetry::start_metrics_updater(Arc::clone(&plant), Arc::clone(&stop));

    info!("Station simulator running. Send MARCHA/PARADA on the command topics.");

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    let stats = tick_handle.join().unwrap();
    if let Some(handle) = bridge_handle {
        let _ = handle.join();
    }
    let _ = updater_handle.join();

    info!(
        ticks_executed = stats.ticks_executed,
        ticks_missed = stats.ticks_missed,
        faults_injected = stats.faults_injected,
        max_jitter_us = stats.max_jitter_us,
        "Run complete"
    );

    // Log shutdown
    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            clock.now_us(),
            clock.unix_us(),
            AuditEventType::SystemShutdown,
            serde_json::json!({
                "ticks_executed": stats.ticks_executed,
                "ticks_missed": stats.ticks_missed,
                "faults_injected": stats.faults_injected,
            }),
        );
    }
}

fn build_bridge_config(config: &RuntimeConfig) -> BridgeConfig {
    BridgeConfig {
        bind_addr: config.bind_addr.clone(),
        tls: TlsSettings {
            enabled: config.tls_cert.is_some() && config.tls_key.is_some(),
            cert_path: config.tls_cert.clone().unwrap_or_default(),
            key_path: config.tls_key.clone().unwrap_or_default(),
        },
        auth: AuthConfig {
            enabled: config.auth_secret.is_some(),
            secret: config.auth_secret.clone().unwrap_or_default().into_bytes(),
            max_age_secs: config.auth_max_age_secs,
        },
        require_handshake: config.require_handshake,
    }
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> Option<Arc<AuditLogger>> {
    audit_path.map(|path| match AuditLogger::new(path) {
        Ok(logger) => {
            info!(path = %path.display(), "Audit logging enabled");
            Arc::new(logger)
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to initialize audit logger");
            panic!("Audit logging requested but failed to initialize: {}", e);
        }
    })
}
