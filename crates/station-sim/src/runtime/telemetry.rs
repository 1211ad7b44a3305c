use station_core::{Plant, PlantStats};
use station_io::metrics::{
    init_metrics, serve_metrics, FAULTS_INJECTED, MOTOR_CURRENT_A, MOTOR_FAULT, MOTOR_RUNNING,
    POWER_KW, RECLOSER_CLOSED, TANK_LEVEL_L, TICKS_EXECUTED,
};
use std::sync::{atomic::AtomicBool, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Mirror plant state into the Prometheus gauges a few times a second.
/// Counters advance by delta against the plant's cumulative stats, so
/// sampling slower than the tick never undercounts.
pub fn start_metrics_updater(
    plant: Arc<Mutex<Plant>>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last = PlantStats::default();
        while !stop.load(std::sync::atomic::Ordering::Relaxed) {
            let (motors, recloser_closed, tank_level, power_kw, stats) = {
                let plant = plant.lock().unwrap();
                let motors: Vec<(String, f64, bool, bool)> = plant
                    .motors()
                    .map(|m| (m.id().to_string(), m.current_a(), m.running(), m.fault()))
                    .collect();
                (
                    motors,
                    plant.recloser().closed(),
                    plant.ambient().tank_level_l(),
                    plant.ambient().power_kw(plant.total_current_a()),
                    plant.stats(),
                )
            };

            for (id, current, running, fault) in &motors {
                MOTOR_CURRENT_A.with_label_values(&[id.as_str()]).set(*current);
                MOTOR_RUNNING
                    .with_label_values(&[id.as_str()])
                    .set(if *running { 1.0 } else { 0.0 });
                MOTOR_FAULT
                    .with_label_values(&[id.as_str()])
                    .set(if *fault { 1.0 } else { 0.0 });
            }
            RECLOSER_CLOSED.set(if recloser_closed { 1.0 } else { 0.0 });
            TANK_LEVEL_L.set(tank_level);
            POWER_KW.set(power_kw);

            if stats.ticks > last.ticks {
                TICKS_EXECUTED.inc_by(stats.ticks - last.ticks);
            }
            if stats.faults_injected > last.faults_injected {
                FAULTS_INJECTED.inc_by(stats.faults_injected - last.faults_injected);
            }
            last = stats;

            thread::sleep(Duration::from_millis(200));
        }
    })
}
