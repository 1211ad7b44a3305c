use crate::clock::SimClock;
use crate::command::TopicTable;
use crate::noise::Perturbation;
use crate::plant::Plant;
use crate::telemetry::{encode_plant, Envelope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where encoded telemetry goes. Publishing is fire-and-forget: a sink
/// must never block the tick on delivery.
pub trait TelemetrySink: Send {
    fn publish(&mut self, envelope: Envelope);
}

impl TelemetrySink for mpsc::Sender<Envelope> {
    fn publish(&mut self, envelope: Envelope) {
        // A closed bridge just drops output.
        let _ = self.send(envelope);
    }
}

/// Sink for bridge-less runs.
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&mut self, _envelope: Envelope) {}
}

#[derive(Debug, Clone)]
pub struct TickConfig {
    pub period: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub ticks_executed: u64,
    pub ticks_missed: u64,
    pub faults_injected: u64,
    pub max_jitter_us: u64,
}

/// The periodic simulate-then-publish loop.
///
/// Shares the plant mutex with the command path; each tick advances the
/// physics and encodes telemetry under a single lock hold, then hands
/// the envelopes to the sink outside it. The schedule is monotonic
/// (`next_tick += period`) so one slow tick does not delay every later
/// one; whole missed periods are skipped and counted, not replayed.
pub struct TickLoop<S: TelemetrySink> {
    plant: Arc<Mutex<Plant>>,
    topics: TopicTable,
    noise: Box<dyn Perturbation>,
    config: TickConfig,
    clock: SimClock,
    sink: S,
    stats: TickStats,
}

impl<S: TelemetrySink> TickLoop<S> {
    pub fn new(
        plant: Arc<Mutex<Plant>>,
        topics: TopicTable,
        noise: Box<dyn Perturbation>,
        config: TickConfig,
        clock: SimClock,
        sink: S,
    ) -> Self {
        Self {
            plant,
            topics,
            noise,
            config,
            clock,
            sink,
            stats: TickStats::default(),
        }
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        let mut next_tick = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_tick {
                // Sleep in short slices so a stop request lands promptly.
                let remaining = next_tick - now;
                std::thread::sleep(remaining.min(Duration::from_millis(50)));
                continue;
            }

            let late = now.duration_since(next_tick);
            if late >= self.config.period {
                let skipped = (late.as_micros() / self.config.period.as_micros()) as u64;
                self.stats.ticks_missed += skipped;
                next_tick += self.config.period * skipped as u32;
                debug!(skipped, "tick loop fell behind, skipping forward");
            }
            let jitter_us = late.as_micros() as u64;
            self.stats.max_jitter_us = self.stats.max_jitter_us.max(jitter_us);

            let now_us = self.clock.now_us();
            let stamp = self.clock.wall_iso();

            let envelopes = {
                let mut plant = self.plant.lock().unwrap();
                let faults = plant.advance(now_us, self.noise.as_mut());
                self.stats.faults_injected += u64::from(faults);
                encode_plant(&plant, &self.topics, &stamp)
            };

            // Nothing leaves the station once shutdown has begun.
            if stop.load(Ordering::Relaxed) {
                break;
            }
            for envelope in envelopes {
                self.sink.publish(envelope);
            }

            self.stats.ticks_executed += 1;
            next_tick += self.config.period;
        }

        info!(
            ticks_executed = self.stats.ticks_executed,
            ticks_missed = self.stats.ticks_missed,
            faults_injected = self.stats.faults_injected,
            "tick loop stopped"
        );
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoNoise;
    use crate::plant::PlantConfig;

    struct VecSink(Arc<Mutex<Vec<Envelope>>>);

    impl TelemetrySink for VecSink {
        fn publish(&mut self, envelope: Envelope) {
            self.0.lock().unwrap().push(envelope);
        }
    }

    #[test]
    fn loop_publishes_until_stopped() {
        let plant = Arc::new(Mutex::new(Plant::new(PlantConfig::default())));
        let topics = TopicTable::new("bombeo", &plant.lock().unwrap().motor_ids());
        let collected = Arc::new(Mutex::new(Vec::new()));

        let mut tick = TickLoop::new(
            Arc::clone(&plant),
            topics,
            Box::new(NoNoise),
            TickConfig {
                period: Duration::from_millis(10),
            },
            SimClock::new(),
            VecSink(Arc::clone(&collected)),
        );

        let stop = Arc::new(AtomicBool::new(false));
        let stopper = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(120));
            stopper.store(true, Ordering::Relaxed);
        });

        tick.run(&stop);
        handle.join().unwrap();

        assert!(tick.stats().ticks_executed > 0);
        let collected = collected.lock().unwrap();
        // Five envelopes per tick: three motors, recloser, ambient.
        assert_eq!(
            collected.len() as u64,
            tick.stats().ticks_executed * 5
        );
    }

    #[test]
    fn stopped_loop_exits_without_a_tick() {
        let plant = Arc::new(Mutex::new(Plant::new(PlantConfig::default())));
        let topics = TopicTable::new("bombeo", &plant.lock().unwrap().motor_ids());

        let mut tick = TickLoop::new(
            Arc::clone(&plant),
            topics,
            Box::new(NoNoise),
            TickConfig::default(),
            SimClock::new(),
            NullSink,
        );

        let stop = AtomicBool::new(true);
        tick.run(&stop);
        assert_eq!(tick.stats().ticks_executed, 0);
    }
}
