use chrono::{SecondsFormat, Utc};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time source for the simulation.
///
/// Monotonic microseconds drive the physics (startup ramps, fault
/// timing); wall-clock stamps only ever go on the wire.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    start: Instant,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since construction.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock microseconds since the Unix epoch, for envelopes and
    /// audit lines.
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }

    /// ISO-8601 wall-clock stamp, captured once per encode pass.
    pub fn wall_iso(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
