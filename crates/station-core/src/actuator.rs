use crate::noise::Perturbation;

/// Duration of the inrush ramp after a start command, in seconds.
pub const RAMP_SECS: f64 = 3.0;
/// Peak inrush current as a multiple of nominal.
pub const INRUSH_FACTOR: f64 = 1.8;
/// Steady-state current variation band, as a fraction of nominal.
pub const STEADY_BAND: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct MotorConfig {
    pub id: String,
    pub name: String,
    pub nominal_current_a: f64,
    pub max_current_a: f64,
}

impl MotorConfig {
    pub fn new(id: &str, name: &str, nominal_current_a: f64, max_current_a: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            nominal_current_a,
            max_current_a,
        }
    }
}

/// Operating phase derived from the motor booleans plus elapsed run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorPhase {
    Stopped,
    Starting,
    Running,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    Start,
    Stop,
}

/// Momentary digital-output pulse recorded on each command transition.
/// Mirrors the station's physical DO wiring; informational only.
#[derive(Debug, Clone, Copy)]
pub struct ActuationPulse {
    pub kind: PulseKind,
    pub at_us: u64,
}

/// Simulated pump motor with digital run/fault state and an analog
/// current draw following an inrush ramp.
#[derive(Debug, Clone)]
pub struct Motor {
    config: MotorConfig,
    running: bool,
    fault: bool,
    current_a: f64,
    started_at_us: Option<u64>,
    last_pulse: Option<ActuationPulse>,
}

impl Motor {
    pub fn new(config: MotorConfig) -> Self {
        Self {
            config,
            running: false,
            fault: false,
            current_a: 0.0,
            started_at_us: None,
            last_pulse: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn fault(&self) -> bool {
        self.fault
    }

    pub fn current_a(&self) -> f64 {
        self.current_a
    }

    pub fn last_pulse(&self) -> Option<ActuationPulse> {
        self.last_pulse
    }

    /// Seconds the motor has been energized, `None` when not running.
    pub fn elapsed_run_secs(&self, now_us: u64) -> Option<f64> {
        self.started_at_us
            .filter(|_| self.running)
            .map(|start| now_us.saturating_sub(start) as f64 / 1_000_000.0)
    }

    pub fn phase(&self, now_us: u64) -> MotorPhase {
        if self.fault {
            return MotorPhase::Faulted;
        }
        if !self.running {
            return MotorPhase::Stopped;
        }
        match self.elapsed_run_secs(now_us) {
            Some(elapsed) if elapsed < RAMP_SECS => MotorPhase::Starting,
            _ => MotorPhase::Running,
        }
    }

    /// Start the motor. Valid from Stopped or Faulted; a start on a
    /// running motor is ignored so a replayed command cannot re-trigger
    /// the inrush ramp. Returns whether state changed.
    pub fn start(&mut self, now_us: u64) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.fault = false;
        self.started_at_us = Some(now_us);
        self.last_pulse = Some(ActuationPulse {
            kind: PulseKind::Start,
            at_us: now_us,
        });
        true
    }

    /// Stop the motor. Valid from any phase, idempotent on state; the
    /// stop pulse is recorded either way. Returns whether it was running.
    pub fn stop(&mut self, now_us: u64) -> bool {
        let was_running = self.running;
        self.running = false;
        self.current_a = 0.0;
        self.started_at_us = None;
        self.last_pulse = Some(ActuationPulse {
            kind: PulseKind::Stop,
            at_us: now_us,
        });
        was_running
    }

    /// Abnormal trip: latches the fault flag and de-energizes. Callers
    /// roll the probability; this only applies the transition.
    pub fn inject_fault(&mut self) {
        self.fault = true;
        self.running = false;
        self.current_a = 0.0;
        self.started_at_us = None;
    }

    /// Advance the analog current model one tick.
    ///
    /// Running motors ramp linearly to `INRUSH_FACTOR * nominal` over
    /// `RAMP_SECS`, then hold nominal with a bounded perturbation.
    /// Stopped motors read zero immediately, no decay.
    pub fn update_current(&mut self, now_us: u64, noise: &mut dyn Perturbation) {
        if !self.running {
            self.current_a = 0.0;
            return;
        }

        let elapsed = self.elapsed_run_secs(now_us).unwrap_or(0.0);
        let nominal = self.config.nominal_current_a;

        let raw = if elapsed < RAMP_SECS {
            nominal * INRUSH_FACTOR * (elapsed / RAMP_SECS)
        } else {
            nominal * (1.0 + noise.uniform(-STEADY_BAND, STEADY_BAND))
        };

        self.current_a = raw.clamp(0.0, self.config.max_current_a);
    }
}

/// Protective recloser upstream of the motor group.
///
/// Opening it (a trip) must stop every running motor; the cascade is
/// applied by the plant so it happens under one lock hold.
#[derive(Debug, Clone)]
pub struct Recloser {
    closed: bool,
}

impl Recloser {
    pub fn new() -> Self {
        Self { closed: true }
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Returns whether state changed.
    pub fn close(&mut self) -> bool {
        let changed = !self.closed;
        self.closed = true;
        changed
    }

    /// Returns whether state changed.
    pub fn trip(&mut self) -> bool {
        let changed = self.closed;
        self.closed = false;
        changed
    }
}

impl Default for Recloser {
    fn default() -> Self {
        Self::new()
    }
}
