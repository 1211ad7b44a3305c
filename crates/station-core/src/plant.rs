use crate::actuator::{Motor, MotorConfig, Recloser};
use crate::ambient::{Ambient, AmbientConfig};
use crate::command::{CommandAction, CommandTarget};
use crate::noise::Perturbation;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PlantConfig {
    pub motors: Vec<MotorConfig>,
    /// Per-tick probability that a running motor trips on a fault.
    pub fault_probability: f64,
    pub ambient: AmbientConfig,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            motors: vec![
                MotorConfig::new("m4", "MOTOR 4", 22.5, 40.0),
                MotorConfig::new("m5", "MOTOR 5", 15.0, 40.0),
                MotorConfig::new("m6", "MOTOR 6", 32.0, 50.0),
            ],
            fault_probability: 0.01,
            ambient: AmbientConfig::default(),
        }
    }
}

/// Counters accumulated over the life of the plant, sampled by the
/// metrics updater.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlantStats {
    pub ticks: u64,
    pub faults_injected: u64,
}

/// Outcome of one applied command, for logs and the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEffect {
    MotorStarted(String),
    MotorStopped(String),
    RecloserClosed,
    RecloserTripped { motors_stopped: Vec<String> },
    Unchanged,
}

/// The whole station: motor group, protective recloser, ambient state.
///
/// One instance lives behind a mutex shared by the tick loop and the
/// command path; every mutation happens through [`Plant::apply`] or
/// [`Plant::advance`] under that lock.
#[derive(Debug)]
pub struct Plant {
    motors: BTreeMap<String, Motor>,
    recloser: Recloser,
    ambient: Ambient,
    fault_probability: f64,
    stats: PlantStats,
}

impl Plant {
    pub fn new(config: PlantConfig) -> Self {
        let motors = config
            .motors
            .into_iter()
            .map(|m| (m.id.clone(), Motor::new(m)))
            .collect();
        Self {
            motors,
            recloser: Recloser::new(),
            ambient: Ambient::new(&config.ambient),
            fault_probability: config.fault_probability,
            stats: PlantStats::default(),
        }
    }

    pub fn motor(&self, id: &str) -> Option<&Motor> {
        self.motors.get(id)
    }

    pub fn motors(&self) -> impl Iterator<Item = &Motor> {
        self.motors.values()
    }

    pub fn motor_ids(&self) -> Vec<String> {
        self.motors.keys().cloned().collect()
    }

    pub fn recloser(&self) -> &Recloser {
        &self.recloser
    }

    pub fn ambient(&self) -> &Ambient {
        &self.ambient
    }

    pub fn stats(&self) -> PlantStats {
        self.stats
    }

    pub fn any_motor_running(&self) -> bool {
        self.motors.values().any(|m| m.running())
    }

    pub fn total_current_a(&self) -> f64 {
        self.motors.values().map(|m| m.current_a()).sum()
    }

    /// Apply one routed command. The recloser trip cascade runs inside
    /// this call, so no tick can observe a running motor behind an open
    /// recloser.
    pub fn apply(
        &mut self,
        target: &CommandTarget,
        action: CommandAction,
        now_us: u64,
    ) -> CommandEffect {
        match (target, action) {
            (CommandTarget::Motor(id), CommandAction::Engage) => {
                match self.motors.get_mut(id) {
                    Some(motor) => {
                        if motor.start(now_us) {
                            debug!(motor = %id, "start pulse applied");
                            CommandEffect::MotorStarted(id.clone())
                        } else {
                            CommandEffect::Unchanged
                        }
                    }
                    None => CommandEffect::Unchanged,
                }
            }
            (CommandTarget::Motor(id), CommandAction::Disengage) => {
                match self.motors.get_mut(id) {
                    Some(motor) => {
                        if motor.stop(now_us) {
                            debug!(motor = %id, "stop pulse applied");
                            CommandEffect::MotorStopped(id.clone())
                        } else {
                            CommandEffect::Unchanged
                        }
                    }
                    None => CommandEffect::Unchanged,
                }
            }
            (CommandTarget::Recloser, CommandAction::Engage) => {
                if self.recloser.close() {
                    CommandEffect::RecloserClosed
                } else {
                    CommandEffect::Unchanged
                }
            }
            (CommandTarget::Recloser, CommandAction::Disengage) => {
                let changed = self.recloser.trip();
                let mut motors_stopped = Vec::new();
                for motor in self.motors.values_mut() {
                    if motor.stop(now_us) {
                        motors_stopped.push(motor.id().to_string());
                    }
                }
                if changed || !motors_stopped.is_empty() {
                    warn!(stopped = motors_stopped.len(), "recloser tripped");
                    CommandEffect::RecloserTripped { motors_stopped }
                } else {
                    CommandEffect::Unchanged
                }
            }
        }
    }

    /// Advance the physical model one tick. Returns the number of
    /// faults injected.
    pub fn advance(&mut self, now_us: u64, noise: &mut dyn Perturbation) -> u32 {
        let mut faults = 0u32;
        for motor in self.motors.values_mut() {
            motor.update_current(now_us, noise);
            if motor.running() && noise.uniform(0.0, 1.0) < self.fault_probability {
                motor.inject_fault();
                faults += 1;
                warn!(motor = motor.id(), "random fault, motor tripped");
            }
        }
        let pumping = self.any_motor_running();
        self.ambient.advance(pumping, noise);
        self.stats.ticks += 1;
        self.stats.faults_injected += u64::from(faults);
        faults
    }
}
