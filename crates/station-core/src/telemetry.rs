use crate::actuator::Motor;
use crate::command::TopicTable;
use crate::plant::Plant;
use serde::{Deserialize, Serialize};

/// Current below this floor is residual noise; the unit reports OFF.
pub const ON_THRESHOLD_A: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunIndicator {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl RunIndicator {
    fn from_bool(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultIndicator {
    #[serde(rename = "SI")]
    Si,
    #[serde(rename = "NO")]
    No,
}

/// Wire record for one motor, shaped like the station's dashboard
/// expects: `{"estado","falla","corriente","timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorReading {
    pub estado: RunIndicator,
    pub falla: FaultIndicator,
    pub corriente: f64,
    pub timestamp: String,
}

impl MotorReading {
    pub fn from_motor(motor: &Motor, timestamp: &str) -> Self {
        let on = motor.running() && motor.current_a() > ON_THRESHOLD_A;
        Self {
            estado: RunIndicator::from_bool(on),
            falla: if motor.fault() {
                FaultIndicator::Si
            } else {
                FaultIndicator::No
            },
            corriente: round2(motor.current_a()),
            timestamp: timestamp.to_string(),
        }
    }
}

/// Wire record for the recloser: ON means closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecloserReading {
    pub estado: RunIndicator,
    pub timestamp: String,
}

/// Plant-level ambient packet. Carries no timestamp; consumers use the
/// envelope's wall-clock stamp instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientReading {
    pub estado: RunIndicator,
    pub temp_amb: f64,
    pub humedad: f64,
    pub nivel_tanque: i64,
    pub consumo_kwh: f64,
}

/// One publishable unit of telemetry.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Encode the whole plant into publishable envelopes. Pure: no clock,
/// no I/O; the caller captures the timestamp once per tick.
pub fn encode_plant(plant: &Plant, topics: &TopicTable, timestamp: &str) -> Vec<Envelope> {
    let mut out = Vec::new();

    for motor in plant.motors() {
        let reading = MotorReading::from_motor(motor, timestamp);
        if let Ok(payload) = serde_json::to_value(&reading) {
            out.push(Envelope {
                topic: topics.motor_telemetry(motor.id()),
                payload,
            });
        }
    }

    let reco = RecloserReading {
        estado: RunIndicator::from_bool(plant.recloser().closed()),
        timestamp: timestamp.to_string(),
    };
    if let Ok(payload) = serde_json::to_value(&reco) {
        out.push(Envelope {
            topic: topics.recloser_state(),
            payload,
        });
    }

    let ambient = plant.ambient();
    let packet = AmbientReading {
        estado: RunIndicator::from_bool(plant.any_motor_running()),
        temp_amb: round1(ambient.temp_amb_c()),
        humedad: ambient.humidity_pct().round(),
        nivel_tanque: ambient.tank_level_l() as i64,
        consumo_kwh: round2(ambient.power_kw(plant.total_current_a())),
    };
    if let Ok(payload) = serde_json::to_value(&packet) {
        out.push(Envelope {
            topic: topics.plant_telemetry(),
            payload,
        });
    }

    out
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
