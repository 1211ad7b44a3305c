pub mod actuator;
pub mod ambient;
pub mod clock;
pub mod command;
pub mod noise;
pub mod plant;
pub mod telemetry;
pub mod tick;

pub use actuator::{ActuationPulse, Motor, MotorConfig, MotorPhase, PulseKind, Recloser};
pub use ambient::{Ambient, AmbientConfig};
pub use clock::SimClock;
pub use command::{
    decode_action, CommandAction, CommandError, CommandTarget, TopicTable, RECLOSER_ID,
};
pub use noise::{NoNoise, Perturbation, SeededNoise};
pub use plant::{CommandEffect, Plant, PlantConfig, PlantStats};
pub use telemetry::{
    encode_plant, AmbientReading, Envelope, FaultIndicator, MotorReading, RecloserReading,
    RunIndicator, ON_THRESHOLD_A,
};
pub use tick::{NullSink, TelemetrySink, TickConfig, TickLoop, TickStats};
