use crate::noise::Perturbation;

/// Phase increment per tick for the slow ambient waves.
const PHASE_STEP: f64 = 0.1;
/// Litres drained per tick while any motor pumps.
const DRAIN_PER_TICK: f64 = 2.0;
/// Litres recovered per tick while the station is idle.
const REFILL_PER_TICK: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct AmbientConfig {
    pub tank_capacity_l: f64,
    pub tank_initial_l: f64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            tank_capacity_l: 5000.0,
            tank_initial_l: 2500.0,
        }
    }
}

/// Plant-level quantities that are not tied to a single motor: line
/// voltage, ambient temperature and humidity, and the buffer tank.
#[derive(Debug, Clone)]
pub struct Ambient {
    phase: f64,
    voltage_v: f64,
    temp_amb_c: f64,
    humidity_pct: f64,
    tank_level_l: f64,
    tank_capacity_l: f64,
}

impl Ambient {
    pub fn new(config: &AmbientConfig) -> Self {
        Self {
            phase: 0.0,
            voltage_v: 220.0,
            temp_amb_c: 24.0,
            humidity_pct: 60.0,
            tank_level_l: config.tank_initial_l.clamp(0.0, config.tank_capacity_l),
            tank_capacity_l: config.tank_capacity_l,
        }
    }

    /// Advance one tick. `pumping` is whether any motor is running.
    pub fn advance(&mut self, pumping: bool, noise: &mut dyn Perturbation) {
        self.phase += PHASE_STEP;

        // Mains voltage wanders around 220 V.
        self.voltage_v = 220.0 + self.phase.sin() * 2.0 + noise.uniform(-1.0, 1.0);

        // Slow independent waves for the weather channels.
        self.temp_amb_c = 24.0 + (self.phase * 0.5).sin() * 3.0;
        self.humidity_pct = 60.0 + (self.phase * 0.5).cos() * 5.0;

        // The tank drains while pumping and recovers while idle.
        let delta = if pumping {
            -DRAIN_PER_TICK
        } else {
            REFILL_PER_TICK
        };
        self.tank_level_l = (self.tank_level_l + delta).clamp(0.0, self.tank_capacity_l);
    }

    pub fn voltage_v(&self) -> f64 {
        self.voltage_v
    }

    pub fn temp_amb_c(&self) -> f64 {
        self.temp_amb_c
    }

    pub fn humidity_pct(&self) -> f64 {
        self.humidity_pct
    }

    pub fn tank_level_l(&self) -> f64 {
        self.tank_level_l
    }

    /// Aggregate electrical power at the given total current, in kW.
    pub fn power_kw(&self, total_current_a: f64) -> f64 {
        total_current_a * self.voltage_v / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoNoise;

    #[test]
    fn tank_drains_while_pumping_and_recovers_idle() {
        let mut ambient = Ambient::new(&AmbientConfig {
            tank_capacity_l: 100.0,
            tank_initial_l: 50.0,
        });
        ambient.advance(true, &mut NoNoise);
        assert_eq!(ambient.tank_level_l(), 48.0);
        ambient.advance(false, &mut NoNoise);
        assert_eq!(ambient.tank_level_l(), 49.0);
    }

    #[test]
    fn tank_level_stays_clamped() {
        let mut ambient = Ambient::new(&AmbientConfig {
            tank_capacity_l: 10.0,
            tank_initial_l: 1.0,
        });
        for _ in 0..20 {
            ambient.advance(true, &mut NoNoise);
        }
        assert_eq!(ambient.tank_level_l(), 0.0);
        for _ in 0..20 {
            ambient.advance(false, &mut NoNoise);
        }
        assert_eq!(ambient.tank_level_l(), 10.0);
    }

    #[test]
    fn voltage_oscillates_near_mains() {
        let mut ambient = Ambient::new(&AmbientConfig::default());
        for _ in 0..100 {
            ambient.advance(false, &mut NoNoise);
            assert!((217.0..=223.0).contains(&ambient.voltage_v()));
        }
    }

    #[test]
    fn power_tracks_current_and_voltage() {
        let ambient = Ambient::new(&AmbientConfig::default());
        let kw = ambient.power_kw(10.0);
        assert!((kw - 2.2).abs() < 1e-9);
    }
}
