use crate::prelude::*;

use chrono::NaiveTime;

/// Where the control loop delivers a new output limit.
pub trait Actuator {
    fn set_output_limit(&mut self, value: f64);
}

/// Periodic output-limit regulation around a configured strategy.
#[derive(Clone, Debug)]
pub struct ControlLoop {
    strategy: Strategy,
    enabled: bool,
    max_output: f64,
}

impl ControlLoop {
    pub fn new(strategy: Strategy, max_output: f64) -> Self {
        Self {
            strategy,
            enabled: true,
            max_output,
        }
    }

    pub fn from_config(control: &config::Control) -> Result<Self, Error> {
        if !control.max_output().is_finite() || control.max_output() < 0.0 {
            return Err(Error::Configuration(format!(
                "max output {} is not a non-negative number",
                control.max_output()
            )));
        }
        if control.loop_period().is_zero() {
            return Err(Error::Configuration("loop period cannot be zero".to_owned()));
        }

        let strategy = Strategy::from_config(control)?;
        info!(
            "control loop using {} with max output {}",
            strategy.name(),
            control.max_output()
        );

        Ok(Self::new(strategy, control.max_output()))
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("automatic control {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    pub fn max_output(&self) -> f64 {
        self.max_output
    }

    /// Runs one cycle and returns the value written, if any.
    pub fn run_cycle(
        &self,
        readings: &Readings,
        now: NaiveTime,
        actuator: &mut dyn Actuator,
    ) -> Option<f64> {
        if !self.enabled {
            info!("automatic control is disabled, skipping cycle");
            return None;
        }

        debug!("control cycle with {:?}", readings);

        let candidate = if (readings.soc as i64) <= (readings.min_soc as i64) {
            if readings.output_limit > 0.0 {
                info!(
                    "battery at {}% is at or below minimum {}%, stopping output",
                    readings.soc, readings.min_soc
                );
                Some(0.0)
            } else {
                None
            }
        } else {
            self.strategy.compute(readings, now)
        };

        let value = candidate?.clamp(0.0, self.max_output);
        info!("setting output limit to {}", value);
        actuator.set_output_limit(value);

        Some(value)
    }
}
