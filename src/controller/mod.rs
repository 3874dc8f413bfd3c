use crate::prelude::*;

use chrono::NaiveTime;
use enum_dispatch::*;

mod always_zero;
mod minimize_grid;
mod night_usage;

pub use always_zero::AlwaysZero;
pub use minimize_grid::MinimizeGrid;
pub use night_usage::NightUsage;

/// Inputs to one control cycle. Anything unavailable reads as 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Readings {
    pub soc: f64,
    pub min_soc: f64,
    /// Net house power, negative while exporting.
    pub house_power: f64,
    pub battery_input_power: f64,
    pub battery_output_power: f64,
    pub output_limit: f64,
}

impl Readings {
    pub fn from_cache(cache: &StateCache, house_power: Option<f64>) -> Self {
        Self {
            soc: cache.number_or_zero(&Item::Battery),
            min_soc: cache.number_or_zero(&Item::MinSoc),
            house_power: house_power.unwrap_or(0.0),
            battery_input_power: cache.number_or_zero(&Item::BatteryInputPower),
            battery_output_power: cache.number_or_zero(&Item::BatteryOutputPower),
            output_limit: cache.number_or_zero(&Item::OutputLimit),
        }
    }
}

#[enum_dispatch]
pub trait Controller {
    /// Next output limit, or `None` to leave the current one alone. Never clamped here.
    fn compute(&self, readings: &Readings, now: NaiveTime) -> Option<f64>;
}

#[enum_dispatch(Controller)]
#[derive(Clone, Debug, PartialEq)]
pub enum Strategy {
    AlwaysZero(AlwaysZero),
    MinimizeGrid(MinimizeGrid),
    NightUsage(NightUsage),
}

impl Strategy {
    pub const NAMES: [&'static str; 3] = ["AlwaysZero", "MinimizeGrid", "NightUsage"];

    /// Resolves the configured controller name once, at startup.
    pub fn from_config(control: &config::Control) -> Result<Self, Error> {
        match control.controller() {
            "AlwaysZero" => Ok(AlwaysZero.into()),
            "MinimizeGrid" => Ok(MinimizeGrid::default().into()),
            "NightUsage" => {
                let (Some(morning_cutoff), Some(evening_rampup)) =
                    (control.morning_cutoff_time(), control.evening_rampup_time())
                else {
                    return Err(Error::Configuration(
                        "NightUsage needs morning_cutoff_time and evening_rampup_time".to_owned(),
                    ));
                };
                Ok(NightUsage::new(morning_cutoff, evening_rampup).into())
            }
            other => Err(Error::Configuration(format!(
                "unknown controller {:?}, expected one of {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AlwaysZero(_) => Self::NAMES[0],
            Self::MinimizeGrid(_) => Self::NAMES[1],
            Self::NightUsage(_) => Self::NAMES[2],
        }
    }
}
