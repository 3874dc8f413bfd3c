use super::{Controller, Readings};

use chrono::NaiveTime;

/// Keeps the output at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AlwaysZero;

impl Controller for AlwaysZero {
    fn compute(&self, _readings: &Readings, _now: NaiveTime) -> Option<f64> {
        Some(0.0)
    }
}
