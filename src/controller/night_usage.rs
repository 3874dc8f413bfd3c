use super::{Controller, Readings};

use chrono::NaiveTime;

pub const CONSUMPTION_THRESHOLD: f64 = 10.0;

/// Keeps the battery for the night: zero output during the day, follow the load otherwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NightUsage {
    morning_cutoff: NaiveTime,
    evening_rampup: NaiveTime,
    threshold: f64,
}

impl NightUsage {
    pub fn new(morning_cutoff: NaiveTime, evening_rampup: NaiveTime) -> Self {
        Self {
            morning_cutoff,
            evening_rampup,
            threshold: CONSUMPTION_THRESHOLD,
        }
    }

    /// Day hours are `[morning_cutoff, evening_rampup)`.
    pub fn is_day(&self, now: NaiveTime) -> bool {
        now >= self.morning_cutoff && now < self.evening_rampup
    }
}

impl Controller for NightUsage {
    fn compute(&self, r: &Readings, now: NaiveTime) -> Option<f64> {
        if self.is_day(now) {
            return if r.output_limit != 0.0 { Some(0.0) } else { None };
        }

        if r.house_power < 0.0 || r.house_power > self.threshold {
            return Some(r.output_limit + r.house_power);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn controller() -> NightUsage {
        NightUsage::new(at(8, 0), at(18, 30))
    }

    fn readings(house_power: f64, output_limit: f64) -> Readings {
        Readings {
            house_power,
            output_limit,
            ..Default::default()
        }
    }

    #[test]
    fn day_forces_zero_once() {
        let c = controller();

        assert_eq!(c.compute(&readings(300.0, 120.0), at(12, 0)), Some(0.0));
        assert_eq!(c.compute(&readings(300.0, 0.0), at(12, 0)), None);
    }

    #[test]
    fn window_is_half_open() {
        let c = controller();

        assert!(c.is_day(at(8, 0)));
        assert!(!c.is_day(at(18, 30)));
        assert!(!c.is_day(at(7, 59)));
    }

    #[test]
    fn night_follows_load() {
        let c = controller();

        assert_eq!(c.compute(&readings(50.0, 100.0), at(22, 0)), Some(150.0));
        assert_eq!(c.compute(&readings(-40.0, 100.0), at(2, 0)), Some(60.0));
        assert_eq!(c.compute(&readings(10.0, 100.0), at(22, 0)), None);
    }
}
