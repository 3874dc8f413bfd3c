use super::{Controller, Readings};

use chrono::NaiveTime;

pub const CONSUMPTION_THRESHOLD: f64 = 5.0;

/// Follows the house load so that net grid flow stays near zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinimizeGrid {
    threshold: f64,
}

impl Default for MinimizeGrid {
    fn default() -> Self {
        Self {
            threshold: CONSUMPTION_THRESHOLD,
        }
    }
}

impl Controller for MinimizeGrid {
    fn compute(&self, r: &Readings, _now: NaiveTime) -> Option<f64> {
        // exporting: back off, but only while there is something to back off from
        if r.house_power < 0.0 && r.output_limit > 0.0 {
            return Some(r.output_limit + r.house_power);
        }

        if r.house_power > self.threshold {
            return Some(r.output_limit + r.house_power);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn readings(house_power: f64, output_limit: f64) -> Readings {
        Readings {
            house_power,
            output_limit,
            ..Default::default()
        }
    }

    #[test]
    fn exporting_reduces_limit() {
        assert_eq!(
            MinimizeGrid::default().compute(&readings(-50.0, 200.0), now()),
            Some(150.0)
        );
    }

    #[test]
    fn exporting_with_zero_limit_is_no_change() {
        assert_eq!(
            MinimizeGrid::default().compute(&readings(-50.0, 0.0), now()),
            None
        );
    }

    #[test]
    fn consumption_above_threshold_raises_limit() {
        assert_eq!(
            MinimizeGrid::default().compute(&readings(8.0, 100.0), now()),
            Some(108.0)
        );
        assert_eq!(
            MinimizeGrid::default().compute(&readings(3.0, 100.0), now()),
            None
        );
        assert_eq!(
            MinimizeGrid::default().compute(&readings(5.0, 100.0), now()),
            None
        );
    }
}
