use crate::item::CodeTable;
use crate::prelude::*;

/// Commands accepted on the command topics of writable items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    MinSoc,
    MaxSoc,
    MaxInverterInput,
    PvBrand,
    BypassMode,
    OutputLimit,
    BuzzerSwitch,
}

type Properties = Vec<(&'static str, i64)>;

impl Command {
    pub fn item(&self) -> Item {
        match self {
            Self::MinSoc => Item::MinSoc,
            Self::MaxSoc => Item::MaxSoc,
            Self::MaxInverterInput => Item::MaxInverterInput,
            Self::PvBrand => Item::PvBrand,
            Self::BypassMode => Item::BypassMode,
            Self::OutputLimit => Item::OutputLimit,
            Self::BuzzerSwitch => Item::BuzzerSwitch,
        }
    }

    /// Validates a command payload and returns the device properties to write.
    ///
    /// Nothing is written when this fails; some commands need other cached values to build a
    /// complete write and fail with `PrerequisiteMissing` until those have been reported.
    pub fn properties(&self, payload: &str, cache: &StateCache) -> Result<Properties, Error> {
        let payload = payload.trim();

        match self {
            Self::MinSoc => {
                let v = self.ranged(payload, 0, 30)?;
                Ok(vec![("minSoc", v * 10)])
            }
            Self::MaxSoc => {
                let v = self.ranged(payload, 70, 100)?;
                Ok(vec![("socSet", v * 10)])
            }
            Self::MaxInverterInput => {
                let v = self.ranged(payload, 0, 1200)?;
                // the device only accepts both values together
                let brand = self.cached_pv_brand(cache)?;
                Ok(vec![("inverseMaxPower", v), ("pvBrand", brand.code().into())])
            }
            Self::PvBrand => {
                let brand = PvBrand::from_str(payload)
                    .map_err(|err| Error::validation(self.item(), payload, err))?;
                let max = self.cached_max_inverter_input(cache)?;
                Ok(vec![("inverseMaxPower", max), ("pvBrand", brand.code().into())])
            }
            Self::BypassMode => {
                let mode = BypassMode::from_str(payload)
                    .map_err(|err| Error::validation(self.item(), payload, err))?;
                Ok(vec![("passMode", mode.code().into())])
            }
            Self::OutputLimit => {
                let max = self.cached_max_inverter_input(cache)?;
                let v = self.ranged(payload, 0, max)?;
                Ok(vec![("outputLimit", v)])
            }
            Self::BuzzerSwitch => Ok(vec![("buzzerSwitch", i64::from(payload == "ON"))]),
        }
    }

    fn ranged(&self, payload: &str, min: i64, max: i64) -> Result<i64, Error> {
        let v = parse_int(payload).ok_or_else(|| Error::validation(self.item(), payload, "not a number"))?;

        if v < min || v > max {
            return Err(Error::validation(
                self.item(),
                payload,
                format!("required {} <= value <= {}", min, max),
            ));
        }

        Ok(v)
    }

    fn cached_max_inverter_input(&self, cache: &StateCache) -> Result<i64, Error> {
        cache
            .number(&Item::MaxInverterInput)
            .map(|v| v as i64)
            .ok_or(Error::PrerequisiteMissing {
                item: self.item(),
                missing: Item::MaxInverterInput,
            })
    }

    fn cached_pv_brand(&self, cache: &StateCache) -> Result<PvBrand, Error> {
        cache
            .text(&Item::PvBrand)
            .and_then(|name| PvBrand::from_str(name).ok())
            .ok_or(Error::PrerequisiteMissing {
                item: self.item(),
                missing: Item::PvBrand,
            })
    }
}

/// Integer payload, tolerating a float rendering such as "150.0".
fn parse_int(payload: &str) -> Option<i64> {
    if let Ok(v) = payload.parse::<i64>() {
        return Some(v);
    }

    payload
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_soc_range() {
        let cache = StateCache::new();

        assert_eq!(
            Command::MinSoc.properties("15", &cache).unwrap(),
            vec![("minSoc", 150)]
        );
        assert!(matches!(
            Command::MinSoc.properties("35", &cache),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            Command::MinSoc.properties("-1", &cache),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            Command::MinSoc.properties("low", &cache),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn max_soc_range() {
        let cache = StateCache::new();

        assert_eq!(
            Command::MaxSoc.properties("90", &cache).unwrap(),
            vec![("socSet", 900)]
        );
        assert!(Command::MaxSoc.properties("60", &cache).is_err());
    }

    #[test]
    fn output_limit_needs_max_inverter_input() {
        let mut cache = StateCache::new();

        assert!(matches!(
            Command::OutputLimit.properties("100", &cache),
            Err(Error::PrerequisiteMissing {
                missing: Item::MaxInverterInput,
                ..
            })
        ));

        cache.set(Item::MaxInverterInput, StateValue::Int(600));
        assert_eq!(
            Command::OutputLimit.properties("150.0", &cache).unwrap(),
            vec![("outputLimit", 150)]
        );
        assert!(Command::OutputLimit.properties("601", &cache).is_err());
    }

    #[test]
    fn pv_brand_and_max_input_are_written_together() {
        let mut cache = StateCache::new();
        cache.set(Item::MaxInverterInput, StateValue::Int(600));

        assert_eq!(
            Command::PvBrand.properties("deye", &cache).unwrap(),
            vec![("inverseMaxPower", 600), ("pvBrand", 5)]
        );
        assert!(Command::MaxInverterInput.properties("800", &cache).is_err());

        cache.set(Item::PvBrand, "hoymiles".into());
        assert_eq!(
            Command::MaxInverterInput.properties("800", &cache).unwrap(),
            vec![("inverseMaxPower", 800), ("pvBrand", 1)]
        );
    }

    #[test]
    fn unknown_options_are_rejected() {
        let cache = StateCache::new();

        assert!(matches!(
            Command::BypassMode.properties("sometimes", &cache),
            Err(Error::Validation { .. })
        ));
        assert_eq!(
            Command::BypassMode.properties("always_on", &cache).unwrap(),
            vec![("passMode", 2)]
        );
    }

    #[test]
    fn buzzer_is_on_only_for_on() {
        let cache = StateCache::new();

        assert_eq!(
            Command::BuzzerSwitch.properties("ON", &cache).unwrap(),
            vec![("buzzerSwitch", 1)]
        );
        assert_eq!(
            Command::BuzzerSwitch.properties("on", &cache).unwrap(),
            vec![("buzzerSwitch", 0)]
        );
    }
}
