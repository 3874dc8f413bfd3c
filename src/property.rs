use crate::item::{CodeTable, PackState};
use crate::prelude::*;

use serde::Deserialize;
use serde_json::{Map, Value};

// PropertiesReport {{{
/// Body of a `properties/report` message.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesReport {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub pack_data: Option<Vec<PackReport>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackReport {
    pub sn: String,
    #[serde(default)]
    pub soc_level: Option<Value>,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub max_temp: Option<Value>,
} // }}}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Decode {
    Raw,
    Tenths,
    Bypass,
    PvBrand,
    Buzzer,
}

struct Mapping {
    key: &'static str,
    item: Item,
    decode: Decode,
    overflow: bool,
    state: bool,
}

const fn map(key: &'static str, item: Item, decode: Decode) -> Mapping {
    Mapping {
        key,
        item,
        decode,
        overflow: false,
        state: false,
    }
}

// power flows feed the aggregate state, some of them the overflow as well
const fn power(key: &'static str, item: Item, overflow: bool) -> Mapping {
    Mapping {
        key,
        item,
        decode: Decode::Raw,
        overflow,
        state: true,
    }
}

// Order matters: when two keys alias the same item the later entry wins for that report.
// pvPower* is what the Hub 1200 sends, solarPower* is what the Hub 2000 sends.
static PROPERTY_TABLE: [Mapping; 18] = [
    map("electricLevel", Item::Battery, Decode::Raw),
    map("outputHomePower", Item::HomeOutputPower, Decode::Raw),
    power("outputPackPower", Item::BatteryOutputPower, false),
    power("solarInputPower", Item::SolarInputPower, true),
    map("pvPower1", Item::SolarInput1Power, Decode::Raw),
    map("solarPower1", Item::SolarInput1Power, Decode::Raw),
    map("pvPower2", Item::SolarInput2Power, Decode::Raw),
    map("solarPower2", Item::SolarInput2Power, Decode::Raw),
    power("packInputPower", Item::BatteryInputPower, true),
    map("passMode", Item::BypassMode, Decode::Bypass),
    map("outputLimit", Item::OutputLimit, Decode::Raw),
    map("inverseMaxPower", Item::MaxInverterInput, Decode::Raw),
    map("minSoc", Item::MinSoc, Decode::Tenths),
    map("socSet", Item::MaxSoc, Decode::Tenths),
    map("remainOutTime", Item::BatteryRuntime, Decode::Raw),
    map("remainInputTime", Item::BatteryChargeTime, Decode::Raw),
    map("pvBrand", Item::PvBrand, Decode::PvBrand),
    map("buzzerSwitch", Item::BuzzerSwitch, Decode::Buzzer),
];

/// Result of decoding one properties report, before it touches any state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Translation {
    /// Direct item updates in table order.
    pub updates: Vec<(Item, StateValue)>,
    /// Per-pack updates, already filtered against the effective roster.
    pub pack_updates: Vec<(Item, StateValue)>,
    /// New roster when the report carried the canonical pack enumeration.
    pub roster: Option<Vec<String>>,
    pub recompute_overflow: bool,
    pub recompute_state: bool,
}

pub struct PropertyTranslator;

impl PropertyTranslator {
    /// Decodes a report against the current roster.
    ///
    /// Fields that fail to decode are logged and skipped, the rest of the report still applies.
    pub fn translate(report: &PropertiesReport, roster: Option<&[String]>) -> Translation {
        let mut t = Translation::default();

        let Some(properties) = &report.properties else {
            return t;
        };

        for mapping in PROPERTY_TABLE.iter() {
            let Some(raw) = properties.get(mapping.key) else {
                continue;
            };

            match Self::decode(mapping.decode, raw) {
                Ok(value) => {
                    t.updates.push((mapping.item.clone(), value));
                    t.recompute_overflow |= mapping.overflow;
                    t.recompute_state |= mapping.state;
                }
                Err(err) => warn!("ignoring {}={}: {}", mapping.key, raw, err),
            }
        }

        // packNum marks the one message that enumerates every installed pack
        if let Some(pack_num) = properties.get("packNum") {
            match &report.pack_data {
                Some(packs) => {
                    t.roster = Some(packs.iter().map(|p| p.sn.clone()).collect());
                }
                None if pack_num.as_i64() == Some(0) => t.roster = Some(Vec::new()),
                None => debug!("packNum={} without packData, roster unchanged", pack_num),
            }
        }

        let roster = t.roster.as_deref().or(roster).unwrap_or_default();
        for pack in report.pack_data.iter().flatten() {
            if !roster.contains(&pack.sn) {
                debug!("ignoring data for pack {} not in roster", pack.sn);
                continue;
            }
            t.pack_updates.extend(Self::decode_pack(pack));
        }

        t
    }

    fn decode(decode: Decode, raw: &Value) -> Result<StateValue> {
        let number = || StateValue::from_json(raw).ok_or_else(|| anyhow!("not a number"));
        let code = || raw.as_i64().ok_or_else(|| anyhow!("not an integer code"));

        Ok(match decode {
            Decode::Raw => number()?,
            Decode::Tenths => match number()?.as_f64() {
                Some(v) => StateValue::Float(v / 10.0),
                None => bail!("not a number"),
            },
            Decode::Bypass => match BypassMode::from_code(code()?) {
                Some(mode) => mode.name().into(),
                None => bail!("unknown bypass mode code"),
            },
            Decode::PvBrand => match PvBrand::from_code(code()?) {
                Some(brand) => brand.name().into(),
                None => bail!("unknown pv brand code"),
            },
            Decode::Buzzer => {
                if code()? == 1 {
                    "ON".into()
                } else {
                    "OFF".into()
                }
            }
        })
    }

    fn decode_pack(pack: &PackReport) -> Vec<(Item, StateValue)> {
        let mut r = Vec::new();

        if let Some(soc) = pack.soc_level.as_ref().and_then(StateValue::from_json) {
            r.push((Item::pack(&pack.sn, PackField::Soc), soc));
        }

        if let Some(state) = pack.state.as_ref() {
            let name = state.as_i64().map(PackState::name_for_code).unwrap_or("unknown");
            r.push((Item::pack(&pack.sn, PackField::State), name.into()));
        }

        if let Some(temp) = pack.max_temp.as_ref().and_then(Value::as_f64) {
            r.push((
                Item::pack(&pack.sn, PackField::Temperature),
                StateValue::Float(temp / 10.0),
            ));
        }

        r
    }

    /// Solar power beyond what goes into the battery, never negative.
    ///
    /// Uses `battery_output_power` (the device's `outputPackPower`, power flowing into the
    /// packs). Skipped until both operands have been seen.
    pub fn overflow(cache: &StateCache) -> Option<StateValue> {
        let solar = cache.number(&Item::SolarInputPower)?;
        let to_pack = cache.number(&Item::BatteryOutputPower)?;

        Some(StateValue::Float((solar - to_pack).max(0.0)))
    }

    /// Aggregate hub state, skipped until all three power flows have been seen.
    pub fn aggregate_state(cache: &StateCache) -> Option<StateValue> {
        // packInputPower is power coming out of the packs, outputPackPower power going in
        let discharge = cache.number(&Item::BatteryInputPower)?;
        let charge = cache.number(&Item::BatteryOutputPower)?;
        let solar = cache.number(&Item::SolarInputPower)?;

        let state = if discharge > 0.0 {
            "discharging"
        } else if charge > 0.0 {
            "charging"
        } else if solar > 0.0 {
            "solar_passthrough"
        } else {
            "idle"
        };

        Some(state.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: Value) -> PropertiesReport {
        serde_json::from_value(value).unwrap()
    }

    fn value_of<'a>(t: &'a Translation, item: &Item) -> Option<&'a StateValue> {
        t.updates.iter().rev().find(|(i, _)| i == item).map(|(_, v)| v)
    }

    #[test]
    fn scales_soc_limits_once() {
        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"minSoc": 155, "socSet": 1000}})),
            None,
        );

        assert_eq!(value_of(&t, &Item::MinSoc).unwrap().to_payload(), "15.5");
        assert_eq!(value_of(&t, &Item::MaxSoc).unwrap().to_payload(), "100");
        assert!(!t.recompute_overflow);
        assert!(!t.recompute_state);
    }

    #[test]
    fn later_alias_wins() {
        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"pvPower1": 100, "solarPower1": 120}})),
            None,
        );

        let ones: Vec<_> = t
            .updates
            .iter()
            .filter(|(i, _)| *i == Item::SolarInput1Power)
            .collect();
        assert_eq!(ones.len(), 2);
        assert_eq!(value_of(&t, &Item::SolarInput1Power), Some(&StateValue::Int(120)));
    }

    #[test]
    fn unknown_enum_code_only_drops_that_field() {
        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"passMode": 9, "pvBrand": 15, "buzzerSwitch": 1}})),
            None,
        );

        assert_eq!(value_of(&t, &Item::BypassMode), None);
        assert_eq!(value_of(&t, &Item::PvBrand), Some(&StateValue::from("bosswerk")));
        assert_eq!(value_of(&t, &Item::BuzzerSwitch), Some(&StateValue::from("ON")));
    }

    #[test]
    fn power_keys_set_triggers() {
        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"outputPackPower": 10}})),
            None,
        );
        assert!(t.recompute_state);
        assert!(!t.recompute_overflow);

        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"packInputPower": 10}})),
            None,
        );
        assert!(t.recompute_state);
        assert!(t.recompute_overflow);
    }

    #[test]
    fn pack_num_zero_confirms_empty_roster() {
        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"packNum": 0}})),
            None,
        );
        assert_eq!(t.roster, Some(vec![]));

        let t = PropertyTranslator::translate(
            &report(json!({"properties": {"packNum": 2}})),
            None,
        );
        assert_eq!(t.roster, None);
    }

    #[test]
    fn enumeration_applies_pack_fields_in_same_report() {
        let t = PropertyTranslator::translate(
            &report(json!({
                "properties": {"packNum": 1},
                "packData": [{"sn": "AB1", "socLevel": 57, "state": 2, "maxTemp": 2931}]
            })),
            None,
        );

        assert_eq!(t.roster, Some(vec!["AB1".to_string()]));
        assert_eq!(
            t.pack_updates,
            vec![
                (Item::pack("AB1", PackField::Soc), StateValue::Int(57)),
                (Item::pack("AB1", PackField::State), "discharging".into()),
                (
                    Item::pack("AB1", PackField::Temperature),
                    StateValue::Float(293.1)
                ),
            ]
        );
    }

    #[test]
    fn overflow_clamps_at_zero() {
        let mut cache = StateCache::new();
        assert_eq!(PropertyTranslator::overflow(&cache), None);

        cache.set(Item::SolarInputPower, StateValue::Int(800));
        cache.set(Item::BatteryOutputPower, StateValue::Int(300));
        assert_eq!(
            PropertyTranslator::overflow(&cache).unwrap().to_payload(),
            "500"
        );

        cache.set(Item::BatteryOutputPower, StateValue::Int(900));
        assert_eq!(PropertyTranslator::overflow(&cache).unwrap().to_payload(), "0");
    }
}
