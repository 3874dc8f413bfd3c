use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::str::FromStr;

// Item {{{
/// Canonical state items published by the bridge.
///
/// The fixed variants cover the hub itself; `Pack` items are created per battery pack once
/// the pack roster is known.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {
    Battery,
    State,
    HomeOutputPower,
    BatteryOutputPower,
    BatteryInputPower,
    SolarInputPower,
    SolarInput1Power,
    SolarInput2Power,
    SolarOverflowPower,
    BatteryChargeTime,
    BatteryRuntime,
    MinSoc,
    MaxSoc,
    MaxInverterInput,
    OutputLimit,
    BypassMode,
    PvBrand,
    BuzzerSwitch,
    Pack(String, PackField),
}

impl Item {
    pub fn pack(serial: &str, field: PackField) -> Self {
        Self::Pack(serial.to_owned(), field)
    }

    /// Stable identifier used in state topics, object ids and unique ids.
    pub fn key(&self) -> String {
        use Item::*;

        let key = match self {
            Battery => "battery",
            State => "state",
            HomeOutputPower => "home_output_power",
            BatteryOutputPower => "battery_output_power",
            BatteryInputPower => "battery_input_power",
            SolarInputPower => "solar_input_power",
            SolarInput1Power => "solar_input_1_power",
            SolarInput2Power => "solar_input_2_power",
            SolarOverflowPower => "solar_overflow_power",
            BatteryChargeTime => "battery_charge_time",
            BatteryRuntime => "battery_runtime",
            MinSoc => "min_soc",
            MaxSoc => "max_soc",
            MaxInverterInput => "max_inverter_input",
            OutputLimit => "output_limit",
            BypassMode => "bypass_mode",
            PvBrand => "pv_brand",
            BuzzerSwitch => "buzzer_switch",
            Pack(serial, field) => return format!("pack_{}_{}", serial, field.suffix()),
        };

        key.to_owned()
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
} // }}}

// PackField {{{
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackField {
    Soc,
    State,
    Temperature,
}

impl PackField {
    pub const ALL: [PackField; 3] = [PackField::Soc, PackField::State, PackField::Temperature];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Soc => "soc",
            Self::State => "state",
            Self::Temperature => "temperature",
        }
    }
} // }}}

/// Enumerations the device transmits as small integer codes and Home Assistant shows by name.
///
/// code -> variant goes through `TryFromPrimitive`, variant -> code through `IntoPrimitive`,
/// and the name mapping is an explicit match in both directions.
pub trait CodeTable: Sized + Copy + Into<u8> + TryFrom<u8> + FromStr + 'static {
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;

    fn code(&self) -> u8 {
        (*self).into()
    }

    fn from_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(|c| Self::try_from(c).ok())
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.name()).collect()
    }
}

// BypassMode {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BypassMode {
    Automatic = 0,
    AlwaysOff = 1,
    AlwaysOn = 2,
}

impl CodeTable for BypassMode {
    const ALL: &'static [Self] = &[Self::Automatic, Self::AlwaysOff, Self::AlwaysOn];

    fn name(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::AlwaysOff => "always_off",
            Self::AlwaysOn => "always_on",
        }
    }
}

impl FromStr for BypassMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" => Ok(Self::Automatic),
            "always_off" => Ok(Self::AlwaysOff),
            "always_on" => Ok(Self::AlwaysOn),
            _ => Err(anyhow::anyhow!(
                "unknown bypass mode {}, expected one of {}",
                s,
                Self::names().join(", ")
            )),
        }
    }
} // }}}

// PvBrand {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PvBrand {
    Other = 0,
    Hoymiles = 1,
    Enphase = 2,
    Apsystems = 3,
    Anker = 4,
    Deye = 5,
    Bosswerk = 15,
}

impl CodeTable for PvBrand {
    const ALL: &'static [Self] = &[
        Self::Other,
        Self::Hoymiles,
        Self::Enphase,
        Self::Apsystems,
        Self::Anker,
        Self::Deye,
        Self::Bosswerk,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Other => "other",
            Self::Hoymiles => "hoymiles",
            Self::Enphase => "enphase",
            Self::Apsystems => "apsystems",
            Self::Anker => "anker",
            Self::Deye => "deye",
            Self::Bosswerk => "bosswerk",
        }
    }
}

impl FromStr for PvBrand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "other" => Ok(Self::Other),
            "hoymiles" => Ok(Self::Hoymiles),
            "enphase" => Ok(Self::Enphase),
            "apsystems" => Ok(Self::Apsystems),
            "anker" => Ok(Self::Anker),
            "deye" => Ok(Self::Deye),
            "bosswerk" => Ok(Self::Bosswerk),
            _ => Err(anyhow::anyhow!(
                "unknown pv brand {}, expected one of {}",
                s,
                Self::names().join(", ")
            )),
        }
    }
} // }}}

// PackState {{{
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PackState {
    Standby = 0,
    Charging = 1,
    Discharging = 2,
}

impl PackState {
    /// Unlisted codes are reported as "unknown" rather than rejected.
    pub fn name_for_code(code: i64) -> &'static str {
        match u8::try_from(code).ok().and_then(|c| Self::try_from(c).ok()) {
            Some(Self::Standby) => "standby",
            Some(Self::Charging) => "charging",
            Some(Self::Discharging) => "discharging",
            None => "unknown",
        }
    }
} // }}}
