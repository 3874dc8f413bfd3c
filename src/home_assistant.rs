use crate::bridge::commands::Command;
use crate::item::CodeTable;
use crate::prelude::*;

use serde::Serialize;

/// Topic namespace for the states and commands this bridge exposes.
pub const STATE_NAMESPACE: &str = "solarflow";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub identifiers: Vec<String>,
}

impl DeviceInfo {
    pub fn new(identifiers: Vec<String>) -> Self {
        Self {
            name: "SolarFlow",
            manufacturer: "Zendure",
            model: "SolarFlow",
            identifiers,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Sensor,
    Number,
    Select,
    Switch,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Number => "number",
            Self::Select => "select",
            Self::Switch => "switch",
        }
    }
}

/// JSON body of a discovery message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityConfig {
    pub device: DeviceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    pub name: String,
    pub object_id: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,
}

/// Everything needed to register one item with Home Assistant and route its commands.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    pub item: Item,
    pub config_topic: String,
    pub config: EntityConfig,
    pub command: Option<Command>,
    pub start_value: Option<StateValue>,
}

impl Descriptor {
    pub fn state_topic(&self) -> &str {
        &self.config.state_topic
    }

    pub fn command_topic(&self) -> Option<&str> {
        self.config.command_topic.as_deref()
    }

    pub fn config_message(&self) -> Result<Message> {
        Ok(Message {
            topic: self.config_topic.clone(),
            retain: true,
            payload: serde_json::to_string(&self.config)?,
        })
    }
}

pub fn state_topic(item: &Item) -> String {
    format!("{}/{}/state", STATE_NAMESPACE, item.key())
}

pub fn command_topic(item: &Item) -> String {
    format!("{}/{}/set", STATE_NAMESPACE, item.key())
}

// static entity table {{{
#[derive(Clone, Copy)]
enum Max {
    Fixed(i64),
    MaxInverterInput,
}

#[derive(Clone, Copy)]
enum Control {
    Sensor,
    Number {
        command: Command,
        min: i64,
        max: Max,
        step: i64,
    },
    Select(Command, fn() -> Vec<&'static str>),
    Switch(Command),
}

struct Entity {
    item: Item,
    object: &'static str,
    state_topic: Option<&'static str>,
    name: &'static str,
    device_class: Option<&'static str>,
    unit: Option<&'static str>,
    icon: Option<&'static str>,
    start_value: Option<i64>,
    control: Control,
}

const fn power(item: Item, object: &'static str, name: &'static str, icon: &'static str) -> Entity {
    Entity {
        item,
        object,
        state_topic: None,
        name,
        device_class: Some("power"),
        unit: Some("W"),
        icon: Some(icon),
        start_value: Some(0),
        control: Control::Sensor,
    }
}

const fn number(
    item: Item,
    name: &'static str,
    unit: &'static str,
    icon: &'static str,
    command: Command,
    range: (i64, Max, i64),
) -> Entity {
    Entity {
        item,
        object: "",
        state_topic: None,
        name,
        device_class: None,
        unit: Some(unit),
        icon: Some(icon),
        start_value: None,
        control: Control::Number {
            command,
            min: range.0,
            max: range.1,
            step: range.2,
        },
    }
}

const SOLAR_ICON: &str = "mdi:solar-power-variant-outline";

// an empty object means the discovery topic uses the item key, no state_topic means
// solarflow/<key>/state
static ENTITIES: [Entity; 18] = [
    Entity {
        item: Item::Battery,
        object: "battery_soc",
        state_topic: None,
        name: "SolarFlow Battery",
        device_class: Some("battery"),
        unit: Some("%"),
        icon: None,
        start_value: None,
        control: Control::Sensor,
    },
    Entity {
        item: Item::State,
        object: "",
        state_topic: Some("solarflow/state"),
        name: "SolarFlow State",
        device_class: None,
        unit: None,
        icon: None,
        start_value: None,
        control: Control::Sensor,
    },
    Entity {
        item: Item::BypassMode,
        object: "",
        state_topic: None,
        name: "SolarFlow Bypass Mode",
        device_class: None,
        unit: None,
        icon: Some("mdi:domain"),
        start_value: None,
        control: Control::Select(Command::BypassMode, BypassMode::names),
    },
    power(
        Item::HomeOutputPower,
        "",
        "SolarFlow Home Output Power",
        "mdi:home-import-outline",
    ),
    power(
        Item::BatteryOutputPower,
        "",
        "SolarFlow Battery Output Power",
        "mdi:battery-arrow-up",
    ),
    power(Item::SolarInputPower, "", "SolarFlow Solar Input Power", SOLAR_ICON),
    power(
        Item::SolarInput1Power,
        "solar_input_1",
        "SolarFlow Solar Input 1 Power",
        SOLAR_ICON,
    ),
    power(
        Item::SolarInput2Power,
        "solar_input_2",
        "SolarFlow Solar Input 2 Power",
        SOLAR_ICON,
    ),
    power(
        Item::SolarOverflowPower,
        "",
        "SolarFlow Solar Overflow Power",
        SOLAR_ICON,
    ),
    power(
        Item::BatteryInputPower,
        "",
        "SolarFlow Battery Input Power",
        "mdi:battery-arrow-down",
    ),
    Entity {
        item: Item::BatteryChargeTime,
        object: "",
        state_topic: None,
        name: "SolarFlow Battery Charge Time",
        device_class: Some("duration"),
        unit: Some("min"),
        icon: Some("mdi:progress-clock"),
        start_value: Some(0),
        control: Control::Sensor,
    },
    Entity {
        item: Item::BatteryRuntime,
        object: "",
        state_topic: None,
        name: "SolarFlow Battery Runtime",
        device_class: Some("duration"),
        unit: Some("min"),
        icon: Some("mdi:progress-clock"),
        start_value: None,
        control: Control::Sensor,
    },
    number(
        Item::MinSoc,
        "SolarFlow Min Capacity",
        "%",
        "mdi:battery-10",
        Command::MinSoc,
        (0, Max::Fixed(30), 1),
    ),
    number(
        Item::MaxSoc,
        "SolarFlow Max Capacity",
        "%",
        "mdi:battery-90",
        Command::MaxSoc,
        (70, Max::Fixed(100), 1),
    ),
    number(
        Item::MaxInverterInput,
        "SolarFlow Max Inverter Input",
        "W",
        "mdi:meter-electric-outline",
        Command::MaxInverterInput,
        (0, Max::Fixed(1200), 100),
    ),
    number(
        Item::OutputLimit,
        "SolarFlow Output Limit",
        "W",
        "mdi:export",
        Command::OutputLimit,
        (0, Max::MaxInverterInput, 1),
    ),
    Entity {
        item: Item::BuzzerSwitch,
        object: "",
        state_topic: None,
        name: "SolarFlow Buzzer Switch",
        device_class: None,
        unit: None,
        icon: Some("mdi:surround-sound"),
        start_value: None,
        control: Control::Switch(Command::BuzzerSwitch),
    },
    Entity {
        item: Item::PvBrand,
        object: "",
        state_topic: None,
        name: "SolarFlow PV Brand",
        device_class: None,
        unit: None,
        icon: Some("mdi:domain"),
        start_value: None,
        control: Control::Select(Command::PvBrand, PvBrand::names),
    },
];
// }}}

/// Inputs that shape the descriptor set. Recomputed for every discovery attempt.
pub struct Discovery<'a> {
    pub prefix: &'a str,
    pub device_id: &'a str,
    pub serial: &'a str,
    pub roster: &'a [String],
    pub max_inverter_input: i64,
}

impl Discovery<'_> {
    pub fn node_id(&self) -> String {
        format!("solarflow_{}_{}", self.serial, self.device_id)
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(vec![self.device_id.to_owned(), self.serial.to_owned()])
    }

    /// Full descriptor set: the fixed hub entities followed by three per battery pack.
    pub fn descriptors(&self) -> Vec<Descriptor> {
        let mut r: Vec<Descriptor> = ENTITIES.iter().map(|e| self.entity(e)).collect();

        for (i, serial) in self.roster.iter().enumerate() {
            r.extend(self.pack(i + 1, serial));
        }

        r
    }

    fn entity(&self, e: &Entity) -> Descriptor {
        let key = e.item.key();
        let object = if e.object.is_empty() { key.as_str() } else { e.object };

        let component = match e.control {
            Control::Sensor => Component::Sensor,
            Control::Number { .. } => Component::Number,
            Control::Select(..) => Component::Select,
            Control::Switch(_) => Component::Switch,
        };

        let mut config = self.config(&e.item, e.name.to_owned());
        config.device_class = e.device_class;
        config.unit_of_measurement = e.unit;
        config.icon = e.icon;
        if let Some(topic) = e.state_topic {
            config.state_topic = topic.to_owned();
        }

        let command = match e.control {
            Control::Sensor => None,
            Control::Number {
                command,
                min,
                max,
                step,
            } => {
                config.min = Some(min);
                config.max = Some(match max {
                    Max::Fixed(max) => max,
                    Max::MaxInverterInput => self.max_inverter_input,
                });
                config.step = Some(step);
                config.mode = Some("slider");
                Some(command)
            }
            Control::Select(command, options) => {
                config.options = Some(options());
                Some(command)
            }
            Control::Switch(command) => Some(command),
        };

        if command.is_some() {
            config.command_topic = Some(command_topic(&e.item));
        }

        Descriptor {
            config_topic: self.config_topic(component, object),
            item: e.item.clone(),
            config,
            command,
            start_value: e.start_value.map(StateValue::Int),
        }
    }

    fn pack(&self, index: usize, serial: &str) -> Vec<Descriptor> {
        PackField::ALL
            .iter()
            .map(|field| {
                let item = Item::pack(serial, *field);
                let (name, device_class, unit) = match field {
                    PackField::Soc => (
                        format!("SolarFlow Battery Pack {}", index),
                        Some("battery"),
                        Some("%"),
                    ),
                    PackField::State => (format!("SolarFlow Battery Pack {} State", index), None, None),
                    PackField::Temperature => (
                        format!("SolarFlow Battery Pack {} Temperature", index),
                        Some("temperature"),
                        Some("K"),
                    ),
                };

                let mut config = self.config(&item, name);
                config.device_class = device_class;
                config.unit_of_measurement = unit;

                Descriptor {
                    config_topic: self.config_topic(Component::Sensor, &item.key()),
                    item,
                    config,
                    command: None,
                    start_value: None,
                }
            })
            .collect()
    }

    fn config(&self, item: &Item, name: String) -> EntityConfig {
        let key = item.key();

        EntityConfig {
            device: self.device_info(),
            device_class: None,
            unit_of_measurement: None,
            name,
            object_id: format!("solarflow_{}", key),
            state_topic: state_topic(item),
            command_topic: None,
            unique_id: format!("{}_{}", self.node_id(), key),
            icon: None,
            min: None,
            max: None,
            step: None,
            mode: None,
            options: None,
        }
    }

    fn config_topic(&self, component: Component, object: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.prefix,
            component.as_str(),
            self.node_id(),
            object
        )
    }
}

/// The manual on/off gate of the control loop, exposed as a switch.
pub struct ControllerSwitch;

impl ControllerSwitch {
    pub fn state_topic() -> String {
        format!("{}/control/state", STATE_NAMESPACE)
    }

    pub fn command_topic() -> String {
        format!("{}/control/set", STATE_NAMESPACE)
    }

    pub fn config_message(prefix: &str, device_id: &str) -> Result<Message> {
        let node_id = format!("solarflow_control_{}", device_id);
        let config = EntityConfig {
            device: DeviceInfo::new(vec![device_id.to_owned()]),
            device_class: None,
            unit_of_measurement: None,
            name: "SolarFlow Automatic Controller".to_owned(),
            object_id: "solarflow_control".to_owned(),
            state_topic: Self::state_topic(),
            command_topic: Some(Self::command_topic()),
            unique_id: format!("{}_control", node_id),
            icon: Some("mdi:car-cruise-control"),
            min: None,
            max: None,
            step: None,
            mode: None,
            options: None,
        };

        Ok(Message {
            topic: format!("{}/switch/{}/control/config", prefix, node_id),
            retain: true,
            payload: serde_json::to_string(&config)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery(roster: &[String]) -> Vec<Descriptor> {
        Discovery {
            prefix: "homeassistant",
            device_id: "5ak8yGU7",
            serial: "EE1LH",
            roster,
            max_inverter_input: 800,
        }
        .descriptors()
    }

    fn find<'a>(descriptors: &'a [Descriptor], item: &Item) -> &'a Descriptor {
        descriptors.iter().find(|d| &d.item == item).unwrap()
    }

    #[test]
    fn fixed_entities_without_packs() {
        let d = discovery(&[]);
        assert_eq!(d.len(), 18);

        let battery = find(&d, &Item::Battery);
        assert_eq!(
            battery.config_topic,
            "homeassistant/sensor/solarflow_EE1LH_5ak8yGU7/battery_soc/config"
        );
        assert_eq!(battery.state_topic(), "solarflow/battery/state");
        assert_eq!(battery.command_topic(), None);
        assert_eq!(battery.config.unique_id, "solarflow_EE1LH_5ak8yGU7_battery");
        assert_eq!(
            battery.config.device.identifiers,
            vec!["5ak8yGU7".to_string(), "EE1LH".to_string()]
        );
    }

    #[test]
    fn aggregate_state_has_its_own_topic() {
        let d = discovery(&[]);
        let state = find(&d, &Item::State);

        assert_eq!(state.state_topic(), "solarflow/state");
        assert_eq!(
            state.config_topic,
            "homeassistant/sensor/solarflow_EE1LH_5ak8yGU7/state/config"
        );
    }

    #[test]
    fn output_limit_bounded_by_max_inverter_input() {
        let d = discovery(&[]);
        let limit = find(&d, &Item::OutputLimit);

        assert_eq!(limit.config.max, Some(800));
        assert_eq!(limit.command, Some(Command::OutputLimit));
        assert_eq!(limit.command_topic(), Some("solarflow/output_limit/set"));
        assert_eq!(
            limit.config_topic,
            "homeassistant/number/solarflow_EE1LH_5ak8yGU7/output_limit/config"
        );
    }

    #[test]
    fn selects_list_options() {
        let d = discovery(&[]);
        let json: serde_json::Value =
            serde_json::from_str(&find(&d, &Item::PvBrand).config_message().unwrap().payload)
                .unwrap();

        assert_eq!(json["options"][6], "bosswerk");
        assert_eq!(json["command_topic"], "solarflow/pv_brand/set");
        assert!(json.get("min").is_none());
    }

    #[test]
    fn power_sensors_start_at_zero() {
        let d = discovery(&[]);
        assert_eq!(
            find(&d, &Item::SolarInput1Power).start_value,
            Some(StateValue::Int(0))
        );
        assert_eq!(find(&d, &Item::BatteryRuntime).start_value, None);
    }

    #[test]
    fn three_entities_per_pack() {
        let d = discovery(&["AB1".to_string(), "CD2".to_string()]);
        assert_eq!(d.len(), 24);

        let temp = find(&d, &Item::pack("CD2", PackField::Temperature));
        assert_eq!(temp.config.name, "SolarFlow Battery Pack 2 Temperature");
        assert_eq!(temp.state_topic(), "solarflow/pack_CD2_temperature/state");
        assert_eq!(temp.config.unit_of_measurement, Some("K"));
    }
}
