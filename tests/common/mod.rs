#![allow(dead_code)]

use solarflow_bridge::prelude::*;

pub const PREFIX: &str = "73bkTV";
pub const DEVICE_ID: &str = "5ak8yGU7";
pub const SERIAL: &str = "PO1HLC9LDR01938";

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;

impl Factory {
    pub fn bridge() -> Bridge {
        Bridge::new(PREFIX, DEVICE_ID, "homeassistant")
    }

    /// A bridge that knows its serial, one battery pack and the max inverter input, and has
    /// published discovery.
    pub fn ready_bridge() -> (Bridge, Vec<Action>) {
        let mut bridge = Self::bridge();
        learn_serial(&mut bridge);
        report(
            &mut bridge,
            serde_json::json!({
                "properties": {"packNum": 1, "inverseMaxPower": 600, "pvBrand": 1},
                "packData": [{"sn": "CO4HLMEFL100123", "socLevel": 57, "state": 0, "maxTemp": 2951}]
            }),
        );
        let actions = bridge.try_send_discovery();
        (bridge, actions)
    }
}

pub fn device_topic(suffix: &str) -> String {
    format!("/{}/{}/{}", PREFIX, DEVICE_ID, suffix)
}

pub fn learn_serial(bridge: &mut Bridge) {
    bridge
        .handle_message(&device_topic("log"), &format!(r#"{{"log":{{"sn":"{}"}}}}"#, SERIAL))
        .unwrap();
}

pub fn report(bridge: &mut Bridge, body: serde_json::Value) -> Vec<Action> {
    bridge
        .handle_message(&device_topic("properties/report"), &body.to_string())
        .unwrap()
}

pub fn published(actions: &[Action]) -> Vec<&Message> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Publish(m) => Some(m),
            _ => None,
        })
        .collect()
}

pub fn published_to<'a>(actions: &'a [Action], topic: &str) -> Vec<&'a str> {
    published(actions)
        .into_iter()
        .filter(|m| m.topic == topic)
        .map(|m| m.payload.as_str())
        .collect()
}

pub fn discovery_configs(actions: &[Action]) -> Vec<&Message> {
    published(actions)
        .into_iter()
        .filter(|m| m.topic.starts_with("homeassistant/") && m.topic.ends_with("/config"))
        .collect()
}

pub fn subscribed(actions: &[Action]) -> Vec<&str> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Subscribe(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

pub fn writes(actions: &[Action]) -> Vec<serde_json::Value> {
    published_to(actions, &format!("iot/{}/{}/properties/write", PREFIX, DEVICE_ID))
        .into_iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect()
}
