mod common;
use common::*;
use solarflow_bridge::prelude::*;

use std::io::Write;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_from_file() {
    common_setup();
    let file = write_config(
        "
mqtt:
  host: broker.local
  username: solar
  password: flow
  homeassistant:
    prefix: ha
device:
  topic_prefix: 73bkTV
  device_id: 5ak8yGU7
control:
  enabled: true
  controller: MinimizeGrid
  max_output: 600
  house_power_topic: tele/powermeter/power
loglevel: debug
",
    );

    let config = Config::new(file.path().to_string_lossy().into_owned()).unwrap();

    assert_eq!(config.mqtt().host(), "broker.local");
    assert_eq!(config.mqtt().username().as_deref(), Some("solar"));
    assert_eq!(config.mqtt().homeassistant().prefix(), "ha");
    assert_eq!(config.control().max_output(), 600.0);
    assert_eq!(
        config.control().house_power_topic(),
        Some("tele/powermeter/power")
    );
    assert_eq!(config.loglevel(), "debug");

    let bridge = Bridge::from_config(&config);
    assert_eq!(
        bridge.device_topic("log"),
        format!("/{}/{}/log", PREFIX, DEVICE_ID)
    );

    let control = ControlLoop::from_config(config.control()).unwrap();
    assert_eq!(control.strategy().name(), "MinimizeGrid");
    assert_eq!(control.max_output(), 600.0);
}

#[test]
fn missing_file_is_an_error() {
    common_setup();
    assert!(Config::new("/nonexistent/solarflow.yaml".to_string()).is_err());
}

#[test]
fn missing_device_is_an_error() {
    common_setup();
    let file = write_config("mqtt:\n  host: localhost\n");
    assert!(Config::new(file.path().to_string_lossy().into_owned()).is_err());
}
