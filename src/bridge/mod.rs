use crate::prelude::*;

pub mod commands;

use crate::home_assistant::{Descriptor, Discovery};
use crate::property::{PropertiesReport, PropertyTranslator};
use commands::Command;

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub const SEND_DISCOVERY_INTERVAL: Duration = Duration::from_secs(10);
pub const REQUEST_ALL_INTERVAL: Duration = Duration::from_secs(1800);

/// Side effects requested by the bridge, carried out by the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Publish(Message),
    Subscribe(String),
    Unsubscribe(String),
    Schedule(Timer, Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handler {
    FirmwareReport,
    TimeSync,
    PropertiesReport,
    Log,
}

impl Handler {
    const ALL: [Handler; 4] = [
        Handler::FirmwareReport,
        Handler::TimeSync,
        Handler::PropertiesReport,
        Handler::Log,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            Self::FirmwareReport => "firmware/report",
            Self::TimeSync => "time-sync",
            Self::PropertiesReport => "properties/report",
            Self::Log => "log",
        }
    }
}

// inbound payloads {{{
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirmwareReport {
    device_sn: Option<String>,
    #[serde(default)]
    modules: Vec<ModuleVersion>,
}

#[derive(Debug, Deserialize)]
struct ModuleVersion {
    module: String,
    version: i64,
}

#[derive(Debug, Deserialize)]
struct LogMessage {
    log: Option<LogBody>,
}

#[derive(Debug, Deserialize)]
struct LogBody {
    sn: Option<String>,
} // }}}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceIdentity {
    pub device_id: String,
    /// Learned from the first firmware report or log message, never replaced afterwards.
    pub serial: Option<String>,
    pub module_versions: BTreeMap<String, i64>,
}

impl DeviceIdentity {
    fn learn_serial(&mut self, serial: &str, source: &str) {
        if self.serial.is_none() {
            info!("Received serial {} via {}", serial, source);
            self.serial = Some(serial.to_owned());
        }
    }
}

/// Protocol translation between the device topics and Home Assistant.
///
/// Purely synchronous: every entry point returns the actions to perform instead of doing
/// I/O itself, so the coordinator stays the single owner of all state.
pub struct Bridge {
    topic_prefix: String,
    discovery_prefix: String,
    identity: DeviceIdentity,
    encoder: CommandEncoder,
    cache: StateCache,
    roster: Option<Vec<String>>,
    registered: HashMap<Item, Descriptor>,
    command_topics: HashMap<String, Item>,
    refresh_scheduled: bool,
}

impl Bridge {
    pub fn new(topic_prefix: &str, device_id: &str, discovery_prefix: &str) -> Self {
        Self {
            topic_prefix: topic_prefix.to_owned(),
            discovery_prefix: discovery_prefix.to_owned(),
            identity: DeviceIdentity {
                device_id: device_id.to_owned(),
                ..Default::default()
            },
            encoder: CommandEncoder::new(device_id),
            cache: StateCache::new(),
            roster: None,
            registered: HashMap::new(),
            command_topics: HashMap::new(),
            refresh_scheduled: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.device().topic_prefix(),
            config.device().device_id(),
            config.mqtt().homeassistant().prefix(),
        )
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn roster(&self) -> Option<&[String]> {
        self.roster.as_deref()
    }

    pub fn is_registered(&self, item: &Item) -> bool {
        self.registered.contains_key(item)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Device topic the bridge listens on, `/<prefix>/<device id>/<suffix>`.
    pub fn device_topic(&self, suffix: &str) -> String {
        format!("/{}/{}/{}", self.topic_prefix, self.identity.device_id, suffix)
    }

    /// Topic the device listens on, `iot/<prefix>/<device id>/<suffix>`.
    pub fn command_topic(&self, suffix: &str) -> String {
        format!("iot/{}/{}/{}", self.topic_prefix, self.identity.device_id, suffix)
    }

    pub fn static_topics(&self) -> Vec<String> {
        Handler::ALL
            .iter()
            .map(|h| self.device_topic(h.suffix()))
            .collect()
    }

    /// Subscribes the device topics and makes the first discovery attempt.
    pub fn start(&mut self) -> Vec<Action> {
        let topics = self.static_topics();
        info!("Subscribing to topics [{}]", topics.join(", "));

        let mut r: Vec<Action> = topics.into_iter().map(Action::Subscribe).collect();
        r.extend(self.try_send_discovery());
        r
    }

    /// Unsubscribes everything this bridge subscribed to, static and command topics alike.
    pub fn shutdown(&mut self) -> Vec<Action> {
        let mut r: Vec<Action> = self
            .static_topics()
            .into_iter()
            .map(Action::Unsubscribe)
            .collect();

        let mut command_topics: Vec<String> = self.command_topics.drain().map(|(t, _)| t).collect();
        command_topics.sort();
        r.extend(command_topics.into_iter().map(Action::Unsubscribe));

        self.refresh_scheduled = false;
        r
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Action> {
        match timer {
            Timer::DiscoveryRetry => self.try_send_discovery(),
            Timer::RequestAll => {
                let mut r = self.request_all();
                r.push(Action::Schedule(Timer::RequestAll, REQUEST_ALL_INTERVAL));
                r
            }
        }
    }

    // TopicRouter {{{
    /// Routes one inbound message to exactly one handler.
    pub fn handle_message(&mut self, topic: &str, payload: &str) -> Result<Vec<Action>, Error> {
        if let Some(handler) = Handler::ALL
            .iter()
            .find(|h| self.device_topic(h.suffix()) == topic)
        {
            let data: serde_json::Value =
                serde_json::from_str(payload).map_err(|err| Error::decode(topic, err))?;

            return match handler {
                Handler::FirmwareReport => self.firmware_report_received(topic, data),
                Handler::TimeSync => self.time_sync_received(),
                Handler::PropertiesReport => self.properties_report_received(topic, data),
                Handler::Log => self.log_received(topic, data),
            };
        }

        if let Some(item) = self.command_topics.get(topic).cloned() {
            return self.command_received(&item, payload);
        }

        Err(Error::UnknownTopic(topic.to_owned()))
    } // }}}

    fn firmware_report_received(
        &mut self,
        topic: &str,
        data: serde_json::Value,
    ) -> Result<Vec<Action>, Error> {
        let report: FirmwareReport =
            serde_json::from_value(data).map_err(|err| Error::decode(topic, err))?;

        if let Some(serial) = &report.device_sn {
            self.identity.learn_serial(serial, "firmware report");
        }

        for m in report.modules {
            info!("module {} firmware version {}", m.module, m.version);
            self.identity.module_versions.insert(m.module, m.version);
        }

        Ok(Vec::new())
    }

    fn log_received(&mut self, topic: &str, data: serde_json::Value) -> Result<Vec<Action>, Error> {
        let message: LogMessage =
            serde_json::from_value(data).map_err(|err| Error::decode(topic, err))?;

        if let Some(serial) = message.log.and_then(|log| log.sn) {
            self.identity.learn_serial(&serial, "log");
        }

        Ok(Vec::new())
    }

    fn time_sync_received(&mut self) -> Result<Vec<Action>, Error> {
        info!("Received time-sync request, replying with current time");
        Ok(vec![self.publish_envelope(
            "time-sync/reply",
            self.encoder.time_sync_reply(),
        )?])
    }

    fn properties_report_received(
        &mut self,
        topic: &str,
        data: serde_json::Value,
    ) -> Result<Vec<Action>, Error> {
        let report: PropertiesReport =
            serde_json::from_value(data).map_err(|err| Error::decode(topic, err))?;

        let t = PropertyTranslator::translate(&report, self.roster.as_deref());
        let mut r = Vec::new();

        for (item, value) in t.updates {
            self.publish_state(item, value, &mut r);
        }

        if t.recompute_overflow {
            if let Some(overflow) = PropertyTranslator::overflow(&self.cache) {
                self.publish_state(Item::SolarOverflowPower, overflow, &mut r);
            }
        }

        if t.recompute_state {
            if let Some(state) = PropertyTranslator::aggregate_state(&self.cache) {
                self.publish_state(Item::State, state, &mut r);
            }
        }

        if let Some(roster) = t.roster {
            info!("Battery packs: [{}]", roster.join(", "));
            self.roster = Some(roster);
            // new packs need descriptors before their values show up in Home Assistant
            r.push(Action::Schedule(Timer::DiscoveryRetry, SEND_DISCOVERY_INTERVAL));
        }

        for (item, value) in t.pack_updates {
            self.publish_state(item, value, &mut r);
        }

        Ok(r)
    }

    fn command_received(&mut self, item: &Item, payload: &str) -> Result<Vec<Action>, Error> {
        let Some(command) = self.registered.get(item).and_then(|d| d.command) else {
            return Err(Error::UnknownTopic(crate::home_assistant::command_topic(item)));
        };

        self.execute(command, payload)
    }

    /// Validates and forwards a command as a property write.
    pub fn execute(&mut self, command: Command, payload: &str) -> Result<Vec<Action>, Error> {
        let properties = command.properties(payload, &self.cache)?;
        info!("setting {} to {}", command.item(), payload.trim());

        Ok(vec![self.publish_envelope(
            "properties/write",
            self.encoder.write_properties(&properties),
        )?])
    }

    fn publish_state(&mut self, item: Item, value: StateValue, r: &mut Vec<Action>) {
        if let Some(descriptor) = self.registered.get(&item) {
            r.push(Action::Publish(Message {
                topic: descriptor.state_topic().to_owned(),
                retain: false,
                payload: value.to_payload(),
            }));
        }

        self.cache.set(item, value);
    }

    pub fn request_all(&self) -> Vec<Action> {
        match self.publish_envelope("properties/read", self.encoder.read_all()) {
            Ok(action) => vec![action],
            Err(err) => {
                error!("failed to encode read request: {}", err);
                Vec::new()
            }
        }
    }

    fn publish_envelope(
        &self,
        suffix: &str,
        envelope: crate::command::Envelope,
    ) -> Result<Action, Error> {
        let topic = self.command_topic(suffix);
        let payload = envelope
            .to_json()
            .map_err(|err| Error::encode(&topic, err))?;

        Ok(Action::Publish(Message {
            topic,
            retain: false,
            payload,
        }))
    }

    // DiscoveryPublisher {{{
    fn not_ready(&self, reason: &str) -> Vec<Action> {
        info!("{}, not sending discovery info", reason);

        let mut r = self.request_all();
        r.push(Action::Schedule(Timer::DiscoveryRetry, SEND_DISCOVERY_INTERVAL));
        r
    }

    /// Publishes descriptors for every item not registered yet.
    ///
    /// Needs the device serial, the pack roster and the max inverter input; while any of
    /// them is missing it asks the device for everything and tries again later.
    pub fn try_send_discovery(&mut self) -> Vec<Action> {
        let Some(serial) = self.identity.serial.clone() else {
            return self.not_ready("Device serial not yet known");
        };
        let Some(roster) = self.roster.clone() else {
            return self.not_ready("Battery packs not yet known");
        };
        let Some(max_inverter_input) = self.cache.number(&Item::MaxInverterInput) else {
            return self.not_ready("Max inverter input not yet known");
        };

        let descriptors = Discovery {
            prefix: &self.discovery_prefix,
            device_id: &self.identity.device_id,
            serial: &serial,
            roster: &roster,
            max_inverter_input: max_inverter_input as i64,
        }
        .descriptors();

        let mut r = Vec::new();
        let mut published = 0;

        for descriptor in descriptors {
            if self.registered.contains_key(&descriptor.item) {
                continue;
            }

            match descriptor.config_message() {
                Ok(message) => r.push(Action::Publish(message)),
                Err(err) => {
                    error!("failed to encode discovery for {}: {}", descriptor.item, err);
                    continue;
                }
            }

            if let Some(value) = &descriptor.start_value {
                r.push(Action::Publish(Message {
                    topic: descriptor.state_topic().to_owned(),
                    retain: false,
                    payload: value.to_payload(),
                }));
            }

            if let Some(topic) = descriptor.command_topic() {
                if !self.command_topics.contains_key(topic) {
                    r.push(Action::Subscribe(topic.to_owned()));
                    self.command_topics
                        .insert(topic.to_owned(), descriptor.item.clone());
                }
            }

            published += 1;
            self.registered.insert(descriptor.item.clone(), descriptor);
        }

        info!(
            "Sent discovery info for {} new items ({} registered)",
            published,
            self.registered.len()
        );

        r.extend(self.request_all());
        if !self.refresh_scheduled {
            self.refresh_scheduled = true;
            r.push(Action::Schedule(Timer::RequestAll, REQUEST_ALL_INTERVAL));
        }

        r
    } // }}}
}

/// Delivers control-loop writes to the device as `output_limit` commands, with the same
/// validation an external command gets.
pub struct BridgeActuator<'a> {
    bridge: &'a mut Bridge,
    actions: Vec<Action>,
}

impl<'a> BridgeActuator<'a> {
    pub fn new(bridge: &'a mut Bridge) -> Self {
        Self {
            bridge,
            actions: Vec::new(),
        }
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

impl Actuator for BridgeActuator<'_> {
    fn set_output_limit(&mut self, value: f64) {
        match self
            .bridge
            .execute(Command::OutputLimit, &value.round().to_string())
        {
            Ok(actions) => self.actions.extend(actions),
            Err(err) => warn!("output limit not written: {}", err),
        }
    }
}
