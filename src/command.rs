use crate::prelude::*;

use serde::Serialize;
use std::collections::BTreeMap;

/// Property name the device understands as "report everything".
const GET_ALL: &str = "getAll";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Read { properties: Vec<String> },
    Write { properties: BTreeMap<String, i64> },
}

/// Outbound request as the device expects it on its `iot/...` topics.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub timestamp: i64,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub payload: Option<Payload>,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Clone, Debug)]
pub struct CommandEncoder {
    device_id: String,
}

impl CommandEncoder {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_owned(),
        }
    }

    pub fn read_all(&self) -> Envelope {
        self.request(Payload::Read {
            properties: vec![GET_ALL.to_owned()],
        })
    }

    pub fn write_properties(&self, properties: &[(&str, i64)]) -> Envelope {
        let properties = properties
            .iter()
            .map(|(key, value)| ((*key).to_owned(), *value))
            .collect();

        self.request(Payload::Write { properties })
    }

    // the device only wants the id and the current time back, no device id
    pub fn time_sync_reply(&self) -> Envelope {
        Envelope {
            timestamp: Self::timestamp(),
            message_id: Self::message_id(),
            device_id: None,
            payload: None,
        }
    }

    fn request(&self, payload: Payload) -> Envelope {
        Envelope {
            timestamp: Self::timestamp(),
            message_id: Self::message_id(),
            device_id: Some(self.device_id.clone()),
            payload: Some(payload),
        }
    }

    /// Random 128-bit id rendered as 32 lowercase hex digits.
    pub fn message_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Wall-clock milliseconds since the epoch.
    pub fn timestamp() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
