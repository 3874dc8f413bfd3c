use crate::item::Item;

/// Failures raised by the bridge and controller core.
///
/// Everything except `Configuration` is recovered locally: the caller logs it and carries on
/// with the next message or cycle. `Configuration` is only produced while starting up and
/// aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode payload on {topic}: {reason}")]
    Decode { topic: String, reason: String },

    #[error("failed to encode message for {topic}: {reason}")]
    Encode { topic: String, reason: String },

    #[error("no handler registered for topic {0}")]
    UnknownTopic(String),

    #[error("rejected {item} value {value:?}: {reason}")]
    Validation {
        item: Item,
        value: String,
        reason: String,
    },

    #[error("cannot set {item}, {missing} not yet known")]
    PrerequisiteMissing { item: Item, missing: Item },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn decode(topic: &str, reason: impl ToString) -> Self {
        Self::Decode {
            topic: topic.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn encode(topic: &str, reason: impl ToString) -> Self {
        Self::Encode {
            topic: topic.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(item: Item, value: &str, reason: impl ToString) -> Self {
        Self::Validation {
            item,
            value: value.to_owned(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_decode_read_differently() {
        assert_eq!(
            Error::encode("iot/p/d/properties/write", "key must be a string").to_string(),
            "failed to encode message for iot/p/d/properties/write: key must be a string"
        );
        assert_eq!(
            Error::decode("/p/d/log", "expected value").to_string(),
            "failed to decode payload on /p/d/log: expected value"
        );
    }
}
