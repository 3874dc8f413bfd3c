use crate::prelude::*;
use std::collections::HashMap;

// StateValue {{{
/// Last value published for an item, kept in the shape the device reported it.
#[derive(Clone, Debug, PartialEq)]
pub enum StateValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl StateValue {
    /// Converts a JSON number into a state value, keeping integers integral.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        if let Some(i) = value.as_i64() {
            Some(Self::Int(i))
        } else {
            value.as_f64().map(Self::Float)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Payload as published to a state topic.
    pub fn to_payload(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
} // }}}

/// Last known value per canonical item.
///
/// Owned by the bridge and only touched from the coordinator task.
#[derive(Debug, Default, Clone)]
pub struct StateCache {
    values: HashMap<Item, StateValue>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, item: Item, value: StateValue) {
        trace!("cache {} = {}", item, value);
        self.values.insert(item, value);
    }

    pub fn get(&self, item: &Item) -> Option<&StateValue> {
        self.values.get(item)
    }

    pub fn contains(&self, item: &Item) -> bool {
        self.values.contains_key(item)
    }

    pub fn contains_all(&self, items: &[Item]) -> bool {
        items.iter().all(|item| self.contains(item))
    }

    /// Numeric view of an item, `None` if missing or not numeric.
    pub fn number(&self, item: &Item) -> Option<f64> {
        self.get(item).and_then(StateValue::as_f64)
    }

    /// Numeric view of an item, 0 when unavailable.
    pub fn number_or_zero(&self, item: &Item) -> f64 {
        self.number(item).unwrap_or(0.0)
    }

    pub fn text(&self, item: &Item) -> Option<&str> {
        self.get(item).and_then(StateValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_integers_stay_integral() {
        let v = StateValue::from_json(&serde_json::json!(80)).unwrap();
        assert_eq!(v, StateValue::Int(80));
        assert_eq!(v.to_payload(), "80");

        let v = StateValue::from_json(&serde_json::json!(15.5)).unwrap();
        assert_eq!(v.to_payload(), "15.5");

        assert_eq!(StateValue::from_json(&serde_json::json!("80")), None);
    }

    #[test]
    fn missing_numbers_default_to_zero() {
        let mut cache = StateCache::new();
        assert_eq!(cache.number_or_zero(&Item::Battery), 0.0);

        cache.set(Item::Battery, StateValue::Int(42));
        cache.set(Item::PvBrand, "hoymiles".into());
        assert_eq!(cache.number_or_zero(&Item::Battery), 42.0);
        assert_eq!(cache.number(&Item::PvBrand), None);
        assert_eq!(cache.text(&Item::PvBrand), Some("hoymiles"));
        assert!(cache.contains_all(&[Item::Battery, Item::PvBrand]));
        assert!(!cache.contains_all(&[Item::Battery, Item::MinSoc]));
    }
}
