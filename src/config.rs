use crate::prelude::*;

use chrono::NaiveTime;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub mqtt: Mqtt,
    pub device: Device,

    #[serde(default)]
    pub control: Control,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// HomeAssistant {{{
#[derive(Clone, Debug, Deserialize)]
pub struct HomeAssistant {
    #[serde(default = "Config::default_mqtt_homeassistant_prefix")]
    pub prefix: String,
}

impl HomeAssistant {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_client_id")]
    pub client_id: String,

    #[serde(default = "Config::default_mqtt_homeassistant")]
    pub homeassistant: HomeAssistant,
}

impl Mqtt {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn homeassistant(&self) -> &HomeAssistant {
        &self.homeassistant
    }
} // }}}

// Device {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    /// Product key, the first path segment of every device topic.
    pub topic_prefix: String,
    pub device_id: String,
}

impl Device {
    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
} // }}}

// Control {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Control {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "Config::default_controller")]
    pub controller: String,

    #[serde(default = "Config::default_max_output")]
    pub max_output: f64,

    #[serde(default = "Config::default_loop_period_secs")]
    pub loop_period_secs: u64,

    pub house_power_topic: Option<String>,

    #[serde(default, deserialize_with = "de_time_of_day")]
    pub morning_cutoff_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "de_time_of_day")]
    pub evening_rampup_time: Option<NaiveTime>,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            enabled: false,
            controller: Config::default_controller(),
            max_output: Config::default_max_output(),
            loop_period_secs: Config::default_loop_period_secs(),
            house_power_topic: None,
            morning_cutoff_time: None,
            evening_rampup_time: None,
        }
    }
}

impl Control {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn max_output(&self) -> f64 {
        self.max_output
    }

    pub fn loop_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.loop_period_secs)
    }

    pub fn house_power_topic(&self) -> Option<&str> {
        self.house_power_topic.as_deref()
    }

    pub fn morning_cutoff_time(&self) -> Option<NaiveTime> {
        self.morning_cutoff_time
    }

    pub fn evening_rampup_time(&self) -> Option<NaiveTime> {
        self.evening_rampup_time
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  MQTT: {}:{} as {}",
            self.mqtt.host, self.mqtt.port, self.mqtt.client_id
        );
        info!("    Home Assistant prefix: {}", self.mqtt.homeassistant.prefix);
        info!(
            "  Device: {}/{}",
            self.device.topic_prefix, self.device.device_id
        );
        info!(
            "  Control: {}",
            if self.control.enabled { "enabled" } else { "disabled" }
        );
        if self.control.enabled {
            info!("    Controller: {}", self.control.controller);
            info!("    Max output: {}", self.control.max_output);
            info!("    Loop period: {}s", self.control.loop_period_secs);
        }
        info!("  Log Level: {}", self.loglevel);
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn mqtt(&self) -> &Mqtt {
        &self.mqtt
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    fn validate(&self) -> Result<()> {
        if self.mqtt.port == 0 {
            bail!("mqtt.port must be between 1 and 65535");
        }
        if self.mqtt.host.is_empty() {
            bail!("mqtt.host cannot be empty");
        }

        if self.device.topic_prefix.is_empty() || self.device.device_id.is_empty() {
            bail!("device.topic_prefix and device.device_id are required");
        }

        if !self.control.max_output.is_finite() || self.control.max_output < 0.0 {
            bail!("control.max_output must be a non-negative number");
        }
        if self.control.loop_period_secs == 0 {
            bail!("control.loop_period_secs must be at least 1");
        }
        if self.control.enabled {
            // resolve the strategy once here so a bad name never reaches runtime
            Strategy::from_config(&self.control)?;
        }

        Ok(())
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_client_id() -> String {
        "solarflow-bridge".to_string()
    }

    fn default_mqtt_homeassistant() -> HomeAssistant {
        HomeAssistant {
            prefix: Self::default_mqtt_homeassistant_prefix(),
        }
    }

    fn default_mqtt_homeassistant_prefix() -> String {
        "homeassistant".to_string()
    }

    fn default_controller() -> String {
        "AlwaysZero".to_string()
    }

    fn default_max_output() -> f64 {
        500.0
    }

    fn default_loop_period_secs() -> u64 {
        30
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

fn de_time_of_day<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;

    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Some)
            .map_err(|err| serde::de::Error::custom(format!("invalid time {:?}: {}", s, err))),
    }
}
