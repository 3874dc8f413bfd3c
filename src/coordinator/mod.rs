use crate::prelude::*;

use crate::bridge::BridgeActuator;
use crate::home_assistant::ControllerSwitch;

/// Single owner of the bridge and control loop state.
///
/// Every inbound message, timer fire and control tick is handled here, one at a time, in
/// arrival order.
pub struct Coordinator {
    config: Config,
    channels: Channels,
    bridge: Bridge,
    control: Option<ControlLoop>,
    scheduler: Scheduler,
    house_power: Option<f64>,
}

impl Coordinator {
    pub fn new(config: Config, channels: Channels) -> Result<Self> {
        let control = if config.control().enabled() {
            Some(ControlLoop::from_config(config.control())?)
        } else {
            info!("automatic control disabled in config");
            None
        };

        Ok(Self {
            bridge: Bridge::from_config(&config),
            scheduler: Scheduler::new(channels.clone()),
            config,
            channels,
            control,
            house_power: None,
        })
    }

    pub async fn start(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut from_mqtt = self.channels.from_mqtt.subscribe();
        let mut timers = self.channels.timers.subscribe();

        let mut interval = self.control.as_ref().map(|_| {
            let mut interval = tokio::time::interval(self.config.control().loop_period());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval
        });

        self.start_control()?;
        let actions = self.bridge.start();
        self.perform(actions)?;

        loop {
            tokio::select! {
                data = from_mqtt.recv() => match data {
                    Ok(mqtt::ChannelData::Message(message)) => self.process_message(message)?,
                    Ok(mqtt::ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("coordinator lagged, {} inbound messages dropped", n);
                    }
                },
                data = timers.recv() => match data {
                    Ok(scheduler::ChannelData::Fired(timer, generation)) => {
                        if self.scheduler.fired(timer, generation) {
                            let actions = self.bridge.on_timer(timer);
                            self.perform(actions)?;
                        }
                    }
                    Ok(scheduler::ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("coordinator lagged, {} timer events dropped", n);
                    }
                },
                _ = Self::tick(&mut interval) => self.control_cycle()?,
                _ = shutdown.recv() => break,
            }
        }

        self.stop()
    }

    // never completes without a control loop
    async fn tick(interval: &mut Option<tokio::time::Interval>) {
        match interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Cancels every pending timer and drops every subscription.
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping coordinator...");
        self.scheduler.cancel_all();

        let mut actions = self.bridge.shutdown();
        if self.control.is_some() {
            actions.push(Action::Unsubscribe(ControllerSwitch::command_topic()));
            if let Some(topic) = self.config.control().house_power_topic() {
                actions.push(Action::Unsubscribe(topic.to_owned()));
            }
        }

        self.perform(actions)
    }

    fn start_control(&mut self) -> Result<()> {
        let Some(control) = &self.control else {
            return Ok(());
        };

        let mut actions = vec![
            Action::Publish(ControllerSwitch::config_message(
                self.config.mqtt().homeassistant().prefix(),
                self.config.device().device_id(),
            )?),
            Action::Publish(Self::switch_state(control.enabled())),
            Action::Subscribe(ControllerSwitch::command_topic()),
        ];

        match self.config.control().house_power_topic() {
            Some(topic) => actions.push(Action::Subscribe(topic.to_owned())),
            None => warn!("control.house_power_topic not set, house power reads as 0"),
        }

        self.perform(actions)
    }

    fn switch_state(enabled: bool) -> mqtt::Message {
        mqtt::Message {
            topic: ControllerSwitch::state_topic(),
            retain: true,
            payload: if enabled { "ON" } else { "OFF" }.to_owned(),
        }
    }

    fn process_message(&mut self, message: mqtt::Message) -> Result<()> {
        if self.control.is_some() {
            if message.topic == ControllerSwitch::command_topic() {
                return self.switch_received(&message);
            }

            if Some(message.topic.as_str()) == self.config.control().house_power_topic() {
                self.house_power = match message.payload_f64() {
                    Ok(v) => Some(v),
                    Err(err) => {
                        debug!("house power unavailable: {}", err);
                        None
                    }
                };
                return Ok(());
            }
        }

        match self.bridge.handle_message(&message.topic, &message.payload) {
            Ok(actions) => self.perform(actions),
            Err(err @ Error::PrerequisiteMissing { .. }) => {
                info!("{}", err);
                Ok(())
            }
            Err(err) => {
                warn!("{}", err);
                Ok(())
            }
        }
    }

    fn switch_received(&mut self, message: &mqtt::Message) -> Result<()> {
        let enabled = message.payload_bool();

        if let Some(control) = self.control.as_mut() {
            control.set_enabled(enabled);
        }

        self.perform(vec![Action::Publish(Self::switch_state(enabled))])
    }

    fn control_cycle(&mut self) -> Result<()> {
        let Some(control) = &self.control else {
            return Ok(());
        };

        let readings = Readings::from_cache(self.bridge.cache(), self.house_power);
        let now = chrono::Local::now().time();

        let mut actuator = BridgeActuator::new(&mut self.bridge);
        control.run_cycle(&readings, now, &mut actuator);
        let actions = actuator.into_actions();

        self.perform(actions)
    }

    fn perform(&mut self, actions: Vec<Action>) -> Result<()> {
        for action in actions {
            let data = match action {
                Action::Publish(message) => mqtt::ChannelData::Message(message),
                Action::Subscribe(topic) => mqtt::ChannelData::Subscribe(topic),
                Action::Unsubscribe(topic) => mqtt::ChannelData::Unsubscribe(topic),
                Action::Schedule(timer, delay) => {
                    self.scheduler.schedule(timer, delay);
                    continue;
                }
            };

            if self.channels.to_mqtt.send(data).is_err() {
                bail!("send(to_mqtt) failed - channel closed?");
            }
        }

        Ok(())
    }
}
