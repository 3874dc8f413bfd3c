use crate::prelude::*;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

pub const LWT_TOPIC: &str = "solarflow/LWT";

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            retain: false,
            payload: payload.into(),
        }
    }

    pub fn payload_f64(&self) -> Result<f64> {
        self.payload
            .trim()
            .parse()
            .map_err(|err| anyhow!("payload_f64 {:?}: {}", self.payload, err))
    }

    pub fn payload_bool(&self) -> bool {
        matches!(
            self.payload.trim().to_ascii_lowercase().as_str(),
            "1" | "t" | "true" | "on" | "y" | "yes"
        )
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Subscribe(String),
    Unsubscribe(String),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone)]
pub struct Mqtt {
    config: Config,
    channels: Channels,
    // everything subscribed so far, replayed after every reconnect
    subscriptions: Arc<Mutex<BTreeSet<String>>>,
}

impl Mqtt {
    pub fn new(config: Config, channels: Channels) -> Self {
        Self {
            config,
            channels,
            subscriptions: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// `outbound` must be subscribed to `to_mqtt` before anything is sent on it.
    pub async fn start(&self, outbound: broadcast::Receiver<ChannelData>) -> Result<()> {
        let c = self.config.mqtt();

        let mut options = MqttOptions::new(c.client_id(), c.host(), c.port());

        let will = LastWill {
            topic: LWT_TOPIC.to_owned(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(std::time::Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 64);

        futures::try_join!(
            self.receiver(client.clone(), eventloop),
            self.sender(client, outbound)
        )?;

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    fn on_connect(&self, client: &AsyncClient) {
        info!("connected to mqtt broker");

        if let Err(err) = client.try_publish(LWT_TOPIC, QoS::AtLeastOnce, true, "online") {
            error!("failed to publish availability: {}", err);
        }

        let topics: Vec<String> = match self.subscriptions.lock() {
            Ok(subscriptions) => subscriptions.iter().cloned().collect(),
            Err(_) => return,
        };

        for topic in topics {
            debug!("resubscribing to {}", topic);
            if let Err(err) = client.try_subscribe(&topic, QoS::AtMostOnce) {
                error!("failed to subscribe to {}: {}", topic, err);
            }
        }
    }

    // mqtt -> coordinator
    async fn receiver(&self, client: AsyncClient, mut eventloop: EventLoop) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();
        // keep polling after shutdown so the final publishes and the disconnect get flushed
        let mut stopping = false;

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => self.on_connect(&client),
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        self.handle_message(publish)?;
                    }
                    Err(_) if stopping => break,
                    Err(e) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                },
                data = shutdown.recv(), if !stopping => {
                    if let Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) = data {
                        stopping = true;
                    }
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(2)), if stopping => break,
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    fn handle_message(&self, publish: Publish) -> Result<()> {
        let payload = match String::from_utf8(publish.payload.to_vec()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("{}", Error::decode(&publish.topic, err));
                return Ok(());
            }
        };

        let message = Message {
            topic: publish.topic,
            retain: publish.retain,
            payload,
        };
        debug!("RX: {:?}", message);

        if self
            .channels
            .from_mqtt
            .send(ChannelData::Message(message))
            .is_err()
        {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator -> mqtt
    async fn sender(
        &self,
        client: AsyncClient,
        mut receiver: broadcast::Receiver<ChannelData>,
    ) -> Result<()> {
        use ChannelData::*;

        loop {
            match receiver.recv().await {
                Ok(Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client
                        .publish(LWT_TOPIC, QoS::AtLeastOnce, true, "offline")
                        .await;
                    let _ = client.disconnect().await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("mqtt sender lagged, {} messages dropped", n);
                }
                Ok(Subscribe(topic)) => {
                    debug!("subscribing to {}", topic);
                    if let Ok(mut subscriptions) = self.subscriptions.lock() {
                        subscriptions.insert(topic.clone());
                    }
                    client.subscribe(topic, QoS::AtMostOnce).await?;
                }
                Ok(Unsubscribe(topic)) => {
                    debug!("unsubscribing from {}", topic);
                    if let Ok(mut subscriptions) = self.subscriptions.lock() {
                        subscriptions.remove(&topic);
                    }
                    client.unsubscribe(topic).await?;
                }
                Ok(Message(message)) => {
                    debug!("publishing: {} = {}", message.topic, message.payload);
                    if let Err(err) = client
                        .publish(
                            &message.topic,
                            QoS::AtLeastOnce,
                            message.retain,
                            message.payload.into_bytes(),
                        )
                        .await
                    {
                        error!("MQTT publish to {} failed: {:?}", message.topic, err);
                    }
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }
}
