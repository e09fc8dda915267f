// MQTT transport built on rumqttc.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
};

use crate::channel::transport::{Publisher, Transport, TransportEvent};
use crate::config::ConnectionConfig;
use crate::errors::{RelayError, RelayResult};

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 16;

pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    endpoint: String,
    topic: String,
}

impl MqttTransport {
    pub fn new(config: &ConnectionConfig, keep_alive: Duration) -> Self {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("wxdispatch-{}", uuid::Uuid::new_v4().simple()));

        let mut options = MqttOptions::new(client_id, config.server.clone(), config.port);
        options.set_keep_alive(keep_alive.max(Duration::from_secs(5)));
        if let Some(username) = &config.username {
            options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Self {
            client,
            eventloop,
            endpoint: format!("{}:{}", config.server, config.port),
            topic: config.subscribe_topic.clone(),
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn connect(&mut self) -> RelayResult<()> {
        // The event loop opens the socket on its first poll after an error or
        // at start-up, so connecting means polling until the broker's ConnAck.
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(RelayError::Connection(format!(
                            "{} refused the connection: {:?}",
                            self.endpoint, ack.code
                        )));
                    }
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    return Err(RelayError::Connection(format!("{}: {e}", self.endpoint)));
                }
            }
        }

        // Requests queued while the broker was away may fill the request
        // channel. Only the event loop drains it, so keep polling until the
        // subscribe fits instead of awaiting room.
        let mut flushed = 0usize;
        loop {
            match self.client.try_subscribe(self.topic.clone(), QoS::AtMostOnce) {
                Ok(()) => break,
                Err(ClientError::TryRequest(_)) => {
                    self.eventloop.poll().await.map_err(|e| {
                        RelayError::Connection(format!("{}: {e}", self.endpoint))
                    })?;
                    flushed += 1;
                }
                Err(e) => {
                    return Err(RelayError::Connection(format!("subscribe {}: {e}", self.topic)));
                }
            }
        }
        if flushed > 0 {
            tracing::debug!(endpoint = %self.endpoint, flushed, "stale requests flushed before subscribe");
        }
        tracing::info!(endpoint = %self.endpoint, topic = %self.topic, "subscribed");
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return TransportEvent::Disconnected("broker sent DISCONNECT".into());
                }
                Ok(_) => continue,
                Err(e) => return TransportEvent::Disconnected(e.to_string()),
            }
        }
    }

    fn publisher(&self) -> Arc<dyn Publisher> {
        Arc::new(MqttPublisher {
            client: self.client.clone(),
        })
    }
}

pub struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> RelayResult<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| RelayError::Connection(format!("publish to {topic}: {e}")))
    }
}
