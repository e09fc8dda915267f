use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::RelayResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message { topic: String, payload: Vec<u8> },
    /// The session is gone; `connect` must be called again.
    Disconnected(String),
}

/// Broker session used by the control channel.
/// The MQTT client is one implementation; tests script their own.
#[async_trait]
pub trait Transport: Send {
    /// `host:port`, for logs.
    fn endpoint(&self) -> String;

    /// Open a session and subscribe. Errors leave the transport ready for another attempt.
    async fn connect(&mut self) -> RelayResult<()>;

    /// Next inbound message, or the reason the session ended.
    async fn next_event(&mut self) -> TransportEvent;

    fn publisher(&self) -> Arc<dyn Publisher>;
}

/// Fire-and-forget outbound messages: QoS 0, not retained, never awaited.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> RelayResult<()>;
}
