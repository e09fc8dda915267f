// Wire format of the control channel.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::command::Command;
use crate::errors::{RelayError, RelayResult};

pub const SEND_MESSAGE_METHOD: &str = "sendWechatMessage";

/// `{"method": "sendWechatMessage", "chatNames": [..], "messages": [..]?, "imageUrls": [..]?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub chat_names: Vec<String>,
    #[serde(default)]
    pub messages: Option<Vec<String>>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
}

impl SendMessageRequest {
    pub fn into_command(self) -> Command {
        Command::new(
            self.chat_names,
            self.messages.unwrap_or_default(),
            self.image_urls.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    SendMessage(SendMessageRequest),
    /// Anything without a known `method`, including our own health beacons.
    Ignored(Option<String>),
}

pub fn parse_inbound(payload: &[u8]) -> RelayResult<Inbound> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| RelayError::MalformedCommand(format!("payload is not JSON: {e}")))?;
    let method = value
        .as_object()
        .ok_or_else(|| RelayError::MalformedCommand("payload is not a JSON object".into()))?
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_owned);

    match method.as_deref() {
        Some(SEND_MESSAGE_METHOD) => serde_json::from_value(value)
            .map(Inbound::SendMessage)
            .map_err(|e| RelayError::MalformedCommand(format!("{SEND_MESSAGE_METHOD}: {e}"))),
        _ => Ok(Inbound::Ignored(method)),
    }
}

/// `{"<server> healthStatus": "OK"}`
pub fn health_payload(server: &str) -> RelayResult<Vec<u8>> {
    let mut body = serde_json::Map::new();
    body.insert(format!("{server} healthStatus"), Value::String("OK".into()));
    Ok(serde_json::to_vec(&Value::Object(body))?)
}
