use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectAttempt,
    ConnectSuccess,
    Disconnect,
}

impl ConnectionState {
    /// Next state after `event`. Events that make no sense in the current
    /// state leave it unchanged.
    pub fn on(self, event: ConnectionEvent) -> ConnectionState {
        use ConnectionEvent::*;
        use ConnectionState::*;
        match (self, event) {
            (_, Disconnect) => Disconnected,
            (Disconnected, ConnectAttempt) => Connecting,
            (Connecting, ConnectSuccess) => Connected,
            (state, _) => state,
        }
    }
}
