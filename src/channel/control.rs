// Control channel: keeps one broker session alive and turns inbound
// requests into queued commands.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::channel::protocol::{parse_inbound, Inbound};
use crate::channel::state::{ConnectionEvent, ConnectionState};
use crate::channel::transport::{Publisher, Transport, TransportEvent};
use crate::dispatch::command::Receipt;
use crate::dispatch::queue::DispatchQueue;

pub struct ControlChannel<T: Transport> {
    transport: T,
    queue: DispatchQueue,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
}

impl<T: Transport> ControlChannel<T> {
    pub fn new(transport: T, queue: DispatchQueue, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            queue,
            reconnect_delay,
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn publisher(&self) -> Arc<dyn Publisher> {
        self.transport.publisher()
    }

    /// Connect, receive until the session drops, wait, repeat. Never returns;
    /// stop it by aborting its task.
    pub async fn run(mut self) {
        let endpoint = self.transport.endpoint();
        loop {
            self.transition(ConnectionEvent::ConnectAttempt);
            match self.transport.connect().await {
                Ok(()) => {
                    self.transition(ConnectionEvent::ConnectSuccess);
                    tracing::info!(endpoint = %endpoint, "control channel connected");
                    let reason = self.receive().await;
                    tracing::warn!(endpoint = %endpoint, reason = %reason, "control channel disconnected");
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "connect failed");
                }
            }
            self.transition(ConnectionEvent::Disconnect);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn receive(&mut self) -> String {
        loop {
            match self.transport.next_event().await {
                TransportEvent::Message { topic, payload } => {
                    if let Some(receipt) = self.handle_message(&topic, &payload) {
                        tokio::spawn(report_outcome(receipt));
                    }
                }
                TransportEvent::Disconnected(reason) => return reason,
            }
        }
    }

    /// Parse one inbound message and queue it. Bad input is logged and dropped.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Option<Receipt> {
        let request = match parse_inbound(payload) {
            Ok(Inbound::SendMessage(request)) => request,
            Ok(Inbound::Ignored(method)) => {
                tracing::debug!(topic = %topic, method = ?method, "message ignored");
                return None;
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "dropping malformed message");
                return None;
            }
        };

        match self.queue.enqueue(request.into_command()) {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "command rejected");
                None
            }
        }
    }

    fn transition(&self, event: ConnectionEvent) {
        self.state_tx.send_modify(|state| {
            let next = state.on(event);
            if next != *state {
                tracing::debug!(from = ?*state, to = ?next, "connection state");
            }
            *state = next;
        });
    }
}

async fn report_outcome(receipt: Receipt) {
    let id = receipt.command_id();
    match receipt.wait().await {
        Ok(result) if result.success => {
            tracing::info!(command = %id, message = %result.message, "command delivered");
        }
        Ok(result) => tracing::warn!(command = %id, message = %result.message, "command not delivered"),
        Err(e) => tracing::warn!(command = %id, error = %e, "no result for command"),
    }
}
