use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::{RelayError, RelayResult};

/// One delivery request: every text and every image goes to every target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub targets: Vec<String>,
    pub texts: Vec<String>,
    pub image_urls: Vec<String>,
}

impl Command {
    pub fn new(targets: Vec<String>, texts: Vec<String>, image_urls: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            targets,
            texts,
            image_urls,
        }
    }

    pub fn has_payload(&self) -> bool {
        !self.texts.is_empty() || !self.image_urls.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_id: Uuid,
    pub success: bool,
    pub message: String,
    pub finished_at: DateTime<Utc>,
}

impl CommandResult {
    pub fn ok(command_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            command_id,
            success: true,
            message: message.into(),
            finished_at: Utc::now(),
        }
    }

    pub fn failed(command_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            command_id,
            success: false,
            message: message.into(),
            finished_at: Utc::now(),
        }
    }
}

/// Acceptance handle returned by `enqueue`. Resolves once the worker is done
/// with the command.
#[derive(Debug)]
pub struct Receipt {
    command_id: Uuid,
    rx: oneshot::Receiver<CommandResult>,
}

impl Receipt {
    pub(crate) fn new(command_id: Uuid, rx: oneshot::Receiver<CommandResult>) -> Self {
        Self { command_id, rx }
    }

    pub fn command_id(&self) -> Uuid {
        self.command_id
    }

    pub async fn wait(self) -> RelayResult<CommandResult> {
        self.rx.await.map_err(|_| RelayError::QueueClosed)
    }

    /// Blocking variant for callers outside a runtime.
    pub fn blocking_wait(self) -> RelayResult<CommandResult> {
        self.rx.blocking_recv().map_err(|_| RelayError::QueueClosed)
    }
}
