// Single-worker FIFO. The worker thread is the only owner of the automation
// driver, so window, clipboard and input are never touched concurrently.
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use crate::dispatch::command::{Command, CommandResult, Receipt};
use crate::dispatch::fetcher::AssetFetcher;
use crate::errors::{RelayError, RelayResult};
use crate::executor::driver::AutomationDriver;

/// Builds the driver on the worker thread, the first time a command needs it.
pub type DriverFactory = Box<dyn FnMut() -> RelayResult<AutomationDriver> + Send>;

enum Job {
    Run {
        command: Command,
        reply: oneshot::Sender<CommandResult>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::UnboundedSender<Job>,
    /// Held across the closed check and the send, so nothing can land
    /// behind the shutdown sentinel.
    closed: Arc<Mutex<bool>>,
}

pub struct WorkerHandle {
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Wait until the worker has drained the queue up to the shutdown sentinel.
    pub fn join(self) -> RelayResult<()> {
        self.thread
            .join()
            .map_err(|_| RelayError::Io(std::io::Error::other("dispatch worker thread panicked")))
    }
}

impl DispatchQueue {
    pub fn spawn(fetcher: AssetFetcher, factory: DriverFactory) -> RelayResult<(Self, WorkerHandle)> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("dispatch-worker".into())
            .spawn(move || {
                let worker = Worker {
                    runtime,
                    fetcher,
                    factory,
                    driver: None,
                };
                worker.run(rx)
            })?;

        let queue = Self {
            tx,
            closed: Arc::new(Mutex::new(false)),
        };
        Ok((queue, WorkerHandle { thread }))
    }

    /// Accept a command for execution. Never blocks; the receipt resolves
    /// when the worker has finished with the command.
    pub fn enqueue(&self, command: Command) -> RelayResult<Receipt> {
        if !command.has_payload() {
            return Err(RelayError::EmptyCommand);
        }

        let id = command.id;
        let targets = command.targets.len();
        let (reply, rx) = oneshot::channel();
        {
            let closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
            if *closed {
                return Err(RelayError::QueueClosed);
            }
            self.tx
                .send(Job::Run { command, reply })
                .map_err(|_| RelayError::QueueClosed)?;
        }
        tracing::info!(command = %id, targets, "command queued");
        Ok(Receipt::new(id, rx))
    }

    /// Stop accepting commands. Everything queued so far is still executed.
    pub fn shutdown(&self) {
        let mut closed = self.closed.lock().unwrap_or_else(|e| e.into_inner());
        if !*closed {
            *closed = true;
            let _ = self.tx.send(Job::Shutdown);
            tracing::info!("dispatch queue closed");
        }
    }
}

struct Worker {
    runtime: tokio::runtime::Runtime,
    fetcher: AssetFetcher,
    factory: DriverFactory,
    driver: Option<AutomationDriver>,
}

impl Worker {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<Job>) {
        tracing::info!("dispatch worker started");
        while let Some(job) = rx.blocking_recv() {
            let (command, reply) = match job {
                Job::Run { command, reply } => (command, reply),
                Job::Shutdown => break,
            };

            let id = command.id;
            let result = match catch_unwind(AssertUnwindSafe(|| self.execute(&command))) {
                Ok(Ok(summary)) => CommandResult::ok(id, summary),
                Ok(Err(e)) => CommandResult::failed(id, e.to_string()),
                Err(payload) => {
                    // The UI may be half-way through a step; start from a fresh driver.
                    self.driver = None;
                    CommandResult::failed(id, format!("worker panicked: {}", panic_message(&*payload)))
                }
            };

            if result.success {
                tracing::info!(command = %id, message = %result.message, "command finished");
            } else {
                tracing::error!(command = %id, message = %result.message, "command failed");
            }
            if reply.send(result).is_err() {
                tracing::debug!(command = %id, "receipt dropped before completion");
            }
        }
        tracing::info!("dispatch worker stopped");
    }

    fn execute(&mut self, command: &Command) -> RelayResult<String> {
        if command.targets.is_empty() {
            return Ok("no target chats, nothing sent".into());
        }

        // Assets live until the end of this call, whichever way it exits.
        let (files, _assets) = self.runtime.block_on(self.fetcher.resolve(&command.image_urls));
        if command.texts.is_empty() && files.is_empty() {
            return Err(RelayError::AssetFetch {
                url: command.image_urls.join(", "),
                reason: "no image could be downloaded".into(),
            });
        }

        let driver = match self.driver.take() {
            Some(driver) => driver,
            None => (self.factory)()?,
        };
        let driver = self.driver.insert(driver);

        for target in &command.targets {
            driver.send_message(target, &command.texts, &files)?;
        }
        Ok(format!(
            "sent {} text(s) and {} file(s) to {} chat(s)",
            command.texts.len(),
            files.len(),
            command.targets.len()
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
