pub mod channel;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod perception;

use std::time::Duration;

use crate::channel::control::ControlChannel;
use crate::channel::health::run_health_loop;
use crate::channel::mqtt::MqttTransport;
use crate::config::AppConfig;
use crate::dispatch::fetcher::AssetFetcher;
use crate::dispatch::queue::{DispatchQueue, DriverFactory};
use crate::errors::{RelayError, RelayResult};
use crate::executor::driver::AutomationDriver;

pub fn run() -> RelayResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = config::load_config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

/// Start one control channel and one health beacon per connection, all
/// feeding a single dispatch queue, and run until Ctrl+C.
pub async fn serve(config: AppConfig) -> RelayResult<()> {
    let fetcher = AssetFetcher::new(&config.fetch)?;
    let driver_config = config.clone();
    let factory: DriverFactory = Box::new(move || AutomationDriver::from_config(&driver_config));
    let (queue, worker) = DispatchQueue::spawn(fetcher, factory)?;

    let keep_alive = Duration::from_secs(config.channel.keep_alive_secs);
    let mut tasks = Vec::with_capacity(config.connections.len() * 2);
    for conn in &config.connections {
        let transport = MqttTransport::new(conn, keep_alive);
        let channel = ControlChannel::new(transport, queue.clone(), config.channel.reconnect_delay());
        tasks.push(tokio::spawn(run_health_loop(
            channel.publisher(),
            channel.state(),
            conn.server.clone(),
            conn.subscribe_topic.clone(),
            config.channel.health_interval(),
        )));
        tasks.push(tokio::spawn(channel.run()));
        tracing::info!(server = %conn.server, port = conn.port, topic = %conn.subscribe_topic, "control channel started");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, draining queued commands");
    for task in &tasks {
        task.abort();
    }
    queue.shutdown();
    tokio::task::spawn_blocking(move || worker.join())
        .await
        .map_err(|e| RelayError::Io(std::io::Error::other(e)))??;
    tracing::info!("wxdispatch stopped");
    Ok(())
}
