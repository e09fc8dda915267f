use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::channel::protocol::health_payload;
use crate::channel::state::ConnectionState;
use crate::channel::transport::Publisher;

/// Publish the health beacon to `topic` now and then every `every`. Runs until aborted.
///
/// Ticks that fall while the connection is not `Connected` are skipped, so no
/// beacons pile up in the client during an outage.
pub async fn run_health_loop(
    publisher: Arc<dyn Publisher>,
    state: watch::Receiver<ConnectionState>,
    server: String,
    topic: String,
    every: Duration,
) {
    let payload = match health_payload(&server) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(server = %server, error = %e, "cannot encode health payload");
            return;
        }
    };

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let connection = *state.borrow();
        if connection != ConnectionState::Connected {
            tracing::trace!(server = %server, state = ?connection, "health beacon skipped");
            continue;
        }
        match publisher.publish(&topic, payload.clone()) {
            Ok(()) => tracing::debug!(server = %server, topic = %topic, "health beacon sent"),
            Err(e) => tracing::warn!(server = %server, error = %e, "health beacon not sent"),
        }
    }
}
