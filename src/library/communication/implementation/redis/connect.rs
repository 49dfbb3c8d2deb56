use super::{CONNECT_RETRY_INTERVAL, CONNECT_TIMEOUT};
use redis::aio::{MultiplexedConnection, PubSub};
use redis::{Client, RedisResult};
use std::future::Future;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Repeatedly attempts to establish a connection until one succeeds
///
/// Only the first failure is logged to prevent flooding the log while the server is unavailable.
async fn connect_with_retry<C, F, Fut>(kind: &'static str, connect: F) -> C
where
    F: Fn() -> Fut,
    Fut: Future<Output = RedisResult<C>>,
{
    let mut warn = true;

    loop {
        match timeout(CONNECT_TIMEOUT, connect()).await {
            Ok(Ok(connection)) => {
                debug!(kind, "Connected to redis");
                return connection;
            }
            Ok(Err(e)) => {
                if warn {
                    warn = false;
                    warn!(kind, "Unable to connect to redis server! ({})", e)
                }
            }
            Err(e) => {
                if warn {
                    warn = false;
                    warn!(kind, "Timed out while connecting to redis! ({})", e)
                }
            }
        }

        sleep(CONNECT_RETRY_INTERVAL).await;
    }
}

pub(super) async fn multiplexed(client: &Client) -> MultiplexedConnection {
    connect_with_retry("publisher", || client.get_multiplexed_async_connection()).await
}

pub(super) async fn pubsub(client: &Client) -> PubSub {
    connect_with_retry("subscriber", || client.get_async_pubsub()).await
}
