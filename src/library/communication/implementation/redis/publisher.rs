use crate::library::communication::MessagePublisher;
use crate::library::EmptyResult;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::trace;

/// [`MessagePublisher`] implementation using [`PUBLISH`](https://redis.io/commands/publish)
#[derive(Clone)]
pub struct RedisPublisher {
    con: MultiplexedConnection,
}

impl RedisPublisher {
    /// Creates a new instance from an existing redis connection
    pub fn new(con: MultiplexedConnection) -> Self {
        Self { con }
    }
}

#[async_trait]
impl MessagePublisher for RedisPublisher {
    async fn publish(&self, channel: &str, message: String) -> EmptyResult {
        // Clones share the underlying connection
        let mut con = self.con.clone();
        let receivers: usize = con.publish(channel, message).await?;

        trace!(channel, receivers, "Published message");

        Ok(())
    }
}
