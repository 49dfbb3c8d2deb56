use super::{connect, message_stream, RedisPublisher, RedisSubscriptionSink};
use crate::library::communication::{MessageStream, Transport};
use crate::library::BoxedError;
use async_trait::async_trait;
use redis::Client;

/// [`Transport`] implementation based on Redis PubSub channels
///
/// Connections are retried until they succeed, so obtaining the publisher or subscriber
/// waits for the server to become available.
#[derive(Clone)]
pub struct RedisTransport {
    client: Client,
}

impl RedisTransport {
    /// Creates a new transport connecting to the given URL
    ///
    /// Fails if the URL can not be parsed, no connection is established yet.
    pub fn new(url: &str) -> Result<Self, BoxedError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }
}

#[async_trait]
impl Transport for RedisTransport {
    type Publisher = RedisPublisher;
    type Sink = RedisSubscriptionSink;

    async fn publisher(&self) -> Result<Self::Publisher, BoxedError> {
        let con = connect::multiplexed(&self.client).await;
        Ok(RedisPublisher::new(con))
    }

    async fn subscriber(&self) -> Result<(Self::Sink, MessageStream), BoxedError> {
        let (sink, stream) = connect::pubsub(&self.client).await.split();
        Ok((RedisSubscriptionSink::new(sink), message_stream(stream)))
    }
}
