use crate::library::communication::{InboundMessage, MessageStream, SubscriptionSink};
use crate::library::EmptyResult;
use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use redis::aio::PubSubSink;
use redis::Msg;
use tracing::trace;

/// [`SubscriptionSink`] implementation using [`SUBSCRIBE`](https://redis.io/commands/subscribe)
#[derive(Clone)]
pub struct RedisSubscriptionSink {
    sink: PubSubSink,
}

impl RedisSubscriptionSink {
    /// Creates a new instance from the control half of a PubSub connection
    pub fn new(sink: PubSubSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl SubscriptionSink for RedisSubscriptionSink {
    async fn subscribe(&self, channel: &str) -> EmptyResult {
        let mut sink = self.sink.clone();
        sink.subscribe(channel).await?;

        Ok(())
    }
}

/// Converts the raw PubSub messages into [`InboundMessage`]s, dropping anything that is not UTF-8
pub fn message_stream<S>(stream: S) -> MessageStream
where
    S: Stream<Item = Msg> + Send + 'static,
{
    stream
        .filter_map(|message: Msg| {
            let channel = message.get_channel_name().to_owned();
            let inbound = match message.get_payload::<String>() {
                Ok(payload) => Some(InboundMessage::new(channel, payload)),
                Err(_) => {
                    trace!(%channel, "Dropping message with binary payload");
                    None
                }
            };

            future::ready(inbound)
        })
        .boxed()
}
