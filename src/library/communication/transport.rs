use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Message received on a subscribed channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel the message has been published on
    pub channel: String,
    /// Raw message content
    pub payload: String,
}

impl InboundMessage {
    /// Creates a new instance from its parts
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Stream of all messages arriving on subscribed channels
pub type MessageStream = BoxStream<'static, InboundMessage>;

/// Fire-and-forget publishing of messages to a channel
#[async_trait]
pub trait MessagePublisher {
    /// Broadcasts a message to everybody currently subscribed to the channel
    async fn publish(&self, channel: &str, message: String) -> EmptyResult;
}

/// Control half of a subscription connection
#[async_trait]
pub trait SubscriptionSink {
    /// Adds a channel to the set of subscribed channels
    ///
    /// Messages on the channel will show up in the [`MessageStream`] obtained alongside this sink.
    async fn subscribe(&self, channel: &str) -> EmptyResult;
}

/// Publish/subscribe messaging system an [`Engine`](super::Engine) is built upon
///
/// Two independent connections are requested, one for publishing and one for listening. This way
/// publishing never has to wait for a connection that is blocked listening for messages.
#[async_trait]
pub trait Transport {
    /// [`MessagePublisher`] implementation type
    type Publisher: MessagePublisher + Send + Sync + 'static;
    /// [`SubscriptionSink`] implementation type
    type Sink: SubscriptionSink + Send + Sync + 'static;

    /// Opens a connection used for publishing
    async fn publisher(&self) -> Result<Self::Publisher, BoxedError>;

    /// Opens a connection used for listening
    async fn subscriber(&self) -> Result<(Self::Sink, MessageStream), BoxedError>;
}
