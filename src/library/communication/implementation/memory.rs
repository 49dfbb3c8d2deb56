//! In-process [`Transport`] implementation
//!
//! Every [`MemoryTransport`] clone shares one broker which fans published messages out to all
//! subscriptions of the channel. Besides connecting engines within the same process, a transport
//! created with [`MemoryTransport::recording`] keeps every message that passes through it, which
//! makes it the transport of choice for tests.

use crate::library::communication::{
    InboundMessage, MessagePublisher, MessageStream, SubscriptionSink, Transport,
};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{unfold, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures simulated by a [`MemoryTransport`]
#[derive(Debug, Error)]
pub enum MemoryTransportError {
    /// Publishing has been disabled using [`MemoryTransport::fail_publishing`]
    #[error("publishing is disabled")]
    PublishingDisabled,
    /// Subscribing has been disabled using [`MemoryTransport::fail_subscribing`]
    #[error("subscribing is disabled")]
    SubscribingDisabled,
}

type ChannelSet = Arc<Mutex<HashSet<String>>>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Subscription {
    channels: ChannelSet,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

#[derive(Default)]
struct Broker {
    subscriptions: Mutex<Vec<Subscription>>,
    /// Only present when recording, otherwise delivered messages are not retained
    published: Option<Mutex<Vec<InboundMessage>>>,
    subscribe_calls: AtomicUsize,
    fail_publishing: AtomicBool,
    fail_subscribing: AtomicBool,
}

impl Broker {
    fn deliver(&self, message: InboundMessage) {
        if let Some(published) = &self.published {
            locked(published).push(message.clone());
        }

        // Closed subscriptions are pruned on the fly
        locked(&self.subscriptions).retain(|subscription| {
            if !locked(&subscription.channels).contains(&message.channel) {
                return !subscription.tx.is_closed();
            }

            subscription.tx.send(message.clone()).is_ok()
        });
    }
}

/// Transport connecting everybody holding a clone of the same instance
#[derive(Clone, Default)]
pub struct MemoryTransport {
    broker: Arc<Broker>,
}

impl MemoryTransport {
    /// Creates a new transport with its own, isolated broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new transport which records every message for later inspection
    /// using [`published`](Self::published). The record is never truncated.
    pub fn recording() -> Self {
        let broker = Broker {
            published: Some(Mutex::default()),
            ..Broker::default()
        };

        Self {
            broker: Arc::new(broker),
        }
    }

    /// Publishes a raw payload, bypassing any [`MessagePublisher`]
    pub fn inject(&self, channel: &str, payload: &str) {
        self.broker.deliver(InboundMessage::new(channel, payload));
    }

    /// Every message published so far, in order. Always empty unless the transport is
    /// [`recording`](Self::recording).
    pub fn published(&self) -> Vec<InboundMessage> {
        self.broker
            .published
            .as_ref()
            .map(|published| locked(published).clone())
            .unwrap_or_default()
    }

    /// Number of subscribe calls received across all sinks
    pub fn subscribe_calls(&self) -> usize {
        self.broker.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Makes all subsequent publish calls fail (or succeed again)
    pub fn fail_publishing(&self, fail: bool) {
        self.broker.fail_publishing.store(fail, Ordering::SeqCst);
    }

    /// Makes all subsequent subscribe calls fail (or succeed again)
    pub fn fail_subscribing(&self, fail: bool) {
        self.broker.fail_subscribing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Publisher = MemoryPublisher;
    type Sink = MemorySubscriptionSink;

    async fn publisher(&self) -> Result<Self::Publisher, BoxedError> {
        Ok(MemoryPublisher {
            broker: self.broker.clone(),
        })
    }

    async fn subscriber(&self) -> Result<(Self::Sink, MessageStream), BoxedError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let channels = ChannelSet::default();

        locked(&self.broker.subscriptions).push(Subscription {
            channels: channels.clone(),
            tx,
        });

        let sink = MemorySubscriptionSink {
            broker: self.broker.clone(),
            channels,
        };

        let stream = unfold(rx, |mut rx| async move {
            let message = rx.recv().await?;
            Some((message, rx))
        })
        .boxed();

        Ok((sink, stream))
    }
}

/// Publishing half of a [`MemoryTransport`]
pub struct MemoryPublisher {
    broker: Arc<Broker>,
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, channel: &str, message: String) -> EmptyResult {
        if self.broker.fail_publishing.load(Ordering::SeqCst) {
            return Err(MemoryTransportError::PublishingDisabled.into());
        }

        self.broker.deliver(InboundMessage::new(channel, message));
        Ok(())
    }
}

/// Subscription control of a [`MemoryTransport`]
pub struct MemorySubscriptionSink {
    broker: Arc<Broker>,
    channels: ChannelSet,
}

#[async_trait]
impl SubscriptionSink for MemorySubscriptionSink {
    async fn subscribe(&self, channel: &str) -> EmptyResult {
        if self.broker.fail_subscribing.load(Ordering::SeqCst) {
            return Err(MemoryTransportError::SubscribingDisabled.into());
        }

        self.broker.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.channels).insert(channel.to_owned());

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn deliver_to_subscribed_channels_only() {
        let transport = MemoryTransport::recording();
        let publisher = transport.publisher().await.unwrap();
        let (sink, mut messages) = transport.subscriber().await.unwrap();

        sink.subscribe("wanted").await.unwrap();
        publisher.publish("unwanted", "a".into()).await.unwrap();
        publisher.publish("wanted", "b".into()).await.unwrap();

        assert_eq!(
            messages.next().await,
            Some(InboundMessage::new("wanted", "b"))
        );
        assert_eq!(messages.next().now_or_never(), None);
        assert_eq!(transport.published().len(), 2);
    }

    #[tokio::test]
    async fn fan_out_to_every_subscriber() {
        let transport = MemoryTransport::new();
        let (first_sink, mut first) = transport.subscriber().await.unwrap();
        let (second_sink, mut second) = transport.subscriber().await.unwrap();

        first_sink.subscribe("chan").await.unwrap();
        second_sink.subscribe("chan").await.unwrap();
        transport.inject("chan", "hello");

        assert_eq!(first.next().await.unwrap().payload, "hello");
        assert_eq!(second.next().await.unwrap().payload, "hello");
        assert_eq!(transport.subscribe_calls(), 2);
    }

    #[tokio::test]
    async fn simulate_failures() {
        let transport = MemoryTransport::recording();
        let publisher = transport.publisher().await.unwrap();
        let (sink, _messages) = transport.subscriber().await.unwrap();

        transport.fail_publishing(true);
        transport.fail_subscribing(true);

        assert!(publisher.publish("chan", "a".into()).await.is_err());
        assert!(sink.subscribe("chan").await.is_err());
        assert!(transport.published().is_empty());
        assert_eq!(transport.subscribe_calls(), 0);
    }

    #[tokio::test]
    async fn retain_nothing_unless_recording() {
        let transport = MemoryTransport::new();
        let publisher = transport.publisher().await.unwrap();
        let (sink, mut messages) = transport.subscriber().await.unwrap();
        sink.subscribe("chan").await.unwrap();

        for i in 0..1000 {
            publisher.publish("chan", i.to_string()).await.unwrap();
            assert_eq!(messages.next().await.unwrap().payload, i.to_string());
        }

        assert!(transport.published().is_empty());
        assert!(transport.broker.published.is_none());
    }
}
