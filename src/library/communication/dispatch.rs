//! Routing of inbound messages

use super::message::{encode, Message, MessageType};
use super::{Handler, HandlerRegistry, MessagePublisher, MessageStream, PendingRequestTable};
use futures::StreamExt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{instrument, trace, warn};

/// Callback for every message arriving on a subscribed channel
///
/// Responses resolve the matching pending request, requests are answered by the handler registered
/// for the channel. Everything that can not be decoded is dropped silently, channels may be shared
/// with unrelated traffic.
///
/// Handlers are executed inline by default, which means that a slow handler holds up all messages
/// behind it. When `offload_handlers` is set, each request is answered on a separate task and the
/// handler itself runs on the blocking thread pool.
pub struct Dispatcher<P> {
    pending: Arc<PendingRequestTable>,
    registry: Arc<HandlerRegistry>,
    publisher: Arc<P>,
    offload_handlers: bool,
}

impl<P> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
            registry: self.registry.clone(),
            publisher: self.publisher.clone(),
            offload_handlers: self.offload_handlers,
        }
    }
}

impl<P> Dispatcher<P>
where
    P: MessagePublisher + Send + Sync + 'static,
{
    /// Creates a new instance from raw parts
    pub fn new(
        pending: Arc<PendingRequestTable>,
        registry: Arc<HandlerRegistry>,
        publisher: Arc<P>,
        offload_handlers: bool,
    ) -> Self {
        Self {
            pending,
            registry,
            publisher,
            offload_handlers,
        }
    }

    /// Dispatches every message of the stream until it ends
    #[instrument(skip_all)]
    pub async fn run(self, mut messages: MessageStream) {
        while let Some(message) = messages.next().await {
            self.dispatch(&message.channel, &message.payload).await;
        }

        warn!("Inbound message stream ended");
    }

    /// Handles one raw message received on a channel
    pub async fn dispatch(&self, channel: &str, payload: &str) {
        let message = match Message::decode(payload) {
            Some(message) => message,
            None => return,
        };

        match message.message_type {
            MessageType::Response => {
                if !self.pending.resolve(&message.correlation_id, message.body) {
                    trace!(channel, correlation_id = %message.correlation_id, "Discarding unmatched response");
                }
            }
            MessageType::Request if self.offload_handlers => {
                let dispatcher = self.clone();
                let channel = channel.to_owned();

                tokio::spawn(async move { dispatcher.answer(&channel, message).await });
            }
            MessageType::Request => self.answer(channel, message).await,
        }
    }

    #[instrument(skip(self, message), fields(correlation_id = %message.correlation_id))]
    async fn answer(&self, channel: &str, message: Message) {
        let handler = match self.registry.lookup(channel) {
            Some(handler) => handler,
            None => {
                trace!("No handler registered for channel");
                return;
            }
        };

        let reply = match self.invoke(handler, message.body).await {
            Some(reply) => reply,
            None => return,
        };

        let response = encode(MessageType::Response, &message.correlation_id, &reply);

        if let Err(error) = self.publisher.publish(channel, response).await {
            warn!(%error, "Unable to publish response");
        }
    }

    /// Runs the handler, returning `None` if it declined or panicked
    async fn invoke(&self, handler: Handler, body: String) -> Option<String> {
        let outcome = if self.offload_handlers {
            tokio::task::spawn_blocking(move || handler(&body))
                .await
                .map_err(|_| ())
        } else {
            catch_unwind(AssertUnwindSafe(|| handler(&body))).map_err(|_| ())
        };

        match outcome {
            Ok(Some(reply)) => Some(reply),
            Ok(None) => {
                trace!("Handler declined to respond");
                None
            }
            Err(()) => {
                warn!("Handler panicked while processing request");
                None
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::implementation::memory::{MemoryPublisher, MemoryTransport};
    use crate::library::communication::{SubscriptionSink, Transport};
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use uuid::Uuid;

    const CHANNEL: &str = "chan";

    struct Fixture {
        transport: MemoryTransport,
        pending: Arc<PendingRequestTable>,
        registry: Arc<HandlerRegistry>,
        dispatcher: Dispatcher<MemoryPublisher>,
    }

    async fn fixture(offload_handlers: bool) -> Fixture {
        let transport = MemoryTransport::recording();
        let publisher = Arc::new(transport.publisher().await.unwrap());
        let pending = Arc::new(PendingRequestTable::new(Duration::from_secs(5)));
        let registry = Arc::new(HandlerRegistry::new());
        let dispatcher =
            Dispatcher::new(pending.clone(), registry.clone(), publisher, offload_handlers);

        Fixture {
            transport,
            pending,
            registry,
            dispatcher,
        }
    }

    fn uppercase() -> Handler {
        Arc::new(|body: &str| Some(body.to_uppercase()))
    }

    #[tokio::test]
    async fn answer_requests_with_handler_output() {
        let fixture = fixture(false).await;
        fixture.registry.register(CHANNEL, uppercase());

        let id = Uuid::new_v4();
        let request = encode(MessageType::Request, &id, "hello");
        fixture.dispatcher.dispatch(CHANNEL, &request).await;

        let published = fixture.transport.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].channel, CHANNEL);
        assert_eq!(
            Message::decode(&published[0].payload),
            Some(Message::new(MessageType::Response, id, "HELLO"))
        );
    }

    #[tokio::test]
    async fn resolve_pending_requests_with_responses() {
        let fixture = fixture(false).await;
        let (id, future) = fixture.pending.create();

        let response = encode(MessageType::Response, &id, "HELLO");
        fixture.dispatcher.dispatch(CHANNEL, &response).await;

        assert_eq!(future.await, Some("HELLO".to_string()));
        assert!(fixture.transport.published().is_empty());
    }

    #[tokio::test]
    async fn ignore_requests_without_handler() {
        let fixture = fixture(false).await;
        fixture.registry.register("elsewhere", uppercase());

        let request = encode(MessageType::Request, &Uuid::new_v4(), "hello");
        fixture.dispatcher.dispatch(CHANNEL, &request).await;

        assert!(fixture.transport.published().is_empty());
    }

    #[tokio::test]
    async fn ignore_unmatched_responses() {
        let fixture = fixture(false).await;
        let (_, future) = fixture.pending.create();

        let response = encode(MessageType::Response, &Uuid::new_v4(), "stray");
        fixture.dispatcher.dispatch(CHANNEL, &response).await;

        assert_eq!(fixture.pending.len(), 1);
        assert_eq!(future.now_or_never(), None);
    }

    #[tokio::test]
    async fn discard_malformed_messages() {
        let fixture = fixture(false).await;
        fixture.registry.register(CHANNEL, uppercase());
        let (id, future) = fixture.pending.create();

        let garbage = vec![
            "REQUEST:notauuid".to_string(),
            "FOO:abc-123:body".to_string(),
            format!("FOO:{}:body", id),
            format!("RESPONSE:{}", id),
            String::new(),
        ];

        for message in &garbage {
            fixture.dispatcher.dispatch(CHANNEL, message).await;
        }

        assert!(fixture.transport.published().is_empty());
        assert_eq!(fixture.pending.len(), 1);
        assert_eq!(future.now_or_never(), None);
    }

    #[tokio::test]
    async fn stay_silent_when_handler_declines() {
        let fixture = fixture(false).await;
        fixture
            .registry
            .register(CHANNEL, Arc::new(|_: &str| -> Option<String> { None }));

        let request = encode(MessageType::Request, &Uuid::new_v4(), "hello");
        fixture.dispatcher.dispatch(CHANNEL, &request).await;

        assert!(fixture.transport.published().is_empty());
    }

    #[tokio::test]
    async fn survive_panicking_handlers() {
        let fixture = fixture(false).await;
        fixture
            .registry
            .register("faulty", Arc::new(|_: &str| -> Option<String> { panic!("handler failure") }));
        fixture.registry.register(CHANNEL, uppercase());

        let request = encode(MessageType::Request, &Uuid::new_v4(), "boom");
        fixture.dispatcher.dispatch("faulty", &request).await;
        assert!(fixture.transport.published().is_empty());

        let request = encode(MessageType::Request, &Uuid::new_v4(), "fine");
        fixture.dispatcher.dispatch(CHANNEL, &request).await;
        assert_eq!(fixture.transport.published().len(), 1);
    }

    #[tokio::test]
    async fn survive_panicking_handlers_when_offloading() {
        let fixture = fixture(true).await;
        fixture
            .registry
            .register("faulty", Arc::new(|_: &str| -> Option<String> { panic!("handler failure") }));
        fixture.registry.register(CHANNEL, uppercase());

        let (sink, mut messages) = fixture.transport.subscriber().await.unwrap();
        sink.subscribe("faulty").await.unwrap();
        sink.subscribe(CHANNEL).await.unwrap();

        let request = encode(MessageType::Request, &Uuid::new_v4(), "boom");
        fixture.dispatcher.dispatch("faulty", &request).await;

        let id = Uuid::new_v4();
        let request = encode(MessageType::Request, &id, "y");
        fixture.dispatcher.dispatch(CHANNEL, &request).await;

        let response = messages.next().await.unwrap();
        assert_eq!(response.channel, CHANNEL);
        assert_eq!(
            Message::decode(&response.payload),
            Some(Message::new(MessageType::Response, id, "Y"))
        );

        let silence = tokio::time::timeout(Duration::from_millis(50), messages.next()).await;
        assert!(silence.is_err());
        assert_eq!(fixture.transport.published().len(), 1);
    }

    #[tokio::test]
    async fn answer_on_separate_task_when_offloading() {
        let fixture = fixture(true).await;
        fixture.registry.register(CHANNEL, uppercase());

        let (sink, mut messages) = fixture.transport.subscriber().await.unwrap();
        sink.subscribe(CHANNEL).await.unwrap();

        let id = Uuid::new_v4();
        let request = encode(MessageType::Request, &id, "hello");
        fixture.dispatcher.dispatch(CHANNEL, &request).await;

        let response = messages.next().await.unwrap();
        assert_eq!(
            Message::decode(&response.payload),
            Some(Message::new(MessageType::Response, id, "HELLO"))
        );
    }
}
