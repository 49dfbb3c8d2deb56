use super::message::{encode, MessageType};
use super::{
    Dispatcher, EngineError, EngineOptions, Handler, HandlerRegistry, MessagePublisher,
    PendingRequestTable, ResponseFuture, SubscriptionSink, Transport,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

/// Entry point for sending requests and answering them
///
/// Owns two transport connections, the table of pending requests and the handler registry.
/// Two background tasks are spawned on construction: one dispatching inbound messages and one
/// expiring pending requests. Both are stopped when the engine is dropped, at which point all
/// outstanding [`ResponseFuture`]s resolve to `None`.
///
/// Instances are fully independent, multiple engines may coexist within a process.
pub struct Engine<T: Transport> {
    pending: Arc<PendingRequestTable>,
    registry: Arc<HandlerRegistry>,
    publisher: Arc<T::Publisher>,
    sink: Mutex<T::Sink>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T> Engine<T>
where
    T: Transport,
{
    /// Connects to the transport and starts processing inbound messages
    pub async fn connect(transport: &T, options: EngineOptions) -> Result<Self, EngineError> {
        options.validate()?;

        let publisher = Arc::new(
            transport
                .publisher()
                .await
                .map_err(EngineError::ConnectionFailed)?,
        );
        let (sink, messages) = transport
            .subscriber()
            .await
            .map_err(EngineError::ConnectionFailed)?;

        let pending = Arc::new(PendingRequestTable::new(options.timeout));
        let registry = Arc::new(HandlerRegistry::new());
        let dispatcher = Dispatcher::new(
            pending.clone(),
            registry.clone(),
            publisher.clone(),
            options.offload_handlers,
        );

        let listener = tokio::spawn(dispatcher.run(messages));
        let reaper = {
            let pending = pending.clone();
            tokio::spawn(async move { pending.reap().await })
        };

        debug!(timeout = ?options.timeout, offload_handlers = options.offload_handlers, "Engine started");

        Ok(Self {
            pending,
            registry,
            publisher,
            sink: Mutex::new(sink),
            tasks: vec![listener, reaper],
        })
    }

    /// Publishes a request on the channel and returns a future for its response
    ///
    /// The future resolves to the body of the first matching response or to `None` once the
    /// timeout has passed. The engine subscribes to the channel beforehand if it has not done
    /// so yet, otherwise the response could not be received.
    #[instrument(skip(self, body))]
    pub async fn request(&self, channel: &str, body: &str) -> Result<ResponseFuture, EngineError> {
        self.ensure_subscribed(channel).await?;

        let (correlation_id, response) = self.pending.create();
        let message = encode(MessageType::Request, &correlation_id, body);

        if let Err(source) = self.publisher.publish(channel, message).await {
            self.pending.withdraw(&correlation_id);
            return Err(EngineError::PublishFailed {
                channel: channel.to_owned(),
                source,
            });
        }

        trace!(%correlation_id, "Published request");

        Ok(response)
    }

    /// Answers all requests on the channel using the given handler
    ///
    /// Replaces any handler previously registered for the channel.
    pub async fn respond<F>(&self, channel: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.register(channel, Arc::new(move |body: &str| Some(handler(body))))
            .await
    }

    /// Same as [`respond`](Self::respond) but the handler may decline to answer by returning `None`
    pub async fn respond_optional<F>(&self, channel: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.register(channel, Arc::new(handler)).await
    }

    /// Number of requests still awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    #[instrument(skip(self, handler))]
    async fn register(&self, channel: &str, handler: Handler) -> Result<(), EngineError> {
        if self.registry.register(channel, handler) {
            debug!("Registered handler");
        } else {
            debug!("Replaced handler");
        }

        self.ensure_subscribed(channel).await
    }

    /// Subscribes to the channel unless that happened before
    ///
    /// The channel is only marked as subscribed once the transport confirmed it, concurrent callers
    /// wait for the subscription to complete.
    async fn ensure_subscribed(&self, channel: &str) -> Result<(), EngineError> {
        if self.registry.is_subscribed(channel) {
            return Ok(());
        }

        let sink = self.sink.lock().await;
        if self.registry.is_subscribed(channel) {
            return Ok(());
        }

        debug!(channel, "Subscribing to channel");
        sink.subscribe(channel)
            .await
            .map_err(|source| EngineError::SubscribeFailed {
                channel: channel.to_owned(),
                source,
            })?;

        self.registry.mark_subscribed(channel);

        Ok(())
    }
}

impl<T: Transport> Drop for Engine<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
