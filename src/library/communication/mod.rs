//! Request and response on top of publish and subscribe
//!
//! Publish/subscribe channels are fire-and-forget: whoever is subscribed receives a message,
//! nobody replies. This module adds correlated replies on top of that.
//!
//! A requester calls [`Engine::request`] which stores a pending entry under a fresh correlation id
//! and publishes a [`MessageType::Request`] on the channel. Any engine that registered a handler for
//! the channel using [`Engine::respond`] receives it, runs the handler on the body and publishes a
//! [`MessageType::Response`] with the same correlation id back onto the channel. The requesting
//! engine then resolves the matching [`ResponseFuture`].
//!
//! Nothing is acknowledged or retried. When no reply arrives within the configured timeout, the
//! future resolves to `None`. Malformed or foreign traffic on a channel is ignored without a trace.
//!
//! The network side is abstracted by the [`Transport`] trait, implementations are located in
//! the [`implementation`] module.

mod dispatch;
mod engine;
mod error;
mod message;
mod options;
mod pending;
mod registry;
mod transport;

pub mod implementation;

pub use dispatch::Dispatcher;
pub use engine::Engine;
pub use error::EngineError;
pub use message::{CorrelationId, Message, MessageType};
pub use options::EngineOptions;
pub use pending::{PendingRequestTable, ResponseFuture};
pub use registry::{Handler, HandlerRegistry};
pub use transport::{InboundMessage, MessagePublisher, MessageStream, SubscriptionSink, Transport};
