//! Correlated request/response messaging on top of publish/subscribe channels.
//!
//! Publish/subscribe transports like Redis only offer fire-and-forget broadcasts. This crate layers
//! a request/response pattern on top: a requester publishes a `REQUEST` on a channel and receives a
//! future, a responder subscribed to that channel computes a reply and publishes it as a `RESPONSE`
//! tagged with the same correlation id, which in turn resolves the requester's future.
//!
//! The building blocks live in the [`library::communication`] module, starting with the
//! [`Engine`](library::communication::Engine) which ties everything together.

#![deny(missing_docs)]

pub mod library;
pub mod options;
