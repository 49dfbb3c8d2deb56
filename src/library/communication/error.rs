use crate::library::BoxedError;
use thiserror::Error;

/// Error type for hard failures of an [`Engine`](super::Engine)
///
/// Expected absence, like a request timing out or a channel without responder, is never
/// reported through this type but modelled as `None` values instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The provided options can not be used
    #[error("invalid engine options: {0}")]
    InvalidOptions(&'static str),
    /// Connecting to the transport failed
    #[error("unable to connect to transport")]
    ConnectionFailed(#[source] BoxedError),
    /// Publishing a message failed
    #[error("publishing to channel {channel} failed")]
    PublishFailed {
        /// Channel the message was destined for
        channel: String,
        /// Underlying transport error
        #[source]
        source: BoxedError,
    },
    /// Subscribing to a channel failed
    #[error("subscribing to channel {channel} failed")]
    SubscribeFailed {
        /// Channel which could not be subscribed
        channel: String,
        /// Underlying transport error
        #[source]
        source: BoxedError,
    },
}
