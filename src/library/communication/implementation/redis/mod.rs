//! Trait implementations using [`redis`](::redis)
//!
//! Publishing is done through a [`MultiplexedConnection`](::redis::aio::MultiplexedConnection)
//! while listening happens on a dedicated PubSub connection which is split into its control
//! half ([`RedisSubscriptionSink`]) and the stream of incoming messages.

use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(4);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

mod connect;
mod publisher;
mod subscriber;
mod transport;

pub use publisher::*;
pub use subscriber::*;
pub use transport::*;
