//! Channel to handler mapping for answering requests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Function computing the response body for a request body
///
/// Returning `None` declines the request and no response will be sent.
pub type Handler = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    handlers: HashMap<String, Handler>,
    subscribed: HashSet<String>,
}

/// Registry of handlers by channel name and the set of channels subscribed to
#[derive(Default)]
pub struct HandlerRegistry {
    state: Mutex<RegistryState>,
}

impl HandlerRegistry {
    /// Creates a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a handler for a channel, replacing any previous one
    ///
    /// Returns `true` if this is the first handler registered for the channel.
    pub fn register(&self, channel: &str, handler: Handler) -> bool {
        self.state()
            .handlers
            .insert(channel.to_owned(), handler)
            .is_none()
    }

    /// Retrieves the handler for a channel
    pub fn lookup(&self, channel: &str) -> Option<Handler> {
        self.state().handlers.get(channel).cloned()
    }

    /// Records that the channel has been subscribed to, returns `false` if it already was
    pub fn mark_subscribed(&self, channel: &str) -> bool {
        self.state().subscribed.insert(channel.to_owned())
    }

    /// Whether the channel has been subscribed to
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.state().subscribed.contains(channel)
    }
}
