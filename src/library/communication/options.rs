use super::EngineError;
use crate::library::helpers::parse_seconds;
use std::time::Duration;
use structopt::StructOpt;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables of an [`Engine`](super::Engine)
#[derive(Debug, Clone, StructOpt)]
pub struct EngineOptions {
    /// Seconds to wait for a response before a request is considered unanswered
    #[structopt(
        long = "timeout",
        env = "COURIER_TIMEOUT",
        global = true,
        default_value = "5",
        value_name = "seconds",
        parse(try_from_str = parse_seconds)
    )]
    pub timeout: Duration,

    /// Run handlers on a separate thread pool instead of the message listener.
    ///
    /// Slow handlers would otherwise delay the processing of subsequent messages.
    #[structopt(long, global = true)]
    pub offload_handlers: bool,
}

impl EngineOptions {
    /// Default options with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub(super) fn validate(&self) -> Result<(), EngineError> {
        if self.timeout.as_nanos() == 0 {
            return Err(EngineError::InvalidOptions("timeout must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            offload_handlers: false,
        }
    }
}
