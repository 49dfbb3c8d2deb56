//! Command line options shared by executables built on this crate
//!
//! The structs in this module can be flattened into other option structs.

use crate::library::communication::EngineOptions;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        global = true,
        default_value = "redis://localhost/",
        value_name = "url"
    )]
    pub url: String,
}

/// Options relevant to every command
#[derive(Debug, StructOpt)]
pub struct SharedOptions {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub engine: EngineOptions,

    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "warn",
        env = "RUST_LOG",
        value_name = "level"
    )]
    pub log: String,
}
