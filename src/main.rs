use anyhow::{anyhow, bail, Result};
use courier::library::communication::implementation::redis::RedisTransport;
use courier::library::communication::Engine;
use courier::options::SharedOptions;
use std::str::FromStr;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(about = "Request and response over Redis PubSub channels")]
struct MainOptions {
    #[structopt(flatten)]
    shared_options: SharedOptions,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Sends a request and prints the response
    Request {
        /// Channel to publish the request on
        channel: String,
        /// Request body
        body: String,
    },
    /// Answers requests on a channel until interrupted
    Respond {
        /// Channel to serve
        channel: String,
        /// How responses are derived from requests
        #[structopt(long, default_value = "echo", possible_values = &["echo", "upper", "lower"])]
        mode: ResponseMode,
    },
}

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Echo,
    Upper,
    Lower,
}

impl ResponseMode {
    fn apply(self, body: &str) -> String {
        match self {
            ResponseMode::Echo => body.to_owned(),
            ResponseMode::Upper => body.to_uppercase(),
            ResponseMode::Lower => body.to_lowercase(),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "echo" => Ok(ResponseMode::Echo),
            "upper" => Ok(ResponseMode::Upper),
            "lower" => Ok(ResponseMode::Lower),
            other => Err(format!("unknown response mode {}", other)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let main_options = MainOptions::from_args();
    let shared_options = main_options.shared_options;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&shared_options.log))
        .init();

    let timeout = shared_options.engine.timeout;
    let transport = RedisTransport::new(&shared_options.redis.url).map_err(|e| anyhow!(e))?;
    let engine = Engine::connect(&transport, shared_options.engine).await?;

    match main_options.cmd {
        Command::Request { channel, body } => {
            let response = engine.request(&channel, &body).await?;

            match response.await {
                Some(response) => println!("{}", response),
                None => bail!("no response received on {} within {:?}", channel, timeout),
            }
        }
        Command::Respond { channel, mode } => {
            engine.respond(&channel, move |body| mode.apply(body)).await?;
            info!(%channel, ?mode, "Serving requests");

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
        }
    }

    Ok(())
}
