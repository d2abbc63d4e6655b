//! hello-client: send prefixed, numbered requests over UDP.
//!
//! Usage: `hello-client <host> <port> <prefix> <lanes> <requests>`
//!
//! Starts one lane per requested thread of execution; each acknowledged
//! request/response pair is printed to stdout as it arrives.

use clap::Parser;
use hello_udp::client::{self, CancelToken, Exchange};
use hello_udp::config::{ClientArgs, ClientConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Argument parsing happens before any socket is created; a bad argument
    // exits with a usage message and no side effects.
    let config = ClientConfig::from(ClientArgs::parse());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        prefix = %config.prefix,
        lanes = config.lane_count,
        requests_per_lane = config.requests_per_lane,
        "Starting hello-udp client"
    );

    let cancel = CancelToken::new();
    client::run(&config, &cancel, |exchange: &Exchange| {
        println!("Request: {}", exchange.request);
        println!("Response: {}", exchange.response);
    })?;

    Ok(())
}
