//! hello-server: echo every received UDP datagram back with a greeting.
//!
//! Usage: `hello-server <port> <pool_size>`
//!
//! Binds the port, then serves until the process is killed. Bind failure is
//! fatal at startup; everything after that is handled inside the server.

use clap::Parser;
use hello_udp::config::ServerArgs;
use hello_udp::server::EchoServer;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Argument parsing happens before any socket is created; a bad argument
    // exits with a usage message and no side effects.
    let args = ServerArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut server = EchoServer::new();
    server.start(args.port, args.pool_size as usize)?;

    // The acceptor and pool run on their own threads; park the main thread
    // until the process is terminated.
    loop {
        std::thread::park();
    }
}
