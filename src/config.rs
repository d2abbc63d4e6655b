//! Command-line configuration for the client and server binaries.
//!
//! The entire external contract is positional: five arguments for the client,
//! two for the server. Numeric fields are typed, so a non-integer argument
//! fails parsing with a usage message before any socket is created. Logging
//! verbosity comes from `RUST_LOG`, keeping the positional surface exact.

use clap::Parser;
use std::time::Duration;

/// Default receive timeout applied to every client lane.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "hello-client")]
#[command(version = "0.1.0")]
#[command(about = "Send prefixed, numbered requests to an echo server over UDP", long_about = None)]
pub struct ClientArgs {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Request identifier prefix
    pub prefix: String,

    /// Number of parallel request lanes
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub lanes: u64,

    /// Number of requests sent per lane
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub requests: u64,
}

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "hello-server")]
#[command(version = "0.1.0")]
#[command(about = "Echo every received UDP datagram back with a greeting", long_about = None)]
pub struct ServerArgs {
    /// Port to bind
    pub port: u16,

    /// Number of dispatch workers sending responses
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub pool_size: u64,
}

/// Resolved client configuration, shared by the engine and its lanes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub prefix: String,
    pub lane_count: usize,
    pub requests_per_lane: usize,
    /// Per-receive timeout. Fixed across all lanes; a field rather than a
    /// hard constant so tests can shrink it.
    pub recv_timeout: Duration,
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        ClientConfig {
            host: args.host,
            port: args.port,
            prefix: args.prefix,
            lane_count: args.lanes as usize,
            requests_per_lane: args.requests as usize,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_args_parse() {
        let args =
            ClientArgs::try_parse_from(["hello-client", "localhost", "8888", "ping", "2", "3"])
                .unwrap();
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 8888);
        assert_eq!(args.prefix, "ping");
        assert_eq!(args.lanes, 2);
        assert_eq!(args.requests, 3);
    }

    #[test]
    fn test_client_args_reject_non_numeric() {
        let result =
            ClientArgs::try_parse_from(["hello-client", "localhost", "port", "ping", "2", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_args_reject_missing() {
        let result = ClientArgs::try_parse_from(["hello-client", "localhost", "8888"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_args_reject_zero_lanes() {
        let result =
            ClientArgs::try_parse_from(["hello-client", "localhost", "8888", "ping", "0", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_args_parse() {
        let args = ServerArgs::try_parse_from(["hello-server", "8888", "4"]).unwrap();
        assert_eq!(args.port, 8888);
        assert_eq!(args.pool_size, 4);
    }

    #[test]
    fn test_server_args_reject_zero_pool() {
        let result = ServerArgs::try_parse_from(["hello-server", "8888", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_args_uses_default_timeout() {
        let args =
            ClientArgs::try_parse_from(["hello-client", "localhost", "8888", "ping", "2", "3"])
                .unwrap();
        let config = ClientConfig::from(args);
        assert_eq!(config.recv_timeout, DEFAULT_RECV_TIMEOUT);
        assert_eq!(config.lane_count, 2);
        assert_eq!(config.requests_per_lane, 3);
    }
}
