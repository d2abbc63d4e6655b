//! hello-udp: a best-effort UDP request/reply echo protocol.
//!
//! The client sends numbered requests in parallel lanes and blindly retries
//! each one until the server's echo comes back; the server statelessly
//! prefixes every received datagram with `"Hello, "` and sends it straight
//! back to the sender.
//!
//! The protocol deliberately offers no delivery, ordering, or deduplication
//! guarantees. It is "send, wait, and retry" over raw datagrams, nothing
//! more.

pub mod client;
pub mod codec;
pub mod config;
pub mod server;
