//! Client engine and worker lanes.
//!
//! The engine resolves the server address once and spawns one thread per
//! lane. Each lane owns its socket for its whole lifetime and drives one
//! strictly sequential stream of numbered requests: send, wait for the echo,
//! and on any failure or timeout re-send the same request. There is no
//! backoff and no retry limit; a server that never answers leaves the lane
//! retrying forever. That liveness risk is part of the protocol, not a bug.
//!
//! Every acknowledged request/response pair is handed to the caller's
//! observer; the engine itself aggregates nothing.

use crate::codec::{self, MAX_DATAGRAM};
use crate::config::ClientConfig;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Cooperative stop signal shared between the engine and an external
/// interrupter. Lanes observe it within one retry-loop iteration, bounded
/// by the configured receive timeout.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One acknowledged request/response pair, as surfaced to the observer.
///
/// Matching is done on raw bytes; the textual fields here are lossy UTF-8
/// renderings for display only.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub lane: usize,
    pub sequence: usize,
    pub request: String,
    pub response: String,
}

/// Run the client engine to completion.
///
/// Spawns `lane_count` lanes against the resolved server address and blocks
/// until every lane has finished its requests or observed the cancel token.
/// Lane sockets are released as each lane returns; the scoped join releases
/// the execution contexts. Resolution failure is the only error surfaced
/// from a normal run.
pub fn run<F>(config: &ClientConfig, cancel: &CancelToken, observe: F) -> io::Result<()>
where
    F: Fn(&Exchange) + Sync,
{
    let server_addr = (config.host.as_str(), config.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            )
        })?;

    info!(
        server = %server_addr,
        lanes = config.lane_count,
        requests_per_lane = config.requests_per_lane,
        "Starting client engine"
    );

    let observe = &observe;
    thread::scope(|scope| -> io::Result<()> {
        for lane in 0..config.lane_count {
            let spawned = thread::Builder::new()
                .name(format!("lane-{lane}"))
                .spawn_scoped(scope, move || {
                    if let Err(e) = run_lane(server_addr, lane, config, cancel, observe) {
                        error!(lane, error = %e, "Lane failed");
                    }
                });
            if let Err(e) = spawned {
                // Wind down the lanes already running before surfacing.
                cancel.cancel();
                return Err(e);
            }
        }
        Ok(())
    })
}

/// Drive one lane's sequential request stream on its own socket.
///
/// Socket setup failure is lane-fatal and reported by the engine; everything
/// past setup is handled locally and retried.
fn run_lane<F>(
    server_addr: SocketAddr,
    lane: usize,
    config: &ClientConfig,
    cancel: &CancelToken,
    observe: &F,
) -> io::Result<()>
where
    F: Fn(&Exchange) + Sync,
{
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(server_addr)?;
    socket.set_read_timeout(Some(config.recv_timeout))?;

    let mut buf = vec![0u8; MAX_DATAGRAM];

    'requests: for sequence in 0..config.requests_per_lane {
        let request = codec::render_request(&config.prefix, lane, sequence);

        loop {
            if cancel.is_cancelled() {
                debug!(lane, sequence, "Cancelled, abandoning remaining requests");
                return Ok(());
            }

            if let Err(e) = socket.send(&request) {
                warn!(lane, sequence, error = %e, "Send failed, retrying");
                continue;
            }

            match socket.recv(&mut buf) {
                Ok(n) => {
                    if codec::is_acknowledged(&buf[..n], &request) {
                        let exchange = Exchange {
                            lane,
                            sequence,
                            request: String::from_utf8_lossy(&request).into_owned(),
                            response: String::from_utf8_lossy(&buf[..n]).into_owned(),
                        };
                        observe(&exchange);
                        continue 'requests;
                    }
                    // Stale or unrelated payload. Fall through to the next
                    // iteration so the request is always re-sent after any
                    // receive attempt, matching or not.
                    debug!(lane, sequence, "Unmatched response, re-sending");
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    debug!(lane, sequence, "Receive timed out, re-sending");
                }
                Err(e) => {
                    warn!(lane, sequence, error = %e, "Receive failed, retrying");
                }
            }
        }
    }

    debug!(lane, "Lane complete");
    Ok(())
}
