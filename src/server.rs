//! UDP echo server: acceptor loop plus dispatch pool.
//!
//! One acceptor thread owns the serial receive loop on the shared socket and
//! hands each datagram, with its sender address, to a bounded pool of
//! dispatch workers. Workers render the `"Hello, "` echo and send it back on
//! the same socket. The server keeps no per-request state: every datagram is
//! processed independently, so identical payloads always produce identical
//! responses.
//!
//! Concurrent sends on the shared socket are safe without a lock: std's
//! `UdpSocket` supports one blocked reader plus many writers.
//!
//! Lifecycle is a one-way state machine, `Created → Started → Closed`. A
//! second `start` is rejected rather than rebinding over a running instance,
//! and restart after `close` is not supported.

use crate::codec::{self, MAX_DATAGRAM};
use bytes::Bytes;
use socket2::SockRef;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bounded wait for the acceptor and dispatch workers during `close`.
/// Threads still running when it lapses are abandoned, not awaited.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// One received datagram queued for echo dispatch. Immutable, passed by
/// value into the pool.
struct EchoTask {
    payload: Bytes,
    peer: SocketAddr,
}

/// Server lifecycle errors
#[derive(Debug)]
pub enum ServerError {
    /// `start` called while already running; the running instance is left
    /// untouched.
    AlreadyStarted,
    /// `start` called after `close`; a closed server cannot be restarted.
    Closed,
    /// The listening socket could not be bound.
    Bind(io::Error),
    /// The acceptor or a dispatch worker thread could not be spawned.
    Spawn(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::AlreadyStarted => write!(f, "server is already started"),
            ServerError::Closed => write!(f, "server has been closed and cannot be restarted"),
            ServerError::Bind(e) => write!(f, "failed to bind server socket: {e}"),
            ServerError::Spawn(e) => write!(f, "failed to spawn server thread: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(e) | ServerError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

enum State {
    Created,
    Started(Running),
    Closed,
}

struct Running {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    /// Kept so `close` can drop it, disconnecting idle workers.
    queue: Sender<EchoTask>,
    acceptor: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

/// UDP echo server instance
pub struct EchoServer {
    state: State,
}

impl EchoServer {
    /// Create a server in the `Created` state; nothing is bound yet.
    pub fn new() -> Self {
        EchoServer {
            state: State::Created,
        }
    }

    /// Bind `0.0.0.0:port` and launch the acceptor and `pool_size` dispatch
    /// workers. Port 0 binds an ephemeral port, reported by `local_addr`.
    ///
    /// Only valid from the `Created` state; see [`ServerError`].
    pub fn start(&mut self, port: u16, pool_size: usize) -> Result<(), ServerError> {
        match self.state {
            State::Created => {}
            State::Started(_) => return Err(ServerError::AlreadyStarted),
            State::Closed => return Err(ServerError::Closed),
        }

        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(ServerError::Bind)?;
        let local_addr = socket.local_addr().map_err(ServerError::Bind)?;

        // Size the receive buffer from the socket's actual kernel buffer,
        // capped at the largest payload a datagram can carry.
        let buffer_size = SockRef::from(&socket)
            .recv_buffer_size()
            .unwrap_or(MAX_DATAGRAM)
            .min(MAX_DATAGRAM);

        info!(
            addr = %local_addr,
            pool_size,
            buffer_size,
            "Starting echo server"
        );

        let socket = Arc::new(socket);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (queue, task_rx) = mpsc::channel::<EchoTask>();
        let task_rx = Arc::new(Mutex::new(task_rx));

        let mut workers = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            let socket = Arc::clone(&socket);
            let shutdown = Arc::clone(&shutdown);
            let task_rx = Arc::clone(&task_rx);

            let handle = thread::Builder::new()
                .name(format!("dispatch-{worker_id}"))
                .spawn(move || dispatch_loop(worker_id, &socket, &shutdown, &task_rx))
                .map_err(ServerError::Spawn)?;
            workers.push(handle);
        }

        let acceptor = {
            let socket = Arc::clone(&socket);
            let shutdown = Arc::clone(&shutdown);
            let queue = queue.clone();

            thread::Builder::new()
                .name("acceptor".to_string())
                .spawn(move || acceptor_loop(&socket, &shutdown, &queue, buffer_size))
                .map_err(ServerError::Spawn)?
        };

        self.state = State::Started(Running {
            socket,
            local_addr,
            shutdown,
            queue,
            acceptor,
            workers,
        });
        Ok(())
    }

    /// Address of the bound socket, while started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Started(running) => Some(running.local_addr),
            _ => None,
        }
    }

    /// Shut the server down: signal the acceptor and pool, wait up to
    /// [`SHUTDOWN_GRACE`] for them to finish, then release the socket
    /// unconditionally. In-flight sends past the grace period are abandoned.
    /// Idempotent; closing a never-started server just seals its state.
    pub fn close(&mut self) {
        let running = match std::mem::replace(&mut self.state, State::Closed) {
            State::Started(running) => running,
            _ => return,
        };

        info!(addr = %running.local_addr, "Closing echo server");
        running.shutdown.store(true, Ordering::SeqCst);

        // The acceptor blocks in recv_from with no timeout; a zero-byte
        // datagram to the socket's own address wakes it so it can observe
        // the flag. The wake-up is never echoed: the flag is already set.
        if let Ok(waker) = UdpSocket::bind("127.0.0.1:0") {
            let target = if running.local_addr.ip().is_unspecified() {
                SocketAddr::from(([127, 0, 0, 1], running.local_addr.port()))
            } else {
                running.local_addr
            };
            let _ = waker.send_to(&[], target);
        }

        // Disconnect the queue so idle workers unblock from recv.
        drop(running.queue);

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let mut handles: Vec<JoinHandle<()>> = running.workers;
        handles.push(running.acceptor);

        for handle in handles {
            loop {
                if handle.is_finished() {
                    let _ = handle.join();
                    break;
                }
                if Instant::now() >= deadline {
                    debug!("Grace period elapsed, abandoning remaining tasks");
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }

        // Last step: release our handle to the socket, whatever is still
        // running.
        drop(running.socket);
    }
}

impl Default for EchoServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serial receive loop. Receive errors are reported and the loop continues;
/// only shutdown or queue disconnection ends it.
fn acceptor_loop(
    socket: &UdpSocket,
    shutdown: &AtomicBool,
    queue: &Sender<EchoTask>,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match socket.recv_from(&mut buf) {
            Ok((n, peer)) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let task = EchoTask {
                    payload: Bytes::copy_from_slice(&buf[..n]),
                    peer,
                };
                if queue.send(task).is_err() {
                    break;
                }
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "Receive failed, continuing");
            }
        }
    }
    debug!("Acceptor stopped");
}

/// Dispatch worker: dequeue, render, send. Send failures drop the one task;
/// tasks dequeued after shutdown are discarded.
fn dispatch_loop(
    worker_id: usize,
    socket: &UdpSocket,
    shutdown: &AtomicBool,
    task_rx: &Mutex<Receiver<EchoTask>>,
) {
    loop {
        let task = match task_rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        let task = match task {
            Ok(task) => task,
            Err(_) => break,
        };
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let response = codec::render_response(&task.payload);
        if let Err(e) = socket.send_to(&response, task.peer) {
            warn!(worker = worker_id, peer = %task.peer, error = %e, "Send failed, dropping task");
        }
    }
    debug!(worker = worker_id, "Dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_start_rejected() {
        let mut server = EchoServer::new();
        server.start(0, 2).unwrap();
        let first_addr = server.local_addr();

        match server.start(0, 2) {
            Err(ServerError::AlreadyStarted) => {}
            other => panic!("unexpected: {other:?}"),
        }
        // The running instance is untouched.
        assert_eq!(server.local_addr(), first_addr);

        server.close();
    }

    #[test]
    fn test_restart_after_close_rejected() {
        let mut server = EchoServer::new();
        server.start(0, 1).unwrap();
        server.close();

        match server.start(0, 1) {
            Err(ServerError::Closed) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_close_before_start_is_noop() {
        let mut server = EchoServer::new();
        server.close();
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn test_close_completes_within_grace_period() {
        let mut server = EchoServer::new();
        server.start(0, 4).unwrap();

        let started = Instant::now();
        server.close();
        assert!(started.elapsed() < SHUTDOWN_GRACE);
        assert!(server.local_addr().is_none());
    }

    #[test]
    fn test_bind_conflict_is_fatal() {
        let mut first = EchoServer::new();
        first.start(0, 1).unwrap();
        let port = first.local_addr().unwrap().port();

        let mut second = EchoServer::new();
        match second.start(port, 1) {
            Err(ServerError::Bind(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }

        first.close();
    }
}
