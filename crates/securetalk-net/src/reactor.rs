//! Single-threaded I/O reactor: accepts new connections, drains readable
//! sockets into inbound buffers, flushes outbound buffers to writable
//! sockets, invokes the frame codec, and shuttles frames to and from the
//! worker pool via the inbound/outbound queues.
//!
//! Unlike the teacher's trading-engine reactor (which busy-polls with a
//! zero timeout because it owns a dedicated spinning core), this reactor
//! blocks in `Poll::poll` with no timeout and relies on a registered
//! [`mio::Waker`] to be woken the moment a worker queues a reply — the
//! right tradeoff for a server under ordinary, bursty chat traffic rather
//! than a latency-sensitive trading loop.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

use crate::client_id::ClientId;
use crate::connection::ConnectionState;
use crate::dispatcher::WorkerPool;
use crate::error::NetError;
use crate::frame::{decode, encode, DecodeOutcome};
use crate::queue::{InboundFrame, InboundQueues, OutboundFrame, Queue};
use crate::registry::ConnectionRegistry;

const LISTENER_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);
const FIRST_CONNECTION_TOKEN: usize = 2;

/// Read scratch size per readable event; unrelated to the frame size limit.
const READ_SCRATCH_SIZE: usize = 16 * 1024;

/// Upper bound on readiness events drawn from a single `Poll::poll` call,
/// matching mio's own `Events` capacity. Keeping this bounded, and
/// performing exactly one outbound-queue drain per iteration regardless of
/// how many socket events fired, is what keeps either source from
/// monopolizing the loop.
const EVENTS_CAPACITY: usize = 1024;

pub struct Reactor {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    registry: ConnectionRegistry,
    next_token: usize,
    max_frame_body_size: u32,
    inbound_queues: Arc<InboundQueues>,
    outbound_queue: Arc<Queue<OutboundFrame>>,
    stop: Arc<AtomicBool>,
}

impl Reactor {
    pub fn new(
        port: u16,
        max_frame_body_size: u32,
        inbound_queues: Arc<InboundQueues>,
        outbound_queue: Arc<Queue<OutboundFrame>>,
        stop: Arc<AtomicBool>,
    ) -> Result<(Self, Arc<Waker>), NetError> {
        let addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], port));
        let mut listener =
            TcpListener::bind(addr).map_err(|source| NetError::Bind { port, source })?;

        let poll = Poll::new().map_err(NetError::PollCreate)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(NetError::Register)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN).map_err(NetError::WakerCreate)?);

        let reactor = Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            registry: ConnectionRegistry::new(),
            next_token: FIRST_CONNECTION_TOKEN,
            max_frame_body_size,
            inbound_queues,
            outbound_queue,
            stop,
        };
        Ok((reactor, waker))
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Runs the event loop until the stop flag is observed, then performs
    /// the graceful shutdown sequence: stop both queues (waking every
    /// blocked worker), close every live connection, clear both queues, and
    /// join the worker pool.
    pub fn run(mut self, workers: WorkerPool) {
        loop {
            if self.stop.load(Ordering::Acquire) {
                break;
            }

            if let Err(err) = self.poll.poll(&mut self.events, None) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                warn!(?err, "poll failed, retrying");
                continue;
            }

            // mio coalesces repeated wake() calls between poll() calls into
            // at most one WAKER_TOKEN event, so this iterates at most
            // `EVENTS_CAPACITY` socket events before falling through to the
            // single outbound-queue drain below.
            let mut tokens = Vec::with_capacity(self.events.iter().count());
            for event in self.events.iter() {
                tokens.push((event.token(), event.is_readable(), event.is_writable()));
            }

            for (token, readable, writable) in tokens {
                match token {
                    LISTENER_TOKEN => self.accept_all(),
                    WAKER_TOKEN => {}
                    token => self.handle_client_event(token, readable, writable),
                }
            }

            self.drain_outbound();
        }

        self.shutdown_sequence(workers);
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer_addr)) => {
                    let _ = stream.set_nodelay(true);
                    let token = self.next_token();
                    if let Err(err) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        warn!(?err, "failed to register accepted connection");
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                        continue;
                    }
                    let client_id = ClientId::mint();
                    info!(?client_id, ?peer_addr, "client connected");
                    self.registry.insert(ConnectionState::new(client_id, token, stream, peer_addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(?err, "accept failed");
                    break;
                }
            }
        }
    }

    fn handle_client_event(&mut self, token: Token, readable: bool, writable: bool) {
        let mut close = false;
        if readable {
            close |= self.read_client(token);
        }
        if !close && writable {
            close |= self.write_client(token);
        }
        if close {
            self.close_connection(token);
        }
    }

    /// Reads until would-block, then decodes as many complete frames as are
    /// buffered. Returns `true` if the connection must be closed.
    fn read_client(&mut self, token: Token) -> bool {
        let max_body = self.max_frame_body_size;
        let Some(state) = self.registry.lookup_by_token_mut(token) else {
            return false;
        };

        let mut scratch = [0u8; READ_SCRATCH_SIZE];
        loop {
            match state.socket.read(&mut scratch) {
                Ok(0) => return true,
                Ok(n) => {
                    state.inbound.extend_from_slice(&scratch[..n]);
                    state.touch();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(?err, "read error, closing connection");
                    return true;
                }
            }
        }

        let client_id = state.client_id;
        loop {
            match decode(&mut state.inbound, max_body) {
                DecodeOutcome::Ready { msg_type, body } => {
                    self.inbound_queues.push(InboundFrame { client_id, msg_type, body });
                }
                DecodeOutcome::Incomplete => break,
                DecodeOutcome::Malformed => {
                    warn!(?client_id, "oversized or malformed frame, closing connection");
                    return true;
                }
            }
        }
        false
    }

    /// Flushes the outbound buffer until would-block or empty. Returns
    /// `true` if the connection must be closed.
    fn write_client(&mut self, token: Token) -> bool {
        let Some(state) = self.registry.lookup_by_token_mut(token) else {
            return false;
        };

        loop {
            if state.outbound.is_empty() {
                break;
            }
            let chunk = state.outbound.make_contiguous();
            match state.socket.write(chunk) {
                Ok(0) => return true,
                Ok(n) => {
                    state.outbound.drain(..n);
                    state.touch();
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(?err, "write error, closing connection");
                    return true;
                }
            }
        }

        if state.outbound.is_empty() && state.writable_armed {
            if let Err(err) = self.poll.registry().reregister(&mut state.socket, token, Interest::READABLE) {
                debug!(?err, "failed to drop writable interest, closing connection");
                return true;
            }
            state.writable_armed = false;
        }
        false
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut state) = self.registry.remove_by_token(token) {
            let _ = self.poll.registry().deregister(&mut state.socket);
            let _ = state.socket.shutdown(std::net::Shutdown::Both);
            debug!(client_id = ?state.client_id, peer_addr = ?state.peer_addr, "connection closed");
        }
    }

    /// Pops every pending outbound frame in one pass and appends each to its
    /// connection's outbound buffer, arming writable interest as needed.
    /// Frames for clients no longer in the registry are silently dropped.
    fn drain_outbound(&mut self) {
        for frame in self.outbound_queue.drain() {
            let bytes = encode(frame.msg_type, &frame.body);
            let client_id = frame.client_id;
            let Some(state) = self.registry.lookup_by_id_mut(client_id) else {
                debug!(?client_id, "outbound frame for vanished client, dropping");
                continue;
            };
            state.outbound.extend(bytes);
            if !state.writable_armed {
                let token = state.token;
                if let Err(err) = self.poll.registry().reregister(
                    &mut state.socket,
                    token,
                    Interest::READABLE | Interest::WRITABLE,
                ) {
                    debug!(?err, "failed to arm writable interest, dropping reply");
                    continue;
                }
                state.writable_armed = true;
            }
        }
    }

    fn shutdown_sequence(&mut self, workers: WorkerPool) {
        info!(live_connections = self.registry.len(), "shutdown requested, closing all connections");
        self.inbound_queues.stop_all();
        self.outbound_queue.stop();

        for mut state in self.registry.drain() {
            let _ = self.poll.registry().deregister(&mut state.socket);
            let _ = state.socket.shutdown(std::net::Shutdown::Both);
        }

        self.inbound_queues.clear_all();
        self.outbound_queue.clear();
        workers.join_all();
        info!("shutdown complete");
    }
}
