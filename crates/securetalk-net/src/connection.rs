//! Per-connection state: one record per live connection, owned exclusively
//! by the connection registry. The I/O reactor is the sole mutator of its
//! buffers and timestamp; workers never touch a `ConnectionState` directly.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Instant;

use mio::Token;

use crate::client_id::ClientId;

/// One per live connection. Created at accept, destroyed at close.
pub struct ConnectionState {
    pub client_id: ClientId,
    pub token: Token,
    pub socket: mio::net::TcpStream,
    pub peer_addr: SocketAddr,
    /// Bytes read off the socket but not yet decoded into frames. Appended
    /// at the tail by the reactor; consumed at the head by the frame codec.
    pub inbound: Vec<u8>,
    /// Bytes encoded from outbound frames but not yet written to the
    /// socket. Appended at the tail, written (and removed) from the head.
    pub outbound: VecDeque<u8>,
    pub last_active: Instant,
    /// Whether `Interest::WRITABLE` is currently registered for this
    /// socket. Invariant: `writable_armed == !outbound.is_empty()` once the
    /// reactor has processed the relevant event; the two can diverge only
    /// momentarily, between an `outbound.push` and the following
    /// `arm_writable` call.
    pub writable_armed: bool,
}

impl ConnectionState {
    pub fn new(client_id: ClientId, token: Token, socket: mio::net::TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            client_id,
            token,
            socket,
            peer_addr,
            inbound: Vec::new(),
            outbound: VecDeque::new(),
            last_active: Instant::now(),
            writable_armed: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}
