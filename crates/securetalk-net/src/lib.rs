//! The SecureTalk connection core: a single-threaded, non-blocking I/O
//! reactor, a length-delimited frame codec, a connection registry keyed by
//! a stable client identity, and a fixed worker pool that runs
//! application handlers off the I/O thread.

mod client_id;
mod connection;
mod dispatcher;
mod error;
mod frame;
mod queue;
mod reactor;
mod registry;
mod server;

pub use client_id::ClientId;
pub use dispatcher::{Handler, HandlerRegistry};
pub use error::NetError;
pub use frame::{decode, encode, DecodeOutcome, MsgType, DEFAULT_MAX_BODY_SIZE, HEADER_SIZE};
pub use queue::{InboundFrame, OutboundFrame};
pub use server::{Server, ShutdownHandle};
