//! Bootstrap surface: `set_port`, `set_max_worker_threads`, `register`,
//! `unregister`, `start`. Exit codes and signal handling are left to the
//! process that embeds this crate (see `securetalk-server`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mio::Waker;

use crate::dispatcher::{Handler, HandlerRegistry, WorkerPool};
use crate::error::NetError;
use crate::frame::{MsgType, DEFAULT_MAX_BODY_SIZE};
use crate::queue::{InboundQueues, Queue};
use crate::reactor::Reactor;

/// A handle to a running [`Server`], obtainable before `start()` is called.
/// Signal handlers and other out-of-band controllers call [`shutdown`] on
/// this to trigger the graceful shutdown sequence described in the
/// concurrency model.
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    waker: Arc<Mutex<Option<Arc<Waker>>>>,
}

impl ShutdownHandle {
    /// Requests shutdown. Safe to call from a signal handler's worker
    /// thread or any other thread; idempotent.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            let _ = waker.wake();
        }
    }
}

/// The SecureTalk connection server. Configure with `set_port` /
/// `set_max_worker_threads` / `register`, then call `start`.
pub struct Server {
    port: Option<u16>,
    max_worker_threads: Option<usize>,
    max_frame_body_size: u32,
    handlers: HandlerRegistry,
    stop: Arc<AtomicBool>,
    waker_slot: Arc<Mutex<Option<Arc<Waker>>>>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            port: None,
            max_worker_threads: None,
            max_frame_body_size: DEFAULT_MAX_BODY_SIZE,
            handlers: HandlerRegistry::new(),
            stop: Arc::new(AtomicBool::new(false)),
            waker_slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_port(&mut self, port: u32) -> Result<(), NetError> {
        self.port = Some(u16::try_from(port).map_err(|_| NetError::InvalidPort(port))?);
        Ok(())
    }

    pub fn set_max_worker_threads(&mut self, max_worker_threads: usize) {
        self.max_worker_threads = Some(max_worker_threads);
    }

    /// Not part of the original bootstrap surface but needed to make the
    /// Malformed threshold of the frame codec configurable rather than
    /// hardcoded; defaults to [`DEFAULT_MAX_BODY_SIZE`].
    pub fn set_max_frame_body_size(&mut self, max_frame_body_size: u32) {
        self.max_frame_body_size = max_frame_body_size;
    }

    /// Registers `handler` for `msg_type`. Must be called before `start()`;
    /// the handler registry is read-only once the reactor is running.
    pub fn register(&mut self, msg_type: MsgType, handler: Handler) {
        self.handlers.register(msg_type, handler);
    }

    pub fn unregister(&mut self, msg_type: MsgType) {
        self.handlers.unregister(msg_type);
    }

    /// Returns a handle that can trigger shutdown once `start()` is
    /// running. Obtain this before calling `start`, since `start` blocks.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { stop: self.stop.clone(), waker: self.waker_slot.clone() }
    }

    /// Binds the listener, spawns the worker pool, and runs the I/O
    /// reactor on the calling thread until a [`ShutdownHandle::shutdown`]
    /// call completes the graceful shutdown sequence. Uses `port` if
    /// `set_port` was not called.
    pub fn start(self, port: u32) -> Result<(), NetError> {
        let port = match self.port {
            Some(configured) => configured,
            None => u16::try_from(port).map_err(|_| NetError::InvalidPort(port))?,
        };
        let worker_count = self
            .max_worker_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));

        let inbound_queues = Arc::new(InboundQueues::new(worker_count));
        let outbound_queue = Arc::new(Queue::new());

        let (reactor, waker) = Reactor::new(
            port,
            self.max_frame_body_size,
            inbound_queues.clone(),
            outbound_queue.clone(),
            self.stop.clone(),
        )?;
        *self.waker_slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(waker.clone());

        let handlers = Arc::new(self.handlers);
        let workers = WorkerPool::spawn(handlers, inbound_queues, outbound_queue, waker);

        reactor.run(workers);
        Ok(())
    }
}
