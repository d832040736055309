//! The producer/consumer handoff between the I/O reactor and the worker
//! pool: two bounded-in-spirit FIFOs, each guarded by a mutex and signaled
//! by a condition variable. Mirrors the original implementation's
//! `std::mutex` + `std::condition_variable` pattern — no crate in this
//! workspace's dependency stack offers a better fit for an in-process,
//! single-box handoff than the standard library's own primitives.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Condvar, Mutex};

use crate::client_id::ClientId;
use crate::frame::MsgType;

/// A frame read off the wire, queued for a worker to handle.
pub struct InboundFrame {
    pub client_id: ClientId,
    pub msg_type: MsgType,
    pub body: Vec<u8>,
}

/// A handler's reply, queued for the reactor to write back.
pub struct OutboundFrame {
    pub client_id: ClientId,
    pub msg_type: MsgType,
    pub body: Vec<u8>,
}

struct Inner<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// A FIFO queue shared between the reactor thread and the worker pool.
pub struct Queue<T> {
    inner: Mutex<Inner<T>>,
    condvar: Condvar,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { items: VecDeque::new(), stopped: false }), condvar: Condvar::new() }
    }

    /// Pushes one item and wakes a single waiter (the reactor's outbound
    /// drain or one worker, depending on which queue this is).
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.items.push_back(item);
        drop(inner);
        self.condvar.notify_one();
    }

    /// Blocks until an item is available or the queue is stopped, in which
    /// case `None` is returned once the queue has also drained empty.
    pub fn pop_blocking(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.stopped {
                return None;
            }
            inner = self.condvar.wait(inner).unwrap_or_else(|p| p.into_inner());
        }
    }

    /// Drains every item currently queued without blocking. Used by the
    /// reactor to pop all pending outbound frames in one pass per loop
    /// iteration.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.items.drain(..).collect()
    }

    /// Marks the queue stopped and wakes every waiter. Subsequent
    /// `pop_blocking` calls still drain whatever remains before returning
    /// `None`.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.stopped = true;
        drop(inner);
        self.condvar.notify_all();
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.items.clear();
    }
}

/// One inbound [`Queue`] per worker, so every frame belonging to a given
/// connection always lands on the same worker thread. This is what keeps
/// per-connection inbound order intact: a shared queue would let two
/// independent workers pick up two frames from the same connection and
/// finish (and reply) out of order.
pub struct InboundQueues {
    shards: Vec<Arc<Queue<InboundFrame>>>,
}

impl InboundQueues {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self { shards: (0..shard_count).map(|_| Arc::new(Queue::new())).collect() }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn shard(&self, index: usize) -> Arc<Queue<InboundFrame>> {
        self.shards[index].clone()
    }

    /// Routes `frame` to the shard owning its connection.
    pub fn push(&self, frame: InboundFrame) {
        let index = shard_for(frame.client_id, self.shards.len());
        self.shards[index].push(frame);
    }

    pub fn stop_all(&self) {
        for shard in &self.shards {
            shard.stop();
        }
    }

    pub fn clear_all(&self) {
        for shard in &self.shards {
            shard.clear();
        }
    }
}

fn shard_for(client_id: ClientId, shard_count: usize) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    client_id.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count
}
