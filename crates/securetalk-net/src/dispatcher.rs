//! Handler registry and the fixed worker pool that runs handlers off the
//! I/O thread. Workers see no sockets, no buffers, no registry — only
//! `ClientId` and body bytes in, `(ClientId, MsgType, body)` out.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;

use mio::Waker;
use tracing::{error, warn};

use crate::client_id::ClientId;
use crate::frame::MsgType;
use crate::queue::{InboundFrame, InboundQueues, OutboundFrame, Queue};

/// A handler maps an inbound `(ClientId, body)` to an outbound
/// `(ClientId, MsgType, body)`. The returned `ClientId` need not equal the
/// inbound one — handlers may address other clients (broadcasts) — and the
/// body may be empty, in which case no reply is sent.
pub type Handler = Arc<dyn Fn(ClientId, Vec<u8>) -> (ClientId, MsgType, Vec<u8>) + Send + Sync>;

/// Mapping from `MsgType` to handler. Populated before `Server::start`;
/// read-only once the reactor and workers are running, so no lock is
/// needed in the steady state.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<MsgType, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, msg_type: MsgType, handler: Handler) {
        self.handlers.insert(msg_type, handler);
    }

    pub fn unregister(&mut self, msg_type: MsgType) {
        self.handlers.remove(&msg_type);
    }

    fn get(&self, msg_type: MsgType) -> Option<&Handler> {
        self.handlers.get(&msg_type)
    }
}

/// A fixed pool of worker threads, one per inbound shard, dispatching to
/// registered handlers and pushing non-empty replies to the outbound
/// queue. Each worker owns exactly one shard of [`InboundQueues`], so every
/// frame belonging to a given connection is always handled by the same
/// worker and thus in wire arrival order.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        handlers: Arc<HandlerRegistry>,
        inbound: Arc<InboundQueues>,
        outbound: Arc<Queue<OutboundFrame>>,
        waker: Arc<Waker>,
    ) -> Self {
        let workers = (0..inbound.len())
            .map(|index| {
                let handlers = handlers.clone();
                let shard = inbound.shard(index);
                let outbound = outbound.clone();
                let waker = waker.clone();
                std::thread::Builder::new()
                    .name(format!("securetalk-worker-{index}"))
                    .spawn(move || worker_loop(&handlers, &shard, &outbound, &waker))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { workers }
    }

    /// Joins every worker thread. Callers must have already stopped the
    /// inbound queue so workers observe shutdown and exit.
    pub fn join_all(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    handlers: &HandlerRegistry,
    inbound: &Queue<InboundFrame>,
    outbound: &Queue<OutboundFrame>,
    waker: &Waker,
) {
    loop {
        let Some(frame) = inbound.pop_blocking() else {
            break;
        };

        let Some(handler) = handlers.get(frame.msg_type) else {
            warn!(msg_type = frame.msg_type, client_id = ?frame.client_id, "dispatch miss: no handler registered, dropping frame");
            continue;
        };

        let client_id = frame.client_id;
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(frame.client_id, frame.body)));

        match result {
            Ok((reply_client_id, reply_msg_type, reply_body)) => {
                if !reply_body.is_empty() {
                    outbound.push(OutboundFrame {
                        client_id: reply_client_id,
                        msg_type: reply_msg_type,
                        body: reply_body,
                    });
                    if let Err(err) = waker.wake() {
                        error!(?err, "failed to wake reactor after queuing reply");
                    }
                }
            }
            Err(_) => {
                error!(?client_id, "handler panicked; worker pool continues");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_miss_does_not_crash_worker() {
        let handlers = Arc::new(HandlerRegistry::new());
        let inbound = Arc::new(InboundQueues::new(1));
        let outbound: Arc<Queue<OutboundFrame>> = Arc::new(Queue::new());
        let (_registry, waker) = test_waker();

        inbound.push(InboundFrame { client_id: ClientId::mint(), msg_type: 0xFFFF, body: vec![] });
        inbound.stop_all();

        let pool = WorkerPool::spawn(handlers, inbound, outbound.clone(), waker);
        pool.join_all();

        assert!(outbound.drain().is_empty());
    }

    #[test]
    fn handler_panic_is_contained() {
        let mut registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        registry.register(
            1,
            Arc::new(move |_id, _body| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            }),
        );
        registry.register(2, Arc::new(|id, body| (id, 2, body)));

        let handlers = Arc::new(registry);
        let inbound = Arc::new(InboundQueues::new(1));
        let outbound: Arc<Queue<OutboundFrame>> = Arc::new(Queue::new());
        let (_registry, waker) = test_waker();

        let id = ClientId::mint();
        inbound.push(InboundFrame { client_id: id, msg_type: 1, body: vec![] });
        inbound.push(InboundFrame { client_id: id, msg_type: 2, body: b"still alive".to_vec() });
        inbound.stop_all();

        let pool = WorkerPool::spawn(handlers, inbound, outbound.clone(), waker);
        pool.join_all();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let replies = outbound.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body, b"still alive");
    }

    fn test_waker() -> (mio::Poll, Arc<Waker>) {
        let poll = mio::Poll::new().unwrap();
        let waker = Arc::new(Waker::new(poll.registry(), mio::Token(99)).unwrap());
        (poll, waker)
    }
}
