use thiserror::Error;

/// Server-fatal errors: surfaced before the reactor enters its loop, never
/// recoverable in-process. Per-connection errors (EOF, malformed frames,
/// transient socket errors) are not represented here — they are handled
/// in place by closing the connection and never propagate.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("port {0} is out of range for a TCP listener")]
    InvalidPort(u32),
    #[error("failed to bind listener on port {port}: {source}")]
    Bind { port: u16, #[source] source: std::io::Error },
    #[error("failed to create readiness poll: {0}")]
    PollCreate(#[source] std::io::Error),
    #[error("failed to register listener with poll: {0}")]
    Register(#[source] std::io::Error),
    #[error("failed to create wakeup handle: {0}")]
    WakerCreate(#[source] std::io::Error),
}
