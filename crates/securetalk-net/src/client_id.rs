//! Stable client identity, independent of the OS socket handle.
//!
//! The original implementation folded the socket file descriptor into both
//! equality and hashing for its `ClientID`. That is unsafe: once a
//! connection closes, the kernel is free to recycle the fd for a brand new
//! connection, and a stale reply targeting the old identity could land on
//! the wrong client. `ClientId` here carries no fd at all.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn monotonic_nanos() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// Stable identity of a connected client, valid for that connection's
/// lifetime only. Minted exactly once per accepted connection, never
/// reused, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    accept_time_nanos: u64,
    random: u64,
}

impl ClientId {
    /// Mints a fresh identity using the current monotonic time and a
    /// uniformly random 64-bit value.
    pub fn mint() -> Self {
        Self { accept_time_nanos: monotonic_nanos(), random: rand::random() }
    }

    #[cfg(test)]
    pub(crate) fn for_test(accept_time_nanos: u64, random: u64) -> Self {
        Self { accept_time_nanos, random }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn minted_ids_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(ClientId::mint()), "collided ClientId");
        }
    }

    #[test]
    fn equality_uses_both_fields() {
        let a = ClientId::for_test(10, 1);
        let b = ClientId::for_test(10, 2);
        let c = ClientId::for_test(11, 1);
        let d = ClientId::for_test(10, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, d);
    }
}
