//! Per-connection request identifier allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use airtap_protocol::RequestId;

use crate::error::ClientError;

/// Hands out `"1"`, `"2"`, `"3"`, ... for the lifetime of one connection.
///
/// Safe to share between concurrent senders.  Never wraps: once the counter
/// cannot advance, [`next`](Self::next) fails with
/// [`ClientError::IdentifierExhausted`].
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub(crate) fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next identifier.
    pub fn next(&self) -> Result<RequestId, ClientError> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(RequestId::from)
            .map_err(|_| ClientError::IdentifierExhausted)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
