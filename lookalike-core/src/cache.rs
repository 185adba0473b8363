//! Signature memo.
//!
//! Signatures are always derivable again from their source bytes, so the
//! memo is a pure optimization: losing it (process restart, eviction) only
//! costs recomputation. Writes for one digest are idempotent because equal
//! bytes always produce equal signatures, so concurrent writers need no
//! ordering; the last write wins.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;

use crate::signature::{ContentDigest, Signature};

/// Storage behind [`crate::signature::SignatureBuilder`].
///
/// Implementations must be safe for concurrent readers and writers.
pub trait SignatureCache: Send + Sync {
    fn get(&self, key: &ContentDigest) -> Option<Signature>;

    fn put(&self, key: ContentDigest, value: Signature);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded cache living as long as the process.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<ContentDigest, Signature>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatureCache for MemoryCache {
    fn get(&self, key: &ContentDigest) -> Option<Signature> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: ContentDigest, value: Signature) {
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache holding at most `capacity` signatures, evicting the oldest
/// insertion first. A capacity of 0 disables caching.
pub struct BoundedCache {
    capacity: usize,
    entries: DashMap<ContentDigest, Signature>,
    order: Mutex<VecDeque<ContentDigest>>,
}

impl BoundedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl SignatureCache for BoundedCache {
    fn get(&self, key: &ContentDigest) -> Option<Signature> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: ContentDigest, value: Signature) {
        if self.capacity == 0 {
            return;
        }

        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        if self.entries.insert(key, value).is_none() {
            order.push_back(key);
        }
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
