//! Shared intake protocol between upstream parser workers and the analyzer.
//! Each upstream source owns a bounded queue guarded by one mutex; the guard is
//! the exclusion token and is held only for the copy and the index update.

mod fetch;

pub use fetch::{Fetcher, IntakeBuffer};

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-packet properties extracted by the parser stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketMetadata {
    /// IPv4 source address in network byte order
    pub source_address: u32,
    pub protocol: u16,
    pub length: u16,
    /// Arrival time in seconds
    pub timestamp: f64,
}

impl PacketMetadata {
    pub fn new(source: Ipv4Addr, protocol: u16, length: u16, timestamp: f64) -> Self {
        Self {
            source_address: u32::from(source).to_be(),
            protocol,
            length,
            timestamp,
        }
    }

    /// Flow key: source address in host order.
    pub fn flow_key(&self) -> u32 {
        u32::from_be(self.source_address)
    }
}

/// Producer-side pending metadata. Bounded; the front is always the oldest entry.
#[derive(Debug)]
pub struct MetadataQueue {
    entries: Vec<PacketMetadata>,
    capacity: usize,
}

impl MetadataQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one entry; false when the queue is full.
    pub fn push(&mut self, meta: PacketMetadata) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(meta);
        true
    }

    /// Append as many entries as fit; returns how many were taken.
    pub fn extend_from_slice(&mut self, metas: &[PacketMetadata]) -> usize {
        let room = self.capacity - self.entries.len();
        let n = room.min(metas.len());
        self.entries.extend_from_slice(&metas[..n]);
        n
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[PacketMetadata] {
        &self.entries
    }

    /// Drop the first `n` entries and shift the remainder to the front.
    pub fn consume_front(&mut self, n: usize) {
        let n = n.min(self.entries.len());
        self.entries.drain(..n);
    }
}

/// An upstream stage the analyzer drains from.
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire the exclusion token. Dropping the guard releases it.
    fn lock(&self) -> MutexGuard<'_, MetadataQueue>;
}

/// Mutex-backed queue shared by one parser thread and one analyzer.
pub struct SharedMetadataQueue {
    name: String,
    queue: Mutex<MetadataQueue>,
}

impl SharedMetadataQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(MetadataQueue::with_capacity(capacity)),
        }
    }

    /// Producer side: publish a batch, returns how many entries fit.
    pub fn publish(&self, metas: &[PacketMetadata]) -> usize {
        self.lock().extend_from_slice(metas)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }
}

impl MetadataSource for SharedMetadataQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, MetadataQueue> {
        // A panicked producer leaves plain data behind; keep draining it.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
