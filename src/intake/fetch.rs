//! Copies pending metadata from upstream sources into the analyzer's local buffer.

use super::{MetadataSource, PacketMetadata};
use crate::error::StartupError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed-capacity local buffer with a write cursor. `0 <= len() <= capacity()`.
#[derive(Debug)]
pub struct IntakeBuffer {
    slots: Vec<PacketMetadata>,
    cursor: usize,
    saturations: u64,
}

impl IntakeBuffer {
    /// Allocate all slots up front.
    pub fn allocate(capacity: usize) -> Result<Self, StartupError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| StartupError::Allocation {
                buffer: "packet metadata",
                size: capacity,
            })?;
        slots.resize(capacity, PacketMetadata::default());
        Ok(Self {
            slots,
            cursor: 0,
            saturations: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn remaining(&self) -> usize {
        self.slots.len() - self.cursor
    }

    pub fn as_slice(&self) -> &[PacketMetadata] {
        &self.slots[..self.cursor]
    }

    /// Fetches that found more pending entries than free slots. Survives `reset`.
    pub fn saturations(&self) -> u64 {
        self.saturations
    }

    /// Mark every entry consumed. Slots are overwritten by the next fetch.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    fn append(&mut self, metas: &[PacketMetadata]) {
        let end = self.cursor + metas.len();
        self.slots[self.cursor..end].copy_from_slice(metas);
        self.cursor = end;
    }
}

/// Drains registered sources under their exclusion tokens.
#[derive(Debug, Clone)]
pub struct Fetcher {
    core_id: u32,
    max_fetch: usize,
    min_fetch: usize,
}

impl Fetcher {
    pub fn new(core_id: u32, max_fetch: usize, min_fetch: usize) -> Self {
        Self {
            core_id,
            max_fetch,
            min_fetch,
        }
    }

    /// Fetch from every source in registration order; returns the total copied.
    pub fn fetch_all(
        &self,
        sources: &[Arc<dyn MetadataSource>],
        buf: &mut IntakeBuffer,
    ) -> usize {
        sources.iter().map(|s| self.fetch_from(s.as_ref(), buf)).sum()
    }

    /// Copy from one source. The token is held for the copy and the queue update only.
    pub fn fetch_from(&self, source: &dyn MetadataSource, buf: &mut IntakeBuffer) -> usize {
        let mut queue = source.lock();
        let pending = queue.pending_count();
        if pending < self.min_fetch {
            return 0;
        }

        let copy_len = if pending <= buf.remaining() {
            pending.min(self.max_fetch)
        } else {
            warn!(
                core = self.core_id,
                source = source.name(),
                pending,
                remaining = buf.remaining(),
                "analyzer queue reached max"
            );
            buf.saturations += 1;
            buf.remaining().min(self.max_fetch)
        };
        if copy_len == 0 {
            return 0;
        }

        buf.append(&queue.as_slice()[..copy_len]);
        queue.consume_front(copy_len);
        drop(queue);

        debug!(
            core = self.core_id,
            source = source.name(),
            copied = copy_len,
            "fetched metadata"
        );
        copy_len
    }
}
