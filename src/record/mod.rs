//! Bounded result buffer and its JSON export.

use crate::error::{PersistError, StartupError};
use serde::ser::{Serialize, SerializeTuple, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Verdict for one analyzed flow window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowRecord {
    /// Source address in host order
    pub address: u32,
    pub distance: f64,
    pub packet_count: usize,
}

/// Serialized as `[address, distance, packet_count]`.
impl Serialize for FlowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(3)?;
        t.serialize_element(&self.address)?;
        t.serialize_element(&self.distance)?;
        t.serialize_element(&self.packet_count)?;
        t.end()
    }
}

#[derive(serde::Serialize)]
struct ResultDocument<'a> {
    #[serde(rename = "Results")]
    results: &'a [FlowRecord],
}

/// Circular record buffer. `total` keeps counting past capacity; the oldest
/// records are overwritten.
#[derive(Debug)]
pub struct ResultRecorder {
    slots: Vec<FlowRecord>,
    total: usize,
}

impl ResultRecorder {
    pub fn allocate(capacity: usize) -> Result<Self, StartupError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| StartupError::Allocation {
                buffer: "result",
                size: capacity,
            })?;
        slots.resize(capacity, FlowRecord::default());
        Ok(Self { slots, total: 0 })
    }

    pub fn record(&mut self, record: FlowRecord) {
        let cap = self.slots.len();
        if cap == 0 {
            return;
        }
        self.slots[self.total % cap] = record;
        self.total += 1;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Records appended over the recorder's lifetime.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Records currently held.
    pub fn len(&self) -> usize {
        self.total.min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Held records in slot order.
    pub fn records(&self) -> &[FlowRecord] {
        &self.slots[..self.len()]
    }

    /// Held records from oldest to newest.
    pub fn chronological(&self) -> impl Iterator<Item = &FlowRecord> + '_ {
        let held = self.records();
        let split = if self.total > self.slots.len() {
            self.total % self.slots.len()
        } else {
            0
        };
        held[split..].iter().chain(held[..split].iter())
    }

    /// Write `{"Results": [[address, distance, packet_count], ...]}`, creating
    /// the parent directory when absent.
    pub fn save_json(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer(
            &mut out,
            &ResultDocument {
                results: self.records(),
            },
        )?;
        out.flush()?;
        Ok(())
    }
}
