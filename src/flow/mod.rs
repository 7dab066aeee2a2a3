//! Flow aggregation: buckets intake metadata by source address.
//!
//! Packets are copied into their flow's window at aggregation time, so flows
//! carried over to later passes never point into reused intake slots.

use crate::intake::{IntakeBuffer, PacketMetadata};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// One flow's accumulated packets, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowWindow {
    /// Source address in host order
    pub address: u32,
    pub packets: Vec<PacketMetadata>,
}

impl FlowWindow {
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.address)
    }
}

/// Packet and byte totals seen by one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub packets: usize,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct FlowTable {
    flows: BTreeMap<u32, Vec<PacketMetadata>>,
    min_window: usize,
}

impl FlowTable {
    /// `min_window` is the packet count at which a flow becomes eligible.
    pub fn new(min_window: usize) -> Self {
        Self {
            flows: BTreeMap::new(),
            min_window,
        }
    }

    /// Move every valid intake entry into its flow and reset the intake cursor.
    pub fn aggregate(&mut self, intake: &mut IntakeBuffer) -> AggregateStats {
        let mut stats = AggregateStats::default();
        for meta in intake.as_slice() {
            stats.packets += 1;
            stats.bytes += u64::from(meta.length);
            self.flows.entry(meta.flow_key()).or_default().push(*meta);
        }
        intake.reset();
        stats
    }

    pub fn is_eligible(&self, address: u32) -> bool {
        self.flows
            .get(&address)
            .is_some_and(|p| p.len() >= self.min_window)
    }

    /// Eligible flow keys in table order.
    pub fn eligible(&self) -> Vec<u32> {
        self.flows
            .iter()
            .filter(|(_, p)| p.len() >= self.min_window)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Remove a flow for analysis.
    pub fn take(&mut self, address: u32) -> Option<FlowWindow> {
        self.flows
            .remove(&address)
            .map(|packets| FlowWindow { address, packets })
    }

    pub fn flow_len(&self, address: u32) -> Option<usize> {
        self.flows.get(&address).map(Vec::len)
    }

    /// Number of flows held, eligible or not.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn min_window(&self) -> usize {
        self.min_window
    }
}
