//! Flow aggregator for compacting a reporting window into flows
//!
//! Packets are grouped by (local_ip, remote_ip, remote_port, protocol) and
//! their frame lengths summed into download/upload counters.

use crate::capture::record::ClassifiedPacket;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Key for flow aggregation
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct FlowKey {
    pub local_ip: String,
    pub remote_ip: String,
    pub remote_port: String,
    pub protocol: String,
}

impl FlowKey {
    fn of(packet: &ClassifiedPacket) -> Self {
        Self {
            local_ip: packet.local_ip.clone(),
            remote_ip: packet.remote_ip.clone(),
            remote_port: packet.remote_port.clone(),
            protocol: packet.protocol.clone(),
        }
    }
}

/// Aggregated byte counters of one flow within one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowAggregate {
    pub key: FlowKey,
    /// Representative time of the flow, only used to order CSV output
    pub first_seen: DateTime<Utc>,
    pub download: u64,
    pub upload: u64,
}

impl FlowAggregate {
    fn new(key: FlowKey, first_seen: DateTime<Utc>) -> Self {
        Self {
            key,
            first_seen,
            download: 0,
            upload: 0,
        }
    }

    fn add(&mut self, packet: &ClassifiedPacket) {
        if packet.is_upload {
            self.upload = self.upload.saturating_add(packet.frame_length);
        } else {
            self.download = self.download.saturating_add(packet.frame_length);
        }
        // Earliest wins so the result is independent of traversal order.
        if packet.timestamp < self.first_seen {
            self.first_seen = packet.timestamp;
        }
    }
}

/// Compacted flows of one window
pub type FlowMap = HashMap<FlowKey, FlowAggregate>;

/// Group packets by flow key, summing download and upload bytes
pub fn compact<'a, I>(packets: I) -> FlowMap
where
    I: IntoIterator<Item = &'a ClassifiedPacket>,
{
    let mut flows = FlowMap::new();
    for packet in packets {
        flows
            .entry(FlowKey::of(packet))
            .or_insert_with_key(|key| FlowAggregate::new(key.clone(), packet.timestamp))
            .add(packet);
    }
    flows
}

/// Flows ordered ascending by representative time
pub fn sorted_by_time(flows: &FlowMap) -> Vec<&FlowAggregate> {
    let mut sorted: Vec<&FlowAggregate> = flows.values().collect();
    sorted.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.key.cmp(&b.key)));
    sorted
}
