// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Epoch buckets
//!
//! The aggregator groups arrivals into fixed-duration *epochs*, one
//! [`EpochMap`] per interval, keyed by tagged stream identity. Maps and
//! their per-stream items are recycled through pools that shuttle between
//! the aggregator and the reporter at handoff: a retired epoch's maps and
//! items go back to the aggregator with their heap capacity intact, so the
//! steady state allocates nothing.

use std::collections::{HashMap, VecDeque};

use crate::core::flowstate::FlowState;
use crate::core::key::MetricKey;
use crate::core::range::SeqnoRange;
use crate::metrics::packet::PacketStats;

/// Per-stream, per-epoch aggregation record.
#[derive(Debug, Default)]
pub struct StreamEpoch {
    /// Packet statistics over this epoch.
    pub pkt: PacketStats,
    /// Loss view: coalesced ranges, most recent at the back.
    pub loss: Vec<SeqnoRange>,
    /// Reorder view: coalesced ranges in arrival order.
    pub reorder: Vec<SeqnoRange>,
    /// Arrival-pattern state for this epoch.
    pub flow_state: FlowState,
}

impl StreamEpoch {
    /// Reset for reuse, keeping range-vector capacity.
    fn reset(&mut self) {
        self.pkt = PacketStats::default();
        self.loss.clear();
        self.reorder.clear();
        self.flow_state = FlowState::default();
    }
}

/// Recycling pool of [`StreamEpoch`] items.
#[derive(Debug, Default)]
pub struct ItemPool {
    free: Vec<StreamEpoch>,
}

impl ItemPool {
    /// A cleared item, recycled when possible.
    pub fn take(&mut self) -> StreamEpoch {
        self.free.pop().unwrap_or_default()
    }

    pub fn put(&mut self, mut item: StreamEpoch) {
        item.reset();
        self.free.push(item);
    }

    /// Move every pooled item into `other`.
    pub fn drain_into(&mut self, other: &mut ItemPool) {
        other.free.append(&mut self.free);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// One aggregation epoch: per-stream records keyed by tagged identity.
#[derive(Debug, Default)]
pub struct EpochMap {
    pub(crate) streams: HashMap<MetricKey, StreamEpoch>,
    /// Wall-clock microseconds when the epoch was opened.
    pub opened_us: u64,
}

impl EpochMap {
    /// Lookup-or-create the record for `key`, recycling from `pool`.
    pub fn force(&mut self, key: MetricKey, pool: &mut ItemPool) -> &mut StreamEpoch {
        self.streams.entry(key).or_insert_with(|| pool.take())
    }

    pub fn get(&self, key: &MetricKey) -> Option<&StreamEpoch> {
        self.streams.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, &StreamEpoch)> {
        self.streams.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut StreamEpoch> {
        self.streams.values_mut()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Clear the map, returning every item to `pool`. Keeps table capacity.
    pub fn clear_into(&mut self, pool: &mut ItemPool) {
        for (_, item) in self.streams.drain() {
            pool.put(item);
        }
        self.opened_us = 0;
    }
}

/// Recycling pool of [`EpochMap`]s.
#[derive(Debug, Default)]
pub struct MapPool {
    free: Vec<EpochMap>,
}

impl MapPool {
    /// An empty map, recycled when possible.
    pub fn take(&mut self) -> EpochMap {
        self.free.pop().unwrap_or_default()
    }

    /// Return a map to the pool. The map must already be cleared.
    pub fn put(&mut self, map: EpochMap) {
        debug_assert!(map.is_empty(), "recycled epoch map must be cleared");
        self.free.push(map);
    }

    /// Move every pooled map into `other`.
    pub fn drain_into(&mut self, other: &mut MapPool) {
        other.free.append(&mut self.free);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// Ordered FIFO of epochs, earliest first.
#[derive(Debug, Default)]
pub struct EpochList {
    maps: VecDeque<EpochMap>,
}

impl EpochList {
    pub fn push_latest(&mut self, map: EpochMap) {
        self.maps.push_back(map);
    }

    pub fn pop_earliest(&mut self) -> Option<EpochMap> {
        self.maps.pop_front()
    }

    /// Iterate epochs from earliest to latest.
    pub fn iter(&self) -> impl Iterator<Item = &EpochMap> {
        self.maps.iter()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Append every epoch of `other`, preserving creation order.
    pub fn append(&mut self, other: &mut EpochList) {
        self.maps.append(&mut other.maps);
    }
}
