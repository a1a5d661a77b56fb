// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Aggregator stage
//!
//! One dedicated thread consuming the staging channel. Arrivals are
//! recorded into the current working epoch; a rolling deadline rotates
//! the epoch every `interval`, whether or not traffic arrived. Rotation
//! closes each live entry with a delimiter event, publishes the epoch to
//! the reporter, and reclaims recycled maps and items for reuse.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::key::{MetricKey, PacketInfo};
use crate::core::flowstate::FlowEvent;
use crate::core::range::record_arrival;
use crate::engine::handoff::Handoff;
use crate::engine::{wall_clock_us, EngineStats};
use crate::epoch::{EpochMap, ItemPool, MapPool};
use crate::metrics::loss::loss_arrival;
use crate::staging::{Consumer, Popped};

pub(crate) struct Aggregator {
    consumer: Consumer<PacketInfo>,
    handoff: Arc<Handoff>,
    interval: Duration,
    current: EpochMap,
    map_pool: MapPool,
    item_pool: ItemPool,
    stats: Arc<EngineStats>,
}

impl Aggregator {
    pub(crate) fn new(
        consumer: Consumer<PacketInfo>,
        handoff: Arc<Handoff>,
        interval: Duration,
        stats: Arc<EngineStats>,
    ) -> Self {
        // A zero interval degenerates to rotate-per-wakeup; clamp so the
        // deadline still advances.
        let interval = interval.max(Duration::from_micros(1));
        let mut aggregator = Self {
            consumer,
            handoff,
            interval,
            current: EpochMap::default(),
            map_pool: MapPool::default(),
            item_pool: ItemPool::default(),
            stats,
        };
        aggregator.current.opened_us = wall_clock_us();
        aggregator
    }

    /// Main loop: consume until shutdown, rotating on each boundary.
    pub(crate) fn run(mut self) {
        log::debug!("[aggregator] started (interval {:?})", self.interval);
        let mut deadline = Instant::now() + self.interval;
        loop {
            match self.consumer.timed_pop(deadline) {
                Popped::Item(pkt) => {
                    if Instant::now() >= deadline {
                        self.rotate();
                        deadline += self.interval;
                    }
                    self.record(pkt);
                }
                Popped::TimedOut => {
                    self.rotate();
                    deadline += self.interval;
                }
                Popped::Shutdown => break,
            }
        }
        log::debug!("[aggregator] stopped");
    }

    /// Record one arrival into the current epoch.
    ///
    /// The wall-clock timestamp is taken here, at processing time.
    fn record(&mut self, pkt: PacketInfo) {
        let now_us = wall_clock_us();
        let key = MetricKey::stream(pkt.stream);
        let entry = self.current.force(key, &mut self.item_pool);
        entry.pkt.arrival(pkt.seq, now_us);
        loss_arrival(entry, pkt.seq);
        record_arrival(&mut entry.reorder, pkt.seq);
        self.stats.packets_aggregated.fetch_add(1, Ordering::Relaxed);
    }

    /// Close the working epoch and hand it to the reporter.
    fn rotate(&mut self) {
        for entry in self.current.values_mut() {
            entry.flow_state = entry.flow_state.advance(FlowEvent::Delimit);
        }
        let outgoing = std::mem::take(&mut self.current);
        log::trace!(
            "[aggregator] rotating epoch with {} stream(s)",
            outgoing.len()
        );
        self.handoff
            .publish_epoch(outgoing, &mut self.map_pool, &mut self.item_pool);
        self.current = self.map_pool.take();
        self.current.opened_us = wall_clock_us();
        self.stats.epochs_rotated.fetch_add(1, Ordering::Relaxed);
    }
}
