// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reporter stage
//!
//! One dedicated thread consuming the handoff. It sleeps until at least
//! `min_batches` epochs are pending, drains them, and processes the
//! earliest epoch whenever enough remain to cover the loss estimator's
//! look-ahead. Every processed stream entry is folded into each schedule
//! slot's accumulator map; when a slot fires, stream entries roll up into
//! flow entries and a [`Results`] record goes out for every flow that saw
//! traffic.
//!
//! Persistent estimator state (loss anchor, extent missing table, density
//! window) is keyed by stream identity and owned exclusively by this
//! thread.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::api::{ReportListener, Results};
use crate::core::key::MetricKey;
use crate::core::range::SeqnoRange;
use crate::engine::handoff::Handoff;
use crate::engine::schedule::ReportSchedule;
use crate::engine::{EngineStats, Measures};
use crate::epoch::{EpochList, EpochMap, ItemPool, MapPool};
use crate::metrics::density::{density_a2r, DensityState};
use crate::metrics::extent::{extent_a2r, ExtentState};
use crate::metrics::loss::{loss_a2r, LossState};
use crate::metrics::report::ReportAccum;

/// Persistent per-stream estimator state.
#[derive(Debug, Default)]
struct StreamState {
    loss: LossState,
    extent: ExtentState,
    density: DensityState,
}

pub(crate) struct Reporter {
    handoff: Arc<Handoff>,
    schedule: ReportSchedule,
    window: usize,
    measures: Measures,
    listener: Arc<dyn ReportListener>,
    /// One accumulator map per schedule slot.
    trackers: Vec<HashMap<MetricKey, ReportAccum>>,
    states: HashMap<MetricKey, StreamState>,
    local: EpochList,
    map_pool: MapPool,
    item_pool: ItemPool,
    assembly: Vec<SeqnoRange>,
    stats: Arc<EngineStats>,
}

impl Reporter {
    pub(crate) fn new(
        handoff: Arc<Handoff>,
        schedule: ReportSchedule,
        window: usize,
        measures: Measures,
        listener: Arc<dyn ReportListener>,
        stats: Arc<EngineStats>,
    ) -> Self {
        let trackers = (0..schedule.parallelism())
            .map(|_| HashMap::new())
            .collect();
        Self {
            handoff,
            schedule,
            window: window.max(1),
            measures,
            listener,
            trackers,
            states: HashMap::new(),
            local: EpochList::default(),
            map_pool: MapPool::default(),
            item_pool: ItemPool::default(),
            assembly: Vec::new(),
            stats,
        }
    }

    /// Main loop: wait for a full window, process, repeat until shutdown.
    pub(crate) fn run(mut self) {
        log::debug!(
            "[reporter] started (window {}, {} slot(s))",
            self.window,
            self.schedule.parallelism()
        );
        loop {
            let alive = self.handoff.wait_window(
                self.window,
                &mut self.local,
                &mut self.map_pool,
                &mut self.item_pool,
            );
            while self.local.len() >= self.window {
                let epoch = self
                    .local
                    .pop_earliest()
                    .unwrap_or_default();
                self.process_epoch(&epoch);
                self.recycle(epoch);
            }
            if !alive {
                break;
            }
        }
        log::debug!("[reporter] stopped");
    }

    /// Drive the estimators over one epoch and fire due slots.
    fn process_epoch(&mut self, epoch: &EpochMap) {
        for (key, entry) in epoch.iter() {
            let state = self.states.entry(*key).or_default();
            let mut rd = ReportAccum {
                pkt: entry.pkt,
                ..ReportAccum::default()
            };
            if self.measures.loss {
                // Look-ahead: the epochs still queued locally are exactly
                // the ones created after this epoch.
                let futures = self
                    .local
                    .iter()
                    .take(self.window - 1)
                    .filter_map(|m| m.get(key));
                loss_a2r(
                    &mut rd.loss,
                    entry,
                    &mut state.loss,
                    futures,
                    &mut self.assembly,
                );
            } else {
                rd.loss.flow_state = entry.flow_state;
            }
            if self.measures.extent {
                extent_a2r(&mut rd.extent, entry, &mut state.extent);
            }
            if self.measures.density {
                density_a2r(&mut rd.density, entry, &mut state.density);
            }
            for tracker in &mut self.trackers {
                tracker.entry(*key).or_default().accumulate_time(&rd);
            }
        }

        let now = Instant::now();
        for slot in 0..self.schedule.parallelism() {
            if self.schedule.outlets(slot, now).is_some() {
                self.fire_slot(slot);
                self.schedule.reset(slot, now);
            }
        }
    }

    /// Roll streams up into flows, emit, and clear the slot's tracker.
    fn fire_slot(&mut self, slot: usize) {
        let duration_us = self.schedule.duration_us(slot);
        let tracker = &mut self.trackers[slot];

        let stream_keys: Vec<MetricKey> = tracker
            .keys()
            .filter(|k| k.is_stream())
            .copied()
            .collect();
        for key in stream_keys {
            let rd = tracker[&key].clone();
            tracker
                .entry(key.flow_of())
                .or_default()
                .accumulate_flows(&rd);
        }

        let mut emitted = 0u64;
        for (key, rd) in tracker.iter().filter(|(k, _)| !k.is_stream()) {
            if rd.pkt.count == 0 {
                continue;
            }
            let results = Results::build(key.flow_key, rd, &self.measures, duration_us);
            self.listener.on_report(results);
            emitted += 1;
        }
        if emitted > 0 {
            log::trace!("[reporter] slot {} emitted {} report(s)", slot, emitted);
            self.stats.reports_emitted.fetch_add(emitted, Ordering::Relaxed);
        }
        tracker.clear();
    }

    /// Return a spent epoch's storage to the pools.
    fn recycle(&mut self, mut epoch: EpochMap) {
        epoch.clear_into(&mut self.item_pool);
        self.map_pool.put(epoch);
    }
}
