// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Aggregator → reporter handoff
//!
//! One mutex and one condition carry everything the two stage threads
//! exchange: the pending epoch list (strict creation order), the two
//! recycling pools travelling the opposite way, and the done flag.
//!
//! The aggregator holds the lock only to push one epoch and scoop the
//! pools back; the reporter holds it only to drain the whole pending list
//! and deposit spent pools. Neither side ever touches the other's working
//! state.

use parking_lot::{Condvar, Mutex};

use crate::epoch::{EpochList, EpochMap, ItemPool, MapPool};

#[derive(Debug, Default)]
struct HandoffState {
    pending: EpochList,
    free_maps: MapPool,
    free_items: ItemPool,
    done: bool,
}

/// Shared pipeline state between the aggregator and the reporter.
#[derive(Debug, Default)]
pub struct Handoff {
    state: Mutex<HandoffState>,
    ready: Condvar,
}

impl Handoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator side: publish a finished epoch and reclaim spent pools.
    ///
    /// One lock acquisition; wakes the reporter.
    pub fn publish_epoch(
        &self,
        epoch: EpochMap,
        reclaim_maps: &mut MapPool,
        reclaim_items: &mut ItemPool,
    ) {
        let mut state = self.state.lock();
        state.pending.push_latest(epoch);
        state.free_maps.drain_into(reclaim_maps);
        state.free_items.drain_into(reclaim_items);
        drop(state);
        self.ready.notify_one();
    }

    /// Reporter side: wait until `window` epochs are pending (or shutdown),
    /// then drain them all into `local` and deposit spent pools.
    ///
    /// Returns `false` once shutdown has been observed; any epochs drained
    /// alongside are still valid.
    pub fn wait_window(
        &self,
        window: usize,
        local: &mut EpochList,
        spent_maps: &mut MapPool,
        spent_items: &mut ItemPool,
    ) -> bool {
        let mut state = self.state.lock();
        while state.pending.len() < window && !state.done {
            self.ready.wait(&mut state);
        }
        local.append(&mut state.pending);
        spent_maps.drain_into(&mut state.free_maps);
        spent_items.drain_into(&mut state.free_items);
        !state.done
    }

    /// Signal shutdown and wake the reporter.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.done = true;
        drop(state);
        self.ready.notify_all();
    }
}
