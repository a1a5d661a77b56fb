// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reorder-density estimation (RFC 5236 style)
//!
//! Tracks the signed displacement `D = RI - seq` between each packet's
//! receive index and its original position, accumulated into a bounded
//! histogram of `2*DT + 1` bins. The estimator alternates between two
//! phases: *seeking* (waiting for a fresh arrival to append to the
//! window) and *processing* (consuming the window head against the
//! receive index). Displacements beyond the threshold are silently
//! dropped; there is no assumed-drop tally for density.

use std::collections::{BTreeSet, VecDeque};

use crate::config::{DT, WINDOW_SIZE};
use crate::core::seq::Seqno;
use crate::epoch::StreamEpoch;

/// Persistent per-stream density state, owned by the reporter.
#[derive(Debug)]
pub struct DensityState {
    /// True while awaiting a new arrival (state 1); false while
    /// processing window items (state 0).
    seeking: bool,
    /// Receive index.
    ri: Seqno,
    /// FIFO of accepted arrivals awaiting processing.
    window: VecDeque<Seqno>,
    /// Early packets set aside until the receive index catches up.
    buffer: BTreeSet<Seqno>,
    /// Window bootstrap finished.
    initialized: bool,
}

impl Default for DensityState {
    fn default() -> Self {
        Self {
            seeking: false,
            ri: 0,
            window: VecDeque::with_capacity(WINDOW_SIZE),
            buffer: BTreeSet::new(),
            initialized: false,
        }
    }
}

/// Density histogram for one report interval.
#[derive(Debug, Clone, Copy)]
pub struct DensityAccum {
    /// Bin `D + DT` counts packets observed at displacement `D`.
    pub fd: [u64; WINDOW_SIZE],
}

impl Default for DensityAccum {
    fn default() -> Self {
        Self {
            fd: [0; WINDOW_SIZE],
        }
    }
}

impl DensityAccum {
    /// Fold another interval into this one (additive for both per-time
    /// and per-flow rollup).
    pub fn accumulate(&mut self, other: &DensityAccum) {
        for (bin, add) in self.fd.iter_mut().zip(other.fd.iter()) {
            *bin += add;
        }
    }
}

/// Process one epoch's reorder ranges, in arrival order.
pub fn density_a2r(accum: &mut DensityAccum, entry: &StreamEpoch, state: &mut DensityState) {
    for r in &entry.reorder {
        let mut seq = r.low;
        loop {
            process_arrival(accum, state, seq);
            if seq == r.high {
                break;
            }
            seq = seq.wrapping_add(1);
        }
    }
}

fn process_arrival(accum: &mut DensityAccum, state: &mut DensityState, seq: Seqno) {
    // Bootstrap: collect DT + 1 distinct values, then start at index 0.
    if !state.initialized {
        if !state.window.contains(&seq) {
            state.window.push_back(seq);
        }
        if state.window.len() == DT as usize + 1 {
            state.ri = 0;
            state.initialized = true;
            log::trace!("[reporter] density window bootstrapped");
        }
        return;
    }

    let mut handled = false;
    if state.seeking {
        handled = try_accept(state, seq);
    }
    if !state.seeking {
        process_window_item(accum, state);
    }
    if state.seeking && !handled {
        try_accept(state, seq);
    }
}

/// Seeking phase: accept a fresh arrival into the window.
fn try_accept(state: &mut DensityState, seq: Seqno) -> bool {
    if seq >= state.ri && !state.window.contains(&seq) && !state.buffer.contains(&seq) {
        state.window.push_back(seq);
        state.seeking = false;
        true
    } else {
        false
    }
}

/// Processing phase: consume one window item against the receive index.
fn process_window_item(accum: &mut DensityAccum, state: &mut DensityState) {
    let indexed = state.window.contains(&state.ri) || state.buffer.contains(&state.ri);
    if indexed {
        let Some(head) = state.window.pop_front() else {
            advance_ri(state);
            return;
        };
        let d = i64::from(state.ri) - i64::from(head);
        if d.unsigned_abs() <= DT as u64 {
            accum.fd[(d + DT) as usize] += 1;
            state.buffer.remove(&state.ri);
            if d < 0 {
                state.buffer.insert(head);
            }
            state.ri = state.ri.wrapping_add(1);
        }
        // Beyond the threshold: no histogram entry, index unchanged, the
        // head is discarded.
        state.seeking = true;
    } else {
        advance_ri(state);
    }
}

/// The receive index refers to nothing pending; skip it forward.
fn advance_ri(state: &mut DensityState) {
    let window_min = state.window.iter().min().copied();
    let buffer_min = state.buffer.iter().next().copied();
    let floor = match (window_min, buffer_min) {
        (Some(w), Some(b)) => Some(w.min(b)),
        (Some(w), None) => Some(w),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    let next = state.ri.wrapping_add(1);
    state.ri = match floor {
        Some(floor) => next.max(floor),
        None => next,
    };
    state.seeking = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::range::record_arrival;

    fn epoch_with(seqs: &[u32]) -> StreamEpoch {
        let mut entry = StreamEpoch::default();
        for &seq in seqs {
            record_arrival(&mut entry.reorder, seq);
        }
        entry
    }

    fn run(seqs: &[u32], state: &mut DensityState) -> DensityAccum {
        let mut accum = DensityAccum::default();
        density_a2r(&mut accum, &epoch_with(seqs), state);
        accum
    }

    fn total(accum: &DensityAccum) -> u64 {
        accum.fd.iter().sum()
    }

    #[test]
    fn test_bootstrap_consumes_first_window() {
        let mut state = DensityState::default();
        let seqs: Vec<u32> = (0..=(DT as u32)).collect();
        let accum = run(&seqs, &mut state);

        assert!(state.initialized, "DT + 1 distinct values complete bootstrap");
        assert_eq!(total(&accum), 0, "bootstrap arrivals produce no entries");
    }

    #[test]
    fn test_in_order_after_bootstrap_hits_center_bin() {
        let mut state = DensityState::default();
        let seqs: Vec<u32> = (0..32).collect();
        let accum = run(&seqs, &mut state);

        let center = DT as usize;
        assert!(accum.fd[center] > 0, "in-order traffic lands at D = 0");
        let off_center: u64 = total(&accum) - accum.fd[center];
        assert_eq!(off_center, 0);
    }

    #[test]
    fn test_late_arrival_produces_negative_displacement() {
        // In-order bootstrap, then 10 before 9.
        let mut state = DensityState::default();
        let mut seqs: Vec<u32> = (0..=8).collect();
        seqs.extend([10, 9]);
        let accum = run(&seqs, &mut state);

        let center = DT as usize;
        assert!(accum.fd[center] > 0, "bootstrap successors land at D = 0");

        // Drain the pipeline so index 9 and 10 get processed.
        let accum2 = run(&(11..32).collect::<Vec<_>>(), &mut state);
        let negative: u64 = accum2.fd[..center].iter().sum();
        assert!(negative > 0, "the displaced 10 must appear below D = 0");
        let positive: u64 = accum2.fd[center + 1..].iter().sum();
        assert!(positive > 0, "the late 9 must appear above D = 0");
    }

    #[test]
    fn test_histogram_bounded_by_arrivals() {
        let mut state = DensityState::default();
        let mut seqs: Vec<u32> = (0..100).collect();
        seqs.swap(20, 22);
        seqs.swap(50, 51);
        let accum = run(&seqs, &mut state);

        assert!(total(&accum) <= 100);
    }

    #[test]
    fn test_duplicates_not_accepted() {
        let mut state = DensityState::default();
        let seqs: Vec<u32> = (0..=(DT as u32)).collect();
        let _ = run(&seqs, &mut state);
        let before = state.window.len();

        // Duplicate of a window value: rejected in seek phase, and the
        // processing it triggers drains at most as much as it adds.
        let _ = run(&[0, 0, 0], &mut state);
        assert!(state.window.len() <= before);
    }

    #[test]
    fn test_far_jump_recovers_via_index_skip() {
        let mut state = DensityState::default();
        let seqs: Vec<u32> = (0..=(DT as u32)).collect();
        let _ = run(&seqs, &mut state);

        // A far jump strands the receive index below everything pending;
        // the skip-forward rule catches it up without fabricating
        // displacement entries.
        let jump = 1000;
        let arrivals: Vec<u32> = (0..24).map(|k| jump + k).collect();
        let accum = run(&arrivals, &mut state);

        let center = DT as usize;
        assert!(state.ri >= jump, "receive index must skip to the new run");
        assert!(accum.fd[center] > 0, "the new run settles back to D = 0");
        assert!(total(&accum) <= arrivals.len() as u64);
    }

    #[test]
    fn test_accumulate_is_additive() {
        let mut a = DensityAccum::default();
        a.fd[DT as usize] = 3;
        let mut b = DensityAccum::default();
        b.fd[DT as usize] = 2;
        b.fd[0] = 1;

        a.accumulate(&b);
        assert_eq!(a.fd[DT as usize], 5);
        assert_eq!(a.fd[0], 1);
    }
}
