// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet-loss estimation
//!
//! Arrival side (aggregator): coalesce received sequence numbers into the
//! epoch's loss range view and advance the epoch's flow state.
//!
//! Reporter side: [`loss_a2r`] assembles one epoch's ranges together with
//! an optional anchor from the previous computation and ranges borrowed
//! from look-ahead epochs, sorts the assembly into modular order, and
//! sweeps it once to tally received/dropped counts and gap statistics.
//! The look-ahead keeps a packet that straddles an epoch boundary from
//! being charged as dropped in one epoch and received in the next.

use crate::core::flowstate::{FlowEvent, FlowState};
use crate::core::range::{record_arrival, sort_assembly, ArrivalPeriod, SeqnoRange};
use crate::core::seq::{modular_distance, Seqno};
use crate::epoch::StreamEpoch;

/// Persistent per-stream loss state, owned by the reporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LossState {
    /// `high` is valid.
    pub has_high: bool,
    /// Highest sequence accounted for by the previous computation.
    pub high: Seqno,
}

/// Loss tallies for one stream or flow over one report interval.
#[derive(Debug, Clone, Copy)]
pub struct LossAccum {
    pub received: u64,
    pub dropped: u64,
    /// Drops beyond the first of each gap (burst indicator).
    pub consecutive_drops: u64,
    pub gap_total: u64,
    pub gap_count: u64,
    /// Meaningful only when `gap_count > 0`.
    pub gap_min: u64,
    pub gap_max: u64,
    /// Streams whose flow state degenerated, counted at flow rollup.
    pub bad_flows: u64,
    pub flow_state: FlowState,
}

impl Default for LossAccum {
    fn default() -> Self {
        Self {
            received: 0,
            dropped: 0,
            consecutive_drops: 0,
            gap_total: 0,
            gap_count: 0,
            gap_min: u64::MAX,
            gap_max: 0,
            bad_flows: 0,
            flow_state: FlowState::Null,
        }
    }
}

impl LossAccum {
    /// Fold a later interval of the same stream into this one.
    pub fn accumulate_time(&mut self, other: &LossAccum) {
        self.received += other.received;
        self.dropped += other.dropped;
        self.consecutive_drops += other.consecutive_drops;
        self.gap_total += other.gap_total;
        self.gap_count += other.gap_count;
        if other.gap_count > 0 {
            self.gap_min = self.gap_min.min(other.gap_min);
            self.gap_max = self.gap_max.max(other.gap_max);
        }
        self.bad_flows += other.bad_flows;
        self.flow_state = self.flow_state.concat(other.flow_state);
    }

    /// Fold one stream's interval into its flow rollup.
    ///
    /// A degenerated flow state contributes a bad-flow count instead of
    /// its tallies.
    pub fn accumulate_flows(&mut self, other: &LossAccum) {
        if other.flow_state == FlowState::Error {
            self.bad_flows += 1;
            return;
        }
        self.received += other.received;
        self.dropped += other.dropped;
        self.consecutive_drops += other.consecutive_drops;
        self.gap_total += other.gap_total;
        self.gap_count += other.gap_count;
        if other.gap_count > 0 {
            self.gap_min = self.gap_min.min(other.gap_min);
            self.gap_max = self.gap_max.max(other.gap_max);
        }
        self.bad_flows += other.bad_flows;
    }

    /// Loss ratio `dropped / (received + dropped)`.
    pub fn loss_value(&self) -> f64 {
        let denom = self.received + self.dropped;
        if denom == 0 {
            0.0
        } else {
            self.dropped as f64 / denom as f64
        }
    }

    /// Loss autocorrelation `(c*r + c*d - d*d) / (d*r)`, zero when no
    /// drops occurred.
    pub fn autocorr(&self) -> f64 {
        if self.dropped == 0 {
            return 0.0;
        }
        let c = self.consecutive_drops as f64;
        let r = self.received as f64;
        let d = self.dropped as f64;
        (c * r + c * d - d * d) / (d * r)
    }
}

/// Aggregator-side arrival: extend the loss view and mark a packet event.
pub fn loss_arrival(entry: &mut StreamEpoch, seq: Seqno) {
    record_arrival(&mut entry.loss, seq);
    entry.flow_state = entry.flow_state.advance(FlowEvent::Packet);
}

/// Reporter-side computation for one stream over one epoch.
///
/// `futures` supplies the look-ahead epochs in creation order; only their
/// ranges for this stream are borrowed (copied into `assembly`, never
/// moved). `assembly` is caller-owned scratch reused across computations.
pub fn loss_a2r<'a>(
    accum: &mut LossAccum,
    entry: &StreamEpoch,
    state: &mut LossState,
    futures: impl Iterator<Item = &'a StreamEpoch>,
    assembly: &mut Vec<SeqnoRange>,
) {
    accum.flow_state = entry.flow_state;

    assembly.clear();
    for r in &entry.loss {
        assembly.push(SeqnoRange {
            wraparound: false,
            period: ArrivalPeriod::Present,
            ..*r
        });
    }
    let anchored = entry.flow_state.begins_with_packet() && state.has_high;
    if anchored {
        assembly.push(SeqnoRange {
            low: state.high,
            high: state.high,
            wraparound: false,
            period: ArrivalPeriod::Past,
        });
    }
    for future in futures {
        for r in &future.loss {
            assembly.push(SeqnoRange {
                wraparound: false,
                period: ArrivalPeriod::Future,
                ..*r
            });
        }
    }
    if assembly.is_empty() {
        return;
    }

    sort_assembly(assembly);

    // Slice: sweep starts after the anchor and stops at the last range
    // owned by this epoch. Trailing look-ahead ranges are only context.
    let mut begin = 0;
    let mut end = None;
    for (i, r) in assembly.iter().enumerate() {
        match r.period {
            ArrivalPeriod::Past => begin = i + 1,
            ArrivalPeriod::Present => end = Some(i),
            ArrivalPeriod::Future => {}
        }
    }
    let Some(end) = end else {
        return;
    };
    if end < begin {
        return;
    }

    let mut prev_high = if anchored {
        state.high
    } else {
        assembly[begin].low.wrapping_sub(1)
    };
    let base = prev_high;

    for r in &assembly[begin..=end] {
        let mut low = r.low;
        let mut high = r.high;
        let d_prev = modular_distance(base, prev_high);
        let d_lo = modular_distance(base, low);
        let d_hi = modular_distance(base, high);
        if d_lo <= d_prev {
            if d_hi <= d_prev {
                // Entirely inside already-counted territory.
                continue;
            }
            low = prev_high.wrapping_add(1);
            if high < low {
                high = base.wrapping_sub(1);
            }
        }

        let received = u64::from(high.wrapping_sub(low)) + 1;
        let distance = u64::from(modular_distance(prev_high, low));
        let gap = distance.saturating_sub(1);

        accum.received += received;
        accum.dropped += gap;
        if gap > 1 {
            accum.consecutive_drops += gap - 1;
        }
        if gap > 0 {
            accum.gap_total += gap;
            accum.gap_count += 1;
            accum.gap_min = accum.gap_min.min(gap);
            accum.gap_max = accum.gap_max.max(gap);
        }
        prev_high = high;
    }

    state.high = prev_high;
    state.has_high = true;
}
