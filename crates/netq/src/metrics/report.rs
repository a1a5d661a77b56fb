// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Report-interval accumulators
//!
//! A [`ReportAccum`] carries one stream's (or one flow's) metrics across a
//! report interval: packet statistics plus the three estimator outputs.
//! Per-time accumulation folds consecutive epochs of one stream; per-flow
//! accumulation rolls stream entries up into their flow entry at emission
//! time.

use crate::metrics::density::DensityAccum;
use crate::metrics::extent::ExtentAccum;
use crate::metrics::loss::LossAccum;
use crate::metrics::packet::PacketStats;

/// Accumulated metrics for one tracker entry.
#[derive(Debug, Clone, Default)]
pub struct ReportAccum {
    pub pkt: PacketStats,
    pub loss: LossAccum,
    pub extent: ExtentAccum,
    pub density: DensityAccum,
}

impl ReportAccum {
    /// Fold a later epoch of the same stream into this interval.
    pub fn accumulate_time(&mut self, other: &ReportAccum) {
        self.pkt.accumulate(&other.pkt);
        self.loss.accumulate_time(&other.loss);
        self.extent.accumulate(&other.extent);
        self.density.accumulate(&other.density);
    }

    /// Fold one stream's interval into its flow rollup.
    ///
    /// Packet and reorder statistics always fold; a degenerated flow
    /// state redirects the loss unit into the bad-flow count.
    pub fn accumulate_flows(&mut self, other: &ReportAccum) {
        self.pkt.accumulate(&other.pkt);
        self.loss.accumulate_flows(&other.loss);
        self.extent.accumulate(&other.extent);
        self.density.accumulate(&other.density);
    }
}
