// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public results record
//!
//! One [`Results`] per flow per report interval, passed by value to the
//! listener. The three metric sections are present only when the
//! corresponding estimator was enabled at `init`.

use crate::config::{DT, KEY_SIZE, MAX_EXTENT, WINDOW_SIZE};
use crate::engine::Measures;
use crate::metrics::report::ReportAccum;

/// Loss metrics for one flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossResults {
    pub packets_received: u64,
    pub packets_dropped: u64,
    /// Loss ratio `dropped / (received + dropped)`.
    pub value: f64,
    /// Drops beyond the first of each gap.
    pub consecutive_drops: u64,
    /// Loss autocorrelation; zero when nothing was dropped.
    pub autocorr: f64,
    pub gap_count: u64,
    /// Zero when `gap_count` is zero.
    pub gap_min: u64,
    pub gap_max: u64,
    /// Streams excluded from the rollup due to inconsistent flow state.
    pub bad_flows: u64,
}

/// Reorder-extent metrics for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentResults {
    /// Bins `0..MAX_EXTENT`; bin 0 counts in-order arrivals.
    pub histogram: [u64; MAX_EXTENT],
    /// Missing packets aged out of the tracking horizon.
    pub assumed_drops: u64,
}

/// One reorder-density histogram bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityBin {
    /// Signed displacement `D` this bin counts.
    pub distance: i32,
    pub frequency: u64,
}

/// Reorder-density metrics for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityResults {
    /// Bins for displacements `-DT ..= +DT`.
    pub bins: [DensityBin; WINDOW_SIZE],
}

/// Per-flow quality report.
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    pub flow_key: [u8; KEY_SIZE],
    /// Wall-clock microseconds of the first arrival in the interval.
    pub earliest_us: u64,
    /// Wall-clock microseconds of the last arrival in the interval.
    pub latest_us: u64,
    /// Configured report duration in microseconds.
    pub duration_us: u64,
    pub min_seq: u32,
    pub max_seq: u32,
    pub packet_count: u64,
    pub loss: Option<LossResults>,
    pub reorder_extent: Option<ExtentResults>,
    pub reorder_density: Option<DensityResults>,
}

impl Results {
    /// Assemble the public record from a flow-level accumulator.
    pub(crate) fn build(
        flow_key: [u8; KEY_SIZE],
        rd: &ReportAccum,
        measures: &Measures,
        duration_us: u64,
    ) -> Self {
        let loss = measures.loss.then(|| LossResults {
            packets_received: rd.loss.received,
            packets_dropped: rd.loss.dropped,
            value: rd.loss.loss_value(),
            consecutive_drops: rd.loss.consecutive_drops,
            autocorr: rd.loss.autocorr(),
            gap_count: rd.loss.gap_count,
            gap_min: if rd.loss.gap_count == 0 {
                0
            } else {
                rd.loss.gap_min
            },
            gap_max: rd.loss.gap_max,
            bad_flows: rd.loss.bad_flows,
        });

        let reorder_extent = measures.extent.then(|| {
            let mut histogram = [0u64; MAX_EXTENT];
            histogram.copy_from_slice(&rd.extent.histogram[..MAX_EXTENT]);
            ExtentResults {
                histogram,
                assumed_drops: rd.extent.assumed_drops,
            }
        });

        let reorder_density = measures.density.then(|| {
            let mut bins = [DensityBin {
                distance: 0,
                frequency: 0,
            }; WINDOW_SIZE];
            for (i, bin) in bins.iter_mut().enumerate() {
                bin.distance = i as i32 - DT as i32;
                bin.frequency = rd.density.fd[i];
            }
            DensityResults { bins }
        });

        Self {
            flow_key,
            earliest_us: rd.pkt.earliest_us,
            latest_us: rd.pkt.latest_us,
            duration_us,
            min_seq: rd.pkt.min_seq,
            max_seq: rd.pkt.max_seq,
            packet_count: rd.pkt.count,
            loss,
            reorder_extent,
            reorder_density,
        }
    }
}
