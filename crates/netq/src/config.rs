// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration — compile-time constants and runtime options
//!
//! Compile-time constants size the flow key and the metric histograms.
//! Runtime options arrive once through [`EstimatorConfig`] at `init` and
//! are immutable for the lifetime of the engine.

use crate::api::{Error, Result};

/// Bytes in an application flow key.
pub const KEY_SIZE: usize = 2;

/// Upper bound of the reorder-extent histogram.
///
/// A reordered packet observed later than this many arrivals after its
/// reference position is clamped into the top bin.
pub const MAX_EXTENT: usize = 255;

/// Displacement threshold of the reorder-density estimator.
pub const DT: i64 = 8;

/// Number of reorder-density bins, indexed by displacement `D + DT` for
/// `D` in `[-DT, +DT]`.
pub const WINDOW_SIZE: usize = 2 * DT as usize + 1;

/// Pruning horizon for extent missing-packet records: a record further
/// than this behind the next expected sequence is assumed dropped.
pub const MAX_HISTORY: u32 = 2 * MAX_EXTENT as u32;

/// Staging-queue local batch size that triggers an automatic flush.
pub const FLUSH_THRESHOLD: usize = 5;

/// Runtime options accepted by `init`.
///
/// # Example
///
/// ```ignore
/// let config = EstimatorConfig {
///     aggregation_interval: 0.5,
///     reporter_schedule: "c,5,0;c,5,2.5".into(),
///     ..EstimatorConfig::default()
/// };
/// netq::init(config, listener)?;
/// ```
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Epoch length in seconds (>= 0, finite).
    pub aggregation_interval: f64,
    /// Report schedule: `DESTS,INTERVAL[,OFFSET][;...]`, seconds as
    /// floating point, destination codes currently only `'c'` (callback).
    pub reporter_schedule: String,
    /// Number of epochs the reporter requires before processing one; the
    /// surplus is the loss estimator's look-ahead window.
    pub reporter_min_batches: u32,
    /// Run the loss estimator.
    pub measure_loss: bool,
    /// Run the RFC 4737 reorder-extent estimator.
    pub measure_reorder_extent: bool,
    /// Run the RFC 5236 reorder-density estimator.
    pub measure_reorder_density: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            aggregation_interval: 1.0,
            reporter_schedule: "c,10,0".into(),
            reporter_min_batches: 2,
            measure_loss: true,
            measure_reorder_extent: true,
            measure_reorder_density: true,
        }
    }
}

impl EstimatorConfig {
    /// Validate options that gate thread startup.
    ///
    /// The schedule string is parsed separately (and again at startup);
    /// this checks everything else.
    pub fn validate(&self) -> Result<()> {
        if !self.aggregation_interval.is_finite() || self.aggregation_interval < 0.0 {
            return Err(Error::InvalidInterval(self.aggregation_interval));
        }
        if self.reporter_min_batches == 0 {
            return Err(Error::InvalidMinBatches);
        }
        Ok(())
    }
}
