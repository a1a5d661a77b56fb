// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # netq — real-time network quality estimation
//!
//! An in-process library that turns per-packet metadata into per-flow
//! quality metrics: packet loss (with burst and gap statistics), reorder
//! extent (RFC 4737) and reorder density (RFC 5236), delivered through an
//! application callback on a configurable schedule.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use netq::{ClosureListener, EstimatorConfig, PacketInfo, StreamKey};
//!
//! fn main() -> netq::Result<()> {
//!     let listener = ClosureListener::new(|results| {
//!         println!("flow {:?}: {} packets", results.flow_key, results.packet_count);
//!     });
//!     netq::init(EstimatorConfig::default(), listener)?;
//!
//!     let mut handle = netq::create_handle()?;
//!     handle.push(PacketInfo {
//!         stream: StreamKey::new([42, 43], 44),
//!         seq: 1,
//!     })?;
//!     handle.flush()?;
//!
//!     netq::destroy()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                      Application threads                           |
//! |        Handle::push -> local batch -> shared staging FIFO          |
//! +--------------------------------------------------------------------+
//! |                      Aggregator thread                             |
//! |   timed pop | epoch buckets keyed by (flow, stream) | rotation     |
//! +--------------------------------------------------------------------+
//! |                      Reporter thread                               |
//! |   epoch window | loss / extent / density | flow rollup | callback  |
//! +--------------------------------------------------------------------+
//! ```
//!
//! Producers never block beyond one brief mutex on flush; the aggregator
//! and reporter exchange whole epochs (and recycled storage) under a
//! single pipeline lock.
//!
//! ## Modules
//!
//! - [`api`] — init/destroy facade, producer handles, results, listener
//! - [`config`] — compile-time constants and runtime options
//! - [`core`] — sequence arithmetic, identity keys, flow-state algebra,
//!   sequence ranges
//! - [`staging`] — batched producer→aggregator queue
//! - [`epoch`] — epoch buckets and recycling pools
//! - [`metrics`] — the estimator state machines
//! - [`engine`] — stage threads, handoff, schedule

/// Public facade: lifecycle, handles, results, listener.
pub mod api;
/// Compile-time constants and runtime options.
pub mod config;
/// Leaf building blocks shared by all stages.
pub mod core;
/// Stage threads, handoff and report schedule.
pub mod engine;
/// Epoch buckets and recycling pools.
pub mod epoch;
/// Metric state machines (loss, extent, density).
pub mod metrics;
/// Batched producer→aggregator staging queue.
pub mod staging;

pub use api::{
    create_handle, destroy, init, stats, ClosureListener, DensityBin, DensityResults, Error,
    ExtentResults, Handle, LossResults, ReportListener, Result, Results,
};
pub use config::{EstimatorConfig, DT, KEY_SIZE, MAX_EXTENT, WINDOW_SIZE};
pub use engine::StatsSnapshot;
pub use self::core::key::{PacketInfo, StreamKey};

/// netq version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
