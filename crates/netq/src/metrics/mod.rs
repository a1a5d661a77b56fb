// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Metric state machines
//!
//! Arrival-side recording (driven by the aggregator) and reporter-side
//! computation for the three estimators:
//!
//! - [`loss`] — range-based loss accounting with cross-epoch look-ahead
//! - [`extent`] — RFC 4737 style reorder extent
//! - [`density`] — RFC 5236 style reorder density
//!
//! plus [`packet`] statistics and the [`report`] accumulators that roll
//! streams up into flows.

pub mod density;
pub mod extent;
pub mod loss;
pub mod packet;
pub mod report;
