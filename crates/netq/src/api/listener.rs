// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Report listener
//!
//! Callback-based delivery of [`Results`]. Listeners are invoked from the
//! reporter thread: they must be `Send + Sync` and should not block — a
//! slow listener delays every subsequent report.

use crate::api::Results;

/// Receives one [`Results`] record per flow per fired report slot.
pub trait ReportListener: Send + Sync {
    fn on_report(&self, results: Results);
}

/// Adapter turning any closure into a [`ReportListener`].
///
/// # Example
///
/// ```ignore
/// let listener = ClosureListener::new(|results| {
///     println!("{} packets", results.packet_count);
/// });
/// netq::init(EstimatorConfig::default(), listener)?;
/// ```
pub struct ClosureListener<F> {
    callback: F,
}

impl<F> ClosureListener<F>
where
    F: Fn(Results) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ReportListener for ClosureListener<F>
where
    F: Fn(Results) + Send + Sync,
{
    fn on_report(&self, results: Results) {
        (self.callback)(results);
    }
}
