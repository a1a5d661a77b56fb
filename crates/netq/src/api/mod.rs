// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public API
//!
//! A process-wide facade over one owned [`Engine`](crate::engine): `init`
//! builds the pipeline and starts its two stage threads, `create_handle`
//! opens producer handles, and `destroy` tears everything down and allows
//! a later re-init. A single mutex guards init/destroy; the packet path
//! itself never touches it.

mod listener;
mod results;

pub use listener::{ClosureListener, ReportListener};
pub use results::{DensityBin, DensityResults, ExtentResults, LossResults, Results};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::EstimatorConfig;
use crate::core::key::PacketInfo;
use crate::engine::{Engine, StatsSnapshot};
use crate::staging::{Producer, PushMode};

/// Errors returned by netq operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration errors (synchronous from `init`, no threads started)
    // ========================================================================
    /// Aggregation interval is negative or not finite.
    InvalidInterval(f64),
    /// Reporter schedule string failed to parse.
    InvalidSchedule(String),
    /// Reporter window must be at least one epoch.
    InvalidMinBatches,

    // ========================================================================
    // Lifecycle errors
    // ========================================================================
    /// No engine is running (`init` has not been called, or `destroy` won).
    NotRunning,
    /// The operation raced `destroy`; affected arrivals were dropped.
    Shutdown,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInterval(interval) => {
                write!(f, "invalid aggregation interval: {}", interval)
            }
            Error::InvalidSchedule(msg) => write!(f, "invalid reporter schedule: {}", msg),
            Error::InvalidMinBatches => write!(f, "reporter_min_batches must be >= 1"),
            Error::NotRunning => write!(f, "estimator is not running"),
            Error::Shutdown => write!(f, "estimator is shutting down"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for netq operations.
pub type Result<T> = std::result::Result<T, Error>;

static ENGINE: Mutex<Option<Arc<Engine>>> = Mutex::new(None);

/// Start the estimation pipeline.
///
/// Idempotent: calling `init` while an engine is running is a successful
/// no-op (the new configuration and listener are ignored). Configuration
/// errors are returned synchronously and leave no threads behind.
pub fn init<L>(config: EstimatorConfig, listener: L) -> Result<()>
where
    L: ReportListener + 'static,
{
    let mut guard = ENGINE.lock();
    if guard.is_some() {
        return Ok(());
    }
    let engine = Engine::start(&config, Arc::new(listener))?;
    *guard = Some(Arc::new(engine));
    Ok(())
}

/// Open a producer handle onto the running engine.
pub fn create_handle() -> Result<Handle> {
    let guard = ENGINE.lock();
    let engine = guard.as_ref().ok_or(Error::NotRunning)?;
    Ok(Handle {
        producer: engine.producer(),
        engine: Arc::clone(engine),
    })
}

/// Snapshot of the engine's runtime counters.
pub fn stats() -> Result<StatsSnapshot> {
    let guard = ENGINE.lock();
    let engine = guard.as_ref().ok_or(Error::NotRunning)?;
    Ok(engine.stats().snapshot())
}

/// Stop the pipeline: joins both stage threads and frees all state.
///
/// Outstanding handles survive but their pushes fail with
/// [`Error::Shutdown`]. A subsequent `init` starts fresh.
pub fn destroy() -> Result<()> {
    let engine = ENGINE.lock().take().ok_or(Error::NotRunning)?;
    engine.shutdown();
    Ok(())
}

/// Producer handle: batches packet metadata toward the aggregator.
///
/// Dropping the handle flushes and closes it. Handles are independent;
/// each owns its local batch, so pushes from one handle stay FIFO.
pub struct Handle {
    producer: Producer<PacketInfo>,
    engine: Arc<Engine>,
}

impl Handle {
    /// Queue one packet's metadata.
    ///
    /// Batches locally and flushes automatically every few packets; call
    /// [`flush`](Handle::flush) for prompt delivery of a trailing batch.
    pub fn push(&mut self, packet: PacketInfo) -> Result<()> {
        self.producer
            .push(packet, PushMode::Default)
            .map_err(|e| self.dropped(e.dropped))
    }

    /// Deliver any locally batched packets now.
    pub fn flush(&mut self) -> Result<()> {
        self.producer
            .flush()
            .map_err(|e| self.dropped(e.dropped))
    }

    fn dropped(&self, count: usize) -> Error {
        use std::sync::atomic::Ordering;
        self.engine
            .stats()
            .arrivals_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
        Error::Shutdown
    }
}
