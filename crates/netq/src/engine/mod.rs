// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Estimation engine
//!
//! Owns everything `init` creates: the staging channel, the
//! aggregator↔reporter handoff, both stage threads, and the runtime
//! counters. `shutdown` signals both stages, wakes them, and joins before
//! returning, so no estimator state outlives the engine.
//!
//! # Data flow
//!
//! ```text
//! producer.push ─▶ staging.local ─▶ staging.shared ─▶ aggregator.current
//!       ─▶ handoff.pending ─▶ reporter.window ─▶ estimators ─▶ rollup ─▶ callback
//! ```

pub(crate) mod aggregator;
pub(crate) mod handoff;
pub(crate) mod reporter;
pub(crate) mod schedule;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::api::{ReportListener, Result};
use crate::config::EstimatorConfig;
use crate::core::key::PacketInfo;
use crate::engine::aggregator::Aggregator;
use crate::engine::handoff::Handoff;
use crate::engine::reporter::Reporter;
use crate::engine::schedule::ReportSchedule;
use crate::staging::{Channel, Producer};

/// Wall-clock microseconds since the Unix epoch.
///
/// Used for report timestamps only; scheduling runs on `Instant`.
pub(crate) fn wall_clock_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

/// Which estimators are enabled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Measures {
    pub loss: bool,
    pub extent: bool,
    pub density: bool,
}

/// Engine runtime counters (relaxed atomics; snapshot via [`EngineStats::snapshot`]).
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    pub packets_aggregated: AtomicU64,
    pub epochs_rotated: AtomicU64,
    pub reports_emitted: AtomicU64,
    pub arrivals_dropped: AtomicU64,
}

impl EngineStats {
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_aggregated: self.packets_aggregated.load(Ordering::Relaxed),
            epochs_rotated: self.epochs_rotated.load(Ordering::Relaxed),
            reports_emitted: self.reports_emitted.load(Ordering::Relaxed),
            arrivals_dropped: self.arrivals_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Arrivals recorded into epochs.
    pub packets_aggregated: u64,
    /// Epoch boundaries crossed.
    pub epochs_rotated: u64,
    /// `Results` records delivered to the listener.
    pub reports_emitted: u64,
    /// Arrivals discarded because they raced shutdown.
    pub arrivals_dropped: u64,
}

/// A running estimation pipeline.
pub(crate) struct Engine {
    channel: Channel<PacketInfo>,
    handoff: Arc<Handoff>,
    stats: Arc<EngineStats>,
    aggregator: Mutex<Option<JoinHandle<()>>>,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Validate the configuration and start both stage threads.
    pub(crate) fn start(
        config: &EstimatorConfig,
        listener: Arc<dyn ReportListener>,
    ) -> Result<Self> {
        config.validate()?;
        let schedule = ReportSchedule::parse(&config.reporter_schedule, Instant::now())?;

        let channel = Channel::new();
        let handoff = Arc::new(Handoff::new());
        let stats = Arc::new(EngineStats::default());

        let aggregator = Aggregator::new(
            channel.consumer(),
            Arc::clone(&handoff),
            Duration::from_secs_f64(config.aggregation_interval),
            Arc::clone(&stats),
        );
        let reporter = Reporter::new(
            Arc::clone(&handoff),
            schedule,
            config.reporter_min_batches as usize,
            Measures {
                loss: config.measure_loss,
                extent: config.measure_reorder_extent,
                density: config.measure_reorder_density,
            },
            listener,
            Arc::clone(&stats),
        );

        #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
        let aggregator = std::thread::Builder::new()
            .name("netq-aggregator".into())
            .spawn(move || aggregator.run())
            .expect("failed to spawn aggregator thread");
        #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
        let reporter = std::thread::Builder::new()
            .name("netq-reporter".into())
            .spawn(move || reporter.run())
            .expect("failed to spawn reporter thread");

        log::debug!(
            "[engine] started (interval {}s, window {})",
            config.aggregation_interval,
            config.reporter_min_batches
        );
        Ok(Self {
            channel,
            handoff,
            stats,
            aggregator: Mutex::new(Some(aggregator)),
            reporter: Mutex::new(Some(reporter)),
        })
    }

    /// Open a producer handle onto the staging channel.
    pub(crate) fn producer(&self) -> Producer<PacketInfo> {
        self.channel.producer()
    }

    pub(crate) fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Signal both stages and join them. Idempotent.
    pub(crate) fn shutdown(&self) {
        self.channel.shutdown();
        self.handoff.shutdown();
        if let Some(handle) = self.aggregator.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reporter.lock().take() {
            let _ = handle.join();
        }
        log::debug!("[engine] stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClosureListener;

    fn noop_listener() -> Arc<dyn ReportListener> {
        Arc::new(ClosureListener::new(|_| {}))
    }

    #[test]
    fn test_start_rejects_bad_config() {
        let config = EstimatorConfig {
            aggregation_interval: -2.0,
            ..EstimatorConfig::default()
        };
        assert!(Engine::start(&config, noop_listener()).is_err());

        let config = EstimatorConfig {
            reporter_schedule: "q,5".into(),
            ..EstimatorConfig::default()
        };
        assert!(Engine::start(&config, noop_listener()).is_err());
    }

    #[test]
    fn test_engine_starts_and_shuts_down() {
        let config = EstimatorConfig {
            aggregation_interval: 0.01,
            reporter_schedule: "c,0.05,0".into(),
            ..EstimatorConfig::default()
        };
        let engine = Engine::start(&config, noop_listener()).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        engine.shutdown();

        let snapshot = engine.stats().snapshot();
        assert!(snapshot.epochs_rotated >= 2, "timer must rotate epochs");
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = Engine::start(
            &EstimatorConfig::default(),
            noop_listener(),
        )
        .unwrap();
        engine.shutdown();
        engine.shutdown();
    }
}
