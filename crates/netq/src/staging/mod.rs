// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batched staging queue
//!
//! The producer→aggregator channel and the system's throughput story.
//! Every producer handle owns a private, unlocked local batch; only
//! [`Producer::flush`] touches the shared mutex, splicing the whole batch
//! onto the shared FIFO in one lock acquisition. The consumer mirrors the
//! trick: one lock drains the entire shared FIFO into a consumer-local
//! batch, then items are served lock-free.
//!
//! # Architecture
//!
//! ```text
//! producer A ── local batch ──┐
//! producer B ── local batch ──┼── flush (1 lock) ──▶ shared FIFO ── pop
//! producer C ── local batch ──┘                      (1 lock, whole     │
//!                                                     list swap)        ▼
//!                                                              consumer local
//! ```
//!
//! All handles opened from one [`Channel`] share the FIFO; the shared
//! state lives while any handle does. `shutdown` is honored at the next
//! suspension point: waiters wake, remaining items drain first.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::config::FLUSH_THRESHOLD;

/// Push behavior selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMode {
    /// Batch locally; flush automatically at [`FLUSH_THRESHOLD`].
    #[default]
    Default,
    /// Deliver the batch and this item to the shared FIFO immediately.
    Flush,
    /// Batch locally unconditionally.
    NoFlush,
}

/// Outcome of a consumer dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Popped<T> {
    Item(T),
    /// `timed_pop` reached its deadline with nothing queued.
    TimedOut,
    /// The channel was shut down and no items remain.
    Shutdown,
}

/// Error from pushing or flushing into a shut-down channel.
///
/// Carries the number of locally batched items that were discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushError {
    pub dropped: usize,
}

struct Fifo<T> {
    items: VecDeque<T>,
    done: bool,
}

struct Shared<T> {
    fifo: Mutex<Fifo<T>>,
    ready: Condvar,
}

/// Queue identity: one shared FIFO plus the right to open handles on it.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                fifo: Mutex::new(Fifo {
                    items: VecDeque::new(),
                    done: false,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Open a producer handle with its own local batch.
    pub fn producer(&self) -> Producer<T> {
        Producer {
            local: VecDeque::with_capacity(FLUSH_THRESHOLD),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Open the consumer handle.
    pub fn consumer(&self) -> Consumer<T> {
        Consumer {
            local: VecDeque::new(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Signal shutdown and wake every waiter.
    ///
    /// Queued items remain poppable; new pushes are refused.
    pub fn shutdown(&self) {
        let mut fifo = self.shared.fifo.lock();
        fifo.done = true;
        log::debug!("[staging] shutdown signalled ({} queued)", fifo.items.len());
        drop(fifo);
        self.shared.ready.notify_all();
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producing handle: unlocked local batch, one-lock flush.
pub struct Producer<T> {
    local: VecDeque<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Producer<T> {
    /// Push one item.
    ///
    /// `Default` batches locally and auto-flushes at the threshold;
    /// `Flush` delivers the batch plus this item under one lock;
    /// `NoFlush` never touches the lock.
    pub fn push(&mut self, item: T, mode: PushMode) -> Result<(), PushError> {
        match mode {
            PushMode::NoFlush => {
                self.local.push_back(item);
                Ok(())
            }
            PushMode::Default => {
                self.local.push_back(item);
                if self.local.len() >= FLUSH_THRESHOLD {
                    self.flush()
                } else {
                    Ok(())
                }
            }
            PushMode::Flush => {
                self.local.push_back(item);
                self.flush()
            }
        }
    }

    /// Splice the local batch onto the shared tail and signal the consumer.
    ///
    /// One mutex acquisition regardless of batch size. Returns an error
    /// (with the discarded count) when the channel has shut down.
    pub fn flush(&mut self) -> Result<(), PushError> {
        if self.local.is_empty() {
            return Ok(());
        }
        let mut fifo = self.shared.fifo.lock();
        if fifo.done {
            let dropped = self.local.len();
            self.local.clear();
            return Err(PushError { dropped });
        }
        fifo.items.append(&mut self.local);
        drop(fifo);
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Items currently batched locally (not yet visible to the consumer).
    pub fn batched(&self) -> usize {
        self.local.len()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        // Best effort: do not strand batched items on close.
        let _ = self.flush();
    }
}

/// Consuming handle: drains the whole shared FIFO per lock acquisition.
pub struct Consumer<T> {
    local: VecDeque<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Consumer<T> {
    /// Blocking dequeue.
    pub fn pop(&mut self) -> Popped<T> {
        if let Some(item) = self.local.pop_front() {
            return Popped::Item(item);
        }
        let mut fifo = self.shared.fifo.lock();
        loop {
            if !fifo.items.is_empty() {
                std::mem::swap(&mut self.local, &mut fifo.items);
                drop(fifo);
                return match self.local.pop_front() {
                    Some(item) => Popped::Item(item),
                    None => Popped::Shutdown,
                };
            }
            if fifo.done {
                return Popped::Shutdown;
            }
            self.shared.ready.wait(&mut fifo);
        }
    }

    /// Dequeue with a monotonic deadline.
    pub fn timed_pop(&mut self, deadline: Instant) -> Popped<T> {
        if let Some(item) = self.local.pop_front() {
            return Popped::Item(item);
        }
        let mut fifo = self.shared.fifo.lock();
        loop {
            if !fifo.items.is_empty() {
                std::mem::swap(&mut self.local, &mut fifo.items);
                drop(fifo);
                return match self.local.pop_front() {
                    Some(item) => Popped::Item(item),
                    None => Popped::Shutdown,
                };
            }
            if fifo.done {
                return Popped::Shutdown;
            }
            if self.shared.ready.wait_until(&mut fifo, deadline).timed_out() {
                // Deadline reached; one final look before reporting.
                if fifo.items.is_empty() {
                    return if fifo.done {
                        Popped::Shutdown
                    } else {
                        Popped::TimedOut
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_within_one_producer() {
        let channel = Channel::new();
        let mut producer = channel.producer();
        let mut consumer = channel.consumer();

        for i in 0..20 {
            producer.push(i, PushMode::Default).unwrap();
        }
        producer.flush().unwrap();

        for i in 0..20 {
            assert_eq!(consumer.pop(), Popped::Item(i), "FIFO order violated");
        }
    }

    #[test]
    fn test_default_mode_flushes_at_threshold() {
        let channel = Channel::<u32>::new();
        let mut producer = channel.producer();

        for i in 0..(FLUSH_THRESHOLD as u32 - 1) {
            producer.push(i, PushMode::Default).unwrap();
        }
        assert_eq!(producer.batched(), FLUSH_THRESHOLD - 1);

        producer.push(99, PushMode::Default).unwrap();
        assert_eq!(producer.batched(), 0, "threshold push should auto-flush");
    }

    #[test]
    fn test_noflush_never_delivers() {
        let channel = Channel::<u32>::new();
        let mut producer = channel.producer();
        let mut consumer = channel.consumer();

        for i in 0..50 {
            producer.push(i, PushMode::NoFlush).unwrap();
        }
        assert_eq!(producer.batched(), 50);
        assert_eq!(
            consumer.timed_pop(Instant::now()),
            Popped::TimedOut,
            "NoFlush items must stay local"
        );

        producer.flush().unwrap();
        assert_eq!(consumer.pop(), Popped::Item(0));
    }

    #[test]
    fn test_flush_mode_delivers_immediately() {
        let channel = Channel::<u32>::new();
        let mut producer = channel.producer();
        let mut consumer = channel.consumer();

        producer.push(1, PushMode::NoFlush).unwrap();
        producer.push(2, PushMode::Flush).unwrap();
        assert_eq!(producer.batched(), 0);

        // The pending batch goes first: handle order is preserved.
        assert_eq!(consumer.pop(), Popped::Item(1));
        assert_eq!(consumer.pop(), Popped::Item(2));
    }

    #[test]
    fn test_timed_pop_times_out() {
        let channel = Channel::<u32>::new();
        let mut consumer = channel.consumer();

        let start = Instant::now();
        let popped = consumer.timed_pop(start + Duration::from_millis(20));
        assert_eq!(popped, Popped::TimedOut);
        assert!(
            start.elapsed() >= Duration::from_millis(19),
            "should wait until the deadline"
        );
    }

    #[test]
    fn test_shutdown_wakes_blocked_consumer() {
        let channel = Channel::<u32>::new();
        let mut consumer = channel.consumer();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            channel.shutdown();
        });

        assert_eq!(consumer.pop(), Popped::Shutdown);
        handle.join().unwrap();
    }

    #[test]
    fn test_shutdown_drains_before_reporting() {
        let channel = Channel::new();
        let mut producer = channel.producer();
        let mut consumer = channel.consumer();

        producer.push(7, PushMode::Flush).unwrap();
        channel.shutdown();

        assert_eq!(consumer.pop(), Popped::Item(7), "queued items drain first");
        assert_eq!(consumer.pop(), Popped::Shutdown);
    }

    #[test]
    fn test_push_after_shutdown_reports_dropped() {
        let channel = Channel::new();
        let mut producer = channel.producer();
        channel.shutdown();

        producer.push(1, PushMode::NoFlush).unwrap();
        producer.push(2, PushMode::NoFlush).unwrap();
        let err = producer.flush().unwrap_err();
        assert_eq!(err.dropped, 2);
        assert_eq!(producer.batched(), 0);
    }

    #[test]
    fn test_concurrent_producers_all_items_arrive() {
        let channel = Channel::new();
        let mut consumer = channel.consumer();
        let per_thread = 1000;
        let threads = 4;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let mut producer = channel.producer();
                thread::spawn(move || {
                    for i in 0..per_thread {
                        producer.push((t, i), PushMode::Default).unwrap();
                    }
                    producer.flush().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = vec![Vec::new(); threads];
        for _ in 0..threads * per_thread {
            match consumer.pop() {
                Popped::Item((t, i)) => seen[t].push(i),
                other => panic!("unexpected pop result: {:?}", other),
            }
        }
        for (t, items) in seen.iter().enumerate() {
            assert_eq!(items.len(), per_thread);
            // Per-producer FIFO survives interleaving.
            assert!(
                items.windows(2).all(|w| w[0] < w[1]),
                "producer {} items out of order",
                t
            );
        }
    }
}
