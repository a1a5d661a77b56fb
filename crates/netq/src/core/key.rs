// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream and flow identity
//!
//! A *flow* is an application-defined logical flow; a *stream* is a
//! sub-channel of a flow with its own sequence space. Stream-level and
//! flow-level results are tracked in the same maps, so the map key carries
//! an explicit kind tag that participates in hashing: a stream entry and
//! the flow entry it rolls up into can never collide.

use crate::config::KEY_SIZE;

/// Public stream identity handed in with every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    /// Opaque flow key; all streams of a flow share it.
    pub flow_key: [u8; KEY_SIZE],
    /// Stream discriminator within the flow.
    pub stream_id: u8,
}

impl StreamKey {
    /// Build a stream identity.
    pub fn new(flow_key: [u8; KEY_SIZE], stream_id: u8) -> Self {
        Self {
            flow_key,
            stream_id,
        }
    }
}

/// Per-packet metadata pushed by producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    /// Stream the packet belongs to.
    pub stream: StreamKey,
    /// Packet sequence number within the stream.
    pub seq: u32,
}

/// Kind tag distinguishing stream entries from flow rollup entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    /// Per-stream entry (carries the stream id).
    Stream,
    /// Flow rollup entry (stream id zeroed).
    Flow,
}

/// Tagged map key for aggregator epochs and reporter trackers.
///
/// The tag is part of the derived `Hash`/`Eq`, so stream and flow entries
/// coexist in one map without collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub kind: KeyKind,
    pub flow_key: [u8; KEY_SIZE],
    pub stream_id: u8,
}

impl MetricKey {
    /// Stream-tagged key for an incoming packet.
    pub fn stream(key: StreamKey) -> Self {
        Self {
            kind: KeyKind::Stream,
            flow_key: key.flow_key,
            stream_id: key.stream_id,
        }
    }

    /// The flow key this entry rolls up into (stream id zeroed, retagged).
    pub fn flow_of(&self) -> Self {
        Self {
            kind: KeyKind::Flow,
            flow_key: self.flow_key,
            stream_id: 0,
        }
    }

    pub fn is_stream(&self) -> bool {
        self.kind == KeyKind::Stream
    }
}
