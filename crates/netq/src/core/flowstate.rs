// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flow-state algebra
//!
//! A tiny finite algebra tracking whether an epoch's arrivals begin or end
//! mid-packet-run or at a delimiter boundary. Two event tokens exist: `D`
//! (an epoch delimiter, applied at rotation) and `P` (one or more
//! in-sequence packets). States record the reduced token string seen so
//! far; `Error` is absorbing.
//!
//! The loss estimator consumes [`FlowState::begins_with_packet`]: only an
//! epoch whose arrivals begin mid-run may use the previous epoch's last
//! sequence number as a "past" anchor.

/// Event token advancing a flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Epoch boundary (time or explicit flush boundary).
    Delimit,
    /// One or more in-sequence received packets.
    Packet,
}

/// Reduced token string of an epoch's arrival pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// No events observed.
    #[default]
    Null,
    /// Delimiter only.
    D,
    /// Packet run only.
    P,
    /// Delimiter, then packets.
    Dp,
    /// Packets, then a delimiter.
    Pd,
    /// Delimiter, packets, delimiter.
    Dpd,
    /// Inconsistent event sequence; absorbing.
    Error,
}

impl FlowState {
    /// Advance by one event.
    pub fn advance(self, event: FlowEvent) -> Self {
        use FlowEvent::{Delimit, Packet};
        use FlowState::{Dp, Dpd, Error, Null, Pd, D, P};
        match (self, event) {
            (Null, Delimit) => D,
            (Null, Packet) => P,
            (D, Delimit) => D,
            (D, Packet) => Dp,
            (P, Delimit) => Pd,
            (P, Packet) => P,
            (Dp, Delimit) => Dpd,
            (Dp, Packet) => Error,
            (Pd, Delimit) => Error,
            (Pd, Packet) => P,
            (Dpd, _) | (Error, _) => Error,
        }
    }

    /// Token decomposition of this state.
    fn symbols(self) -> &'static [FlowEvent] {
        use FlowEvent::{Delimit, Packet};
        match self {
            FlowState::Null => &[],
            FlowState::D => &[Delimit],
            FlowState::P => &[Packet],
            FlowState::Dp => &[Delimit, Packet],
            FlowState::Pd => &[Packet, Delimit],
            FlowState::Dpd => &[Delimit, Packet, Delimit],
            FlowState::Error => &[],
        }
    }

    /// Concatenate two states: fold `other`'s token string over `self`.
    ///
    /// `Error` propagates from either side.
    pub fn concat(self, other: FlowState) -> Self {
        if self == FlowState::Error || other == FlowState::Error {
            return FlowState::Error;
        }
        other.symbols().iter().fold(self, |fs, ev| fs.advance(*ev))
    }

    /// True when the token string starts with a packet run.
    pub fn begins_with_packet(self) -> bool {
        matches!(self, FlowState::P | FlowState::Pd)
    }

    /// True when the token string ends with a packet run.
    pub fn ends_with_packet(self) -> bool {
        matches!(self, FlowState::P | FlowState::Dp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FlowEvent::{Delimit, Packet};
    use FlowState::{Dp, Dpd, Error, Null, Pd, D, P};

    const ALL: [FlowState; 7] = [Null, D, P, Dp, Pd, Dpd, Error];

    #[test]
    fn test_transition_table() {
        let table = [
            (Null, D, P),
            (D, D, Dp),
            (P, Pd, P),
            (Dp, Dpd, Error),
            (Pd, Error, P),
            (Dpd, Error, Error),
            (Error, Error, Error),
        ];
        for (from, on_delimit, on_packet) in table {
            assert_eq!(from.advance(Delimit), on_delimit, "{:?} + D", from);
            assert_eq!(from.advance(Packet), on_packet, "{:?} + P", from);
        }
    }

    #[test]
    fn test_concat_null_identity() {
        for fs in ALL {
            assert_eq!(fs.concat(Null), fs, "{:?} . Null", fs);
            if fs != Error {
                assert_eq!(Null.concat(fs), fs, "Null . {:?}", fs);
            }
        }
    }

    #[test]
    fn test_concat_error_absorbing() {
        for fs in ALL {
            assert_eq!(fs.concat(Error), Error);
            assert_eq!(Error.concat(fs), Error);
        }
    }

    #[test]
    fn test_concat_associative_on_reachable_states() {
        // Epoch states handed to accumulation are built from packet events
        // closed by one rotation delimiter: Null, P and Pd (plus absorbed
        // Error). Dp/Dpd never reach concat in the pipeline, and the
        // transition table is deliberately partial there (Dp + packet is
        // an error).
        const REACHABLE: [FlowState; 4] = [Null, P, Pd, Error];
        for a in REACHABLE {
            for b in REACHABLE {
                for c in REACHABLE {
                    assert_eq!(
                        a.concat(b).concat(c),
                        a.concat(b.concat(c)),
                        "associativity failed for {:?} {:?} {:?}",
                        a,
                        b,
                        c
                    );
                }
            }
        }
    }

    #[test]
    fn test_concat_fold_stable_over_epochs() {
        // Accumulating a continuously active stream over many epochs must
        // not drift.
        let mut acc = Null;
        for _ in 0..32 {
            acc = acc.concat(Pd);
            assert_eq!(acc, Pd);
        }
    }

    #[test]
    fn test_concat_dissolves_inner_delimiter() {
        // A run closed by a delimiter, continued by a run in the next
        // epoch, reads as one run.
        assert_eq!(Pd.concat(P), P);
        assert_eq!(Pd.concat(Pd), Pd);
    }

    #[test]
    fn test_boundary_predicates() {
        assert!(P.begins_with_packet());
        assert!(Pd.begins_with_packet());
        assert!(!Dp.begins_with_packet());
        assert!(!Null.begins_with_packet());

        assert!(P.ends_with_packet());
        assert!(Dp.ends_with_packet());
        assert!(!Pd.ends_with_packet());
        assert!(!Dpd.ends_with_packet());
    }
}
