// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Report schedule
//!
//! Parses semicolon-separated repeating report definitions of the form
//! `DESTS,INTERVAL[,OFFSET]`, where `DESTS` is a string of destination
//! codes (currently only `'c'` = callback) and the times are seconds as
//! floating point. Each definition becomes a *slot* with its own
//! accumulator map in the reporter; slots fire independently.
//!
//! Fire times advance by `ceil((now - next_fire) / interval)` intervals —
//! at least one — so a stalled reporter catches up without phase drift.

use std::time::{Duration, Instant};

use crate::api::{Error, Result};

/// Destination codes accepted in `DESTS`.
const OUTLET_CODES: &[char] = &['c'];

#[derive(Debug)]
struct Slot {
    outlets: String,
    interval_us: u64,
    next_fire: Instant,
}

/// Parsed schedule: one slot per definition.
#[derive(Debug)]
pub struct ReportSchedule {
    slots: Vec<Slot>,
}

impl ReportSchedule {
    /// Parse a schedule string; fire times are phased from `start`.
    pub fn parse(spec: &str, start: Instant) -> Result<Self> {
        let mut slots = Vec::new();
        for part in spec.split(';') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::InvalidSchedule(format!(
                    "empty definition in {:?}",
                    spec
                )));
            }
            slots.push(parse_slot(part, start)?);
        }
        if slots.is_empty() {
            return Err(Error::InvalidSchedule("no definitions".into()));
        }
        log::debug!("[schedule] parsed {} slot(s) from {:?}", slots.len(), spec);
        Ok(Self { slots })
    }

    /// Number of slots.
    pub fn parallelism(&self) -> usize {
        self.slots.len()
    }

    /// The slot's outlet string, iff it is due at `now`.
    pub fn outlets(&self, slot: usize, now: Instant) -> Option<&str> {
        let s = &self.slots[slot];
        if now >= s.next_fire {
            Some(&s.outlets)
        } else {
            None
        }
    }

    /// Advance the slot's fire time past `now`, keeping phase.
    pub fn reset(&mut self, slot: usize, now: Instant) {
        let s = &mut self.slots[slot];
        let elapsed_us = now
            .saturating_duration_since(s.next_fire)
            .as_micros()
            .min(u128::from(u64::MAX)) as u64;
        let periods = elapsed_us.div_ceil(s.interval_us).max(1);
        s.next_fire += Duration::from_micros(periods * s.interval_us);
        log::trace!(
            "[schedule] slot {} advanced {} period(s)",
            slot,
            periods
        );
    }

    /// Report duration of the slot, in microseconds.
    pub fn duration_us(&self, slot: usize) -> u64 {
        self.slots[slot].interval_us
    }
}

fn parse_slot(part: &str, start: Instant) -> Result<Slot> {
    let fields: Vec<&str> = part.split(',').collect();
    if fields.len() < 2 || fields.len() > 3 {
        return Err(Error::InvalidSchedule(format!(
            "expected DESTS,INTERVAL[,OFFSET], got {:?}",
            part
        )));
    }

    let outlets = fields[0].trim();
    if outlets.is_empty() || !outlets.chars().all(|c| OUTLET_CODES.contains(&c)) {
        return Err(Error::InvalidSchedule(format!(
            "unknown destination in {:?}",
            outlets
        )));
    }

    let interval = parse_seconds(fields[1], part)?;
    if interval <= 0.0 {
        return Err(Error::InvalidSchedule(format!(
            "interval must be positive in {:?}",
            part
        )));
    }
    let offset = match fields.get(2) {
        Some(f) => {
            let offset = parse_seconds(f, part)?;
            if offset < 0.0 {
                return Err(Error::InvalidSchedule(format!(
                    "offset must not be negative in {:?}",
                    part
                )));
            }
            offset
        }
        None => 0.0,
    };

    // Sub-microsecond intervals round up to one tick.
    let interval_us = ((interval * 1e6).round() as u64).max(1);
    let offset_us = (offset * 1e6).round() as u64;
    // A zero offset fires one interval after start; a positive offset
    // fires at the offset itself.
    let first_us = if offset_us == 0 {
        interval_us
    } else {
        offset_us
    };

    Ok(Slot {
        outlets: outlets.to_string(),
        interval_us,
        next_fire: start + Duration::from_micros(first_us),
    })
}

fn parse_seconds(field: &str, part: &str) -> Result<f64> {
    let value: f64 = field.trim().parse().map_err(|_| {
        Error::InvalidSchedule(format!("bad number {:?} in {:?}", field, part))
    })?;
    if !value.is_finite() {
        return Err(Error::InvalidSchedule(format!(
            "non-finite number in {:?}",
            part
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_parse_single_slot() {
        let start = Instant::now();
        let schedule = ReportSchedule::parse("c,5,0", start).unwrap();
        assert_eq!(schedule.parallelism(), 1);
        assert_eq!(schedule.duration_us(0), 5_000_000);
    }

    #[test]
    fn test_parse_two_slots_with_offset() {
        let start = Instant::now();
        let schedule = ReportSchedule::parse("c,5,0;c,5,2.5", start).unwrap();
        assert_eq!(schedule.parallelism(), 2);
        assert_eq!(schedule.duration_us(0), 5_000_000);
        assert_eq!(schedule.duration_us(1), 5_000_000);

        // Slot 0 first fires at start + 5s, slot 1 at start + 2.5s.
        assert!(schedule.outlets(0, at(start, 4.9)).is_none());
        assert_eq!(schedule.outlets(0, at(start, 5.0)), Some("c"));
        assert_eq!(schedule.outlets(1, at(start, 2.5)), Some("c"));
        assert!(schedule.outlets(1, at(start, 2.4)).is_none());
    }

    #[test]
    fn test_reset_keeps_phase() {
        let start = Instant::now();
        let mut schedule = ReportSchedule::parse("c,5,0", start).unwrap();

        // Fire slightly late, reset: next fire is start + 10s, not +10.3s.
        let now = at(start, 5.3);
        assert!(schedule.outlets(0, now).is_some());
        schedule.reset(0, now);
        assert!(schedule.outlets(0, at(start, 9.9)).is_none());
        assert!(schedule.outlets(0, at(start, 10.0)).is_some());
    }

    #[test]
    fn test_reset_catches_up_after_stall() {
        let start = Instant::now();
        let mut schedule = ReportSchedule::parse("c,5,0", start).unwrap();

        // Stall past three periods; one reset lands on the next boundary.
        let now = at(start, 17.2);
        schedule.reset(0, now);
        assert!(schedule.outlets(0, at(start, 19.9)).is_none());
        assert!(schedule.outlets(0, at(start, 20.0)).is_some());
    }

    #[test]
    fn test_reset_advances_at_least_one_period() {
        let start = Instant::now();
        let mut schedule = ReportSchedule::parse("c,5,0", start).unwrap();

        // Reset exactly at the fire time must still move forward.
        let now = at(start, 5.0);
        schedule.reset(0, now);
        assert!(schedule.outlets(0, now).is_none());
        assert!(schedule.outlets(0, at(start, 10.0)).is_some());
    }

    #[test]
    fn test_positive_offset_fires_at_offset() {
        let start = Instant::now();
        let schedule = ReportSchedule::parse("c,5,2.5", start).unwrap();
        assert_eq!(schedule.outlets(0, at(start, 2.5)), Some("c"));
    }

    #[test]
    fn test_malformed_schedules_rejected() {
        let start = Instant::now();
        for bad in [
            "",
            "c",
            "c,",
            "c,abc",
            "c,5,1,2",
            "x,5",
            ",5",
            "c,0",
            "c,-1",
            "c,5,-2",
            "c,5;",
        ] {
            assert!(
                ReportSchedule::parse(bad, start).is_err(),
                "schedule {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_multi_destination_string_kept() {
        let start = Instant::now();
        let schedule = ReportSchedule::parse("cc,1", start).unwrap();
        assert_eq!(schedule.outlets(0, at(start, 1.0)), Some("cc"));
    }
}
