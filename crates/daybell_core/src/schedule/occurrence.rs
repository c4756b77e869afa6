//! Next-occurrence calculation.
//!
//! # Responsibility
//! - Map a [`TimeSpec`] and a reference instant to the next instant at which
//!   the entity nominally fires.
//!
//! # Invariants
//! - Results are strictly after `now`; an occurrence equal to `now` counts
//!   as already handled.
//! - Weekly specs resolve in the time zone carried by `now`.
//! - Wall-clock times skipped by a DST transition are not candidates;
//!   ambiguous ones resolve to the earliest instant.

use crate::model::time_spec::{TimeSpec, WeekdaySet};
use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Timelike};

/// Two weeks: every weekday is visited at least twice, so a single
/// DST-skipped candidate cannot hide the following week's occurrence.
const SEARCH_HORIZON_DAYS: u64 = 14;

/// Returns the next nominal occurrence of `spec` strictly after `now`.
///
/// Returns `None` for past one-time specs and for weekly specs with an
/// empty weekday set.
pub fn next_occurrence<Tz: TimeZone>(spec: &TimeSpec, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    match *spec {
        TimeSpec::Once { at_ms } => {
            let at = now.timezone().timestamp_millis_opt(at_ms).single()?;
            (at > *now).then_some(at)
        }
        TimeSpec::Weekly { days, hour, minute } => next_weekly(days, hour, minute, now),
    }
}

/// Returns the next occurrence of a calendar event strictly after `now`.
///
/// Non-repeating events occur once at `start_ms`. Repeating events recur on
/// `repeat` weekdays at the local hour and minute of `start_ms`, never before
/// the series start. The start itself is the first occurrence when its
/// weekday is in `repeat`.
pub fn next_event_occurrence<Tz: TimeZone>(
    start_ms: i64,
    repeat: Option<WeekdaySet>,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let start = now.timezone().timestamp_millis_opt(start_ms).single()?;
    let Some(days) = repeat else {
        return (start > *now).then_some(start);
    };

    let local_start = start.naive_local();
    if start > *now && days.contains(local_start.weekday()) {
        return Some(start);
    }

    // hour() <= 23 and minute() <= 59
    let hour = local_start.hour() as u8;
    let minute = local_start.minute() as u8;
    let floor = if start > *now { &start } else { now };
    next_weekly(days, hour, minute, floor)
}

fn next_weekly<Tz: TimeZone>(
    days: WeekdaySet,
    hour: u8,
    minute: u8,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    if days.is_empty() {
        return None;
    }

    let time = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0)?;
    let tz = now.timezone();
    let today = now.date_naive();

    for day_offset in 0..=SEARCH_HORIZON_DAYS {
        let date = today.checked_add_days(Days::new(day_offset))?;
        if !days.contains(date.weekday()) {
            continue;
        }
        let Some(candidate) = tz.from_local_datetime(&date.and_time(time)).earliest() else {
            continue;
        };
        if candidate > *now {
            return Some(candidate);
        }
    }

    None
}
