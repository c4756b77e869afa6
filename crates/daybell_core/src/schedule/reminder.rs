//! Reminder expansion: nominal occurrence -> concrete fire-times.

use crate::model::entity::{ReminderOffset, Schedulable};
use chrono::{DateTime, TimeZone};
use std::collections::BTreeSet;

/// Expands one nominal occurrence into one fire-time per distinct offset.
///
/// `fire_time = nominal - offset`. Fire-times not strictly after `now` are
/// dropped. The result is sorted ascending and contains no duplicates.
pub fn expand_fire_times<Tz: TimeZone>(
    nominal: &DateTime<Tz>,
    offsets: &[ReminderOffset],
    now: &DateTime<Tz>,
) -> Vec<DateTime<Tz>> {
    let distinct: BTreeSet<ReminderOffset> = offsets.iter().copied().collect();

    // Largest offset first gives ascending fire-times.
    distinct
        .into_iter()
        .rev()
        .filter_map(|offset| nominal.clone().checked_sub_signed(offset.as_duration()))
        .filter(|fire_at| fire_at > now)
        .collect()
}

/// Computes every fire-time the scheduler should arm for `entity`.
///
/// Disabled entities and entities without a future occurrence produce no
/// fire-times.
pub fn plan_fire_times<E, Tz>(entity: &E, now: &DateTime<Tz>) -> Vec<DateTime<Tz>>
where
    E: Schedulable,
    Tz: TimeZone,
{
    if !entity.is_enabled() {
        return Vec::new();
    }

    match entity.next_occurrence(now) {
        Some(nominal) => expand_fire_times(&nominal, entity.reminder_offsets(), now),
        None => Vec::new(),
    }
}
