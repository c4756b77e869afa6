//! Time specification shared by alarms and repeating events.
//!
//! # Responsibility
//! - Describe *when* an entity nominally fires: once, or weekly on a set of
//!   weekdays at a wall-clock time.
//! - Validate hour/minute/weekday ranges before anything is persisted.
//!
//! # Invariants
//! - Weekday indices are `0..=6` with `0 = Sunday`.
//! - `hour <= 23` and `minute <= 59` for every weekly spec.
//! - An empty weekday set is representable but never yields an occurrence.

use chrono::{NaiveDate, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Highest valid weekday index (`6 = Saturday`).
pub const MAX_WEEKDAY_INDEX: u8 = 6;

const WEEKDAY_MASK: u8 = 0b0111_1111;

/// Set of weekdays stored as a 7-bit mask (`bit 0 = Sunday`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: Self = Self(0);
    pub const EVERY_DAY: Self = Self(WEEKDAY_MASK);

    /// Builds a set from weekday indices, rejecting anything above `6`.
    pub fn from_indices<I>(indices: I) -> Result<Self, TimeSpecError>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut bits = 0u8;
        for index in indices {
            if index > MAX_WEEKDAY_INDEX {
                return Err(TimeSpecError::WeekdayOutOfRange(index));
            }
            bits |= 1 << index;
        }
        Ok(Self(bits))
    }

    pub fn from_weekdays<I>(weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        let bits = weekdays
            .into_iter()
            .fold(0u8, |bits, day| bits | (1 << day.num_days_from_sunday()));
        Self(bits)
    }

    /// Restores a set from its persisted mask.
    ///
    /// Returns `None` when bits outside the weekday range are set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !WEEKDAY_MASK != 0 {
            return None;
        }
        Some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains_index(self, index: u8) -> bool {
        index <= MAX_WEEKDAY_INDEX && self.0 & (1 << index) != 0
    }

    pub fn contains(self, weekday: Weekday) -> bool {
        self.contains_index(weekday_index(weekday))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns member indices in ascending order.
    pub fn indices(self) -> Vec<u8> {
        (0..=MAX_WEEKDAY_INDEX)
            .filter(|index| self.contains_index(*index))
            .collect()
    }
}

impl TryFrom<Vec<u8>> for WeekdaySet {
    type Error = TimeSpecError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_indices(value)
    }
}

impl From<WeekdaySet> for Vec<u8> {
    fn from(value: WeekdaySet) -> Self {
        value.indices()
    }
}

/// Sunday-based weekday index used by [`WeekdaySet`].
pub fn weekday_index(weekday: Weekday) -> u8 {
    // num_days_from_sunday is always 0..=6
    weekday.num_days_from_sunday() as u8
}

/// Nominal firing rule for a schedulable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeSpec {
    /// Fires at most once, at an absolute instant (epoch milliseconds).
    Once { at_ms: i64 },
    /// Fires on every listed weekday at `hour:minute` local wall-clock time.
    Weekly {
        days: WeekdaySet,
        hour: u8,
        minute: u8,
    },
}

impl TimeSpec {
    pub fn once(at_ms: i64) -> Self {
        Self::Once { at_ms }
    }

    /// Builds a validated weekly spec.
    pub fn weekly(days: WeekdaySet, hour: u8, minute: u8) -> Result<Self, TimeSpecError> {
        let spec = Self::Weekly { days, hour, minute };
        spec.validate()?;
        Ok(spec)
    }

    /// Combines a calendar date with a separately stored hour/minute into a
    /// one-time spec, interpreting them as wall-clock time in `tz`.
    ///
    /// Ambiguous local times resolve to the earliest instant.
    ///
    /// # Errors
    /// - Hour/minute out of range.
    /// - The wall-clock time does not exist in `tz` (DST gap).
    pub fn once_at_local<Tz: TimeZone>(
        date: NaiveDate,
        hour: u8,
        minute: u8,
        tz: &Tz,
    ) -> Result<Self, TimeSpecError> {
        validate_clock(hour, minute)?;
        let local = date
            .and_hms_opt(u32::from(hour), u32::from(minute), 0)
            .ok_or(TimeSpecError::MinuteOutOfRange(minute))?;
        let instant = tz
            .from_local_datetime(&local)
            .earliest()
            .ok_or(TimeSpecError::NonexistentLocalTime { date, hour, minute })?;
        Ok(Self::Once {
            at_ms: instant.timestamp_millis(),
        })
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Weekly { .. })
    }

    pub fn validate(&self) -> Result<(), TimeSpecError> {
        match self {
            Self::Once { .. } => Ok(()),
            Self::Weekly { hour, minute, .. } => validate_clock(*hour, *minute),
        }
    }
}

fn validate_clock(hour: u8, minute: u8) -> Result<(), TimeSpecError> {
    if hour > 23 {
        return Err(TimeSpecError::HourOutOfRange(hour));
    }
    if minute > 59 {
        return Err(TimeSpecError::MinuteOutOfRange(minute));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpecError {
    HourOutOfRange(u8),
    MinuteOutOfRange(u8),
    WeekdayOutOfRange(u8),
    NonexistentLocalTime {
        date: NaiveDate,
        hour: u8,
        minute: u8,
    },
}

impl Display for TimeSpecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HourOutOfRange(hour) => write!(f, "hour must be within 0..=23, got {hour}"),
            Self::MinuteOutOfRange(minute) => {
                write!(f, "minute must be within 0..=59, got {minute}")
            }
            Self::WeekdayOutOfRange(index) => {
                write!(f, "weekday index must be within 0..=6, got {index}")
            }
            Self::NonexistentLocalTime { date, hour, minute } => write!(
                f,
                "local time {date} {hour:02}:{minute:02} does not exist in this time zone"
            ),
        }
    }
}

impl Error for TimeSpecError {}
