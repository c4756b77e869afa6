//! Shared identity and scheduling contracts for alarms and events.
//!
//! # Responsibility
//! - Identify schedulable records across entity kinds (`EntityRef`).
//! - Carry scheduler-owned notification bookkeeping (`ScheduledNotification`).
//! - Abstract alarms and events behind [`Schedulable`].
//!
//! # Invariants
//! - `scheduled` lists are written only by the scheduler; domain code never
//!   interprets handle contents.
//! - Reminder offsets are whole, non-negative minutes.

use chrono::{DateTime, Duration, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for alarms and events.
pub type EntityId = Uuid;

/// Longest supported reminder lead time (four weeks).
pub const MAX_REMINDER_OFFSET_MINUTES: u32 = 4 * 7 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Alarm,
    Event,
}

impl EntityKind {
    /// Stable string id used in storage and notification payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alarm => "alarm",
            Self::Event => "event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "alarm" => Some(Self::Alarm),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Kind-qualified entity identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn alarm(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Alarm,
            id,
        }
    }

    pub fn event(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Event,
            id,
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Opaque identifier returned by a notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NotificationHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One armed, not-yet-fired notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub handle: NotificationHandle,
    /// Unix epoch milliseconds.
    pub fire_at_ms: i64,
}

/// Lead time before the nominal occurrence, in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderOffset(u32);

impl ReminderOffset {
    /// Fires exactly at the nominal occurrence.
    pub const AT_TIME: Self = Self(0);

    pub fn minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn as_minutes(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    pub fn is_supported(self) -> bool {
        self.0 <= MAX_REMINDER_OFFSET_MINUTES
    }
}

/// Render data handed to the notification dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    /// Entity-specific fields (sound name, location, ...).
    pub payload: Map<String, Value>,
}

/// Entity that the reminder scheduler knows how to arm.
///
/// Implemented by [`crate::model::alarm::Alarm`] and
/// [`crate::model::event::CalendarEvent`].
pub trait Schedulable {
    fn entity_ref(&self) -> EntityRef;

    fn is_enabled(&self) -> bool;

    /// Next nominal occurrence strictly after `now`, if any.
    fn next_occurrence<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>>;

    /// Lead times applied to the nominal occurrence.
    fn reminder_offsets(&self) -> &[ReminderOffset];

    fn notification_content(&self) -> NotificationContent;

    /// Outstanding notifications as last persisted by the scheduler.
    fn scheduled(&self) -> &[ScheduledNotification];
}
