//! Calendar event domain model.
//!
//! # Responsibility
//! - Define calendar events with optional weekly repetition and a list of
//!   reminder lead times.
//! - Expose events to the reminder scheduler via [`Schedulable`].
//!
//! # Invariants
//! - `title` is never blank.
//! - `end_ms >= start_ms` when `end_ms` is set.
//! - `repeat`, when set, names at least one weekday.
//! - Every reminder offset is within [`MAX_REMINDER_OFFSET_MINUTES`].

use crate::model::entity::{
    EntityId, EntityRef, NotificationContent, ReminderOffset, Schedulable, ScheduledNotification,
    MAX_REMINDER_OFFSET_MINUTES,
};
use crate::model::time_spec::WeekdaySet;
use crate::schedule::occurrence::next_event_occurrence;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type EventId = EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    /// Unix epoch milliseconds.
    pub start_ms: i64,
    /// Unix epoch milliseconds. Should be >= `start_ms` when set.
    pub end_ms: Option<i64>,
    /// Weekly repetition anchored at the local time-of-day of `start_ms`.
    pub repeat: Option<WeekdaySet>,
    pub reminder_offsets: Vec<ReminderOffset>,
    pub enabled: bool,
    #[serde(default)]
    pub scheduled: Vec<ScheduledNotification>,
}

impl CalendarEvent {
    /// Creates an enabled, non-repeating event without reminders.
    pub fn new(title: impl Into<String>, start_ms: i64) -> Self {
        Self::with_id(Uuid::new_v4(), title, start_ms)
    }

    pub fn with_id(id: EventId, title: impl Into<String>, start_ms: i64) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            location: None,
            start_ms,
            end_ms: None,
            repeat: None,
            reminder_offsets: Vec::new(),
            enabled: true,
            scheduled: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.title.trim().is_empty() {
            return Err(EventValidationError::BlankTitle);
        }
        if let Some(end_ms) = self.end_ms {
            if end_ms < self.start_ms {
                return Err(EventValidationError::InvalidTimeRange {
                    start_ms: self.start_ms,
                    end_ms,
                });
            }
        }
        if self.repeat.is_some_and(WeekdaySet::is_empty) {
            return Err(EventValidationError::EmptyRepeat);
        }
        if let Some(offset) = self
            .reminder_offsets
            .iter()
            .find(|offset| !offset.is_supported())
        {
            return Err(EventValidationError::ReminderOffsetOutOfRange(
                offset.as_minutes(),
            ));
        }
        Ok(())
    }

    /// Applies updates in order.
    ///
    /// Returns whether any applied update affects scheduling.
    pub fn apply_updates(&mut self, updates: &[EventUpdate]) -> bool {
        let mut affects_schedule = false;
        for update in updates {
            affects_schedule |= update.affects_schedule();
            match update {
                EventUpdate::Title(title) => self.title = title.clone(),
                EventUpdate::Description(description) => self.description = description.clone(),
                EventUpdate::Location(location) => self.location = location.clone(),
                EventUpdate::Timing { start_ms, end_ms } => {
                    self.start_ms = *start_ms;
                    self.end_ms = *end_ms;
                }
                EventUpdate::Repeat(repeat) => self.repeat = *repeat,
                EventUpdate::ReminderOffsets(offsets) => self.reminder_offsets = offsets.clone(),
                EventUpdate::Enabled(enabled) => self.enabled = *enabled,
            }
        }
        affects_schedule
    }
}

/// One changed event field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventUpdate {
    Title(String),
    Description(String),
    Location(Option<String>),
    Timing { start_ms: i64, end_ms: Option<i64> },
    Repeat(Option<WeekdaySet>),
    ReminderOffsets(Vec<ReminderOffset>),
    Enabled(bool),
}

impl EventUpdate {
    /// Whether this change requires re-arming notifications.
    pub fn affects_schedule(&self) -> bool {
        matches!(
            self,
            Self::Timing { .. } | Self::Repeat(_) | Self::ReminderOffsets(_) | Self::Enabled(_)
        )
    }
}

impl Schedulable for CalendarEvent {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::event(self.id)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn next_occurrence<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        next_event_occurrence(self.start_ms, self.repeat, now)
    }

    fn reminder_offsets(&self) -> &[ReminderOffset] {
        &self.reminder_offsets
    }

    fn notification_content(&self) -> NotificationContent {
        let mut payload = Map::new();
        payload.insert(
            "location".to_string(),
            self.location.clone().map_or(Value::Null, Value::String),
        );
        payload.insert("start_ms".to_string(), Value::from(self.start_ms));
        let body = match self.location.as_deref() {
            Some(location) if !location.trim().is_empty() => location.to_string(),
            _ => self.description.clone(),
        };
        NotificationContent {
            title: self.title.clone(),
            body,
            payload,
        }
    }

    fn scheduled(&self) -> &[ScheduledNotification] {
        &self.scheduled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    BlankTitle,
    InvalidTimeRange { start_ms: i64, end_ms: i64 },
    EmptyRepeat,
    ReminderOffsetOutOfRange(u32),
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "event title must not be blank"),
            Self::InvalidTimeRange { start_ms, end_ms } => write!(
                f,
                "invalid event time range: event_end ({end_ms}) is earlier than event_start ({start_ms})"
            ),
            Self::EmptyRepeat => write!(f, "repeating event must name at least one weekday"),
            Self::ReminderOffsetOutOfRange(minutes) => write!(
                f,
                "reminder offset {minutes}min exceeds maximum of {MAX_REMINDER_OFFSET_MINUTES}min"
            ),
        }
    }
}

impl Error for EventValidationError {}
