//! Alarm domain model.
//!
//! # Responsibility
//! - Define the alarm record and its statically typed field updates.
//! - Expose alarms to the reminder scheduler via [`Schedulable`].
//!
//! # Invariants
//! - `label` is never blank.
//! - `time_spec` passes [`TimeSpec::validate`].
//! - Alarms fire exactly at the nominal occurrence (single zero offset).

use crate::model::entity::{
    EntityId, EntityRef, NotificationContent, ReminderOffset, Schedulable, ScheduledNotification,
};
use crate::model::time_spec::{TimeSpec, TimeSpecError};
use crate::schedule::occurrence::next_occurrence;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type AlarmId = EntityId;

const ALARM_OFFSETS: &[ReminderOffset] = &[ReminderOffset::AT_TIME];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub label: String,
    /// Platform sound name; `None` uses the default ringtone.
    pub sound: Option<String>,
    pub time_spec: TimeSpec,
    pub enabled: bool,
    /// Scheduler bookkeeping, loaded by repositories.
    #[serde(default)]
    pub scheduled: Vec<ScheduledNotification>,
}

impl Alarm {
    /// Creates an enabled alarm with a generated ID.
    pub fn new(label: impl Into<String>, time_spec: TimeSpec) -> Self {
        Self::with_id(Uuid::new_v4(), label, time_spec)
    }

    pub fn with_id(id: AlarmId, label: impl Into<String>, time_spec: TimeSpec) -> Self {
        Self {
            id,
            label: label.into(),
            sound: None,
            time_spec,
            enabled: true,
            scheduled: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), AlarmValidationError> {
        if self.label.trim().is_empty() {
            return Err(AlarmValidationError::BlankLabel);
        }
        self.time_spec.validate()?;
        Ok(())
    }

    /// Applies updates in order.
    ///
    /// Returns whether any applied update affects scheduling.
    pub fn apply_updates(&mut self, updates: &[AlarmUpdate]) -> bool {
        let mut affects_schedule = false;
        for update in updates {
            affects_schedule |= update.affects_schedule();
            match update {
                AlarmUpdate::Label(label) => self.label = label.clone(),
                AlarmUpdate::Sound(sound) => self.sound = sound.clone(),
                AlarmUpdate::TimeSpec(spec) => self.time_spec = *spec,
                AlarmUpdate::Enabled(enabled) => self.enabled = *enabled,
            }
        }
        affects_schedule
    }
}

/// One changed alarm field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmUpdate {
    Label(String),
    Sound(Option<String>),
    TimeSpec(TimeSpec),
    Enabled(bool),
}

impl AlarmUpdate {
    /// Whether this change requires re-arming notifications.
    pub fn affects_schedule(&self) -> bool {
        matches!(self, Self::TimeSpec(_) | Self::Enabled(_))
    }
}

impl Schedulable for Alarm {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::alarm(self.id)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn next_occurrence<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        next_occurrence(&self.time_spec, now)
    }

    fn reminder_offsets(&self) -> &[ReminderOffset] {
        ALARM_OFFSETS
    }

    fn notification_content(&self) -> NotificationContent {
        let mut payload = Map::new();
        payload.insert(
            "sound".to_string(),
            self.sound.clone().map_or(Value::Null, Value::String),
        );
        payload.insert(
            "recurring".to_string(),
            Value::Bool(self.time_spec.is_recurring()),
        );
        NotificationContent {
            title: self.label.clone(),
            body: "Alarm".to_string(),
            payload,
        }
    }

    fn scheduled(&self) -> &[ScheduledNotification] {
        &self.scheduled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmValidationError {
    BlankLabel,
    TimeSpec(TimeSpecError),
}

impl Display for AlarmValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankLabel => write!(f, "alarm label must not be blank"),
            Self::TimeSpec(err) => write!(f, "invalid alarm time: {err}"),
        }
    }
}

impl Error for AlarmValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BlankLabel => None,
            Self::TimeSpec(err) => Some(err),
        }
    }
}

impl From<TimeSpecError> for AlarmValidationError {
    fn from(value: TimeSpecError) -> Self {
        Self::TimeSpec(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Alarm, AlarmUpdate, AlarmValidationError};
    use crate::model::entity::{ReminderOffset, Schedulable};
    use crate::model::time_spec::{TimeSpec, TimeSpecError, WeekdaySet};

    fn weekday_alarm() -> Alarm {
        let days = WeekdaySet::from_indices([1, 2, 3, 4, 5]).expect("valid days");
        Alarm::new("wake up", TimeSpec::weekly(days, 6, 45).expect("valid spec"))
    }

    #[test]
    fn new_alarm_is_enabled_without_handles() {
        let alarm = weekday_alarm();
        assert!(alarm.enabled);
        assert!(alarm.scheduled.is_empty());
        assert_eq!(alarm.reminder_offsets(), &[ReminderOffset::AT_TIME]);
    }

    #[test]
    fn validate_rejects_blank_label_and_bad_clock() {
        let mut alarm = weekday_alarm();
        alarm.label = "   ".to_string();
        assert_eq!(alarm.validate(), Err(AlarmValidationError::BlankLabel));

        let mut alarm = weekday_alarm();
        alarm.time_spec = TimeSpec::Weekly {
            days: WeekdaySet::EVERY_DAY,
            hour: 25,
            minute: 0,
        };
        assert_eq!(
            alarm.validate(),
            Err(AlarmValidationError::TimeSpec(TimeSpecError::HourOutOfRange(25)))
        );
    }

    #[test]
    fn only_time_and_toggle_updates_affect_schedule() {
        let mut alarm = weekday_alarm();
        assert!(!alarm.apply_updates(&[
            AlarmUpdate::Label("gym".to_string()),
            AlarmUpdate::Sound(Some("chime".to_string())),
        ]));
        assert_eq!(alarm.label, "gym");
        assert_eq!(alarm.sound.as_deref(), Some("chime"));

        assert!(alarm.apply_updates(&[AlarmUpdate::Enabled(false)]));
        assert!(!alarm.enabled);
        assert!(alarm.apply_updates(&[AlarmUpdate::TimeSpec(TimeSpec::once(0))]));
        assert_eq!(alarm.time_spec, TimeSpec::once(0));
    }

    #[test]
    fn notification_payload_carries_sound() {
        let mut alarm = weekday_alarm();
        alarm.sound = Some("birds".to_string());
        let content = alarm.notification_content();
        assert_eq!(content.title, "wake up");
        assert_eq!(content.payload["sound"], serde_json::json!("birds"));
        assert_eq!(content.payload["recurring"], serde_json::json!(true));
    }
}
