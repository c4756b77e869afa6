//! Core scheduling logic for Daybell alarms and calendar reminders.
//! This crate owns occurrence math, notification bookkeeping and storage.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LogLevel};
pub use model::alarm::{Alarm, AlarmId, AlarmUpdate, AlarmValidationError};
pub use model::entity::{
    EntityId, EntityKind, EntityRef, NotificationContent, NotificationHandle, ReminderOffset,
    Schedulable, ScheduledNotification,
};
pub use model::event::{CalendarEvent, EventId, EventUpdate, EventValidationError};
pub use model::time_spec::{TimeSpec, TimeSpecError, WeekdaySet};
pub use repo::alarm_repo::{AlarmListQuery, AlarmRepository, SqliteAlarmRepository};
pub use repo::event_repo::{EventListQuery, EventRepository, SqliteEventRepository};
pub use repo::schedule_store::{ScheduleStore, ScheduledEntity, SqliteScheduleStore};
pub use repo::{RepoError, RepoResult};
pub use schedule::dispatcher::{
    DispatchError, DispatchResult, NotificationDispatcher, NotificationRequest,
    PendingNotification, RecordingDispatcher,
};
pub use schedule::occurrence::{next_event_occurrence, next_occurrence};
pub use schedule::orchestrator::{ReminderScheduler, SchedulerError, SchedulerResult};
pub use schedule::reminder::{expand_fire_times, plan_fire_times};
pub use service::alarm_service::AlarmService;
pub use service::event_service::EventService;
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
