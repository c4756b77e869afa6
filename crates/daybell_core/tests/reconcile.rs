use chrono::{DateTime, TimeZone, Utc};
use daybell_core::db::open_db_in_memory;
use daybell_core::{
    Alarm, AlarmRepository, CalendarEvent, DispatchError, DispatchResult, EntityRef,
    EventRepository, NotificationDispatcher, NotificationHandle, NotificationRequest,
    RecordingDispatcher, ReminderOffset, ReminderScheduler, RepoError, RepoResult,
    ScheduleStore, ScheduledEntity, ScheduledNotification, SchedulerError, SqliteAlarmRepository,
    SqliteEventRepository, SqliteScheduleStore, TimeSpec, WeekdaySet,
};
use rusqlite::Connection;
use std::cell::RefCell;
use uuid::Uuid;

const MINUTE_MS: i64 = 60 * 1000;

// Monday.
fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

fn mon_wed_nine() -> TimeSpec {
    TimeSpec::weekly(WeekdaySet::from_indices([1, 3]).unwrap(), 9, 0).unwrap()
}

fn stored_alarm(conn: &Connection, spec: TimeSpec) -> Alarm {
    let alarm = Alarm::new("wake up", spec);
    SqliteAlarmRepository::try_new(conn)
        .unwrap()
        .create_alarm(&alarm)
        .unwrap();
    alarm
}

fn stored_event(conn: &Connection, start: DateTime<Utc>, offsets: &[u32]) -> CalendarEvent {
    let mut event = CalendarEvent::new("planning", start.timestamp_millis());
    event.location = Some("room 2".to_string());
    event.reminder_offsets = offsets.iter().copied().map(ReminderOffset::minutes).collect();
    SqliteEventRepository::try_new(conn)
        .unwrap()
        .create_event(&event)
        .unwrap();
    event
}

/// Dispatcher that replays a fixed script of `schedule` outcomes.
struct ScriptedDispatcher {
    outcomes: RefCell<Vec<DispatchResult<Option<NotificationHandle>>>>,
    schedule_calls: RefCell<usize>,
    fail_cancel: bool,
}

impl ScriptedDispatcher {
    fn new(outcomes: Vec<DispatchResult<Option<NotificationHandle>>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes),
            schedule_calls: RefCell::new(0),
            fail_cancel: false,
        }
    }

    fn calls(&self) -> usize {
        *self.schedule_calls.borrow()
    }
}

impl NotificationDispatcher for ScriptedDispatcher {
    fn schedule(&self, _request: &NotificationRequest) -> DispatchResult<Option<NotificationHandle>> {
        *self.schedule_calls.borrow_mut() += 1;
        let mut outcomes = self.outcomes.borrow_mut();
        if outcomes.is_empty() {
            return Ok(Some(NotificationHandle::new(Uuid::new_v4().to_string())));
        }
        outcomes.remove(0)
    }

    fn cancel(&self, handle: &NotificationHandle) -> DispatchResult<()> {
        if self.fail_cancel {
            return Err(DispatchError::Cancel(format!("{handle} already fired")));
        }
        Ok(())
    }
}

/// Store whose writes always fail.
struct BrokenStore;

impl ScheduleStore for BrokenStore {
    fn read_entity(&self, _entity: EntityRef) -> RepoResult<Option<ScheduledEntity>> {
        Ok(None)
    }

    fn write_scheduled_handles(
        &self,
        _entity: EntityRef,
        _handles: &[ScheduledNotification],
    ) -> RepoResult<()> {
        Err(RepoError::InvalidData("disk full".to_string()))
    }
}

#[test]
fn weekly_alarm_arms_next_monday_slot() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let alarm = stored_alarm(&conn, mon_wed_nine());

    let armed = scheduler.reconcile(&alarm, &monday(8, 0)).unwrap();

    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].fire_at_ms, monday(9, 0).timestamp_millis());
    let pending = dispatcher.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request.title, "wake up");
    assert_eq!(pending[0].request.entity, EntityRef::alarm(alarm.id));
}

#[test]
fn reconcile_twice_leaves_one_set_outstanding() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let alarm = stored_alarm(&conn, mon_wed_nine());
    let now = monday(8, 0);

    let first = scheduler.reconcile(&alarm, &now).unwrap();
    let second = scheduler
        .reconcile_by_ref(EntityRef::alarm(alarm.id), &now)
        .unwrap()
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].fire_at_ms, first[0].fire_at_ms);
    assert_eq!(dispatcher.pending().len(), 1);
    assert_eq!(dispatcher.cancelled(), vec![first[0].handle.clone()]);

    let outstanding = store.list_outstanding().unwrap();
    assert_eq!(outstanding.len(), 1);
    assert_eq!(outstanding[0].1, second[0]);
}

#[test]
fn disabling_cancels_every_outstanding_notification() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[60, 15, 0]);
    let now = monday(8, 0);

    let armed = scheduler.reconcile(&event, &now).unwrap();
    assert_eq!(armed.len(), 3);

    let mut disabled = SqliteEventRepository::try_new(&conn)
        .unwrap()
        .get_event(event.id)
        .unwrap()
        .unwrap();
    disabled.enabled = false;
    let after = scheduler.reconcile(&disabled, &now).unwrap();

    assert!(after.is_empty());
    assert!(dispatcher.pending().is_empty());
    assert_eq!(dispatcher.cancelled().len(), 3);
    assert!(store.list_outstanding().unwrap().is_empty());
}

#[test]
fn event_reminders_fire_before_start_in_ascending_order() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[0, 60]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    let fire_times: Vec<i64> = armed.iter().map(|item| item.fire_at_ms).collect();
    assert_eq!(
        fire_times,
        vec![
            monday(9, 0).timestamp_millis(),
            monday(10, 0).timestamp_millis()
        ]
    );
    let pending = dispatcher.pending();
    assert_eq!(pending[0].request.body, "room 2");
    assert_eq!(
        pending[0].request.payload["nominal_at_ms"],
        serde_json::Value::from(monday(10, 0).timestamp_millis())
    );
    assert_eq!(pending[0].request.payload["entity_kind"], "event");
}

#[test]
fn reminders_already_in_the_past_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[180, 30]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].fire_at_ms, monday(10, 0).timestamp_millis() - 30 * MINUTE_MS);
}

#[test]
fn empty_weekday_set_arms_nothing() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let alarm = stored_alarm(
        &conn,
        TimeSpec::weekly(WeekdaySet::EMPTY, 9, 0).unwrap(),
    );

    let armed = scheduler.reconcile(&alarm, &monday(8, 0)).unwrap();

    assert!(armed.is_empty());
    assert!(dispatcher.pending().is_empty());
    assert!(store.list_outstanding().unwrap().is_empty());
}

#[test]
fn past_one_time_alarm_arms_nothing() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let alarm = stored_alarm(&conn, TimeSpec::once(monday(7, 0).timestamp_millis()));

    let armed = scheduler.reconcile(&alarm, &monday(8, 0)).unwrap();
    assert!(armed.is_empty());
}

#[test]
fn disabled_notifications_persist_an_empty_set() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::notifications_disabled();
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[15, 0]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    assert!(armed.is_empty());
    assert!(store.list_outstanding().unwrap().is_empty());
}

#[test]
fn permission_denied_stops_scheduling_without_failing() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = ScriptedDispatcher::new(vec![Err(DispatchError::PermissionDenied)]);
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[60, 15, 0]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    assert!(armed.is_empty());
    assert_eq!(dispatcher.calls(), 1);
}

#[test]
fn unavailable_dispatcher_keeps_handles_already_obtained() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = ScriptedDispatcher::new(vec![
        Ok(Some(NotificationHandle::new("first"))),
        Err(DispatchError::Unavailable("service stopped".to_string())),
    ]);
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[60, 15, 0]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].handle, NotificationHandle::new("first"));
    assert_eq!(store.list_outstanding().unwrap().len(), 1);
}

#[test]
fn skipped_candidate_does_not_stop_the_rest() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = ScriptedDispatcher::new(vec![Ok(None)]);
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[60, 0]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].fire_at_ms, monday(10, 0).timestamp_millis());
    assert_eq!(dispatcher.calls(), 2);
}

#[test]
fn cancel_failures_are_ignored() {
    let conn = open_db_in_memory().unwrap();
    let mut dispatcher = ScriptedDispatcher::new(Vec::new());
    dispatcher.fail_cancel = true;
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let mut alarm = stored_alarm(&conn, mon_wed_nine());
    alarm.scheduled = vec![ScheduledNotification {
        handle: NotificationHandle::new("stale"),
        fire_at_ms: monday(7, 0).timestamp_millis(),
    }];

    let armed = scheduler.reconcile(&alarm, &monday(8, 0)).unwrap();

    assert_eq!(armed.len(), 1);
    let outstanding = store.list_outstanding().unwrap();
    assert_eq!(outstanding.len(), 1);
    assert_ne!(outstanding[0].1.handle, NotificationHandle::new("stale"));
}

#[test]
fn store_failure_is_returned() {
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(BrokenStore, &dispatcher);
    let alarm = Alarm::new("wake up", mon_wed_nine());

    let err = scheduler.reconcile(&alarm, &monday(8, 0)).unwrap_err();
    assert!(matches!(err, SchedulerError::Store(RepoError::InvalidData(_))));
    assert!(dispatcher.pending().is_empty());
    assert_eq!(dispatcher.cancelled().len(), 1);
}

#[test]
fn unexpected_schedule_error_stops_scheduling_without_failing() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = ScriptedDispatcher::new(vec![
        Ok(Some(NotificationHandle::new("first"))),
        Err(DispatchError::Cancel("platform confused".to_string())),
    ]);
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let event = stored_event(&conn, monday(10, 0), &[60, 15, 0]);

    let armed = scheduler.reconcile(&event, &monday(8, 0)).unwrap();

    assert_eq!(dispatcher.calls(), 2);
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].handle, NotificationHandle::new("first"));
    assert_eq!(store.list_outstanding().unwrap().len(), 1);
}

#[test]
fn writing_handles_for_missing_entity_fails() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);
    let unsaved = Alarm::new("not saved", mon_wed_nine());

    let err = scheduler.reconcile(&unsaved, &monday(8, 0)).unwrap_err();
    assert!(matches!(err, SchedulerError::Store(RepoError::NotFound(_))));
}

#[test]
fn reconcile_by_ref_of_missing_entity_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let scheduler = ReminderScheduler::new(SqliteScheduleStore::try_new(&conn).unwrap(), &dispatcher);

    let armed = scheduler
        .reconcile_by_ref(EntityRef::event(Uuid::new_v4()), &monday(8, 0))
        .unwrap();
    assert!(armed.is_none());
}

#[test]
fn release_cancels_and_clears_bookkeeping() {
    let conn = open_db_in_memory().unwrap();
    let dispatcher = RecordingDispatcher::new();
    let store = SqliteScheduleStore::try_new(&conn).unwrap();
    let scheduler = ReminderScheduler::new(&store, &dispatcher);
    let mut alarm = stored_alarm(&conn, mon_wed_nine());

    alarm.scheduled = scheduler.reconcile(&alarm, &monday(8, 0)).unwrap();
    scheduler.release(&alarm).unwrap();

    assert!(dispatcher.pending().is_empty());
    assert!(store.list_outstanding().unwrap().is_empty());
}
