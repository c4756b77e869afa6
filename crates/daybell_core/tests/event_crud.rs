use daybell_core::db::open_db_in_memory;
use daybell_core::{
    CalendarEvent, EventListQuery, EventRepository, EventValidationError, ReminderOffset,
    RepoError, SqliteEventRepository, WeekdaySet,
};

const HOUR_MS: i64 = 60 * 60 * 1000;
// 2026-03-02T09:00:00Z, a Monday.
const MONDAY_9AM_MS: i64 = 1_772_442_000_000;

fn event_at(title: &str, start_ms: i64) -> CalendarEvent {
    let mut event = CalendarEvent::new(title, start_ms);
    event.end_ms = Some(start_ms + HOUR_MS);
    event
}

#[test]
fn create_and_get_event_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut event = event_at("standup", MONDAY_9AM_MS);
    event.description = "daily sync".to_string();
    event.location = Some("room 4".to_string());
    event.repeat = Some(WeekdaySet::from_indices([1, 2, 3, 4, 5]).unwrap());
    event.reminder_offsets = vec![ReminderOffset::minutes(15), ReminderOffset::AT_TIME];
    repo.create_event(&event).unwrap();

    let loaded = repo.get_event(event.id).unwrap().unwrap();
    assert_eq!(loaded, event);
}

#[test]
fn duplicate_reminder_offsets_are_stored_once() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut event = event_at("review", MONDAY_9AM_MS);
    event.reminder_offsets = vec![
        ReminderOffset::minutes(10),
        ReminderOffset::minutes(60),
        ReminderOffset::minutes(10),
    ];
    repo.create_event(&event).unwrap();

    let loaded = repo.get_event(event.id).unwrap().unwrap();
    assert_eq!(
        loaded.reminder_offsets,
        vec![ReminderOffset::minutes(60), ReminderOffset::minutes(10)]
    );
}

#[test]
fn create_rejects_end_before_start() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut event = CalendarEvent::new("backwards", MONDAY_9AM_MS);
    event.end_ms = Some(MONDAY_9AM_MS - 1);
    let err = repo.create_event(&event).unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidEvent(EventValidationError::InvalidTimeRange { .. })
    ));
    assert!(repo.get_event(event.id).unwrap().is_none());
}

#[test]
fn create_rejects_empty_repeat_and_oversized_offset() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut empty_repeat = event_at("never", MONDAY_9AM_MS);
    empty_repeat.repeat = Some(WeekdaySet::EMPTY);
    assert!(matches!(
        repo.create_event(&empty_repeat).unwrap_err(),
        RepoError::InvalidEvent(EventValidationError::EmptyRepeat)
    ));

    let mut far_offset = event_at("far", MONDAY_9AM_MS);
    far_offset.reminder_offsets = vec![ReminderOffset::minutes(100_000)];
    assert!(matches!(
        repo.create_event(&far_offset).unwrap_err(),
        RepoError::InvalidEvent(EventValidationError::ReminderOffsetOutOfRange(100_000))
    ));
}

#[test]
fn update_replaces_reminders_and_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut event = event_at("lunch", MONDAY_9AM_MS + 3 * HOUR_MS);
    event.reminder_offsets = vec![ReminderOffset::minutes(30), ReminderOffset::minutes(5)];
    repo.create_event(&event).unwrap();

    event.title = "team lunch".to_string();
    event.reminder_offsets = vec![ReminderOffset::AT_TIME];
    repo.update_event(&event).unwrap();

    let loaded = repo.get_event(event.id).unwrap().unwrap();
    assert_eq!(loaded.title, "team lunch");
    assert_eq!(loaded.reminder_offsets, vec![ReminderOffset::AT_TIME]);
}

#[test]
fn update_missing_event_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let err = repo
        .update_event(&event_at("ghost", MONDAY_9AM_MS))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn list_applies_window_and_keeps_repeating_series() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let before = event_at("before", MONDAY_9AM_MS - 48 * HOUR_MS);
    let inside = event_at("inside", MONDAY_9AM_MS + HOUR_MS);
    let after = event_at("after", MONDAY_9AM_MS + 72 * HOUR_MS);
    let mut series = event_at("series", MONDAY_9AM_MS - 240 * HOUR_MS);
    series.repeat = Some(WeekdaySet::from_indices([1]).unwrap());
    for event in [&before, &inside, &after, &series] {
        repo.create_event(event).unwrap();
    }

    let windowed = repo
        .list_events(&EventListQuery {
            starts_from_ms: Some(MONDAY_9AM_MS),
            starts_before_ms: Some(MONDAY_9AM_MS + 24 * HOUR_MS),
            ..EventListQuery::default()
        })
        .unwrap();
    let titles: Vec<&str> = windowed.iter().map(|event| event.title.as_str()).collect();
    assert_eq!(titles, vec!["series", "inside"]);

    let all = repo.list_events(&EventListQuery::default()).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn list_enabled_only_skips_disabled_events() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut disabled = event_at("muted", MONDAY_9AM_MS);
    disabled.enabled = false;
    let enabled = event_at("loud", MONDAY_9AM_MS);
    repo.create_event(&disabled).unwrap();
    repo.create_event(&enabled).unwrap();

    let listed = repo
        .list_events(&EventListQuery {
            enabled_only: true,
            ..EventListQuery::default()
        })
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, enabled.id);
}

#[test]
fn delete_cascades_reminders() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();

    let mut event = event_at("gone", MONDAY_9AM_MS);
    event.reminder_offsets = vec![ReminderOffset::minutes(5)];
    repo.create_event(&event).unwrap();

    repo.delete_event(event.id).unwrap();
    assert!(repo.get_event(event.id).unwrap().is_none());

    let reminders: i64 = conn
        .query_row("SELECT COUNT(*) FROM event_reminders;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(reminders, 0);
}
