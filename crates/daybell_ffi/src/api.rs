//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose alarm and calendar reminder use cases to Dart via FRB.
//! - Translate core errors into flat response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every DB-backed call opens, uses and drops its own connection.
//! - Notifications are armed in a process-wide [`RecordingDispatcher`]; the
//!   host shell mirrors them from `alarm_list`.

use chrono::{FixedOffset, Local, TimeZone};
use daybell_core::db::open_db;
use daybell_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    next_occurrence, ping as ping_inner, Alarm, AlarmListQuery, AlarmService, CalendarEvent,
    EventService, RecordingDispatcher, ReminderOffset, ReminderScheduler, ServiceResult,
    SqliteAlarmRepository, SqliteEventRepository, SqliteScheduleStore, TimeSpec, WeekdaySet,
};
use log::warn;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "daybell.sqlite3";
const DB_PATH_ENV: &str = "DAYBELL_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static DISPATCHER: OnceLock<RecordingDispatcher> = OnceLock::new();

type FfiAlarmService<'conn> = AlarmService<
    SqliteAlarmRepository<'conn>,
    SqliteScheduleStore<'conn>,
    &'static RecordingDispatcher,
>;
type FfiEventService<'conn> = EventService<
    SqliteEventRepository<'conn>,
    SqliteScheduleStore<'conn>,
    &'static RecordingDispatcher,
>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts return an error message.
/// - Never panics; returns empty string on success.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the database file used by every DB-backed call.
///
/// Must run before the first DB-backed call. Repeating it with the same
/// path is a no-op; any other path after resolution is rejected.
///
/// Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_db_path(path: String) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "db path must not be empty".to_string();
    }

    let requested = PathBuf::from(trimmed);
    let active = DB_PATH.get_or_init(|| requested.clone());
    if *active != requested {
        return format!(
            "db path already resolved to `{}`; refusing to switch to `{}`",
            active.display(),
            requested.display()
        );
    }
    String::new()
}

/// Alarm projection for list screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmItem {
    pub alarm_id: String,
    pub label: String,
    pub sound: Option<String>,
    /// `once|weekly`.
    pub kind: String,
    /// Weekday indices, `0` = Sunday. Empty for one-time alarms.
    pub weekdays: Vec<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub once_at_ms: Option<i64>,
    pub enabled: bool,
    /// Fire times of the outstanding notifications, soonest first.
    pub pending_fire_at_ms: Vec<i64>,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmListResponse {
    pub ok: bool,
    pub items: Vec<AlarmItem>,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Alarm or event ID the operation touched.
    pub entity_id: Option<String>,
    /// Soonest armed fire time after the operation, if any.
    pub next_fire_at_ms: Option<i64>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, entity_id: Uuid, next_fire_at_ms: Option<i64>) -> Self {
        Self {
            ok: true,
            entity_id: Some(entity_id.to_string()),
            next_fire_at_ms,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            entity_id: None,
            next_fire_at_ms: None,
            message: message.into(),
        }
    }
}

/// Creates a weekly alarm and arms its next ring.
///
/// `weekdays` holds indices `0..=6` with `0` = Sunday; an empty list stores
/// an alarm that never rings.
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_create_weekly(
    label: String,
    weekdays: Vec<u8>,
    hour: u8,
    minute: u8,
    sound: Option<String>,
) -> ActionResponse {
    let spec = match WeekdaySet::from_indices(weekdays)
        .and_then(|days| TimeSpec::weekly(days, hour, minute))
    {
        Ok(spec) => spec,
        Err(err) => return failed_action("alarm_create_weekly", &err),
    };
    create_alarm("alarm_create_weekly", label, spec, sound)
}

/// Creates a one-time alarm at `at_ms` (Unix epoch milliseconds).
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_create_once(label: String, at_ms: i64, sound: Option<String>) -> ActionResponse {
    create_alarm("alarm_create_once", label, TimeSpec::once(at_ms), sound)
}

/// Enables or disables an alarm, re-arming or cancelling its notification.
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_set_enabled(alarm_id: String, enabled: bool) -> ActionResponse {
    let result = parse_id(&alarm_id).and_then(|id| {
        with_alarm_service(|service| service.set_alarm_enabled(id, enabled, &Local::now()))
    });
    match result {
        Ok(alarm) => ActionResponse::success(
            if enabled { "Alarm enabled." } else { "Alarm disabled." },
            alarm.id,
            alarm.scheduled.first().map(|item| item.fire_at_ms),
        ),
        Err(err) => failed_action("alarm_set_enabled", &err),
    }
}

/// Deletes an alarm after cancelling its notification.
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_delete(alarm_id: String) -> ActionResponse {
    let result = parse_id(&alarm_id)
        .and_then(|id| with_alarm_service(|service| service.delete_alarm(id)).map(|()| id));
    match result {
        Ok(id) => ActionResponse::success("Alarm deleted.", id, None),
        Err(err) => failed_action("alarm_delete", &err),
    }
}

/// Lists alarms, weekly ones by time of day first.
#[flutter_rust_bridge::frb(sync)]
pub fn alarm_list(enabled_only: bool) -> AlarmListResponse {
    let query = AlarmListQuery {
        enabled_only,
        ..AlarmListQuery::default()
    };
    match with_alarm_service(|service| service.list_alarms(&query)) {
        Ok(alarms) => AlarmListResponse {
            ok: true,
            message: format!("Found {} alarm(s).", alarms.len()),
            items: alarms.into_iter().map(to_alarm_item).collect(),
        },
        Err(err) => {
            warn!("event=ffi_call module=ffi status=error op=alarm_list error={err}");
            AlarmListResponse {
                ok: false,
                items: Vec::new(),
                message: format!("alarm_list failed: {err}"),
            }
        }
    }
}

/// Next ring of a weekly alarm strictly after `now_ms`, evaluated at a fixed
/// UTC offset. Pure helper for alarm editors; touches no storage.
///
/// Returns `None` for an empty or invalid weekday list, an out-of-range
/// clock or offset.
#[flutter_rust_bridge::frb(sync)]
pub fn next_weekly_occurrence_ms(
    weekdays: Vec<u8>,
    hour: u8,
    minute: u8,
    now_ms: i64,
    utc_offset_minutes: i32,
) -> Option<i64> {
    let spec = WeekdaySet::from_indices(weekdays)
        .and_then(|days| TimeSpec::weekly(days, hour, minute))
        .ok()?;
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    let now = offset.timestamp_millis_opt(now_ms).single()?;
    next_occurrence(&spec, &now).map(|at| at.timestamp_millis())
}

/// Creates a calendar event and arms one notification per reminder.
///
/// `reminder_minutes` are lead times before the start; duplicates collapse.
#[flutter_rust_bridge::frb(sync)]
pub fn event_create(
    title: String,
    start_ms: i64,
    end_ms: Option<i64>,
    location: Option<String>,
    repeat_weekdays: Option<Vec<u8>>,
    reminder_minutes: Vec<u32>,
) -> ActionResponse {
    let repeat = match repeat_weekdays.map(WeekdaySet::from_indices).transpose() {
        Ok(repeat) => repeat,
        Err(err) => return failed_action("event_create", &err),
    };

    let mut event = CalendarEvent::new(title.trim(), start_ms);
    event.end_ms = end_ms;
    event.location = location
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    event.repeat = repeat;
    event.reminder_offsets = reminder_minutes
        .into_iter()
        .map(ReminderOffset::minutes)
        .collect();

    match with_event_service(|service| service.create_event(&event, &Local::now())) {
        Ok(created) => ActionResponse::success(
            "Event created.",
            created.id,
            created.scheduled.first().map(|item| item.fire_at_ms),
        ),
        Err(err) => failed_action("event_create", &err),
    }
}

/// Deletes an event after cancelling its reminders.
#[flutter_rust_bridge::frb(sync)]
pub fn event_delete(event_id: String) -> ActionResponse {
    let result = parse_id(&event_id)
        .and_then(|id| with_event_service(|service| service.delete_event(id)).map(|()| id));
    match result {
        Ok(id) => ActionResponse::success("Event deleted.", id, None),
        Err(err) => failed_action("event_delete", &err),
    }
}

fn create_alarm(
    operation: &str,
    label: String,
    spec: TimeSpec,
    sound: Option<String>,
) -> ActionResponse {
    let mut alarm = Alarm::new(label.trim(), spec);
    alarm.sound = sound
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match with_alarm_service(|service| service.create_alarm(&alarm, &Local::now())) {
        Ok(created) => ActionResponse::success(
            "Alarm created.",
            created.id,
            created.scheduled.first().map(|item| item.fire_at_ms),
        ),
        Err(err) => failed_action(operation, &err),
    }
}

fn failed_action(operation: &str, err: &dyn Display) -> ActionResponse {
    warn!("event=ffi_call module=ffi status=error op={operation} error={err}");
    ActionResponse::failure(format!("{operation} failed: {err}"))
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| format!("invalid id `{raw}`"))
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn dispatcher() -> &'static RecordingDispatcher {
    DISPATCHER.get_or_init(RecordingDispatcher::new)
}

fn with_alarm_service<T>(
    f: impl FnOnce(&FfiAlarmService<'_>) -> ServiceResult<T>,
) -> Result<T, String> {
    let conn = open_db(resolve_db_path()).map_err(|err| format!("DB open failed: {err}"))?;
    let repo = SqliteAlarmRepository::try_new(&conn)
        .map_err(|err| format!("alarm repo init failed: {err}"))?;
    let store = SqliteScheduleStore::try_new(&conn)
        .map_err(|err| format!("schedule store init failed: {err}"))?;
    let service = AlarmService::new(repo, ReminderScheduler::new(store, dispatcher()));
    f(&service).map_err(|err| err.to_string())
}

fn with_event_service<T>(
    f: impl FnOnce(&FfiEventService<'_>) -> ServiceResult<T>,
) -> Result<T, String> {
    let conn = open_db(resolve_db_path()).map_err(|err| format!("DB open failed: {err}"))?;
    let repo = SqliteEventRepository::try_new(&conn)
        .map_err(|err| format!("event repo init failed: {err}"))?;
    let store = SqliteScheduleStore::try_new(&conn)
        .map_err(|err| format!("schedule store init failed: {err}"))?;
    let service = EventService::new(repo, ReminderScheduler::new(store, dispatcher()));
    f(&service).map_err(|err| err.to_string())
}

fn to_alarm_item(alarm: Alarm) -> AlarmItem {
    let (kind, weekdays, hour, minute, once_at_ms) = match alarm.time_spec {
        TimeSpec::Once { at_ms } => ("once", Vec::new(), None, None, Some(at_ms)),
        TimeSpec::Weekly { days, hour, minute } => {
            ("weekly", days.indices(), Some(hour), Some(minute), None)
        }
    };
    let mut pending_fire_at_ms: Vec<i64> =
        alarm.scheduled.iter().map(|item| item.fire_at_ms).collect();
    pending_fire_at_ms.sort_unstable();

    AlarmItem {
        alarm_id: alarm.id.to_string(),
        label: alarm.label,
        sound: alarm.sound,
        kind: kind.to_string(),
        weekdays,
        hour,
        minute,
        once_at_ms,
        enabled: alarm.enabled,
        pending_fire_at_ms,
    }
}
