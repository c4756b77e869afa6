//! Calendar event repository contract and SQLite implementation.
//!
//! # Invariants
//! - Reminder offsets live in `event_reminders` and are replaced as a whole
//!   on every update, inside the same transaction as the event row.
//! - Listing is ordered by `start_ms ASC, uuid ASC`.

use super::schedule_store::{delete_scheduled, load_scheduled};
use super::{bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult};
use crate::model::entity::{EntityRef, ReminderOffset};
use crate::model::event::{CalendarEvent, EventId};
use crate::model::time_spec::WeekdaySet;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;

const EVENT_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    location,
    start_ms,
    end_ms,
    repeat_weekdays,
    is_enabled
FROM events";

/// Query options for listing events.
///
/// The window is half-open, `[starts_from_ms, starts_before_ms)`. Repeating
/// events match whenever their series starts before the window ends.
#[derive(Debug, Clone, Default)]
pub struct EventListQuery {
    pub starts_from_ms: Option<i64>,
    pub starts_before_ms: Option<i64>,
    pub enabled_only: bool,
    pub limit: Option<u32>,
}

pub trait EventRepository {
    fn create_event(&self, event: &CalendarEvent) -> RepoResult<EventId>;
    fn update_event(&self, event: &CalendarEvent) -> RepoResult<()>;
    fn get_event(&self, id: EventId) -> RepoResult<Option<CalendarEvent>>;
    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<CalendarEvent>>;
    fn delete_event(&self, id: EventId) -> RepoResult<()>;
}

impl<T: EventRepository + ?Sized> EventRepository for &T {
    fn create_event(&self, event: &CalendarEvent) -> RepoResult<EventId> {
        (**self).create_event(event)
    }

    fn update_event(&self, event: &CalendarEvent) -> RepoResult<()> {
        (**self).update_event(event)
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<CalendarEvent>> {
        (**self).get_event(id)
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<CalendarEvent>> {
        (**self).list_events(query)
    }

    fn delete_event(&self, id: EventId) -> RepoResult<()> {
        (**self).delete_event(id)
    }
}

pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - [`RepoError::UninitializedConnection`] when `conn` is not at the
    ///   latest schema version.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_migrated(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_details(&self, event: &mut CalendarEvent) -> RepoResult<()> {
        event.reminder_offsets = load_reminder_offsets(self.conn, event.id)?;
        event.scheduled = load_scheduled(self.conn, EntityRef::event(event.id))?;
        Ok(())
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&self, event: &CalendarEvent) -> RepoResult<EventId> {
        event.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO events (
                uuid,
                title,
                description,
                location,
                start_ms,
                end_ms,
                repeat_weekdays,
                is_enabled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                event.id.to_string(),
                event.title.as_str(),
                event.description.as_str(),
                event.location.as_deref(),
                event.start_ms,
                event.end_ms,
                event.repeat.map(|days| i64::from(days.bits())),
                bool_to_int(event.enabled),
            ],
        )?;
        replace_reminder_offsets(&tx, event)?;
        tx.commit()?;

        Ok(event.id)
    }

    fn update_event(&self, event: &CalendarEvent) -> RepoResult<()> {
        event.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE events
             SET
                title = ?1,
                description = ?2,
                location = ?3,
                start_ms = ?4,
                end_ms = ?5,
                repeat_weekdays = ?6,
                is_enabled = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?8;",
            params![
                event.title.as_str(),
                event.description.as_str(),
                event.location.as_deref(),
                event.start_ms,
                event.end_ms,
                event.repeat.map(|days| i64::from(days.bits())),
                bool_to_int(event.enabled),
                event.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::event(event.id)));
        }
        replace_reminder_offsets(&tx, event)?;
        tx.commit()?;

        Ok(())
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<CalendarEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut event = parse_event_row(row)?;
        self.load_details(&mut event)?;
        event.validate()?;
        Ok(Some(event))
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<Vec<CalendarEvent>> {
        let mut sql = format!("{EVENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.enabled_only {
            sql.push_str(" AND is_enabled = 1");
        }
        if let Some(from_ms) = query.starts_from_ms {
            sql.push_str(" AND (start_ms >= ? OR repeat_weekdays IS NOT NULL)");
            bind_values.push(Value::Integer(from_ms));
        }
        if let Some(before_ms) = query.starts_before_ms {
            sql.push_str(" AND start_ms < ?");
            bind_values.push(Value::Integer(before_ms));
        }

        sql.push_str(" ORDER BY start_ms ASC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        drop(rows);

        for event in &mut events {
            self.load_details(event)?;
            event.validate()?;
        }
        Ok(events)
    }

    fn delete_event(&self, id: EventId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        delete_scheduled(&tx, EntityRef::event(id))?;
        let changed = tx.execute("DELETE FROM events WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::event(id)));
        }
        tx.commit()?;
        Ok(())
    }
}

fn replace_reminder_offsets(conn: &Connection, event: &CalendarEvent) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM event_reminders WHERE event_uuid = ?1;",
        [event.id.to_string()],
    )?;

    let distinct: BTreeSet<ReminderOffset> = event.reminder_offsets.iter().copied().collect();
    let mut stmt = conn.prepare(
        "INSERT INTO event_reminders (event_uuid, offset_minutes) VALUES (?1, ?2);",
    )?;
    for offset in distinct {
        stmt.execute(params![event.id.to_string(), offset.as_minutes()])?;
    }
    Ok(())
}

fn load_reminder_offsets(conn: &Connection, id: EventId) -> RepoResult<Vec<ReminderOffset>> {
    let mut stmt = conn.prepare(
        "SELECT offset_minutes
         FROM event_reminders
         WHERE event_uuid = ?1
         ORDER BY offset_minutes DESC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut offsets = Vec::new();
    while let Some(row) = rows.next()? {
        let minutes: i64 = row.get(0)?;
        let minutes = u32::try_from(minutes).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid reminder offset `{minutes}` in event_reminders.offset_minutes"
            ))
        })?;
        offsets.push(ReminderOffset::minutes(minutes));
    }
    Ok(offsets)
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<CalendarEvent> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid("events.uuid", &uuid_text)?;

    let repeat = match row.get::<_, Option<i64>>("repeat_weekdays")? {
        Some(bits) => Some(
            u8::try_from(bits)
                .ok()
                .and_then(WeekdaySet::from_bits)
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid weekday mask `{bits}` in events.repeat_weekdays"
                    ))
                })?,
        ),
        None => None,
    };

    Ok(CalendarEvent {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        location: row.get("location")?,
        start_ms: row.get("start_ms")?,
        end_ms: row.get("end_ms")?,
        repeat,
        reminder_offsets: Vec::new(),
        enabled: parse_bool("events.is_enabled", row.get("is_enabled")?)?,
        scheduled: Vec::new(),
    })
}
