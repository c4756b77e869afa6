//! Store contract consumed by the reminder scheduler.
//!
//! # Responsibility
//! - Read a schedulable entity by kind-qualified reference.
//! - Atomically replace the outstanding notification set of one entity.
//!
//! # Invariants
//! - Handle rows keep the order they were written in (`position`).
//! - Writing handles for a missing entity fails with `NotFound`.

use super::alarm_repo::{AlarmRepository, SqliteAlarmRepository};
use super::event_repo::{EventRepository, SqliteEventRepository};
use super::{RepoError, RepoResult};
use crate::model::alarm::Alarm;
use crate::model::entity::{
    EntityKind, EntityRef, NotificationHandle, ScheduledNotification,
};
use crate::model::event::CalendarEvent;
use rusqlite::{params, Connection};

/// Entity loaded through [`ScheduleStore::read_entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledEntity {
    Alarm(Alarm),
    Event(CalendarEvent),
}

impl ScheduledEntity {
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Self::Alarm(alarm) => EntityRef::alarm(alarm.id),
            Self::Event(event) => EntityRef::event(event.id),
        }
    }
}

pub trait ScheduleStore {
    fn read_entity(&self, entity: EntityRef) -> RepoResult<Option<ScheduledEntity>>;

    /// Replaces every outstanding notification recorded for `entity`.
    fn write_scheduled_handles(
        &self,
        entity: EntityRef,
        handles: &[ScheduledNotification],
    ) -> RepoResult<()>;
}

impl<T: ScheduleStore + ?Sized> ScheduleStore for &T {
    fn read_entity(&self, entity: EntityRef) -> RepoResult<Option<ScheduledEntity>> {
        (**self).read_entity(entity)
    }

    fn write_scheduled_handles(
        &self,
        entity: EntityRef,
        handles: &[ScheduledNotification],
    ) -> RepoResult<()> {
        (**self).write_scheduled_handles(entity, handles)
    }
}

pub struct SqliteScheduleStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScheduleStore<'conn> {
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

    /// Lists every outstanding notification across entities, soonest first.
    pub fn list_outstanding(&self) -> RepoResult<Vec<(EntityRef, ScheduledNotification)>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_kind, entity_uuid, handle, fire_at_ms
             FROM scheduled_notifications
             ORDER BY fire_at_ms ASC, entity_kind ASC, entity_uuid ASC, position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut outstanding = Vec::new();
        while let Some(row) = rows.next()? {
            let kind_text: String = row.get(0)?;
            let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid entity kind `{kind_text}` in scheduled_notifications.entity_kind"
                ))
            })?;
            let uuid_text: String = row.get(1)?;
            let id = super::parse_uuid("scheduled_notifications.entity_uuid", &uuid_text)?;
            outstanding.push((
                EntityRef { kind, id },
                ScheduledNotification {
                    handle: NotificationHandle::new(row.get::<_, String>(2)?),
                    fire_at_ms: row.get(3)?,
                },
            ));
        }
        Ok(outstanding)
    }

    fn entity_exists(&self, entity: EntityRef) -> RepoResult<bool> {
        let sql = match entity.kind {
            EntityKind::Alarm => "SELECT EXISTS(SELECT 1 FROM alarms WHERE uuid = ?1);",
            EntityKind::Event => "SELECT EXISTS(SELECT 1 FROM events WHERE uuid = ?1);",
        };
        let exists: i64 = self
            .conn
            .query_row(sql, [entity.id.to_string()], |row| row.get(0))?;
        Ok(exists == 1)
    }
}

impl ScheduleStore for SqliteScheduleStore<'_> {
    fn read_entity(&self, entity: EntityRef) -> RepoResult<Option<ScheduledEntity>> {
        let loaded = match entity.kind {
            EntityKind::Alarm => SqliteAlarmRepository::new(self.conn)
                .get_alarm(entity.id)?
                .map(ScheduledEntity::Alarm),
            EntityKind::Event => SqliteEventRepository::new(self.conn)
                .get_event(entity.id)?
                .map(ScheduledEntity::Event),
        };
        Ok(loaded)
    }

    fn write_scheduled_handles(
        &self,
        entity: EntityRef,
        handles: &[ScheduledNotification],
    ) -> RepoResult<()> {
        if !self.entity_exists(entity)? {
            return Err(RepoError::NotFound(entity));
        }

        let tx = self.conn.unchecked_transaction()?;
        delete_scheduled(&tx, entity)?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO scheduled_notifications (
                    entity_kind,
                    entity_uuid,
                    position,
                    handle,
                    fire_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for (position, notification) in handles.iter().enumerate() {
                stmt.execute(params![
                    entity.kind.as_str(),
                    entity.id.to_string(),
                    position as i64,
                    notification.handle.as_str(),
                    notification.fire_at_ms,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn load_scheduled(
    conn: &Connection,
    entity: EntityRef,
) -> RepoResult<Vec<ScheduledNotification>> {
    let mut stmt = conn.prepare(
        "SELECT handle, fire_at_ms
         FROM scheduled_notifications
         WHERE entity_kind = ?1 AND entity_uuid = ?2
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query(params![entity.kind.as_str(), entity.id.to_string()])?;
    let mut scheduled = Vec::new();
    while let Some(row) = rows.next()? {
        scheduled.push(ScheduledNotification {
            handle: NotificationHandle::new(row.get::<_, String>(0)?),
            fire_at_ms: row.get(1)?,
        });
    }
    Ok(scheduled)
}

pub(crate) fn delete_scheduled(conn: &Connection, entity: EntityRef) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM scheduled_notifications WHERE entity_kind = ?1 AND entity_uuid = ?2;",
        params![entity.kind.as_str(), entity.id.to_string()],
    )
}
