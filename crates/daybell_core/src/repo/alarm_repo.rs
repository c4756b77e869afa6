//! Alarm repository contract and SQLite implementation.
//!
//! # Invariants
//! - `create_alarm`/`update_alarm` persist alarm fields only; the
//!   `scheduled` list is owned by [`super::schedule_store`].
//! - Loaded alarms carry their outstanding notifications.

use super::schedule_store::{delete_scheduled, load_scheduled};
use super::{bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult};
use crate::model::alarm::{Alarm, AlarmId};
use crate::model::entity::EntityRef;
use crate::model::time_spec::{TimeSpec, WeekdaySet};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ALARM_SELECT_SQL: &str = "SELECT
    uuid,
    label,
    sound,
    spec_kind,
    once_at_ms,
    weekdays,
    hour,
    minute,
    is_enabled
FROM alarms";

const SPEC_KIND_ONCE: &str = "once";
const SPEC_KIND_WEEKLY: &str = "weekly";

/// Query options for listing alarms.
#[derive(Debug, Clone, Default)]
pub struct AlarmListQuery {
    pub enabled_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

pub trait AlarmRepository {
    fn create_alarm(&self, alarm: &Alarm) -> RepoResult<AlarmId>;
    fn update_alarm(&self, alarm: &Alarm) -> RepoResult<()>;
    fn get_alarm(&self, id: AlarmId) -> RepoResult<Option<Alarm>>;
    /// Lists alarms, weekly ones by time of day first, then one-time ones
    /// by instant.
    fn list_alarms(&self, query: &AlarmListQuery) -> RepoResult<Vec<Alarm>>;
    fn delete_alarm(&self, id: AlarmId) -> RepoResult<()>;
}

impl<T: AlarmRepository + ?Sized> AlarmRepository for &T {
    fn create_alarm(&self, alarm: &Alarm) -> RepoResult<AlarmId> {
        (**self).create_alarm(alarm)
    }

    fn update_alarm(&self, alarm: &Alarm) -> RepoResult<()> {
        (**self).update_alarm(alarm)
    }

    fn get_alarm(&self, id: AlarmId) -> RepoResult<Option<Alarm>> {
        (**self).get_alarm(id)
    }

    fn list_alarms(&self, query: &AlarmListQuery) -> RepoResult<Vec<Alarm>> {
        (**self).list_alarms(query)
    }

    fn delete_alarm(&self, id: AlarmId) -> RepoResult<()> {
        (**self).delete_alarm(id)
    }
}

pub struct SqliteAlarmRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAlarmRepository<'conn> {
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
}

/// Flattened column values for one time spec.
struct SpecColumns {
    kind: &'static str,
    once_at_ms: Option<i64>,
    weekdays: i64,
    hour: Option<i64>,
    minute: Option<i64>,
}

impl From<&TimeSpec> for SpecColumns {
    fn from(spec: &TimeSpec) -> Self {
        match *spec {
            TimeSpec::Once { at_ms } => Self {
                kind: SPEC_KIND_ONCE,
                once_at_ms: Some(at_ms),
                weekdays: 0,
                hour: None,
                minute: None,
            },
            TimeSpec::Weekly { days, hour, minute } => Self {
                kind: SPEC_KIND_WEEKLY,
                once_at_ms: None,
                weekdays: i64::from(days.bits()),
                hour: Some(i64::from(hour)),
                minute: Some(i64::from(minute)),
            },
        }
    }
}

impl AlarmRepository for SqliteAlarmRepository<'_> {
    fn create_alarm(&self, alarm: &Alarm) -> RepoResult<AlarmId> {
        alarm.validate()?;
        let spec = SpecColumns::from(&alarm.time_spec);

        self.conn.execute(
            "INSERT INTO alarms (
                uuid,
                label,
                sound,
                spec_kind,
                once_at_ms,
                weekdays,
                hour,
                minute,
                is_enabled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                alarm.id.to_string(),
                alarm.label.as_str(),
                alarm.sound.as_deref(),
                spec.kind,
                spec.once_at_ms,
                spec.weekdays,
                spec.hour,
                spec.minute,
                bool_to_int(alarm.enabled),
            ],
        )?;

        Ok(alarm.id)
    }

    fn update_alarm(&self, alarm: &Alarm) -> RepoResult<()> {
        alarm.validate()?;
        let spec = SpecColumns::from(&alarm.time_spec);

        let changed = self.conn.execute(
            "UPDATE alarms
             SET
                label = ?1,
                sound = ?2,
                spec_kind = ?3,
                once_at_ms = ?4,
                weekdays = ?5,
                hour = ?6,
                minute = ?7,
                is_enabled = ?8,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?9;",
            params![
                alarm.label.as_str(),
                alarm.sound.as_deref(),
                spec.kind,
                spec.once_at_ms,
                spec.weekdays,
                spec.hour,
                spec.minute,
                bool_to_int(alarm.enabled),
                alarm.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::alarm(alarm.id)));
        }
        Ok(())
    }

    fn get_alarm(&self, id: AlarmId) -> RepoResult<Option<Alarm>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ALARM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut alarm = parse_alarm_row(row)?;
        alarm.scheduled = load_scheduled(self.conn, EntityRef::alarm(alarm.id))?;
        Ok(Some(alarm))
    }

    fn list_alarms(&self, query: &AlarmListQuery) -> RepoResult<Vec<Alarm>> {
        let mut sql = format!("{ALARM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.enabled_only {
            sql.push_str(" AND is_enabled = 1");
        }

        sql.push_str(
            " ORDER BY spec_kind = 'once' ASC, hour ASC, minute ASC, once_at_ms ASC, uuid ASC",
        );

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut alarms = Vec::new();
        while let Some(row) = rows.next()? {
            alarms.push(parse_alarm_row(row)?);
        }
        drop(rows);

        for alarm in &mut alarms {
            alarm.scheduled = load_scheduled(self.conn, EntityRef::alarm(alarm.id))?;
        }
        Ok(alarms)
    }

    fn delete_alarm(&self, id: AlarmId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        delete_scheduled(&tx, EntityRef::alarm(id))?;
        let changed = tx.execute("DELETE FROM alarms WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::alarm(id)));
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_alarm_row(row: &Row<'_>) -> RepoResult<Alarm> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid("alarms.uuid", &uuid_text)?;

    let spec_kind: String = row.get("spec_kind")?;
    let time_spec = match spec_kind.as_str() {
        SPEC_KIND_ONCE => {
            let at_ms: Option<i64> = row.get("once_at_ms")?;
            let at_ms = at_ms.ok_or_else(|| {
                RepoError::InvalidData(format!("missing alarms.once_at_ms for alarm {id}"))
            })?;
            TimeSpec::Once { at_ms }
        }
        SPEC_KIND_WEEKLY => {
            let bits: i64 = row.get("weekdays")?;
            let days = u8::try_from(bits)
                .ok()
                .and_then(WeekdaySet::from_bits)
                .ok_or_else(|| {
                    RepoError::InvalidData(format!("invalid weekday mask `{bits}` in alarms.weekdays"))
                })?;
            TimeSpec::Weekly {
                days,
                hour: clock_column(row, "hour")?,
                minute: clock_column(row, "minute")?,
            }
        }
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid spec kind `{other}` in alarms.spec_kind"
            )));
        }
    };

    let alarm = Alarm {
        id,
        label: row.get("label")?,
        sound: row.get("sound")?,
        time_spec,
        enabled: parse_bool("alarms.is_enabled", row.get("is_enabled")?)?,
        scheduled: Vec::new(),
    };
    alarm.validate()?;
    Ok(alarm)
}

fn clock_column(row: &Row<'_>, column: &str) -> RepoResult<u8> {
    let value: Option<i64> = row.get(column)?;
    value
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| {
            RepoError::InvalidData(format!("invalid clock value {value:?} in alarms.{column}"))
        })
}
