//! Repository layer for alarms, events and scheduler bookkeeping.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Keep SQLite query details away from scheduling and services.
//!
//! # Invariants
//! - Writes validate the model before touching SQL.
//! - Reads reject invalid persisted state instead of masking it.
//! - Deleting an entity also deletes its notification bookkeeping rows.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::alarm::AlarmValidationError;
use crate::model::entity::EntityRef;
use crate::model::event::EventValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod alarm_repo;
pub mod event_repo;
pub mod schedule_store;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    InvalidAlarm(AlarmValidationError),
    InvalidEvent(EventValidationError),
    Db(DbError),
    NotFound(EntityRef),
    InvalidData(String),
    /// Connection was not opened through [`crate::db::open_db`].
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAlarm(err) => write!(f, "{err}"),
            Self::InvalidEvent(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{} not found: {}", entity.kind.as_str(), entity.id),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAlarm(err) => Some(err),
            Self::InvalidEvent(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::UninitializedConnection { .. } => None,
        }
    }
}

impl From<AlarmValidationError> for RepoError {
    fn from(value: AlarmValidationError) -> Self {
        Self::InvalidAlarm(value)
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::InvalidEvent(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn parse_bool(table_column: &str, value: i64) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {table_column}"
        ))),
    }
}

fn parse_uuid(table_column: &str, value: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {table_column}")))
}

/// Rejects connections whose schema is not fully migrated.
fn ensure_migrated(conn: &rusqlite::Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
