//! Alarm and calendar-event use-case services.
//!
//! # Responsibility
//! - Wrap repository CRUD with the reminder scheduler's invocation points.
//! - Keep FFI/CLI callers away from storage and dispatcher details.
//!
//! # Invariants
//! - Only schedule-affecting changes trigger a reconcile.
//! - Dispatcher trouble never fails a save; store trouble always does.

use crate::model::entity::EntityRef;
use crate::repo::RepoError;
use crate::schedule::orchestrator::SchedulerError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod alarm_service;
pub mod event_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Target entity does not exist.
    NotFound(EntityRef),
    /// Persistence-layer failure, including validation.
    Repo(RepoError),
    /// Reminder bookkeeping could not be persisted.
    Scheduling(SchedulerError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(entity) => write!(f, "{} not found: {}", entity.kind.as_str(), entity.id),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Scheduling(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Scheduling(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Repo(other),
        }
    }
}

impl From<SchedulerError> for ServiceError {
    fn from(value: SchedulerError) -> Self {
        Self::Scheduling(value)
    }
}
