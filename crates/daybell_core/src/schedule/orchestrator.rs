//! Reminder scheduling orchestrator.
//!
//! # Responsibility
//! - Rebuild the armed notification set of one entity from scratch
//!   (`reconcile`), or tear it down (`release`).
//! - Keep dispatcher failures from failing the caller's save.
//!
//! # Invariants
//! - After a successful call, the persisted handle set equals the set of
//!   notifications armed by that call.
//! - Dispatcher errors never escape; store errors always do.
//! - When persisting fails, the notifications armed by that call are
//!   cancelled again so none is left without a record.
//! - At most one in-flight call per entity is a caller precondition; no
//!   locking happens here.

use crate::model::entity::{
    EntityRef, NotificationContent, Schedulable, ScheduledNotification,
};
use crate::repo::schedule_store::{ScheduleStore, ScheduledEntity};
use crate::repo::RepoError;
use crate::schedule::dispatcher::{NotificationDispatcher, NotificationRequest};
use crate::schedule::reminder::plan_fire_times;
use chrono::{DateTime, TimeZone};
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug)]
pub enum SchedulerError {
    /// Reading the entity or persisting its handle set failed.
    Store(RepoError),
}

impl Display for SchedulerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "reminder bookkeeping failed: {err}"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for SchedulerError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Arms and disarms local notifications for schedulable entities.
pub struct ReminderScheduler<S, D> {
    store: S,
    dispatcher: D,
}

impl<S: ScheduleStore, D: NotificationDispatcher> ReminderScheduler<S, D> {
    pub fn new(store: S, dispatcher: D) -> Self {
        Self { store, dispatcher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Recomputes and re-arms every notification for `entity`.
    ///
    /// Returns the new outstanding set, which has also been persisted.
    ///
    /// # Errors
    /// - [`SchedulerError::Store`] when the handle set cannot be persisted;
    ///   the freshly armed notifications are cancelled first.
    pub fn reconcile<E, Tz>(
        &self,
        entity: &E,
        now: &DateTime<Tz>,
    ) -> SchedulerResult<Vec<ScheduledNotification>>
    where
        E: Schedulable,
        Tz: TimeZone,
    {
        let started_at = Instant::now();
        let entity_ref = entity.entity_ref();

        let cancelled = self.cancel_outstanding(entity_ref, entity.scheduled());
        let armed = if entity.is_enabled() {
            let fire_times = plan_fire_times(entity, now);
            let nominal = entity.next_occurrence(now);
            self.arm(entity_ref, &entity.notification_content(), nominal, fire_times)
        } else {
            Vec::new()
        };

        if let Err(err) = self.store.write_scheduled_handles(entity_ref, &armed) {
            let rolled_back = self.cancel_outstanding(entity_ref, &armed);
            warn!(
                "event=reconcile module=schedule status=error entity_kind={} entity_id={} armed={} rolled_back={} error={}",
                entity_ref.kind.as_str(),
                entity_ref.id,
                armed.len(),
                rolled_back,
                err
            );
            return Err(err.into());
        }

        info!(
            "event=reconcile module=schedule status=ok entity_kind={} entity_id={} enabled={} cancelled={} armed={} duration_ms={}",
            entity_ref.kind.as_str(),
            entity_ref.id,
            entity.is_enabled(),
            cancelled,
            armed.len(),
            started_at.elapsed().as_millis()
        );
        Ok(armed)
    }

    /// Cancels every outstanding notification for `entity` and persists the
    /// empty set. Used before deleting the entity.
    pub fn release<E: Schedulable>(&self, entity: &E) -> SchedulerResult<()> {
        let entity_ref = entity.entity_ref();
        let cancelled = self.cancel_outstanding(entity_ref, entity.scheduled());
        self.store.write_scheduled_handles(entity_ref, &[])?;

        info!(
            "event=release module=schedule status=ok entity_kind={} entity_id={} cancelled={}",
            entity_ref.kind.as_str(),
            entity_ref.id,
            cancelled
        );
        Ok(())
    }

    /// Loads `entity` through the store and reconciles it.
    ///
    /// Returns `None` when the entity does not exist.
    pub fn reconcile_by_ref<Tz: TimeZone>(
        &self,
        entity: EntityRef,
        now: &DateTime<Tz>,
    ) -> SchedulerResult<Option<Vec<ScheduledNotification>>> {
        let armed = match self.store.read_entity(entity)? {
            Some(ScheduledEntity::Alarm(alarm)) => Some(self.reconcile(&alarm, now)?),
            Some(ScheduledEntity::Event(event)) => Some(self.reconcile(&event, now)?),
            None => None,
        };
        Ok(armed)
    }

    fn cancel_outstanding(
        &self,
        entity_ref: EntityRef,
        outstanding: &[ScheduledNotification],
    ) -> usize {
        let mut cancelled = 0;
        for notification in outstanding {
            match self.dispatcher.cancel(&notification.handle) {
                Ok(()) => cancelled += 1,
                Err(err) => {
                    // Already fired or consumed; a fired one-shot has no further effect.
                    warn!(
                        "event=notification_cancel module=schedule status=error entity_kind={} entity_id={} handle={} error={}",
                        entity_ref.kind.as_str(),
                        entity_ref.id,
                        notification.handle,
                        err
                    );
                }
            }
        }
        cancelled
    }

    fn arm<Tz: TimeZone>(
        &self,
        entity_ref: EntityRef,
        content: &NotificationContent,
        nominal: Option<DateTime<Tz>>,
        fire_times: Vec<DateTime<Tz>>,
    ) -> Vec<ScheduledNotification> {
        let mut payload = content.payload.clone();
        payload.insert(
            "entity_kind".to_string(),
            Value::from(entity_ref.kind.as_str()),
        );
        payload.insert("entity_id".to_string(), Value::from(entity_ref.id.to_string()));
        payload.insert(
            "nominal_at_ms".to_string(),
            nominal.map_or(Value::Null, |at| Value::from(at.timestamp_millis())),
        );

        let mut armed = Vec::with_capacity(fire_times.len());
        for fire_at in fire_times {
            let request = NotificationRequest {
                entity: entity_ref,
                title: content.title.clone(),
                body: content.body.clone(),
                payload: payload.clone(),
                fire_at_ms: fire_at.timestamp_millis(),
            };

            match self.dispatcher.schedule(&request) {
                Ok(Some(handle)) => armed.push(ScheduledNotification {
                    handle,
                    fire_at_ms: request.fire_at_ms,
                }),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        "event=notification_schedule module=schedule status=degraded entity_kind={} entity_id={} error={}",
                        entity_ref.kind.as_str(),
                        entity_ref.id,
                        err
                    );
                    break;
                }
            }
        }
        armed
    }
}
