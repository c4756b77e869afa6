//! Alarm use-case service.
//!
//! # Responsibility
//! - Provide alarm CRUD entry points that keep notifications in step.
//!
//! # Invariants
//! - Created alarms start with no outstanding notifications.
//! - Label and sound edits never touch the dispatcher.
//! - Deleting an alarm cancels its notifications before the row goes away.

use crate::model::alarm::{Alarm, AlarmId, AlarmUpdate};
use crate::model::entity::{EntityRef, Schedulable};
use crate::repo::alarm_repo::{AlarmListQuery, AlarmRepository};
use crate::repo::schedule_store::ScheduleStore;
use crate::schedule::dispatcher::NotificationDispatcher;
use crate::schedule::orchestrator::ReminderScheduler;
use crate::service::{ServiceError, ServiceResult};
use chrono::{DateTime, TimeZone};
use log::info;

pub struct AlarmService<R, S, D> {
    repo: R,
    scheduler: ReminderScheduler<S, D>,
}

impl<R, S, D> AlarmService<R, S, D>
where
    R: AlarmRepository,
    S: ScheduleStore,
    D: NotificationDispatcher,
{
    pub fn new(repo: R, scheduler: ReminderScheduler<S, D>) -> Self {
        Self { repo, scheduler }
    }

    pub fn scheduler(&self) -> &ReminderScheduler<S, D> {
        &self.scheduler
    }

    /// Persists `alarm` and arms it when enabled.
    ///
    /// Returns the stored alarm including its outstanding notifications.
    pub fn create_alarm<Tz: TimeZone>(
        &self,
        alarm: &Alarm,
        now: &DateTime<Tz>,
    ) -> ServiceResult<Alarm> {
        let mut stored = alarm.clone();
        stored.scheduled.clear();
        self.repo.create_alarm(&stored)?;

        if stored.enabled {
            stored.scheduled = self.scheduler.reconcile(&stored, now)?;
        }

        info!(
            "event=alarm_create module=service status=ok alarm_id={} enabled={} armed={}",
            stored.id,
            stored.enabled,
            stored.scheduled.len()
        );
        Ok(stored)
    }

    pub fn get_alarm(&self, id: AlarmId) -> ServiceResult<Option<Alarm>> {
        Ok(self.repo.get_alarm(id)?)
    }

    pub fn list_alarms(&self, query: &AlarmListQuery) -> ServiceResult<Vec<Alarm>> {
        Ok(self.repo.list_alarms(query)?)
    }

    /// Applies `updates` and re-arms the alarm when any of them affects
    /// scheduling.
    pub fn update_alarm<Tz: TimeZone>(
        &self,
        id: AlarmId,
        updates: &[AlarmUpdate],
        now: &DateTime<Tz>,
    ) -> ServiceResult<Alarm> {
        let mut alarm = self.require_alarm(id)?;
        let affects_schedule = alarm.apply_updates(updates);
        self.repo.update_alarm(&alarm)?;

        if affects_schedule {
            alarm.scheduled = self.scheduler.reconcile(&alarm, now)?;
        }

        info!(
            "event=alarm_update module=service status=ok alarm_id={} fields={} rescheduled={}",
            id,
            updates.len(),
            affects_schedule
        );
        Ok(alarm)
    }

    pub fn set_alarm_enabled<Tz: TimeZone>(
        &self,
        id: AlarmId,
        enabled: bool,
        now: &DateTime<Tz>,
    ) -> ServiceResult<Alarm> {
        self.update_alarm(id, &[AlarmUpdate::Enabled(enabled)], now)
    }

    pub fn delete_alarm(&self, id: AlarmId) -> ServiceResult<()> {
        let alarm = self.require_alarm(id)?;
        self.scheduler.release(&alarm)?;
        self.repo.delete_alarm(id)?;

        info!("event=alarm_delete module=service status=ok alarm_id={id}");
        Ok(())
    }

    /// Next nominal ring time, or `None` when the alarm is disabled or never
    /// rings again.
    pub fn next_alarm_occurrence<Tz: TimeZone>(
        &self,
        id: AlarmId,
        now: &DateTime<Tz>,
    ) -> ServiceResult<Option<DateTime<Tz>>> {
        let alarm = self.require_alarm(id)?;
        if !alarm.enabled {
            return Ok(None);
        }
        Ok(alarm.next_occurrence(now))
    }

    /// Re-arms every stored alarm, e.g. after app start or a time zone
    /// change. Returns the number of armed notifications.
    pub fn reconcile_all<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ServiceResult<usize> {
        let alarms = self.repo.list_alarms(&AlarmListQuery::default())?;
        let mut armed = 0;
        for alarm in &alarms {
            armed += self.scheduler.reconcile(alarm, now)?.len();
        }

        info!(
            "event=alarm_reconcile_all module=service status=ok alarms={} armed={}",
            alarms.len(),
            armed
        );
        Ok(armed)
    }

    fn require_alarm(&self, id: AlarmId) -> ServiceResult<Alarm> {
        self.repo
            .get_alarm(id)?
            .ok_or(ServiceError::NotFound(EntityRef::alarm(id)))
    }
}
