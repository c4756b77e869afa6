//! Calendar event use-case service.
//!
//! # Invariants
//! - Title, description and location edits never touch the dispatcher.
//! - Timing, repetition, reminder and toggle edits always re-arm.

use crate::model::entity::EntityRef;
use crate::model::event::{CalendarEvent, EventId, EventUpdate};
use crate::repo::event_repo::{EventListQuery, EventRepository};
use crate::repo::schedule_store::ScheduleStore;
use crate::schedule::dispatcher::NotificationDispatcher;
use crate::schedule::orchestrator::ReminderScheduler;
use crate::service::{ServiceError, ServiceResult};
use chrono::{DateTime, TimeZone};
use log::info;

pub struct EventService<R, S, D> {
    repo: R,
    scheduler: ReminderScheduler<S, D>,
}

impl<R, S, D> EventService<R, S, D>
where
    R: EventRepository,
    S: ScheduleStore,
    D: NotificationDispatcher,
{
    pub fn new(repo: R, scheduler: ReminderScheduler<S, D>) -> Self {
        Self { repo, scheduler }
    }

    pub fn scheduler(&self) -> &ReminderScheduler<S, D> {
        &self.scheduler
    }

    pub fn create_event<Tz: TimeZone>(
        &self,
        event: &CalendarEvent,
        now: &DateTime<Tz>,
    ) -> ServiceResult<CalendarEvent> {
        let mut stored = event.clone();
        stored.scheduled.clear();
        self.repo.create_event(&stored)?;

        if stored.enabled {
            stored.scheduled = self.scheduler.reconcile(&stored, now)?;
        }

        info!(
            "event=event_create module=service status=ok event_id={} reminders={} armed={}",
            stored.id,
            stored.reminder_offsets.len(),
            stored.scheduled.len()
        );
        Ok(stored)
    }

    pub fn get_event(&self, id: EventId) -> ServiceResult<Option<CalendarEvent>> {
        Ok(self.repo.get_event(id)?)
    }

    pub fn list_events(&self, query: &EventListQuery) -> ServiceResult<Vec<CalendarEvent>> {
        Ok(self.repo.list_events(query)?)
    }

    pub fn update_event<Tz: TimeZone>(
        &self,
        id: EventId,
        updates: &[EventUpdate],
        now: &DateTime<Tz>,
    ) -> ServiceResult<CalendarEvent> {
        let mut event = self.require_event(id)?;
        let affects_schedule = event.apply_updates(updates);
        self.repo.update_event(&event)?;

        if affects_schedule {
            event.scheduled = self.scheduler.reconcile(&event, now)?;
        }

        info!(
            "event=event_update module=service status=ok event_id={} fields={} rescheduled={}",
            id,
            updates.len(),
            affects_schedule
        );
        Ok(event)
    }

    pub fn set_event_enabled<Tz: TimeZone>(
        &self,
        id: EventId,
        enabled: bool,
        now: &DateTime<Tz>,
    ) -> ServiceResult<CalendarEvent> {
        self.update_event(id, &[EventUpdate::Enabled(enabled)], now)
    }

    pub fn delete_event(&self, id: EventId) -> ServiceResult<()> {
        let event = self.require_event(id)?;
        self.scheduler.release(&event)?;
        self.repo.delete_event(id)?;

        info!("event=event_delete module=service status=ok event_id={id}");
        Ok(())
    }

    /// Re-arms every stored event. Returns the number of armed
    /// notifications.
    pub fn reconcile_all<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ServiceResult<usize> {
        let events = self.repo.list_events(&EventListQuery::default())?;
        let mut armed = 0;
        for event in &events {
            armed += self.scheduler.reconcile(event, now)?.len();
        }

        info!(
            "event=event_reconcile_all module=service status=ok events={} armed={}",
            events.len(),
            armed
        );
        Ok(armed)
    }

    fn require_event(&self, id: EventId) -> ServiceResult<CalendarEvent> {
        self.repo
            .get_event(id)?
            .ok_or(ServiceError::NotFound(EntityRef::event(id)))
    }
}
