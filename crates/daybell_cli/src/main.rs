//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `daybell_core` linkage.
//! - Arm a sample Monday/Wednesday 09:00 alarm against an in-memory store
//!   and print what the dispatcher received.

use chrono::{Local, TimeZone};
use daybell_core::db::open_db_in_memory;
use daybell_core::{
    Alarm, AlarmService, RecordingDispatcher, ReminderScheduler, SqliteAlarmRepository,
    SqliteScheduleStore, TimeSpec, WeekdaySet,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("daybell_core ping={}", daybell_core::ping());
    println!("daybell_core version={}", daybell_core::core_version());

    let conn = open_db_in_memory()?;
    let dispatcher = RecordingDispatcher::new();
    let service = AlarmService::new(
        SqliteAlarmRepository::try_new(&conn)?,
        ReminderScheduler::new(SqliteScheduleStore::try_new(&conn)?, &dispatcher),
    );

    let spec = TimeSpec::weekly(WeekdaySet::from_indices([1, 3])?, 9, 0)?;
    let alarm = service.create_alarm(&Alarm::new("smoke check", spec), &Local::now())?;

    for pending in dispatcher.pending() {
        let fire_at = Local
            .timestamp_millis_opt(pending.request.fire_at_ms)
            .single()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| pending.request.fire_at_ms.to_string());
        println!(
            "daybell_core alarm={} handle={} fire_at={}",
            alarm.id, pending.handle, fire_at
        );
    }
    Ok(())
}
