//! Background jobs.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig, schedule_counter_purge};
