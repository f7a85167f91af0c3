mod periodic_scheduler;

pub use periodic_scheduler::{MIN_INTERVAL_SECS, PeriodicScheduler, SchedulerError};
