//! Scheduled backups
//!
//! [`AutoBackupJob::trigger`] is the single call-in used by the periodic
//! scheduler: it runs an `auto` backup unless automatic backups are off or
//! the environment is development, and always answers with a status line.
//! [`run_schedule`] drives it from a cron expression.

mod cron;
mod errors;
mod job;

pub use cron::BackupSchedule;
pub use errors::{SchedulerError, SchedulerResult};
pub use job::{run_schedule, AutoBackupJob, TriggerStatus};
