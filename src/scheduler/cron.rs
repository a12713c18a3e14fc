//! Cron schedule for automatic backups

use std::fmt;

use chrono::{DateTime, Utc};
use croner::Cron;

use super::errors::{SchedulerError, SchedulerResult};

/// A parsed cron expression
pub struct BackupSchedule {
    expression: String,
    cron: Cron,
}

impl fmt::Debug for BackupSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupSchedule")
            .field("expression", &self.expression)
            .finish()
    }
}

impl BackupSchedule {
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let cron = Cron::new(expression)
            .parse()
            .map_err(|e| SchedulerError::InvalidSchedule {
                expression: expression.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
        self.cron
            .find_next_occurrence(&after, false)
            .map_err(|e| SchedulerError::NoNextRun {
                expression: self.expression.clone(),
                message: e.to_string(),
            })
    }
}
