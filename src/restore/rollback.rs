//! Recovery paths after the swap has started

use super::errors::{RestoreError, SwapStep};
use super::orchestrator::{rolled_back, RestoreAttempt, RestoreOrchestrator, SwapNames};
use super::outcome::{RestoreOutcome, RollbackMethod};
use crate::client::ApplyMode;
use crate::observability::{log_event_with_fields, Event};

impl RestoreOrchestrator {
    /// The scratch -> live rename failed after live -> preserved succeeded.
    /// Put the original back under the live name; if even that fails,
    /// stop and escalate with both names.
    pub(crate) async fn rename_back(
        &self,
        swap_error: String,
        names: &SwapNames,
        attempt: &mut RestoreAttempt,
    ) -> RestoreOutcome {
        match self
            .client
            .rename_database(&names.maintenance, &names.preserved, &names.live)
            .await
        {
            Ok(()) => {
                log_event_with_fields(
                    Event::RestoreRenameBackComplete,
                    &[("database", names.live.as_str()), ("reason", swap_error.as_str())],
                );
                self.drop_scratch(names, attempt).await;
                rolled_back(
                    RestoreError::Swap {
                        step: SwapStep::RenameScratch,
                        message: swap_error,
                    },
                    RollbackMethod::RenameBack,
                )
            }
            Err(e) => {
                let error = RestoreError::CriticalManualIntervention {
                    live_database: names.live.clone(),
                    preserved_database: names.preserved.clone(),
                    scratch_database: names.scratch.clone(),
                    swap_error,
                    rename_back_error: e.message(),
                };
                log_event_with_fields(
                    Event::RestoreManualIntervention,
                    &[
                        ("live_database", names.live.as_str()),
                        ("preserved_database", names.preserved.as_str()),
                        ("scratch_database", names.scratch.as_str()),
                        ("reason", &error.to_string()),
                    ],
                );
                RestoreOutcome::FailedUnrecoverable { error }
            }
        }
    }

    /// Full rollback: recreate the live database from the safety dump.
    pub(crate) async fn roll_back(
        &self,
        cause: RestoreError,
        names: &SwapNames,
        attempt: &mut RestoreAttempt,
    ) -> RestoreOutcome {
        let safety_dump = match (&attempt.safety_dump, attempt.rollback_armed) {
            (Some(path), true) => path.clone(),
            _ => return RestoreOutcome::FailedUnchanged { error: cause },
        };
        log_event_with_fields(
            Event::RestoreRollbackBegin,
            &[("database", names.live.as_str()), ("reason", &cause.to_string())],
        );

        self.drop_scratch(names, attempt).await;

        if let Err(e) = self
            .client
            .terminate_connections(&names.maintenance, &names.live)
            .await
        {
            tracing::warn!(database = %names.live, error = %e, "connection termination during rollback reported an error");
        }
        tokio::time::sleep(self.timing.rollback_settle_delay).await;

        let steps = async {
            self.client
                .drop_database(&names.maintenance, &names.live)
                .await
                .map_err(|e| ("drop live database", e.message()))?;
            self.client
                .create_database(&names.maintenance, &names.live)
                .await
                .map_err(|e| ("recreate live database", e.message()))?;
            self.client
                .apply_script(&names.live, &safety_dump, ApplyMode::Strict)
                .await
                .map_err(|e| ("apply safety dump", e.message()))?;
            Ok::<(), (&'static str, String)>(())
        }
        .await;

        match steps {
            Ok(()) => {
                log_event_with_fields(Event::RestoreRollbackComplete, &[("database", names.live.as_str())]);
                rolled_back(cause, RollbackMethod::SafetyDump)
            }
            Err((step, message)) => {
                let error = RestoreError::RollbackFailed {
                    step,
                    message,
                    safety_dump,
                    cause: Box::new(cause),
                };
                log_event_with_fields(
                    Event::RestoreRollbackFailed,
                    &[("database", names.live.as_str()), ("reason", &error.to_string())],
                );
                RestoreOutcome::FailedUnrecoverable { error }
            }
        }
    }
}
