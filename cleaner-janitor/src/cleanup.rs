use std::sync::Arc;

use serde_derive::Serialize;

use cleaner_common::audit::{recent_limit, AuditOperation, AuditRecord, NewAuditRecord};
use cleaner_common::error::CleanerError;
use cleaner_common::job::{HookSummary, JobFilter, JobStatus, DELETABLE_STATUSES};
use cleaner_common::metrics::{record_cleanup, record_cleanup_failure};
use cleaner_common::sanitize::{sanitize_details, sanitize_hooks};
use cleaner_common::store::{AuditStore, JobStore};

/// A maintenance command submitted by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Delete every complete and failed job.
    CleanAll,
    /// Delete the complete jobs of the given hooks.
    CleanSelected { hooks: Vec<String> },
    /// Delete every failed job.
    CleanFailed,
    /// Reset the audit table.
    ClearLogs,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CleanAll => "clean_all",
            Command::CleanSelected { .. } => "clean_selected",
            Command::CleanFailed => "clean_failed",
            Command::ClearLogs => "clear_logs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub message: String,
    pub affected: i64,
}

/// Garbage-collects terminal jobs and keeps an audit trail of every cleanup.
#[derive(Clone)]
pub struct Cleaner {
    jobs: Arc<dyn JobStore>,
    audit: Arc<dyn AuditStore>,
}

impl Cleaner {
    pub fn new(jobs: Arc<dyn JobStore>, audit: Arc<dyn AuditStore>) -> Self {
        Self { jobs, audit }
    }

    /// Fail fast if the job tables are missing, and create the audit table if needed.
    /// Run once at startup; later operations do not probe for tables.
    pub async fn initialize(&self) -> Result<(), CleanerError> {
        self.jobs.check_available().await?;
        self.audit.create_audit_table().await
    }

    pub async fn count_pending(&self) -> Result<i64, CleanerError> {
        self.count_by_status(&[JobStatus::Pending]).await
    }

    pub async fn count_by_status(&self, statuses: &[JobStatus]) -> Result<i64, CleanerError> {
        let filter = JobFilter::by_status(statuses.iter().copied());
        if filter.is_empty() {
            return Ok(0);
        }

        self.jobs.count_jobs(&filter).await
    }

    pub async fn group_by_hook(&self, status: JobStatus) -> Result<Vec<HookSummary>, CleanerError> {
        self.jobs.group_by_hook(status).await
    }

    /// Delete jobs in any of `statuses` along with their logs. Statuses outside
    /// [`DELETABLE_STATUSES`] are ignored; if none remain nothing is queried.
    ///
    /// Returns the number of matching jobs counted right before the delete.
    pub async fn delete_by_status(&self, statuses: &[JobStatus]) -> Result<i64, CleanerError> {
        self.delete(JobFilter::deletable(statuses.iter().copied()))
            .await
    }

    /// Delete jobs in `status` whose hook is exactly one of `hooks`, along with their logs.
    /// An empty `hooks` is a no-op.
    pub async fn delete_by_hooks(
        &self,
        hooks: &[String],
        status: JobStatus,
    ) -> Result<i64, CleanerError> {
        let hooks = sanitize_hooks(hooks)?;
        self.delete(JobFilter::deletable([status]).with_hooks(hooks))
            .await
    }

    async fn delete(&self, filter: JobFilter) -> Result<i64, CleanerError> {
        if filter.is_empty() {
            tracing::debug!(?filter, "skipping delete for a filter that matches nothing");
            return Ok(0);
        }

        let count = self.jobs.count_jobs(&filter).await?;
        let deleted = self.jobs.delete_jobs(&filter).await?;
        if deleted as i64 != count {
            tracing::debug!(count, deleted, "job count changed between count and delete");
        }

        Ok(count)
    }

    pub async fn reset_audit_log(&self) -> Result<(), CleanerError> {
        self.audit.reset_audit_table().await
    }

    /// Append an audit record. Never fails: a missing table or any other error is logged and
    /// dropped so that the cleanup it describes still reports success.
    pub async fn record_audit(&self, operation: AuditOperation, details: &str) {
        let record = NewAuditRecord::new(operation, sanitize_details(details));

        if let Err(error) = self.audit.insert_audit(&record).await {
            tracing::warn!("failed to record {} in audit log: {}", operation, error);
        }
    }

    /// The most recent audit records, newest first. `limit` defaults to 50.
    pub async fn recent_audit(&self, limit: Option<i64>) -> Result<Vec<AuditRecord>, CleanerError> {
        self.audit.recent_audit(recent_limit(limit)).await
    }

    /// Run a command, record it in the audit log and describe the result.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, CleanerError> {
        let name = command.name();
        let result = self.execute_inner(command).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(command = name, affected = outcome.affected, "{}", outcome.message);
                record_cleanup(name, outcome.affected as u64);
            }
            Err(error) => {
                tracing::error!(command = name, "command failed: {}", error);
                record_cleanup_failure(name);
            }
        }

        result
    }

    async fn execute_inner(&self, command: Command) -> Result<CommandOutcome, CleanerError> {
        match command {
            Command::CleanAll => {
                let count = self.delete_by_status(&DELETABLE_STATUSES).await?;
                self.record_audit(
                    AuditOperation::CleanAll,
                    &format!("Cleaned {} completed and failed tasks", count),
                )
                .await;

                Ok(CommandOutcome {
                    message: "All completed and failed tasks have been cleaned.".to_owned(),
                    affected: count,
                })
            }
            Command::CleanSelected { hooks } => {
                let hooks = sanitize_hooks(&hooks)?;
                if hooks.is_empty() {
                    return Err(CleanerError::InvalidInput(
                        "select at least one hook to clean".to_owned(),
                    ));
                }

                let count = self.delete_by_hooks(&hooks, JobStatus::Complete).await?;
                self.record_audit(
                    AuditOperation::CleanSelected,
                    &format!(
                        "Cleaned {} tasks from selected hooks: {}",
                        count,
                        hooks.join(", ")
                    ),
                )
                .await;

                Ok(CommandOutcome {
                    message: "Selected tasks have been cleaned.".to_owned(),
                    affected: count,
                })
            }
            Command::CleanFailed => {
                let count = self.delete_by_status(&[JobStatus::Failed]).await?;
                self.record_audit(
                    AuditOperation::CleanFailed,
                    &format!("Cleaned {} failed tasks", count),
                )
                .await;

                Ok(CommandOutcome {
                    message: "All failed tasks have been cleaned.".to_owned(),
                    affected: count,
                })
            }
            Command::ClearLogs => {
                self.reset_audit_log().await?;

                Ok(CommandOutcome {
                    message: "All logs have been cleared.".to_owned(),
                    affected: 0,
                })
            }
        }
    }
}
