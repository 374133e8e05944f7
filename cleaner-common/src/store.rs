//! The boundary between the cleaner and the tables it maintains.
//!
//! [`JobStore`] covers the scheduler's actions and logs tables, which the cleaner only counts,
//! groups and deletes from. [`AuditStore`] covers the audit table, which the cleaner owns.
use async_trait::async_trait;

use crate::audit::{AuditRecord, NewAuditRecord};
use crate::error::CleanerError;
use crate::job::{HookSummary, JobFilter, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Verify the job and log tables are reachable. Called once at startup.
    async fn check_available(&self) -> Result<(), CleanerError>;

    async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, CleanerError>;

    /// Per hook counts of jobs in `status`, ordered by count descending then hook ascending.
    /// When `status` is `complete` each summary carries the hook's earliest pending run.
    async fn group_by_hook(&self, status: JobStatus) -> Result<Vec<HookSummary>, CleanerError>;

    /// Delete the logs of every job matching `filter`, then the jobs, atomically.
    /// Returns the number of jobs removed.
    async fn delete_jobs(&self, filter: &JobFilter) -> Result<u64, CleanerError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn create_audit_table(&self) -> Result<(), CleanerError>;

    /// Drop and recreate the audit table, discarding every record.
    async fn reset_audit_table(&self) -> Result<(), CleanerError>;

    async fn insert_audit(&self, record: &NewAuditRecord) -> Result<(), CleanerError>;

    /// The `limit` most recent records, newest first.
    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditRecord>, CleanerError>;
}
