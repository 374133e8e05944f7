//! An in-memory job and audit store.
//!
//! Mirrors the semantics of [`crate::pgstore::PgStore`] closely enough to test the cleaner and
//! its HTTP surface without a database: the audit table can be missing, and the whole store can
//! be made unavailable to exercise error paths. Hook ties sort by byte order, like the
//! `COLLATE "C"` ordering in Postgres. Only built for tests or with the `test-utils` feature.
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::{AuditRecord, NewAuditRecord};
use crate::error::CleanerError;
use crate::job::{HookSummary, Job, JobFilter, JobLog, JobStatus};
use crate::store::{AuditStore, JobStore};

#[derive(Debug, Default)]
struct Tables {
    available: bool,
    jobs: BTreeMap<i64, Job>,
    logs: BTreeMap<i64, JobLog>,
    /// `None` when the audit table does not exist.
    audit: Option<Vec<AuditRecord>>,
    next_job_id: i64,
    next_log_id: i64,
    next_audit_id: i64,
}

#[derive(Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An available store with empty job and log tables and no audit table.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                available: true,
                next_job_id: 1,
                next_log_id: 1,
                next_audit_id: 1,
                ..Tables::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn available(&self, command: &str) -> Result<MutexGuard<'_, Tables>, CleanerError> {
        let tables = self.lock();
        if tables.available {
            Ok(tables)
        } else {
            Err(CleanerError::unavailable(command, "store is offline"))
        }
    }

    pub fn insert_job(&self, hook: &str, status: JobStatus, scheduled_at: DateTime<Utc>) -> i64 {
        let mut tables = self.lock();
        let id = tables.next_job_id;
        tables.next_job_id += 1;
        tables.jobs.insert(
            id,
            Job {
                id,
                hook: hook.to_owned(),
                status,
                scheduled_at,
            },
        );
        id
    }

    pub fn insert_log(&self, job_id: i64, message: &str) -> i64 {
        let mut tables = self.lock();
        let id = tables.next_log_id;
        tables.next_log_id += 1;
        tables.logs.insert(
            id,
            JobLog {
                id,
                job_id,
                message: message.to_owned(),
            },
        );
        id
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn logs(&self) -> Vec<JobLog> {
        self.lock().logs.values().cloned().collect()
    }

    /// Simulate losing the connection, or getting it back.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Simulate the audit table being dropped from under the cleaner.
    pub fn drop_audit_table(&self) {
        self.lock().audit = None;
    }

    pub fn has_audit_table(&self) -> bool {
        self.lock().audit.is_some()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn check_available(&self) -> Result<(), CleanerError> {
        self.available("check_available").map(|_| ())
    }

    async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, CleanerError> {
        let tables = self.available("count_jobs")?;
        Ok(tables.jobs.values().filter(|job| filter.matches(job)).count() as i64)
    }

    async fn group_by_hook(&self, status: JobStatus) -> Result<Vec<HookSummary>, CleanerError> {
        let tables = self.available("group_by_hook")?;

        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for job in tables.jobs.values().filter(|job| job.status == status) {
            *counts.entry(job.hook.as_str()).or_default() += 1;
        }

        let mut summaries: Vec<HookSummary> = counts
            .into_iter()
            .map(|(hook, count)| {
                let next_pending = if status == JobStatus::Complete {
                    tables
                        .jobs
                        .values()
                        .filter(|job| job.hook == hook && job.status == JobStatus::Pending)
                        .map(|job| job.scheduled_at)
                        .min()
                } else {
                    None
                };

                HookSummary {
                    hook: hook.to_owned(),
                    count,
                    next_pending,
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.hook.cmp(&b.hook)));
        Ok(summaries)
    }

    async fn delete_jobs(&self, filter: &JobFilter) -> Result<u64, CleanerError> {
        let mut tables = self.available("delete_jobs")?;

        let doomed: Vec<i64> = tables
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .map(|job| job.id)
            .collect();

        tables.logs.retain(|_, log| !doomed.contains(&log.job_id));
        for id in doomed.iter() {
            tables.jobs.remove(id);
        }

        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn create_audit_table(&self) -> Result<(), CleanerError> {
        let mut tables = self.available("create_audit_table")?;
        tables.audit.get_or_insert_with(Vec::new);
        Ok(())
    }

    async fn reset_audit_table(&self) -> Result<(), CleanerError> {
        let mut tables = self.available("reset_audit_table")?;
        tables.audit = Some(Vec::new());
        tables.next_audit_id = 1;
        Ok(())
    }

    async fn insert_audit(&self, record: &NewAuditRecord) -> Result<(), CleanerError> {
        let mut tables = self.available("insert_audit")?;
        let id = tables.next_audit_id;

        let audit = tables.audit.as_mut().ok_or_else(|| {
            CleanerError::unavailable("insert_audit", "audit table does not exist")
        })?;
        audit.push(AuditRecord {
            id,
            operation: record.operation,
            details: record.details.clone(),
            timestamp: record.timestamp,
        });

        tables.next_audit_id += 1;
        Ok(())
    }

    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditRecord>, CleanerError> {
        let tables = self.available("recent_audit")?;
        let audit = tables.audit.as_ref().ok_or_else(|| {
            CleanerError::unavailable("recent_audit", "audit table does not exist")
        })?;

        let mut records = audit.clone();
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOperation;
    use chrono::Duration;

    #[tokio::test]
    async fn test_delete_jobs_removes_dependent_logs_only() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let done = store.insert_job("sync_orders", JobStatus::Complete, now);
        let waiting = store.insert_job("sync_orders", JobStatus::Pending, now);
        store.insert_log(done, "action complete");
        let kept_log = store.insert_log(waiting, "action created");

        let deleted = store
            .delete_jobs(&JobFilter::deletable([JobStatus::Complete]))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.jobs().len(), 1);
        assert_eq!(store.jobs()[0].id, waiting);
        assert_eq!(store.logs().len(), 1);
        assert_eq!(store.logs()[0].id, kept_log);
    }

    #[tokio::test]
    async fn test_group_by_hook_orders_ties_by_hook() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for hook in ["b_hook", "a_hook", "c_hook", "c_hook"] {
            store.insert_job(hook, JobStatus::Failed, now);
        }

        let hooks: Vec<(String, i64)> = store
            .group_by_hook(JobStatus::Failed)
            .await
            .unwrap()
            .into_iter()
            .map(|summary| (summary.hook, summary.count))
            .collect();

        assert_eq!(
            hooks,
            vec![
                ("c_hook".to_owned(), 2),
                ("a_hook".to_owned(), 1),
                ("b_hook".to_owned(), 1)
            ]
        );
    }

    #[tokio::test]
    async fn test_group_by_hook_ties_use_byte_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for hook in ["a_hook", "B_hook"] {
            store.insert_job(hook, JobStatus::Complete, now);
        }

        let hooks: Vec<String> = store
            .group_by_hook(JobStatus::Complete)
            .await
            .unwrap()
            .into_iter()
            .map(|summary| summary.hook)
            .collect();

        assert_eq!(hooks, vec!["B_hook", "a_hook"]);
    }

    #[tokio::test]
    async fn test_recent_audit_newest_first() {
        let store = MemoryStore::new();
        store.create_audit_table().await.unwrap();
        let start = Utc::now();

        for minutes in [2, 0, 1] {
            store
                .insert_audit(&NewAuditRecord {
                    operation: AuditOperation::CleanFailed,
                    details: format!("at +{minutes}m"),
                    timestamp: start + Duration::minutes(minutes),
                })
                .await
                .unwrap();
        }

        let details: Vec<String> = store
            .recent_audit(2)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.details)
            .collect();
        assert_eq!(details, vec!["at +2m", "at +1m"]);
    }

    #[tokio::test]
    async fn test_offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(
            store.count_jobs(&JobFilter::by_status([JobStatus::Pending])).await,
            Err(CleanerError::StoreUnavailable { .. })
        ));
    }
}
