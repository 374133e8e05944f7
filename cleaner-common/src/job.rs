use std::fmt;

use chrono::{DateTime, Utc};
use serde_derive::Serialize;

/// Statuses a job can be deleted in. Anything else, in particular `pending` and `in-progress`,
/// belongs to the scheduler and is never removed.
pub const DELETABLE_STATUSES: [JobStatus; 2] = [JobStatus::Complete, JobStatus::Failed];

/// Lifecycle of a job as tracked by the host scheduler: `pending -> in-progress -> complete | failed`.
/// `canceled` is reachable from `pending`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum JobStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in-progress",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_deletable(&self) -> bool {
        DELETABLE_STATUSES.contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the scheduler's actions table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: i64,
    pub hook: String,
    pub status: JobStatus,
    pub scheduled_at: DateTime<Utc>,
}

/// A row of the scheduler's logs table, owned by exactly one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLog {
    pub id: i64,
    pub job_id: i64,
    pub message: String,
}

/// Selects jobs by status and, optionally, by exact hook name.
///
/// Construct with [`JobFilter::deletable`] before handing a filter to a delete: it drops every
/// status outside [`DELETABLE_STATUSES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    statuses: Vec<JobStatus>,
    hooks: Option<Vec<String>>,
}

impl JobFilter {
    pub fn by_status<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let mut statuses: Vec<JobStatus> = statuses.into_iter().collect();
        statuses.sort();
        statuses.dedup();

        Self {
            statuses,
            hooks: None,
        }
    }

    /// Like [`JobFilter::by_status`], keeping only statuses that may be deleted.
    pub fn deletable<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        Self::by_status(statuses.into_iter().filter(JobStatus::is_deletable))
    }

    pub fn with_hooks(mut self, hooks: Vec<String>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn statuses(&self) -> &[JobStatus] {
        &self.statuses
    }

    pub fn hooks(&self) -> Option<&[String]> {
        self.hooks.as_deref()
    }

    /// A filter with no statuses, or with an empty hook list, matches nothing.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty() || self.hooks.as_ref().is_some_and(|hooks| hooks.is_empty())
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.statuses.contains(&job.status)
            && self
                .hooks
                .as_ref()
                .map_or(true, |hooks| hooks.iter().any(|hook| *hook == job.hook))
    }

    pub(crate) fn status_strings(&self) -> Vec<String> {
        self.statuses.iter().map(|s| s.as_str().to_owned()).collect()
    }
}

/// Jobs of one hook in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct HookSummary {
    pub hook: String,
    pub count: i64,
    /// Earliest scheduled time among the hook's pending jobs. Only computed for `complete`.
    pub next_pending: Option<DateTime<Utc>>,
}
