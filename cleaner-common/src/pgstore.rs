//! # PgStore
//!
//! The job and audit stores backed by Postgres.
//!
//! Table names come from a validated [`TableNames`] and are the only text interpolated into
//! queries. Statuses, hooks, audit details and limits are always bound as parameters.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};

use crate::audit::{AuditRecord, NewAuditRecord};
use crate::error::CleanerError;
use crate::job::{HookSummary, JobFilter, JobStatus};
use crate::store::{AuditStore, JobStore};
use crate::tables::{TableName, TableNames};

/// A row as read from the audit table, before its operation is parsed.
#[derive(sqlx::FromRow, Debug)]
struct AuditRow {
    id: i64,
    operation: String,
    details: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = CleanerError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let operation = row
            .operation
            .parse()
            .map_err(|_| CleanerError::QueryFailed {
                command: "SELECT".to_owned(),
                reason: format!("audit record {} has unknown operation {:?}", row.id, row.operation),
            })?;

        Ok(AuditRecord {
            id: row.id,
            operation,
            details: row.details,
            timestamp: row.timestamp,
        })
    }
}

/// Job and audit store over a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    tables: TableNames,
}

impl PgStore {
    /// Initialize a new PgStore backed by the database at `url`.
    ///
    /// Connections are opened lazily; call [`JobStore::check_available`] to fail fast at startup.
    pub fn new(url: &str, max_connections: u32, tables: TableNames) -> Result<Self, CleanerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|error| CleanerError::unavailable("connect", error))?;

        Ok(Self { pool, tables })
    }

    /// Initialize a new PgStore from an existing pool.
    pub fn new_from_pool(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool, CleanerError> {
        sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(table.quoted())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| CleanerError::from_sqlx("SELECT", error))
    }

    fn create_audit_table_query(&self) -> String {
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {audit} (
    id BIGSERIAL PRIMARY KEY,
    operation VARCHAR(100) NOT NULL,
    details TEXT NOT NULL,
    "timestamp" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
            "#,
            audit = self.tables.audit.quoted()
        )
    }
}

/// The `WHERE` clause shared by counts and deletes. `$1` binds the statuses, `$2` the optional hooks.
const FILTER_CLAUSE: &str = "status = ANY($1) AND ($2::text[] IS NULL OR hook = ANY($2))";

#[async_trait]
impl JobStore for PgStore {
    async fn check_available(&self) -> Result<(), CleanerError> {
        for table in [&self.tables.actions, &self.tables.logs] {
            if !self.table_exists(table).await? {
                return Err(CleanerError::unavailable(
                    "check_available",
                    format!("table {} does not exist", table.as_str()),
                ));
            }
        }

        Ok(())
    }

    async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, CleanerError> {
        let query = format!(
            "SELECT COUNT(*) FROM {actions} WHERE {filter}",
            actions = self.tables.actions.quoted(),
            filter = FILTER_CLAUSE,
        );

        sqlx::query_scalar(&query)
            .bind(filter.status_strings())
            .bind(filter.hooks().map(<[String]>::to_vec))
            .fetch_one(&self.pool)
            .await
            .map_err(|error| CleanerError::from_sqlx("SELECT", error))
    }

    async fn group_by_hook(&self, status: JobStatus) -> Result<Vec<HookSummary>, CleanerError> {
        let next_pending = if status == JobStatus::Complete {
            format!(
                "(SELECT MIN(p.scheduled_date_gmt) FROM {actions} p WHERE p.hook = a.hook AND p.status = $2)",
                actions = self.tables.actions.quoted(),
            )
        } else {
            "NULL::timestamptz".to_owned()
        };

        let query = format!(
            r#"
SELECT
    a.hook,
    COUNT(*) AS count,
    {next_pending} AS next_pending
FROM {actions} a
WHERE a.status = $1
GROUP BY a.hook
ORDER BY count DESC, a.hook COLLATE "C" ASC
            "#,
            next_pending = next_pending,
            actions = self.tables.actions.quoted(),
        );

        let mut summaries = sqlx::query_as::<Postgres, HookSummary>(&query).bind(status.as_str());
        if status == JobStatus::Complete {
            summaries = summaries.bind(JobStatus::Pending.as_str());
        }

        summaries
            .fetch_all(&self.pool)
            .await
            .map_err(|error| CleanerError::from_sqlx("SELECT", error))
    }

    async fn delete_jobs(&self, filter: &JobFilter) -> Result<u64, CleanerError> {
        let delete_logs = format!(
            "DELETE FROM {logs} WHERE action_id IN (SELECT action_id FROM {actions} WHERE {filter})",
            logs = self.tables.logs.quoted(),
            actions = self.tables.actions.quoted(),
            filter = FILTER_CLAUSE,
        );
        let delete_actions = format!(
            "DELETE FROM {actions} WHERE {filter}",
            actions = self.tables.actions.quoted(),
            filter = FILTER_CLAUSE,
        );
        let statuses = filter.status_strings();
        let hooks = filter.hooks().map(<[String]>::to_vec);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| CleanerError::from_sqlx("BEGIN", error))?;

        let logs_deleted = sqlx::query(&delete_logs)
            .bind(statuses.clone())
            .bind(hooks.clone())
            .execute(&mut *tx)
            .await
            .map_err(|error| CleanerError::from_sqlx("DELETE", error))?
            .rows_affected();

        let jobs_deleted = sqlx::query(&delete_actions)
            .bind(statuses)
            .bind(hooks)
            .execute(&mut *tx)
            .await
            .map_err(|error| CleanerError::from_sqlx("DELETE", error))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|error| CleanerError::from_sqlx("COMMIT", error))?;

        tracing::debug!(
            logs_deleted,
            jobs_deleted,
            "deleted jobs from {}",
            self.tables.actions.as_str()
        );

        Ok(jobs_deleted)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn create_audit_table(&self) -> Result<(), CleanerError> {
        sqlx::query(&self.create_audit_table_query())
            .execute(&self.pool)
            .await
            .map_err(|error| CleanerError::from_sqlx("CREATE", error))?;

        Ok(())
    }

    async fn reset_audit_table(&self) -> Result<(), CleanerError> {
        let drop = format!("DROP TABLE IF EXISTS {}", self.tables.audit.quoted());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| CleanerError::from_sqlx("BEGIN", error))?;

        sqlx::query(&drop)
            .execute(&mut *tx)
            .await
            .map_err(|error| CleanerError::from_sqlx("DROP", error))?;

        sqlx::query(&self.create_audit_table_query())
            .execute(&mut *tx)
            .await
            .map_err(|error| CleanerError::from_sqlx("CREATE", error))?;

        tx.commit()
            .await
            .map_err(|error| CleanerError::from_sqlx("COMMIT", error))
    }

    async fn insert_audit(&self, record: &NewAuditRecord) -> Result<(), CleanerError> {
        let query = format!(
            r#"INSERT INTO {audit} (operation, details, "timestamp") VALUES ($1, $2, $3)"#,
            audit = self.tables.audit.quoted(),
        );

        sqlx::query(&query)
            .bind(record.operation.as_str())
            .bind(&record.details)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|error| CleanerError::from_sqlx("INSERT", error))?;

        Ok(())
    }

    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditRecord>, CleanerError> {
        let query = format!(
            r#"SELECT id, operation, details, "timestamp" FROM {audit} ORDER BY "timestamp" DESC, id DESC LIMIT $1"#,
            audit = self.tables.audit.quoted(),
        );

        let rows: Vec<AuditRow> = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| CleanerError::from_sqlx("SELECT", error))?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}
