use std::fmt;
use std::str;

use chrono::{DateTime, Utc};
use serde_derive::Serialize;

use crate::error::CleanerError;

/// Default number of audit records returned by a recent-records query.
pub const DEFAULT_RECENT_LIMIT: i64 = 50;
/// Upper bound on the number of audit records returned by a recent-records query.
pub const MAX_RECENT_LIMIT: i64 = 500;

/// Maintenance operations recorded in the audit table.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize)]
pub enum AuditOperation {
    #[serde(rename = "Clean All")]
    CleanAll,
    #[serde(rename = "Clean Selected")]
    CleanSelected,
    #[serde(rename = "Clean Failed")]
    CleanFailed,
    #[serde(rename = "Clear Logs")]
    ClearLogs,
}

impl AuditOperation {
    /// The text stored in the `operation` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::CleanAll => "Clean All",
            AuditOperation::CleanSelected => "Clean Selected",
            AuditOperation::CleanFailed => "Clean Failed",
            AuditOperation::ClearLogs => "Clear Logs",
        }
    }
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl str::FromStr for AuditOperation {
    type Err = CleanerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Clean All" => Ok(AuditOperation::CleanAll),
            "Clean Selected" => Ok(AuditOperation::CleanSelected),
            "Clean Failed" => Ok(AuditOperation::CleanFailed),
            "Clear Logs" => Ok(AuditOperation::ClearLogs),
            invalid => Err(CleanerError::InvalidInput(format!(
                "unknown audit operation {:?}",
                invalid
            ))),
        }
    }
}

/// A row of the audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub operation: AuditOperation,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// An audit record that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditRecord {
    pub operation: AuditOperation,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl NewAuditRecord {
    pub fn new(operation: AuditOperation, details: String) -> Self {
        Self {
            operation,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Clamp a caller supplied limit into `1..=MAX_RECENT_LIMIT`, falling back to the default.
pub fn recent_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT)
}
