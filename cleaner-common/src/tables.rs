use std::sync::OnceLock;

use regex::Regex;

use crate::error::TableNameError;

/// Postgres truncates identifiers longer than this.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

/// A validated table name, safe to interpolate into query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, TableNameError> {
        if !identifier_regex().is_match(name) {
            return Err(TableNameError::InvalidCharacters(name.to_owned()));
        }
        if name.len() > MAX_IDENTIFIER_LENGTH {
            return Err(TableNameError::TooLong {
                name: name.to_owned(),
                length: name.len(),
                limit: MAX_IDENTIFIER_LENGTH,
            });
        }

        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a quoted identifier.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

/// The three tables the cleaner works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// The scheduler's jobs.
    pub actions: TableName,
    /// The scheduler's per job logs.
    pub logs: TableName,
    /// The cleaner's own audit trail.
    pub audit: TableName,
}

impl TableNames {
    /// Build table names by prepending a shared `prefix`, like `wp_`, to each base name.
    pub fn with_prefix(
        prefix: &str,
        actions: &str,
        logs: &str,
        audit: &str,
    ) -> Result<Self, TableNameError> {
        let names = Self {
            actions: TableName::new(&format!("{}{}", prefix, actions))?,
            logs: TableName::new(&format!("{}{}", prefix, logs))?,
            audit: TableName::new(&format!("{}{}", prefix, audit))?,
        };

        if names.actions == names.logs || names.actions == names.audit {
            return Err(TableNameError::Duplicate(names.actions.0));
        }
        if names.logs == names.audit {
            return Err(TableNameError::Duplicate(names.logs.0));
        }

        Ok(names)
    }
}

impl Default for TableNames {
    /// The WordPress defaults: `wp_actionscheduler_actions`, `wp_actionscheduler_logs` and
    /// `wp_task_cleaner_logs`.
    fn default() -> Self {
        let name = |name: &str| TableName(format!("wp_{}", name));

        Self {
            actions: name("actionscheduler_actions"),
            logs: name("actionscheduler_logs"),
            audit: name("task_cleaner_logs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_names() {
        let names = TableNames::with_prefix(
            "wp_",
            "actionscheduler_actions",
            "actionscheduler_logs",
            "task_cleaner_logs",
        )
        .unwrap();

        assert_eq!(names.actions.as_str(), "wp_actionscheduler_actions");
        assert_eq!(names.logs.quoted(), "\"wp_actionscheduler_logs\"");
        assert_eq!(names.audit.as_str(), "wp_task_cleaner_logs");
    }

    #[test]
    fn test_default_names_are_valid() {
        let names = TableNames::default();
        for table in [&names.actions, &names.logs, &names.audit] {
            assert_eq!(TableName::new(table.as_str()).as_ref(), Ok(table));
        }
    }

    #[test]
    fn test_rejects_unsafe_names() {
        for name in [
            "",
            "1actions",
            "actions; DROP TABLE users",
            "act\"ions",
            "act ions",
            "actions`",
            "public.actions",
        ] {
            assert_eq!(
                TableName::new(name),
                Err(TableNameError::InvalidCharacters(name.to_owned())),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_long_names() {
        let name = "a".repeat(64);
        assert!(matches!(
            TableName::new(&name),
            Err(TableNameError::TooLong { length: 64, .. })
        ));
        assert!(TableName::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        assert_eq!(
            TableNames::with_prefix("wp_", "jobs", "logs", "logs"),
            Err(TableNameError::Duplicate("wp_logs".to_owned()))
        );
    }
}
