//! SQL statement logging through `tracing`.

use tracing::Level;

/// The kind of statement being executed, detected from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, transaction control and anything else.
    Other,
}

impl StatementKind {
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start();
        if starts_with_keyword(trimmed, "SELECT") {
            StatementKind::Select
        } else if starts_with_keyword(trimmed, "INSERT") {
            StatementKind::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            StatementKind::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.len() >= keyword.len()
        && sql.as_bytes()[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
        && sql[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
pub(crate) fn truncate_sql_bytes(sql: &str, max: usize) -> &str {
    if sql.len() <= max {
        return sql;
    }
    let mut end = max;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Emits every executed statement on the `liteorm.sql` target.
#[derive(Debug, Clone)]
pub struct SqlLogger {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: Option<usize>) -> Self {
        self.max_sql_length = len;
        self
    }

    fn display_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                format!("{}...", truncate_sql_bytes(sql, max)).into()
            }
            _ => sql.into(),
        }
    }

    /// Log a statement before it runs. `scope` is `"auto"` for per-call
    /// transactions and `"tx"` inside an explicit transaction.
    pub fn statement(&self, scope: &'static str, sql: &str) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let kind = StatementKind::from_sql(sql);
        let sql = self.display_sql(sql);
        emit_at_level!(
            self.level,
            target: "liteorm.sql",
            kind = ?kind,
            scope,
            sql = %sql,
            "sql"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_kind_detection() {
        assert_eq!(StatementKind::from_sql("  select 1"), StatementKind::Select);
        assert_eq!(
            StatementKind::from_sql("INSERT OR REPLACE INTO t VALUES (1)"),
            StatementKind::Insert
        );
        assert_eq!(StatementKind::from_sql("UPDATE t SET a = 1"), StatementKind::Update);
        assert_eq!(StatementKind::from_sql("DELETE FROM t"), StatementKind::Delete);
        assert_eq!(
            StatementKind::from_sql("CREATE TABLE IF NOT EXISTS t (a INTEGER)"),
            StatementKind::Other
        );
        assert_eq!(StatementKind::from_sql("selected"), StatementKind::Other);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql_bytes("abc", 10), "abc");
    }

    #[test]
    fn display_sql_truncates() {
        let logger = SqlLogger::new().max_sql_length(Some(6));
        assert_eq!(logger.display_sql("SELECT * FROM t"), "SELECT...");
        let logger = SqlLogger::new().max_sql_length(None);
        assert_eq!(logger.display_sql("SELECT * FROM t"), "SELECT * FROM t");
    }
}
