//! Statement execution seam shared by the database handle and transactions.

use crate::error::{OrmError, OrmResult};
use crate::value::{Record, Value};
use rusqlite::Connection;
use rusqlite::types::Value as SqliteValue;
use tokio::sync::OwnedMutexGuard;

/// A trait that unifies the database handle and open transactions.
///
/// Table operations accept any `Executor`, so the same call runs standalone
/// (in its own ad hoc transaction) or as part of an enclosing [`Transaction`].
///
/// [`Transaction`]: crate::Transaction
pub trait Executor: Send + Sync {
    /// Execute a statement and return the number of affected rows.
    fn exec(&self, sql: &str) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Execute several statements as one unit, returning the total affected rows.
    ///
    /// Either every statement applies or none does.
    fn exec_all(
        &self,
        statements: &[String],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Execute a query and return every row as an unconverted [`Record`].
    fn query(&self, sql: &str)
    -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Execute a query and return the first row, if any.
    fn single(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send {
        async move { Ok(self.query(sql).await?.into_iter().next()) }
    }
}

pub(crate) fn exec_on(conn: &Connection, sql: &str) -> OrmResult<u64> {
    Ok(conn.execute(sql, [])? as u64)
}

pub(crate) fn exec_all_on(conn: &Connection, statements: &[String]) -> OrmResult<u64> {
    let mut total = 0;
    for sql in statements {
        total += exec_on(conn, sql)?;
    }
    Ok(total)
}

pub(crate) fn query_on(conn: &Connection, sql: &str) -> OrmResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    // Repeated result names keep the last value, as `Record::set` does.
    let unique = names
        .iter()
        .enumerate()
        .all(|(idx, name)| !names[..idx].contains(name));
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut entries = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let raw: SqliteValue = row.get(idx)?;
            entries.push((name.clone(), from_sqlite(raw)));
        }
        let record = if unique {
            Record::from_entries(entries)
        } else {
            let mut record = Record::new();
            for (name, value) in entries {
                record.set(name, value);
            }
            record
        };
        out.push(record);
    }
    Ok(out)
}

/// Run `f` inside BEGIN/COMMIT, rolling back if it or the commit fails.
pub(crate) fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> OrmResult<T>,
) -> OrmResult<T> {
    conn.execute_batch("BEGIN")?;
    let result = f(conn).and_then(|value| {
        conn.execute_batch("COMMIT")?;
        Ok(value)
    });
    result.map_err(|error| rollback_after(conn, error))
}

/// Run `f` inside an anonymous savepoint of an open transaction.
pub(crate) fn in_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce(&Connection) -> OrmResult<T>,
) -> OrmResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(error) => match conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}")) {
            Ok(()) => Err(error),
            Err(rollback_err) => Err(OrmError::Other(format!(
                "{error} (savepoint rollback failed: {rollback_err})"
            ))),
        },
    }
}

/// Roll back whatever transaction `error` left open and return the error.
///
/// A failed COMMIT keeps the transaction open, so the connection would
/// otherwise refuse every later BEGIN.
pub(crate) fn rollback_after(conn: &Connection, error: OrmError) -> OrmError {
    if conn.is_autocommit() {
        return error;
    }
    match conn.execute_batch("ROLLBACK") {
        Ok(()) => error,
        Err(rollback_err) => OrmError::Other(format!("{error} (rollback failed: {rollback_err})")),
    }
}

/// Roll back a transaction left open by a cancelled or panicked task.
pub(crate) fn discard_abandoned(conn: &Connection) -> OrmResult<()> {
    if conn.is_autocommit() {
        return Ok(());
    }
    tracing::warn!(target: "liteorm.sql", "rolling back abandoned transaction");
    conn.execute_batch("ROLLBACK")?;
    Ok(())
}

/// Run `f` with the locked connection on tokio's blocking pool and hand the
/// lock back together with the result.
pub(crate) async fn run_blocking<T, F>(
    conn: OwnedMutexGuard<Connection>,
    f: F,
) -> OrmResult<(OwnedMutexGuard<Connection>, OrmResult<T>)>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> OrmResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = f(&conn);
        (conn, result)
    })
    .await
    .map_err(|e| OrmError::Other(format!("database task failed: {e}")))
}

fn from_sqlite(raw: SqliteValue) -> Value {
    match raw {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(n) => Value::Integer(n),
        SqliteValue::Real(f) => Value::Real(f),
        SqliteValue::Text(s) => Value::Text(s),
        SqliteValue::Blob(b) => Value::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT, c REAL, d BLOB)")
            .unwrap();
        conn
    }

    #[test]
    fn query_maps_storage_classes() {
        let conn = conn();
        exec_on(&conn, "INSERT INTO t VALUES (1, 'x', 1.5, X'FF')").unwrap();
        exec_on(&conn, "INSERT INTO t VALUES (null, null, null, null)").unwrap();
        let rows = query_on(&conn, "SELECT a, b, c, d FROM t ORDER BY rowid").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("a"), Some(&Value::Integer(1)));
        assert_eq!(rows[0].get("b"), Some(&Value::Text("x".into())));
        assert_eq!(rows[0].get("c"), Some(&Value::Real(1.5)));
        assert_eq!(rows[0].get("d"), Some(&Value::Blob(vec![0xFF])));
        assert!(rows[1].iter().all(|(_, v)| v.is_null()));
    }

    #[test]
    fn aliases_become_record_keys() {
        let conn = conn();
        let rows = query_on(&conn, "SELECT COUNT(*) AS \"count\" FROM t").unwrap();
        assert_eq!(rows[0].get("count"), Some(&Value::Integer(0)));
    }

    #[test]
    fn rows_keep_result_column_order() {
        let conn = conn();
        let rows = query_on(&conn, "SELECT 3 AS c, 1 AS a, 2 AS b").unwrap();
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["c", "a", "b"]);

        let rows = query_on(&conn, "SELECT 1 AS a, 2 AS b, 3 AS a").unwrap();
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0].get("a"), Some(&Value::Integer(3)));
    }

    #[test]
    fn failed_unit_rolls_back() {
        let conn = conn();
        let statements = vec![
            "INSERT INTO t (a) VALUES (1)".to_string(),
            "INSERT INTO missing (a) VALUES (2)".to_string(),
        ];
        let err = in_transaction(&conn, |c| exec_all_on(c, &statements)).unwrap_err();
        assert!(matches!(err, OrmError::Execution(_)));
        let rows = query_on(&conn, "SELECT a FROM t").unwrap();
        assert!(rows.is_empty());
        assert!(conn.is_autocommit());
    }

    #[test]
    fn successful_unit_commits() {
        let conn = conn();
        let statements = vec![
            "INSERT INTO t (a) VALUES (1)".to_string(),
            "INSERT INTO t (a) VALUES (2)".to_string(),
        ];
        let n = in_transaction(&conn, |c| exec_all_on(c, &statements)).unwrap();
        assert_eq!(n, 2);
        assert_eq!(query_on(&conn, "SELECT a FROM t").unwrap().len(), 2);
    }

    #[test]
    fn failed_commit_rolls_back() {
        let conn = conn();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE p (id INTEGER PRIMARY KEY);
             CREATE TABLE c (pid INTEGER REFERENCES p(id) DEFERRABLE INITIALLY DEFERRED);",
        )
        .unwrap();

        // The deferred key is only checked by COMMIT.
        let err = in_transaction(&conn, |c| exec_on(c, "INSERT INTO c VALUES (99)")).unwrap_err();
        assert!(err.is_constraint_violation());
        assert!(conn.is_autocommit());
        assert_eq!(in_transaction(&conn, |c| exec_on(c, "INSERT INTO p VALUES (1)")).unwrap(), 1);
        assert!(query_on(&conn, "SELECT pid FROM c").unwrap().is_empty());
    }

    #[test]
    fn savepoint_failure_keeps_transaction() {
        let conn = conn();
        conn.execute_batch("BEGIN; INSERT INTO t (a) VALUES (1);").unwrap();
        let err = in_savepoint(&conn, "sp", |c| {
            exec_on(c, "INSERT INTO t (a) VALUES (2)")?;
            exec_on(c, "INSERT INTO missing (a) VALUES (3)")
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::Execution(_)));
        assert!(!conn.is_autocommit());
        conn.execute_batch("COMMIT").unwrap();
        assert_eq!(query_on(&conn, "SELECT a FROM t").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blocking_run_returns_the_lock() {
        let shared = std::sync::Arc::new(tokio::sync::Mutex::new(conn()));
        let guard = shared.clone().lock_owned().await;
        let (guard, result) = run_blocking(guard, |c| exec_on(c, "INSERT INTO t (a) VALUES (1)"))
            .await
            .unwrap();
        assert_eq!(result.unwrap(), 1);
        drop(guard);
        assert!(shared.try_lock().is_ok());
    }
}
