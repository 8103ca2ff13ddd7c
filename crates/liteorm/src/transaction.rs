//! Explicit transactions, savepoints and the `transaction!` / `savepoint!` macros.
//!
//! Outside a transaction every [`Executor`] call on a [`Database`] runs in its
//! own ad hoc BEGIN/COMMIT. To group calls, open a [`Transaction`] and pass it
//! wherever an executor is expected:
//!
//! ```
//! use liteorm::{ColumnType, Database, OrmResult, Record, Schema};
//!
//! # async fn demo() -> OrmResult<()> {
//! let mut db = Database::open_in_memory()?;
//! let people = db
//!     .register(Schema::builder("people").primary("id", ColumnType::Integer).build()?)?
//!     .clone();
//! people.create_table(&db).await?;
//!
//! liteorm::transaction!(db, tx, {
//!     people.insert(&tx, Record::new().with("id", 1)).await?;
//!     people.insert(&tx, Record::new().with("id", 2)).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```
//!
//! While a transaction is open it owns the connection; calling the
//! `Database` itself from the same task waits until the transaction ends.
//!
//! [`Database`]: crate::Database

use crate::error::{OrmError, OrmResult};
use crate::executor::{
    Executor, discard_abandoned, exec_all_on, exec_on, in_savepoint, query_on, rollback_after,
    run_blocking,
};
use crate::ident::quote;
use crate::logging::SqlLogger;
use crate::value::Record;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Global counter for anonymous savepoint naming.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$db.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `liteorm::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($db:expr, $tx:ident, $body:block) => {{
        let $tx = ($db).transaction().await?;

        let __liteorm_tx_body_result: $crate::OrmResult<_> = async { $body }.await;
        match __liteorm_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the given block inside a savepoint of an open transaction.
///
/// Releases on `Ok(_)` and rolls back to the savepoint on `Err(_)`, leaving
/// the enclosing transaction usable either way.
#[macro_export]
macro_rules! savepoint {
    ($tx:expr, $name:expr, $sp:ident, $body:block) => {{
        let $sp = ($tx).savepoint($name).await?;

        let __liteorm_sp_body_result: $crate::OrmResult<_> = async { $body }.await;
        match __liteorm_sp_body_result {
            Ok(value) => {
                $sp.release().await?;
                Ok(value)
            }
            Err(error) => match $sp.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Other(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
    ($tx:expr, $sp:ident, $body:block) => {{
        let __liteorm_sp_name = $crate::__next_savepoint_name();
        $crate::savepoint!($tx, &__liteorm_sp_name, $sp, $body)
    }};
}

/// Generate a unique anonymous savepoint name.
#[doc(hidden)]
pub fn __next_savepoint_name() -> String {
    let n = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("liteorm_sp_{n}")
}

/// An open transaction holding the connection exclusively.
///
/// Dropping it without calling [`Transaction::commit`] rolls back.
pub struct Transaction<'db> {
    /// Empty while a statement runs on the blocking pool, or after that task was lost.
    conn: Mutex<Option<OwnedMutexGuard<Connection>>>,
    logger: &'db SqlLogger,
    finished: bool,
}

impl<'db> Transaction<'db> {
    pub(crate) async fn begin(
        conn: OwnedMutexGuard<Connection>,
        logger: &'db SqlLogger,
    ) -> OrmResult<Self> {
        logger.statement("tx", "BEGIN");
        let (conn, result) = run_blocking(conn, |c| {
            discard_abandoned(c)?;
            Ok(c.execute_batch("BEGIN")?)
        })
        .await?;
        result?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            logger,
            finished: false,
        })
    }

    async fn run<T, F>(&self, sql: &str, f: F) -> OrmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> OrmResult<T> + Send + 'static,
    {
        self.logger.statement("tx", sql);
        self.with_conn(f).await
    }

    /// Lend the connection to `f` on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> OrmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> OrmResult<T> + Send + 'static,
    {
        let mut slot = self.conn.lock().await;
        let conn = slot
            .take()
            .ok_or_else(|| OrmError::Other("transaction connection was lost".to_string()))?;
        let (conn, result) = run_blocking(conn, f).await?;
        *slot = Some(conn);
        result
    }

    /// Commit the transaction. A failed commit is rolled back before the
    /// error is returned.
    pub async fn commit(mut self) -> OrmResult<()> {
        let result = self
            .run("COMMIT", |c| {
                c.execute_batch("COMMIT")
                    .map_err(|e| rollback_after(c, e.into()))
            })
            .await;
        self.finished = true;
        result
    }

    pub async fn rollback(mut self) -> OrmResult<()> {
        self.run("ROLLBACK", |c| Ok(c.execute_batch("ROLLBACK")?))
            .await?;
        self.finished = true;
        Ok(())
    }

    /// Open a named savepoint inside this transaction.
    pub async fn savepoint(&self, name: &str) -> OrmResult<Savepoint<'_, 'db>> {
        if name.is_empty() {
            return Err(OrmError::validation("savepoint name must not be empty"));
        }
        let name = quote(name);
        let sql = format!("SAVEPOINT {name}");
        self.logger.statement("tx", &sql);
        self.with_conn(move |c| Ok(c.execute_batch(&sql)?)).await?;
        Ok(Savepoint {
            tx: self,
            name,
            finished: false,
        })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(conn) = self.conn.get_mut().take() else {
            return;
        };
        if conn.is_autocommit() {
            return;
        }
        let rollback = move || {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(target: "liteorm.sql", error = %e, "rollback of dropped transaction failed");
            }
        };
        // The guard moves with the rollback, so the next caller waits for it.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => drop(handle.spawn_blocking(rollback)),
            Err(_) => rollback(),
        }
    }
}

impl Executor for Transaction<'_> {
    async fn exec(&self, sql: &str) -> OrmResult<u64> {
        let owned = sql.to_owned();
        self.run(sql, move |c| exec_on(c, &owned)).await
    }

    async fn exec_all(&self, statements: &[String]) -> OrmResult<u64> {
        let name = quote(&__next_savepoint_name());
        self.logger.statement("tx", &format!("SAVEPOINT {name}"));
        for sql in statements {
            self.logger.statement("tx", sql);
        }
        let statements = statements.to_vec();
        self.with_conn(move |c| in_savepoint(c, &name, |c| exec_all_on(c, &statements)))
            .await
    }

    async fn query(&self, sql: &str) -> OrmResult<Vec<Record>> {
        let owned = sql.to_owned();
        self.run(sql, move |c| query_on(c, &owned)).await
    }
}

/// A savepoint inside a [`Transaction`].
///
/// Dropping it without [`Savepoint::release`] rolls back to the savepoint.
pub struct Savepoint<'tx, 'db> {
    tx: &'tx Transaction<'db>,
    name: String,
    finished: bool,
}

impl Savepoint<'_, '_> {
    pub async fn release(mut self) -> OrmResult<()> {
        self.finished = true;
        let sql = format!("RELEASE {}", self.name);
        self.tx.logger.statement("tx", &sql);
        self.tx.with_conn(move |c| Ok(c.execute_batch(&sql)?)).await
    }

    /// Undo everything since the savepoint was opened and discard it.
    pub async fn rollback(mut self) -> OrmResult<()> {
        self.finished = true;
        let sql = format!("ROLLBACK TO {0}; RELEASE {0}", self.name);
        self.tx.logger.statement("tx", &sql);
        self.tx.with_conn(move |c| Ok(c.execute_batch(&sql)?)).await
    }
}

impl Drop for Savepoint<'_, '_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let sql = format!("ROLLBACK TO {0}; RELEASE {0}", self.name);
        let result = match self.tx.conn.try_lock() {
            Ok(slot) => match slot.as_ref() {
                Some(conn) => conn.execute_batch(&sql).map_err(|e| e.to_string()),
                None => Err("transaction connection was lost".to_string()),
            },
            Err(_) => Err("transaction is busy".to_string()),
        };
        if let Err(error) = result {
            tracing::warn!(target: "liteorm.sql", %error, "rollback of dropped savepoint failed");
        }
    }
}

impl Executor for Savepoint<'_, '_> {
    async fn exec(&self, sql: &str) -> OrmResult<u64> {
        self.tx.exec(sql).await
    }

    async fn exec_all(&self, statements: &[String]) -> OrmResult<u64> {
        self.tx.exec_all(statements).await
    }

    async fn query(&self, sql: &str) -> OrmResult<Vec<Record>> {
        self.tx.query(sql).await
    }
}
