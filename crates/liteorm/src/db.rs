//! The database session: connection, table registry and transaction entry point.

use crate::config::DbConfig;
use crate::error::{OrmError, OrmResult};
use crate::executor::{
    Executor, discard_abandoned, exec_all_on, exec_on, in_transaction, query_on, run_blocking,
};
use crate::logging::SqlLogger;
use crate::schema::{Entity, Schema};
use crate::table::Table;
use crate::transaction::Transaction;
use crate::value::Record;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A SQLite database with its registered tables.
///
/// Cloning is cheap and shares the connection; tables registered on one
/// clone afterwards are not seen by the others.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    config: DbConfig,
    logger: SqlLogger,
    tables: Vec<(String, Table)>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field(
                "tables",
                &self.tables.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the configured database and apply its pragmas.
    pub fn open(config: DbConfig) -> OrmResult<Self> {
        config.validate()?;
        let conn = match &config.path {
            Some(path) if !config.is_memory() => Connection::open(path)?,
            _ => Connection::open_in_memory()?,
        };
        configure(&conn, &config)?;

        tracing::info!(
            target: "liteorm",
            path = ?config.path,
            wal = config.wal_mode,
            "opened database"
        );

        let logger = SqlLogger::new().max_sql_length(config.max_sql_log_length);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
            logger,
            tables: Vec::new(),
        })
    }

    pub fn open_in_memory() -> OrmResult<Self> {
        Self::open(DbConfig::in_memory())
    }

    /// Open, register every schema under its table name, and create the tables.
    pub async fn init(config: DbConfig, schemas: impl IntoIterator<Item = Schema>) -> OrmResult<Self> {
        let mut db = Self::open(config)?;
        for schema in schemas {
            db.register(schema)?;
        }
        db.create_tables().await?;
        Ok(db)
    }

    /// Replace the SQL logger (level, truncation).
    pub fn with_logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Register a table under its own name.
    pub fn register(&mut self, schema: Schema) -> OrmResult<&Table> {
        let key = schema.name().as_str().to_string();
        self.register_as(key, schema)
    }

    /// Register a table under a logical name that may differ from the table name.
    pub fn register_as(&mut self, key: impl Into<String>, schema: Schema) -> OrmResult<&Table> {
        let key = key.into();
        if self.tables.iter().any(|(k, _)| *k == key) {
            return Err(OrmError::config(format!("table '{key}' is already registered")));
        }
        if let Some((other, _)) = self
            .tables
            .iter()
            .find(|(_, t)| t.name() == schema.name().as_str())
        {
            return Err(OrmError::config(format!(
                "table name '{}' is already registered as '{other}'",
                schema.name()
            )));
        }
        tracing::info!(
            target: "liteorm",
            key = %key,
            table = %schema.name(),
            columns = schema.columns().len(),
            "registered table"
        );
        self.tables.push((key, Table::new(schema)));
        let (_, table) = &self.tables[self.tables.len() - 1];
        Ok(table)
    }

    pub fn register_entity<E: Entity>(&mut self) -> OrmResult<&Table> {
        self.register(E::schema()?)
    }

    /// Look up a registered table by logical name.
    pub fn table(&self, key: &str) -> OrmResult<&Table> {
        self.tables
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t)
            .ok_or_else(|| OrmError::validation(format!("unknown table '{key}'")))
    }

    /// Registered tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().map(|(_, t)| t)
    }

    pub async fn create_tables(&self) -> OrmResult<()> {
        let statements: Vec<String> = self.tables().map(Table::create_table_sql).collect();
        if !statements.is_empty() {
            self.exec_all(&statements).await?;
        }
        Ok(())
    }

    pub async fn drop_tables(&self) -> OrmResult<()> {
        let statements: Vec<String> = self.tables().map(Table::drop_table_sql).collect();
        if !statements.is_empty() {
            self.exec_all(&statements).await?;
        }
        Ok(())
    }

    pub(crate) async fn lock_owned(&self) -> OwnedMutexGuard<Connection> {
        self.conn.clone().lock_owned().await
    }

    /// Run `f` in an ad hoc transaction on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> OrmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> OrmResult<T> + Send + 'static,
    {
        let (_conn, result) = run_blocking(self.lock_owned().await, move |c| {
            discard_abandoned(c)?;
            in_transaction(c, f)
        })
        .await?;
        result
    }

    /// Begin an explicit transaction. It holds the connection until it is
    /// committed, rolled back or dropped.
    pub async fn transaction(&self) -> OrmResult<Transaction<'_>> {
        Transaction::begin(self.lock_owned().await, &self.logger).await
    }
}

fn configure(conn: &Connection, config: &DbConfig) -> OrmResult<()> {
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    if config.wal_mode && !config.is_memory() {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    Ok(())
}

impl Executor for Database {
    async fn exec(&self, sql: &str) -> OrmResult<u64> {
        self.logger.statement("auto", sql);
        let sql = sql.to_owned();
        self.blocking(move |c| exec_on(c, &sql)).await
    }

    async fn exec_all(&self, statements: &[String]) -> OrmResult<u64> {
        for sql in statements {
            self.logger.statement("auto", sql);
        }
        let statements = statements.to_vec();
        self.blocking(move |c| exec_all_on(c, &statements)).await
    }

    async fn query(&self, sql: &str) -> OrmResult<Vec<Record>> {
        self.logger.statement("auto", sql);
        let sql = sql.to_owned();
        self.blocking(move |c| query_on(c, &sql)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn schema(name: &str) -> Schema {
        Schema::builder(name)
            .primary("id", ColumnType::Integer)
            .build()
            .unwrap()
    }

    #[test]
    fn register_keeps_order_and_rejects_duplicates() {
        let mut db = Database::open_in_memory().unwrap();
        db.register(schema("b")).unwrap();
        db.register(schema("a")).unwrap();
        let names: Vec<_> = db.tables().map(Table::name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(db.register(schema("a")).unwrap_err().is_config());
        assert!(db.register_as("alias", schema("a")).unwrap_err().is_config());
    }

    #[test]
    fn unknown_table_is_validation_error() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.table("nope"), Err(OrmError::Validation(_))));
    }

    #[test]
    fn register_as_uses_logical_name() {
        let mut db = Database::open_in_memory().unwrap();
        db.register_as("people", schema("Person")).unwrap();
        assert_eq!(db.table("people").unwrap().name(), "Person");
        assert!(db.table("Person").is_err());
    }

    #[tokio::test]
    async fn init_creates_tables() {
        let db = Database::init(DbConfig::in_memory(), [schema("t1"), schema("t2")])
            .await
            .unwrap();
        let rows = db
            .query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .await
            .unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.try_get("name").unwrap()).collect();
        assert_eq!(names, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn failed_call_leaves_no_transaction_open() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.exec("INSERT INTO missing VALUES (1)").await.is_err());
        db.exec("CREATE TABLE t (a INTEGER)").await.unwrap();
        assert_eq!(db.exec("INSERT INTO t VALUES (1)").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_deferred_key_check_leaves_no_transaction_open() {
        let db = Database::open_in_memory().unwrap();
        db.exec_all(&[
            "CREATE TABLE p (id INTEGER PRIMARY KEY)".to_string(),
            "CREATE TABLE c (pid INTEGER REFERENCES p(id) DEFERRABLE INITIALLY DEFERRED)"
                .to_string(),
        ])
        .await
        .unwrap();

        let err = db.exec("INSERT INTO c VALUES (99)").await.unwrap_err();
        assert!(err.is_constraint_violation(), "{err}");
        assert_eq!(db.exec("INSERT INTO p VALUES (1)").await.unwrap(), 1);
        assert!(db.query("SELECT pid FROM c").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_calls_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        db.exec("CREATE TABLE t (a INTEGER)").await.unwrap();
        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let db = db.clone();
                tokio::spawn(async move { db.exec(&format!("INSERT INTO t VALUES ({n})")).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }
        assert_eq!(db.query("SELECT a FROM t").await.unwrap().len(), 8);
    }
}
