//! # liteorm
//!
//! A small schema-first data layer for embedded SQLite.
//!
//! ## Features
//!
//! - **Schema descriptors**: declare typed columns once; DDL and value
//!   coercion follow from the declaration
//! - **Condition builder**: chained predicates with implicit `AND`, explicit
//!   `OR` and nested groups
//! - **Statement builder**: select/insert/insert-many/upsert/update/delete/count
//!   per table, each with a pure `*_sql` renderer
//! - **Transaction-friendly**: pass a [`Transaction`] anywhere an [`Executor`]
//!   is expected
//! - **Safe defaults**: DELETE requires a condition, UPDATE requires SET
//! - **Backups**: text dumps of every table as replayable INSERTs, and
//!   timestamped copies of the database file
//!
//! ## Example
//!
//! ```
//! use liteorm::{ColumnInfo, ColumnType, Condition, Database, DbConfig, Record, Schema, Select};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> liteorm::OrmResult<()> {
//! let person = Schema::builder("Person")
//!     .primary("id", ColumnType::Integer)
//!     .column("name", ColumnInfo::sized(ColumnType::NVarChar, 50))
//!     .column("active", ColumnInfo::new(ColumnType::Boolean))
//!     .build()?;
//!
//! let db = Database::init(DbConfig::in_memory(), [person]).await?;
//! let people = db.table("Person")?;
//!
//! people
//!     .insert(&db, Record::new().with("id", 1).with("name", "Ada").with("active", true))
//!     .await?;
//!
//! let active = people
//!     .select(&db, Select::new().filter(|c| c.equals([("active", true)])))
//!     .await?;
//! assert_eq!(active[0].try_get::<String>("name")?, "Ada");
//! assert!(people.any(&db, Some(&Condition::new().equals([("id", 1)]))).await?);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod coerce;
pub mod condition;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod ident;
pub mod logging;
pub mod schema;
pub mod table;
pub mod transaction;
pub mod transport;
pub mod value;

pub use backup::{BackupOutcome, FragmentFailure, ImportReport};
pub use condition::Condition;
pub use config::DbConfig;
pub use db::Database;
pub use error::{OrmError, OrmResult};
pub use executor::Executor;
pub use ident::Ident;
pub use logging::SqlLogger;
pub use schema::{Column, ColumnInfo, ColumnType, Entity, Schema, SchemaBuilder};
pub use table::{Order, Select, Table};
pub use transaction::{Savepoint, Transaction};
pub use transport::{BackupState, BackupTransport, Delivery, FsTransport};
pub use value::{FromRecord, FromValue, IntoRecord, Operand, Record, Value};

#[doc(hidden)]
pub use transaction::__next_savepoint_name;
