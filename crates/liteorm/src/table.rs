//! Per-table statement builder and row mapper.
//!
//! A [`Table`] owns the [`Schema`] of one record type. Every statement has a
//! pure `*_sql` renderer and an async operation that runs it on any
//! [`Executor`].
//!
//! ```
//! use liteorm::{ColumnInfo, ColumnType, Condition, Order, Schema, Select, Table};
//!
//! let people = Table::new(
//!     Schema::builder("people")
//!         .primary("id", ColumnType::Integer)
//!         .column("name", ColumnInfo::sized(ColumnType::NVarChar, 50))
//!         .build()?,
//! );
//!
//! let sql = people.select_sql(
//!     &Select::new()
//!         .filter(|c| c.starts_with([("name", "Jo")]))
//!         .order_by("name", Order::Asc)
//!         .limit(10),
//! );
//! assert_eq!(
//!     sql,
//!     r#"SELECT "id", "name" FROM "people" WHERE name LIKE 'Jo%' ORDER BY "name" ASC LIMIT 10"#
//! );
//! # Ok::<(), liteorm::OrmError>(())
//! ```

use crate::coerce::{from_result_cell, to_literal, to_storage_literal};
use crate::condition::Condition;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::ident::quote;
use crate::schema::{ColumnType, Entity, Schema};
use crate::value::{FromRecord, IntoRecord, Operand, Record, Value};
use std::fmt;
use std::sync::Arc;

/// SQLite's default `SQLITE_MAX_COMPOUND_SELECT`.
pub const MAX_COMPOUND_SELECT: usize = 500;

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        })
    }
}

/// A SELECT description: filter, projected fields, ordering and paging.
#[derive(Debug, Clone, Default)]
pub struct Select {
    condition: Option<Condition>,
    fields: Vec<String>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the WHERE clause with a callback.
    pub fn filter(self, f: impl FnOnce(Condition) -> Condition) -> Self {
        self.condition(f(Condition::new()))
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = if condition.is_empty() {
            None
        } else {
            Some(condition)
        };
        self
    }

    /// Project these columns. `*` expands to every registered column.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl From<Condition> for Select {
    fn from(condition: Condition) -> Self {
        Select::new().condition(condition)
    }
}

/// Statement builder for one registered table.
#[derive(Debug, Clone)]
pub struct Table {
    schema: Arc<Schema>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn from_arc(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn for_entity<E: Entity>() -> OrmResult<Self> {
        Ok(Self::new(E::schema()?))
    }

    pub fn name(&self) -> &str {
        self.schema.name().as_str()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn quoted_name(&self) -> String {
        self.schema.name().to_sql()
    }

    fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.schema.column_type(column)
    }

    fn where_clause(&self, condition: Option<&Condition>) -> String {
        match condition {
            Some(c) if !c.is_empty() => format!(" WHERE {}", c.render(Some(&self.schema))),
            _ => String::new(),
        }
    }

    /// A projected column, with DATETIME cast back to its stored integer.
    fn projection(&self, column: &str) -> String {
        let quoted = quote(column);
        if self.column_type(column) == Some(ColumnType::DateTime) {
            format!("CAST({quoted} AS INTEGER) AS {quoted}")
        } else {
            quoted
        }
    }

    fn all_columns(&self) -> Vec<String> {
        self.schema
            .columns()
            .iter()
            .map(|c| self.projection(c.name.as_str()))
            .collect()
    }

    // ─── SQL renderers ──────────────────────────────────────────────────────

    pub fn create_table_sql(&self) -> String {
        self.schema.create_table_sql()
    }

    pub fn drop_table_sql(&self) -> String {
        self.schema.drop_table_sql()
    }

    /// `INSERT [OR REPLACE] INTO`. An empty record inserts default values.
    pub fn insert_sql(&self, record: &Record, replace: bool) -> String {
        let verb = if replace {
            "INSERT OR REPLACE INTO"
        } else {
            "INSERT INTO"
        };
        if record.is_empty() {
            return format!("{verb} {} DEFAULT VALUES", self.quoted_name());
        }
        let mut columns = Vec::with_capacity(record.len());
        let mut values = Vec::with_capacity(record.len());
        for (col, val) in record.iter() {
            columns.push(quote(col));
            values.push(to_literal(self.column_type(col), &Operand::Literal(val.clone())));
        }
        format!(
            "{verb} {} ({}) VALUES ({})",
            self.quoted_name(),
            columns.join(", "),
            values.join(", ")
        )
    }

    /// One `INSERT ... SELECT ... UNION ALL SELECT ...` per chunk of
    /// [`MAX_COMPOUND_SELECT`] records. The column list is the union of the
    /// records' keys in first-seen order; missing keys render `null`.
    pub fn insert_many_sql(&self, records: &[Record]) -> OrmResult<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let mut columns: Vec<&str> = Vec::new();
        for record in records {
            for col in record.columns() {
                if !columns.contains(&col) {
                    columns.push(col);
                }
            }
        }
        if columns.is_empty() {
            return Err(OrmError::validation(format!(
                "insert_many into '{}' needs at least one column",
                self.name()
            )));
        }

        let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
        let column_list = column_list.join(", ");
        let statements = records
            .chunks(MAX_COMPOUND_SELECT)
            .map(|chunk| {
                let rows: Vec<String> = chunk
                    .iter()
                    .map(|record| {
                        let values: Vec<String> = columns
                            .iter()
                            .map(|col| {
                                let value = record.get(col).cloned().unwrap_or(Value::Null);
                                to_literal(self.column_type(col), &Operand::Literal(value))
                            })
                            .collect();
                        format!("SELECT {}", values.join(", "))
                    })
                    .collect();
                format!(
                    "INSERT INTO {} ({column_list}) {}",
                    self.quoted_name(),
                    rows.join(" UNION ALL ")
                )
            })
            .collect();
        Ok(statements)
    }

    pub fn select_sql(&self, select: &Select) -> String {
        let mut fields = Vec::new();
        if select.fields.is_empty() {
            fields = self.all_columns();
        } else {
            for field in &select.fields {
                if field == "*" {
                    fields.extend(self.all_columns());
                } else {
                    fields.push(self.projection(field));
                }
            }
        }

        let mut sql = format!(
            "SELECT {} FROM {}{}",
            fields.join(", "),
            self.quoted_name(),
            self.where_clause(select.condition.as_ref())
        );
        if !select.order.is_empty() {
            let terms: Vec<String> = select
                .order
                .iter()
                .map(|(col, order)| format!("{} {order}", quote(col)))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        match (select.limit, select.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        sql
    }

    pub fn count_sql(&self, condition: Option<&Condition>) -> String {
        format!(
            "SELECT COUNT(*) AS \"count\" FROM {}{}",
            self.quoted_name(),
            self.where_clause(condition)
        )
    }

    pub fn update_sql<I, K, V>(&self, set: I, condition: Option<&Condition>) -> OrmResult<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        let assignments: Vec<String> = set
            .into_iter()
            .map(|(col, val)| {
                let col = col.into();
                let literal = to_literal(self.column_type(&col), &val.into());
                format!("{} = {literal}", quote(&col))
            })
            .collect();
        if assignments.is_empty() {
            return Err(OrmError::validation(format!(
                "update of '{}' has nothing to set",
                self.name()
            )));
        }
        Ok(format!(
            "UPDATE {} SET {}{}",
            self.quoted_name(),
            assignments.join(", "),
            self.where_clause(condition)
        ))
    }

    pub fn delete_sql(&self, condition: &Condition) -> OrmResult<String> {
        if condition.is_empty() {
            return Err(OrmError::validation(format!(
                "delete from '{}' requires a condition",
                self.name()
            )));
        }
        Ok(format!(
            "DELETE FROM {}{}",
            self.quoted_name(),
            self.where_clause(Some(condition))
        ))
    }

    /// The query whose rows [`Table::backup_sql_from_rows`] serializes.
    pub fn backup_select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY rowid",
            self.all_columns().join(", "),
            self.quoted_name()
        )
    }

    /// One multi-row `INSERT ... VALUES (...), (...);` in stored form, or an
    /// empty string for no rows.
    pub fn backup_sql_from_rows(&self, rows: &[Record]) -> String {
        if rows.is_empty() {
            return String::new();
        }
        let columns = self.schema.columns();
        let column_list: Vec<String> = columns.iter().map(|c| c.name.to_sql()).collect();
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let value = row.get(c.name.as_str()).unwrap_or(&Value::Null);
                        to_storage_literal(Some(c.info.ty), value)
                    })
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {};",
            self.quoted_name(),
            column_list.join(", "),
            tuples.join(", ")
        )
    }

    /// Convert a raw row into native values by declared column type.
    pub fn map_row(&self, raw: Record) -> OrmResult<Record> {
        raw.into_iter()
            .map(|(col, value)| {
                let value = from_result_cell(&col, self.column_type(&col), value)?;
                Ok((col, value))
            })
            .collect()
    }

    // ─── Operations ─────────────────────────────────────────────────────────

    pub async fn create_table(&self, exec: &impl Executor) -> OrmResult<()> {
        exec.exec(&self.create_table_sql()).await?;
        Ok(())
    }

    pub async fn drop_table(&self, exec: &impl Executor) -> OrmResult<()> {
        exec.exec(&self.drop_table_sql()).await?;
        Ok(())
    }

    pub async fn insert(&self, exec: &impl Executor, record: impl IntoRecord) -> OrmResult<u64> {
        exec.exec(&self.insert_sql(&record.into_record(), false)).await
    }

    /// Insert, replacing an existing row on primary-key conflict.
    pub async fn upsert(&self, exec: &impl Executor, record: impl IntoRecord) -> OrmResult<u64> {
        exec.exec(&self.insert_sql(&record.into_record(), true)).await
    }

    /// Insert every record as one unit. Empty input is a no-op.
    pub async fn insert_many<R: IntoRecord>(
        &self,
        exec: &impl Executor,
        records: impl IntoIterator<Item = R>,
    ) -> OrmResult<u64> {
        let records: Vec<Record> = records.into_iter().map(IntoRecord::into_record).collect();
        let statements = self.insert_many_sql(&records)?;
        match statements.len() {
            0 => Ok(0),
            1 => exec.exec(&statements[0]).await,
            _ => exec.exec_all(&statements).await,
        }
    }

    /// All matching rows. Fails on the first row that cannot be mapped.
    pub async fn select(
        &self,
        exec: &impl Executor,
        select: impl Into<Select>,
    ) -> OrmResult<Vec<Record>> {
        let rows = exec.query(&self.select_sql(&select.into())).await?;
        rows.into_iter().map(|row| self.map_row(row)).collect()
    }

    /// Like [`Table::select`], but maps each row independently.
    pub async fn select_each(
        &self,
        exec: &impl Executor,
        select: impl Into<Select>,
    ) -> OrmResult<Vec<OrmResult<Record>>> {
        let rows = exec.query(&self.select_sql(&select.into())).await?;
        Ok(rows.into_iter().map(|row| self.map_row(row)).collect())
    }

    /// The first matching row, if any.
    pub async fn select_one(
        &self,
        exec: &impl Executor,
        select: impl Into<Select>,
    ) -> OrmResult<Option<Record>> {
        let sql = self.select_sql(&select.into().limit(1));
        exec.single(&sql)
            .await?
            .map(|row| self.map_row(row))
            .transpose()
    }

    pub async fn select_as<T: FromRecord>(
        &self,
        exec: &impl Executor,
        select: impl Into<Select>,
    ) -> OrmResult<Vec<T>> {
        self.select(exec, select)
            .await?
            .iter()
            .map(T::from_record)
            .collect()
    }

    pub async fn select_one_as<T: FromRecord>(
        &self,
        exec: &impl Executor,
        select: impl Into<Select>,
    ) -> OrmResult<Option<T>> {
        self.select_one(exec, select)
            .await?
            .as_ref()
            .map(T::from_record)
            .transpose()
    }

    pub async fn count(&self, exec: &impl Executor, condition: Option<&Condition>) -> OrmResult<i64> {
        let row = exec.single(&self.count_sql(condition)).await?;
        match row {
            Some(row) => row.try_get("count"),
            None => Err(OrmError::not_found(format!("no count row for '{}'", self.name()))),
        }
    }

    /// Whether any row matches.
    pub async fn any(&self, exec: &impl Executor, condition: Option<&Condition>) -> OrmResult<bool> {
        Ok(self.count(exec, condition).await? > 0)
    }

    pub async fn update<I, K, V>(
        &self,
        exec: &impl Executor,
        set: I,
        condition: Option<&Condition>,
    ) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        exec.exec(&self.update_sql(set, condition)?).await
    }

    pub async fn delete(&self, exec: &impl Executor, condition: &Condition) -> OrmResult<u64> {
        exec.exec(&self.delete_sql(condition)?).await
    }

    /// Every row of the table as one replayable INSERT statement.
    pub async fn build_backup_sql(&self, exec: &impl Executor) -> OrmResult<String> {
        let rows = exec.query(&self.backup_select_sql()).await?;
        Ok(self.backup_sql_from_rows(&rows))
    }
}
