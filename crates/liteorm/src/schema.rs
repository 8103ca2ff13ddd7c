//! Column metadata and the per-table column registry.
//!
//! A [`Schema`] is the explicit descriptor of one record type: its table name
//! and, for each declared field, either a [`ColumnInfo`] or nothing (a
//! transient field that is never persisted). It is validated once when built
//! and is immutable afterwards.
//!
//! # Example
//!
//! ```
//! use liteorm::{ColumnInfo, ColumnType, Schema};
//!
//! let schema = Schema::builder("Person")
//!     .primary("id", ColumnType::Integer)
//!     .column("name", ColumnInfo::sized(ColumnType::NVarChar, 50))
//!     .column("active", ColumnInfo::new(ColumnType::Boolean))
//!     .transient("display_name")
//!     .build()?;
//!
//! assert_eq!(
//!     schema.create_table_sql(),
//!     r#"CREATE TABLE IF NOT EXISTS "Person" ("id" INTEGER PRIMARY KEY, "name" NVARCHAR(50), "active" BOOLEAN NOT NULL CHECK ("active" IN (0,1)))"#
//! );
//! # Ok::<(), liteorm::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    NVarChar,
    Char,
    Boolean,
    Decimal,
    /// Stored as INTEGER seconds since the epoch.
    DateTime,
    Money,
}

impl ColumnType {
    /// All declared types, in declaration order.
    pub const ALL: [ColumnType; 7] = [
        ColumnType::Integer,
        ColumnType::NVarChar,
        ColumnType::Char,
        ColumnType::Boolean,
        ColumnType::Decimal,
        ColumnType::DateTime,
        ColumnType::Money,
    ];

    /// The declared type name.
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::NVarChar => "NVARCHAR",
            ColumnType::Char => "CHAR",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Money => "MONEY",
        }
    }

    /// Whether a primary key may use this type.
    pub fn is_primary_eligible(self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::NVarChar | ColumnType::Char
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnType {
    type Err = OrmError;

    fn from_str(s: &str) -> OrmResult<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| OrmError::config(format!("unknown column type: {s}")))
    }
}

/// Metadata for one persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub ty: ColumnType,
    pub size: Option<u32>,
    pub primary: bool,
}

impl ColumnInfo {
    pub const fn new(ty: ColumnType) -> Self {
        Self {
            ty,
            size: None,
            primary: false,
        }
    }

    pub const fn sized(ty: ColumnType, size: u32) -> Self {
        Self {
            ty,
            size: Some(size),
            primary: false,
        }
    }

    pub const fn primary(ty: ColumnType) -> Self {
        Self {
            ty,
            size: None,
            primary: true,
        }
    }

    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub const fn as_primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// A registered column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: Ident,
    pub info: ColumnInfo,
}

/// Render one `CREATE TABLE` column clause.
pub fn column_ddl(name: &Ident, info: &ColumnInfo) -> String {
    let quoted = name.to_sql();
    let size = match info.size {
        Some(n) if !(info.primary && info.ty == ColumnType::Integer) => format!("({n})"),
        _ => String::new(),
    };
    let ty = match info.ty {
        ColumnType::Boolean => format!("BOOLEAN NOT NULL CHECK ({quoted} IN (0,1))"),
        ColumnType::DateTime => "INTEGER".to_string(),
        other => format!("{}{size}", other.name()),
    };
    if info.primary {
        format!("{quoted} {ty} PRIMARY KEY")
    } else {
        format!("{quoted} {ty}")
    }
}

/// Immutable column registry for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: Ident,
    columns: Vec<Column>,
    transient: Vec<String>,
}

impl Schema {
    /// Start declaring a table.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &Ident {
        &self.name
    }

    /// Persisted columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.as_str() == name)
            .map(|c| &c.info)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.ty)
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.info.primary)
    }

    /// Fields declared without column metadata.
    pub fn transient_fields(&self) -> &[String] {
        &self.transient
    }

    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| column_ddl(&c.name, &c.info))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name.to_sql(),
            columns.join(", ")
        )
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name.to_sql())
    }
}

/// Builder for [`Schema`]; validation happens in [`SchemaBuilder::build`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<(String, Option<ColumnInfo>)>,
}

impl SchemaBuilder {
    /// Declare a persisted column.
    pub fn column(mut self, name: impl Into<String>, info: ColumnInfo) -> Self {
        self.fields.push((name.into(), Some(info)));
        self
    }

    /// Declare the primary-key column.
    pub fn primary(self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.column(name, ColumnInfo::primary(ty))
    }

    /// Declare a field that has no column.
    pub fn transient(mut self, name: impl Into<String>) -> Self {
        self.fields.push((name.into(), None));
        self
    }

    pub fn build(self) -> OrmResult<Schema> {
        let name = Ident::new(self.name)?;
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        let mut transient = Vec::new();
        let mut primary: Option<String> = None;

        for (field, info) in self.fields {
            if !seen.insert(field.clone()) {
                return Err(OrmError::config(format!(
                    "duplicate field '{field}' in table '{name}'"
                )));
            }
            let Some(info) = info else {
                transient.push(field);
                continue;
            };
            if info.size == Some(0) {
                return Err(OrmError::config(format!(
                    "column '{field}' in table '{name}' has size 0"
                )));
            }
            if info.primary {
                if let Some(existing) = &primary {
                    return Err(OrmError::config(format!(
                        "table '{name}' declares more than one primary key ('{existing}', '{field}')"
                    )));
                }
                if !info.ty.is_primary_eligible() {
                    return Err(OrmError::config(format!(
                        "primary key '{field}' in table '{name}' cannot be {}",
                        info.ty
                    )));
                }
                primary = Some(field.clone());
            }
            columns.push(Column {
                name: Ident::new(field)?,
                info,
            });
        }

        if columns.is_empty() {
            return Err(OrmError::config(format!(
                "table '{name}' declares no persisted columns"
            )));
        }

        Ok(Schema {
            name,
            columns,
            transient,
        })
    }
}

/// A record type with a static schema descriptor.
pub trait Entity {
    fn schema() -> OrmResult<Schema>;
}
