//! `liteorm.toml`: database settings plus declared table schemas.
//!
//! ```toml
//! [database]
//! path = "${APP_DATA}/shop.db"
//! app_name = "Shop"
//! backup_dir = "backups"
//!
//! [[tables]]
//! name = "Person"
//! columns = [
//!   { name = "id", type = "INTEGER", primary = true },
//!   { name = "name", type = "NVARCHAR", size = 50 },
//! ]
//! ```

use liteorm::{ColumnInfo, ColumnType, DbConfig, Schema};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            anyhow::anyhow!("failed to read config file {}: {e}", config_path.display())
        })?;

        let mut project = Self::from_toml_str(&raw).map_err(|e| {
            anyhow::anyhow!("invalid config file {}: {e:#}", config_path.display())
        })?;
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        project.file.database.resolve_relative(base);
        Ok(project)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.database.expand_env()?;
        file.validate()?;
        Ok(Self { file })
    }

    pub fn schemas(&self) -> anyhow::Result<Vec<Schema>> {
        self.file.tables.iter().map(TableConfig::schema).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DbConfig,

    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl ConfigFile {
    fn validate(&self) -> anyhow::Result<()> {
        self.database.validate()?;

        let mut seen = HashSet::new();
        for table in &self.tables {
            if table.name.trim().is_empty() {
                anyhow::bail!("tables[].name must not be empty");
            }
            if !seen.insert(table.name.as_str()) {
                anyhow::bail!("duplicate table: {}", table.name);
            }
            if table.columns.is_empty() {
                anyhow::bail!("table {} declares no columns", table.name);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    pub name: String,
    pub columns: Vec<ColumnConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub size: Option<u32>,
    #[serde(default)]
    pub primary: bool,
}

impl TableConfig {
    pub fn schema(&self) -> anyhow::Result<Schema> {
        let mut builder = Schema::builder(&self.name);
        for column in &self.columns {
            let ty: ColumnType = column.ty.parse().map_err(|e| {
                anyhow::anyhow!("table {} column {}: {e}", self.name, column.name)
            })?;
            builder = builder.column(
                &column.name,
                ColumnInfo {
                    ty,
                    size: column.size,
                    primary: column.primary,
                },
            );
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[database]
path = "shop.db"
app_name = "Shop"

[[tables]]
name = "Person"
columns = [
  { name = "id", type = "integer", primary = true },
  { name = "name", type = "NVARCHAR", size = 50 },
  { name = "born", type = "DATETIME" },
]

[[tables]]
name = "Tag"
columns = [{ name = "code", type = "CHAR", size = 4, primary = true }]
"#;

    #[test]
    fn parses_tables_into_schemas() {
        let project = ProjectConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(project.file.database.app_name, "Shop");

        let schemas = project.schemas().unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name().as_str(), "Person");
        assert_eq!(schemas[0].column_type("born"), Some(ColumnType::DateTime));
        assert_eq!(
            schemas[1].primary_key().map(|c| c.name.as_str()),
            Some("code")
        );
    }

    #[test]
    fn missing_sections_default() {
        let project = ProjectConfig::from_toml_str("").unwrap();
        assert!(project.file.database.is_memory());
        assert!(project.file.tables.is_empty());
    }

    #[test]
    fn unknown_column_type_is_reported() {
        let raw = r#"
[[tables]]
name = "t"
columns = [{ name = "a", type = "UUID" }]
"#;
        let project = ProjectConfig::from_toml_str(raw).unwrap();
        let err = project.schemas().unwrap_err().to_string();
        assert!(err.contains("column a"), "{err}");
    }

    #[test]
    fn duplicate_tables_rejected() {
        let raw = r#"
[[tables]]
name = "t"
columns = [{ name = "a", type = "INTEGER" }]

[[tables]]
name = "t"
columns = [{ name = "b", type = "INTEGER" }]
"#;
        assert!(ProjectConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(ProjectConfig::from_toml_str("[database]\nurl = \"x\"").is_err());
        assert!(ProjectConfig::from_toml_str("[[tables]]\nname = \"t\"\ncolumns = []\nextra = 1").is_err());
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liteorm.toml");
        std::fs::write(&path, "[database]\npath = \"data/app.db\"\nbackup_dir = \"bk\"\n").unwrap();

        let project = ProjectConfig::load(&path).unwrap();
        assert_eq!(
            project.file.database.path,
            Some(dir.path().join("data/app.db"))
        );
        assert_eq!(project.file.database.backup_dir, Some(dir.path().join("bk")));
    }
}
