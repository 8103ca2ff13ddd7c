//! Database configuration, loadable from TOML.
//!
//! ```toml
//! path = "${APP_DATA}/inventory.db"
//! app_name = "Inventory"
//! backup_dir = "backups"
//! busy_timeout_ms = 5000
//! foreign_keys = true
//! wal_mode = true
//! max_sql_log_length = 200
//! ```
//!
//! `${VAR}` references in string fields are expanded from the environment.

use crate::error::{OrmError, OrmResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// SQLite's name for an in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DbConfig {
    /// Database file. `None` (or `":memory:"`) opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Application name, used to name backup files.
    pub app_name: String,
    /// Default destination directory for [`Database::backup_file`].
    ///
    /// [`Database::backup_file`]: crate::Database::backup_file
    pub backup_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
    pub wal_mode: bool,
    /// Truncate logged SQL to this many bytes. `None` logs it whole.
    pub max_sql_log_length: Option<usize>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: None,
            app_name: "liteorm".to_string(),
            backup_dir: None,
            busy_timeout_ms: 5000,
            foreign_keys: true,
            wal_mode: false,
            max_sql_log_length: Some(200),
        }
    }
}

impl DbConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    pub fn wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    pub fn is_memory(&self) -> bool {
        self.path
            .as_ref()
            .is_none_or(|p| p.as_os_str() == MEMORY_PATH)
    }

    /// Parse, expand and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let mut config: DbConfig = toml::from_str(raw)
            .map_err(|e| OrmError::config(format!("failed to parse database config: {e}")))?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file. Relative `path`/`backup_dir` entries resolve against
    /// the file's directory.
    pub fn load(config_path: impl AsRef<Path>) -> OrmResult<Self> {
        let config_path = config_path.as_ref();
        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            OrmError::config(format!(
                "failed to read config file {}: {e}",
                config_path.display()
            ))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_relative(base);
        Ok(config)
    }

    pub fn resolve_relative(&mut self, base: &Path) {
        for p in [&mut self.path, &mut self.backup_dir].into_iter().flatten() {
            if p.is_relative() && p.as_os_str() != MEMORY_PATH {
                *p = base.join(&*p);
            }
        }
    }

    /// Expand `${VAR}` references in `app_name`, `path` and `backup_dir`.
    pub fn expand_env(&mut self) -> OrmResult<()> {
        self.app_name = expand_env_vars(&self.app_name)?;
        for p in [&mut self.path, &mut self.backup_dir].into_iter().flatten() {
            let raw = p.to_string_lossy().into_owned();
            *p = PathBuf::from(expand_env_vars(&raw)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.app_name.trim().is_empty() {
            return Err(OrmError::config("app_name must not be empty"));
        }
        if self.path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(OrmError::config(
                "path must not be empty (omit it for an in-memory database)",
            ));
        }
        if self.max_sql_log_length == Some(0) {
            return Err(OrmError::config("max_sql_log_length must be > 0"));
        }
        Ok(())
    }
}

/// Expand `${VAR}` references from the environment.
pub fn expand_env_vars(input: &str) -> OrmResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(OrmError::config(format!(
                    "unterminated env var reference: ${{{key}}}"
                )));
            }
            if key.is_empty() {
                return Err(OrmError::config("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key).map_err(|_| {
                OrmError::config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_memory() {
        let config = DbConfig::from_toml_str("").unwrap();
        assert!(config.is_memory());
        assert_eq!(config.app_name, "liteorm");
        assert!(config.foreign_keys);
    }

    #[test]
    fn memory_path_is_in_memory() {
        let mut config = DbConfig::from_toml_str("path = \":memory:\"").unwrap();
        config.resolve_relative(Path::new("/etc"));
        assert!(config.is_memory());
    }

    #[test]
    fn parses_all_fields() {
        let config = DbConfig::from_toml_str(
            r#"
            path = "data/app.db"
            app_name = "Inventory"
            backup_dir = "backups"
            busy_timeout_ms = 100
            foreign_keys = false
            wal_mode = true
            max_sql_log_length = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.path, Some(PathBuf::from("data/app.db")));
        assert_eq!(config.app_name, "Inventory");
        assert_eq!(config.busy_timeout_ms, 100);
        assert!(!config.foreign_keys);
        assert!(config.wal_mode);
        assert_eq!(config.max_sql_log_length, Some(50));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = DbConfig::from_toml_str("pth = \"x.db\"").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn empty_app_name_rejected() {
        let err = DbConfig::from_toml_str("app_name = \"  \"").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn expands_env_vars() {
        let key = "LITEORM_CONFIG_TEST_DIR";
        // SAFETY: test-only env mutation with a key no other test reads.
        unsafe { std::env::set_var(key, "/tmp/liteorm") };
        assert_eq!(
            expand_env_vars("${LITEORM_CONFIG_TEST_DIR}/app.db").unwrap(),
            "/tmp/liteorm/app.db"
        );
        assert!(expand_env_vars("${LITEORM_CONFIG_TEST_MISSING}").is_err());
        assert!(expand_env_vars("${UNTERMINATED").is_err());
        assert!(expand_env_vars("${}").is_err());
        assert_eq!(expand_env_vars("$HOME").unwrap(), "$HOME");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let mut config = DbConfig::file("app.db").backup_dir("/abs/backups");
        config.resolve_relative(Path::new("/etc/myapp"));
        assert_eq!(config.path, Some(PathBuf::from("/etc/myapp/app.db")));
        assert_eq!(config.backup_dir, Some(PathBuf::from("/abs/backups")));
    }
}
