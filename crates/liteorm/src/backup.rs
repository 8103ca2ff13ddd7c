//! Text dump export/import and file backups.
//!
//! A dump is one `INSERT INTO "<table>" (<cols>) VALUES (...), ...;`
//! statement per non-empty table, newline separated, in registration order.
//! There is no header and no schema. Import splits the text at `INSERT INTO`
//! statement starts outside string literals and replays each fragment. A
//! failing fragment is logged, recorded in the [`ImportReport`] and skipped;
//! the others are committed.

use crate::db::Database;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, run_blocking};
use crate::ident::first_quoted;
use crate::transport::{BackupState, BackupTransport, Delivery};
use chrono::Local;
use std::path::{Path, PathBuf};

const STATEMENT_START: &str = "INSERT INTO";

/// One dump fragment that could not be replayed.
#[derive(Debug)]
pub struct FragmentFailure {
    /// Position of the fragment in the dump, from 0.
    pub index: usize,
    /// Target table, when one could be read from the fragment.
    pub table: Option<String>,
    pub error: OrmError,
}

/// Outcome of [`Database::import_all`].
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Fragments replayed successfully.
    pub applied: usize,
    pub failed: Vec<FragmentFailure>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of [`Database::backup_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub path: PathBuf,
    pub delivery: Delivery,
}

/// Split a dump at `INSERT INTO` statement starts that lie outside quoted
/// strings and identifiers. Text before the first start is returned as its
/// own fragment when it is not blank.
pub fn split_statements(dump: &str) -> Vec<&str> {
    let bytes = dump.as_bytes();
    let mut starts = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'I' if !in_single && !in_double => {
                let at_boundary = i == 0 || matches!(bytes[i - 1], b';' | b' ' | b'\n' | b'\r' | b'\t');
                if at_boundary && bytes[i..].starts_with(STATEMENT_START.as_bytes()) {
                    starts.push(i);
                    i += STATEMENT_START.len();
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut fragments = Vec::with_capacity(starts.len() + 1);
    let head_end = starts.first().copied().unwrap_or(dump.len());
    let head = trim_fragment(&dump[..head_end]);
    if !head.is_empty() {
        fragments.push(head);
    }
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(dump.len());
        let fragment = trim_fragment(&dump[start..end]);
        if !fragment.is_empty() {
            fragments.push(fragment);
        }
    }
    fragments
}

fn trim_fragment(s: &str) -> &str {
    s.trim().trim_end_matches(';').trim_end()
}

/// Lowercased app name with whitespace replaced by `-`.
fn file_slug(app_name: &str) -> String {
    let slug: String = app_name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect::<String>()
        .to_lowercase();
    if slug.is_empty() {
        "backup".to_string()
    } else {
        slug
    }
}

fn backup_file_name(app_name: &str) -> String {
    format!(
        "{}-{}.db",
        file_slug(app_name),
        Local::now().format("%Y%m%d-%H%M%S")
    )
}

impl Database {
    /// Dump every registered table, in registration order, skipping empty ones.
    pub async fn export_all(&self) -> OrmResult<String> {
        let tx = self.transaction().await?;
        let mut parts = Vec::new();
        for table in self.tables() {
            let sql = table.build_backup_sql(&tx).await?;
            if !sql.is_empty() {
                parts.push(sql);
            }
        }
        tx.commit().await?;
        Ok(parts.join("\n"))
    }

    /// Replay a dump produced by [`Database::export_all`].
    ///
    /// With `recreate_tables`, every registered table is dropped and created
    /// first. All work happens in one transaction; each fragment runs in its
    /// own savepoint so a failure only discards that fragment.
    pub async fn import_all(&self, dump: &str, recreate_tables: bool) -> OrmResult<ImportReport> {
        let tx = self.transaction().await?;
        if recreate_tables {
            for table in self.tables() {
                table.drop_table(&tx).await?;
                table.create_table(&tx).await?;
            }
        }

        let mut report = ImportReport::default();
        for (index, fragment) in split_statements(dump).into_iter().enumerate() {
            let table = first_quoted(fragment);
            let result = crate::savepoint!(tx, sp, {
                if !fragment.starts_with(STATEMENT_START) {
                    return Err(OrmError::backup("fragment is not an INSERT statement"));
                }
                sp.exec(fragment).await
            });
            match result {
                Ok(_) => report.applied += 1,
                Err(error) => {
                    tracing::warn!(
                        target: "liteorm",
                        index,
                        table = table.as_deref().unwrap_or("?"),
                        error = %error,
                        "restore fragment failed"
                    );
                    report.failed.push(FragmentFailure {
                        index,
                        table,
                        error,
                    });
                }
            }
        }
        tx.commit().await?;

        tracing::info!(
            target: "liteorm",
            applied = report.applied,
            failed = report.failed.len(),
            "restore finished"
        );
        Ok(report)
    }

    /// Write [`Database::export_all`] to `path`.
    pub async fn export_to(&self, transport: &impl BackupTransport, path: &Path) -> OrmResult<()> {
        let dump = self.export_all().await?;
        transport.write_text(path, &dump).await
    }

    /// Read a dump from `path` and [`import_all`](Database::import_all) it.
    pub async fn import_from(
        &self,
        transport: &impl BackupTransport,
        path: &Path,
        recreate_tables: bool,
    ) -> OrmResult<ImportReport> {
        if !transport.exists(path).await? {
            return Err(OrmError::backup(format!(
                "dump file {} does not exist",
                path.display()
            )));
        }
        let dump = transport.read_text(path).await?;
        self.import_all(&dump, recreate_tables).await
    }

    /// Copy the database file to `<dir>/<app-name>-<YYYYMMDD-HHMMSS>.db` and
    /// hand it to the transport for delivery.
    ///
    /// `dest_dir` falls back to the configured `backup_dir`.
    pub async fn backup_file(
        &self,
        transport: &impl BackupTransport,
        dest_dir: Option<&Path>,
        mut on_state: impl FnMut(BackupState) + Send,
    ) -> OrmResult<BackupOutcome> {
        let config = self.config();
        let source = match &config.path {
            Some(path) if !config.is_memory() => path.clone(),
            _ => return Err(OrmError::backup("an in-memory database has no file to back up")),
        };
        let dest_dir = dest_dir
            .map(Path::to_path_buf)
            .or_else(|| config.backup_dir.clone())
            .ok_or_else(|| OrmError::backup("no backup directory given or configured"))?;
        if !transport.exists(&source).await? {
            return Err(OrmError::backup(format!(
                "can not find database file: {}",
                source.display()
            )));
        }

        on_state(BackupState::Generating);
        let target = dest_dir.join(backup_file_name(&config.app_name));
        {
            let conn = self.lock_owned().await;
            let _conn = if config.wal_mode {
                let (conn, checkpoint) = run_blocking(conn, |c| {
                    Ok(c.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?)
                })
                .await?;
                checkpoint?;
                conn
            } else {
                conn
            };
            transport.copy(&source, &target).await?;
        }

        on_state(BackupState::Sending);
        let delivery = transport.deliver(&target).await?;
        on_state(delivery.into());

        Ok(BackupOutcome {
            path: target,
            delivery,
        })
    }
}
