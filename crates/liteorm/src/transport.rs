//! File access and delivery used by backups.

use crate::error::OrmResult;
use std::future::Future;
use std::path::Path;

/// How a delivered backup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Cancelled,
}

/// Progress reported by [`Database::backup_file`].
///
/// [`Database::backup_file`]: crate::Database::backup_file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    Generating,
    Sending,
    Sent,
    Cancelled,
}

impl From<Delivery> for BackupState {
    fn from(d: Delivery) -> Self {
        match d {
            Delivery::Sent => BackupState::Sent,
            Delivery::Cancelled => BackupState::Cancelled,
        }
    }
}

/// File system and delivery operations a backup needs.
///
/// `deliver` hands a finished backup to whatever sends it on (mail, upload,
/// share sheet). The user may cancel.
pub trait BackupTransport: Send + Sync {
    fn exists(&self, path: &Path) -> impl Future<Output = OrmResult<bool>> + Send;

    fn copy(&self, from: &Path, to: &Path) -> impl Future<Output = OrmResult<()>> + Send;

    fn read_text(&self, path: &Path) -> impl Future<Output = OrmResult<String>> + Send;

    fn write_text(&self, path: &Path, text: &str) -> impl Future<Output = OrmResult<()>> + Send;

    fn deliver(&self, path: &Path) -> impl Future<Output = OrmResult<Delivery>> + Send;
}

/// Local file system transport. Delivery means the file is in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTransport;

async fn ensure_parent(path: &Path) -> OrmResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

impl BackupTransport for FsTransport {
    async fn exists(&self, path: &Path) -> OrmResult<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn copy(&self, from: &Path, to: &Path) -> OrmResult<()> {
        ensure_parent(to).await?;
        tokio::fs::copy(from, to).await?;
        Ok(())
    }

    async fn read_text(&self, path: &Path) -> OrmResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write_text(&self, path: &Path, text: &str) -> OrmResult<()> {
        ensure_parent(path).await?;
        tokio::fs::write(path, text).await?;
        Ok(())
    }

    async fn deliver(&self, path: &Path) -> OrmResult<Delivery> {
        tracing::info!(target: "liteorm", path = %path.display(), "backup written");
        Ok(Delivery::Sent)
    }
}
