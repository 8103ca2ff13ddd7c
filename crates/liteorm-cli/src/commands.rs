use crate::cli::{BackupArgs, CommonArgs, CountArgs, ExportArgs, ImportArgs, SelectArgs};
use crate::config::ProjectConfig;
use crate::output::{print_success, print_warning, rows_table};
use anyhow::Context;
use liteorm::{Database, FsTransport, Select};
use std::path::Path;

/// Open the configured database with every declared table registered.
async fn open(config: &Path) -> anyhow::Result<Database> {
    let project = ProjectConfig::load(config)?;
    let schemas = project.schemas()?;
    let mut db = Database::open(project.file.database).context("failed to open database")?;
    for schema in schemas {
        db.register(schema)?;
    }
    Ok(db)
}

pub fn ddl(args: CommonArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::load(&args.config)?;
    for schema in project.schemas()? {
        println!("{};", schema.create_table_sql());
    }
    Ok(())
}

pub async fn init(args: CommonArgs) -> anyhow::Result<()> {
    let db = open(&args.config).await?;
    db.create_tables().await.context("failed to create tables")?;
    for table in db.tables() {
        print_success(&format!("table {} ready", table.name()));
    }
    Ok(())
}

pub async fn export(args: ExportArgs) -> anyhow::Result<()> {
    let db = open(&args.config).await?;
    match args.out {
        Some(out) => {
            db.export_to(&FsTransport, &out)
                .await
                .with_context(|| format!("failed to export to {}", out.display()))?;
            print_success(&format!("wrote {}", out.display()));
        }
        None => {
            let dump = db.export_all().await?;
            if !dump.is_empty() {
                println!("{dump}");
            }
        }
    }
    Ok(())
}

pub async fn import(args: ImportArgs) -> anyhow::Result<()> {
    let db = open(&args.config).await?;
    let report = db
        .import_from(&FsTransport, &args.file, args.recreate)
        .await
        .with_context(|| format!("failed to import {}", args.file.display()))?;

    for failure in &report.failed {
        print_warning(&format!(
            "fragment {} ({}): {}",
            failure.index,
            failure.table.as_deref().unwrap_or("?"),
            failure.error
        ));
    }
    print_success(&format!("applied {} statement(s)", report.applied));

    if !report.is_complete() {
        anyhow::bail!("{} statement(s) failed to import", report.failed.len());
    }
    Ok(())
}

pub async fn backup(args: BackupArgs) -> anyhow::Result<()> {
    let db = open(&args.config).await?;
    let outcome = db
        .backup_file(&FsTransport, args.dir.as_deref(), |state| {
            tracing::info!(target: "liteorm", ?state, "backup state changed");
        })
        .await
        .context("backup failed")?;
    print_success(&format!("backup written to {}", outcome.path.display()));
    Ok(())
}

pub async fn count(args: CountArgs) -> anyhow::Result<()> {
    let db = open(&args.config).await?;
    let n = db.table(&args.table)?.count(&db, None).await?;
    println!("{n}");
    Ok(())
}

pub async fn select(args: SelectArgs) -> anyhow::Result<()> {
    let db = open(&args.config).await?;
    let table = db.table(&args.table)?;

    let mut query = Select::new();
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    let rows = table.select(&db, query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        let columns: Vec<&str> = table
            .schema()
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        println!("{}", rows_table(&columns, &rows));
    }
    Ok(())
}
