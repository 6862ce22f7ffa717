//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了迁移和状态检查命令。

use crate::cli::StatusArgs;
use crate::config::Config;
use crate::database::SeaOrmRecordStore;
use crate::manager::FeedSyncManager;
use anyhow::{bail, Context, Result};

pub async fn migrate(config: &Config) -> Result<()> {
    let records = SeaOrmRecordStore::connect(&config.database)
        .await
        .context("Failed to connect database")?;
    records.migrate().await.context("Migration failed")?;
    println!("Schema is up to date");
    Ok(())
}

pub async fn execute(manager: &FeedSyncManager, args: &StatusArgs) -> Result<()> {
    let status = manager.status().await;
    println!("Cache:    {}", status.cache);
    println!("Database: {}", status.database);

    if args.verbose {
        println!();
        print!("{}", manager.metrics().render());
    }

    if !status.is_healthy() {
        bail!("One or more stores are unavailable");
    }
    Ok(())
}
