/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use metrix_store::{ArcMetricStore, MemoryStore, SnapshotStore, SqlStore};

use crate::config::ServerConfig;

/// The store selected by config, with the handles its lifecycle needs.
pub enum StoreBackend {
    Snapshot(Arc<SnapshotStore>),
    Sql(Arc<SqlStore>),
}

impl StoreBackend {
    /// A database DSN selects the SQL store, otherwise the in-memory store
    /// with optional file snapshots is used.
    pub async fn build(config: &ServerConfig) -> anyhow::Result<Self> {
        if let Some(sql_config) = config.sql_store_config() {
            let store = SqlStore::connect(&sql_config)
                .await
                .context("failed to connect to database")?;
            store
                .migrate()
                .await
                .context("failed to migrate database schema")?;
            info!("using database metric store");
            return Ok(StoreBackend::Sql(Arc::new(store)));
        }

        let store = SnapshotStore::new(MemoryStore::new(), config.file_storage_path.clone())
            .with_sync_flush(config.store_interval.is_zero());
        if config.restore && store.can_persist() {
            let outcome = store
                .restore()
                .await
                .context("failed to restore metrics from snapshot")?;
            if outcome.corrupt_tail.is_some() {
                warn!(
                    "snapshot restore stopped early, {} metrics applied",
                    outcome.applied
                );
            }
        }
        match store.path() {
            Some(p) => info!("using memory metric store, snapshot file {}", p.display()),
            None => info!("using memory metric store without persistence"),
        }
        Ok(StoreBackend::Snapshot(Arc::new(store)))
    }

    pub fn store(&self) -> ArcMetricStore {
        match self {
            StoreBackend::Snapshot(s) => Arc::clone(s) as ArcMetricStore,
            StoreBackend::Sql(s) => Arc::clone(s) as ArcMetricStore,
        }
    }

    /// Run the background persistence task until `quit`.
    pub async fn run_until(&self, config: &ServerConfig, quit: CancellationToken) {
        match self {
            StoreBackend::Snapshot(s) => s.run_flush_loop(config.store_interval, quit).await,
            StoreBackend::Sql(_) => quit.cancelled().await,
        }
    }

    pub async fn close(&self) {
        if let StoreBackend::Sql(s) = self {
            s.close().await;
        }
    }
}
