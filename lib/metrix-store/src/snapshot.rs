/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use metrix_types::{MetricCollection, MetricRecord};

use crate::{BatchUpsertError, MemoryStore, MetricStore, StoreError};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub applied: usize,
    /// Decode error that stopped the restore before the end of file.
    pub corrupt_tail: Option<String>,
}

/// A [`MemoryStore`] persisted as newline delimited JSON records.
pub struct SnapshotStore {
    memory: MemoryStore,
    path: Option<PathBuf>,
    sync_flush: bool,
    file_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(memory: MemoryStore, path: Option<PathBuf>) -> Self {
        SnapshotStore {
            memory,
            path: path.filter(|p| !p.as_os_str().is_empty()),
            sync_flush: false,
            file_lock: Mutex::new(()),
        }
    }

    /// Flush after every successful mutation.
    pub fn with_sync_flush(mut self, enable: bool) -> Self {
        self.sync_flush = enable;
        self
    }

    pub fn can_persist(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Write every record to the target file, replacing its content.
    ///
    /// The records are taken while holding the file lock, so the last flush
    /// to finish always contains every mutation applied before it started.
    /// The content goes to a sibling temp file first and is then renamed over
    /// the target.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let _guard = self.file_lock.lock().await;
        let records = self.memory.snapshot();
        let mut buf = Vec::with_capacity(records.len() * 64);
        for r in &records {
            serde_json::to_writer(&mut buf, r)?;
            buf.push(b'\n');
        }

        let tmp_path = temp_path(path);
        tokio::fs::write(&tmp_path, &buf).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!("flushed {} metrics to {}", records.len(), path.display());
        Ok(records.len())
    }

    /// Load records from the target file into the wrapped store.
    ///
    /// Records are applied with the usual replace and add rules. The first
    /// record that fails to decode ends the restore.
    pub async fn restore(&self) -> Result<RestoreOutcome, StoreError> {
        let Some(path) = &self.path else {
            return Ok(RestoreOutcome::default());
        };

        let _guard = self.file_lock.lock().await;
        let _ = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        let content = tokio::fs::read(path).await?;
        drop(_guard);

        let mut outcome = RestoreOutcome::default();
        let stream = serde_json::Deserializer::from_slice(&content).into_iter::<MetricRecord>();
        for item in stream {
            match item {
                Ok(record) => {
                    self.memory.apply(&record);
                    outcome.applied += 1;
                }
                Err(e) => {
                    warn!(
                        "stop restoring from {} after {} records: {e}",
                        path.display(),
                        outcome.applied
                    );
                    outcome.corrupt_tail = Some(e.to_string());
                    break;
                }
            }
        }
        info!("restored {} metrics from {}", outcome.applied, path.display());
        Ok(outcome)
    }

    /// Flush on every `interval` tick until `quit`, then flush once more.
    pub async fn run_flush_loop(&self, interval: Duration, quit: CancellationToken) {
        if !self.can_persist() {
            return;
        }

        if !interval.is_zero() && !self.sync_flush {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;

                    _ = quit.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.flush().await {
                            warn!("failed to flush snapshot: {e}");
                        }
                    }
                }
            }
        } else {
            quit.cancelled().await;
        }

        match self.flush().await {
            Ok(n) => info!("final snapshot with {n} metrics written"),
            Err(e) => warn!("failed to write final snapshot: {e}"),
        }
    }

    async fn after_write(&self) -> Result<(), StoreError> {
        if self.sync_flush {
            self.flush().await?;
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl MetricStore for SnapshotStore {
    async fn get_metric(&self, name: &str) -> Result<MetricRecord, StoreError> {
        self.memory.get_metric(name).await
    }

    async fn set_metric(&self, record: &MetricRecord) -> Result<MetricRecord, StoreError> {
        let stored = self.memory.apply(record);
        self.after_write().await?;
        Ok(stored)
    }

    async fn upsert_batch(
        &self,
        batch: MetricCollection,
    ) -> Result<MetricCollection, BatchUpsertError> {
        let stored: MetricCollection = self.memory.apply_all(batch.iter()).into();
        if let Err(e) = self.after_write().await {
            // the in-memory state already changed, only durability is reported
            warn!("batch applied but snapshot write failed: {e}");
        }
        Ok(stored)
    }

    async fn records(&self) -> Result<Vec<MetricRecord>, StoreError> {
        Ok(self.memory.snapshot())
    }

    async fn ping(&self) -> bool {
        true
    }
}
