/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use async_trait::async_trait;

use metrix_types::{MetricCollection, MetricRecord, MetricValue};

mod error;
pub use error::{BatchUpsertError, ConnectError, StoreError};

mod memory;
pub use memory::MemoryStore;

mod snapshot;
pub use snapshot::{RestoreOutcome, SnapshotStore};

mod sql;
pub use sql::{SqlStore, SqlStoreConfig, is_transient};

/// Storage backend for accumulated metrics.
///
/// Gauges are replaced, counters are added to the stored value. Writing a
/// name with a different kind discards the previous value.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn get_metric(&self, name: &str) -> Result<MetricRecord, StoreError>;

    /// Apply one record and return the stored result.
    async fn set_metric(&self, record: &MetricRecord) -> Result<MetricRecord, StoreError>;

    /// Apply all records or none of them.
    ///
    /// The returned collection holds the stored value of each submitted record,
    /// in submission order. On failure the submitted collection is handed back
    /// untouched.
    async fn upsert_batch(
        &self,
        batch: MetricCollection,
    ) -> Result<MetricCollection, BatchUpsertError>;

    /// Every stored record, in backend iteration order.
    async fn records(&self) -> Result<Vec<MetricRecord>, StoreError>;

    async fn ping(&self) -> bool;

    async fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError> {
        self.set_metric(&MetricRecord::gauge(name, value))
            .await
            .map(|_| ())
    }

    async fn increment_counter(&self, name: &str, delta: i64) -> Result<(), StoreError> {
        self.set_metric(&MetricRecord::counter(name, delta))
            .await
            .map(|_| ())
    }

    async fn get_gauge(&self, name: &str) -> Result<f64, StoreError> {
        match self.get_metric(name).await?.value() {
            MetricValue::Gauge(v) => Ok(v),
            MetricValue::Counter(_) => Err(StoreError::NotFound(name.to_string())),
        }
    }

    async fn get_counter(&self, name: &str) -> Result<i64, StoreError> {
        match self.get_metric(name).await?.value() {
            MetricValue::Counter(v) => Ok(v),
            MetricValue::Gauge(_) => Err(StoreError::NotFound(name.to_string())),
        }
    }

    /// `name: value` lines sorted by name.
    async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let mut records = self.records().await?;
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records.iter().map(|r| r.listing_line()).collect())
    }
}

pub type ArcMetricStore = Arc<dyn MetricStore>;
