/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::{PoisonError, RwLock};

use ahash::AHashMap;
use async_trait::async_trait;

use metrix_types::{MetricCollection, MetricRecord, MetricValue};

use crate::{BatchUpsertError, MetricStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<AHashMap<String, MetricValue>>,
}

fn apply(map: &mut AHashMap<String, MetricValue>, record: &MetricRecord) -> MetricRecord {
    let stored = match record.value() {
        MetricValue::Gauge(v) => MetricValue::Gauge(v),
        MetricValue::Counter(delta) => match map.get(record.name()) {
            Some(MetricValue::Counter(old)) => MetricValue::Counter(old.saturating_add(delta)),
            _ => MetricValue::Counter(delta),
        },
    };
    if let Some(slot) = map.get_mut(record.name()) {
        *slot = stored;
    } else {
        map.insert(record.name().to_string(), stored);
    }
    MetricRecord::new(record.name(), stored)
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, name: &str) -> Option<MetricRecord> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(name).map(|v| MetricRecord::new(name, *v))
    }

    pub fn apply(&self, record: &MetricRecord) -> MetricRecord {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut map, record)
    }

    /// Apply every record inside a single critical section.
    pub fn apply_all<'a, I>(&self, records: I) -> Vec<MetricRecord>
    where
        I: IntoIterator<Item = &'a MetricRecord>,
    {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        records.into_iter().map(|r| apply(&mut map, r)).collect()
    }

    pub fn snapshot(&self) -> Vec<MetricRecord> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.iter()
            .map(|(name, v)| MetricRecord::new(name.as_str(), *v))
            .collect()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn get_metric(&self, name: &str) -> Result<MetricRecord, StoreError> {
        self.get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn set_metric(&self, record: &MetricRecord) -> Result<MetricRecord, StoreError> {
        Ok(self.apply(record))
    }

    async fn upsert_batch(
        &self,
        batch: MetricCollection,
    ) -> Result<MetricCollection, BatchUpsertError> {
        Ok(self.apply_all(batch.iter()).into())
    }

    async fn records(&self) -> Result<Vec<MetricRecord>, StoreError> {
        Ok(self.snapshot())
    }

    async fn ping(&self) -> bool {
        true
    }
}
