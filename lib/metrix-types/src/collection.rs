/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::MetricRecord;

/// An ordered batch of records, encoded as a plain JSON array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricCollection {
    records: Vec<MetricRecord>,
}

impl MetricCollection {
    pub fn new() -> Self {
        MetricCollection::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MetricCollection {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: MetricRecord) {
        self.records.push(record);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }

    /// Names occurring more than once, in order of their second occurrence.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.records.len());
        let mut dup = Vec::new();
        for r in &self.records {
            if !seen.insert(r.name()) && !dup.contains(&r.name()) {
                dup.push(r.name());
            }
        }
        dup
    }
}

impl From<Vec<MetricRecord>> for MetricCollection {
    fn from(records: Vec<MetricRecord>) -> Self {
        MetricCollection { records }
    }
}

impl FromIterator<MetricRecord> for MetricCollection {
    fn from_iter<T: IntoIterator<Item = MetricRecord>>(iter: T) -> Self {
        MetricCollection {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MetricCollection {
    type Item = MetricRecord;
    type IntoIter = std::vec::IntoIter<MetricRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a MetricCollection {
    type Item = &'a MetricRecord;
    type IntoIter = std::slice::Iter<'a, MetricRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
