/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use log::trace;

use metrix_types::{MetricCollection, MetricRecord, POLL_COUNT_METRIC, RANDOM_VALUE_METRIC};

#[derive(Default)]
struct StateInner {
    gauges: BTreeMap<String, f64>,
    poll_count: i64,
    reported_poll_count: i64,
}

/// Latest poll results of the agent, shared by the poll loop and the report
/// workers.
#[derive(Default)]
pub struct MetricsState {
    inner: RwLock<StateInner>,
}

impl MetricsState {
    pub fn new() -> Self {
        MetricsState::default()
    }

    /// Record one poll tick.
    ///
    /// Non-finite samples are skipped as they have no JSON representation.
    pub fn update<I>(&self, gauges: I, random_value: f64)
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for (name, value) in gauges {
            if value.is_finite() {
                inner.gauges.insert(name, value);
            } else {
                trace!("skip non-finite sample {name}");
            }
        }
        inner
            .gauges
            .insert(RANDOM_VALUE_METRIC.to_string(), random_value);
        inner.poll_count = inner.poll_count.saturating_add(1);
    }

    pub fn poll_count(&self) -> i64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .poll_count
    }

    /// Current gauges plus the number of polls since the previous snapshot.
    ///
    /// The poll counter delta is consumed even if the snapshot never reaches
    /// the server.
    pub fn take_snapshot(&self) -> MetricCollection {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let delta = inner.poll_count - inner.reported_poll_count;
        inner.reported_poll_count = inner.poll_count;

        let mut collection = MetricCollection::with_capacity(inner.gauges.len() + 1);
        for (name, value) in &inner.gauges {
            collection.push(MetricRecord::gauge(name.as_str(), *value));
        }
        collection.push(MetricRecord::counter(POLL_COUNT_METRIC, delta));
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_count_delta() {
        let state = MetricsState::new();
        for _ in 0..3 {
            state.update([("Alloc".to_string(), 1.0)], 0.5);
        }
        let snapshot = state.take_snapshot();
        let poll = snapshot
            .iter()
            .find(|r| r.name() == POLL_COUNT_METRIC)
            .unwrap();
        assert_eq!(poll.counter_value(), Some(3));

        state.update(Vec::new(), 0.25);
        let snapshot = state.take_snapshot();
        let poll = snapshot
            .iter()
            .find(|r| r.name() == POLL_COUNT_METRIC)
            .unwrap();
        assert_eq!(poll.counter_value(), Some(1));
        assert_eq!(state.poll_count(), 4);

        let snapshot = state.take_snapshot();
        let poll = snapshot
            .iter()
            .find(|r| r.name() == POLL_COUNT_METRIC)
            .unwrap();
        assert_eq!(poll.counter_value(), Some(0));
    }

    #[test]
    fn gauges_replaced() {
        let state = MetricsState::new();
        state.update([("Alloc".to_string(), 1.0), ("Bad".to_string(), f64::NAN)], 0.1);
        state.update([("Alloc".to_string(), 2.0)], 0.2);

        let snapshot = state.take_snapshot();
        assert!(snapshot.duplicate_names().is_empty());
        assert_eq!(
            snapshot.records(),
            &[
                MetricRecord::gauge("Alloc", 2.0),
                MetricRecord::gauge(RANDOM_VALUE_METRIC, 0.2),
                MetricRecord::counter(POLL_COUNT_METRIC, 2),
            ]
        );
    }
}
