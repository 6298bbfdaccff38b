/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod collection;
mod error;
mod kind;
mod record;
mod retry;

pub use collection::MetricCollection;
pub use error::ValidationError;
pub use kind::MetricKind;
pub use record::{MetricQuery, MetricRecord, MetricValue};
pub use retry::BackoffPolicy;

/// Name of the agent side counter that tracks poll ticks.
pub const POLL_COUNT_METRIC: &str = "PollCount";
/// Name of the agent side gauge regenerated on every poll tick.
pub const RANDOM_VALUE_METRIC: &str = "RandomValue";
/// Header carrying the agent host address, checked against the trusted subnet.
pub const HEADER_REAL_IP: &str = "X-Real-IP";
