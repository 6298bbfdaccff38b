/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;

use crate::MetricKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty metric name")]
    EmptyName,
    #[error("unknown metric type {0:?}")]
    UnknownKind(String),
    #[error("invalid {kind} value {raw:?}")]
    InvalidValue { kind: MetricKind, raw: String },
    #[error("{kind} metric {name} carries no value")]
    MissingValue { kind: MetricKind, name: String },
}
